//! State of one switching session.
//!
//! A session is created when the switcher is shown and dropped when the user
//! selects or cancels. The dispatcher reads [`SwitcherSession::state`]; the
//! daemon feeds the resulting command back through [`SwitcherSession::apply`].

use crate::dispatcher::{Command, SwitcherMode, SwitcherState, WindowTarget};
use crate::window_manager::{AppEntry, WindowInfo};

#[derive(Debug, Clone)]
enum Items {
    Apps(Vec<AppEntry>),
    Windows(Vec<WindowInfo>),
}

/// Effect of a command on the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// Selection moved; the popup needs redrawing.
    Changed,
    Unchanged,
    /// These windows belong to a quit application and must be killed.
    Quit(Vec<i64>),
    /// This window must be closed.
    Close(i64),
}

pub struct SwitcherSession {
    items: Items,
    selected: usize,
    current_window: Option<usize>,
    thumbnails_focused: bool,
    thumbnails_shown: bool,
}

/// Step an index forward or backward with wrap-around.
fn cycle(index: usize, len: usize, forward: bool) -> usize {
    if len == 0 {
        return 0;
    }
    if forward {
        (index + 1) % len
    } else if index == 0 {
        len - 1
    } else {
        index - 1
    }
}

impl SwitcherSession {
    /// The initial selection is the second item when there is one, so a
    /// single tap switches to the previously used application.
    fn new(items: Items) -> Self {
        let len = match &items {
            Items::Apps(apps) => apps.len(),
            Items::Windows(windows) => windows.len(),
        };
        SwitcherSession {
            items,
            selected: if len > 1 { 1 } else { 0 },
            current_window: None,
            thumbnails_focused: false,
            thumbnails_shown: false,
        }
    }

    pub fn with_apps(apps: Vec<AppEntry>) -> Self {
        Self::new(Items::Apps(apps))
    }

    pub fn with_windows(windows: Vec<WindowInfo>) -> Self {
        Self::new(Items::Windows(windows))
    }

    pub fn mode(&self) -> SwitcherMode {
        match self.items {
            Items::Apps(_) => SwitcherMode::App,
            Items::Windows(_) => SwitcherMode::Window,
        }
    }

    pub fn len(&self) -> usize {
        match &self.items {
            Items::Apps(apps) => apps.len(),
            Items::Windows(windows) => windows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self) -> SwitcherState {
        SwitcherState {
            selected_index: self.selected,
            thumbnails_focused: self.thumbnails_focused,
            current_window: self.current_window,
            item_count: self.len(),
        }
    }

    fn selected_app(&self) -> Option<&AppEntry> {
        match &self.items {
            Items::Apps(apps) => apps.get(self.selected),
            Items::Windows(_) => None,
        }
    }

    pub fn apply(&mut self, command: Command) -> Applied {
        match command {
            Command::SelectNext => self.select_item(cycle(self.selected, self.len(), true)),
            Command::SelectPrevious => self.select_item(cycle(self.selected, self.len(), false)),
            Command::SelectWindowInCurrentApp(target) => self.select_window(target),
            Command::EnterThumbnailMode => self.toggle_thumbnails(),
            Command::QuitApplication(index) => self.quit_app(index),
            Command::CloseWindow { item, window } => self.close_window(item, window),
            Command::Propagate => Applied::Unchanged,
        }
    }

    /// Pointer hover selects the item under it unless hover selection is disabled.
    pub fn hover(&mut self, index: usize, hover_disabled: bool) -> Applied {
        if hover_disabled || index >= self.len() || index == self.selected {
            return Applied::Unchanged;
        }
        self.select_item(index)
    }

    fn select_item(&mut self, index: usize) -> Applied {
        if self.is_empty() {
            return Applied::Unchanged;
        }
        self.selected = index;
        self.current_window = None;
        self.thumbnails_focused = false;
        self.thumbnails_shown = false;
        Applied::Changed
    }

    fn select_window(&mut self, target: WindowTarget) -> Applied {
        let Some(count) = self.selected_app().map(|app| app.windows.len()) else {
            return Applied::Unchanged;
        };
        if count == 0 {
            return Applied::Unchanged;
        }

        let next = match (target, self.current_window) {
            (WindowTarget::First, _) | (WindowTarget::Next, None) => 0,
            (WindowTarget::Previous, None) => count - 1,
            (WindowTarget::Next, Some(w)) => cycle(w, count, true),
            (WindowTarget::Previous, Some(w)) => cycle(w, count, false),
        };

        self.current_window = Some(next);
        self.thumbnails_focused = true;
        self.thumbnails_shown = true;
        Applied::Changed
    }

    /// Descend into the thumbnails, or, when already there, hand focus back
    /// to the application while keeping its windows on display.
    fn toggle_thumbnails(&mut self) -> Applied {
        if self.thumbnails_focused {
            self.thumbnails_focused = false;
            self.current_window = None;
            self.thumbnails_shown = true;
            Applied::Changed
        } else {
            self.select_window(WindowTarget::First)
        }
    }

    fn quit_app(&mut self, index: usize) -> Applied {
        let Items::Apps(apps) = &mut self.items else {
            return Applied::Unchanged;
        };
        if index >= apps.len() {
            return Applied::Unchanged;
        }

        let app = apps.remove(index);
        self.after_item_removed(index);
        Applied::Quit(app.windows.iter().map(|w| w.id).collect())
    }

    fn close_window(&mut self, item: usize, window: Option<usize>) -> Applied {
        match (&mut self.items, window) {
            (Items::Apps(apps), Some(w)) => {
                let Some(app) = apps.get_mut(item) else {
                    return Applied::Unchanged;
                };
                if w >= app.windows.len() {
                    return Applied::Unchanged;
                }

                let closed = app.windows.remove(w).id;
                if app.windows.is_empty() {
                    apps.remove(item);
                    self.after_item_removed(item);
                } else if item == self.selected {
                    self.current_window = Some(w.min(app.windows.len() - 1));
                }
                Applied::Close(closed)
            }
            (Items::Windows(windows), None) => {
                if item >= windows.len() {
                    return Applied::Unchanged;
                }
                let closed = windows.remove(item).id;
                self.after_item_removed(item);
                Applied::Close(closed)
            }
            // No window chosen inside the group
            _ => Applied::Unchanged,
        }
    }

    fn after_item_removed(&mut self, index: usize) {
        let removed_selected = index == self.selected;
        if index < self.selected {
            self.selected -= 1;
        }
        self.selected = self.selected.min(self.len().saturating_sub(1));
        if removed_selected {
            self.current_window = None;
            self.thumbnails_focused = false;
            self.thumbnails_shown = false;
        }
    }

    /// Window that currently has the highlight.
    pub fn highlighted_window(&self) -> Option<&WindowInfo> {
        match &self.items {
            Items::Apps(apps) => {
                let app = apps.get(self.selected)?;
                app.windows.get(self.current_window.unwrap_or(0))
            }
            Items::Windows(windows) => windows.get(self.selected),
        }
    }

    /// Window ids to focus, in order, when the selection is confirmed. The
    /// last id ends up focused. Stale indices yield nothing.
    pub fn finish(&self, raise_first_only: bool) -> Vec<i64> {
        match &self.items {
            Items::Windows(windows) => windows.get(self.selected).map(|w| w.id).into_iter().collect(),
            Items::Apps(apps) => {
                let Some(app) = apps.get(self.selected) else {
                    return Vec::new();
                };
                match self.current_window {
                    Some(w) => app.windows.get(w).map(|w| w.id).into_iter().collect(),
                    None if raise_first_only => app.windows.first().map(|w| w.id).into_iter().collect(),
                    // Raise the whole app, most recent window last so it keeps focus
                    None => app.windows.iter().rev().map(|w| w.id).collect(),
                }
            }
        }
    }

    /// One line per item, for the popup listing.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        match &self.items {
            Items::Apps(apps) => {
                for (i, app) in apps.iter().enumerate() {
                    let marker = if i == self.selected && !self.thumbnails_focused { ">>>" } else { "   " };
                    lines.push(format!("{} {} ({} windows)", marker, app.app_id, app.windows.len()));
                    if i == self.selected && self.thumbnails_shown {
                        for (w, window) in app.windows.iter().enumerate() {
                            let marker = if self.current_window == Some(w) { " >>" } else { "   " };
                            lines.push(format!("    {} [{}] {}", marker, window.id, window.title));
                        }
                    }
                }
            }
            Items::Windows(windows) => {
                for (i, window) in windows.iter().enumerate() {
                    let marker = if i == self.selected { ">>>" } else { "   " };
                    let app_id = window.app_id.as_deref().unwrap_or("<unknown>");
                    lines.push(format!("{} [{}] {} - {}", marker, window.id, app_id, window.title));
                }
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_window(id: i64, app: &str) -> WindowInfo {
        WindowInfo {
            id,
            app_id: Some(app.to_string()),
            title: format!("{app} {id}"),
            workspace: "1".to_string(),
            output: "DP-1".to_string(),
            window_class: None,
            transient_for: None,
        }
    }

    fn make_app(app: &str, ids: &[i64]) -> AppEntry {
        AppEntry {
            app_id: app.to_string(),
            windows: ids.iter().map(|&id| make_window(id, app)).collect(),
        }
    }

    fn three_apps() -> SwitcherSession {
        SwitcherSession::with_apps(vec![
            make_app("foot", &[1]),
            make_app("firefox", &[2, 3, 4]),
            make_app("gimp", &[5, 6]),
        ])
    }

    #[test]
    fn test_new_starts_at_next() {
        let session = three_apps();
        let state = session.state();
        assert_eq!(state.selected_index, 1);
        assert_eq!(state.item_count, 3);
        assert!(!state.thumbnails_focused);
        assert_eq!(state.current_window, None);
        assert_eq!(session.mode(), SwitcherMode::App);
    }

    #[test]
    fn test_new_single_and_empty() {
        let single = SwitcherSession::with_windows(vec![make_window(1, "foot")]);
        assert_eq!(single.state().selected_index, 0);

        let mut empty = SwitcherSession::with_windows(vec![]);
        assert!(empty.is_empty());
        assert_eq!(empty.apply(Command::SelectNext), Applied::Unchanged);
        assert!(empty.finish(false).is_empty());
    }

    #[test]
    fn test_select_wraps() {
        let mut session = three_apps();
        session.apply(Command::SelectNext);
        assert_eq!(session.state().selected_index, 2);
        session.apply(Command::SelectNext);
        assert_eq!(session.state().selected_index, 0);
        session.apply(Command::SelectPrevious);
        assert_eq!(session.state().selected_index, 2);
    }

    #[test]
    fn test_thumbnail_navigation() {
        let mut session = three_apps();
        assert_eq!(session.apply(Command::EnterThumbnailMode), Applied::Changed);
        assert!(session.state().thumbnails_focused);
        assert_eq!(session.state().current_window, Some(0));

        session.apply(Command::SelectWindowInCurrentApp(WindowTarget::Previous));
        assert_eq!(session.state().current_window, Some(2));
        session.apply(Command::SelectWindowInCurrentApp(WindowTarget::Next));
        assert_eq!(session.state().current_window, Some(0));
        assert_eq!(session.highlighted_window().map(|w| w.id), Some(2));

        // Moving to another app leaves the thumbnails
        session.apply(Command::SelectNext);
        assert!(!session.state().thumbnails_focused);
        assert_eq!(session.state().current_window, None);
    }

    #[test]
    fn test_enter_thumbnails_again_returns_to_app() {
        let mut session = three_apps();
        session.apply(Command::EnterThumbnailMode);
        session.apply(Command::SelectWindowInCurrentApp(WindowTarget::Next));
        session.apply(Command::EnterThumbnailMode);

        let state = session.state();
        assert!(!state.thumbnails_focused);
        assert_eq!(state.current_window, None);
        // Group stays listed under the app, with no window marked
        let lines = session.lines();
        assert_eq!(lines.len(), 6);
        assert!(lines[1].starts_with(">>> firefox"));
        assert!(!lines.iter().any(|l| l.contains(" >> [")));
    }

    #[test]
    fn test_quit_application_removes_it() {
        let mut session = three_apps();
        assert_eq!(session.apply(Command::QuitApplication(1)), Applied::Quit(vec![2, 3, 4]));
        assert_eq!(session.len(), 2);
        // The following app moves up into the selected slot
        assert_eq!(session.state().selected_index, 1);
        assert_eq!(session.finish(true), vec![5]);

        assert_eq!(session.apply(Command::QuitApplication(7)), Applied::Unchanged);
    }

    #[test]
    fn test_quit_before_selection_keeps_selected_app() {
        let mut session = three_apps();
        session.apply(Command::SelectNext); // gimp
        session.apply(Command::QuitApplication(0));
        assert_eq!(session.state().selected_index, 1);
        assert_eq!(session.finish(true), vec![5]);
    }

    #[test]
    fn test_close_window_in_group() {
        let mut session = three_apps();
        session.apply(Command::EnterThumbnailMode);
        session.apply(Command::SelectWindowInCurrentApp(WindowTarget::Previous));

        let applied = session.apply(Command::CloseWindow { item: 1, window: Some(2) });
        assert_eq!(applied, Applied::Close(4));
        assert_eq!(session.state().current_window, Some(1));
        assert!(session.state().thumbnails_focused);
    }

    #[test]
    fn test_close_last_window_removes_app() {
        let mut session = SwitcherSession::with_apps(vec![make_app("foot", &[1]), make_app("gimp", &[5])]);
        session.apply(Command::EnterThumbnailMode);

        assert_eq!(session.apply(Command::CloseWindow { item: 1, window: Some(0) }), Applied::Close(5));
        assert_eq!(session.len(), 1);
        assert_eq!(session.state().selected_index, 0);
        assert!(!session.state().thumbnails_focused);
    }

    #[test]
    fn test_close_out_of_range_is_silent() {
        let mut session = three_apps();
        assert_eq!(session.apply(Command::CloseWindow { item: 1, window: None }), Applied::Unchanged);
        assert_eq!(session.apply(Command::CloseWindow { item: 1, window: Some(9) }), Applied::Unchanged);
        assert_eq!(session.apply(Command::CloseWindow { item: 9, window: Some(0) }), Applied::Unchanged);
        assert_eq!(session.len(), 3);
    }

    #[test]
    fn test_close_in_window_list() {
        let mut session = SwitcherSession::with_windows(vec![
            make_window(1, "foot"),
            make_window(2, "firefox"),
            make_window(3, "gimp"),
        ]);
        assert_eq!(session.apply(Command::CloseWindow { item: 1, window: None }), Applied::Close(2));
        assert_eq!(session.len(), 2);
        assert_eq!(session.state().selected_index, 1);
        assert_eq!(session.finish(false), vec![3]);
    }

    #[test]
    fn test_window_list_ignores_group_commands() {
        let mut session = SwitcherSession::with_windows(vec![make_window(1, "foot"), make_window(2, "gimp")]);
        assert_eq!(session.apply(Command::EnterThumbnailMode), Applied::Unchanged);
        assert_eq!(
            session.apply(Command::SelectWindowInCurrentApp(WindowTarget::First)),
            Applied::Unchanged
        );
        assert_eq!(session.apply(Command::QuitApplication(0)), Applied::Unchanged);
        assert_eq!(session.apply(Command::Propagate), Applied::Unchanged);
    }

    #[test]
    fn test_hover() {
        let mut session = three_apps();
        assert_eq!(session.hover(2, true), Applied::Unchanged);
        assert_eq!(session.state().selected_index, 1);
        assert_eq!(session.hover(2, false), Applied::Changed);
        assert_eq!(session.state().selected_index, 2);
        assert_eq!(session.hover(5, false), Applied::Unchanged);
    }

    #[test]
    fn test_finish_raise_first_only() {
        let mut session = three_apps();
        assert_eq!(session.finish(true), vec![2]);

        session.apply(Command::EnterThumbnailMode);
        session.apply(Command::SelectWindowInCurrentApp(WindowTarget::Next));
        assert_eq!(session.finish(true), vec![3]);
    }

    #[test]
    fn test_finish_raises_whole_app() {
        let session = three_apps();
        // Most recent window last so it ends up focused
        assert_eq!(session.finish(false), vec![4, 3, 2]);
    }

    #[test]
    fn test_lines_mark_selection() {
        let mut session = three_apps();
        session.apply(Command::EnterThumbnailMode);
        let lines = session.lines();
        assert_eq!(lines.len(), 6);
        assert!(lines[1].starts_with("    firefox"));
        assert!(lines[2].contains(" >> [2]"));
    }
}
