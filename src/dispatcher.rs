//! Maps a key event and the current switcher state to a navigation command.
//!
//! The dispatcher never touches windows or selection state. It reads a
//! [`SwitcherState`] snapshot and returns exactly one [`Command`]; the daemon
//! performs the actual mutation.

use crate::keysym::{BoundAction, Keysym, RawKey};
use serde::{Deserialize, Serialize};

/// Which list the switcher is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SwitcherMode {
    /// Applications, each with a group of window thumbnails
    App,
    /// A flat list of windows
    Window,
}

/// Read-only view of the switcher, taken right before a key is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitcherState {
    pub selected_index: usize,
    pub thumbnails_focused: bool,
    pub current_window: Option<usize>,
    pub item_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub keysym: Keysym,
    pub bound_action: Option<BoundAction>,
}

impl KeyEvent {
    pub fn key(keysym: Keysym) -> Self {
        KeyEvent {
            keysym,
            bound_action: None,
        }
    }

    pub fn action(action: BoundAction) -> Self {
        KeyEvent {
            keysym: Keysym::Other,
            bound_action: Some(action),
        }
    }
}

/// Window to select within the currently selected application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowTarget {
    First,
    Next,
    Previous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SelectNext,
    SelectPrevious,
    SelectWindowInCurrentApp(WindowTarget),
    EnterThumbnailMode,
    QuitApplication(usize),
    /// `window` is the index inside the application's window group; `None`
    /// when the item itself is a window.
    CloseWindow { item: usize, window: Option<usize> },
    /// Not handled; the host runs its default handler.
    Propagate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Stop,
    Propagate,
}

impl Command {
    pub fn propagation(&self) -> Propagation {
        match self {
            Command::Propagate => Propagation::Propagate,
            _ => Propagation::Stop,
        }
    }
}

/// Extension point for key handling. The daemon holds one boxed handler and
/// replaces it whenever the settings change.
pub trait KeyHandler: Send + Sync {
    /// Keysym this handler sees for a raw key name.
    fn normalize(&self, key: &RawKey) -> Keysym {
        key.keysym()
    }

    fn dispatch(&self, event: KeyEvent, state: &SwitcherState, mode: SwitcherMode) -> Command;
}

/// Stock switcher keys: bound actions and the arrow keys, nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct StockHandler;

impl KeyHandler for StockHandler {
    fn normalize(&self, key: &RawKey) -> Keysym {
        Keysym::named(key.name())
    }

    fn dispatch(&self, event: KeyEvent, state: &SwitcherState, mode: SwitcherMode) -> Command {
        match (mode, event.bound_action) {
            (SwitcherMode::App, Some(BoundAction::SwitchGroup)) if state.thumbnails_focused => {
                return Command::SelectWindowInCurrentApp(WindowTarget::Next);
            }
            (SwitcherMode::App, Some(BoundAction::SwitchGroup)) => {
                return Command::SelectWindowInCurrentApp(WindowTarget::First);
            }
            (SwitcherMode::App, Some(BoundAction::SwitchGroupBackward)) => {
                return Command::SelectWindowInCurrentApp(WindowTarget::Previous);
            }
            (SwitcherMode::App, Some(BoundAction::SwitchApplications))
            | (SwitcherMode::Window, Some(BoundAction::SwitchWindows)) => return Command::SelectNext,
            (SwitcherMode::App, Some(BoundAction::SwitchApplicationsBackward))
            | (SwitcherMode::Window, Some(BoundAction::SwitchWindowsBackward)) => {
                return Command::SelectPrevious;
            }
            _ => {}
        }

        match (mode, state.thumbnails_focused, event.keysym) {
            (SwitcherMode::App, true, Keysym::Left) => {
                Command::SelectWindowInCurrentApp(WindowTarget::Previous)
            }
            (SwitcherMode::App, true, Keysym::Right) => {
                Command::SelectWindowInCurrentApp(WindowTarget::Next)
            }
            // Back to the application list
            (SwitcherMode::App, true, Keysym::Up) => Command::EnterThumbnailMode,
            (SwitcherMode::App, false, Keysym::Down) => {
                Command::SelectWindowInCurrentApp(WindowTarget::First)
            }
            (SwitcherMode::App, false, Keysym::Left) | (SwitcherMode::Window, _, Keysym::Left) => {
                Command::SelectPrevious
            }
            (SwitcherMode::App, false, Keysym::Right) | (SwitcherMode::Window, _, Keysym::Right) => {
                Command::SelectNext
            }
            _ => Command::Propagate,
        }
    }
}

/// Directional navigation with uniform quit/close keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct NavigationDispatcher {
    /// Right-to-left text direction. Left/Right move in reading order.
    pub rtl: bool,
}

impl NavigationDispatcher {
    pub fn new(rtl: bool) -> Self {
        NavigationDispatcher { rtl }
    }

    fn dispatch_app(&self, event: KeyEvent, state: &SwitcherState) -> Command {
        // Bound actions win: the same key can arrive pre-resolved depending on modifiers.
        match event.bound_action {
            Some(BoundAction::SwitchGroup) => {
                let target = if state.thumbnails_focused {
                    WindowTarget::Next
                } else {
                    WindowTarget::First
                };
                return Command::SelectWindowInCurrentApp(target);
            }
            Some(BoundAction::SwitchGroupBackward) => {
                return Command::SelectWindowInCurrentApp(WindowTarget::Previous);
            }
            Some(BoundAction::SwitchApplications) => return Command::SelectNext,
            Some(BoundAction::SwitchApplicationsBackward) => return Command::SelectPrevious,
            Some(BoundAction::SwitchWindows | BoundAction::SwitchWindowsBackward) | None => {}
        }

        if state.thumbnails_focused {
            return match event.keysym {
                Keysym::Left => Command::SelectWindowInCurrentApp(WindowTarget::Previous),
                Keysym::Right => Command::SelectWindowInCurrentApp(WindowTarget::Next),
                Keysym::Up => Command::EnterThumbnailMode,
                Keysym::Quit | Keysym::Close => Command::CloseWindow {
                    item: state.selected_index,
                    window: state.current_window,
                },
                _ => Command::Propagate,
            };
        }

        match event.keysym {
            Keysym::Quit => Command::QuitApplication(state.selected_index),
            Keysym::Left => Command::SelectPrevious,
            Keysym::Right => Command::SelectNext,
            Keysym::Down => Command::EnterThumbnailMode,
            _ => Command::Propagate,
        }
    }

    fn dispatch_window(&self, event: KeyEvent, state: &SwitcherState) -> Command {
        match event.bound_action {
            Some(BoundAction::SwitchWindows) => return Command::SelectNext,
            Some(BoundAction::SwitchWindowsBackward) => return Command::SelectPrevious,
            _ => {}
        }

        match (event.keysym, self.rtl) {
            (Keysym::Left, false) | (Keysym::Right, true) => Command::SelectPrevious,
            (Keysym::Right, false) | (Keysym::Left, true) => Command::SelectNext,
            (Keysym::Close | Keysym::Quit, _) => Command::CloseWindow {
                item: state.selected_index,
                window: None,
            },
            _ => Command::Propagate,
        }
    }
}

impl KeyHandler for NavigationDispatcher {
    fn dispatch(&self, event: KeyEvent, state: &SwitcherState, mode: SwitcherMode) -> Command {
        match mode {
            SwitcherMode::App => self.dispatch_app(event, state),
            SwitcherMode::Window => self.dispatch_window(event, state),
        }
    }
}
