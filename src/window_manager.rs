use anyhow::Result;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use swayipc::{Node, NodeType, WindowProperties};
use tracing::{debug, warn};

use crate::config::Settings;
use crate::sway_client::{RealSwayClient, SwayClient};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub id: i64,
    pub app_id: Option<String>,
    pub title: String,
    pub workspace: String,
    pub output: String,
    pub window_class: Option<String>, // WM_CLASS for X11 windows
    pub transient_for: Option<i64>,
}

/// Where a node sits in the tree while walking it.
#[derive(Debug, Clone, Default)]
struct Location<'a> {
    workspace: Cow<'a, str>,
    output: Cow<'a, str>,
}

impl WindowInfo {
    fn from_node(node: &Node, location: &Location<'_>) -> Option<Self> {
        // Windows have a pid, containers don't
        if node.node_type != NodeType::Con && node.node_type != NodeType::FloatingCon {
            return None;
        }
        node.pid?;

        let props = node.window_properties.as_ref();
        Some(WindowInfo {
            id: node.id,
            app_id: node.app_id.clone(),
            title: node.name.clone().unwrap_or_default(),
            workspace: location.workspace.clone().into_owned(),
            output: location.output.clone().into_owned(),
            window_class: props.and_then(|p| p.class.clone()),
            transient_for: props.and_then(transient_parent),
        })
    }

    /// Key that groups windows of the same application.
    pub fn app_key(&self) -> String {
        self.app_id
            .clone()
            .or_else(|| self.window_class.clone())
            .unwrap_or_else(|| format!("window-{}", self.id))
    }
}

/// An application in the app switcher, with its windows cached in MRU order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppEntry {
    pub app_id: String,
    pub windows: Vec<WindowInfo>,
}

/// Manages window list and MRU ordering using Sway IPC.
pub struct WindowManager<C: SwayClient = RealSwayClient> {
    client: C,
    windows: Vec<WindowInfo>,
    current_workspace: Option<String>,
    current_output: Option<String>,
}

impl WindowManager<RealSwayClient> {
    /// Create a new WindowManager with a real Sway connection
    pub fn new() -> Result<Self> {
        let client = RealSwayClient::new()?;
        Self::with_client(client)
    }
}

impl<C: SwayClient> WindowManager<C> {
    pub fn with_client(client: C) -> Result<Self> {
        let mut manager = WindowManager {
            client,
            windows: Vec::new(),
            current_workspace: None,
            current_output: None,
        };
        manager.refresh()?;
        Ok(manager)
    }

    /// Refresh the window list from Sway, keeping MRU order for known windows.
    pub fn refresh(&mut self) -> Result<()> {
        let tree = self.client.get_tree()?;
        let focused_id = find_focused_window(&tree);

        let old_windows = std::mem::take(&mut self.windows);
        let current_windows = collect_windows(&tree, &Location::default());

        self.windows = preserve_mru_order(old_windows, current_windows, focused_id);
        debug!(
            "Refreshed to {} windows (preserved MRU order, focused: {:?})",
            self.windows.len(),
            focused_id
        );

        // The focused workspace also tells us the focused output
        let focused = self.client.get_workspaces().map(|workspaces| {
            workspaces
                .into_iter()
                .find(|w| w.focused)
                .map(|w| (w.name, w.output))
        });
        self.set_location(focused);

        Ok(())
    }

    /// Record the focused workspace and output. Failures keep the previous
    /// location.
    fn set_location(&mut self, focused: Result<Option<(String, String)>>) {
        match focused {
            Ok(Some((workspace, output))) => {
                self.current_workspace = Some(workspace);
                self.current_output = Some(output);
            }
            Ok(None) => debug!("No focused workspace reported"),
            Err(e) => warn!("Failed to query workspaces, keeping previous location: {}", e),
        }
    }

    /// Move window to front of MRU list
    pub fn on_focus(&mut self, window_id: i64) {
        if let Some(pos) = self.windows.iter().position(|w| w.id == window_id) {
            let window = self.windows.remove(pos);
            self.windows.insert(0, window);
        }
    }

    pub fn on_close(&mut self, window_id: i64) {
        self.windows.retain(|w| w.id != window_id);
    }

    /// Windows eligible for a flat window switcher.
    pub fn candidate_windows(&self, settings: &Settings) -> Vec<WindowInfo> {
        let filtered = filter_windows(
            &self.windows,
            settings,
            self.current_workspace.as_deref(),
            self.current_output.as_deref(),
        );
        collapse_transients(filtered)
    }

    /// Applications eligible for the app switcher.
    pub fn candidate_apps(&self, settings: &Settings) -> Vec<AppEntry> {
        group_by_app(self.candidate_windows(settings))
    }

    pub fn focus_window(&mut self, window_id: i64) -> Result<()> {
        self.client.focus_window(window_id)
    }

    pub fn kill_window(&mut self, window_id: i64) -> Result<()> {
        self.client.kill_window(window_id)?;
        self.on_close(window_id);
        Ok(())
    }
}

/// Sway reports the parent as a 32-bit X11 window id.
fn transient_parent(props: &WindowProperties) -> Option<i64> {
    props.transient_for.map(i64::from)
}

/// Apply the workspace and monitor restrictions.
///
/// A restriction whose reference (focused workspace or output) is unknown is
/// not applied.
#[must_use]
pub fn filter_windows(
    windows: &[WindowInfo],
    settings: &Settings,
    current_workspace: Option<&str>,
    current_output: Option<&str>,
) -> Vec<WindowInfo> {
    windows
        .iter()
        .filter(|w| match (settings.current_workspace_only, current_workspace) {
            (true, Some(ws)) => w.workspace == ws,
            _ => true,
        })
        .filter(|w| match (settings.current_monitor_only, current_output) {
            (true, Some(output)) => w.output == output,
            _ => true,
        })
        .cloned()
        .collect()
}

/// Replace attached dialogs with their parent window and drop duplicates.
///
/// Order follows the first appearance of each resulting window, so a dialog
/// that was used more recently than its parent pulls the parent forward.
#[must_use]
pub fn collapse_transients(windows: Vec<WindowInfo>) -> Vec<WindowInfo> {
    let by_id: HashMap<i64, WindowInfo> = windows.iter().map(|w| (w.id, w.clone())).collect();
    let mut seen = HashSet::new();
    let mut result = Vec::with_capacity(windows.len());

    for window in windows {
        let root = transient_root(&window, &by_id).unwrap_or(window);
        if seen.insert(root.id) {
            result.push(root);
        }
    }

    result
}

/// Topmost known parent of a dialog. `None` for top-level windows, for
/// dialogs whose parent is not listed, and for transient cycles.
fn transient_root(window: &WindowInfo, by_id: &HashMap<i64, WindowInfo>) -> Option<WindowInfo> {
    let mut visited = HashSet::from([window.id]);
    let mut root: Option<&WindowInfo> = None;
    let mut next = window.transient_for;

    while let Some(parent) = next.and_then(|id| by_id.get(&id)) {
        if !visited.insert(parent.id) {
            return None;
        }
        root = Some(parent);
        next = parent.transient_for;
    }

    root.cloned()
}

/// Group windows by application, keeping MRU order for apps and windows.
#[must_use]
pub fn group_by_app(windows: Vec<WindowInfo>) -> Vec<AppEntry> {
    let mut apps: Vec<AppEntry> = Vec::new();
    let mut index_by_key: HashMap<String, usize> = HashMap::new();

    for window in windows {
        let key = window.app_key();
        match index_by_key.get(&key) {
            Some(&i) => apps[i].windows.push(window),
            None => {
                index_by_key.insert(key.clone(), apps.len());
                apps.push(AppEntry {
                    app_id: key,
                    windows: vec![window],
                });
            }
        }
    }

    apps
}

/// Preserve MRU order while merging old and new window lists.
///
/// The resulting list has:
/// 1. The focused window first (if any)
/// 2. Previously known windows in their MRU order (if still present), with fresh data
/// 3. Newly discovered windows at the end, in tree order
#[must_use]
fn preserve_mru_order(
    old_windows: Vec<WindowInfo>,
    current_windows: Vec<WindowInfo>,
    focused_id: Option<i64>,
) -> Vec<WindowInfo> {
    let current_by_id: HashMap<i64, &WindowInfo> =
        current_windows.iter().map(|w| (w.id, w)).collect();
    let mut result = Vec::with_capacity(current_windows.len());
    let mut added_ids = HashSet::new();

    if let Some(fid) = focused_id
        && let Some(focused_win) = current_by_id.get(&fid)
    {
        added_ids.insert(fid);
        result.push((*focused_win).clone());
    }

    for old_win in old_windows {
        if !added_ids.contains(&old_win.id)
            && let Some(fresh_win) = current_by_id.get(&old_win.id)
        {
            added_ids.insert(old_win.id);
            result.push((*fresh_win).clone());
        }
    }

    for new_win in &current_windows {
        if added_ids.insert(new_win.id) {
            result.push(new_win.clone());
        }
    }

    result
}

/// Recursively collect all windows from a Sway node tree, tracking the
/// output and workspace each window lives on.
#[must_use]
fn collect_windows<'a>(node: &'a Node, location: &Location<'a>) -> Vec<WindowInfo> {
    let mut windows = Vec::new();

    let mut here = location.clone();
    match node.node_type {
        NodeType::Output => {
            if let Some(name) = node.name.as_deref() {
                here.output = Cow::Borrowed(name);
            }
        }
        NodeType::Workspace => {
            if let Some(name) = node.name.as_deref() {
                here.workspace = Cow::Borrowed(name);
            }
        }
        _ => {}
    }

    if let Some(window) = WindowInfo::from_node(node, &here) {
        windows.push(window);
    }

    for child in node.nodes.iter().chain(&node.floating_nodes) {
        windows.extend(collect_windows(child, &here));
    }

    windows
}

#[must_use]
fn find_focused_window(node: &Node) -> Option<i64> {
    if node.focused && node.pid.is_some() {
        return Some(node.id);
    }

    node.nodes
        .iter()
        .chain(&node.floating_nodes)
        .find_map(find_focused_window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use swayipc::Workspace;

    struct OfflineClient;

    impl SwayClient for OfflineClient {
        fn get_tree(&mut self) -> Result<Node> {
            anyhow::bail!("sway is not running")
        }

        fn get_workspaces(&mut self) -> Result<Vec<Workspace>> {
            anyhow::bail!("sway is not running")
        }

        fn focus_window(&mut self, _window_id: i64) -> Result<()> {
            Ok(())
        }

        fn kill_window(&mut self, _window_id: i64) -> Result<()> {
            Ok(())
        }
    }

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

    fn placed(id: i64, workspace: &str, output: &str) -> WindowInfo {
        WindowInfo {
            workspace: workspace.to_string(),
            output: output.to_string(),
            ..make_window(id, &format!("app-{id}"))
        }
    }

    fn dialog(id: i64, parent: i64) -> WindowInfo {
        WindowInfo {
            transient_for: Some(parent),
            ..make_window(id, "dialog")
        }
    }

    fn ids(windows: &[WindowInfo]) -> Vec<i64> {
        windows.iter().map(|w| w.id).collect()
    }

    // ==================== preserve_mru_order tests ====================

    #[test]
    fn test_preserve_mru_order_empty_lists() {
        assert!(preserve_mru_order(vec![], vec![], None).is_empty());
    }

    #[test]
    fn test_preserve_mru_order_focused_window_first() {
        let old = vec![make_window(1, "a"), make_window(2, "b")];
        let current = vec![make_window(1, "a"), make_window(2, "b"), make_window(3, "c")];

        let result = preserve_mru_order(old, current, Some(3));
        assert_eq!(ids(&result), vec![3, 1, 2]);
    }

    #[test]
    fn test_preserve_mru_order_removes_closed_and_appends_new() {
        let old = vec![make_window(1, "a"), make_window(2, "b"), make_window(3, "c")];
        let current = vec![make_window(4, "d"), make_window(3, "c"), make_window(1, "a")];

        let result = preserve_mru_order(old, current, None);
        assert_eq!(ids(&result), vec![1, 3, 4]);
    }

    #[test]
    fn test_preserve_mru_order_uses_fresh_data() {
        let old = vec![make_window(1, "a")];
        let mut fresh = make_window(1, "a");
        fresh.title = "New Title".to_string();

        let result = preserve_mru_order(old, vec![fresh], None);
        assert_eq!(result[0].title, "New Title");
    }

    // ==================== filtering tests ====================

    #[test]
    fn test_filter_defaults_keep_everything() {
        let windows = vec![placed(1, "1", "DP-1"), placed(2, "2", "HDMI-A-1")];
        let result = filter_windows(&windows, &Settings::default(), Some("1"), Some("DP-1"));
        assert_eq!(ids(&result), vec![1, 2]);
    }

    #[test]
    fn test_filter_current_workspace_only() {
        let windows = vec![placed(1, "1", "DP-1"), placed(2, "2", "DP-1"), placed(3, "1", "DP-1")];
        let settings = Settings {
            current_workspace_only: true,
            ..Settings::default()
        };
        let result = filter_windows(&windows, &settings, Some("1"), Some("DP-1"));
        assert_eq!(ids(&result), vec![1, 3]);
    }

    #[test]
    fn test_filter_current_monitor_only() {
        let windows = vec![placed(1, "1", "DP-1"), placed(2, "2", "HDMI-A-1"), placed(3, "3", "DP-1")];
        let settings = Settings {
            current_monitor_only: true,
            ..Settings::default()
        };
        let result = filter_windows(&windows, &settings, Some("1"), Some("HDMI-A-1"));
        assert_eq!(ids(&result), vec![2]);
    }

    #[test]
    fn test_filter_unknown_reference_is_skipped() {
        let windows = vec![placed(1, "1", "DP-1"), placed(2, "2", "HDMI-A-1")];
        let settings = Settings {
            current_workspace_only: true,
            current_monitor_only: true,
            ..Settings::default()
        };
        let result = filter_windows(&windows, &settings, None, None);
        assert_eq!(ids(&result), vec![1, 2]);
    }

    // ==================== collapse_transients tests ====================

    #[test]
    fn test_collapse_dialog_onto_parent() {
        let windows = vec![dialog(10, 1), make_window(2, "b"), make_window(1, "a")];
        let result = collapse_transients(windows);
        assert_eq!(ids(&result), vec![1, 2]);
    }

    #[test]
    fn test_collapse_keeps_dialog_with_unknown_parent() {
        let windows = vec![dialog(10, 99), make_window(1, "a")];
        let result = collapse_transients(windows);
        assert_eq!(ids(&result), vec![10, 1]);
    }

    #[test]
    fn test_collapse_follows_chains_and_survives_cycles() {
        let windows = vec![dialog(3, 2), dialog(2, 1), make_window(1, "a")];
        assert_eq!(ids(&collapse_transients(windows)), vec![1]);

        let cyclic = vec![dialog(1, 2), dialog(2, 1)];
        assert_eq!(ids(&collapse_transients(cyclic)), vec![1, 2]);
    }

    // ==================== group_by_app tests ====================

    #[test]
    fn test_group_by_app_keeps_mru_order() {
        let windows = vec![
            make_window(1, "firefox"),
            make_window(2, "foot"),
            make_window(3, "firefox"),
        ];
        let apps = group_by_app(windows);

        assert_eq!(apps.len(), 2);
        assert_eq!(apps[0].app_id, "firefox");
        assert_eq!(ids(&apps[0].windows), vec![1, 3]);
        assert_eq!(apps[1].app_id, "foot");
    }

    #[test]
    fn test_app_key_fallbacks() {
        let mut x11 = make_window(7, "unused");
        x11.app_id = None;
        x11.window_class = Some("Gimp".to_string());
        assert_eq!(x11.app_key(), "Gimp");

        x11.window_class = None;
        assert_eq!(x11.app_key(), "window-7");
    }

    #[test]
    fn test_group_by_app_empty() {
        assert!(group_by_app(vec![]).is_empty());
    }

    #[test]
    fn test_transient_parent_widens_id() {
        let props: WindowProperties =
            serde_json::from_str(r#"{"class": "Gimp", "transient_for": 2147483647}"#).unwrap();
        assert_eq!(transient_parent(&props), Some(2_147_483_647_i64));

        let props: WindowProperties = serde_json::from_str(r#"{"class": "Gimp"}"#).unwrap();
        assert_eq!(transient_parent(&props), None);
    }

    #[test]
    fn test_failed_workspace_query_keeps_location() {
        let mut manager = WindowManager {
            client: OfflineClient,
            windows: vec![placed(1, "1", "DP-1"), placed(2, "2", "HDMI-A-1")],
            current_workspace: Some("2".to_string()),
            current_output: Some("HDMI-A-1".to_string()),
        };
        let settings = Settings {
            current_workspace_only: true,
            ..Settings::default()
        };

        let focused = manager.client.get_workspaces().map(|_| None);
        manager.set_location(focused);
        assert_eq!(manager.current_workspace.as_deref(), Some("2"));
        assert_eq!(ids(&manager.candidate_windows(&settings)), vec![2]);

        manager.set_location(Ok(Some(("1".to_string(), "DP-1".to_string()))));
        assert_eq!(manager.current_output.as_deref(), Some("DP-1"));
        assert_eq!(ids(&manager.candidate_windows(&settings)), vec![1]);

        manager.set_location(Ok(None));
        assert_eq!(manager.current_workspace.as_deref(), Some("1"));
    }
}
