use crate::dispatcher::{KeyHandler, NavigationDispatcher, StockHandler, SwitcherMode};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Delay before the switcher popup is shown, unless removed.
pub const POPUP_DELAY: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run as daemon (default if no command specified)
    Daemon,
    /// Start a switching session
    Show {
        #[arg(value_enum, default_value = "app")]
        mode: SwitcherMode,
    },
    /// Deliver a raw key press (e.g. Left, a, J, q, F4, Escape)
    Key { name: String },
    /// Deliver a bound action (e.g. switch-applications, switch-group-backward)
    Action { name: String },
    /// Pointer hovered over an item
    Hover { index: usize },
    /// Select current item and close switcher
    Select,
    /// Cancel switching without selecting
    Cancel,
    /// Change one setting on the running daemon
    Set { key: String, value: String },
    /// Query daemon status
    Status,
    /// Shutdown the daemon
    Shutdown,
}

/// Behavior toggles. Each flag enables exactly one behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq, Args, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    /// Only list windows on the focused workspace
    #[arg(long)]
    pub current_workspace_only: bool,

    /// Only list windows on the focused output
    #[arg(long)]
    pub current_monitor_only: bool,

    /// Show the popup immediately instead of after a short delay
    #[arg(long)]
    pub remove_delay: bool,

    /// Ignore pointer hover when choosing the selected item
    #[arg(long)]
    pub disable_hover_select: bool,

    /// Focus only the first window of an application instead of all of them
    #[arg(long)]
    pub raise_first_window_only: bool,

    /// Move input focus to a window as soon as it is selected
    #[arg(long)]
    pub focus_on_select: bool,

    /// Use the stock key handling: arrows and bound actions only, no
    /// WASD/hjkl navigation, no quit keys
    #[arg(long)]
    pub disabled: bool,

    /// Right-to-left layout: Left/Right move in reading order
    #[arg(long)]
    pub rtl: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingError {
    #[error("unknown setting: {0} (expected one of: {keys})", keys = Settings::KEYS.join(", "))]
    UnknownKey(String),
    #[error("invalid boolean value: {0}")]
    InvalidValue(String),
}

impl Settings {
    pub const KEYS: [&'static str; 8] = [
        "current-workspace-only",
        "current-monitor-only",
        "remove-delay",
        "disable-hover-select",
        "raise-first-window-only",
        "focus-on-select",
        "disabled",
        "rtl",
    ];

    pub fn popup_delay(&self) -> Duration {
        if self.remove_delay {
            Duration::ZERO
        } else {
            POPUP_DELAY
        }
    }

    /// Key handler for the current snapshot.
    pub fn handler(&self) -> Box<dyn KeyHandler> {
        if self.disabled {
            Box::new(StockHandler)
        } else {
            Box::new(NavigationDispatcher::new(self.rtl))
        }
    }

    /// Change one toggle by its kebab-case name.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingError> {
        let value = parse_bool(value)?;
        let slot = match key.trim().to_lowercase().replace('_', "-").as_str() {
            "current-workspace-only" => &mut self.current_workspace_only,
            "current-monitor-only" => &mut self.current_monitor_only,
            "remove-delay" => &mut self.remove_delay,
            "disable-hover-select" => &mut self.disable_hover_select,
            "raise-first-window-only" => &mut self.raise_first_window_only,
            "focus-on-select" => &mut self.focus_on_select,
            "disabled" => &mut self.disabled,
            "rtl" => &mut self.rtl,
            _ => return Err(SettingError::UnknownKey(key.trim().to_string())),
        };
        *slot = value;
        Ok(())
    }
}

fn parse_bool(value: &str) -> Result<bool, SettingError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(SettingError::InvalidValue(value.trim().to_string())),
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "alttab-mod")]
#[command(about = "Keyboard-driven app and window switcher for Sway", long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub settings: Settings,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Config {
    pub fn parse() -> Self {
        <Config as Parser>::parse()
    }

    /// Get the command, defaulting to Daemon if none specified
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Daemon)
    }
}
