use crate::dispatcher::SwitcherMode;
use crate::keysym::{BoundAction, ParseBoundActionError, ParseKeyError, RawKey};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Commands sent from CLI client to daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpcCommand {
    /// Start a switching session
    Show(SwitcherMode),
    /// A raw key press
    Key(RawKey),
    /// A bound action resolved by the compositor
    Action(BoundAction),
    /// Pointer hover over an item
    Hover(usize),
    /// Select current item and close switcher
    Select,
    /// Cancel switching without selecting
    Cancel,
    /// Change one setting
    Set { key: String, value: String },
    /// Query daemon status (for debugging)
    Status,
    /// Shutdown the daemon gracefully
    Shutdown,
}

/// Status of the running daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub switching: bool,
    pub mode: Option<SwitcherMode>,
    pub item_count: usize,
    pub selected_index: Option<usize>,
    pub thumbnails_focused: bool,
    pub current_window: Option<usize>,
    pub popup_visible: bool,
}

/// Response from daemon to CLI client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpcResponse {
    /// Command executed successfully
    Ok,
    /// Error occurred
    Error(String),
    Status(DaemonStatus),
}

pub fn get_socket_path() -> Result<PathBuf> {
    let runtime_dir = dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .context("Could not determine runtime directory")?;

    Ok(runtime_dir.join("alttab-mod.sock"))
}

/// Error returned when parsing an invalid IpcCommand string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseIpcCommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("missing argument for {0}")]
    MissingArgument(&'static str),
    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
    #[error("invalid switcher mode: {0}")]
    InvalidMode(String),
    #[error("invalid index: {0}")]
    InvalidIndex(String),
    #[error(transparent)]
    Key(#[from] ParseKeyError),
    #[error(transparent)]
    Action(#[from] ParseBoundActionError),
}

impl FromStr for IpcCommand {
    type Err = ParseIpcCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let verb = parts.next().ok_or(ParseIpcCommandError::Empty)?.to_lowercase();
        let mut arg = |name: &'static str| parts.next().ok_or(ParseIpcCommandError::MissingArgument(name));

        let command = match verb.as_str() {
            "show" => {
                // The mode is optional and defaults to the app switcher
                let mode = match arg("show") {
                    Ok(mode) => parse_mode(mode)?,
                    Err(_) => SwitcherMode::App,
                };
                IpcCommand::Show(mode)
            }
            "key" => IpcCommand::Key(arg("key")?.parse()?),
            "action" => IpcCommand::Action(arg("action")?.parse()?),
            "hover" => {
                let index = arg("hover")?;
                IpcCommand::Hover(
                    index
                        .parse()
                        .map_err(|_| ParseIpcCommandError::InvalidIndex(index.to_string()))?,
                )
            }
            "set" => IpcCommand::Set {
                key: arg("set")?.to_lowercase(),
                value: arg("set")?.to_lowercase(),
            },
            "select" => IpcCommand::Select,
            "cancel" => IpcCommand::Cancel,
            "status" => IpcCommand::Status,
            "shutdown" => IpcCommand::Shutdown,
            _ => return Err(ParseIpcCommandError::Unknown(verb.clone())),
        };

        match parts.next() {
            Some(extra) => Err(ParseIpcCommandError::UnexpectedArgument(extra.to_string())),
            None => Ok(command),
        }
    }
}

fn parse_mode(s: &str) -> Result<SwitcherMode, ParseIpcCommandError> {
    match s.to_lowercase().as_str() {
        "app" | "apps" => Ok(SwitcherMode::App),
        "window" | "windows" => Ok(SwitcherMode::Window),
        _ => Err(ParseIpcCommandError::InvalidMode(s.to_string())),
    }
}

impl fmt::Display for IpcCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpcCommand::Show(SwitcherMode::App) => write!(f, "show app"),
            IpcCommand::Show(SwitcherMode::Window) => write!(f, "show window"),
            IpcCommand::Key(key) => write!(f, "key {}", key),
            IpcCommand::Action(action) => write!(f, "action {}", action),
            IpcCommand::Hover(index) => write!(f, "hover {}", index),
            IpcCommand::Select => write!(f, "select"),
            IpcCommand::Cancel => write!(f, "cancel"),
            IpcCommand::Set { key, value } => write!(f, "set {} {}", key, value),
            IpcCommand::Status => write!(f, "status"),
            IpcCommand::Shutdown => write!(f, "shutdown"),
        }
    }
}
