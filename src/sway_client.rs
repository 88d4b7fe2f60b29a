//! Sway IPC abstraction for testability.

use anyhow::{Context, Result};
use swayipc::{Connection, Node, Workspace};
use tracing::warn;

/// Sway IPC operations used by the window manager.
pub trait SwayClient {
    /// Get the full window tree from Sway
    fn get_tree(&mut self) -> Result<Node>;

    /// Get the list of workspaces
    fn get_workspaces(&mut self) -> Result<Vec<Workspace>>;

    /// Focus a window by its container ID
    fn focus_window(&mut self, window_id: i64) -> Result<()>;

    /// Ask a window to close
    fn kill_window(&mut self, window_id: i64) -> Result<()>;
}

pub struct RealSwayClient {
    connection: Connection,
}

impl RealSwayClient {
    pub fn new() -> Result<Self> {
        let connection = Connection::new().context("Failed to connect to Sway IPC")?;
        Ok(RealSwayClient { connection })
    }

    fn run_for_window(&mut self, window_id: i64, command: &str) -> Result<()> {
        let outcomes = self
            .connection
            .run_command(format!("[con_id={}] {}", window_id, command))?;
        for outcome in outcomes {
            if let Err(e) = outcome {
                warn!("Sway rejected '{}' for window {}: {}", command, window_id, e);
            }
        }
        Ok(())
    }
}

impl SwayClient for RealSwayClient {
    fn get_tree(&mut self) -> Result<Node> {
        Ok(self.connection.get_tree()?)
    }

    fn get_workspaces(&mut self) -> Result<Vec<Workspace>> {
        Ok(self.connection.get_workspaces()?)
    }

    fn focus_window(&mut self, window_id: i64) -> Result<()> {
        self.run_for_window(window_id, "focus")
    }

    fn kill_window(&mut self, window_id: i64) -> Result<()> {
        self.run_for_window(window_id, "kill")
    }
}
