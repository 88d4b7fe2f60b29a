mod config;
mod daemon;
mod dispatcher;
mod ipc;
mod keysym;
mod session;
mod socket_client;
mod socket_server;
mod sway_client;
mod window_manager;

use anyhow::{Context, Result};
use config::{Command, Config, Settings};
use daemon::Daemon;
use ipc::IpcCommand;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info};

/// Get the path to the pidfile
fn get_pidfile_path() -> Result<PathBuf> {
    // Try to use XDG_RUNTIME_DIR, fall back to ~/.cache
    let runtime_dir = dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .context("Could not determine runtime directory")?;

    Ok(runtime_dir.join("alttab-mod.pid"))
}

/// Check if another instance is already running
fn check_pidfile() -> Result<()> {
    let pidfile = get_pidfile_path()?;

    if pidfile.exists() {
        let pid_str = fs::read_to_string(&pidfile).context("Failed to read pidfile")?;
        let pid: u32 = pid_str.trim().parse().context("Invalid PID in pidfile")?;

        if process_exists(pid) {
            anyhow::bail!(
                "Another instance of alttab-mod is already running (PID: {}). \
                 If this is incorrect, remove the pidfile at: {}",
                pid,
                pidfile.display()
            );
        } else {
            info!("Removing stale pidfile (PID {} not found)", pid);
            if let Err(e) = fs::remove_file(&pidfile) {
                tracing::warn!("Failed to remove stale pidfile: {}", e);
            }
        }
    }

    Ok(())
}

/// Check if a process with the given PID exists
fn process_exists(pid: u32) -> bool {
    // Sway is Linux-only, so /proc is available
    PathBuf::from(format!("/proc/{}", pid)).exists()
}

fn create_pidfile() -> Result<PidfileGuard> {
    let pidfile = get_pidfile_path()?;
    let pid = std::process::id();

    fs::write(&pidfile, pid.to_string()).context("Failed to write pidfile")?;

    info!("Created pidfile at {} with PID {}", pidfile.display(), pid);

    Ok(PidfileGuard { path: pidfile })
}

/// Guard that removes the pidfile when dropped
struct PidfileGuard {
    path: PathBuf,
}

impl Drop for PidfileGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            error!("Failed to remove pidfile: {}", e);
        } else {
            info!("Removed pidfile at {}", self.path.display());
        }
    }
}

/// Translate a client subcommand into its IPC form.
fn to_ipc(command: Command) -> Result<IpcCommand> {
    let ipc = match command {
        Command::Daemon => anyhow::bail!("daemon is not an IPC command"),
        Command::Show { mode } => IpcCommand::Show(mode),
        Command::Key { name } => IpcCommand::Key(name.parse()?),
        Command::Action { name } => IpcCommand::Action(name.parse()?),
        Command::Hover { index } => IpcCommand::Hover(index),
        Command::Select => IpcCommand::Select,
        Command::Cancel => IpcCommand::Cancel,
        Command::Set { key, value } => {
            // Validate locally so typos fail fast
            Settings::default()
                .set(&key, &value)
                .with_context(|| format!("Invalid setting '{} {}'", key, value))?;
            IpcCommand::Set { key, value }
        }
        Command::Status => IpcCommand::Status,
        Command::Shutdown => IpcCommand::Shutdown,
    };
    Ok(ipc)
}

fn main() -> Result<()> {
    let config = Config::parse();

    let log_level = if config.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match config.command() {
        Command::Daemon => run_daemon(config.settings),
        command => socket_client::send_command_and_exit(to_ipc(command)?),
    }
}

fn run_daemon(settings: Settings) -> Result<()> {
    info!("Starting alttab-mod daemon");
    info!("Settings: {}", serde_json::to_string(&settings)?);

    check_pidfile()?;
    let _pidfile_guard = create_pidfile()?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    rt.block_on(async move {
        let (ipc_rx, _socket_guard) = socket_server::start_server().await?;
        let daemon = Daemon::new(settings)?;
        daemon.run(ipc_rx).await?;
        info!("Daemon exited normally");
        Ok::<(), anyhow::Error>(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::SwitcherMode;
    use crate::keysym::BoundAction;

    #[test]
    fn test_to_ipc() {
        assert_eq!(
            to_ipc(Command::Show { mode: SwitcherMode::Window }).unwrap(),
            IpcCommand::Show(SwitcherMode::Window)
        );
        assert_eq!(
            to_ipc(Command::Action { name: "switch-group".to_string() }).unwrap(),
            IpcCommand::Action(BoundAction::SwitchGroup)
        );
        assert!(matches!(
            to_ipc(Command::Key { name: "F4".to_string() }).unwrap(),
            IpcCommand::Key(_)
        ));
    }

    #[test]
    fn test_to_ipc_rejects_bad_input() {
        assert!(to_ipc(Command::Daemon).is_err());
        assert!(to_ipc(Command::Key { name: " ".to_string() }).is_err());
        assert!(to_ipc(Command::Action { name: "jump".to_string() }).is_err());
        assert!(
            to_ipc(Command::Set {
                key: "rtl".to_string(),
                value: "sideways".to_string()
            })
            .is_err()
        );
    }

    #[test]
    fn test_pidfile_path() {
        let path = get_pidfile_path().unwrap();
        assert!(path.ends_with("alttab-mod.pid"));
    }
}
