use crate::config::{SettingError, Settings};
use crate::dispatcher::{KeyEvent, KeyHandler, Propagation, SwitcherMode};
use crate::ipc::{DaemonStatus, IpcCommand, IpcResponse};
use crate::keysym::{BoundAction, Keysym, RawKey};
use crate::session::{Applied, SwitcherSession};
use crate::socket_server::IpcRequest;
use crate::window_manager::WindowManager;
use anyhow::Result;
use futures_lite::stream::StreamExt;
use std::time::Duration;
use swayipc_async::{Connection, Event, EventType, WindowChange};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
enum WindowEvent {
    Focus(i64),
    Close(i64),
}

/// Side effect requested by the controller, carried out by the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Focus(i64),
    Kill(i64),
    /// Print the popup listing
    Redraw,
    /// The session ended
    Hide,
}

/// Switching logic without any Sway access: turns IPC input into effects.
pub struct Controller {
    settings: Settings,
    handler: Box<dyn KeyHandler>,
    session: Option<SwitcherSession>,
    popup_visible: bool,
}

impl Controller {
    pub fn new(settings: Settings) -> Self {
        let handler = settings.handler();
        Controller {
            settings,
            handler,
            session: None,
            popup_visible: false,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_switching(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&SwitcherSession> {
        self.session.as_ref()
    }

    /// Start a session, ending any session still running. Returns the
    /// effects of that ending and the delay after which the popup should
    /// appear, or `None` when there is nothing to switch to.
    pub fn begin(&mut self, session: SwitcherSession) -> (Vec<Effect>, Option<Duration>) {
        let effects = self.end();
        if session.is_empty() {
            info!("No windows to switch to");
            return (effects, None);
        }
        info!("Starting {:?} switcher with {} items", session.mode(), session.len());
        self.session = Some(session);
        (effects, Some(self.settings.popup_delay()))
    }

    /// The popup delay elapsed.
    pub fn popup_due(&mut self) -> Vec<Effect> {
        if self.session.is_none() || self.popup_visible {
            return Vec::new();
        }
        self.popup_visible = true;
        vec![Effect::Redraw]
    }

    /// A raw key press, normalized the way the active handler expects.
    pub fn press(&mut self, key: &RawKey) -> Vec<Effect> {
        let keysym = self.handler.normalize(key);
        debug!("Key {} normalized to {:?}", key.name(), keysym);
        self.key(keysym)
    }

    pub fn key(&mut self, keysym: Keysym) -> Vec<Effect> {
        self.dispatch(KeyEvent::key(keysym))
    }

    pub fn action(&mut self, action: BoundAction) -> Vec<Effect> {
        self.dispatch(KeyEvent::action(action))
    }

    fn dispatch(&mut self, event: KeyEvent) -> Vec<Effect> {
        let Some(session) = self.session.as_mut() else {
            debug!("Ignoring {:?} outside a session", event);
            return Vec::new();
        };

        let command = self.handler.dispatch(event, &session.state(), session.mode());
        debug!("{:?} -> {:?}", event, command);

        match command.propagation() {
            Propagation::Propagate => self.default_key(event.keysym),
            Propagation::Stop => {
                let applied = session.apply(command);
                self.effects_for(applied)
            }
        }
    }

    /// Stock behavior for keys the handler did not take.
    fn default_key(&mut self, keysym: Keysym) -> Vec<Effect> {
        match keysym {
            Keysym::Escape => self.cancel(),
            Keysym::Return => self.select(),
            _ => Vec::new(),
        }
    }

    pub fn hover(&mut self, index: usize) -> Vec<Effect> {
        let disabled = self.settings.disable_hover_select;
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        let applied = session.hover(index, disabled);
        self.effects_for(applied)
    }

    fn effects_for(&mut self, applied: Applied) -> Vec<Effect> {
        let mut effects = Vec::new();
        match applied {
            Applied::Unchanged => return effects,
            Applied::Changed => {
                if self.settings.focus_on_select
                    && let Some(window) = self.session.as_ref().and_then(|s| s.highlighted_window())
                {
                    effects.push(Effect::Focus(window.id));
                }
            }
            Applied::Quit(ids) => effects.extend(ids.into_iter().map(Effect::Kill)),
            Applied::Close(id) => effects.push(Effect::Kill(id)),
        }

        if self.session.as_ref().is_some_and(SwitcherSession::is_empty) {
            effects.extend(self.end());
        } else if self.popup_visible {
            effects.push(Effect::Redraw);
        }
        effects
    }

    pub fn select(&mut self) -> Vec<Effect> {
        let Some(session) = self.session.as_ref() else {
            return Vec::new();
        };
        let mut effects: Vec<Effect> = session
            .finish(self.settings.raise_first_window_only)
            .into_iter()
            .map(Effect::Focus)
            .collect();
        if effects.is_empty() {
            debug!("Selected item has no window to activate");
        }
        effects.extend(self.end());
        effects
    }

    pub fn cancel(&mut self) -> Vec<Effect> {
        if self.session.is_none() {
            return Vec::new();
        }
        info!("Switching cancelled");
        self.end()
    }

    fn end(&mut self) -> Vec<Effect> {
        self.session = None;
        let was_visible = std::mem::take(&mut self.popup_visible);
        if was_visible { vec![Effect::Hide] } else { Vec::new() }
    }

    /// Update one setting and re-derive everything that depends on it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingError> {
        self.settings.set(key, value)?;
        self.handler = self.settings.handler();
        info!("Settings changed: {} = {}", key, value);
        Ok(())
    }

    pub fn status(&self) -> DaemonStatus {
        let state = self.session.as_ref().map(SwitcherSession::state);
        DaemonStatus {
            switching: self.session.is_some(),
            mode: self.session.as_ref().map(SwitcherSession::mode),
            item_count: state.map_or(0, |s| s.item_count),
            selected_index: state.map(|s| s.selected_index),
            thumbnails_focused: state.is_some_and(|s| s.thumbnails_focused),
            current_window: state.and_then(|s| s.current_window),
            popup_visible: self.popup_visible,
        }
    }
}

pub struct Daemon {
    window_manager: WindowManager,
    controller: Controller,
    popup_deadline: Option<Instant>,
}

impl Daemon {
    pub fn new(settings: Settings) -> Result<Self> {
        let window_manager = WindowManager::new()?;

        Ok(Daemon {
            window_manager,
            controller: Controller::new(settings),
            popup_deadline: None,
        })
    }

    /// Main event loop
    pub async fn run(mut self, mut ipc_rx: mpsc::UnboundedReceiver<IpcRequest>) -> Result<()> {
        info!("Starting daemon event loop");

        let (window_tx, mut window_rx) = mpsc::unbounded_channel();

        let sway_events = tokio::spawn(async move {
            if let Err(e) = Self::monitor_sway_events(window_tx).await {
                error!("Sway event monitoring error: {}", e);
            }
        });

        loop {
            let deadline = self.popup_deadline;
            let popup_timer = sleep_until(deadline.unwrap_or_else(Instant::now));

            tokio::select! {
                Some(request) = ipc_rx.recv() => {
                    if request.command == IpcCommand::Shutdown {
                        info!("Shutdown requested");
                        request.respond(IpcResponse::Ok);
                        break;
                    }
                    let response = self.handle_command(request.command.clone());
                    request.respond(response);
                }
                Some(window_event) = window_rx.recv() => {
                    self.handle_window_event(window_event);
                }
                _ = popup_timer, if deadline.is_some() => {
                    self.popup_deadline = None;
                    let effects = self.controller.popup_due();
                    self.execute(effects);
                }
                else => {
                    info!("All channels closed, shutting down");
                    break;
                }
            }
        }

        sway_events.abort();
        Ok(())
    }

    fn handle_command(&mut self, command: IpcCommand) -> IpcResponse {
        debug!("IPC command: {}", command);

        let effects = match command {
            IpcCommand::Show(mode) => {
                if let Err(e) = self.start_switching(mode) {
                    error!("Failed to start switching: {:#}", e);
                    return IpcResponse::Error(e.to_string());
                }
                Vec::new()
            }
            IpcCommand::Key(key) => self.controller.press(&key),
            IpcCommand::Action(action) => self.controller.action(action),
            IpcCommand::Hover(index) => self.controller.hover(index),
            IpcCommand::Select => self.controller.select(),
            IpcCommand::Cancel => self.controller.cancel(),
            IpcCommand::Set { key, value } => {
                if let Err(e) = self.controller.set(&key, &value) {
                    return IpcResponse::Error(e.to_string());
                }
                Vec::new()
            }
            IpcCommand::Status => return IpcResponse::Status(self.controller.status()),
            // Handled by the event loop
            IpcCommand::Shutdown => Vec::new(),
        };

        self.execute(effects);
        if !self.controller.is_switching() {
            self.popup_deadline = None;
        }
        IpcResponse::Ok
    }

    fn start_switching(&mut self, mode: SwitcherMode) -> Result<()> {
        self.window_manager.refresh()?;

        let settings = self.controller.settings();
        let session = match mode {
            SwitcherMode::App => SwitcherSession::with_apps(self.window_manager.candidate_apps(settings)),
            SwitcherMode::Window => {
                SwitcherSession::with_windows(self.window_manager.candidate_windows(settings))
            }
        };

        self.popup_deadline = None;
        let (effects, delay) = self.controller.begin(session);
        self.execute(effects);
        match delay {
            Some(delay) if delay.is_zero() => {
                let effects = self.controller.popup_due();
                self.execute(effects);
            }
            Some(delay) => self.popup_deadline = Some(Instant::now() + delay),
            None => {}
        }
        Ok(())
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Focus(window_id) => {
                    if let Err(e) = self.window_manager.focus_window(window_id) {
                        warn!("Failed to focus window {}: {}", window_id, e);
                        continue;
                    }
                    // Update MRU order immediately (don't wait for Sway event)
                    self.window_manager.on_focus(window_id);
                }
                Effect::Kill(window_id) => {
                    if let Err(e) = self.window_manager.kill_window(window_id) {
                        warn!("Failed to close window {}: {}", window_id, e);
                    }
                }
                Effect::Redraw => self.print_switcher(),
                Effect::Hide => eprintln!("=== Switcher closed ===\n"),
            }
        }
    }

    fn print_switcher(&self) {
        let Some(session) = self.controller.session() else {
            return;
        };
        eprintln!("\n=== Switcher ===");
        for line in session.lines() {
            eprintln!("{}", line);
        }
        eprintln!("================\n");
    }

    fn handle_window_event(&mut self, event: WindowEvent) {
        match event {
            // During switching, focus changes come from us; keep MRU stable
            WindowEvent::Focus(window_id) if !self.controller.is_switching() => {
                debug!("Window {} focused, updating MRU order", window_id);
                self.window_manager.on_focus(window_id);
            }
            WindowEvent::Focus(_) => {}
            WindowEvent::Close(window_id) => {
                debug!("Window {} closed", window_id);
                self.window_manager.on_close(window_id);
            }
        }
    }

    /// Monitor Sway events for window changes
    async fn monitor_sway_events(window_tx: mpsc::UnboundedSender<WindowEvent>) -> Result<()> {
        let subs = [EventType::Window];
        let mut events = Connection::new().await?.subscribe(subs).await?;

        info!("Subscribed to Sway window events");

        while let Some(event) = events.next().await {
            if let Event::Window(e) = event? {
                let window_event = match e.change {
                    WindowChange::Focus => WindowEvent::Focus(e.container.id),
                    WindowChange::Close => WindowEvent::Close(e.container.id),
                    _ => continue,
                };
                if let Err(e) = window_tx.send(window_event) {
                    error!("Failed to send window event: {}", e);
                    break;
                }
            }
        }

        Ok(())
    }
}
