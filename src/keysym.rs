//! Key name normalization.
//!
//! Raw key names arrive from the compositor's `bindsym` lines (for example
//! `alttab-mod key Left` or `alttab-mod key J`). Every alias of a direction
//! collapses onto one `Keysym` so the dispatcher only ever compares four
//! directions.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A normalized key, independent of which alias produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keysym {
    Left,
    Right,
    Up,
    Down,
    /// `q` / `Q`
    Quit,
    /// `F4`
    Close,
    /// Number row, `1` through `9`
    Number(u8),
    Escape,
    Return,
    Other,
}

impl Keysym {
    /// Normalize a raw key name. Total: unknown names yield `Keysym::Other`.
    ///
    /// Letter aliases (WASD and hjkl) are matched without regard to case, so
    /// the shifted and unshifted variant of a key map identically.
    pub fn normalize(raw: &str) -> Keysym {
        let name = raw.trim();
        let mut chars = name.chars();

        if let (Some(c), None) = (chars.next(), chars.next()) {
            return match c.to_ascii_lowercase() {
                'a' | 'h' => Keysym::Left,
                'd' | 'l' => Keysym::Right,
                'w' | 'k' => Keysym::Up,
                's' | 'j' => Keysym::Down,
                'q' => Keysym::Quit,
                '1'..='9' => Keysym::Number(c as u8 - b'0'),
                _ => Keysym::Other,
            };
        }

        Keysym::named(name)
    }

    /// Normalize only named keys (arrows, F4, Escape, Return). Single
    /// characters, including the letter aliases, yield `Keysym::Other`.
    pub fn named(raw: &str) -> Keysym {
        match raw.trim().to_ascii_lowercase().as_str() {
            "left" | "kp_left" => Keysym::Left,
            "right" | "kp_right" => Keysym::Right,
            "up" | "kp_up" => Keysym::Up,
            "down" | "kp_down" => Keysym::Down,
            "f4" => Keysym::Close,
            "escape" | "esc" => Keysym::Escape,
            "return" | "enter" | "kp_enter" => Keysym::Return,
            _ => Keysym::Other,
        }
    }
}

/// Error returned when a key name cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseKeyError {
    #[error("empty key name")]
    Empty,
    #[error("key name contains whitespace: {0:?}")]
    Whitespace(String),
}

/// A key name exactly as the user typed it, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawKey(String);

impl RawKey {
    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn keysym(&self) -> Keysym {
        Keysym::normalize(&self.0)
    }
}

impl FromStr for RawKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if name.is_empty() {
            return Err(ParseKeyError::Empty);
        }
        if name.chars().any(char::is_whitespace) {
            return Err(ParseKeyError::Whitespace(name.to_string()));
        }
        Ok(RawKey(name.to_string()))
    }
}

impl fmt::Display for RawKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// High-level action resolved by the compositor's key-binding layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundAction {
    SwitchGroup,
    SwitchGroupBackward,
    SwitchApplications,
    SwitchApplicationsBackward,
    SwitchWindows,
    SwitchWindowsBackward,
}

impl BoundAction {
    const ALL: [BoundAction; 6] = [
        BoundAction::SwitchGroup,
        BoundAction::SwitchGroupBackward,
        BoundAction::SwitchApplications,
        BoundAction::SwitchApplicationsBackward,
        BoundAction::SwitchWindows,
        BoundAction::SwitchWindowsBackward,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BoundAction::SwitchGroup => "switch-group",
            BoundAction::SwitchGroupBackward => "switch-group-backward",
            BoundAction::SwitchApplications => "switch-applications",
            BoundAction::SwitchApplicationsBackward => "switch-applications-backward",
            BoundAction::SwitchWindows => "switch-windows",
            BoundAction::SwitchWindowsBackward => "switch-windows-backward",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown bound action: {0}")]
pub struct ParseBoundActionError(pub String);

impl FromStr for BoundAction {
    type Err = ParseBoundActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase().replace('_', "-");
        BoundAction::ALL
            .into_iter()
            .find(|action| action.as_str() == name)
            .ok_or_else(|| ParseBoundActionError(s.trim().to_string()))
    }
}

impl fmt::Display for BoundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
