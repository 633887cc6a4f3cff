//! Process-wide console state: color mode and server availability.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use crate::error::{Error, Result};
use crate::store::{AVAILABLE_KEY, COLOR_KEY, Storage};

/// Terminal color scheme.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum ColorMode {
    Light,
    #[default]
    Dark,
}

impl ColorMode {
    /// The other mode.
    pub fn toggled(self) -> Self {
        match self {
            ColorMode::Light => ColorMode::Dark,
            ColorMode::Dark => ColorMode::Light,
        }
    }

    /// The persisted spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            ColorMode::Light => "light",
            ColorMode::Dark => "dark",
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "light" => Ok(ColorMode::Light),
            "dark" => Ok(ColorMode::Dark),
            _ => Err(Error::validation(
                format!("unknown color mode: {s}"),
                Some(COLOR_KEY.to_string()),
            )),
        }
    }
}

/// Color mode and availability, mirrored into the key-value store.
///
/// Shared between the prober task and the command dispatcher; each accessor
/// writes through to storage.
pub struct SessionState {
    storage: Storage,
    dark: AtomicBool,
    available: AtomicBool,
}

impl SessionState {
    /// Read the persisted state, writing defaults (`dark`, unavailable) for
    /// keys that are missing or hold something unrecognizable.
    pub fn initialize(storage: Storage) -> Result<Self> {
        let color = match storage.get(COLOR_KEY) {
            Some(Value::String(s)) => s.parse::<ColorMode>().ok(),
            _ => None,
        };
        let color = match color {
            Some(color) => color,
            None => {
                storage.set(COLOR_KEY, Value::from(ColorMode::default().as_str()))?;
                ColorMode::default()
            }
        };
        let available = match storage.get(AVAILABLE_KEY) {
            Some(Value::Bool(available)) => available,
            _ => {
                storage.set(AVAILABLE_KEY, Value::Bool(false))?;
                false
            }
        };
        Ok(Self {
            storage,
            dark: AtomicBool::new(color == ColorMode::Dark),
            available: AtomicBool::new(available),
        })
    }

    /// The storage this state writes through to.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Current color mode.
    pub fn color_mode(&self) -> ColorMode {
        if self.dark.load(Ordering::Relaxed) {
            ColorMode::Dark
        } else {
            ColorMode::Light
        }
    }

    /// Set and persist the color mode.
    pub fn set_color_mode(&self, mode: ColorMode) -> Result<()> {
        self.dark.store(mode == ColorMode::Dark, Ordering::Relaxed);
        self.storage.set(COLOR_KEY, Value::from(mode.as_str()))
    }

    /// Flip and persist the color mode, returning the new mode.
    pub fn toggle_color_mode(&self) -> Result<ColorMode> {
        let mode = self.color_mode().toggled();
        self.set_color_mode(mode)?;
        Ok(mode)
    }

    /// Whether the last probe found the server.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    /// Set and persist availability.
    pub fn set_available(&self, available: bool) -> Result<()> {
        self.available.store(available, Ordering::Relaxed);
        self.storage.set(AVAILABLE_KEY, Value::Bool(available))
    }
}
