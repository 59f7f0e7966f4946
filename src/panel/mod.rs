//! Panel controller - open/closed state, color mode, and input focus timing

mod prefs;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

pub use prefs::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore};

use crate::timer::TimerSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Light,
    Dark,
}

impl ColorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorMode::Light => "light",
            ColorMode::Dark => "dark",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            ColorMode::Light => ColorMode::Dark,
            ColorMode::Dark => ColorMode::Light,
        }
    }

    /// Stored value first, then the OS preference, then light.
    pub fn resolve(stored: Option<&str>, os_prefers_dark: Option<bool>) -> Self {
        if let Some(mode) = stored.and_then(|s| s.parse().ok()) {
            return mode;
        }
        match os_prefers_dark {
            Some(true) => ColorMode::Dark,
            _ => ColorMode::Light,
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(ColorMode::Light),
            "dark" => Ok(ColorMode::Dark),
            other => anyhow::bail!("Unknown color mode: {}", other),
        }
    }
}

/// Owns whether the chat panel is open and the persisted color mode
pub struct PanelController {
    open: bool,
    color_mode: ColorMode,
    store: Box<dyn PreferenceStore>,
    storage_key: String,
    focus_delay: Duration,
    focus_timer: TimerSlot,
}

impl PanelController {
    /// Build the controller, reading the color mode once from `store`.
    pub fn new(
        store: Box<dyn PreferenceStore>,
        storage_key: impl Into<String>,
        os_prefers_dark: Option<bool>,
        focus_delay: Duration,
    ) -> Self {
        let storage_key = storage_key.into();
        let stored = match store.get(&storage_key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to read color mode preference: {:#}", e);
                None
            }
        };
        let color_mode = ColorMode::resolve(stored.as_deref(), os_prefers_dark);
        tracing::debug!(%color_mode, "color mode initialized");

        Self {
            open: false,
            color_mode,
            store,
            storage_key,
            focus_delay,
            focus_timer: TimerSlot::new(),
        }
    }

    /// Start open without scheduling a focus request
    pub fn with_open(mut self, open: bool) -> Self {
        self.open = open;
        self
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    /// Flip open/closed. Opening schedules focus of the panel input.
    pub fn toggle(&mut self, now: Instant) -> bool {
        self.open = !self.open;
        if self.open {
            self.focus_timer.schedule(now, self.focus_delay);
        } else {
            self.focus_timer.cancel();
        }
        self.open
    }

    /// Flip the color mode and persist it. A failed write keeps the new mode.
    pub fn toggle_color_mode(&mut self) -> ColorMode {
        self.color_mode = self.color_mode.toggled();
        if let Err(e) = self.store.set(&self.storage_key, self.color_mode.as_str()) {
            tracing::warn!("Failed to persist color mode: {:#}", e);
        }
        self.color_mode
    }

    /// True once the post-open focus delay has elapsed and the panel is
    /// still open.
    pub fn focus_due(&mut self, now: Instant) -> bool {
        self.focus_timer.fire_if_due(now) && self.open
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.focus_timer.deadline()
    }
}
