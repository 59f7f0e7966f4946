//! Configuration management for docsite-assist

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::affordance::AffordanceLayout;
use crate::dispatch::{GENERAL_MESSAGE_PATH, SELECTION_QUERY_PATH};
use crate::selection::SelectionBounds;

/// Environment variable overriding `backend.base_url`
pub const BACKEND_URL_ENV: &str = "DOCSITE_ASSIST_BACKEND_URL";

const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AssistConfig {
    pub backend: BackendConfig,
    pub selection: SelectionConfig,
    pub affordance: AffordanceLayout,
    pub panel: PanelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub general_path: String,
    pub selection_path: String,
    /// Unset means requests may wait forever
    pub request_timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            general_path: GENERAL_MESSAGE_PATH.to_string(),
            selection_path: SELECTION_QUERY_PATH.to_string(),
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Trimmed selections must be longer than this many characters
    pub min_chars_exclusive: usize,
    /// ...and shorter than this many
    pub max_chars_exclusive: usize,
    pub debounce_ms: u64,
    /// Unset disables auto-expiry
    pub expiry_ms: Option<u64>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        let bounds = SelectionBounds::refined();
        Self {
            min_chars_exclusive: bounds.min_exclusive,
            max_chars_exclusive: bounds.max_exclusive,
            debounce_ms: 100,
            expiry_ms: Some(5_000),
        }
    }
}

impl SelectionConfig {
    pub fn bounds(&self) -> SelectionBounds {
        SelectionBounds {
            min_exclusive: self.min_chars_exclusive,
            max_exclusive: self.max_chars_exclusive,
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn expiry(&self) -> Option<Duration> {
        self.expiry_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub title: String,
    pub initially_open: bool,
    /// Delay before focusing an input that was just mounted
    pub focus_delay_ms: u64,
    /// Preference key holding "light" or "dark"
    pub color_mode_key: String,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            title: "Physical AI Textbook Assistant".to_string(),
            initially_open: false,
            focus_delay_ms: 100,
            color_mode_key: "theme".to_string(),
        }
    }
}

impl PanelConfig {
    pub fn focus_delay(&self) -> Duration {
        Duration::from_millis(self.focus_delay_ms)
    }
}

impl AssistConfig {
    /// Load configuration from default location or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load from an explicit path, then apply environment overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        config.override_backend_url(std::env::var(BACKEND_URL_ENV).ok().as_deref());
        Ok(config)
    }

    /// Parse the file alone; a missing file yields defaults
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(AssistConfig::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Replace the backend URL unless `url` is unset or blank
    pub fn override_backend_url(&mut self, url: Option<&str>) {
        if let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) {
            tracing::debug!(%url, "backend URL overridden from environment");
            self.backend.base_url = url.to_string();
        }
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(config_dir()?.join("config.toml"))
    }

    /// Save configuration to default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

/// Platform config directory, created on first use
pub fn config_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "docsite-assist") {
        let config_dir = proj_dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;
        Ok(config_dir.to_path_buf())
    } else {
        Ok(PathBuf::from("."))
    }
}
