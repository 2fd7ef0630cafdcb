//! Local configuration for QuickShare.
//!
//! This is the client's own configuration (which engine to launch, history
//! retention, display texts). It is unrelated to the engine-side
//! [`SettingsDocument`](crate::settings::SettingsDocument), which the core
//! never persists itself.
//!
//! ## Where it lives
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/quickshare/config.toml` |
//! | macOS | `~/Library/Application Support/QuickShare/config.toml` |
//! | Windows | `%APPDATA%\QuickShare\config.toml` |
//!
//! ## Example
//!
//! ```toml
//! [engine]
//! command = "quickshare-engine"
//! args = ["--stdio"]
//! request_timeout = "45s"
//!
//! [history]
//! max_entries = 200
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::bridge::DEFAULT_REQUEST_TIMEOUT;
use crate::error::{Error, Result};
use crate::manifest::DEFAULT_PENDING_LABEL;

const CONFIG_FILE: &str = "config.toml";

/// Client configuration, one TOML table per section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transfer engine settings
    pub engine: EngineConfig,
    /// History settings
    pub history: HistoryConfig,
    /// Display settings
    pub ui: UiConfig,
}

/// How to reach the transfer engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine executable; `None` runs without an engine
    pub command: Option<String>,
    /// Arguments passed to the engine
    pub args: Vec<String>,
    /// Upper bound for a single engine request
    #[serde(with = "timeout_text")]
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// What gets kept in the transfer history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Record finished transfers
    pub enabled: bool,
    /// Records kept before the oldest are dropped
    pub max_entries: usize,
    /// Prune records older than this many days on open
    pub auto_clear_days: Option<u32>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 200,
            auto_clear_days: None,
        }
    }
}

/// Display texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Shown when no files are selected
    pub empty_state_text: String,
    /// Status label of freshly selected items
    pub pending_label: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            empty_state_text: "No files selected".to_string(),
            pending_label: DEFAULT_PENDING_LABEL.to_string(),
        }
    }
}

impl Config {
    /// Read `config.toml` from the platform config directory.
    ///
    /// No file means defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Read a config file, falling back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&text)
            .map_err(|e| Error::ConfigError(format!("{}: {e}", path.display())))
    }

    /// Write `config.toml` to the platform config directory.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Write a config file, creating missing parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let text =
            toml::to_string_pretty(self).map_err(|e| Error::ConfigError(e.to_string()))?;
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, text)?;
        Ok(())
    }

    /// Platform config directory, if there is one.
    #[must_use]
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "quickshare", "QuickShare")
            .map(|dirs| dirs.config_dir().to_owned())
    }

    /// `<config dir>/config.toml`, or `./config.toml` without one.
    #[must_use]
    pub fn config_path() -> PathBuf {
        Self::config_dir().map_or_else(|| PathBuf::from(CONFIG_FILE), |dir| dir.join(CONFIG_FILE))
    }
}

/// Parse `"45s"`, `"250ms"`, `"2m"` or bare seconds.
fn parse_timeout(text: &str) -> Option<Duration> {
    let text = text.trim();
    let digits = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());
    let (value, unit) = text.split_at(digits);
    let value: u64 = value.parse().ok()?;
    match unit.trim() {
        "ms" => Some(Duration::from_millis(value)),
        "" | "s" => Some(Duration::from_secs(value)),
        "m" => value.checked_mul(60).map(Duration::from_secs),
        _ => None,
    }
}

/// The text form [`parse_timeout`] reads back: whole seconds as `"45s"`,
/// anything finer as `"250ms"`.
#[must_use]
pub fn format_timeout(value: Duration) -> String {
    if value.subsec_millis() == 0 {
        format!("{}s", value.as_secs())
    } else {
        format!("{}ms", value.as_millis())
    }
}

mod timeout_text {
    use std::time::Duration;

    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timeout(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(d)?;
        super::parse_timeout(&text)
            .ok_or_else(|| de::Error::custom(format!("bad timeout {text:?}, expected e.g. \"45s\"")))
    }
}
