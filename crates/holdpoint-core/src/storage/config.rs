//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Core minutes for scalable poses
//! - Audio cue and wake-lock switches
//! - Tick scheduler and watchdog timing
//! - Remote sync and spreadsheet webhook settings
//!
//! Configuration is stored at `~/.config/holdpoint/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::{ConfigError, DatabaseError, Result};
use crate::routine::ScalingParameter;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PracticeConfig {
    /// Read once when a session is built; changing it mid-session has no effect.
    #[serde(default)]
    pub core_minutes: ScalingParameter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuesConfig {
    #[serde(default = "default_true")]
    pub bell_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_true")]
    pub wake_lock_enabled: bool,
}

/// Scheduler, watchdog and completion timing, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u64,
    #[serde(default = "default_fallback_interval")]
    pub fallback_interval_ms: u64,
    #[serde(default = "default_watchdog_interval")]
    pub watchdog_interval_ms: u64,
    #[serde(default = "default_stall_threshold")]
    pub stall_threshold_ms: u64,
    #[serde(default = "default_completion_linger")]
    pub completion_linger_ms: u64,
    /// Consecutive watchdog restarts before the stall is reported.
    #[serde(default = "default_max_stall_restarts")]
    pub max_stall_restarts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub remote_api_key: Option<String>,
    #[serde(default)]
    pub sheets_enabled: bool,
    #[serde(default)]
    pub sheets_url: Option<String>,
    #[serde(default = "default_sheet_tab")]
    pub sheet_tab: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/holdpoint/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub practice: PracticeConfig,
    #[serde(default)]
    pub cues: CuesConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

// Default functions
fn default_true() -> bool {
    true
}
fn default_frame_interval() -> u64 {
    16
}
fn default_fallback_interval() -> u64 {
    500
}
fn default_watchdog_interval() -> u64 {
    2000
}
fn default_stall_threshold() -> u64 {
    1000
}
fn default_completion_linger() -> u64 {
    1500
}
fn default_max_stall_restarts() -> u32 {
    3
}
fn default_sheet_tab() -> String {
    "Daily View".into()
}

impl Default for CuesConfig {
    fn default() -> Self {
        Self { bell_enabled: true }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            wake_lock_enabled: true,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval(),
            fallback_interval_ms: default_fallback_interval(),
            watchdog_interval_ms: default_watchdog_interval(),
            stall_threshold_ms: default_stall_threshold(),
            completion_linger_ms: default_completion_linger(),
            max_stall_restarts: default_max_stall_restarts(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_url: None,
            remote_api_key: None,
            sheets_enabled: false,
            sheets_url: None,
            sheet_tab: default_sheet_tab(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        return Err(invalid("only leaf values can be set".into()));
                    }
                    // Optional strings: an empty value clears them.
                    serde_json::Value::Null if value.is_empty() => serde_json::Value::Null,
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default location in the data directory.
    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()
            .map_err(|e| DatabaseError::DataDir(e.to_string()))?
            .join("config.toml"))
    }

    /// Load from disk, writing defaults on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
                .into()
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Every leaf as `(dot.path, value)`, sorted by path.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let path = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&path, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    /// Update a value in memory. Rejects unknown keys and values the typed
    /// config would not accept (e.g. core minutes outside 1-10).
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Set a config value by key and persist.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.apply(key, value)?;
        self.save()?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
