mod config;
pub mod database;

pub use config::{Config, CuesConfig, DisplayConfig, PracticeConfig, SyncConfig, TimingConfig};
pub use database::{Database, SessionRecord, SessionStore};

use std::path::PathBuf;

/// Returns `~/.config/holdpoint[-dev]/` based on HOLDPOINT_ENV.
///
/// Set HOLDPOINT_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("HOLDPOINT_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("holdpoint-dev")
    } else {
        base_dir.join("holdpoint")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
