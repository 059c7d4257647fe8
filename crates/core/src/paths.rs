//! Centralized path functions for all app storage locations.
//!
//! Single source of truth: no ad-hoc `dirs::config_dir().join(...)` in other crates.

use std::path::PathBuf;

/// App config root: `~/Library/Application Support/replyradar/` (macOS) or `~/.config/replyradar/` (Linux).
pub fn app_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("replyradar"))
}

/// Engine config file: `<app_config_dir>/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    app_config_dir().map(|d| d.join("config.toml"))
}

/// App data root: `~/Library/Caches/replyradar/` (macOS) or `~/.cache/replyradar/` (Linux).
pub fn app_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("replyradar"))
}

/// SQLite database file: `<app_cache_dir>/replyradar.db`.
pub fn db_path() -> Option<PathBuf> {
    app_cache_dir().map(|d| d.join("replyradar.db"))
}

/// Rolling log directory: `<app_cache_dir>/logs/`.
pub fn log_dir() -> Option<PathBuf> {
    app_cache_dir().map(|d| d.join("logs"))
}
