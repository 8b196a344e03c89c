// ABOUTME: XDG base directory paths for configuration and logs.
// ABOUTME: ~/.config/parley for config, ~/.local/share/parley for logs and default state.

use directories::BaseDirs;
use std::path::PathBuf;

const APP_NAME: &str = "parley";

/// Config directory (e.g. ~/.config/parley/).
/// Falls back to the current directory when no home directory is known.
pub fn config_dir() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.home_dir().join(".config").join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Default config file (e.g. ~/.config/parley/config.toml)
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Data directory (e.g. ~/.local/share/parley/)
pub fn data_dir() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.home_dir().join(".local").join("share").join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

/// Log directory inside the data directory
pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}
