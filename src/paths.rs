/// Platform-specific default locations for easycommit state
///
/// Follows the XDG Base Directory layout on Unix-like systems.
use std::path::PathBuf;

const APP_DIR: &str = "easycommit";

/// Platform-agnostic path utilities
pub struct PlatformPaths;

impl PlatformPaths {
    /// Get the appropriate data directory for the current platform
    ///
    /// - Windows: %LOCALAPPDATA%
    /// - macOS: ~/Library/Application Support
    /// - Linux/Unix: $XDG_DATA_HOME or ~/.local/share
    pub fn data_dir() -> PathBuf {
        if cfg!(target_os = "windows") {
            std::env::var("LOCALAPPDATA")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
        } else if cfg!(target_os = "macos") {
            std::env::var("HOME")
                .map(|home| PathBuf::from(home).join("Library/Application Support"))
                .unwrap_or_else(|_| PathBuf::from("."))
        } else {
            std::env::var("XDG_DATA_HOME")
                .map(PathBuf::from)
                .or_else(|_| {
                    std::env::var("HOME").map(|home| PathBuf::from(home).join(".local/share"))
                })
                .unwrap_or_else(|_| PathBuf::from("."))
        }
    }

    /// Get the appropriate config directory for the current platform
    ///
    /// - Windows: %APPDATA%
    /// - macOS: ~/Library/Application Support
    /// - Linux/Unix: $XDG_CONFIG_HOME or ~/.config
    pub fn config_dir() -> PathBuf {
        if cfg!(target_os = "windows") {
            std::env::var("APPDATA")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
        } else if cfg!(target_os = "macos") {
            std::env::var("HOME")
                .map(|home| PathBuf::from(home).join("Library/Application Support"))
                .unwrap_or_else(|_| PathBuf::from("."))
        } else {
            std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|home| PathBuf::from(home).join(".config")))
                .unwrap_or_else(|_| PathBuf::from("."))
        }
    }

    /// Returns: {data_dir}/easycommit
    pub fn project_data_dir() -> PathBuf {
        Self::data_dir().join(APP_DIR)
    }

    /// Returns: {config_dir}/easycommit
    pub fn project_config_dir() -> PathBuf {
        Self::config_dir().join(APP_DIR)
    }

    /// Fixed location of the "current" model snapshot
    ///
    /// Returns: {data_dir}/easycommit/model
    pub fn default_model_dir() -> PathBuf {
        Self::project_data_dir().join("model")
    }

    /// Returns: {data_dir}/easycommit/model/checkpoints
    pub fn default_checkpoints_dir() -> PathBuf {
        Self::default_model_dir().join("checkpoints")
    }

    /// Returns: {data_dir}/easycommit/urls-github.json
    pub fn default_ledger_path() -> PathBuf {
        Self::project_data_dir().join("urls-github.json")
    }

    /// Returns: {data_dir}/easycommit/training_log.csv
    pub fn default_monitor_path() -> PathBuf {
        Self::project_data_dir().join("training_log.csv")
    }

    /// Returns: {config_dir}/easycommit/sources.txt
    pub fn default_sources_path() -> PathBuf {
        Self::project_config_dir().join("sources.txt")
    }

    /// Returns: {config_dir}/easycommit/config.toml
    pub fn default_config_path() -> PathBuf {
        Self::project_config_dir().join("config.toml")
    }
}
