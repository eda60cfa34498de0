//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/shoebox/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/shoebox/` (~/.config/shoebox/)
//! - State/Logs: `$XDG_STATE_HOME/shoebox/` (~/.local/state/shoebox/)
//!
//! The library roots themselves are ordinary directories chosen by the
//! operator (defaults under `$HOME/shoebox/`); they are data, not state.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Default user folder under the library roots
    #[serde(default = "default_user")]
    pub user: String,

    /// Image library root
    #[serde(default = "default_library")]
    pub library: PathBuf,

    /// Video library root (may equal the image library)
    #[serde(default = "default_video_library")]
    pub videolibrary: PathBuf,

    /// Lowercased leading-dot image extensions
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    /// Lowercased leading-dot video extensions
    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,

    /// Force the external metadata tool even for embedded-decoder formats
    #[serde(default, rename = "use_external_metadata_tool")]
    pub use_exiftool: bool,

    /// Materialize with hardlinks instead of copying
    #[serde(default)]
    pub use_hardlinks: bool,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user: default_user(),
            library: default_library(),
            videolibrary: default_video_library(),
            image_extensions: default_image_extensions(),
            video_extensions: default_video_extensions(),
            use_exiftool: false,
            use_hardlinks: false,
            logging: LoggingConfig::default(),
        }
    }
}

fn default_user() -> String {
    "user".to_string()
}

fn default_library() -> PathBuf {
    home_dir().join("shoebox/images")
}

fn default_video_library() -> PathBuf {
    home_dir().join("shoebox/videos")
}

fn default_image_extensions() -> Vec<String> {
    [".jpg", ".jpeg", ".png", ".gif", ".heic"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_video_extensions() -> Vec<String> {
    [".mp4", ".mov", ".avi", ".mkv"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the ingest core cannot work with.
    pub fn validate(&self) -> Result<()> {
        for ext in self.image_extensions.iter().chain(&self.video_extensions) {
            if !ext.starts_with('.') {
                return Err(Error::Config(format!(
                    "extension {:?} must start with a dot",
                    ext
                )));
            }
            if ext.chars().any(|c| c.is_ascii_uppercase()) {
                return Err(Error::Config(format!(
                    "extension {:?} must be lowercase",
                    ext
                )));
            }
        }
        if self.user.is_empty() {
            return Err(Error::Config("user must not be empty".to_string()));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/shoebox/config.toml` (~/.config/shoebox/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("shoebox").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/shoebox/` (~/.local/state/shoebox/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("shoebox")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("shoebox.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.user, "user");
        assert!(config.library.ends_with("shoebox/images"));
        assert!(config.videolibrary.ends_with("shoebox/videos"));
        assert!(config.image_extensions.contains(&".jpg".to_string()));
        assert!(config.video_extensions.contains(&".mp4".to_string()));
        assert!(!config.use_exiftool);
        assert!(!config.use_hardlinks);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
user = "val"
library = "/mnt/photos"
videolibrary = "/mnt/videos"
image_extensions = [".jpg", ".cr2"]
use_external_metadata_tool = true
use_hardlinks = true

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.user, "val");
        assert_eq!(config.library, PathBuf::from("/mnt/photos"));
        assert_eq!(config.videolibrary, PathBuf::from("/mnt/videos"));
        assert_eq!(config.image_extensions, vec![".jpg", ".cr2"]);
        // untouched fields keep their defaults
        assert_eq!(config.video_extensions, default_video_extensions());
        assert!(config.use_hardlinks);
        assert!(config.use_exiftool);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validate_rejects_bad_extensions() {
        let config = Config {
            image_extensions: vec!["jpg".into()],
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            video_extensions: vec![".MP4".into()],
            ..Config::default()
        };
        assert!(config.validate().is_err());

        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_path_shape() {
        let path = Config::config_path();
        assert!(path.ends_with("shoebox/config.toml"));
    }
}
