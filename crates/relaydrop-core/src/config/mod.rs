//! Configuration management for Relaydrop.
//!
//! This module handles loading, saving, and managing Relaydrop configuration.
//!
//! ## Configuration File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/relaydrop/config.toml` |
//! | macOS | `~/Library/Application Support/com.relaydrop.Relaydrop/config.toml` |
//! | Windows | `%APPDATA%\Relaydrop\Relaydrop\config\config.toml` |
//!
//! ## Example
//!
//! ```rust,ignore
//! use relaydrop_core::config::Config;
//!
//! let config = Config::load()?;
//! println!("Relay: {}", config.relay.url);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration struct for Relaydrop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Relay connection settings
    pub relay: RelayConfig,
    /// Transfer settings
    pub transfer: TransferConfig,
    /// Completion notification settings
    pub completion: CompletionConfig,
    /// History settings
    pub history: HistoryConfig,
    /// UI settings
    pub ui: UiConfig,
}

/// Relay connection options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Relay base URL (`https://host:port`)
    pub url: String,
    /// Accept self-signed relay certificates
    pub accept_invalid_certs: bool,
    /// Presence channel handshake timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: crate::DEFAULT_RELAY_URL.to_string(),
            accept_invalid_certs: true,
            connect_timeout: Duration::from_secs(crate::DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

/// Transfer configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Upload chunk size in bytes (one progress update per chunk)
    pub chunk_size: usize,
    /// Directory for received files (None = user download directory)
    pub download_dir: Option<PathBuf>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: crate::DEFAULT_CHUNK_SIZE,
            download_dir: None,
        }
    }
}

impl TransferConfig {
    /// Directory received files are written to.
    ///
    /// Falls back to the platform download directory, then the current
    /// directory.
    #[must_use]
    pub fn resolved_download_dir(&self) -> PathBuf {
        self.download_dir.clone().unwrap_or_else(|| {
            directories::UserDirs::new()
                .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
                .unwrap_or_else(|| PathBuf::from("."))
        })
    }
}

/// Delays before the status line returns to idle after a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Delay after a `complete` notification
    #[serde(with = "humantime_serde")]
    pub sender_reset_delay: Duration,
    /// Delay after a `done` notification
    #[serde(with = "humantime_serde")]
    pub receiver_reset_delay: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            sender_reset_delay: Duration::from_millis(crate::DEFAULT_SENDER_RESET_DELAY_MS),
            receiver_reset_delay: Duration::from_millis(crate::DEFAULT_RECEIVER_RESET_DELAY_MS),
        }
    }
}

/// History configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Enable transfer history
    pub enabled: bool,
    /// Maximum history entries
    pub max_entries: usize,
    /// Auto-clear after days
    pub auto_clear_days: Option<u32>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 100,
            auto_clear_days: Some(30),
        }
    }
}

/// UI configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Play a cue when an offer arrives
    pub sound: bool,
    /// Accept every inbound offer without asking
    pub auto_accept: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            sound: true,
            auto_accept: false,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// If the configuration file doesn't exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, defaulting when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigError(format!("Failed to create config directory: {e}"))
            })?;
        }

        let content = self.to_toml()?;

        std::fs::write(path, content)
            .map_err(|e| Error::ConfigError(format!("Failed to write config: {e}")))
    }

    /// Render the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))
    }

    /// Check values that would otherwise fail later at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for the first offending key.
    pub fn validate(&self) -> Result<()> {
        if self.transfer.chunk_size == 0 {
            return Err(Error::InvalidConfig {
                key: "transfer.chunk_size".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.relay.url.trim().is_empty() {
            return Err(Error::InvalidConfig {
                key: "relay.url".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Get the default configuration directory path.
    #[must_use]
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "relaydrop", "Relaydrop")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the full path to the configuration file.
    #[must_use]
    pub fn config_path() -> PathBuf {
        Self::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_duration(&s).ok_or_else(|| serde::de::Error::custom("invalid duration format"))
    }
}

/// Parse a duration such as `3000ms`, `4s` or `5m`.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.relay.url, crate::DEFAULT_RELAY_URL);
        assert!(config.relay.accept_invalid_certs);
        assert_eq!(
            config.completion.sender_reset_delay,
            Duration::from_millis(4000)
        );
        assert_eq!(
            config.completion.receiver_reset_delay,
            Duration::from_millis(3000)
        );
        assert!(!config.ui.auto_accept);
    }

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config").join("config.toml");

        let mut original = Config::default();
        original.relay.url = "http://10.0.0.2:8080".to_string();
        original.transfer.chunk_size = 64 * 1024;
        original.completion.receiver_reset_delay = Duration::from_millis(1500);
        original.ui.auto_accept = true;

        original.save_to(&config_path).expect("save");
        let loaded = Config::load_from(&config_path).expect("load");

        assert_eq!(loaded.relay.url, "http://10.0.0.2:8080");
        assert_eq!(loaded.transfer.chunk_size, 64 * 1024);
        assert_eq!(
            loaded.completion.receiver_reset_delay,
            Duration::from_millis(1500)
        );
        assert!(loaded.ui.auto_accept);
    }

    #[test]
    fn test_config_deserialization_partial() {
        let partial_toml = r#"
[relay]
url = "https://relay.lan:9443"

[completion]
sender_reset_delay = "5s"
"#;

        let config: Config = toml::from_str(partial_toml).expect("parse partial config");

        assert_eq!(config.relay.url, "https://relay.lan:9443");
        assert_eq!(config.completion.sender_reset_delay, Duration::from_secs(5));
        assert_eq!(
            config.completion.receiver_reset_delay,
            Duration::from_millis(3000)
        );
        assert_eq!(config.transfer.chunk_size, crate::DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.relay.url, crate::DEFAULT_RELAY_URL);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[transfer]\nchunk_size = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { ref key, .. } if key == "transfer.chunk_size"));
    }

    #[test]
    fn test_duration_serialization() {
        let toml_str = Config::default().to_toml().expect("serialize");
        assert!(toml_str.contains("sender_reset_delay = \"4s\""));
        assert!(toml_str.contains("connect_timeout = \"10s\""));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("3000ms"), Some(Duration::from_millis(3000)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration("18446744073709551615m"), None);
    }

    #[test]
    fn test_config_path() {
        assert!(Config::config_path().ends_with("config.toml"));
    }
}
