//! Daemon configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (ROOMSYNC_*)
//! - TOML configuration file
//! - A config path given as the first command line argument

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Local user.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Duplicate suppression.
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Notification fan-out.
    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// Delivery feed.
    #[serde(default)]
    pub feed: FeedConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Local user configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// User id whose own messages are treated as echoes.
    #[serde(default = "default_user_id")]
    pub user_id: Option<String>,
}

/// Duplicate suppression configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Remembered event ids (`0` = unbounded).
    #[serde(default = "default_dedup_capacity")]
    pub capacity: usize,
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Buffered notifications per category.
    #[serde(default = "default_notification_capacity")]
    pub capacity: usize,
}

/// Encoding of the delivery feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    /// One JSON delivery per line.
    Jsonl,
    /// Length-prefixed MessagePack frames.
    Msgpack,
}

/// Delivery feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// File to read, or `-` for stdin.
    #[serde(default = "default_feed_path")]
    pub path: String,

    /// Feed encoding.
    #[serde(default = "default_feed_format")]
    pub format: FeedFormat,

    /// Deliveries buffered between the reader and the router.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default)]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_user_id() -> Option<String> {
    std::env::var("ROOMSYNC_USER_ID").ok()
}

fn default_dedup_capacity() -> usize {
    roomsync_core::dedup::DEFAULT_DEDUP_CAPACITY
}

fn default_notification_capacity() -> usize {
    roomsync_core::notify::DEFAULT_NOTIFICATION_CAPACITY
}

fn default_feed_path() -> String {
    std::env::var("ROOMSYNC_FEED").unwrap_or_else(|_| "-".to_string())
}

fn default_feed_format() -> FeedFormat {
    FeedFormat::Jsonl
}

fn default_queue_depth() -> usize {
    256
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identity: IdentityConfig::default(),
            dedup: DedupConfig::default(),
            notifications: NotificationsConfig::default(),
            feed: FeedConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            capacity: default_dedup_capacity(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            capacity: default_notification_capacity(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            path: default_feed_path(),
            format: default_feed_format(),
            queue_depth: default_queue_depth(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "roomsync.toml",
            "/etc/roomsync/roomsync.toml",
            "~/.config/roomsync/roomsync.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Check values the runtime cannot work with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.feed.queue_depth > 0,
            "feed.queue_depth must be greater than zero"
        );
        ensure!(
            self.notifications.capacity > 0,
            "notifications.capacity must be greater than zero"
        );
        Ok(())
    }

    /// Feed path with `~` expanded.
    #[must_use]
    pub fn feed_path(&self) -> String {
        shellexpand::tilde(&self.feed.path).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.feed.format, FeedFormat::Jsonl);
        assert_eq!(config.feed.queue_depth, 256);
        assert!(!config.metrics.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            [identity]
            user_id = "@me:example.org"

            [dedup]
            capacity = 0

            [feed]
            path = "~/feeds/session.bin"
            format = "msgpack"

            [metrics]
            enabled = true
            port = 9100
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.identity.user_id.as_deref(), Some("@me:example.org"));
        assert_eq!(config.dedup.capacity, 0);
        assert_eq!(config.feed.format, FeedFormat::Msgpack);
        assert_eq!(config.feed.queue_depth, 256);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.port, 9100);
        assert_eq!(config.feed.path, "~/feeds/session.bin");
    }

    #[test]
    fn test_config_rejects_zero_queue() {
        let config: Config = toml::from_str("[feed]\nqueue_depth = 0").unwrap();
        assert!(config.validate().is_err());
    }
}
