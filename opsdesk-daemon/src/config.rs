//! Daemon Configuration
//!
//! Configuration management for the opsdesk daemon.

use anyhow::{Context, Result};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Operator identity
    pub operator: OperatorConfig,

    /// Inbox behavior
    #[serde(default)]
    pub inbox: InboxConfig,

    /// Delivery channel settings
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

/// Operator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Identity used for assignment and "mine" scoping
    pub identity: String,

    /// Privileged operators see every thread in the `all` scope
    #[serde(default)]
    pub privileged: bool,
}

/// Inbox behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxConfig {
    /// Week start day used by the activity-label week window
    #[serde(default = "default_week_start")]
    pub week_start: String,

    /// Show the resolved archive instead of the live queue
    #[serde(default)]
    pub show_resolved: bool,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            week_start: default_week_start(),
            show_resolved: false,
        }
    }
}

impl InboxConfig {
    /// Parsed week-start day; unknown values fall back to Monday
    pub fn week_start_day(&self) -> Weekday {
        match self.week_start.to_lowercase().as_str() {
            "monday" | "mon" => Weekday::Mon,
            "tuesday" | "tue" => Weekday::Tue,
            "wednesday" | "wed" => Weekday::Wed,
            "thursday" | "thu" => Weekday::Thu,
            "friday" | "fri" => Weekday::Fri,
            "saturday" | "sat" => Weekday::Sat,
            "sunday" | "sun" => Weekday::Sun,
            _ => Weekday::Mon,
        }
    }
}

/// Delivery channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Human-readable label of the configured channel
    #[serde(default = "default_channel_label")]
    pub channel: String,

    /// Delivery call timeout in seconds
    #[serde(default = "default_delivery_timeout")]
    pub timeout_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            channel: default_channel_label(),
            timeout_secs: default_delivery_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Tracing filter directive, e.g. "info" or "opsdesk_core=debug"
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_week_start() -> String {
    "monday".to_string()
}

fn default_channel_label() -> String {
    "local-echo".to_string()
}

fn default_delivery_timeout() -> u64 {
    30
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            operator: OperatorConfig {
                identity: "Operator".to_string(),
                privileged: false,
            },
            inbox: InboxConfig::default(),
            delivery: DeliveryConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("opsdesk").join("daemon.toml"))
    }

    /// Load configuration from a file, creating defaults if absent
    pub fn load(path: &PathBuf) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config from {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.operator.identity, "Operator");
        assert!(!config.operator.privileged);
        assert_eq!(config.inbox.week_start_day(), Weekday::Mon);
        assert_eq!(config.delivery.timeout_secs, 30);
    }

    #[test]
    fn test_week_start_parsing() {
        let mut inbox = InboxConfig::default();
        inbox.week_start = "Sunday".to_string();
        assert_eq!(inbox.week_start_day(), Weekday::Sun);
        inbox.week_start = "sat".to_string();
        assert_eq!(inbox.week_start_day(), Weekday::Sat);
        inbox.week_start = "someday".to_string();
        assert_eq!(inbox.week_start_day(), Weekday::Mon);
    }

    #[test]
    fn test_load_creates_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.toml");

        let config = Config::load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.operator.identity, "Operator");
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.toml");

        let mut config = Config::default();
        config.operator.identity = "Ana".to_string();
        config.operator.privileged = true;
        config.inbox.week_start = "sunday".to_string();
        config.save(&path).unwrap();

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.operator.identity, "Ana");
        assert!(reloaded.operator.privileged);
        assert_eq!(reloaded.inbox.week_start_day(), Weekday::Sun);
    }

    #[test]
    fn test_partial_file_uses_section_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.toml");
        fs::write(&path, "[operator]\nidentity = \"Bruno\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.operator.identity, "Bruno");
        assert_eq!(config.log.filter, "info");
        assert_eq!(config.delivery.channel, "local-echo");
    }
}
