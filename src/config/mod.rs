// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Configuration module

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::alarm::AlarmConfig;
use crate::analysis::{Metric, DEFAULT_HISTORY_WINDOW};
use crate::detection::{HazardThresholds, NewDevicePolicy};
use crate::streaming::FeedConfig;

/// Configuration loading and validation failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot access config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Log level
    pub log_level: String,

    /// Alert and warning thresholds
    pub thresholds: HazardThresholds,

    /// Rolling history
    pub history: HistoryConfig,

    /// Alert engine
    pub alerting: AlertingConfig,

    /// Audible alarm
    pub alarm: AlarmConfig,

    /// Device feed
    pub feed: FeedConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "ForestWatch".to_string(),
            log_level: "info".to_string(),
            thresholds: HazardThresholds::default(),
            history: HistoryConfig::default(),
            alerting: AlertingConfig::default(),
            alarm: AlarmConfig::default(),
            feed: FeedConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history.window_size < 1 {
            return Err(ConfigError::Invalid {
                field: "history.window_size",
                reason: "must be at least 1".into(),
            });
        }

        let t = &self.thresholds;
        let thresholds = [
            ("thresholds.fire_temperature", t.fire_temperature),
            ("thresholds.fire_gas_alert", t.fire_gas_alert),
            ("thresholds.fire_gas_warning", t.fire_gas_warning),
            ("thresholds.heavy_rain_analog", t.heavy_rain_analog),
            ("thresholds.heavy_rain_percent_alert", t.heavy_rain_percent_alert),
            ("thresholds.warning_rain_percent", t.warning_rain_percent),
            ("thresholds.warning_temperature", t.warning_temperature),
            ("thresholds.warning_gas", t.warning_gas),
        ];
        for (field, value) in thresholds {
            if !value.is_finite() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{} is not a finite number", value),
                });
            }
        }

        if self.feed.channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "feed.channel_capacity",
                reason: "must be at least 1".into(),
            });
        }
        if self.feed.simulator_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "feed.simulator_interval_ms",
                reason: "must be at least 1".into(),
            });
        }
        if self.alerting.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "alerting.event_capacity",
                reason: "must be at least 1".into(),
            });
        }

        Ok(())
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("forestwatch"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

/// History configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Values kept per device and metric
    pub window_size: usize,

    /// Metrics to chart
    pub metrics: Vec<Metric>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_HISTORY_WINDOW,
            metrics: Metric::ALL.to_vec(),
        }
    }
}

/// Alert engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertingConfig {
    /// Handling of devices seen for the first time
    pub new_device_policy: NewDevicePolicy,

    /// Broadcast buffer for alert and status events
    pub event_capacity: usize,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            new_device_policy: NewDevicePolicy::default(),
            event_capacity: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::FeedKind;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.history.window_size, 10);
        assert_eq!(config.thresholds.fire_temperature, 50.0);
        assert_eq!(config.thresholds.fire_gas_alert, 900.0);
        assert_eq!(config.thresholds.fire_gas_warning, 600.0);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            log_level = "debug"

            [history]
            window_size = 25

            [thresholds]
            fire_gas_alert = 950.0

            [alerting.new_device_policy]
            mode = "await_telemetry"
            min_hazard_fields = 2

            [feed]
            source = "mqtt"
            mqtt_broker = "broker.forest.local"
            "#,
        )
        .unwrap();

        assert_eq!(config.history.window_size, 25);
        assert_eq!(config.history.metrics.len(), Metric::ALL.len());
        assert_eq!(config.thresholds.fire_gas_alert, 950.0);
        assert_eq!(config.thresholds.fire_temperature, 50.0);
        assert_eq!(
            config.alerting.new_device_policy,
            NewDevicePolicy::AwaitTelemetry { min_hazard_fields: 2 }
        );
        assert_eq!(config.feed.source, FeedKind::Mqtt);
        assert_eq!(config.feed.root_topic, "forest_devices");
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut config = Config::default();
        config.history.window_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "history.window_size", .. })
        ));
    }

    #[test]
    fn test_zero_simulator_interval_rejected() {
        let mut config = Config::default();
        config.feed.simulator_interval_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "feed.simulator_interval_ms", .. })
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("forestwatch-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.toml");

        let created = Config::load_or_create(&path).unwrap();
        assert!(path.exists());

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.app_name, created.app_name);
        assert_eq!(loaded.history.window_size, created.history.window_size);

        let _ = std::fs::remove_dir_all(dir);
    }
}
