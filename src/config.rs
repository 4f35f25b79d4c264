//! Configuration management for Voltlink
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files. The polling interval is read by the
//! coordinator once at startup; changing it requires a restart.

use crate::api::Environment;
use crate::error::{Result, VoltlinkError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default polling interval in seconds
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 60;

/// Lower bound accepted for the polling interval
pub const MIN_UPDATE_INTERVAL_SECS: u64 = 5;

/// Upper bound accepted for the polling interval
pub const MAX_UPDATE_INTERVAL_SECS: u64 = 3600;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Enode client credentials and environment selection
    pub credentials: CredentialsConfig,

    /// Linked user and the vehicle to poll
    pub vehicle: VehicleConfig,

    /// Polling cadence
    pub polling: PollingConfig,

    /// Diagnostic notification switches
    pub notifications: NotificationsConfig,

    /// Per-field sensor enable flags, consumed by the presentation layer
    pub sensors: SensorsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// OAuth client credentials
///
/// Supplied once at setup time and held in process memory only.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CredentialsConfig {
    /// OAuth client id
    pub client_id: String,

    /// OAuth client secret
    pub client_secret: String,

    /// Provider deployment (production or sandbox)
    pub environment: Environment,
}

/// Linked user and vehicle selection
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VehicleConfig {
    /// Enode user id owning the linked vehicles
    pub user_id: String,

    /// Vehicle id selected during setup
    pub vehicle_id: String,
}

/// Polling cadence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Seconds between provider fetches
    pub update_interval_secs: u64,
}

/// Diagnostic notification configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Surface raw fetch payloads/errors to the operator
    pub debug_notifications: bool,
}

/// Per-field sensor enable flags
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorsConfig {
    /// Field names the presentation layer should expose
    pub enabled: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional console-specific level override
    pub console_level: Option<String>,

    /// Optional file-specific level override
    pub file_level: Option<String>,

    /// Path to log file or directory
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: DEFAULT_UPDATE_INTERVAL_SECS,
        }
    }
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            enabled: [
                "battery_capacity",
                "battery_level",
                "charge_limit",
                "charge_rate",
                "charge_time_remaining",
                "charging",
                "fully_charged",
                "last_seen",
                "location",
                "odometer",
                "plugged_in",
                "power_delivery",
                "range",
                "reachable",
                "smart_charging",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/voltlink.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default locations
    pub fn load() -> Result<Self> {
        let default_paths = [
            "voltlink_config.yaml",
            "/data/voltlink_config.yaml",
            "/etc/voltlink/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.credentials.client_id.is_empty() {
            return Err(VoltlinkError::validation(
                "credentials.client_id",
                "Client id cannot be empty",
            ));
        }

        if self.credentials.client_secret.is_empty() {
            return Err(VoltlinkError::validation(
                "credentials.client_secret",
                "Client secret cannot be empty",
            ));
        }

        if self.vehicle.user_id.is_empty() {
            return Err(VoltlinkError::validation(
                "vehicle.user_id",
                "User id cannot be empty",
            ));
        }

        if self.vehicle.vehicle_id.is_empty() {
            return Err(VoltlinkError::validation(
                "vehicle.vehicle_id",
                "Vehicle id cannot be empty",
            ));
        }

        let interval = self.polling.update_interval_secs;
        if !(MIN_UPDATE_INTERVAL_SECS..=MAX_UPDATE_INTERVAL_SECS).contains(&interval) {
            return Err(VoltlinkError::validation(
                "polling.update_interval_secs",
                "Update interval out of bounds",
            ));
        }

        Ok(())
    }

    /// Polling interval as a [`Duration`]
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.polling.update_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.credentials.client_id = "client".to_string();
        config.credentials.client_secret = "secret".to_string();
        config.vehicle.user_id = "user-1".to_string();
        config.vehicle.vehicle_id = "vehicle-1".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.polling.update_interval_secs, 60);
        assert_eq!(config.credentials.environment, Environment::Production);
        assert!(!config.notifications.debug_notifications);
        assert!(config.sensors.enabled.contains(&"odometer".to_string()));
    }

    #[test]
    fn test_config_validation() {
        let config = valid_config();
        assert!(config.validate().is_ok());

        let mut config = valid_config();
        config.credentials.client_id = String::new();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.polling.update_interval_secs = 2;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.polling.update_interval_secs = 4000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = valid_config();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            config.polling.update_interval_secs,
            deserialized.polling.update_interval_secs
        );
        assert_eq!(deserialized.vehicle.vehicle_id, "vehicle-1");
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
credentials:
  client_id: abc
  client_secret: def
  environment: sandbox
vehicle:
  user_id: u1
  vehicle_id: v1
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.credentials.environment, Environment::Sandbox);
        assert_eq!(config.polling.update_interval_secs, 60);
        assert!(config.validate().is_ok());
    }
}
