//! Configuration management for the `StationFlow` engine
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::StationError;
use crate::conversions::UnitSystem;
use anyhow::{Context, Result};
use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure for the `StationFlow` engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Physical station settings
    #[serde(default)]
    pub station: StationConfig,
    /// Processing intervals
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// State store settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// UDP listener settings
    #[serde(default)]
    pub listener: ListenerConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Optional JSON file overriding the built-in English strings
    #[serde(default)]
    pub translations_file: Option<PathBuf>,
}

/// Physical station settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    /// Station elevation above sea level in meters
    #[serde(default)]
    pub elevation_m: f64,
    /// Station latitude in degrees
    #[serde(default)]
    pub latitude: f64,
    /// Station longitude in degrees
    #[serde(default)]
    pub longitude: f64,
    /// Output unit system, fixed for the process lifetime
    #[serde(default)]
    pub unit_system: UnitSystem,
    /// IANA timezone used for the local calendar day
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Top of the local pressure window used by the Zambretti forecast (hPa)
    #[serde(default = "default_zambretti_max")]
    pub zambretti_max_pressure_hpa: f64,
    /// Bottom of the local pressure window used by the Zambretti forecast (hPa)
    #[serde(default = "default_zambretti_min")]
    pub zambretti_min_pressure_hpa: f64,
}

/// Processing intervals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Minimum seconds between rapid-wind publications, 0 disables throttling
    #[serde(default)]
    pub rapid_wind_interval_secs: u64,
    /// Seconds between full high/low state publications
    #[serde(default = "default_high_low_interval")]
    pub high_low_interval_secs: u64,
    /// Seconds between time-series purges
    #[serde(default = "default_housekeeping_interval")]
    pub housekeeping_interval_secs: u64,
    /// Seconds between scheduler ticks when the station is quiet
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
}

/// State store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the embedded database
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

/// UDP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_listener_host")]
    pub host: String,
    #[serde(default = "default_listener_port")]
    pub port: u16,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_zambretti_max() -> f64 {
    1050.0
}

fn default_zambretti_min() -> f64 {
    950.0
}

fn default_high_low_interval() -> u64 {
    10 * 60
}

fn default_housekeeping_interval() -> u64 {
    60 * 60
}

fn default_tick_interval() -> u64 {
    30
}

fn default_storage_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("stationflow"))
        .unwrap_or_else(|| PathBuf::from("stationflow-data"))
}

fn default_listener_host() -> String {
    "0.0.0.0".to_string()
}

fn default_listener_port() -> u16 {
    50222
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            elevation_m: 0.0,
            latitude: 0.0,
            longitude: 0.0,
            unit_system: UnitSystem::default(),
            timezone: default_timezone(),
            zambretti_max_pressure_hpa: default_zambretti_max(),
            zambretti_min_pressure_hpa: default_zambretti_min(),
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            rapid_wind_interval_secs: 0,
            high_low_interval_secs: default_high_low_interval(),
            housekeeping_interval_secs: default_housekeeping_interval(),
            tick_interval_secs: default_tick_interval(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: default_listener_host(),
            port: default_listener_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            station: StationConfig::default(),
            processing: ProcessingConfig::default(),
            storage: StorageConfig::default(),
            listener: ListenerConfig::default(),
            logging: LoggingConfig::default(),
            translations_file: None,
        }
    }
}

impl StationConfig {
    /// Parsed station timezone
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| StationError::config(format!("Unknown timezone '{}'", self.timezone)).into())
    }
}

impl EngineConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides, e.g. STATIONFLOW_STATION__ELEVATION_M=120
        builder = builder.add_source(
            Environment::with_prefix("STATIONFLOW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: EngineConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("stationflow").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.station.timezone.is_empty() {
            self.station.timezone = default_timezone();
        }
        if self.processing.high_low_interval_secs == 0 {
            self.processing.high_low_interval_secs = default_high_low_interval();
        }
        if self.processing.housekeeping_interval_secs == 0 {
            self.processing.housekeeping_interval_secs = default_housekeeping_interval();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
        if self.listener.host.is_empty() {
            self.listener.host = default_listener_host();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_station()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate the physical station description
    fn validate_station(&self) -> Result<()> {
        let station = &self.station;
        if !(-90.0..=90.0).contains(&station.latitude) {
            return Err(StationError::config("Latitude must be between -90 and 90 degrees").into());
        }

        if !(-180.0..=180.0).contains(&station.longitude) {
            return Err(
                StationError::config("Longitude must be between -180 and 180 degrees").into(),
            );
        }

        if station.zambretti_max_pressure_hpa <= station.zambretti_min_pressure_hpa {
            return Err(StationError::config(
                "Zambretti max pressure must be greater than the min pressure",
            )
            .into());
        }

        station.tz()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.processing.tick_interval_secs == 0 {
            return Err(StationError::config("Tick interval must be at least 1 second").into());
        }

        if self.processing.tick_interval_secs > 3600 {
            return Err(StationError::config("Tick interval cannot exceed 3600 seconds").into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(StationError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(StationError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.station.unit_system, UnitSystem::Metric);
        assert_eq!(config.station.timezone, "UTC");
        assert_eq!(config.processing.rapid_wind_interval_secs, 0);
        assert_eq!(config.processing.high_low_interval_secs, 600);
        assert_eq!(config.listener.port, 50222);
        assert_eq!(config.logging.level, "info");
        assert!(config.translations_file.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = EngineConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_latitude() {
        let mut config = EngineConfig::default();
        config.station.latitude = 91.0;
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("Latitude"));
    }

    #[test]
    fn test_config_validation_timezone() {
        let mut config = EngineConfig::default();
        config.station.timezone = "Mars/Olympus_Mons".to_string();
        assert!(config.validate().is_err());

        config.station.timezone = "Europe/Copenhagen".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_zambretti_window() {
        let mut config = EngineConfig::default();
        config.station.zambretti_min_pressure_hpa = 1050.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
[station]
elevation_m = 120.5
latitude = 55.6
longitude = 12.5
unit_system = "imperial"
timezone = "Europe/Copenhagen"

[processing]
rapid_wind_interval_secs = 15
"#
        )
        .unwrap();

        let config = EngineConfig::load_from_path(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.station.elevation_m, 120.5);
        assert_eq!(config.station.unit_system, UnitSystem::Imperial);
        assert_eq!(config.processing.rapid_wind_interval_secs, 15);
        assert_eq!(config.processing.high_low_interval_secs, 600);
        assert_eq!(config.station.zambretti_max_pressure_hpa, 1050.0);
    }

    #[test]
    fn test_config_path_generation() {
        if let Some(path) = EngineConfig::get_config_path() {
            assert!(path.to_string_lossy().contains("stationflow"));
            assert!(path.to_string_lossy().contains("config.toml"));
        }
    }
}
