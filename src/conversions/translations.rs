//! Descriptive strings for classified values
//!
//! English is compiled in; a JSON file with the same layout can override any
//! subset of the keys.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

const ENGLISH: &str = include_str!("en.json");

/// String tables looked up by classification ladders
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Translations {
    #[serde(default)]
    pub beaufort: BTreeMap<String, String>,
    #[serde(default)]
    pub dewpoint: BTreeMap<String, String>,
    #[serde(default)]
    pub temperature: BTreeMap<String, String>,
    #[serde(default)]
    pub uv: BTreeMap<String, String>,
    #[serde(default)]
    pub rain_intensity: BTreeMap<String, String>,
    #[serde(default)]
    pub precip_type: BTreeMap<String, String>,
    #[serde(default)]
    pub wind_dir: BTreeMap<String, String>,
    #[serde(default)]
    pub trend: BTreeMap<String, String>,
    #[serde(default)]
    pub battery_mode: BTreeMap<String, String>,
    #[serde(default)]
    pub zambretti: BTreeMap<String, String>,
}

/// Which string table a key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Beaufort,
    Dewpoint,
    Temperature,
    Uv,
    RainIntensity,
    PrecipType,
    WindDirection,
    Trend,
    BatteryMode,
    Zambretti,
}

impl Translations {
    /// Built-in English strings
    #[must_use]
    pub fn english() -> Self {
        serde_json::from_str(ENGLISH).expect("embedded English strings are valid JSON")
    }

    /// English strings overridden by the keys present in `path`
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let overrides: Translations = serde_json::from_str(&text)?;
        Ok(Self::english().merged(overrides))
    }

    fn merged(mut self, other: Translations) -> Self {
        self.beaufort.extend(other.beaufort);
        self.dewpoint.extend(other.dewpoint);
        self.temperature.extend(other.temperature);
        self.uv.extend(other.uv);
        self.rain_intensity.extend(other.rain_intensity);
        self.precip_type.extend(other.precip_type);
        self.wind_dir.extend(other.wind_dir);
        self.trend.extend(other.trend);
        self.battery_mode.extend(other.battery_mode);
        self.zambretti.extend(other.zambretti);
        self
    }

    fn table(&self, table: Table) -> &BTreeMap<String, String> {
        match table {
            Table::Beaufort => &self.beaufort,
            Table::Dewpoint => &self.dewpoint,
            Table::Temperature => &self.temperature,
            Table::Uv => &self.uv,
            Table::RainIntensity => &self.rain_intensity,
            Table::PrecipType => &self.precip_type,
            Table::WindDirection => &self.wind_dir,
            Table::Trend => &self.trend,
            Table::BatteryMode => &self.battery_mode,
            Table::Zambretti => &self.zambretti,
        }
    }

    /// Localized text for `key`, or an `Unknown - <key>` marker
    #[must_use]
    pub fn lookup(&self, table: Table, key: &str) -> String {
        match self.table(table).get(key) {
            Some(text) => text.clone(),
            None => {
                warn!(?table, key, "No translation found");
                format!("Unknown - {key}")
            }
        }
    }
}
