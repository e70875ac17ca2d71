//! Unit conversion and derived meteorology
//!
//! `ConversionEngine` is stateless apart from its fixed unit system and string
//! tables. Raw readings always arrive in SI-ish protocol units (°C, hPa, m/s,
//! km, mm) and leave in the configured output system.

pub mod classify;
pub mod formulas;
pub mod solar;
pub mod translations;
pub mod zambretti;

pub use classify::{Beaufort, BatteryMode, ConditionInputs};
pub use translations::{Table, Translations};
pub use zambretti::{ZambrettiForecast, ZambrettiInput};

use crate::{Result, StationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Output unit system, fixed at process start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitSystem::Metric => write!(f, "metric"),
            UnitSystem::Imperial => write!(f, "imperial"),
        }
    }
}

/// Round half away from zero to `decimals` places
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Unwrap a physical input or report it as missing
pub(crate) fn require(field: &'static str, value: Option<f64>) -> Result<f64> {
    value.ok_or_else(|| {
        warn!(field, "Sensor value was not reported");
        StationError::missing_input(field)
    })
}

/// Converts raw station quantities into the configured unit system
#[derive(Debug, Clone)]
pub struct ConversionEngine {
    unit_system: UnitSystem,
    translations: Translations,
}

impl ConversionEngine {
    #[must_use]
    pub fn new(unit_system: UnitSystem, translations: Translations) -> Self {
        Self {
            unit_system,
            translations,
        }
    }

    /// Engine with the built-in English strings
    #[must_use]
    pub fn english(unit_system: UnitSystem) -> Self {
        Self::new(unit_system, Translations::english())
    }

    #[must_use]
    pub fn unit_system(&self) -> UnitSystem {
        self.unit_system
    }

    #[must_use]
    pub fn is_imperial(&self) -> bool {
        self.unit_system == UnitSystem::Imperial
    }

    #[must_use]
    pub fn translations(&self) -> &Translations {
        &self.translations
    }

    /// Degrees Celsius to °C or °F, 1 decimal
    #[must_use]
    pub fn temperature(&self, celsius: f64) -> f64 {
        match self.unit_system {
            UnitSystem::Imperial => round_to(celsius * 9.0 / 5.0 + 32.0, 1),
            UnitSystem::Metric => round_to(celsius, 1),
        }
    }

    /// Hectopascal to hPa (2 decimals) or inHg (3 decimals)
    #[must_use]
    pub fn pressure(&self, hpa: f64) -> f64 {
        match self.unit_system {
            UnitSystem::Imperial => round_to(hpa * 0.02953, 3),
            UnitSystem::Metric => round_to(hpa, 2),
        }
    }

    /// Metres per second to m/s, km/h or mph
    #[must_use]
    pub fn speed(&self, ms: f64, as_kmh: bool) -> f64 {
        match self.unit_system {
            UnitSystem::Imperial => round_to(ms * 2.236_936_292_054_4, 2),
            UnitSystem::Metric if as_kmh => round_to(ms * 18.0 / 5.0, 1),
            UnitSystem::Metric => round_to(ms, 1),
        }
    }

    /// Kilometres to km or miles
    #[must_use]
    pub fn distance(&self, km: f64) -> f64 {
        match self.unit_system {
            UnitSystem::Imperial => round_to(km / 1.609_344, 2),
            UnitSystem::Metric => km,
        }
    }

    /// Millimetres to mm or inches
    #[must_use]
    pub fn rain(&self, mm: f64) -> f64 {
        match self.unit_system {
            UnitSystem::Imperial => round_to(mm * 0.039_370_078_7, 2),
            UnitSystem::Metric => round_to(mm, 2),
        }
    }

    /// Per-minute rain to an hourly rate.
    ///
    /// Absent or zero input yields 0 rather than a missing value. This legacy
    /// default differs from the other formulas and is kept deliberately.
    #[must_use]
    pub fn rain_rate(&self, mm_per_minute: Option<f64>) -> f64 {
        match mm_per_minute {
            Some(v) if v != 0.0 => self.rain(v * 60.0),
            _ => 0.0,
        }
    }

    /// Metres to m or ft, whole units
    #[must_use]
    pub fn height(&self, meters: f64) -> f64 {
        match self.unit_system {
            UnitSystem::Imperial => (meters * 3.280_84).round(),
            UnitSystem::Metric => meters.round(),
        }
    }
}
