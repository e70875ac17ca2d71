//! Persisted record shapes

use crate::conversions::UnitSystem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Running daily totals and last-event details.
///
/// Rain is kept in mm and distance in km; conversion happens on output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageRecord {
    pub rain_today: f64,
    pub rain_yesterday: f64,
    pub rain_start: Option<DateTime<Utc>>,
    /// Minutes with rain
    pub rain_duration_today: u32,
    pub rain_duration_yesterday: u32,
    pub lightning_count_today: u32,
    pub last_lightning_time: Option<DateTime<Utc>>,
    pub last_lightning_distance: f64,
    pub last_lightning_energy: f64,
}

/// Sea-level pressure in output units at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PressureSample {
    pub at: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightningEvent {
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Steady,
    Rising,
    Falling,
}

impl Trend {
    /// Translation key
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Trend::Steady => "steady",
            Trend::Rising => "rising",
            Trend::Falling => "falling",
        }
    }
}

/// Direction and size of the pressure change over the trend window.
/// `delta` is 0 whenever the trend is steady.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PressureTrend {
    pub trend: Trend,
    pub delta: f64,
}

/// Band around zero inside which pressure counts as steady.
/// Both ends are exclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendThresholds {
    pub min: f64,
    pub max: f64,
}

impl TrendThresholds {
    #[must_use]
    pub fn for_units(unit_system: UnitSystem) -> Self {
        match unit_system {
            UnitSystem::Metric => Self { min: -1.0, max: 1.0 },
            UnitSystem::Imperial => Self {
                min: -0.0295,
                max: 0.0295,
            },
        }
    }

    #[must_use]
    pub fn classify(&self, delta: f64) -> PressureTrend {
        if delta > self.min && delta < self.max {
            PressureTrend {
                trend: Trend::Steady,
                delta: 0.0,
            }
        } else if delta <= self.min {
            PressureTrend {
                trend: Trend::Falling,
                delta,
            }
        } else {
            PressureTrend {
                trend: Trend::Rising,
                delta,
            }
        }
    }
}
