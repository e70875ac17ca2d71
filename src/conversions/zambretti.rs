//! Zambretti short-range forecaster
//!
//! Sea-level pressure is placed in a local pressure window, nudged by wind
//! direction and season, and looked up in one of three 22-bucket tables
//! chosen by the pressure trend. The result is a forecast number 0..=25,
//! rendered as a letter A..Z.

use super::{ConversionEngine, Table, UnitSystem};
use serde::{Deserialize, Serialize};

const RISE_OPTIONS: [u8; 22] = [
    25, 25, 25, 24, 24, 19, 16, 12, 11, 9, 8, 6, 5, 2, 1, 1, 0, 0, 0, 0, 0, 0,
];
const STEADY_OPTIONS: [u8; 22] = [
    25, 25, 25, 25, 25, 25, 23, 23, 22, 18, 15, 13, 10, 4, 1, 1, 0, 0, 0, 0, 0, 0,
];
const FALL_OPTIONS: [u8; 22] = [
    25, 25, 25, 25, 25, 25, 25, 25, 23, 23, 21, 20, 17, 14, 7, 3, 1, 1, 1, 0, 0, 0,
];

/// Percent of the pressure window added per compass point, northern hemisphere.
/// The southern hemisphere uses the opposite point.
const NORTH_WIND_ADJUSTMENT: [f64; 16] = [
    6.0, 5.0, 5.0, 2.0, -0.5, -2.0, -5.0, -8.5, -12.0, -10.0, -6.0, -4.5, -3.0, -0.5, 1.5, 3.0,
];

const SEASON_ADJUSTMENT: f64 = 7.0;

/// Everything the forecaster needs, in output units
#[derive(Debug, Clone, PartialEq)]
pub struct ZambrettiInput {
    pub latitude: f64,
    /// Average wind bearing in degrees
    pub wind_bearing: f64,
    pub pressure_high: f64,
    pub pressure_low: f64,
    /// Sea-level pressure change over the trend window
    pub trend_delta: f64,
    pub sealevel_pressure: f64,
    /// Local calendar month, 1..=12
    pub month: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZambrettiForecast {
    pub number: u8,
    pub letter: char,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tendency {
    Rising,
    Steady,
    Falling,
}

impl ConversionEngine {
    /// Forecast number 0..=25
    #[must_use]
    pub fn zambretti_value(&self, input: &ZambrettiInput) -> u8 {
        let threshold = match self.unit_system {
            UnitSystem::Metric => 1.6,
            UnitSystem::Imperial => 0.047,
        };
        let tendency = if input.trend_delta >= threshold {
            Tendency::Rising
        } else if input.trend_delta <= -threshold {
            Tendency::Falling
        } else {
            Tendency::Steady
        };

        let range = input.pressure_high - input.pressure_low;
        let mut pressure = input.sealevel_pressure;

        let point = (((input.wind_bearing.rem_euclid(360.0) + 11.25) / 22.5).floor() as usize)
            % NORTH_WIND_ADJUSTMENT.len();
        let point = if input.latitude >= 0.0 {
            point
        } else {
            (point + 8) % NORTH_WIND_ADJUSTMENT.len()
        };
        pressure += range * NORTH_WIND_ADJUSTMENT[point] / 100.0;

        let summer = if input.latitude >= 0.0 {
            (4..=9).contains(&input.month)
        } else {
            !(4..=9).contains(&input.month)
        };
        if summer {
            match tendency {
                Tendency::Rising => pressure += range * SEASON_ADJUSTMENT / 100.0,
                Tendency::Falling => pressure -= range * SEASON_ADJUSTMENT / 100.0,
                Tendency::Steady => {}
            }
        }

        let step = range / RISE_OPTIONS.len() as f64;
        let option = ((pressure - input.pressure_low) / step)
            .floor()
            .clamp(0.0, (RISE_OPTIONS.len() - 1) as f64) as usize;

        match tendency {
            Tendency::Rising => RISE_OPTIONS[option],
            Tendency::Steady => STEADY_OPTIONS[option],
            Tendency::Falling => FALL_OPTIONS[option],
        }
    }

    /// Letter and text for a forecast number
    #[must_use]
    pub fn zambretti_forecast(&self, number: u8) -> ZambrettiForecast {
        let letter = char::from(b'A' + number.min(25));
        ZambrettiForecast {
            number,
            letter,
            text: self
                .translations
                .lookup(Table::Zambretti, &letter.to_string()),
        }
    }
}
