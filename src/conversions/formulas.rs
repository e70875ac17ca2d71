//! Derived meteorological quantities
//!
//! Every formula takes its physical inputs as `Option` and reports an absent
//! one as [`StationError::MissingInput`]; the caller decides whether to omit
//! the field. Inputs are raw protocol units: °C, %, hPa, m/s, W/m², metres.

use super::{ConversionEngine, UnitSystem, require, round_to};
use crate::{Result, StationError};
use tracing::warn;

const WETBULB_MAX_ITERATIONS: usize = 10_000;
/// Above these (°C) snow cannot survive the fall
const SNOW_MAX_TEMPERATURE: f64 = 6.0;
const SNOW_MAX_WETBULB: f64 = 3.0;

/// 0 °C isotherm in feet above sea level, never below the station
fn freezing_level_ft(temperature: f64, elevation_m: f64) -> f64 {
    let elevation_ft = elevation_m * 3.280_84;
    let fahrenheit = temperature * 9.0 / 5.0 + 32.0;
    (elevation_ft + 192.0 * (fahrenheit - 32.0)).max(elevation_ft)
}

impl ConversionEngine {
    /// Magnus-formula dewpoint.
    ///
    /// With `no_conversion` the value stays in °C (1 decimal) for use by
    /// other formulas.
    pub fn dewpoint(
        &self,
        temperature: Option<f64>,
        humidity: Option<f64>,
        no_conversion: bool,
    ) -> Result<f64> {
        let t = require("air_temperature", temperature)?;
        let h = require("relative_humidity", humidity)?;
        if h <= 0.0 {
            warn!(humidity = h, "Humidity must be positive for a dewpoint");
            return Err(StationError::missing_input("relative_humidity"));
        }

        let gamma = (h / 100.0).ln() + (17.625 * t) / (243.04 + t);
        let dewpoint_c = round_to(243.04 * gamma / (17.625 - gamma), 1);

        if no_conversion {
            Ok(dewpoint_c)
        } else {
            Ok(self.temperature(dewpoint_c))
        }
    }

    /// Ideal-gas air density in kg/m³ (metric) or lb/ft³ (imperial)
    pub fn air_density(&self, temperature: Option<f64>, station_pressure: Option<f64>) -> Result<f64> {
        let t = require("air_temperature", temperature)?;
        let p = require("station_pressure", station_pressure)?;

        let density = (p * 100.0) / (287.058 * (t + 273.15));
        Ok(match self.unit_system {
            UnitSystem::Imperial => round_to(density * 0.06243, 4),
            UnitSystem::Metric => round_to(density, 2),
        })
    }

    /// Station pressure reduced to sea level with the standard atmosphere
    pub fn sea_level_pressure(&self, station_pressure: Option<f64>, elevation_m: f64) -> Result<f64> {
        const GRAVITY: f64 = 9.80665;
        const GAS_CONSTANT: f64 = 287.05;
        const LAPSE_RATE: f64 = 0.0065;
        const STD_PRESSURE: f64 = 1013.25;
        const STD_TEMPERATURE: f64 = 288.15;

        let p = require("station_pressure", station_pressure)?;

        let l = GRAVITY / (GAS_CONSTANT * LAPSE_RATE);
        let c = GAS_CONSTANT * LAPSE_RATE / GRAVITY;
        let u = (1.0 + (STD_PRESSURE / p).powf(c) * (LAPSE_RATE * elevation_m / STD_TEMPERATURE))
            .powf(l);

        Ok(self.pressure(p * u))
    }

    /// Psychrometric wet-bulb temperature.
    ///
    /// Walks a guess from 0 °C in steps of 10, dividing the step by ten each
    /// time the vapour-pressure difference changes sign, until it is within
    /// 0.005 hPa.
    pub fn wetbulb(
        &self,
        temperature: Option<f64>,
        humidity: Option<f64>,
        pressure: Option<f64>,
        no_conversion: bool,
    ) -> Result<f64> {
        let t = require("air_temperature", temperature)?;
        let rh = require("relative_humidity", humidity)?;
        let p = require("station_pressure", pressure)?;

        let es = 6.112 * (17.67 * t / (t + 243.5)).exp();
        let e2 = es * (rh / 100.0);

        let mut difference: f64 = 1.0;
        let mut guess: f64 = 0.0;
        let mut previous_sign: f64 = 1.0;
        let mut increment: f64 = 10.0;
        let mut iterations = 0;

        while difference.abs() > 0.005 {
            iterations += 1;
            if iterations > WETBULB_MAX_ITERATIONS {
                warn!(t, rh, p, "Wet-bulb search did not converge");
                return Err(StationError::missing_input("wetbulb"));
            }

            let ew = 6.112 * ((17.67 * guess) / (guess + 243.5)).exp();
            let eg = ew - p * (t - guess) * 0.00066 * (1.0 + 0.00115 * guess);
            difference = e2 - eg;
            if difference == 0.0 {
                break;
            }

            let sign = if difference < 0.0 { -1.0 } else { 1.0 };
            if sign != previous_sign {
                previous_sign = sign;
                increment /= 10.0;
            }
            guess += increment * previous_sign;
        }

        if no_conversion {
            Ok(guess)
        } else {
            Ok(self.temperature(guess))
        }
    }

    /// Wet-bulb globe temperature estimated from solar radiation
    pub fn wbgt(
        &self,
        temperature: Option<f64>,
        humidity: Option<f64>,
        pressure: Option<f64>,
        solar_radiation: Option<f64>,
    ) -> Result<f64> {
        let sr = require("solar_radiation", solar_radiation)?;
        let twb = self.wetbulb(temperature, humidity, pressure, true)?;
        let ta = require("air_temperature", temperature)?;
        let rh = require("relative_humidity", humidity)?;

        let wbgt = round_to(
            0.7 * twb + 0.002996 * sr + 0.3368 * ta - 0.01578 * rh - 0.5478,
            1,
        );
        Ok(match self.unit_system {
            UnitSystem::Imperial => self.temperature(wbgt),
            UnitSystem::Metric => wbgt,
        })
    }

    /// Dry-bulb minus wet-bulb, both in output units
    pub fn delta_t(
        &self,
        temperature: Option<f64>,
        humidity: Option<f64>,
        pressure: Option<f64>,
    ) -> Result<f64> {
        let wetbulb = self.wetbulb(temperature, humidity, pressure, false)?;
        let t = require("air_temperature", temperature)?;
        Ok(round_to(self.temperature(t) - wetbulb, 1))
    }

    /// Grams of water per cubic metre of air
    pub fn absolute_humidity(&self, temperature: Option<f64>, humidity: Option<f64>) -> Result<f64> {
        let t = require("air_temperature", temperature)?;
        let h = require("relative_humidity", humidity)?;

        let tk = t + 273.16;
        let rh = h / 100.0;
        let ah = (1320.65 / tk) * rh * 10f64.powf((7.4475 * (tk - 273.14)) / (tk - 39.44));
        Ok(round_to(ah, 2))
    }

    /// Apparent temperature from heat, humidity and wind.
    ///
    /// Any absent input yields 0 instead of an error. Suspicious, but
    /// downstream consumers rely on it.
    #[must_use]
    pub fn feels_like(
        &self,
        temperature: Option<f64>,
        humidity: Option<f64>,
        wind_speed: Option<f64>,
    ) -> f64 {
        let (Some(t), Some(h), Some(w)) = (temperature, humidity, wind_speed) else {
            return 0.0;
        };
        let e = h * 0.06105 * ((17.27 * t) / (237.7 + t)).exp();
        self.temperature(t + 0.348 * e - 0.7 * w - 4.25)
    }

    /// Horizon visibility in km or miles, attenuated by humidity
    pub fn visibility(
        &self,
        elevation_m: f64,
        temperature: Option<f64>,
        humidity: Option<f64>,
    ) -> Result<f64> {
        let dewpoint_c = self.dewpoint(temperature, humidity, true)?;
        let t = require("air_temperature", temperature)?;

        // below-sea-level stations still see some horizon
        let elevation = elevation_m.max(2.0);
        let max_visibility = 3.56972 * elevation.sqrt();
        let reduction = ((1.13 * (t - dewpoint_c).abs() - 1.15) / 10.0).clamp(0.025, 1.0);
        let visibility = max_visibility * reduction;

        Ok(match self.unit_system {
            UnitSystem::Imperial => round_to(visibility / 1.609_344, 1),
            UnitSystem::Metric => round_to(visibility, 1),
        })
    }

    /// Cumulus cloud base above sea level, whole metres or feet
    pub fn cloud_base(
        &self,
        temperature: Option<f64>,
        dewpoint_c: Option<f64>,
        elevation_m: f64,
    ) -> Result<f64> {
        let t = require("air_temperature", temperature)?;
        let td = require("dewpoint", dewpoint_c)?;
        Ok(self.height((t - td) * 126.7 + elevation_m))
    }

    /// Height of the 0 °C isotherm, whole metres or feet
    pub fn freezing_level(&self, temperature: Option<f64>, elevation_m: f64) -> Result<f64> {
        let t = require("air_temperature", temperature)?;
        let level_ft = freezing_level_ft(t, elevation_m);

        Ok(match self.unit_system {
            UnitSystem::Imperial => level_ft.round(),
            UnitSystem::Metric => (level_ft / 3.280_84).round(),
        })
    }

    /// Chance of fog in percent, 20 points per favourable condition
    pub fn fog_probability(
        &self,
        solar_elevation: Option<f64>,
        wind_speed: Option<f64>,
        humidity: Option<f64>,
        dewpoint_c: Option<f64>,
        temperature: Option<f64>,
    ) -> Result<f64> {
        let elevation = require("solar_elevation", solar_elevation)?;
        let wind = require("wind_speed", wind_speed)?;
        let rh = require("relative_humidity", humidity)?;
        let td = require("dewpoint", dewpoint_c)?;
        let t = require("air_temperature", temperature)?;

        let conditions = [
            elevation < 10.0,
            wind < 5.0,
            rh > 90.0,
            (t - td).abs() < 2.5,
            t < 10.0,
        ];
        let met = conditions.iter().filter(|&&c| c).count();
        Ok((met * 20) as f64)
    }

    /// Chance in percent that precipitation reaches the ground as snow.
    ///
    /// Scored from the wet-bulb and air temperature, a sub-zero dewpoint, a
    /// freezing level within 300 m of the station and a cloud base at or
    /// above the freezing level. Warm air short-circuits to 0.
    pub fn snow_probability(
        &self,
        temperature: Option<f64>,
        humidity: Option<f64>,
        pressure: Option<f64>,
        elevation_m: f64,
    ) -> Result<f64> {
        let t = require("air_temperature", temperature)?;
        if t > SNOW_MAX_TEMPERATURE {
            return Ok(0.0);
        }
        let wetbulb = self.wetbulb(temperature, humidity, pressure, true)?;
        if wetbulb > SNOW_MAX_WETBULB {
            return Ok(0.0);
        }
        let dewpoint = self.dewpoint(temperature, humidity, true)?;
        let freezing_m = freezing_level_ft(t, elevation_m) / 3.280_84;
        let cloud_base_m = (t - dewpoint) * 126.7 + elevation_m;

        let mut score: u8 = 0;
        score += if wetbulb <= 0.0 {
            40
        } else if wetbulb <= 1.5 {
            20
        } else {
            0
        };
        score += if t <= 1.0 {
            20
        } else if t <= 3.0 {
            10
        } else {
            0
        };
        if dewpoint <= 0.0 {
            score += 10;
        }
        if freezing_m - elevation_m < 300.0 {
            score += 20;
        }
        if cloud_base_m >= freezing_m {
            score += 10;
        }
        Ok(f64::from(score))
    }

    /// Circular mean of wind bearings in [0, 360)
    #[must_use]
    pub fn average_bearing(&self, bearings: &[f64]) -> Option<f64> {
        if bearings.is_empty() {
            return None;
        }
        let (sin, cos) = bearings
            .iter()
            .map(|deg| deg.to_radians())
            .fold((0.0_f64, 0.0_f64), |(s, c), rad| (s + rad.sin(), c + rad.cos()));

        // abs() only clears a negative zero
        Some(sin.atan2(cos).to_degrees().round().rem_euclid(360.0).abs())
    }

    /// Battery charge in percent for the device's hardware family
    pub fn battery_level(&self, voltage: Option<f64>, is_tempest: bool) -> Result<u8> {
        let v = require("battery", voltage)?;

        let (empty, full, span) = if is_tempest {
            (1.8, 2.80, 1.0)
        } else {
            (2.4, 3.50, 1.1)
        };

        Ok(if v > full {
            100
        } else if v < empty {
            0
        } else {
            ((v - empty) / span * 100.0) as u8
        })
    }
}
