//! Threshold ladders mapping readings onto descriptive buckets

use super::{ConversionEngine, Table, UnitSystem, require};
use crate::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

const COMPASS_POINTS: [&str; 17] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW", "N",
];

const PRECIP_TYPES: [&str; 4] = ["none", "rain", "hail", "heavy"];

/// Device sensor fault bits and their names
pub const DEVICE_STATUS_MASKS: [(u32, &str); 11] = [
    (0b0_0000_0001, "Lightning"),
    (0b0_0000_0010, "Lightning Noise"),
    (0b0_0000_0100, "Lightning Disturber"),
    (0b0_0000_1000, "Pressure"),
    (0b0_0001_0000, "Temperature"),
    (0b0_0010_0000, "Humidity"),
    (0b0_0100_0000, "Wind"),
    (0b0_1000_0000, "Precipitation"),
    (0b1_0000_0000, "Light/UV"),
    (0x0000_8000, "Power Booster Depleted"),
    (0x0001_0000, "Power Booster Shore Power"),
];

/// Beaufort force with its description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beaufort {
    pub value: u8,
    pub text: String,
}

/// Tempest power-save mode with its description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryMode {
    pub mode: u8,
    pub description: String,
}

impl ConversionEngine {
    /// Beaufort force from wind speed in m/s; absent wind counts as calm
    #[must_use]
    pub fn beaufort(&self, wind_speed: Option<f64>) -> Beaufort {
        let value = match wind_speed {
            Some(v) if v > 32.7 => 12,
            Some(v) if v >= 28.5 => 11,
            Some(v) if v >= 24.5 => 10,
            Some(v) if v >= 20.8 => 9,
            Some(v) if v >= 17.2 => 8,
            Some(v) if v >= 13.9 => 7,
            Some(v) if v >= 10.8 => 6,
            Some(v) if v >= 8.0 => 5,
            Some(v) if v >= 5.5 => 4,
            Some(v) if v >= 3.4 => 3,
            Some(v) if v >= 1.6 => 2,
            Some(v) if v >= 0.3 => 1,
            _ => 0,
        };
        Beaufort {
            value,
            text: self.translations.lookup(Table::Beaufort, &value.to_string()),
        }
    }

    /// 16-point compass name for a bearing in degrees
    #[must_use]
    pub fn direction(&self, degrees: f64) -> String {
        let index = ((degrees + 11.25) / 22.5).floor();
        if !(0.0..COMPASS_POINTS.len() as f64).contains(&index) {
            warn!(degrees, "Wind bearing outside the compass");
            return format!("Unknown - {degrees}");
        }
        self.translations
            .lookup(Table::WindDirection, COMPASS_POINTS[index as usize])
    }

    /// Precipitation type from the protocol code
    #[must_use]
    pub fn rain_type(&self, code: f64) -> String {
        match PRECIP_TYPES.get(code as usize) {
            Some(key) if code >= 0.0 => self.translations.lookup(Table::PrecipType, key),
            _ => {
                warn!(code, "Unknown precipitation type");
                format!("Unknown - {code}")
            }
        }
    }

    /// Rain intensity from an hourly rate in mm/h
    #[must_use]
    pub fn rain_intensity(&self, rate_mm_per_hour: f64) -> String {
        let key = if rate_mm_per_hour == 0.0 {
            "NONE"
        } else if rate_mm_per_hour < 0.25 {
            "VERYLIGHT"
        } else if rate_mm_per_hour < 1.0 {
            "LIGHT"
        } else if rate_mm_per_hour < 4.0 {
            "MODERATE"
        } else if rate_mm_per_hour < 16.0 {
            "HEAVY"
        } else if rate_mm_per_hour < 50.0 {
            "VERYHEAVY"
        } else {
            "EXTREME"
        };
        self.translations.lookup(Table::RainIntensity, key)
    }

    /// Comfort level for a dewpoint already in output units
    #[must_use]
    pub fn dewpoint_level(&self, dewpoint: f64) -> String {
        let fahrenheit = match self.unit_system {
            UnitSystem::Imperial => dewpoint,
            UnitSystem::Metric => dewpoint * 9.0 / 5.0 + 32.0,
        };

        let key = if fahrenheit >= 80.0 {
            "severely-high"
        } else if fahrenheit >= 75.0 {
            "miserable"
        } else if fahrenheit >= 70.0 {
            "oppressive"
        } else if fahrenheit >= 65.0 {
            "uncomfortable"
        } else if fahrenheit >= 60.0 {
            "ok-for-most"
        } else if fahrenheit >= 55.0 {
            "comfortable"
        } else if fahrenheit >= 50.0 {
            "very-comfortable"
        } else if fahrenheit >= 30.0 {
            "somewhat-dry"
        } else if fahrenheit >= 0.5 {
            "dry"
        } else if fahrenheit >= 0.0 {
            "very-dry"
        } else {
            "undefined"
        };
        self.translations.lookup(Table::Dewpoint, key)
    }

    /// Comfort level for a raw air temperature in °C
    #[must_use]
    pub fn temperature_level(&self, celsius: f64) -> String {
        let fahrenheit = celsius * 9.0 / 5.0 + 32.0;

        let key = if fahrenheit >= 104.0 {
            "inferno"
        } else if fahrenheit >= 95.0 {
            "very-hot"
        } else if fahrenheit >= 86.0 {
            "hot"
        } else if fahrenheit >= 77.0 {
            "warm"
        } else if fahrenheit >= 68.0 {
            "nice"
        } else if fahrenheit >= 59.0 {
            "cool"
        } else if fahrenheit >= 41.0 {
            "chilly"
        } else if fahrenheit >= 32.0 {
            "cold"
        } else if fahrenheit >= 20.0 {
            "freezing"
        } else if fahrenheit <= 20.0 {
            "fridged"
        } else {
            // NaN
            "undefined"
        };
        self.translations.lookup(Table::Temperature, key)
    }

    #[must_use]
    pub fn uv_level(&self, uv_index: f64) -> String {
        let key = if uv_index >= 10.5 {
            "extreme"
        } else if uv_index >= 7.5 {
            "very-high"
        } else if uv_index >= 5.5 {
            "high"
        } else if uv_index >= 2.5 {
            "moderate"
        } else if uv_index > 0.0 {
            "low"
        } else {
            "none"
        };
        self.translations.lookup(Table::Uv, key)
    }

    /// Tempest power-save mode.
    ///
    /// Above 100 W/m² the battery is assumed to be charging, which shifts the
    /// thresholds between modes 1..3.
    pub fn battery_mode(
        &self,
        voltage: Option<f64>,
        solar_radiation: Option<f64>,
    ) -> Result<BatteryMode> {
        let v = require("battery", voltage)?;
        let sr = require("solar_radiation", solar_radiation)?;

        let mode = if v >= 2.455 {
            0
        } else if v <= 2.355 {
            3
        } else if sr > 100.0 {
            if v >= 2.41 {
                1
            } else if v > 2.375 {
                2
            } else {
                3
            }
        } else if v > 2.415 {
            0
        } else if v > 2.39 {
            1
        } else {
            2
        };

        Ok(BatteryMode {
            mode,
            description: self
                .translations
                .lookup(Table::BatteryMode, &mode.to_string()),
        })
    }

    /// Pressure trend text
    #[must_use]
    pub fn trend_text(&self, key: &str) -> String {
        self.translations.lookup(Table::Trend, key)
    }
}

/// Names of the fault bits set in a device `sensor_status` word
#[must_use]
pub fn device_status(bits: u32) -> Vec<&'static str> {
    DEVICE_STATUS_MASKS
        .iter()
        .filter(|(mask, _)| bits & mask != 0)
        .map(|(_, name)| *name)
        .collect()
}

/// Readings behind the current-conditions state, metric units
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConditionInputs {
    pub lightning_count_1hr: usize,
    /// Raw precipitation type code
    pub precipitation_type: Option<f64>,
    /// mm/h
    pub rain_rate: f64,
    /// m/s
    pub wind_speed: Option<f64>,
    /// degrees
    pub solar_elevation: f64,
    /// W/m²
    pub solar_radiation: Option<f64>,
    /// Clear-sky W/m²
    pub solar_insolation: f64,
    /// percent
    pub snow_probability: f64,
    pub fog_probability: f64,
}

/// Gale force 6 and up counts as windy
const WINDY_SPEED: f64 = 10.8;
const FOG_LIKELY: f64 = 80.0;

/// Weather state key such as `rainy` or `partlycloudy`.
///
/// Storms win over precipitation, precipitation over wind and fog. By day
/// the sky is judged by measured radiation against clear-sky insolation.
#[must_use]
pub fn current_conditions(inputs: &ConditionInputs) -> &'static str {
    let raining = inputs.rain_rate > 0.0;

    if inputs.lightning_count_1hr > 0 {
        return if raining { "lightning-rainy" } else { "lightning" };
    }
    if raining {
        return match inputs.precipitation_type {
            Some(code) if code == 2.0 => "hail",
            _ if inputs.snow_probability >= 50.0 => "snowy",
            _ if inputs.snow_probability >= 20.0 => "snowy-rainy",
            _ => "rainy",
        };
    }
    if inputs.wind_speed.is_some_and(|speed| speed >= WINDY_SPEED) {
        return "windy";
    }
    if inputs.fog_probability >= FOG_LIKELY {
        return "fog";
    }
    if inputs.solar_elevation <= 0.0 {
        return "clear-night";
    }

    match inputs.solar_radiation {
        Some(radiation) if inputs.solar_insolation > 0.0 => {
            let clearness = radiation / inputs.solar_insolation;
            if clearness >= 0.75 {
                "sunny"
            } else if clearness >= 0.4 {
                "partlycloudy"
            } else {
                "cloudy"
            }
        }
        _ => "cloudy",
    }
}

/// Seconds as `H:MM:SS`, prefixed with whole days
#[must_use]
pub fn humanize_time(seconds: u64) -> String {
    let days = seconds / 86_400;
    let rest = seconds % 86_400;
    let clock = format!("{}:{:02}:{:02}", rest / 3600, (rest % 3600) / 60, rest % 60);
    match days {
        0 => clock,
        1 => format!("1 day, {clock}"),
        n => format!("{n} days, {clock}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn metric() -> ConversionEngine {
        ConversionEngine::english(UnitSystem::Metric)
    }

    fn imperial() -> ConversionEngine {
        ConversionEngine::english(UnitSystem::Imperial)
    }

    #[rstest]
    #[case(0.2, 0, "Calm")]
    #[case(0.3, 1, "Light air")]
    #[case(5.5, 4, "Moderate breeze")]
    #[case(32.7, 11, "Violent storm")]
    #[case(40.0, 12, "Hurricane")]
    fn test_beaufort(#[case] speed: f64, #[case] value: u8, #[case] text: &str) {
        let bft = metric().beaufort(Some(speed));
        assert_eq!(bft.value, value);
        assert_eq!(bft.text, text);
    }

    #[test]
    fn test_beaufort_absent_is_calm() {
        assert_eq!(metric().beaufort(None).value, 0);
    }

    #[rstest]
    #[case(0.0, "N")]
    #[case(11.24, "N")]
    #[case(11.25, "NNE")]
    #[case(180.0, "S")]
    #[case(350.0, "N")]
    #[case(359.9, "N")]
    fn test_direction(#[case] degrees: f64, #[case] expected: &str) {
        assert_eq!(metric().direction(degrees), expected);
    }

    #[test]
    fn test_direction_out_of_range() {
        assert_eq!(metric().direction(400.0), "Unknown - 400");
        assert!(metric().direction(-20.0).starts_with("Unknown"));
    }

    #[test]
    fn test_rain_type() {
        assert_eq!(metric().rain_type(1.0), "Rain");
        assert_eq!(metric().rain_type(3.0), "Heavy rain + hail");
        assert_eq!(metric().rain_type(7.0), "Unknown - 7");
    }

    #[rstest]
    #[case(0.0, "None")]
    #[case(0.1, "Very light")]
    #[case(0.25, "Light")]
    #[case(1.0, "Moderate")]
    #[case(4.0, "Heavy")]
    #[case(16.0, "Very heavy")]
    #[case(50.0, "Extreme")]
    fn test_rain_intensity_boundaries(#[case] rate: f64, #[case] expected: &str) {
        assert_eq!(metric().rain_intensity(rate), expected);
    }

    #[test]
    fn test_dewpoint_level_boundary() {
        let cnv = imperial();
        assert_eq!(
            cnv.dewpoint_level(80.0),
            "Severely high, even deadly for asthma related illnesses"
        );
        assert_eq!(
            cnv.dewpoint_level(79.9),
            "Extremely uncomfortable, fairly oppressive"
        );
        assert_eq!(cnv.dewpoint_level(-1.0), "Undefined");
    }

    #[test]
    fn test_dewpoint_level_metric_converts() {
        // 10 °C is 50 °F
        assert_eq!(metric().dewpoint_level(10.0), "Very comfortable");
    }

    #[rstest]
    #[case(40.0, "Inferno")]
    #[case(20.0, "Nice")]
    #[case(0.0, "Cold")]
    #[case(-10.0, "Fridged")]
    fn test_temperature_level(#[case] celsius: f64, #[case] expected: &str) {
        assert_eq!(metric().temperature_level(celsius), expected);
    }

    #[rstest]
    #[case(11.0, "Extreme")]
    #[case(7.5, "Very high")]
    #[case(2.5, "Moderate")]
    #[case(0.1, "Low")]
    #[case(0.0, "None")]
    fn test_uv_level(#[case] uv: f64, #[case] expected: &str) {
        assert_eq!(metric().uv_level(uv), expected);
    }

    #[rstest]
    #[case(2.50, 0.0, 0)]
    #[case(2.30, 500.0, 3)]
    #[case(2.42, 500.0, 1)]
    #[case(2.38, 500.0, 2)]
    #[case(2.37, 500.0, 3)]
    #[case(2.42, 0.0, 0)]
    #[case(2.40, 0.0, 1)]
    #[case(2.36, 0.0, 2)]
    fn test_battery_mode(#[case] voltage: f64, #[case] sr: f64, #[case] mode: u8) {
        let result = metric().battery_mode(Some(voltage), Some(sr)).unwrap();
        assert_eq!(result.mode, mode);
        assert!(!result.description.starts_with("Unknown"));
    }

    #[test]
    fn test_device_status_bits() {
        assert!(device_status(0).is_empty());
        assert_eq!(device_status(0b1_0001), vec!["Lightning", "Temperature"]);
        assert_eq!(device_status(0x1_0000), vec!["Power Booster Shore Power"]);
        assert_eq!(device_status(0x8000), vec!["Power Booster Depleted"]);
    }

    #[rstest]
    #[case(0, "0:00:00")]
    #[case(3725, "1:02:05")]
    #[case(86_400, "1 day, 0:00:00")]
    #[case(2 * 86_400 + 3 * 3600 + 4 * 60 + 5, "2 days, 3:04:05")]
    fn test_humanize_time(#[case] seconds: u64, #[case] expected: &str) {
        assert_eq!(humanize_time(seconds), expected);
    }

    fn daytime() -> ConditionInputs {
        ConditionInputs {
            solar_elevation: 40.0,
            solar_radiation: Some(800.0),
            solar_insolation: 900.0,
            wind_speed: Some(2.0),
            ..ConditionInputs::default()
        }
    }

    #[rstest]
    #[case(ConditionInputs { lightning_count_1hr: 2, rain_rate: 3.0, ..daytime() }, "lightning-rainy")]
    #[case(ConditionInputs { lightning_count_1hr: 1, ..daytime() }, "lightning")]
    #[case(ConditionInputs { rain_rate: 1.2, precipitation_type: Some(2.0), ..daytime() }, "hail")]
    #[case(ConditionInputs { rain_rate: 1.2, snow_probability: 60.0, ..daytime() }, "snowy")]
    #[case(ConditionInputs { rain_rate: 1.2, snow_probability: 20.0, ..daytime() }, "snowy-rainy")]
    #[case(ConditionInputs { rain_rate: 1.2, ..daytime() }, "rainy")]
    #[case(ConditionInputs { wind_speed: Some(12.0), ..daytime() }, "windy")]
    #[case(ConditionInputs { fog_probability: 80.0, ..daytime() }, "fog")]
    #[case(ConditionInputs { solar_elevation: -4.0, ..daytime() }, "clear-night")]
    #[case(daytime(), "sunny")]
    #[case(ConditionInputs { solar_radiation: Some(450.0), ..daytime() }, "partlycloudy")]
    #[case(ConditionInputs { solar_radiation: Some(100.0), ..daytime() }, "cloudy")]
    #[case(ConditionInputs { solar_radiation: None, ..daytime() }, "cloudy")]
    fn test_current_conditions(#[case] inputs: ConditionInputs, #[case] expected: &str) {
        assert_eq!(current_conditions(&inputs), expected);
    }
}
