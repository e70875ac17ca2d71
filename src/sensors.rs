//! Declarative table of output fields
//!
//! Each entry names one field of an air or sky record, the device families
//! that report it, its unit labels and the function computing it from a
//! [`SensorContext`]. A compute function returning `Err` means an input was
//! absent; the field is then left out of the record.

use crate::config::StationConfig;
use crate::conversions::classify::{ConditionInputs, current_conditions};
use crate::conversions::{ConversionEngine, ZambrettiInput, require, round_to};
use crate::observation::{AirReading, DeviceFamily, SkyReading};
use crate::store::{PressureTrend, StorageRecord};
use crate::{Result, StationError};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

/// Which half of a station's readings a field belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorGroup {
    Air,
    Sky,
}

/// Everything a compute function may read
#[derive(Debug)]
pub struct SensorContext<'a> {
    pub cnv: &'a ConversionEngine,
    pub station: &'a StationConfig,
    pub storage: &'a StorageRecord,
    pub family: DeviceFamily,
    pub air: AirReading,
    pub sky: SkyReading,
    /// Last rapid-wind speed in m/s
    pub wind_speed: Option<f64>,
    /// Last sky-group solar radiation in W/m²
    pub solar_radiation: Option<f64>,
    /// Last sky-group average wind bearing in degrees
    pub wind_bearing_avg: Option<f64>,
    /// Last sky-group rain rate in mm/h
    pub rain_rate: Option<f64>,
    /// Last sky-group precipitation type code
    pub precipitation_type: Option<f64>,
    pub pressure_trend: Option<PressureTrend>,
    pub lightning_count_1hr: usize,
    pub lightning_count_3hr: usize,
    pub now: DateTime<Utc>,
    pub local_month: u32,
    pub last_midnight: DateTime<Utc>,
}

pub struct SensorDescription {
    pub id: &'static str,
    pub group: SensorGroup,
    pub devices: &'static [DeviceFamily],
    pub unit_metric: Option<&'static str>,
    pub unit_imperial: Option<&'static str>,
    pub compute: fn(&SensorContext<'_>) -> Result<Value>,
}

impl SensorDescription {
    #[must_use]
    pub fn applies_to(&self, group: SensorGroup, family: DeviceFamily) -> bool {
        self.group == group && self.devices.contains(&family)
    }

    #[must_use]
    pub fn unit(&self, cnv: &ConversionEngine) -> Option<&'static str> {
        if cnv.is_imperial() {
            self.unit_imperial
        } else {
            self.unit_metric
        }
    }
}

const AIR_UNITS: &[DeviceFamily] = &[DeviceFamily::Air, DeviceFamily::Tempest];
const SKY_UNITS: &[DeviceFamily] = &[DeviceFamily::Sky, DeviceFamily::Tempest];
const AIR_ONLY: &[DeviceFamily] = &[DeviceFamily::Air];
const SKY_ONLY: &[DeviceFamily] = &[DeviceFamily::Sky];
const TEMPEST_ONLY: &[DeviceFamily] = &[DeviceFamily::Tempest];

fn timestamp(at: Option<DateTime<Utc>>) -> Value {
    at.map_or(Value::Null, |t| json!(t.to_rfc3339()))
}

fn sealevel_pressure(ctx: &SensorContext<'_>) -> Result<f64> {
    ctx.cnv
        .sea_level_pressure(ctx.air.station_pressure, ctx.station.elevation_m)
}

fn trend(ctx: &SensorContext<'_>) -> Result<PressureTrend> {
    ctx.pressure_trend
        .ok_or_else(|| StationError::missing_input("sealevel_pressure"))
}

fn solar_elevation(ctx: &SensorContext<'_>) -> f64 {
    ctx.cnv
        .solar_elevation(ctx.station.latitude, ctx.station.longitude, ctx.now)
}

fn zambretti_number(ctx: &SensorContext<'_>) -> Result<u8> {
    let input = ZambrettiInput {
        latitude: ctx.station.latitude,
        wind_bearing: require("wind_bearing_avg", ctx.wind_bearing_avg)?,
        pressure_high: ctx.cnv.pressure(ctx.station.zambretti_max_pressure_hpa),
        pressure_low: ctx.cnv.pressure(ctx.station.zambretti_min_pressure_hpa),
        trend_delta: trend(ctx)?.delta,
        sealevel_pressure: sealevel_pressure(ctx)?,
        month: ctx.local_month,
    };
    Ok(ctx.cnv.zambretti_value(&input))
}

/// Fog chance, with any absent input counting as no fog
fn fog_probability(ctx: &SensorContext<'_>) -> f64 {
    let dewpoint_c = ctx
        .cnv
        .dewpoint(ctx.air.air_temperature, ctx.air.relative_humidity, true)
        .ok();
    ctx.cnv
        .fog_probability(
            Some(solar_elevation(ctx)),
            ctx.wind_speed,
            ctx.air.relative_humidity,
            dewpoint_c,
            ctx.air.air_temperature,
        )
        .unwrap_or(0.0)
}

fn snow_probability(ctx: &SensorContext<'_>) -> Result<f64> {
    ctx.cnv.snow_probability(
        ctx.air.air_temperature,
        ctx.air.relative_humidity,
        ctx.air.station_pressure,
        ctx.station.elevation_m,
    )
}

fn condition_inputs(ctx: &SensorContext<'_>) -> ConditionInputs {
    ConditionInputs {
        lightning_count_1hr: ctx.lightning_count_1hr,
        precipitation_type: ctx.precipitation_type,
        rain_rate: ctx.rain_rate.unwrap_or(0.0),
        wind_speed: ctx.wind_speed,
        solar_elevation: solar_elevation(ctx),
        solar_radiation: ctx.solar_radiation,
        solar_insolation: ctx.cnv.solar_insolation(
            ctx.station.elevation_m,
            ctx.station.latitude,
            ctx.station.longitude,
            ctx.now,
        ),
        snow_probability: snow_probability(ctx).unwrap_or(0.0),
        fog_probability: fog_probability(ctx),
    }
}

/// Sky battery fields are the same physical reading under different names
fn battery_voltage(ctx: &SensorContext<'_>) -> Result<f64> {
    require("battery", ctx.sky.battery).map(|v| round_to(v, 2))
}

pub static SENSORS: &[SensorDescription] = &[
    // Air group
    SensorDescription {
        id: "station_pressure",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: Some("hPa"),
        unit_imperial: Some("inHg"),
        compute: |ctx| {
            let p = require("station_pressure", ctx.air.station_pressure)?;
            Ok(json!(ctx.cnv.pressure(p)))
        },
    },
    SensorDescription {
        id: "air_temperature",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: Some("°C"),
        unit_imperial: Some("°F"),
        compute: |ctx| {
            let t = require("air_temperature", ctx.air.air_temperature)?;
            Ok(json!(ctx.cnv.temperature(t)))
        },
    },
    SensorDescription {
        id: "relative_humidity",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: Some("%"),
        unit_imperial: Some("%"),
        compute: |ctx| Ok(json!(require("relative_humidity", ctx.air.relative_humidity)?)),
    },
    SensorDescription {
        id: "lightning_strike_count",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: None,
        unit_imperial: None,
        compute: |ctx| Ok(json!(require("lightning_count", ctx.air.lightning_count)?)),
    },
    SensorDescription {
        id: "lightning_strike_count_1hr",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: None,
        unit_imperial: None,
        compute: |ctx| Ok(json!(ctx.lightning_count_1hr)),
    },
    SensorDescription {
        id: "lightning_strike_count_3hr",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: None,
        unit_imperial: None,
        compute: |ctx| Ok(json!(ctx.lightning_count_3hr)),
    },
    SensorDescription {
        id: "lightning_strike_count_today",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: None,
        unit_imperial: None,
        compute: |ctx| Ok(json!(ctx.storage.lightning_count_today)),
    },
    SensorDescription {
        id: "lightning_strike_distance",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: Some("km"),
        unit_imperial: Some("mi"),
        compute: |ctx| Ok(json!(ctx.cnv.distance(ctx.storage.last_lightning_distance))),
    },
    SensorDescription {
        id: "lightning_strike_energy",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: None,
        unit_imperial: None,
        compute: |ctx| Ok(json!(ctx.storage.last_lightning_energy)),
    },
    SensorDescription {
        id: "lightning_strike_time",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: None,
        unit_imperial: None,
        compute: |ctx| Ok(timestamp(ctx.storage.last_lightning_time)),
    },
    SensorDescription {
        id: "battery_air",
        group: SensorGroup::Air,
        devices: AIR_ONLY,
        unit_metric: Some("V"),
        unit_imperial: Some("V"),
        compute: |ctx| {
            let v = require("battery", ctx.air.battery)?;
            Ok(json!(round_to(v, 2)))
        },
    },
    SensorDescription {
        id: "battery_level_air",
        group: SensorGroup::Air,
        devices: AIR_ONLY,
        unit_metric: Some("%"),
        unit_imperial: Some("%"),
        compute: |ctx| Ok(json!(ctx.cnv.battery_level(ctx.air.battery, false)?)),
    },
    SensorDescription {
        id: "sealevel_pressure",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: Some("hPa"),
        unit_imperial: Some("inHg"),
        compute: |ctx| Ok(json!(sealevel_pressure(ctx)?)),
    },
    SensorDescription {
        id: "pressure_trend",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: None,
        unit_imperial: None,
        compute: |ctx| Ok(json!(ctx.cnv.trend_text(trend(ctx)?.trend.key()))),
    },
    SensorDescription {
        id: "pressure_trend_value",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: Some("hPa"),
        unit_imperial: Some("inHg"),
        compute: |ctx| Ok(json!(round_to(trend(ctx)?.delta, 3))),
    },
    SensorDescription {
        id: "air_density",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: Some("kg/m³"),
        unit_imperial: Some("lb/ft³"),
        compute: |ctx| {
            Ok(json!(ctx.cnv.air_density(
                ctx.air.air_temperature,
                ctx.air.station_pressure
            )?))
        },
    },
    SensorDescription {
        id: "dewpoint",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: Some("°C"),
        unit_imperial: Some("°F"),
        compute: |ctx| {
            Ok(json!(ctx.cnv.dewpoint(
                ctx.air.air_temperature,
                ctx.air.relative_humidity,
                false
            )?))
        },
    },
    SensorDescription {
        id: "feelslike",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: Some("°C"),
        unit_imperial: Some("°F"),
        compute: |ctx| {
            Ok(json!(ctx.cnv.feels_like(
                ctx.air.air_temperature,
                ctx.air.relative_humidity,
                ctx.wind_speed
            )))
        },
    },
    SensorDescription {
        id: "wetbulb",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: Some("°C"),
        unit_imperial: Some("°F"),
        compute: |ctx| {
            Ok(json!(ctx.cnv.wetbulb(
                ctx.air.air_temperature,
                ctx.air.relative_humidity,
                ctx.air.station_pressure,
                false
            )?))
        },
    },
    SensorDescription {
        id: "delta_t",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: Some("°C"),
        unit_imperial: Some("°F"),
        compute: |ctx| {
            Ok(json!(ctx.cnv.delta_t(
                ctx.air.air_temperature,
                ctx.air.relative_humidity,
                ctx.air.station_pressure
            )?))
        },
    },
    SensorDescription {
        id: "dewpoint_description",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: None,
        unit_imperial: None,
        compute: |ctx| {
            let dewpoint =
                ctx.cnv
                    .dewpoint(ctx.air.air_temperature, ctx.air.relative_humidity, false)?;
            Ok(json!(ctx.cnv.dewpoint_level(dewpoint)))
        },
    },
    SensorDescription {
        id: "temperature_description",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: None,
        unit_imperial: None,
        compute: |ctx| {
            let t = require("air_temperature", ctx.air.air_temperature)?;
            Ok(json!(ctx.cnv.temperature_level(t)))
        },
    },
    SensorDescription {
        id: "visibility",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: Some("km"),
        unit_imperial: Some("mi"),
        compute: |ctx| {
            Ok(json!(ctx.cnv.visibility(
                ctx.station.elevation_m,
                ctx.air.air_temperature,
                ctx.air.relative_humidity
            )?))
        },
    },
    SensorDescription {
        id: "absolute_humidity",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: Some("g/m³"),
        unit_imperial: Some("g/m³"),
        compute: |ctx| {
            Ok(json!(ctx.cnv.absolute_humidity(
                ctx.air.air_temperature,
                ctx.air.relative_humidity
            )?))
        },
    },
    SensorDescription {
        id: "wbgt",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: Some("°C"),
        unit_imperial: Some("°F"),
        compute: |ctx| {
            Ok(json!(ctx.cnv.wbgt(
                ctx.air.air_temperature,
                ctx.air.relative_humidity,
                ctx.air.station_pressure,
                ctx.solar_radiation
            )?))
        },
    },
    SensorDescription {
        id: "cloud_base",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: Some("m"),
        unit_imperial: Some("ft"),
        compute: |ctx| {
            let dewpoint_c =
                ctx.cnv
                    .dewpoint(ctx.air.air_temperature, ctx.air.relative_humidity, true)?;
            Ok(json!(ctx.cnv.cloud_base(
                ctx.air.air_temperature,
                Some(dewpoint_c),
                ctx.station.elevation_m
            )?))
        },
    },
    SensorDescription {
        id: "freezing_level",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: Some("m"),
        unit_imperial: Some("ft"),
        compute: |ctx| {
            Ok(json!(ctx.cnv.freezing_level(
                ctx.air.air_temperature,
                ctx.station.elevation_m
            )?))
        },
    },
    SensorDescription {
        id: "fog_probability",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: Some("%"),
        unit_imperial: Some("%"),
        compute: |ctx| Ok(json!(fog_probability(ctx))),
    },
    SensorDescription {
        id: "snow_probability",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: Some("%"),
        unit_imperial: Some("%"),
        compute: |ctx| Ok(json!(snow_probability(ctx)?)),
    },
    SensorDescription {
        id: "current_conditions",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: None,
        unit_imperial: None,
        compute: |ctx| Ok(json!(current_conditions(&condition_inputs(ctx)))),
    },
    SensorDescription {
        id: "zambretti_number",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: None,
        unit_imperial: None,
        compute: |ctx| Ok(json!(zambretti_number(ctx)?)),
    },
    SensorDescription {
        id: "zambretti_text",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: None,
        unit_imperial: None,
        compute: |ctx| Ok(json!(ctx.cnv.zambretti_forecast(zambretti_number(ctx)?).text)),
    },
    SensorDescription {
        id: "last_reset_midnight",
        group: SensorGroup::Air,
        devices: AIR_UNITS,
        unit_metric: None,
        unit_imperial: None,
        compute: |ctx| Ok(json!(ctx.last_midnight.to_rfc3339())),
    },
    // Sky group
    SensorDescription {
        id: "illuminance",
        group: SensorGroup::Sky,
        devices: SKY_UNITS,
        unit_metric: Some("lx"),
        unit_imperial: Some("lx"),
        compute: |ctx| Ok(json!(require("illuminance", ctx.sky.illuminance)?)),
    },
    SensorDescription {
        id: "uv",
        group: SensorGroup::Sky,
        devices: SKY_UNITS,
        unit_metric: Some("UV index"),
        unit_imperial: Some("UV index"),
        compute: |ctx| Ok(json!(require("uv", ctx.sky.uv)?)),
    },
    SensorDescription {
        id: "rain_today",
        group: SensorGroup::Sky,
        devices: SKY_UNITS,
        unit_metric: Some("mm"),
        unit_imperial: Some("in"),
        compute: |ctx| Ok(json!(ctx.cnv.rain(ctx.storage.rain_today))),
    },
    SensorDescription {
        id: "rain_yesterday",
        group: SensorGroup::Sky,
        devices: SKY_UNITS,
        unit_metric: Some("mm"),
        unit_imperial: Some("in"),
        compute: |ctx| Ok(json!(ctx.cnv.rain(ctx.storage.rain_yesterday))),
    },
    SensorDescription {
        id: "rain_duration_today",
        group: SensorGroup::Sky,
        devices: SKY_UNITS,
        unit_metric: Some("min"),
        unit_imperial: Some("min"),
        compute: |ctx| Ok(json!(ctx.storage.rain_duration_today)),
    },
    SensorDescription {
        id: "rain_duration_yesterday",
        group: SensorGroup::Sky,
        devices: SKY_UNITS,
        unit_metric: Some("min"),
        unit_imperial: Some("min"),
        compute: |ctx| Ok(json!(ctx.storage.rain_duration_yesterday)),
    },
    SensorDescription {
        id: "rain_start_time",
        group: SensorGroup::Sky,
        devices: SKY_UNITS,
        unit_metric: None,
        unit_imperial: None,
        compute: |ctx| Ok(timestamp(ctx.storage.rain_start)),
    },
    SensorDescription {
        id: "wind_lull",
        group: SensorGroup::Sky,
        devices: SKY_UNITS,
        unit_metric: Some("m/s"),
        unit_imperial: Some("mph"),
        compute: |ctx| Ok(json!(ctx.cnv.speed(require("wind_lull", ctx.sky.wind_lull)?, false))),
    },
    SensorDescription {
        id: "wind_speed_avg",
        group: SensorGroup::Sky,
        devices: SKY_UNITS,
        unit_metric: Some("m/s"),
        unit_imperial: Some("mph"),
        compute: |ctx| Ok(json!(ctx.cnv.speed(require("wind_avg", ctx.sky.wind_avg)?, false))),
    },
    SensorDescription {
        id: "wind_gust",
        group: SensorGroup::Sky,
        devices: SKY_UNITS,
        unit_metric: Some("m/s"),
        unit_imperial: Some("mph"),
        compute: |ctx| Ok(json!(ctx.cnv.speed(require("wind_gust", ctx.sky.wind_gust)?, false))),
    },
    SensorDescription {
        id: "wind_bearing_avg",
        group: SensorGroup::Sky,
        devices: SKY_UNITS,
        unit_metric: Some("°"),
        unit_imperial: Some("°"),
        compute: |ctx| Ok(json!(require("wind_direction", ctx.sky.wind_direction)?)),
    },
    SensorDescription {
        id: "wind_direction_avg",
        group: SensorGroup::Sky,
        devices: SKY_UNITS,
        unit_metric: None,
        unit_imperial: None,
        compute: |ctx| {
            let bearing = require("wind_direction", ctx.sky.wind_direction)?;
            Ok(json!(ctx.cnv.direction(bearing)))
        },
    },
    SensorDescription {
        id: "battery",
        group: SensorGroup::Sky,
        devices: SKY_UNITS,
        unit_metric: Some("V"),
        unit_imperial: Some("V"),
        compute: |ctx| Ok(json!(battery_voltage(ctx)?)),
    },
    SensorDescription {
        id: "battery_level_sky",
        group: SensorGroup::Sky,
        devices: SKY_ONLY,
        unit_metric: Some("%"),
        unit_imperial: Some("%"),
        compute: |ctx| Ok(json!(ctx.cnv.battery_level(ctx.sky.battery, false)?)),
    },
    SensorDescription {
        id: "battery_level_tempest",
        group: SensorGroup::Sky,
        devices: TEMPEST_ONLY,
        unit_metric: Some("%"),
        unit_imperial: Some("%"),
        compute: |ctx| Ok(json!(ctx.cnv.battery_level(ctx.sky.battery, true)?)),
    },
    SensorDescription {
        id: "battery_mode",
        group: SensorGroup::Sky,
        devices: TEMPEST_ONLY,
        unit_metric: None,
        unit_imperial: None,
        compute: |ctx| {
            let mode = ctx
                .cnv
                .battery_mode(ctx.sky.battery, ctx.sky.solar_radiation)?;
            Ok(json!(mode.mode))
        },
    },
    SensorDescription {
        id: "battery_desc",
        group: SensorGroup::Sky,
        devices: TEMPEST_ONLY,
        unit_metric: None,
        unit_imperial: None,
        compute: |ctx| {
            let mode = ctx
                .cnv
                .battery_mode(ctx.sky.battery, ctx.sky.solar_radiation)?;
            Ok(json!(mode.description))
        },
    },
    SensorDescription {
        id: "solar_radiation",
        group: SensorGroup::Sky,
        devices: SKY_UNITS,
        unit_metric: Some("W/m²"),
        unit_imperial: Some("W/m²"),
        compute: |ctx| Ok(json!(require("solar_radiation", ctx.sky.solar_radiation)?)),
    },
    SensorDescription {
        id: "precipitation_type",
        group: SensorGroup::Sky,
        devices: SKY_UNITS,
        unit_metric: None,
        unit_imperial: None,
        compute: |ctx| {
            let code = require("precipitation_type", ctx.sky.precipitation_type)?;
            Ok(json!(ctx.cnv.rain_type(code)))
        },
    },
    SensorDescription {
        id: "rain_rate",
        group: SensorGroup::Sky,
        devices: SKY_UNITS,
        unit_metric: Some("mm/h"),
        unit_imperial: Some("in/h"),
        compute: |ctx| Ok(json!(ctx.cnv.rain_rate(ctx.sky.rain_accumulated))),
    },
    SensorDescription {
        id: "rain_intensity",
        group: SensorGroup::Sky,
        devices: SKY_UNITS,
        unit_metric: None,
        unit_imperial: None,
        compute: |ctx| {
            let mm_per_hour = ctx.sky.rain_accumulated.unwrap_or(0.0) * 60.0;
            Ok(json!(ctx.cnv.rain_intensity(mm_per_hour)))
        },
    },
    SensorDescription {
        id: "uv_description",
        group: SensorGroup::Sky,
        devices: SKY_UNITS,
        unit_metric: None,
        unit_imperial: None,
        compute: |ctx| Ok(json!(ctx.cnv.uv_level(require("uv", ctx.sky.uv)?))),
    },
    SensorDescription {
        id: "beaufort",
        group: SensorGroup::Sky,
        devices: SKY_UNITS,
        unit_metric: None,
        unit_imperial: None,
        compute: |ctx| Ok(json!(ctx.cnv.beaufort(ctx.sky.wind_avg).value)),
    },
    SensorDescription {
        id: "beaufort_text",
        group: SensorGroup::Sky,
        devices: SKY_UNITS,
        unit_metric: None,
        unit_imperial: None,
        compute: |ctx| Ok(json!(ctx.cnv.beaufort(ctx.sky.wind_avg).text)),
    },
    SensorDescription {
        id: "solar_elevation",
        group: SensorGroup::Sky,
        devices: SKY_UNITS,
        unit_metric: Some("°"),
        unit_imperial: Some("°"),
        compute: |ctx| Ok(json!(solar_elevation(ctx))),
    },
    SensorDescription {
        id: "solar_insolation",
        group: SensorGroup::Sky,
        devices: SKY_UNITS,
        unit_metric: Some("W/m²"),
        unit_imperial: Some("W/m²"),
        compute: |ctx| {
            Ok(json!(ctx.cnv.solar_insolation(
                ctx.station.elevation_m,
                ctx.station.latitude,
                ctx.station.longitude,
                ctx.now
            )))
        },
    },
    SensorDescription {
        id: "last_reset_midnight",
        group: SensorGroup::Sky,
        devices: SKY_UNITS,
        unit_metric: None,
        unit_imperial: None,
        compute: |ctx| Ok(json!(ctx.last_midnight.to_rfc3339())),
    },
];

/// Entries that produce fields for `group` on a `family` device
pub fn sensors_for(
    group: SensorGroup,
    family: DeviceFamily,
) -> impl Iterator<Item = &'static SensorDescription> {
    SENSORS
        .iter()
        .filter(move |sensor| sensor.applies_to(group, family))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversions::UnitSystem;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn context<'a>(
        cnv: &'a ConversionEngine,
        station: &'a StationConfig,
        storage: &'a StorageRecord,
    ) -> SensorContext<'a> {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        SensorContext {
            cnv,
            station,
            storage,
            family: DeviceFamily::Air,
            air: AirReading::default(),
            sky: SkyReading::default(),
            wind_speed: None,
            solar_radiation: None,
            wind_bearing_avg: None,
            rain_rate: None,
            precipitation_type: None,
            pressure_trend: None,
            lightning_count_1hr: 0,
            lightning_count_3hr: 0,
            now,
            local_month: 1,
            last_midnight: Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_ids_are_unique_per_group() {
        for group in [SensorGroup::Air, SensorGroup::Sky] {
            let mut seen = HashSet::new();
            for sensor in SENSORS.iter().filter(|s| s.group == group) {
                assert!(seen.insert(sensor.id), "duplicate id {}", sensor.id);
            }
        }
    }

    #[test]
    fn test_family_specific_battery_fields() {
        let sky: Vec<_> = sensors_for(SensorGroup::Sky, DeviceFamily::Sky)
            .map(|s| s.id)
            .collect();
        let tempest: Vec<_> = sensors_for(SensorGroup::Sky, DeviceFamily::Tempest)
            .map(|s| s.id)
            .collect();
        let air: Vec<_> = sensors_for(SensorGroup::Air, DeviceFamily::Tempest)
            .map(|s| s.id)
            .collect();

        assert!(sky.contains(&"battery_level_sky"));
        assert!(!sky.contains(&"battery_mode"));
        assert!(tempest.contains(&"battery_level_tempest"));
        assert!(tempest.contains(&"battery_desc"));
        assert!(!tempest.contains(&"battery_level_sky"));
        assert!(!air.contains(&"battery_air"));
    }

    #[test]
    fn test_missing_input_yields_error_not_panic() {
        let cnv = ConversionEngine::english(UnitSystem::Metric);
        let station = StationConfig::default();
        let storage = StorageRecord::default();
        let ctx = context(&cnv, &station, &storage);

        for sensor in sensors_for(SensorGroup::Air, DeviceFamily::Air) {
            let _ = (sensor.compute)(&ctx);
        }
        let dewpoint = SENSORS.iter().find(|s| s.id == "dewpoint").unwrap();
        assert!((dewpoint.compute)(&ctx).is_err());
    }

    #[test]
    fn test_feelslike_defaults_without_wind() {
        let cnv = ConversionEngine::english(UnitSystem::Metric);
        let station = StationConfig::default();
        let storage = StorageRecord::default();
        let mut ctx = context(&cnv, &station, &storage);
        ctx.air.air_temperature = Some(20.0);
        ctx.air.relative_humidity = Some(50.0);

        let feelslike = SENSORS.iter().find(|s| s.id == "feelslike").unwrap();
        assert_eq!((feelslike.compute)(&ctx).unwrap(), json!(0.0));

        ctx.wind_speed = Some(3.0);
        assert_eq!((feelslike.compute)(&ctx).unwrap(), json!(17.7));
    }

    #[test]
    fn test_units_follow_unit_system() {
        let metric = ConversionEngine::english(UnitSystem::Metric);
        let imperial = ConversionEngine::english(UnitSystem::Imperial);
        let pressure = SENSORS.iter().find(|s| s.id == "sealevel_pressure").unwrap();
        assert_eq!(pressure.unit(&metric), Some("hPa"));
        assert_eq!(pressure.unit(&imperial), Some("inHg"));
    }

    #[test]
    fn test_fog_probability_absent_inputs_report_zero() {
        let cnv = ConversionEngine::english(UnitSystem::Metric);
        let station = StationConfig::default();
        let storage = StorageRecord::default();
        let ctx = context(&cnv, &station, &storage);

        let fog = SENSORS.iter().find(|s| s.id == "fog_probability").unwrap();
        assert_eq!((fog.compute)(&ctx).unwrap(), json!(0.0));
    }

    #[test]
    fn test_current_conditions_uses_carried_sky_values() {
        let cnv = ConversionEngine::english(UnitSystem::Metric);
        let station = StationConfig::default();
        let storage = StorageRecord::default();
        let mut ctx = context(&cnv, &station, &storage);
        ctx.air.air_temperature = Some(-2.0);
        ctx.air.relative_humidity = Some(90.0);
        ctx.air.station_pressure = Some(1000.0);

        let conditions = SENSORS.iter().find(|s| s.id == "current_conditions").unwrap();
        let snow = SENSORS.iter().find(|s| s.id == "snow_probability").unwrap();
        assert_eq!((snow.compute)(&ctx).unwrap(), json!(100.0));

        ctx.rain_rate = Some(1.2);
        assert_eq!((conditions.compute)(&ctx).unwrap(), json!("snowy"));

        ctx.lightning_count_1hr = 1;
        assert_eq!((conditions.compute)(&ctx).unwrap(), json!("lightning-rainy"));
    }
}
