//! Decoded station broadcasts
//!
//! Each UDP datagram is one JSON object with a `type` discriminator. Group
//! observations carry a positional array whose indices are fixed by the
//! station protocol; the index tables below name them.

use crate::{Result, StationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Index layout of an `obs_air` row
pub mod obs_air {
    pub const EPOCH: usize = 0;
    pub const STATION_PRESSURE: usize = 1;
    pub const AIR_TEMPERATURE: usize = 2;
    pub const RELATIVE_HUMIDITY: usize = 3;
    pub const LIGHTNING_COUNT: usize = 4;
    pub const LIGHTNING_DISTANCE: usize = 5;
    pub const BATTERY: usize = 6;
    pub const REPORT_INTERVAL: usize = 7;
}

/// Index layout of an `obs_sky` row
pub mod obs_sky {
    pub const EPOCH: usize = 0;
    pub const ILLUMINANCE: usize = 1;
    pub const UV: usize = 2;
    pub const RAIN_ACCUMULATED: usize = 3;
    pub const WIND_LULL: usize = 4;
    pub const WIND_AVG: usize = 5;
    pub const WIND_GUST: usize = 6;
    pub const WIND_DIRECTION: usize = 7;
    pub const BATTERY: usize = 8;
    pub const REPORT_INTERVAL: usize = 9;
    pub const SOLAR_RADIATION: usize = 10;
    pub const LOCAL_DAY_RAIN: usize = 11;
    pub const PRECIPITATION_TYPE: usize = 12;
    pub const WIND_SAMPLE_INTERVAL: usize = 13;
}

/// Index layout of an `obs_st` row
pub mod obs_st {
    pub const EPOCH: usize = 0;
    pub const WIND_LULL: usize = 1;
    pub const WIND_AVG: usize = 2;
    pub const WIND_GUST: usize = 3;
    pub const WIND_DIRECTION: usize = 4;
    pub const WIND_SAMPLE_INTERVAL: usize = 5;
    pub const STATION_PRESSURE: usize = 6;
    pub const AIR_TEMPERATURE: usize = 7;
    pub const RELATIVE_HUMIDITY: usize = 8;
    pub const ILLUMINANCE: usize = 9;
    pub const UV: usize = 10;
    pub const SOLAR_RADIATION: usize = 11;
    pub const RAIN_ACCUMULATED: usize = 12;
    pub const PRECIPITATION_TYPE: usize = 13;
    pub const LIGHTNING_DISTANCE: usize = 14;
    pub const LIGHTNING_COUNT: usize = 15;
    pub const BATTERY: usize = 16;
    pub const REPORT_INTERVAL: usize = 17;
}

/// Index layout of a `rapid_wind` sample
pub mod rapid_wind {
    pub const EPOCH: usize = 0;
    pub const SPEED: usize = 1;
    pub const DIRECTION: usize = 2;
}

/// Index layout of an `evt_strike` event
pub mod evt_strike {
    pub const EPOCH: usize = 0;
    pub const DISTANCE: usize = 1;
    pub const ENERGY: usize = 2;
}

/// One decoded broadcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Observation {
    RapidWind {
        serial_number: String,
        ob: Vec<Option<f64>>,
    },
    ObsAir {
        serial_number: String,
        obs: Vec<Vec<Option<f64>>>,
    },
    ObsSky {
        serial_number: String,
        obs: Vec<Vec<Option<f64>>>,
    },
    ObsSt {
        serial_number: String,
        obs: Vec<Vec<Option<f64>>>,
    },
    EvtStrike {
        serial_number: String,
        evt: Vec<Option<f64>>,
    },
    EvtPrecip {
        serial_number: String,
        evt: Vec<Option<f64>>,
    },
    DeviceStatus {
        serial_number: String,
        #[serde(default)]
        uptime: Option<u64>,
        #[serde(default)]
        voltage: Option<f64>,
        #[serde(default)]
        firmware_revision: Option<serde_json::Value>,
        #[serde(default)]
        rssi: Option<i64>,
        #[serde(default)]
        sensor_status: Option<u32>,
    },
    HubStatus {
        serial_number: String,
        #[serde(default)]
        uptime: Option<u64>,
        #[serde(default)]
        firmware_revision: Option<serde_json::Value>,
        #[serde(default)]
        rssi: Option<i64>,
        #[serde(default)]
        reset_flags: Option<String>,
    },
    /// Message types the engine does not handle
    #[serde(other)]
    Unknown,
}

/// What kind of message is being processed or emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RapidWind,
    ObsAir,
    ObsSky,
    ObsSt,
    EvtStrike,
    EvtPrecip,
    DeviceStatus,
    HubStatus,
    HighLow,
    Storage,
}

impl EventType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::RapidWind => "rapid_wind",
            EventType::ObsAir => "obs_air",
            EventType::ObsSky => "obs_sky",
            EventType::ObsSt => "obs_st",
            EventType::EvtStrike => "evt_strike",
            EventType::EvtPrecip => "evt_precip",
            EventType::DeviceStatus => "device_status",
            EventType::HubStatus => "hub_status",
            EventType::HighLow => "high_low",
            EventType::Storage => "storage",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hardware family of a sensor unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceFamily {
    Air,
    Sky,
    Tempest,
}

impl DeviceFamily {
    /// Family from a serial number prefix such as `ST-00000512`
    #[must_use]
    pub fn from_serial(serial_number: &str) -> Option<Self> {
        match serial_number.split('-').next() {
            Some("AR") => Some(DeviceFamily::Air),
            Some("SK") => Some(DeviceFamily::Sky),
            Some("ST") => Some(DeviceFamily::Tempest),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceFamily::Air => "air",
            DeviceFamily::Sky => "sky",
            DeviceFamily::Tempest => "tempest",
        }
    }
}

impl Observation {
    /// Decode one datagram
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| StationError::decode(e.to_string()))
    }

    /// Event type, `None` for unhandled messages
    #[must_use]
    pub fn event_type(&self) -> Option<EventType> {
        Some(match self {
            Observation::RapidWind { .. } => EventType::RapidWind,
            Observation::ObsAir { .. } => EventType::ObsAir,
            Observation::ObsSky { .. } => EventType::ObsSky,
            Observation::ObsSt { .. } => EventType::ObsSt,
            Observation::EvtStrike { .. } => EventType::EvtStrike,
            Observation::EvtPrecip { .. } => EventType::EvtPrecip,
            Observation::DeviceStatus { .. } => EventType::DeviceStatus,
            Observation::HubStatus { .. } => EventType::HubStatus,
            Observation::Unknown => return None,
        })
    }

    #[must_use]
    pub fn serial_number(&self) -> Option<&str> {
        match self {
            Observation::RapidWind { serial_number, .. }
            | Observation::ObsAir { serial_number, .. }
            | Observation::ObsSky { serial_number, .. }
            | Observation::ObsSt { serial_number, .. }
            | Observation::EvtStrike { serial_number, .. }
            | Observation::EvtPrecip { serial_number, .. }
            | Observation::DeviceStatus { serial_number, .. }
            | Observation::HubStatus { serial_number, .. } => Some(serial_number),
            Observation::Unknown => None,
        }
    }
}

/// Value at `index`, absent when the slot is missing or null
#[must_use]
pub fn field(values: &[Option<f64>], index: usize) -> Option<f64> {
    values.get(index).copied().flatten()
}

/// First row of a group observation
pub fn first_row<'a>(event: EventType, obs: &'a [Vec<Option<f64>>]) -> Option<&'a [Option<f64>]> {
    let row = obs.first().map(Vec::as_slice);
    if row.is_none() {
        warn!(%event, "Observation carried no rows");
    }
    row
}

/// Air-group quantities in protocol units
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AirReading {
    pub epoch: Option<f64>,
    /// hPa
    pub station_pressure: Option<f64>,
    /// °C
    pub air_temperature: Option<f64>,
    /// %
    pub relative_humidity: Option<f64>,
    pub lightning_count: Option<f64>,
    /// km
    pub lightning_distance: Option<f64>,
    /// V
    pub battery: Option<f64>,
    pub report_interval: Option<f64>,
}

/// Sky-group quantities in protocol units
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkyReading {
    pub epoch: Option<f64>,
    /// lux
    pub illuminance: Option<f64>,
    pub uv: Option<f64>,
    /// mm over the report interval
    pub rain_accumulated: Option<f64>,
    /// m/s
    pub wind_lull: Option<f64>,
    pub wind_avg: Option<f64>,
    pub wind_gust: Option<f64>,
    /// degrees
    pub wind_direction: Option<f64>,
    pub battery: Option<f64>,
    pub report_interval: Option<f64>,
    /// W/m²
    pub solar_radiation: Option<f64>,
    pub precipitation_type: Option<f64>,
    pub wind_sample_interval: Option<f64>,
}

impl AirReading {
    #[must_use]
    pub fn from_air(row: &[Option<f64>]) -> Self {
        Self {
            epoch: field(row, obs_air::EPOCH),
            station_pressure: field(row, obs_air::STATION_PRESSURE),
            air_temperature: field(row, obs_air::AIR_TEMPERATURE),
            relative_humidity: field(row, obs_air::RELATIVE_HUMIDITY),
            lightning_count: field(row, obs_air::LIGHTNING_COUNT),
            lightning_distance: field(row, obs_air::LIGHTNING_DISTANCE),
            battery: field(row, obs_air::BATTERY),
            report_interval: field(row, obs_air::REPORT_INTERVAL),
        }
    }

    #[must_use]
    pub fn from_tempest(row: &[Option<f64>]) -> Self {
        Self {
            epoch: field(row, obs_st::EPOCH),
            station_pressure: field(row, obs_st::STATION_PRESSURE),
            air_temperature: field(row, obs_st::AIR_TEMPERATURE),
            relative_humidity: field(row, obs_st::RELATIVE_HUMIDITY),
            lightning_count: field(row, obs_st::LIGHTNING_COUNT),
            lightning_distance: field(row, obs_st::LIGHTNING_DISTANCE),
            battery: field(row, obs_st::BATTERY),
            report_interval: field(row, obs_st::REPORT_INTERVAL),
        }
    }
}

impl SkyReading {
    #[must_use]
    pub fn from_sky(row: &[Option<f64>]) -> Self {
        Self {
            epoch: field(row, obs_sky::EPOCH),
            illuminance: field(row, obs_sky::ILLUMINANCE),
            uv: field(row, obs_sky::UV),
            rain_accumulated: field(row, obs_sky::RAIN_ACCUMULATED),
            wind_lull: field(row, obs_sky::WIND_LULL),
            wind_avg: field(row, obs_sky::WIND_AVG),
            wind_gust: field(row, obs_sky::WIND_GUST),
            wind_direction: field(row, obs_sky::WIND_DIRECTION),
            battery: field(row, obs_sky::BATTERY),
            report_interval: field(row, obs_sky::REPORT_INTERVAL),
            solar_radiation: field(row, obs_sky::SOLAR_RADIATION),
            precipitation_type: field(row, obs_sky::PRECIPITATION_TYPE),
            wind_sample_interval: field(row, obs_sky::WIND_SAMPLE_INTERVAL),
        }
    }

    #[must_use]
    pub fn from_tempest(row: &[Option<f64>]) -> Self {
        Self {
            epoch: field(row, obs_st::EPOCH),
            illuminance: field(row, obs_st::ILLUMINANCE),
            uv: field(row, obs_st::UV),
            rain_accumulated: field(row, obs_st::RAIN_ACCUMULATED),
            wind_lull: field(row, obs_st::WIND_LULL),
            wind_avg: field(row, obs_st::WIND_AVG),
            wind_gust: field(row, obs_st::WIND_GUST),
            wind_direction: field(row, obs_st::WIND_DIRECTION),
            battery: field(row, obs_st::BATTERY),
            report_interval: field(row, obs_st::REPORT_INTERVAL),
            solar_radiation: field(row, obs_st::SOLAR_RADIATION),
            precipitation_type: field(row, obs_st::PRECIPITATION_TYPE),
            wind_sample_interval: field(row, obs_st::WIND_SAMPLE_INTERVAL),
        }
    }
}
