//! Per-sensor running extremes
//!
//! Every tracked sensor keeps its latest value plus min/max pairs for the
//! current day, yesterday, week, month, year and all time. Updates use strict
//! comparisons so the sentinel seeds are replaced by the first real reading.
//! Rollovers promote a bucket into the next larger one before resetting it;
//! the all-time bucket is never reset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

const SIGNED_MAX_SEED: f64 = -9999.0;
const SIGNED_MIN_SEED: f64 = 9999.0;

/// Sensors whose extremes are tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedSensor {
    AirTemperature,
    RelativeHumidity,
    Dewpoint,
    Illuminance,
    RainDurationToday,
    RainRate,
    WindGust,
    WindLull,
    WindSpeedAvg,
    LightningStrikeEnergy,
    LightningStrikeCountToday,
    SealevelPressure,
    Uv,
    SolarRadiation,
}

impl TrackedSensor {
    pub const ALL: [TrackedSensor; 14] = [
        TrackedSensor::AirTemperature,
        TrackedSensor::RelativeHumidity,
        TrackedSensor::Dewpoint,
        TrackedSensor::Illuminance,
        TrackedSensor::RainDurationToday,
        TrackedSensor::RainRate,
        TrackedSensor::WindGust,
        TrackedSensor::WindLull,
        TrackedSensor::WindSpeedAvg,
        TrackedSensor::LightningStrikeEnergy,
        TrackedSensor::LightningStrikeCountToday,
        TrackedSensor::SealevelPressure,
        TrackedSensor::Uv,
        TrackedSensor::SolarRadiation,
    ];

    /// Output field this sensor is read from
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            TrackedSensor::AirTemperature => "air_temperature",
            TrackedSensor::RelativeHumidity => "relative_humidity",
            TrackedSensor::Dewpoint => "dewpoint",
            TrackedSensor::Illuminance => "illuminance",
            TrackedSensor::RainDurationToday => "rain_duration_today",
            TrackedSensor::RainRate => "rain_rate",
            TrackedSensor::WindGust => "wind_gust",
            TrackedSensor::WindLull => "wind_lull",
            TrackedSensor::WindSpeedAvg => "wind_speed_avg",
            TrackedSensor::LightningStrikeEnergy => "lightning_strike_energy",
            TrackedSensor::LightningStrikeCountToday => "lightning_strike_count_today",
            TrackedSensor::SealevelPressure => "sealevel_pressure",
            TrackedSensor::Uv => "uv",
            TrackedSensor::SolarRadiation => "solar_radiation",
        }
    }

    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|sensor| sensor.id() == id)
    }

    /// Quantities that can never go below zero are seeded with 0 bounds
    #[must_use]
    pub fn is_non_negative(&self) -> bool {
        !matches!(
            self,
            TrackedSensor::AirTemperature
                | TrackedSensor::RelativeHumidity
                | TrackedSensor::Dewpoint
                | TrackedSensor::SealevelPressure
        )
    }
}

impl fmt::Display for TrackedSensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// One min/max pair with the times each was reached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extremes {
    pub max: f64,
    pub max_time: Option<DateTime<Utc>>,
    pub min: f64,
    pub min_time: Option<DateTime<Utc>>,
}

impl Extremes {
    #[must_use]
    pub fn seeded(non_negative: bool) -> Self {
        let (max, min) = if non_negative {
            (0.0, 0.0)
        } else {
            (SIGNED_MAX_SEED, SIGNED_MIN_SEED)
        };
        Self {
            max,
            max_time: None,
            min,
            min_time: None,
        }
    }

    fn observe(&mut self, value: f64, at: DateTime<Utc>) {
        if value > self.max {
            self.max = value;
            self.max_time = Some(at);
        }
        if value < self.min {
            self.min = value;
            self.min_time = Some(at);
        }
    }

    /// Compare-and-replace with a smaller bucket's extremes
    fn absorb(&mut self, other: &Extremes) {
        if other.max > self.max {
            self.max = other.max;
            self.max_time = other.max_time;
        }
        // an untouched seed carries no information
        if other.min < self.min && other.min_time.is_some() {
            self.min = other.min;
            self.min_time = other.min_time;
        }
    }

    fn reset(&mut self, latest: Option<f64>, non_negative: bool, at: DateTime<Utc>) {
        match latest {
            Some(value) => {
                self.max = value;
                self.max_time = Some(at);
                self.min = if non_negative { 0.0 } else { value };
                self.min_time = Some(at);
            }
            None => *self = Extremes::seeded(non_negative),
        }
    }
}

/// Extremes of one sensor across every bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighLowRecord {
    pub latest: Option<f64>,
    pub latest_time: Option<DateTime<Utc>>,
    pub day: Extremes,
    pub yesterday: Extremes,
    pub week: Extremes,
    pub month: Extremes,
    pub year: Extremes,
    pub all_time: Extremes,
}

impl HighLowRecord {
    #[must_use]
    pub fn seeded(sensor: TrackedSensor) -> Self {
        let seed = Extremes::seeded(sensor.is_non_negative());
        Self {
            latest: None,
            latest_time: None,
            day: seed.clone(),
            yesterday: seed.clone(),
            week: seed.clone(),
            month: seed.clone(),
            year: seed.clone(),
            all_time: seed,
        }
    }

    fn update(&mut self, value: f64, at: DateTime<Utc>) {
        self.latest = Some(value);
        self.latest_time = Some(at);
        for bucket in [
            &mut self.day,
            &mut self.week,
            &mut self.month,
            &mut self.year,
            &mut self.all_time,
        ] {
            bucket.observe(value, at);
        }
    }
}

/// Extremes for every tracked sensor
#[derive(Debug, Clone, PartialEq)]
pub struct HighLowTracker {
    records: BTreeMap<TrackedSensor, HighLowRecord>,
}

impl Default for HighLowTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HighLowTracker {
    /// Tracker with every sensor at its seed values
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: TrackedSensor::ALL
                .into_iter()
                .map(|sensor| (sensor, HighLowRecord::seeded(sensor)))
                .collect(),
        }
    }

    /// Tracker resumed from persisted records; missing sensors are seeded
    #[must_use]
    pub fn from_records(records: BTreeMap<TrackedSensor, HighLowRecord>) -> Self {
        let mut tracker = Self::new();
        tracker.records.extend(records);
        tracker
    }

    pub fn update(&mut self, sensor: TrackedSensor, value: f64, at: DateTime<Utc>) {
        self.records
            .entry(sensor)
            .or_insert_with(|| HighLowRecord::seeded(sensor))
            .update(value, at);
    }

    /// Update every tracked sensor present as a number in `fields`.
    /// Returns the sensors that were touched.
    pub fn update_from_fields(
        &mut self,
        fields: &Map<String, Value>,
        at: DateTime<Utc>,
    ) -> Vec<TrackedSensor> {
        let mut touched = Vec::new();
        for sensor in TrackedSensor::ALL {
            if let Some(value) = fields.get(sensor.id()).and_then(Value::as_f64) {
                self.update(sensor, value, at);
                touched.push(sensor);
            }
        }
        touched
    }

    /// Local-midnight transition: day moves to yesterday and into the week
    /// and month buckets, then restarts from the latest value.
    pub fn rollover_daily(&mut self, at: DateTime<Utc>) {
        for (sensor, record) in &mut self.records {
            record.yesterday = record.day.clone();
            record.week.absorb(&record.day);
            record.month.absorb(&record.day);
            record.day.reset(record.latest, sensor.is_non_negative(), at);
        }
    }

    pub fn rollover_weekly(&mut self, at: DateTime<Utc>) {
        for (sensor, record) in &mut self.records {
            record.month.absorb(&record.week);
            record.week.reset(record.latest, sensor.is_non_negative(), at);
        }
    }

    pub fn rollover_monthly(&mut self, at: DateTime<Utc>) {
        for (sensor, record) in &mut self.records {
            record.year.absorb(&record.month);
            record.month.reset(record.latest, sensor.is_non_negative(), at);
        }
    }

    pub fn rollover_yearly(&mut self, at: DateTime<Utc>) {
        for (sensor, record) in &mut self.records {
            record.all_time.absorb(&record.year);
            record.year.reset(record.latest, sensor.is_non_negative(), at);
        }
    }

    #[must_use]
    pub fn get(&self, sensor: TrackedSensor) -> Option<&HighLowRecord> {
        self.records.get(&sensor)
    }

    #[must_use]
    pub fn read_all(&self) -> &BTreeMap<TrackedSensor, HighLowRecord> {
        &self.records
    }
}
