//! Observation processing loop body
//!
//! [`ObservationProcessor`] owns every piece of mutable station state: the
//! storage record, the high/low tracker, the persistent store and the values
//! carried between sensor groups. One observation is handled to completion,
//! including its store writes, before `process` returns.
//!
//! Store failures are logged and the in-memory state stays authoritative for
//! the rest of the process; the next successful write reconciles the store.

use crate::clock::Clock;
use crate::config::{EngineConfig, StationConfig};
use crate::conversions::classify::{device_status, humanize_time};
use crate::conversions::ConversionEngine;
use crate::highlow::{HighLowRecord, HighLowTracker, TrackedSensor};
use crate::observation::{
    AirReading, DeviceFamily, EventType, Observation, SkyReading, evt_strike, field, first_row,
    rapid_wind,
};
use crate::scheduler::{Rollover, Scheduler};
use crate::sensors::{SensorContext, SensorGroup, sensors_for};
use crate::store::{AggregateStore, PressureTrend, StorageRecord, TrendThresholds};
use anyhow::Context;
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use tracing::{debug, error, info};

const TOPIC_PREFIX: &str = "stationflow";

/// What the processor is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Idle,
    Processing(EventType),
}

/// One outbound mapping of field name to converted value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub topic: String,
    pub event: EventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    pub fields: Map<String, Value>,
    /// Unit label per field, for fields that have one
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub units: BTreeMap<String, &'static str>,
}

impl NormalizedRecord {
    fn new(event: EventType, serial_number: Option<&str>) -> Self {
        let topic = match serial_number {
            Some(serial) => format!("{TOPIC_PREFIX}/{serial}/{event}"),
            None => format!("{TOPIC_PREFIX}/{event}"),
        };
        Self {
            topic,
            event,
            serial_number: serial_number.map(str::to_owned),
            fields: Map::new(),
            units: BTreeMap::new(),
        }
    }

    fn with_field(mut self, id: &str, value: Value) -> Self {
        self.fields.insert(id.to_owned(), value);
        self
    }

    /// Field value by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Value> {
        self.fields.get(id)
    }
}

pub struct ObservationProcessor<C: Clock> {
    clock: C,
    cnv: ConversionEngine,
    station: StationConfig,
    thresholds: TrendThresholds,
    store: AggregateStore,
    storage: StorageRecord,
    tracker: HighLowTracker,
    scheduler: Scheduler,
    state: ProcessorState,
    rapid_wind_interval: Duration,
    last_rapid_wind: Option<DateTime<Utc>>,
    /// Carried from the last rapid-wind sample, m/s
    wind_speed: Option<f64>,
    /// Carried from the last sky group, W/m²
    solar_radiation: Option<f64>,
    /// Carried from the last sky group, degrees
    wind_bearing_avg: Option<f64>,
    /// Carried from the last sky group, mm/h
    rain_rate: Option<f64>,
    precipitation_type: Option<f64>,
}

impl<C: Clock> ObservationProcessor<C> {
    /// Build a processor over an opened store, restoring persisted state
    pub fn new(
        config: &EngineConfig,
        cnv: ConversionEngine,
        store: AggregateStore,
        clock: C,
    ) -> anyhow::Result<Self> {
        let tz = config.station.tz()?;
        let storage = store
            .read_storage()
            .context("Failed to read storage record")?;
        let tracker = HighLowTracker::from_records(
            store
                .read_high_low()
                .context("Failed to read high/low records")?,
        );
        let now = clock.now();
        let mut scheduler = Scheduler::new(tz, &config.processing, now);
        match store
            .read_rollover_date()
            .context("Failed to read last rollover date")?
        {
            Some(date) => {
                if date < scheduler.current_date() {
                    info!(
                        last = %date,
                        today = %scheduler.current_date(),
                        "Day changed while stopped"
                    );
                }
                scheduler = scheduler.resume_from(date);
            }
            None => store
                .write_rollover_date(scheduler.current_date())
                .context("Failed to record rollover date")?,
        }
        let rapid_wind_interval = Duration::seconds(
            i64::try_from(config.processing.rapid_wind_interval_secs)
                .unwrap_or(i64::MAX)
                .min(i64::MAX / 1_000),
        );

        info!(
            unit_system = %cnv.unit_system(),
            timezone = %tz,
            rain_today = storage.rain_today,
            lightning_today = storage.lightning_count_today,
            "Observation processor ready"
        );

        Ok(Self {
            scheduler,
            thresholds: TrendThresholds::for_units(cnv.unit_system()),
            station: config.station.clone(),
            clock,
            cnv,
            store,
            storage,
            tracker,
            state: ProcessorState::Idle,
            rapid_wind_interval,
            last_rapid_wind: None,
            wind_speed: None,
            solar_radiation: None,
            wind_bearing_avg: None,
            rain_rate: None,
            precipitation_type: None,
        })
    }

    #[must_use]
    pub fn state(&self) -> ProcessorState {
        self.state
    }

    /// Current storage record
    #[must_use]
    pub fn storage(&self) -> &StorageRecord {
        &self.storage
    }

    /// Every tracked sensor's extremes
    #[must_use]
    pub fn read_high_low(&self) -> &BTreeMap<TrackedSensor, HighLowRecord> {
        self.tracker.read_all()
    }

    #[must_use]
    pub fn store(&self) -> &AggregateStore {
        &self.store
    }

    #[must_use]
    pub fn conversions(&self) -> &ConversionEngine {
        &self.cnv
    }

    /// Handle one observation and return the records it produces.
    ///
    /// A local day change that happened since the last tick is rolled over
    /// first so the observation lands in the new day.
    pub fn process(&mut self, observation: &Observation) -> Vec<NormalizedRecord> {
        let Some(event) = observation.event_type() else {
            debug!("Ignoring unhandled message type");
            return Vec::new();
        };

        let now = self.clock.now();
        let mut records = Vec::new();
        if self.scheduler.local_date(now) > self.scheduler.current_date() {
            records.extend(self.tick());
        }

        self.state = ProcessorState::Processing(event);
        debug!(%event, serial = observation.serial_number(), "Processing observation");

        match observation {
            Observation::RapidWind { serial_number, ob } => {
                records.extend(self.rapid_wind(serial_number, ob, now));
            }
            Observation::ObsAir { serial_number, obs } => {
                if let Some(row) = first_row(event, obs) {
                    let air = AirReading::from_air(row);
                    records.push(self.air(event, serial_number, DeviceFamily::Air, air, now));
                }
            }
            Observation::ObsSky { serial_number, obs } => {
                if let Some(row) = first_row(event, obs) {
                    let sky = SkyReading::from_sky(row);
                    records.push(self.sky(event, serial_number, DeviceFamily::Sky, sky, now));
                }
            }
            Observation::ObsSt { serial_number, obs } => {
                if let Some(row) = first_row(event, obs) {
                    let sky = SkyReading::from_tempest(row);
                    let air = AirReading::from_tempest(row);
                    // each half goes out under its own group's topic
                    records.push(self.sky(
                        EventType::ObsSky,
                        serial_number,
                        DeviceFamily::Tempest,
                        sky,
                        now,
                    ));
                    records.push(self.air(
                        EventType::ObsAir,
                        serial_number,
                        DeviceFamily::Tempest,
                        air,
                        now,
                    ));
                }
            }
            Observation::EvtStrike { serial_number, evt } => {
                records.push(self.strike(serial_number, evt, now));
            }
            Observation::EvtPrecip { serial_number, .. } => {
                records.push(self.precip(serial_number, now));
            }
            Observation::DeviceStatus {
                serial_number,
                uptime,
                voltage,
                firmware_revision,
                rssi,
                sensor_status,
            } => {
                let family = DeviceFamily::from_serial(serial_number);
                let status_key = family.map_or("device_status".to_owned(), |f| {
                    format!("{}_status", f.as_str())
                });
                let faults = sensor_status.map(device_status).unwrap_or_default();
                records.push(
                    NormalizedRecord::new(event, Some(serial_number))
                        .with_field(&status_key, json!(humanize_time(uptime.unwrap_or(0))))
                        .with_field("serial_number", json!(serial_number))
                        .with_field("firmware_revision", json!(firmware_revision))
                        .with_field("voltage", json!(voltage))
                        .with_field("rssi", json!(rssi))
                        .with_field("sensor_status", json!(faults)),
                );
            }
            Observation::HubStatus {
                serial_number,
                uptime,
                firmware_revision,
                rssi,
                reset_flags,
            } => {
                records.push(
                    NormalizedRecord::new(event, Some(serial_number))
                        .with_field("hub_status", json!(humanize_time(uptime.unwrap_or(0))))
                        .with_field("serial_number", json!(serial_number))
                        .with_field("firmware_revision", json!(firmware_revision))
                        .with_field("rssi", json!(rssi))
                        .with_field("reset_flags", json!(reset_flags)),
                );
            }
            Observation::Unknown => {}
        }

        self.state = ProcessorState::Idle;
        records
    }

    /// Scheduler tick between observations: day rollover, housekeeping and
    /// periodic full-state publication.
    pub fn tick(&mut self) -> Vec<NormalizedRecord> {
        let now = self.clock.now();
        let due = self.scheduler.poll(now);

        if due.rollover.any() {
            self.rollover(due.rollover, now);
        }
        if due.housekeeping {
            match self.store.housekeeping(now) {
                Ok(purged) => debug!(purged, "Purged expired series entries"),
                Err(e) => error!("Housekeeping failed: {:#}", e),
            }
        }

        if due.high_low || due.rollover.any() {
            vec![self.high_low_record(), self.storage_record()]
        } else {
            Vec::new()
        }
    }

    fn rapid_wind(
        &mut self,
        serial_number: &str,
        ob: &[Option<f64>],
        now: DateTime<Utc>,
    ) -> Option<NormalizedRecord> {
        let speed = field(ob, rapid_wind::SPEED);
        let bearing = field(ob, rapid_wind::DIRECTION);
        if speed.is_some() {
            self.wind_speed = speed;
        }

        if self
            .last_rapid_wind
            .is_some_and(|last| now - last < self.rapid_wind_interval)
        {
            debug!("Rapid wind throttled");
            return None;
        }
        self.last_rapid_wind = Some(now);

        let mut record = NormalizedRecord::new(EventType::RapidWind, Some(serial_number));
        if let Some(speed) = speed {
            record = record.with_field("wind_speed", json!(self.cnv.speed(speed, false)));
        }
        if let Some(bearing) = bearing {
            record = record
                .with_field("wind_bearing", json!(bearing))
                .with_field("wind_direction", json!(self.cnv.direction(bearing)));
        }
        Some(record)
    }

    fn sky(
        &mut self,
        event: EventType,
        serial_number: &str,
        family: DeviceFamily,
        sky: SkyReading,
        now: DateTime<Utc>,
    ) -> NormalizedRecord {
        if sky.solar_radiation.is_some() {
            self.solar_radiation = sky.solar_radiation;
        }
        if sky.wind_direction.is_some() {
            self.wind_bearing_avg = sky.wind_direction;
        }
        if let Some(rain) = sky.rain_accumulated {
            self.rain_rate = Some(rain * 60.0);
        }
        if sky.precipitation_type.is_some() {
            self.precipitation_type = sky.precipitation_type;
        }

        if let Some(rain) = sky.rain_accumulated.filter(|rain| *rain > 0.0) {
            self.storage.rain_today += rain;
            self.storage.rain_duration_today += 1;
            debug!(rain, total = self.storage.rain_today, "Rain accumulated");
            self.persist_storage();
        }

        let ctx = self.context(family, AirReading::default(), sky, None, now);
        let record = self.build_record(event, serial_number, SensorGroup::Sky, &ctx);
        self.track(&record, now);
        record
    }

    fn air(
        &mut self,
        event: EventType,
        serial_number: &str,
        family: DeviceFamily,
        air: AirReading,
        now: DateTime<Utc>,
    ) -> NormalizedRecord {
        let sealevel = self
            .cnv
            .sea_level_pressure(air.station_pressure, self.station.elevation_m)
            .ok();

        // Trend is read before this reading joins the series
        let trend = sealevel.map(|p| self.store.pressure_trend(now, p, self.thresholds));
        if let Some(pressure) = sealevel {
            if let Err(e) = self.store.write_pressure_sample(now, pressure) {
                error!("Failed to persist pressure sample: {:#}", e);
            }
        }

        let ctx = self.context(family, air, SkyReading::default(), trend, now);
        let record = self.build_record(event, serial_number, SensorGroup::Air, &ctx);
        self.track(&record, now);
        record
    }

    fn strike(&mut self, serial_number: &str, evt: &[Option<f64>], now: DateTime<Utc>) -> NormalizedRecord {
        if let Err(e) = self.store.write_lightning_event(now) {
            error!("Failed to persist lightning event: {:#}", e);
        }

        self.storage.lightning_count_today += 1;
        self.storage.last_lightning_time = Some(now);
        if let Some(distance) = field(evt, evt_strike::DISTANCE) {
            self.storage.last_lightning_distance = distance;
        }
        if let Some(energy) = field(evt, evt_strike::ENERGY) {
            self.storage.last_lightning_energy = energy;
        }
        self.persist_storage();

        let record = NormalizedRecord::new(EventType::EvtStrike, Some(serial_number))
            .with_field(
                "lightning_strike_count_today",
                json!(self.storage.lightning_count_today),
            )
            .with_field(
                "lightning_strike_distance",
                json!(self.cnv.distance(self.storage.last_lightning_distance)),
            )
            .with_field(
                "lightning_strike_energy",
                json!(self.storage.last_lightning_energy),
            )
            .with_field("lightning_strike_time", json!(now.to_rfc3339()));
        self.track(&record, now);
        record
    }

    fn precip(&mut self, serial_number: &str, now: DateTime<Utc>) -> NormalizedRecord {
        self.storage.rain_start = Some(now);
        self.persist_storage();
        NormalizedRecord::new(EventType::EvtPrecip, Some(serial_number))
            .with_field("rain_start_time", json!(now.to_rfc3339()))
    }

    fn context(
        &self,
        family: DeviceFamily,
        air: AirReading,
        sky: SkyReading,
        pressure_trend: Option<PressureTrend>,
        now: DateTime<Utc>,
    ) -> SensorContext<'_> {
        SensorContext {
            cnv: &self.cnv,
            station: &self.station,
            storage: &self.storage,
            family,
            air,
            sky,
            wind_speed: self.wind_speed,
            solar_radiation: self.solar_radiation,
            wind_bearing_avg: self.wind_bearing_avg,
            rain_rate: self.rain_rate,
            precipitation_type: self.precipitation_type,
            pressure_trend,
            lightning_count_1hr: self.store.lightning_count(now, 1),
            lightning_count_3hr: self.store.lightning_count(now, 3),
            now,
            local_month: self.scheduler.current_date().month(),
            last_midnight: self.scheduler.last_midnight(),
        }
    }

    fn build_record(
        &self,
        event: EventType,
        serial_number: &str,
        group: SensorGroup,
        ctx: &SensorContext<'_>,
    ) -> NormalizedRecord {
        let mut record = NormalizedRecord::new(event, Some(serial_number));
        for sensor in sensors_for(group, ctx.family) {
            match (sensor.compute)(ctx) {
                Ok(value) => {
                    record.fields.insert(sensor.id.to_owned(), value);
                    if let Some(unit) = sensor.unit(&self.cnv) {
                        record.units.insert(sensor.id.to_owned(), unit);
                    }
                }
                Err(e) => debug!(field = sensor.id, "Field omitted: {}", e),
            }
        }
        record
    }

    /// Feed tracked fields of `record` to the high/low tracker and persist
    /// the touched records.
    fn track(&mut self, record: &NormalizedRecord, now: DateTime<Utc>) {
        let touched = self.tracker.update_from_fields(&record.fields, now);
        self.persist_high_low(&touched);
    }

    fn rollover(&mut self, rollover: Rollover, now: DateTime<Utc>) {
        info!(
            rain_today = self.storage.rain_today,
            rain_duration_today = self.storage.rain_duration_today,
            lightning_today = self.storage.lightning_count_today,
            "Rolling over daily totals"
        );
        self.storage.rain_yesterday = self.storage.rain_today;
        self.storage.rain_today = 0.0;
        self.storage.rain_duration_yesterday = self.storage.rain_duration_today;
        self.storage.rain_duration_today = 0;
        self.storage.lightning_count_today = 0;
        self.persist_storage();
        if let Err(e) = self.store.write_rollover_date(self.scheduler.current_date()) {
            error!("Failed to persist rollover date: {:#}", e);
        }

        self.tracker.rollover_daily(now);
        if rollover.weekly {
            self.tracker.rollover_weekly(now);
        }
        if rollover.monthly {
            self.tracker.rollover_monthly(now);
        }
        if rollover.yearly {
            self.tracker.rollover_yearly(now);
        }
        self.persist_high_low(&TrackedSensor::ALL);
    }

    fn persist_storage(&self) {
        if let Err(e) = self.store.write_storage(&self.storage) {
            error!("Failed to persist storage record: {:#}", e);
        }
    }

    fn persist_high_low(&self, sensors: &[TrackedSensor]) {
        for sensor in sensors {
            if let Some(record) = self.tracker.get(*sensor) {
                if let Err(e) = self.store.write_high_low(*sensor, record) {
                    error!("Failed to persist high/low for {}: {:#}", sensor, e);
                }
            }
        }
    }

    fn high_low_record(&self) -> NormalizedRecord {
        let mut record = NormalizedRecord::new(EventType::HighLow, None);
        for (sensor, extremes) in self.tracker.read_all() {
            match serde_json::to_value(extremes) {
                Ok(value) => {
                    record.fields.insert(sensor.id().to_owned(), value);
                }
                Err(e) => error!("Failed to serialize high/low for {}: {}", sensor, e),
            }
        }
        record
    }

    /// Storage record fields in output units
    fn storage_record(&self) -> NormalizedRecord {
        let storage = &self.storage;
        let timestamp = |at: Option<DateTime<Utc>>| at.map_or(Value::Null, |t| json!(t.to_rfc3339()));
        NormalizedRecord::new(EventType::Storage, None)
            .with_field("rain_today", json!(self.cnv.rain(storage.rain_today)))
            .with_field("rain_yesterday", json!(self.cnv.rain(storage.rain_yesterday)))
            .with_field("rain_start_time", timestamp(storage.rain_start))
            .with_field("rain_duration_today", json!(storage.rain_duration_today))
            .with_field("rain_duration_yesterday", json!(storage.rain_duration_yesterday))
            .with_field(
                "lightning_strike_count_today",
                json!(storage.lightning_count_today),
            )
            .with_field("lightning_strike_time", timestamp(storage.last_lightning_time))
            .with_field(
                "lightning_strike_distance",
                json!(self.cnv.distance(storage.last_lightning_distance)),
            )
            .with_field("lightning_strike_energy", json!(storage.last_lightning_energy))
            .with_field("last_reset_midnight", json!(self.scheduler.last_midnight().to_rfc3339()))
    }
}
