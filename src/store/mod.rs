//! Durable aggregate state
//!
//! Backed by an embedded fjall database with one keyspace per concern:
//!
//! - `storage`: the single `StorageRecord`
//! - `history`: the pressure and lightning series, one encoded vector each
//! - `high_low`: one `HighLowRecord` per tracked sensor id
//! - `meta`: the schema version and the local date of the last daily rollover
//!
//! Values are postcard-encoded. The series are mirrored in memory; a write
//! updates memory first so a failing disk never loses the running window.

pub mod record;

pub use record::{
    LightningEvent, PressureSample, PressureTrend, StorageRecord, Trend, TrendThresholds,
};

use crate::highlow::{HighLowRecord, TrackedSensor};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use fjall::Keyspace;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// How far back the pressure baseline is taken from
pub const PRESSURE_TREND_WINDOW_SECS: i64 = 3 * 60 * 60;
/// Lightning events older than this are never counted
pub const LIGHTNING_WINDOW_SECS: i64 = 3 * 60 * 60;
/// Extra retention beyond each window before housekeeping purges
pub const RETENTION_GRACE_SECS: i64 = 60;

pub const SCHEMA_VERSION: u32 = 2;

const STORAGE_KEY: &str = "record";
const PRESSURE_KEY: &str = "pressure";
const LIGHTNING_KEY: &str = "lightning";
const SCHEMA_KEY: &str = "schema_version";
const ROLLOVER_KEY: &str = "last_rollover_date";

fn get_from_store(store: &Keyspace, key: &str) -> Result<Option<Vec<u8>>> {
    Ok(store.get(key.as_bytes())?.map(|v| v.to_vec()))
}

fn read_value<T: DeserializeOwned>(store: &Keyspace, key: &str) -> Result<Option<T>> {
    match get_from_store(store, key)? {
        Some(bytes) => Ok(Some(
            postcard::from_bytes(&bytes).with_context(|| format!("Corrupt value under '{key}'"))?,
        )),
        None => Ok(None),
    }
}

fn write_value<T: Serialize>(store: &Keyspace, key: &str, value: &T) -> Result<()> {
    let bytes = postcard::to_stdvec(value)?;
    store
        .insert(key.as_bytes().to_vec(), bytes)
        .with_context(|| format!("Failed to write '{key}'"))?;
    Ok(())
}

/// Aggregate state store
pub struct AggregateStore {
    _db: fjall::Database,
    storage: Keyspace,
    history: Keyspace,
    high_low: Keyspace,
    meta: Keyspace,
    pressure: Vec<PressureSample>,
    lightning: Vec<LightningEvent>,
}

impl AggregateStore {
    /// Open (or create) the store at `path` and bring its schema up to date
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = fjall::Database::builder(path)
            .open()
            .with_context(|| format!("Failed to open state store at {}", path.display()))?;
        let storage = db.keyspace("storage", fjall::KeyspaceCreateOptions::default)?;
        let history = db.keyspace("history", fjall::KeyspaceCreateOptions::default)?;
        let high_low = db.keyspace("high_low", fjall::KeyspaceCreateOptions::default)?;
        let meta = db.keyspace("meta", fjall::KeyspaceCreateOptions::default)?;

        let mut store = Self {
            _db: db,
            storage,
            history,
            high_low,
            meta,
            pressure: Vec::new(),
            lightning: Vec::new(),
        };
        store.migrate()?;
        store.pressure = read_value(&store.history, PRESSURE_KEY)?.unwrap_or_default();
        store.lightning = read_value(&store.history, LIGHTNING_KEY)?.unwrap_or_default();

        info!(
            path = %path.display(),
            pressure_samples = store.pressure.len(),
            lightning_events = store.lightning.len(),
            "State store opened"
        );
        Ok(store)
    }

    pub fn schema_version(&self) -> Result<u32> {
        Ok(read_value(&self.meta, SCHEMA_KEY)?.unwrap_or(0))
    }

    /// Apply every migration step between the stored and current version
    fn migrate(&self) -> Result<()> {
        let mut version = self.schema_version()?;
        while version < SCHEMA_VERSION {
            match version {
                0 => {
                    if read_value::<StorageRecord>(&self.storage, STORAGE_KEY)?.is_none() {
                        write_value(&self.storage, STORAGE_KEY, &StorageRecord::default())?;
                    }
                }
                1 => {
                    for sensor in TrackedSensor::ALL {
                        if read_value::<HighLowRecord>(&self.high_low, sensor.id())?.is_none() {
                            write_value(&self.high_low, sensor.id(), &HighLowRecord::seeded(sensor))?;
                        }
                    }
                }
                other => anyhow::bail!("No migration from schema version {other}"),
            }
            version += 1;
            write_value(&self.meta, SCHEMA_KEY, &version)?;
            info!(version, "Migrated state store schema");
        }
        Ok(())
    }

    /// Local date the daily totals were last rolled over to
    pub fn read_rollover_date(&self) -> Result<Option<NaiveDate>> {
        read_value(&self.meta, ROLLOVER_KEY)
    }

    pub fn write_rollover_date(&self, date: NaiveDate) -> Result<()> {
        write_value(&self.meta, ROLLOVER_KEY, &date)
    }

    /// The storage record, created with zero defaults if absent
    #[tracing::instrument(name = "read_storage", level = "debug", skip(self))]
    pub fn read_storage(&self) -> Result<StorageRecord> {
        match read_value(&self.storage, STORAGE_KEY)? {
            Some(record) => Ok(record),
            None => {
                let record = StorageRecord::default();
                write_value(&self.storage, STORAGE_KEY, &record)?;
                Ok(record)
            }
        }
    }

    /// Overwrite the storage record
    #[tracing::instrument(name = "write_storage", level = "debug", skip(self))]
    pub fn write_storage(&self, record: &StorageRecord) -> Result<()> {
        write_value(&self.storage, STORAGE_KEY, record)
    }

    #[tracing::instrument(name = "write_pressure", level = "debug", skip(self))]
    pub fn write_pressure_sample(&mut self, at: DateTime<Utc>, value: f64) -> Result<()> {
        self.pressure.push(PressureSample { at, value });
        write_value(&self.history, PRESSURE_KEY, &self.pressure)
    }

    /// Trend of `current` against the newest sample older than the trend
    /// window. Without such a sample the trend is steady.
    #[must_use]
    pub fn pressure_trend(
        &self,
        now: DateTime<Utc>,
        current: f64,
        thresholds: TrendThresholds,
    ) -> PressureTrend {
        let cutoff = now - Duration::seconds(PRESSURE_TREND_WINDOW_SECS);
        let baseline = self
            .pressure
            .iter()
            .filter(|sample| sample.at < cutoff)
            .max_by_key(|sample| sample.at);

        match baseline {
            Some(sample) => thresholds.classify(current - sample.value),
            None => {
                debug!("No pressure history older than the trend window");
                thresholds.classify(0.0)
            }
        }
    }

    #[tracing::instrument(name = "write_lightning", level = "debug", skip(self))]
    pub fn write_lightning_event(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.lightning.push(LightningEvent { at });
        write_value(&self.history, LIGHTNING_KEY, &self.lightning)
    }

    /// Strikes strictly inside the last `hours`
    #[must_use]
    pub fn lightning_count(&self, now: DateTime<Utc>, hours: i64) -> usize {
        let cutoff = now - Duration::hours(hours);
        self.lightning.iter().filter(|event| event.at > cutoff).count()
    }

    /// Drop series entries older than their window plus the grace period.
    /// Returns how many entries were purged.
    #[tracing::instrument(name = "housekeeping", level = "debug", skip(self))]
    pub fn housekeeping(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let pressure_cutoff =
            now - Duration::seconds(PRESSURE_TREND_WINDOW_SECS + RETENTION_GRACE_SECS);
        let lightning_cutoff = now - Duration::seconds(LIGHTNING_WINDOW_SECS + RETENTION_GRACE_SECS);

        let before = self.pressure.len() + self.lightning.len();
        self.pressure.retain(|sample| sample.at >= pressure_cutoff);
        self.lightning.retain(|event| event.at >= lightning_cutoff);
        let purged = before - (self.pressure.len() + self.lightning.len());

        write_value(&self.history, PRESSURE_KEY, &self.pressure)?;
        write_value(&self.history, LIGHTNING_KEY, &self.lightning)?;

        debug!(purged, "Housekeeping finished");
        Ok(purged)
    }

    /// Every persisted high/low record
    pub fn read_high_low(&self) -> Result<BTreeMap<TrackedSensor, HighLowRecord>> {
        let mut records = BTreeMap::new();
        for sensor in TrackedSensor::ALL {
            if let Some(record) = read_value(&self.high_low, sensor.id())? {
                records.insert(sensor, record);
            }
        }
        Ok(records)
    }

    pub fn write_high_low(&self, sensor: TrackedSensor, record: &HighLowRecord) -> Result<()> {
        write_value(&self.high_low, sensor.id(), record)
    }

    #[must_use]
    pub fn pressure_samples(&self) -> &[PressureSample] {
        &self.pressure
    }

    #[must_use]
    pub fn lightning_events(&self) -> &[LightningEvent] {
        &self.lightning
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversions::UnitSystem;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap()
    }

    fn metric() -> TrendThresholds {
        TrendThresholds::for_units(UnitSystem::Metric)
    }

    #[test]
    fn test_fresh_store_is_migrated() {
        let dir = TempDir::new().unwrap();
        let store = AggregateStore::open(dir.path()).unwrap();

        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
        assert_eq!(store.read_storage().unwrap(), StorageRecord::default());
        assert_eq!(store.read_high_low().unwrap().len(), TrackedSensor::ALL.len());
    }

    #[test]
    fn test_storage_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let record = StorageRecord {
            rain_today: 3.2,
            rain_start: Some(now()),
            lightning_count_today: 2,
            last_lightning_distance: 14.0,
            ..StorageRecord::default()
        };
        {
            let store = AggregateStore::open(dir.path()).unwrap();
            store.write_storage(&record).unwrap();
        }

        let store = AggregateStore::open(dir.path()).unwrap();
        assert_eq!(store.read_storage().unwrap(), record);
    }

    #[test]
    fn test_series_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = AggregateStore::open(dir.path()).unwrap();
            store.write_pressure_sample(now(), 1012.5).unwrap();
            store.write_lightning_event(now()).unwrap();
        }

        let store = AggregateStore::open(dir.path()).unwrap();
        assert_eq!(store.pressure_samples().len(), 1);
        assert_eq!(store.lightning_events().len(), 1);
    }

    #[test]
    fn test_trend_without_history_is_steady() {
        let dir = TempDir::new().unwrap();
        let mut store = AggregateStore::open(dir.path()).unwrap();
        // newer than the window, so not a baseline
        store
            .write_pressure_sample(now() - Duration::hours(1), 1000.0)
            .unwrap();

        let trend = store.pressure_trend(now(), 1010.0, metric());
        assert_eq!(trend.trend, Trend::Steady);
        assert_eq!(trend.delta, 0.0);
    }

    #[test]
    fn test_trend_uses_newest_sample_older_than_window() {
        let dir = TempDir::new().unwrap();
        let mut store = AggregateStore::open(dir.path()).unwrap();
        store
            .write_pressure_sample(now() - Duration::hours(5), 1000.0)
            .unwrap();
        store
            .write_pressure_sample(now() - Duration::hours(3) - Duration::minutes(1), 1011.0)
            .unwrap();
        store
            .write_pressure_sample(now() - Duration::minutes(30), 990.0)
            .unwrap();

        let rising = store.pressure_trend(now(), 1012.0, metric());
        assert_eq!(rising.trend, Trend::Rising);
        assert_eq!(rising.delta, 1.0);

        let falling = store.pressure_trend(now(), 1010.0, metric());
        assert_eq!(falling.trend, Trend::Falling);
        assert_eq!(falling.delta, -1.0);

        let steady = store.pressure_trend(now(), 1011.5, metric());
        assert_eq!(steady.trend, Trend::Steady);
    }

    #[test]
    fn test_lightning_count_window() {
        let dir = TempDir::new().unwrap();
        let mut store = AggregateStore::open(dir.path()).unwrap();
        for offset in [
            Duration::hours(4),
            Duration::hours(2),
            Duration::hours(1),
            Duration::minutes(5),
        ] {
            store.write_lightning_event(now() - offset).unwrap();
        }

        assert_eq!(store.lightning_count(now(), 3), 3);
        assert_eq!(store.lightning_count(now(), 1), 1);
    }

    #[test]
    fn test_housekeeping_purges_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut store = AggregateStore::open(dir.path()).unwrap();
        store
            .write_pressure_sample(now() - Duration::hours(3) - Duration::seconds(30), 1000.0)
            .unwrap();
        store
            .write_pressure_sample(now() - Duration::hours(4), 1001.0)
            .unwrap();
        store.write_lightning_event(now() - Duration::hours(5)).unwrap();
        store.write_lightning_event(now() - Duration::hours(2)).unwrap();

        assert_eq!(store.housekeeping(now()).unwrap(), 2);
        assert_eq!(store.pressure_samples().len(), 1);
        assert_eq!(store.lightning_events().len(), 1);

        assert_eq!(store.housekeeping(now()).unwrap(), 0);
        assert_eq!(store.pressure_samples().len(), 1);
    }

    #[test]
    fn test_rollover_date_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        {
            let store = AggregateStore::open(dir.path()).unwrap();
            assert_eq!(store.read_rollover_date().unwrap(), None);
            store.write_rollover_date(date).unwrap();
        }

        let store = AggregateStore::open(dir.path()).unwrap();
        assert_eq!(store.read_rollover_date().unwrap(), Some(date));
    }

    #[test]
    fn test_high_low_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = AggregateStore::open(dir.path()).unwrap();

        let mut record = HighLowRecord::seeded(TrackedSensor::WindGust);
        record.latest = Some(12.3);
        record.day.max = 12.3;
        store.write_high_low(TrackedSensor::WindGust, &record).unwrap();

        let records = store.read_high_low().unwrap();
        assert_eq!(records[&TrackedSensor::WindGust], record);
    }
}
