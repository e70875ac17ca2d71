use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use stationflow::{
    AggregateStore, Clock, ConversionEngine, EngineConfig, EventType, ManualClock, NormalizedRecord,
    Observation, ObservationProcessor, TrackedSensor,
};
use std::path::Path;
use tempfile::TempDir;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
}

fn processor_with(
    dir: &Path,
    clock: &ManualClock,
    config: &EngineConfig,
) -> ObservationProcessor<ManualClock> {
    let store = AggregateStore::open(dir).unwrap();
    let cnv = ConversionEngine::english(config.station.unit_system);
    ObservationProcessor::new(config, cnv, store, clock.clone()).unwrap()
}

fn processor(dir: &Path, clock: &ManualClock) -> ObservationProcessor<ManualClock> {
    processor_with(dir, clock, &EngineConfig::default())
}

fn decode(json: &str) -> Observation {
    Observation::decode(json.as_bytes()).unwrap()
}

fn strike() -> Observation {
    decode(r#"{"type":"evt_strike","serial_number":"AR-00004049","evt":[1493322445,27,3848]}"#)
}

fn sky_with_rain(mm: f64) -> Observation {
    decode(&format!(
        r#"{{"type":"obs_sky","serial_number":"SK-00008453",
            "obs":[[1493321340,9000,10,{mm},2.6,4.6,7.4,187,3.12,1,130,null,1,3]]}}"#
    ))
}

fn air(pressure: f64, temperature: f64) -> Observation {
    decode(&format!(
        r#"{{"type":"obs_air","serial_number":"AR-00004049",
            "obs":[[1493164835,{pressure},{temperature},45,0,0,3.46,1]]}}"#
    ))
}

fn find(records: &[NormalizedRecord], event: EventType) -> &NormalizedRecord {
    records
        .iter()
        .find(|record| record.event == event)
        .unwrap_or_else(|| panic!("no {event} record"))
}

#[test]
fn test_midnight_rollover_moves_totals() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 22, 0, 0).unwrap());
    let mut processor = processor(dir.path(), &clock);

    processor.process(&sky_with_rain(12.4));
    for _ in 0..5 {
        processor.process(&strike());
    }
    assert_eq!(processor.storage().rain_today, 12.4);
    assert_eq!(processor.storage().lightning_count_today, 5);

    clock.set(Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 30).unwrap());
    let records = processor.tick();

    let storage = processor.storage();
    assert_eq!(storage.rain_yesterday, 12.4);
    assert_eq!(storage.rain_today, 0.0);
    assert_eq!(storage.rain_duration_yesterday, 1);
    assert_eq!(storage.rain_duration_today, 0);
    assert_eq!(storage.lightning_count_today, 0);

    let published = find(&records, EventType::Storage);
    assert_eq!(published.get("rain_yesterday"), Some(&json!(12.4)));
    assert_eq!(
        published.get("last_reset_midnight"),
        Some(&json!("2024-06-02T00:00:00+00:00"))
    );
}

#[test]
fn test_observation_after_midnight_lands_in_new_day() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 23, 59, 0).unwrap());
    let mut processor = processor(dir.path(), &clock);

    processor.process(&sky_with_rain(2.0));
    clock.advance(Duration::minutes(2));
    let records = processor.process(&sky_with_rain(0.5));

    assert_eq!(records[0].event, EventType::HighLow);
    let sky = find(&records, EventType::ObsSky);
    assert_eq!(sky.get("rain_today"), Some(&json!(0.5)));
    assert_eq!(sky.get("rain_yesterday"), Some(&json!(2.0)));
}

#[test]
fn test_lightning_window_counts() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut processor = processor(dir.path(), &clock);

    // strikes at now-4h, now-2h, now-1h and now-5min
    processor.process(&strike());
    clock.advance(Duration::hours(2));
    processor.process(&strike());
    clock.advance(Duration::hours(1));
    processor.process(&strike());
    clock.advance(Duration::minutes(55));
    processor.process(&strike());
    clock.advance(Duration::minutes(5));

    assert_eq!(processor.store().lightning_count(clock.now(), 3), 3);

    let records = processor.process(&air(1000.0, 18.0));
    let air = find(&records, EventType::ObsAir);
    assert_eq!(air.get("lightning_strike_count_3hr"), Some(&json!(3)));
    assert_eq!(air.get("lightning_strike_count_1hr"), Some(&json!(1)));
    assert_eq!(air.get("lightning_strike_count_today"), Some(&json!(4)));
    assert_eq!(air.get("lightning_strike_distance"), Some(&json!(27.0)));
}

#[test]
fn test_rapid_wind_rate_limit() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut config = EngineConfig::default();
    config.processing.rapid_wind_interval_secs = 10;
    let mut processor = processor_with(dir.path(), &clock, &config);

    let wind = decode(r#"{"type":"rapid_wind","serial_number":"ST-00000512","ob":[1493322445,2.3,128]}"#);
    assert_eq!(processor.process(&wind).len(), 1);

    clock.advance(Duration::seconds(5));
    assert!(processor.process(&wind).is_empty());

    clock.advance(Duration::seconds(5));
    let records = processor.process(&wind);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("wind_speed"), Some(&json!(2.3)));
}

#[test]
fn test_pressure_trend_boundaries() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut processor = processor(dir.path(), &clock);

    let first = processor.process(&air(1000.0, 15.0));
    assert_eq!(first[0].get("pressure_trend"), Some(&json!("Steady")));
    assert_eq!(first[0].get("pressure_trend_value"), Some(&json!(0.0)));

    clock.advance(Duration::hours(3) + Duration::seconds(1));
    let steady = processor.process(&air(1000.9, 15.0));
    assert_eq!(steady[0].get("pressure_trend"), Some(&json!("Steady")));

    let rising = processor.process(&air(1001.0, 15.0));
    assert_eq!(rising[0].get("pressure_trend"), Some(&json!("Rising")));
    assert_eq!(rising[0].get("pressure_trend_value"), Some(&json!(1.0)));

    let falling = processor.process(&air(999.0, 15.0));
    assert_eq!(falling[0].get("pressure_trend"), Some(&json!("Falling")));
}

#[test]
fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    {
        let mut processor = processor(dir.path(), &clock);
        processor.process(&sky_with_rain(3.2));
        processor.process(&strike());
        processor.process(&air(1000.0, 21.5));
    }

    let processor = processor(dir.path(), &clock);
    assert_eq!(processor.storage().rain_today, 3.2);
    assert_eq!(processor.storage().lightning_count_today, 1);
    assert_eq!(processor.store().pressure_samples().len(), 1);
    assert_eq!(processor.store().lightning_events().len(), 1);

    let temperature = &processor.read_high_low()[&TrackedSensor::AirTemperature];
    assert_eq!(temperature.latest, Some(21.5));
    assert_eq!(temperature.day.max, 21.5);
}

#[test]
fn test_restart_across_midnight_rolls_missed_day() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 22, 0, 0).unwrap());
    {
        let mut processor = processor(dir.path(), &clock);
        processor.process(&sky_with_rain(12.4));
        processor.process(&strike());
        processor.process(&air(1000.0, 21.5));
    }

    clock.set(Utc.with_ymd_and_hms(2024, 6, 2, 8, 0, 0).unwrap());
    let mut restarted = processor(dir.path(), &clock);
    let records = restarted.tick();

    let storage = restarted.storage();
    assert_eq!(storage.rain_today, 0.0);
    assert_eq!(storage.rain_yesterday, 12.4);
    assert_eq!(storage.rain_duration_yesterday, 1);
    assert_eq!(storage.lightning_count_today, 0);

    let temperature = &restarted.read_high_low()[&TrackedSensor::AirTemperature];
    assert_eq!(temperature.yesterday.max, 21.5);

    let published = find(&records, EventType::Storage);
    assert_eq!(
        published.get("last_reset_midnight"),
        Some(&json!("2024-06-02T00:00:00+00:00"))
    );
    drop(restarted);

    // a second start on the same day must not roll again
    let mut again = processor(dir.path(), &clock);
    again.tick();
    assert_eq!(again.storage().rain_yesterday, 12.4);
    assert_eq!(again.storage().rain_today, 0.0);
}

#[test]
fn test_tempest_emits_sky_then_air() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut processor = processor(dir.path(), &clock);

    let records = processor.process(&decode(
        r#"{"type":"obs_st","serial_number":"ST-00000512",
            "obs":[[1588948614,0.18,0.22,0.27,144,6,1017.57,22.37,50.26,328,0.03,3,0.0,0,0,0,2.41,1]]}"#,
    ));

    assert_eq!(records.len(), 2);
    let sky = &records[0];
    let air = &records[1];
    assert_eq!(sky.topic, "stationflow/ST-00000512/obs_sky");
    assert_eq!(air.topic, "stationflow/ST-00000512/obs_air");
    assert_eq!(sky.event, EventType::ObsSky);
    assert_eq!(air.event, EventType::ObsAir);
    assert!(sky.get("battery_level_tempest").is_some());
    assert!(sky.get("battery_desc").is_some());
    assert!(sky.get("illuminance").is_some());
    assert!(sky.get("air_temperature").is_none());

    assert_eq!(air.get("air_temperature"), Some(&json!(22.4)));
    assert!(air.get("wbgt").is_some());
    assert_eq!(air.get("snow_probability"), Some(&json!(0.0)));
    // 3 W/m² against a morning sun
    assert_eq!(air.get("current_conditions"), Some(&json!("cloudy")));
    assert!(air.get("battery_air").is_none());
    assert_eq!(air.units.get("sealevel_pressure"), Some(&"hPa"));
}

#[test]
fn test_missing_humidity_omits_derived_fields() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut processor = processor(dir.path(), &clock);

    let records = processor.process(&decode(
        r#"{"type":"obs_air","serial_number":"AR-00004049",
            "obs":[[1493164835,1000.0,10.0,null,0,0,3.46,1]]}"#,
    ));
    let air = &records[0];
    assert_eq!(air.get("air_temperature"), Some(&json!(10.0)));
    assert!(air.get("relative_humidity").is_none());
    assert!(air.get("dewpoint").is_none());
    assert!(air.get("wetbulb").is_none());
    assert_eq!(air.get("feelslike"), Some(&json!(0.0)));
}

#[test]
fn test_high_low_extremes_and_daily_rollover() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start());
    let mut processor = processor(dir.path(), &clock);

    for temperature in [10.0, 15.0, 5.0] {
        processor.process(&air(1000.0, temperature));
        clock.advance(Duration::minutes(1));
    }

    let record = &processor.read_high_low()[&TrackedSensor::AirTemperature];
    assert_eq!(record.day.max, 15.0);
    assert_eq!(record.day.min, 5.0);
    assert_eq!(record.latest, Some(5.0));
    assert!(record.day.max >= 5.0 && 5.0 >= record.day.min);

    clock.set(Utc.with_ymd_and_hms(2024, 6, 2, 0, 1, 0).unwrap());
    let records = processor.tick();

    let record = &processor.read_high_low()[&TrackedSensor::AirTemperature];
    assert_eq!(record.yesterday.max, 15.0);
    assert_eq!(record.yesterday.min, 5.0);
    assert_eq!(record.day.max, 5.0);
    assert_eq!(record.day.min, 5.0);
    assert_eq!(record.all_time.max, 15.0);

    let high_low = find(&records, EventType::HighLow);
    assert_eq!(high_low.fields["air_temperature"]["yesterday"]["max"], json!(15.0));
}
