//! `StationFlow` - Weather station telemetry engine
//!
//! This library decodes station broadcasts, converts them into derived
//! meteorological values and keeps the aggregate state (daily totals,
//! pressure and lightning history, high/low extremes) that survives restarts.

pub mod clock;
pub mod config;
pub mod conversions;
pub mod error;
pub mod highlow;
pub mod observation;
pub mod processor;
pub mod publisher;
pub mod scheduler;
pub mod sensors;
pub mod store;
pub mod transport;

// Re-export core types for public API
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use conversions::{ConversionEngine, Translations, UnitSystem};
pub use error::StationError;
pub use highlow::{HighLowRecord, HighLowTracker, TrackedSensor};
pub use observation::{DeviceFamily, EventType, Observation};
pub use processor::{NormalizedRecord, ObservationProcessor, ProcessorState};
pub use publisher::{JsonLinePublisher, Publisher};
pub use store::{AggregateStore, StorageRecord};
pub use transport::StationListener;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, StationError>;
