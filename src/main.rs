use anyhow::{Context, Result};
use stationflow::config::LoggingConfig;
use stationflow::{
    AggregateStore, ConversionEngine, EngineConfig, JsonLinePublisher, NormalizedRecord,
    ObservationProcessor, Publisher, StationError, StationListener, SystemClock, Translations,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("stationflow={}", logging.level)));

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn publish_all(publisher: &impl Publisher, records: Vec<NormalizedRecord>) {
    for record in records {
        if let Err(e) = publisher.publish(&record).await {
            error!("{}", e.user_message());
            debug!("Publish failure detail: {}", e);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load_from_path(Some(PathBuf::from(path)))?,
        None => EngineConfig::load()?,
    };
    init_logging(&config.logging);

    info!(version = stationflow::VERSION, "Starting StationFlow");

    let translations = match &config.translations_file {
        Some(path) => Translations::from_file(path)
            .with_context(|| format!("Failed to load translations from {}", path.display()))?,
        None => Translations::english(),
    };
    let cnv = ConversionEngine::new(config.station.unit_system, translations);
    let store = AggregateStore::open(&config.storage.path)?;
    let mut processor = ObservationProcessor::new(&config, cnv, store, SystemClock)?;

    let mut listener = StationListener::bind(&config.listener).await?;
    let publisher = JsonLinePublisher::stdout();

    let mut ticker =
        tokio::time::interval(Duration::from_secs(config.processing.tick_interval_secs));

    loop {
        tokio::select! {
            received = listener.recv() => match received {
                Ok(observation) => {
                    let records = processor.process(&observation);
                    publish_all(&publisher, records).await;
                }
                Err(StationError::Decode { message }) => {
                    warn!("Dropping undecodable datagram: {}", message);
                }
                Err(e) => error!("Listener failed: {}", e),
            },
            _ = ticker.tick() => {
                let records = processor.tick();
                publish_all(&publisher, records).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}
