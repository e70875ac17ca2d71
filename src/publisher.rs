//! Outbound record sink

use crate::processor::NormalizedRecord;
use crate::{Result, StationError};
use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Destination for normalized records
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, record: &NormalizedRecord) -> Result<()>;
}

/// Writes each record as one JSON line
pub struct JsonLinePublisher<W> {
    writer: Mutex<W>,
}

impl JsonLinePublisher<tokio::io::Stdout> {
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> JsonLinePublisher<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> Publisher for JsonLinePublisher<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn publish(&self, record: &NormalizedRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&line)
            .await
            .map_err(|e| StationError::publish(format!("{} on {}", e, record.topic)))?;
        writer
            .flush()
            .await
            .map_err(|e| StationError::publish(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::Observation;
    use crate::processor::ObservationProcessor;

    #[tokio::test]
    async fn test_one_line_per_record() {
        let dir = tempfile::TempDir::new().unwrap();
        let clock = crate::clock::ManualClock::new(chrono::Utc::now());
        let config = crate::config::EngineConfig::default();
        let store = crate::store::AggregateStore::open(dir.path()).unwrap();
        let cnv = crate::conversions::ConversionEngine::english(config.station.unit_system);
        let mut processor = ObservationProcessor::new(&config, cnv, store, clock).unwrap();

        let observation = Observation::decode(
            br#"{"type":"hub_status","serial_number":"HB-00000001","uptime":3661,"rssi":-60}"#,
        )
        .unwrap();
        let publisher = JsonLinePublisher::new(Vec::new());
        for record in processor.process(&observation) {
            publisher.publish(&record).await.unwrap();
        }

        let output = String::from_utf8(publisher.into_inner()).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 1);

        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["topic"], "stationflow/HB-00000001/hub_status");
        assert_eq!(value["event"], "hub_status");
        assert_eq!(value["fields"]["hub_status"], "1:01:01");
    }
}
