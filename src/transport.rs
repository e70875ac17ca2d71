//! UDP listener for station broadcasts

use crate::config::ListenerConfig;
use crate::observation::Observation;
use crate::Result;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, info};

/// Largest datagram a hub sends is well under this
const MAX_DATAGRAM: usize = 4096;

pub struct StationListener {
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl StationListener {
    pub async fn bind(config: &ListenerConfig) -> Result<Self> {
        let socket = UdpSocket::bind((config.host.as_str(), config.port)).await?;
        info!(addr = %socket.local_addr()?, "Listening for station broadcasts");
        Ok(Self {
            socket,
            buf: vec![0; MAX_DATAGRAM],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Wait for the next datagram and decode it.
    ///
    /// Socket failures and undecodable payloads are both returned as errors;
    /// the caller decides whether to keep listening.
    pub async fn recv(&mut self) -> Result<Observation> {
        let (len, from) = self.socket.recv_from(&mut self.buf).await?;
        debug!(%from, len, "Datagram received");
        Observation::decode(&self.buf[..len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StationError;

    fn local_config() -> ListenerConfig {
        ListenerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        }
    }

    #[tokio::test]
    async fn test_receives_and_decodes() {
        let mut listener = StationListener::bind(&local_config()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(
                br#"{"type":"evt_precip","serial_number":"SK-00008453","evt":[1493322445]}"#,
                addr,
            )
            .await
            .unwrap();

        let observation = listener.recv().await.unwrap();
        assert_eq!(observation.serial_number(), Some("SK-00008453"));
    }

    #[tokio::test]
    async fn test_garbage_is_a_decode_error() {
        let mut listener = StationListener::bind(&local_config()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"not json", addr).await.unwrap();

        let err = listener.recv().await.unwrap_err();
        assert!(matches!(err, StationError::Decode { .. }));
    }
}
