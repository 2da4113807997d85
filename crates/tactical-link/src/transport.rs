//! Outbound transports for link messages

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use crate::error::{LinkError, LinkResult};
use crate::protocol::LinkMessage;

/// Delivers encoded messages to the tactical network
#[async_trait]
pub trait LinkTransport: Send + Sync {
    /// Transmit one message, returning the frame size in bytes
    async fn transmit(&self, message: &LinkMessage) -> LinkResult<usize>;
}

/// Writes each message to the log instead of a radio
#[derive(Debug, Default)]
pub struct LoggingTransport;

#[async_trait]
impl LinkTransport for LoggingTransport {
    async fn transmit(&self, message: &LinkMessage) -> LinkResult<usize> {
        let frame = message.to_bytes()?;
        let json = message.to_json()?;
        info!(
            kind = message.kind(),
            bytes = frame.len(),
            "Link TX {}",
            json
        );
        Ok(frame.len())
    }
}

/// Keeps transmitted messages in memory; can be told to fail
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<LinkMessage>>,
    failing: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    pub fn sent(&self) -> Vec<LinkMessage> {
        self.sent.lock().clone()
    }

    pub fn sent_of_kind(&self, kind: &str) -> usize {
        self.sent.lock().iter().filter(|m| m.kind() == kind).count()
    }
}

#[async_trait]
impl LinkTransport for MemoryTransport {
    async fn transmit(&self, message: &LinkMessage) -> LinkResult<usize> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(LinkError::transport("transport offline"));
        }
        let frame = message.to_bytes()?;
        debug!("Buffered {} message ({} bytes)", message.kind(), frame.len());
        self.sent.lock().push(message.clone());
        Ok(frame.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tactical_core::GeoPoint;

    #[tokio::test]
    async fn test_logging_transport_reports_frame_size() {
        let msg = LinkMessage::emergency_beacon("VIPER-1", true, Some(GeoPoint::new(1.0, 1.0)), "");
        let bytes = LoggingTransport.transmit(&msg).await.unwrap();
        assert_eq!(bytes, msg.to_bytes().unwrap().len());
    }

    #[tokio::test]
    async fn test_memory_transport_failure_toggle() {
        let transport = MemoryTransport::new();
        let msg = LinkMessage::emergency_beacon("VIPER-1", false, None, "clear");

        transport.transmit(&msg).await.unwrap();
        transport.set_failing(true);
        assert!(transport.transmit(&msg).await.is_err());

        assert_eq!(transport.sent_of_kind("emergency"), 1);
    }
}
