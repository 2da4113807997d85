//! Lifecycle contract for supervised services

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::{CoreResult, GeoPoint};

/// Health snapshot reported by a managed service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub name: String,
    pub state: String,
    pub ready: bool,
    pub detail: Option<String>,
}

/// A service the orchestrator can start, stop and wait on
#[async_trait]
pub trait ManagedService: Send + Sync {
    /// Stable service name for logs and status output
    fn name(&self) -> &'static str;

    /// Begin startup. Readiness may be reported later through [`Self::readiness`].
    async fn start(&self) -> CoreResult<()>;

    /// Stop the service and cancel its background work
    async fn stop(&self);

    /// Current health snapshot
    fn health(&self) -> ServiceHealth;

    /// Readiness channel: latest value plus change notification
    fn readiness(&self) -> watch::Receiver<bool>;
}

/// Receiver of emergency state changes raised by the location tracker
#[async_trait]
pub trait EmergencyBeacon: Send + Sync {
    /// Raise or clear the emergency beacon at the last known position
    async fn signal_emergency(&self, active: bool, position: Option<GeoPoint>);
}

/// Readiness flag backed by a `watch` channel
#[derive(Debug)]
pub struct Readiness {
    tx: watch::Sender<bool>,
}

impl Readiness {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Set readiness, notifying receivers only on change
    pub fn set(&self, ready: bool) {
        self.tx.send_if_modified(|current| {
            if *current == ready {
                false
            } else {
                *current = ready;
                true
            }
        });
    }

    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve once the receiver reports ready; `false` if the sender is gone
pub async fn wait_until_ready(mut rx: watch::Receiver<bool>) -> bool {
    rx.wait_for(|ready| *ready).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_readiness_notifies_waiters() {
        let readiness = Readiness::new();
        let rx = readiness.subscribe();
        assert!(!readiness.is_ready());

        let waiter = tokio::spawn(wait_until_ready(rx));
        readiness.set(true);

        let ready = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_ready_times_out() {
        let readiness = Readiness::new();
        let result =
            tokio::time::timeout(Duration::from_secs(30), wait_until_ready(readiness.subscribe()))
                .await;

        assert!(result.is_err());
    }
}
