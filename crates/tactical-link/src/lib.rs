//! # Tactical Link
//!
//! Simulated connection to a tactical situational-awareness network.
//! Once connected the link broadcasts position reports (PLI), synthesizes
//! nearby peers and relays emergency beacons through a [`LinkTransport`].
//!
//! ## Features
//! - Simulated handshake with `Disconnected -> Connecting -> Connected`
//! - Periodic PLI broadcast from the latest tracker fix
//! - Simulated peer table
//! - Pluggable transport and grid coordinate conversion

pub mod convert;
pub mod error;
pub mod peers;
pub mod protocol;
pub mod transport;

pub use convert::{CoordinateConverter, PlaceholderConverter};
pub use error::{LinkError, LinkResult};
pub use peers::{LinkStats, PeerPosition, PeerTable, simulate_peers};
pub use protocol::{LinkMessage, LinkPayload};
pub use transport::{LinkTransport, LoggingTransport, MemoryTransport};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tactical_core::{
    CoreResult, EmergencyBeacon, Event, EventBus, EventType, GeoPoint, LocationRecord,
    ManagedService, Readiness, ServiceHealth,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Link configuration
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Local callsign used as message sender
    pub callsign: String,
    /// Simulated handshake latency
    pub handshake_delay: Duration,
    /// PLI broadcast interval
    pub pli_interval: Duration,
    /// Peer simulation interval
    pub peer_interval: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            callsign: "VIPER-1".into(),
            handshake_delay: Duration::from_secs(2),
            pli_interval: Duration::from_secs(30),
            peer_interval: Duration::from_secs(15),
        }
    }
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Disconnected => write!(f, "DISCONNECTED"),
            LinkState::Connecting => write!(f, "CONNECTING"),
            LinkState::Connected => write!(f, "CONNECTED"),
            LinkState::Error => write!(f, "ERROR"),
        }
    }
}

/// Snapshot of the link for status displays
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkStatus {
    pub state: LinkState,
    pub callsign: String,
    pub connected_since: Option<DateTime<Utc>>,
    pub peer_count: usize,
    pub stats: LinkStats,
}

struct LinkTasks {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

struct LinkInner {
    config: LinkConfig,
    state: RwLock<LinkState>,
    connected_since: RwLock<Option<DateTime<Utc>>>,
    transport: Arc<dyn LinkTransport>,
    converter: Arc<dyn CoordinateConverter>,
    peers: PeerTable,
    position: RwLock<Option<watch::Receiver<Option<LocationRecord>>>>,
    readiness: Readiness,
    events: Option<EventBus>,
    tasks: Mutex<Option<LinkTasks>>,
}

/// Simulated tactical network link
#[derive(Clone)]
pub struct TacticalLink {
    inner: Arc<LinkInner>,
}

impl TacticalLink {
    pub fn new(config: LinkConfig, transport: Arc<dyn LinkTransport>) -> Self {
        Self::with_parts(config, transport, Arc::new(PlaceholderConverter), None)
    }

    pub fn with_parts(
        config: LinkConfig,
        transport: Arc<dyn LinkTransport>,
        converter: Arc<dyn CoordinateConverter>,
        events: Option<EventBus>,
    ) -> Self {
        Self {
            inner: Arc::new(LinkInner {
                config,
                state: RwLock::new(LinkState::Disconnected),
                connected_since: RwLock::new(None),
                transport,
                converter,
                peers: PeerTable::new(),
                position: RwLock::new(None),
                readiness: Readiness::new(),
                events,
                tasks: Mutex::new(None),
            }),
        }
    }

    /// Use a tracker's position channel as the PLI source
    pub fn set_position_source(&self, rx: watch::Receiver<Option<LocationRecord>>) {
        *self.inner.position.write() = Some(rx);
    }

    pub fn clear_position_source(&self) {
        *self.inner.position.write() = None;
    }

    // ========================================================================
    // CONNECTION
    // ========================================================================

    /// Connect after the simulated handshake and start periodic tasks
    ///
    /// Connecting an already connected or connecting link is a no-op.
    pub async fn connect(&self) -> LinkResult<()> {
        {
            let mut state = self.inner.state.write();
            if matches!(*state, LinkState::Connected | LinkState::Connecting) {
                debug!("Link already {}", *state);
                return Ok(());
            }
            *state = LinkState::Connecting;
        }
        self.inner.publish_state(LinkState::Connecting);
        info!("Tactical link connecting as {}...", self.inner.config.callsign);

        tokio::time::sleep(self.inner.config.handshake_delay).await;

        // State and tasks change together under the tasks lock
        {
            let mut tasks = self.inner.tasks.lock();
            {
                let mut state = self.inner.state.write();
                if *state != LinkState::Connecting {
                    // Disconnected during the handshake
                    return Err(LinkError::InvalidState(format!(
                        "handshake interrupted ({})",
                        *state
                    )));
                }
                *state = LinkState::Connected;
            }
            *self.inner.connected_since.write() = Some(Utc::now());

            let cancel = CancellationToken::new();
            let handles = vec![
                tokio::spawn(pli_loop(self.inner.clone(), cancel.clone())),
                tokio::spawn(peer_loop(self.inner.clone(), cancel.clone())),
            ];
            *tasks = Some(LinkTasks { cancel, handles });
        }
        self.inner.publish_state(LinkState::Connected);

        info!("Tactical link connected");
        Ok(())
    }

    /// Cancel periodic tasks, clear peers and disconnect
    pub async fn disconnect(&self) {
        let (tasks, previous) = {
            let mut guard = self.inner.tasks.lock();
            let previous =
                std::mem::replace(&mut *self.inner.state.write(), LinkState::Disconnected);
            *self.inner.connected_since.write() = None;
            (guard.take(), previous)
        };

        if let Some(tasks) = tasks {
            tasks.cancel.cancel();
            for handle in tasks.handles {
                if let Err(e) = handle.await {
                    warn!("Link task ended abnormally: {}", e);
                }
            }
        }
        self.inner.peers.clear();

        if previous != LinkState::Disconnected {
            self.inner.publish_state(LinkState::Disconnected);
            info!("Tactical link disconnected");
        }
    }

    // ========================================================================
    // MESSAGING
    // ========================================================================

    /// Send an emergency beacon at the latest known position
    ///
    /// Fails with [`LinkError::NotConnected`] unless connected.
    pub async fn send_emergency_beacon(&self, active: bool, message: Option<String>) -> LinkResult<()> {
        let position = self.inner.latest_fix().map(|r| r.position);
        self.inner.transmit_beacon(active, position, message).await
    }

    /// Broadcast a PLI immediately
    pub async fn broadcast_position(&self) -> LinkResult<()> {
        if !self.is_connected() {
            return Err(LinkError::NotConnected);
        }
        self.inner.broadcast_position().await
    }

    /// Grid reference for a point using the configured converter
    pub fn grid_reference(&self, point: GeoPoint) -> LinkResult<String> {
        self.inner.converter.to_grid(point)
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn state(&self) -> LinkState {
        *self.inner.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    pub fn callsign(&self) -> &str {
        &self.inner.config.callsign
    }

    pub fn peers(&self) -> Vec<PeerPosition> {
        self.inner.peers.all()
    }

    pub fn stats(&self) -> LinkStats {
        self.inner.peers.stats()
    }

    pub fn status(&self) -> LinkStatus {
        LinkStatus {
            state: self.state(),
            callsign: self.inner.config.callsign.clone(),
            connected_since: *self.inner.connected_since.read(),
            peer_count: self.inner.peers.len(),
            stats: self.stats(),
        }
    }
}

impl LinkInner {
    fn publish(&self, event: Event) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }

    fn publish_state(&self, state: LinkState) {
        self.publish(Event::component_state(
            EventType::LinkStateChanged,
            "link",
            state.to_string(),
            None,
        ));
    }

    fn latest_fix(&self) -> Option<LocationRecord> {
        self.position
            .read()
            .as_ref()
            .and_then(|rx| rx.borrow().clone())
    }

    async fn send(&self, message: LinkMessage) -> LinkResult<usize> {
        let kind = message.kind();
        match self.transport.transmit(&message).await {
            Ok(bytes) => {
                self.peers.record_sent(kind, bytes);
                self.publish(Event::link_message(kind, bytes, true));
                Ok(bytes)
            }
            Err(e) => {
                warn!("Link transmit failed ({}): {}", kind, e);
                self.peers.record_failure();
                self.publish(Event::link_message(kind, 0, false));
                Err(e)
            }
        }
    }

    async fn broadcast_position(&self) -> LinkResult<()> {
        let Some(fix) = self.latest_fix() else {
            debug!("No position yet, skipping PLI");
            return Ok(());
        };

        let message = LinkMessage::position_report(
            self.config.callsign.clone(),
            fix.position,
            fix.accuracy,
            fix.timestamp,
        );
        self.send(message).await?;
        debug!("PLI sent: {}", fix.position);
        Ok(())
    }

    async fn transmit_beacon(
        &self,
        active: bool,
        position: Option<GeoPoint>,
        message: Option<String>,
    ) -> LinkResult<()> {
        if *self.state.read() != LinkState::Connected {
            return Err(LinkError::NotConnected);
        }

        let text = message.unwrap_or_else(|| {
            if active {
                "Emergency - requesting immediate assistance".to_string()
            } else {
                "Emergency cleared".to_string()
            }
        });
        let beacon =
            LinkMessage::emergency_beacon(self.config.callsign.clone(), active, position, text);
        self.send(beacon).await?;

        if active {
            warn!("Emergency beacon transmitted");
        } else {
            info!("Emergency beacon cleared");
        }
        Ok(())
    }

    fn refresh_peers(&self) {
        let Some(fix) = self.latest_fix() else {
            return;
        };
        for peer in simulate_peers(fix.position) {
            self.peers.upsert(peer);
        }
    }
}

async fn pli_loop(inner: Arc<LinkInner>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(inner.config.pli_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                // Failures are counted in send(); keep broadcasting
                let _ = inner.broadcast_position().await;
            }
        }
    }
    debug!("PLI task stopped");
}

async fn peer_loop(inner: Arc<LinkInner>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(inner.config.peer_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => inner.refresh_peers(),
        }
    }
    debug!("Peer simulation task stopped");
}

#[async_trait]
impl EmergencyBeacon for TacticalLink {
    async fn signal_emergency(&self, active: bool, position: Option<GeoPoint>) {
        match self.inner.transmit_beacon(active, position, None).await {
            Ok(()) => {}
            Err(LinkError::NotConnected) => {
                debug!("Link not connected; emergency beacon not sent");
            }
            Err(e) => warn!("Emergency beacon failed: {}", e),
        }
    }
}

#[async_trait]
impl ManagedService for TacticalLink {
    fn name(&self) -> &'static str {
        "link"
    }

    async fn start(&self) -> CoreResult<()> {
        self.inner.readiness.set(true);
        info!("Tactical link service ready ({})", self.state());
        Ok(())
    }

    async fn stop(&self) {
        self.disconnect().await;
        self.inner.readiness.set(false);
    }

    fn health(&self) -> ServiceHealth {
        ServiceHealth {
            name: self.name().to_string(),
            state: self.state().to_string(),
            ready: self.inner.readiness.is_ready(),
            detail: Some(format!("{} peers", self.inner.peers.len())),
        }
    }

    fn readiness(&self) -> watch::Receiver<bool> {
        self.inner.readiness.subscribe()
    }
}

// ============================================================================
// TESTS
// ============================================================================
