//! # Tactical Location
//!
//! Location tracking state machine. The tracker subscribes to a
//! [`PositionSource`], filters fixes by accuracy, keeps a 24 hour history
//! and publishes the latest fix through a `watch` channel.
//!
//! ## States
//! `Stopped -> Starting -> Active`, with side states `PermissionDenied`,
//! `SourceDisabled` and `Error` that hold until [`LocationTracker::retry`].

pub mod history;
pub mod source;

pub use history::LocationHistory;
pub use source::{ChannelSource, PositionSource, SimulatedSource, SourceAvailability, SourceRequest};

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tactical_core::{
    CoreError, CoreResult, EmergencyBeacon, Event, EventBus, EventType, LocationRecord,
    ManagedService, Readiness, ServiceHealth,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Fixes less accurate than this are rejected outside battery saver (meters)
pub const MAX_ACCURACY_M: f32 = 10.0;

// ============================================================================
// MODES & STATES
// ============================================================================

/// Tracking cadence profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    Normal,
    HighAccuracy,
    Emergency,
    BatterySaver,
}

impl TrackingMode {
    pub fn interval(&self) -> Duration {
        match self {
            TrackingMode::Normal => Duration::from_secs(10),
            TrackingMode::HighAccuracy => Duration::from_secs(5),
            TrackingMode::Emergency => Duration::from_secs(5),
            TrackingMode::BatterySaver => Duration::from_secs(60),
        }
    }

    /// Minimum movement between fixes (meters)
    pub fn min_distance_m(&self) -> f64 {
        match self {
            TrackingMode::Normal => 5.0,
            TrackingMode::HighAccuracy => 1.0,
            TrackingMode::Emergency => 0.0,
            TrackingMode::BatterySaver => 50.0,
        }
    }

    pub fn enforces_accuracy(&self) -> bool {
        !matches!(self, TrackingMode::BatterySaver)
    }

    pub fn request(&self) -> SourceRequest {
        SourceRequest {
            interval: self.interval(),
            min_distance_m: self.min_distance_m(),
        }
    }
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingMode::Normal => write!(f, "normal"),
            TrackingMode::HighAccuracy => write!(f, "high_accuracy"),
            TrackingMode::Emergency => write!(f, "emergency"),
            TrackingMode::BatterySaver => write!(f, "battery_saver"),
        }
    }
}

/// Tracker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackerState {
    Stopped,
    Starting,
    Active,
    PermissionDenied,
    SourceDisabled,
    Error,
}

impl TrackerState {
    pub fn is_tracking(&self) -> bool {
        matches!(self, TrackerState::Starting | TrackerState::Active)
    }

    /// States that only [`LocationTracker::retry`] leaves
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            TrackerState::PermissionDenied | TrackerState::SourceDisabled | TrackerState::Error
        )
    }
}

impl fmt::Display for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerState::Stopped => write!(f, "STOPPED"),
            TrackerState::Starting => write!(f, "STARTING"),
            TrackerState::Active => write!(f, "ACTIVE"),
            TrackerState::PermissionDenied => write!(f, "PERMISSION_DENIED"),
            TrackerState::SourceDisabled => write!(f, "SOURCE_DISABLED"),
            TrackerState::Error => write!(f, "ERROR"),
        }
    }
}

/// Why a fix was not accepted
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    NotTracking,
    InvalidCoordinate,
    Accuracy { accuracy: f32, limit: f32 },
    MinimumMovement { moved: f64, minimum: f64 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NotTracking => write!(f, "tracker not running"),
            RejectReason::InvalidCoordinate => write!(f, "coordinate out of range"),
            RejectReason::Accuracy { accuracy, limit } => {
                write!(f, "accuracy {:.1}m exceeds {:.1}m", accuracy, limit)
            }
            RejectReason::MinimumMovement { moved, minimum } => {
                write!(f, "moved {:.1}m, below {:.1}m minimum", moved, minimum)
            }
        }
    }
}

/// Result of feeding one fix through the tracker
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Accepted,
    Rejected(RejectReason),
}

/// Tracker counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerStats {
    pub accepted: u64,
    pub rejected: u64,
    pub last_rejection: Option<String>,
}

/// Location tracker configuration
#[derive(Debug, Clone)]
pub struct LocationConfig {
    /// Mode used when started by the orchestrator
    pub default_mode: TrackingMode,
    pub max_accuracy_m: f32,
    pub history_retention: chrono::Duration,
    pub history_capacity: usize,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            default_mode: TrackingMode::Normal,
            max_accuracy_m: MAX_ACCURACY_M,
            history_retention: chrono::Duration::hours(24),
            history_capacity: 10_000,
        }
    }
}

// ============================================================================
// TRACKER
// ============================================================================

struct Session {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct TrackerInner {
    config: LocationConfig,
    source: Arc<dyn PositionSource>,
    state: RwLock<TrackerState>,
    mode: RwLock<TrackingMode>,
    emergency: RwLock<bool>,
    history: RwLock<LocationHistory>,
    stats: RwLock<TrackerStats>,
    position_tx: watch::Sender<Option<LocationRecord>>,
    readiness: Readiness,
    beacon: RwLock<Option<Arc<dyn EmergencyBeacon>>>,
    events: Option<EventBus>,
    session: Mutex<Option<Session>>,
}

/// Location tracker driving a single position source
#[derive(Clone)]
pub struct LocationTracker {
    inner: Arc<TrackerInner>,
}

impl LocationTracker {
    pub fn new(config: LocationConfig, source: Arc<dyn PositionSource>) -> Self {
        let (position_tx, _) = watch::channel(None);
        let history = LocationHistory::new(config.history_retention, config.history_capacity);
        let mode = config.default_mode;

        Self {
            inner: Arc::new(TrackerInner {
                config,
                source,
                state: RwLock::new(TrackerState::Stopped),
                mode: RwLock::new(mode),
                emergency: RwLock::new(false),
                history: RwLock::new(history),
                stats: RwLock::new(TrackerStats::default()),
                position_tx,
                readiness: Readiness::new(),
                beacon: RwLock::new(None),
                events: None,
                session: Mutex::new(None),
            }),
        }
    }

    /// Publish position and state events on the given bus
    ///
    /// Must be called before the tracker is cloned or started.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.events = Some(events);
        } else {
            warn!("Event bus attached to a shared tracker; ignoring");
        }
        self
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Start (or restart) tracking in `mode`
    ///
    /// Stays `Starting` until the first fix is accepted.
    pub async fn start_tracking(&self, mode: TrackingMode) -> CoreResult<()> {
        self.shutdown_session().await;

        match self.inner.source.availability() {
            SourceAvailability::Available => {}
            SourceAvailability::PermissionDenied => {
                self.inner.set_state(TrackerState::PermissionDenied);
                return Err(CoreError::PermissionDenied);
            }
            SourceAvailability::Disabled => {
                self.inner.set_state(TrackerState::SourceDisabled);
                return Err(CoreError::SourceDisabled);
            }
        }

        *self.inner.mode.write() = mode;
        self.inner.set_state(TrackerState::Starting);

        let mut stream = self.inner.source.observe(mode.request());
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let inner = self.inner.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    next = stream.next() => match next {
                        Some(record) => {
                            inner.process_update(record);
                        }
                        None => {
                            error!("Position source ended unexpectedly");
                            inner.set_state(TrackerState::Error);
                            break;
                        }
                    },
                }
            }
        });

        *self.inner.session.lock() = Some(Session { cancel, handle });

        info!(
            "Location tracking started: source={} mode={} interval={:?}",
            self.inner.source.name(),
            mode,
            mode.interval()
        );
        Ok(())
    }

    /// Stop tracking and wait for the session task to finish
    pub async fn stop_tracking(&self) {
        self.shutdown_session().await;
        self.inner.set_state(TrackerState::Stopped);
        info!("Location tracking stopped");
    }

    async fn shutdown_session(&self) {
        let session = self.inner.session.lock().take();
        if let Some(session) = session {
            session.cancel.cancel();
            if let Err(e) = session.handle.await {
                warn!("Tracking task ended abnormally: {}", e);
            }
        }
    }

    /// Leave a fault state by starting again in the current mode
    pub async fn retry(&self) -> CoreResult<()> {
        let state = self.state();
        if !state.is_fault() {
            return Err(CoreError::invalid_transition(state, TrackerState::Starting));
        }
        info!("Retrying location tracking from {}", state);
        self.start_tracking(self.mode()).await
    }

    /// Switch cadence; restarts the session when tracking
    pub async fn set_mode(&self, mode: TrackingMode) -> CoreResult<()> {
        if self.state().is_tracking() {
            self.start_tracking(mode).await
        } else {
            *self.inner.mode.write() = mode;
            Ok(())
        }
    }

    /// Enter or leave emergency mode and signal the beacon
    ///
    /// Entering restarts in `Emergency`, leaving restarts in `Normal`. The
    /// flag flips and the beacon is signalled even when the restart fails;
    /// that fault shows up in [`LocationTracker::state`] instead.
    pub async fn set_emergency_mode(&self, active: bool) -> CoreResult<()> {
        if *self.inner.emergency.read() == active {
            debug!("Emergency mode already {}", if active { "on" } else { "off" });
            return Ok(());
        }

        let mode = if active {
            TrackingMode::Emergency
        } else {
            TrackingMode::Normal
        };
        self.stop_tracking().await;
        if let Err(e) = self.start_tracking(mode).await {
            warn!("Tracking restart in {} mode failed: {}", mode, e);
        }

        *self.inner.emergency.write() = active;
        let position = self.current_position().map(|r| r.position);

        let beacon = self.inner.beacon.read().clone();
        if let Some(beacon) = beacon {
            beacon.signal_emergency(active, position).await;
        }
        self.inner.publish(Event::emergency_changed(active, position));

        if active {
            warn!("EMERGENCY MODE ACTIVATED");
        } else {
            info!("Emergency mode cleared");
        }
        Ok(())
    }

    // ========================================================================
    // UPDATES
    // ========================================================================

    /// Feed one fix through the accuracy and minimum-movement gates
    pub fn process_update(&self, record: LocationRecord) -> UpdateOutcome {
        self.inner.process_update(record)
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn set_beacon(&self, beacon: Arc<dyn EmergencyBeacon>) {
        *self.inner.beacon.write() = Some(beacon);
    }

    pub fn clear_beacon(&self) {
        *self.inner.beacon.write() = None;
    }

    pub fn state(&self) -> TrackerState {
        *self.inner.state.read()
    }

    pub fn mode(&self) -> TrackingMode {
        *self.inner.mode.read()
    }

    pub fn is_emergency(&self) -> bool {
        *self.inner.emergency.read()
    }

    pub fn current_position(&self) -> Option<LocationRecord> {
        self.inner.position_tx.borrow().clone()
    }

    /// Latest accepted fix with change notification
    pub fn subscribe(&self) -> watch::Receiver<Option<LocationRecord>> {
        self.inner.position_tx.subscribe()
    }

    pub fn history(&self) -> Vec<LocationRecord> {
        self.inner.history.read().to_vec()
    }

    pub fn stats(&self) -> TrackerStats {
        self.inner.stats.read().clone()
    }

    pub fn source_name(&self) -> &'static str {
        self.inner.source.name()
    }
}

impl TrackerInner {
    fn set_state(&self, state: TrackerState) {
        let previous = {
            let mut current = self.state.write();
            std::mem::replace(&mut *current, state)
        };
        if previous == state {
            return;
        }

        self.readiness.set(state == TrackerState::Active);
        debug!("Tracker state {} -> {}", previous, state);
        self.publish(Event::component_state(
            EventType::TrackerStateChanged,
            "location",
            state.to_string(),
            None,
        ));
    }

    fn publish(&self, event: Event) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }

    fn reject(&self, record: LocationRecord, reason: RejectReason) -> UpdateOutcome {
        debug!("Fix rejected: {}", reason);
        {
            let mut stats = self.stats.write();
            stats.rejected += 1;
            stats.last_rejection = Some(reason.to_string());
        }
        self.publish(Event::position_rejected(record, reason.to_string()));
        UpdateOutcome::Rejected(reason)
    }

    fn process_update(&self, record: LocationRecord) -> UpdateOutcome {
        let state = *self.state.read();
        if !state.is_tracking() {
            return self.reject(record, RejectReason::NotTracking);
        }
        if !record.position.is_valid() {
            return self.reject(record, RejectReason::InvalidCoordinate);
        }

        let mode = *self.mode.read();
        let limit = self.config.max_accuracy_m;
        if mode.enforces_accuracy() && record.accuracy > limit {
            let accuracy = record.accuracy;
            return self.reject(record, RejectReason::Accuracy { accuracy, limit });
        }

        // The first fix of a session always lands so the tracker can go active
        let minimum = mode.min_distance_m();
        if state == TrackerState::Active && minimum > 0.0 {
            let moved = self
                .position_tx
                .borrow()
                .as_ref()
                .map(|last| last.position.distance_to(&record.position));
            if let Some(moved) = moved.filter(|moved| *moved < minimum) {
                return self.reject(record, RejectReason::MinimumMovement { moved, minimum });
            }
        }

        debug!(
            "Fix accepted: {} ±{:.1}m ({})",
            record.position, record.accuracy, record.source
        );

        self.history.write().push(record.clone());
        self.stats.write().accepted += 1;
        self.position_tx.send_replace(Some(record.clone()));

        if state == TrackerState::Starting {
            self.set_state(TrackerState::Active);
        }
        self.publish(Event::position_accepted(record));

        UpdateOutcome::Accepted
    }
}

#[async_trait]
impl ManagedService for LocationTracker {
    fn name(&self) -> &'static str {
        "location"
    }

    async fn start(&self) -> CoreResult<()> {
        self.start_tracking(self.inner.config.default_mode).await
    }

    async fn stop(&self) {
        self.stop_tracking().await;
    }

    fn health(&self) -> ServiceHealth {
        let stats = self.stats();
        ServiceHealth {
            name: self.name().to_string(),
            state: self.state().to_string(),
            ready: self.inner.readiness.is_ready(),
            detail: Some(format!(
                "mode={} accepted={} rejected={}",
                self.mode(),
                stats.accepted,
                stats.rejected
            )),
        }
    }

    fn readiness(&self) -> watch::Receiver<bool> {
        self.inner.readiness.subscribe()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tactical_core::GeoPoint;

    struct RecordingBeacon {
        signals: Mutex<Vec<bool>>,
    }

    #[async_trait]
    impl EmergencyBeacon for RecordingBeacon {
        async fn signal_emergency(&self, active: bool, _position: Option<GeoPoint>) {
            self.signals.lock().push(active);
        }
    }

    fn fix(accuracy: f32) -> LocationRecord {
        LocationRecord::new(GeoPoint::new(34.0522, -118.2437), accuracy, "gps")
    }

    fn tracker_with_channel() -> (LocationTracker, Arc<ChannelSource>) {
        let source = Arc::new(ChannelSource::default());
        let tracker = LocationTracker::new(LocationConfig::default(), source.clone());
        (tracker, source)
    }

    async fn next_fix(rx: &mut watch::Receiver<Option<LocationRecord>>) -> LocationRecord {
        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .unwrap()
            .unwrap();
        rx.borrow_and_update().clone().unwrap()
    }

    #[test]
    fn test_mode_parameters() {
        assert_eq!(TrackingMode::Normal.interval(), Duration::from_secs(10));
        assert_eq!(TrackingMode::Normal.min_distance_m(), 5.0);
        assert_eq!(TrackingMode::HighAccuracy.interval(), Duration::from_secs(5));
        assert_eq!(TrackingMode::HighAccuracy.min_distance_m(), 1.0);
        assert_eq!(TrackingMode::Emergency.interval(), Duration::from_secs(5));
        assert_eq!(TrackingMode::Emergency.min_distance_m(), 0.0);
        assert_eq!(TrackingMode::BatterySaver.interval(), Duration::from_secs(60));
        assert_eq!(TrackingMode::BatterySaver.min_distance_m(), 50.0);
    }

    #[tokio::test]
    async fn test_normal_mode_accuracy_gate() {
        let (tracker, _source) = tracker_with_channel();
        tracker.start_tracking(TrackingMode::Normal).await.unwrap();
        assert_eq!(tracker.state(), TrackerState::Starting);

        let outcome = tracker.process_update(fix(15.0));
        assert!(matches!(
            outcome,
            UpdateOutcome::Rejected(RejectReason::Accuracy { .. })
        ));
        assert!(tracker.current_position().is_none());
        assert!(tracker.history().is_empty());
        assert_eq!(tracker.state(), TrackerState::Starting);

        assert_eq!(tracker.process_update(fix(8.0)), UpdateOutcome::Accepted);
        assert_eq!(tracker.current_position().unwrap().accuracy, 8.0);
        assert_eq!(tracker.history().len(), 1);
        assert_eq!(tracker.state(), TrackerState::Active);

        let stats = tracker.stats();
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.rejected, 1);

        tracker.stop_tracking().await;
    }

    #[tokio::test]
    async fn test_battery_saver_skips_accuracy_gate() {
        let (tracker, _source) = tracker_with_channel();
        tracker.start_tracking(TrackingMode::BatterySaver).await.unwrap();

        assert_eq!(tracker.process_update(fix(40.0)), UpdateOutcome::Accepted);
        tracker.stop_tracking().await;
    }

    fn fix_at(position: GeoPoint) -> LocationRecord {
        LocationRecord::new(position, 5.0, "gps")
    }

    #[tokio::test]
    async fn test_minimum_movement_per_mode() {
        let origin = GeoPoint::new(34.0522, -118.2437);
        let modes = [
            TrackingMode::Normal,
            TrackingMode::HighAccuracy,
            TrackingMode::BatterySaver,
        ];

        for mode in modes {
            let (tracker, _source) = tracker_with_channel();
            tracker.start_tracking(mode).await.unwrap();
            let minimum = mode.min_distance_m();

            assert_eq!(tracker.process_update(fix_at(origin)), UpdateOutcome::Accepted);

            let short = origin.destination(minimum * 0.5, 90.0);
            assert!(matches!(
                tracker.process_update(fix_at(short)),
                UpdateOutcome::Rejected(RejectReason::MinimumMovement { .. })
            ));
            assert_eq!(tracker.current_position().unwrap().position, origin);

            let far = origin.destination(minimum + 1.0, 90.0);
            assert_eq!(tracker.process_update(fix_at(far)), UpdateOutcome::Accepted);
            assert_eq!(tracker.history().len(), 2, "mode {}", mode);

            tracker.stop_tracking().await;
        }
    }

    #[tokio::test]
    async fn test_emergency_mode_accepts_stationary_fixes() {
        let (tracker, _source) = tracker_with_channel();
        tracker.start_tracking(TrackingMode::Emergency).await.unwrap();
        let origin = GeoPoint::new(34.0522, -118.2437);

        for _ in 0..3 {
            assert_eq!(tracker.process_update(fix_at(origin)), UpdateOutcome::Accepted);
        }
        assert_eq!(tracker.history().len(), 3);
        tracker.stop_tracking().await;
    }

    #[tokio::test]
    async fn test_first_fix_after_restart_ignores_minimum_movement() {
        let (tracker, _source) = tracker_with_channel();
        let origin = GeoPoint::new(34.0522, -118.2437);
        tracker.start_tracking(TrackingMode::Normal).await.unwrap();
        assert_eq!(tracker.process_update(fix_at(origin)), UpdateOutcome::Accepted);

        tracker.set_mode(TrackingMode::BatterySaver).await.unwrap();
        assert_eq!(tracker.state(), TrackerState::Starting);
        assert_eq!(tracker.process_update(fix_at(origin)), UpdateOutcome::Accepted);
        assert_eq!(tracker.state(), TrackerState::Active);

        tracker.stop_tracking().await;
    }

    #[tokio::test]
    async fn test_channel_fixes_respect_minimum_movement() {
        let (tracker, source) = tracker_with_channel();
        let mut rx = tracker.subscribe();
        tracker.start_tracking(TrackingMode::BatterySaver).await.unwrap();
        let origin = GeoPoint::new(34.0522, -118.2437);

        source.push(fix_at(origin));
        next_fix(&mut rx).await;
        source.push(fix_at(origin.destination(1.0, 0.0)));

        tokio::time::timeout(Duration::from_secs(5), async {
            while tracker.stats().rejected == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(tracker.stats().accepted, 1);
        assert_eq!(tracker.history().len(), 1);
        tracker.stop_tracking().await;
    }

    #[tokio::test]
    async fn test_fixes_flow_from_source() {
        let (tracker, source) = tracker_with_channel();
        let mut rx = tracker.subscribe();
        tracker.start_tracking(TrackingMode::Normal).await.unwrap();

        source.push(fix(15.0));
        source.push(fix(8.0));

        let latest = next_fix(&mut rx).await;
        assert_eq!(latest.accuracy, 8.0);
        assert_eq!(tracker.stats().rejected, 1);

        tracker.stop_tracking().await;
        assert_eq!(tracker.state(), TrackerState::Stopped);
    }

    #[tokio::test]
    async fn test_updates_ignored_when_stopped() {
        let (tracker, _source) = tracker_with_channel();
        assert_eq!(
            tracker.process_update(fix(3.0)),
            UpdateOutcome::Rejected(RejectReason::NotTracking)
        );
    }

    #[tokio::test]
    async fn test_permission_denied_and_retry() {
        let (tracker, source) = tracker_with_channel();
        source.set_availability(SourceAvailability::PermissionDenied);

        let err = tracker.start_tracking(TrackingMode::Normal).await.unwrap_err();
        assert!(matches!(err, CoreError::PermissionDenied));
        assert_eq!(tracker.state(), TrackerState::PermissionDenied);

        source.set_availability(SourceAvailability::Available);
        tracker.retry().await.unwrap();
        assert_eq!(tracker.state(), TrackerState::Starting);

        tracker.stop_tracking().await;
        assert!(tracker.retry().await.is_err());
    }

    #[tokio::test]
    async fn test_source_disabled() {
        let (tracker, source) = tracker_with_channel();
        source.set_availability(SourceAvailability::Disabled);

        let err = tracker.start_tracking(TrackingMode::Normal).await.unwrap_err();
        assert!(matches!(err, CoreError::SourceDisabled));
        assert_eq!(tracker.state(), TrackerState::SourceDisabled);
    }

    #[tokio::test]
    async fn test_emergency_round_trip() {
        let (tracker, _source) = tracker_with_channel();
        let beacon = Arc::new(RecordingBeacon {
            signals: Mutex::new(Vec::new()),
        });
        tracker.set_beacon(beacon.clone());
        tracker.start_tracking(TrackingMode::Normal).await.unwrap();

        tracker.set_emergency_mode(true).await.unwrap();
        assert!(tracker.is_emergency());
        assert_eq!(tracker.mode(), TrackingMode::Emergency);

        tracker.set_emergency_mode(true).await.unwrap();
        assert_eq!(beacon.signals.lock().len(), 1);

        tracker.set_emergency_mode(false).await.unwrap();
        assert!(!tracker.is_emergency());
        assert_eq!(tracker.mode(), TrackingMode::Normal);
        assert_eq!(*beacon.signals.lock(), vec![true, false]);

        tracker.stop_tracking().await;
    }

    #[tokio::test]
    async fn test_emergency_beacon_sent_when_restart_fails() {
        let (tracker, source) = tracker_with_channel();
        let beacon = Arc::new(RecordingBeacon {
            signals: Mutex::new(Vec::new()),
        });
        tracker.set_beacon(beacon.clone());
        tracker.start_tracking(TrackingMode::Normal).await.unwrap();

        source.set_availability(SourceAvailability::PermissionDenied);
        tracker.set_emergency_mode(true).await.unwrap();

        assert!(tracker.is_emergency());
        assert_eq!(*beacon.signals.lock(), vec![true]);
        assert_eq!(tracker.state(), TrackerState::PermissionDenied);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_source_activates_tracker() {
        let source = Arc::new(SimulatedSource::new(GeoPoint::new(34.0522, -118.2437)));
        let tracker = LocationTracker::new(LocationConfig::default(), source);
        let mut ready = tracker.readiness();

        tracker.start().await.unwrap();
        tokio::time::timeout(Duration::from_secs(30), ready.wait_for(|r| *r))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(tracker.state(), TrackerState::Active);
        assert!(tracker.health().ready);
        tracker.stop().await;
        assert!(!*tracker.readiness().borrow());
    }

    #[tokio::test]
    async fn test_events_published() {
        let bus = EventBus::new(64);
        let source = Arc::new(ChannelSource::default());
        let tracker =
            LocationTracker::new(LocationConfig::default(), source).with_event_bus(bus.clone());

        tracker.start_tracking(TrackingMode::Normal).await.unwrap();
        tracker.process_update(fix(20.0));
        tracker.process_update(fix(2.0));
        tracker.stop_tracking().await;

        let types: Vec<EventType> = bus.recent(10).iter().map(|e| e.event_type).collect();
        assert!(types.contains(&EventType::PositionRejected));
        assert!(types.contains(&EventType::PositionAccepted));
        assert!(types.contains(&EventType::TrackerStateChanged));
    }
}
