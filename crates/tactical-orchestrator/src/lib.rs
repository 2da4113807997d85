//! # Tactical Orchestrator
//!
//! Central coordination for the tactical engine. Starts the geospatial,
//! link and location services, waits for joint readiness, wires the tracker
//! to the link and keeps a fused [`TacticalSituation`] current.
//!
//! ## States
//! `Initializing -> Starting -> Operational`, or `Error` on a startup fault
//! or readiness timeout. `shutdown()` moves any state to `Stopped`.

pub mod command;
pub mod situation;

pub use command::{Command, CommandResponse, CommandRouter};
pub use situation::{FusionInputs, SITUATION_RADIUS_M, fuse};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tactical_core::{
    CoreError, CoreResult, Event, EventBus, EventType, ManagedService, ServiceHealth,
    TacticalSituation, wait_until_ready,
};
use tactical_geo::GeospatialService;
use tactical_link::TacticalLink;
use tactical_location::LocationTracker;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Joint readiness deadline
    pub startup_timeout: Duration,
    /// Periodic fusion interval
    pub fusion_interval: Duration,
    /// AO radius applied when centering on the first fix (meters)
    pub ao_radius_m: f64,
    /// Feature radius included in each situation (meters)
    pub situation_radius_m: f64,
    /// Connect the link as soon as services are operational
    pub auto_connect: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(30),
            fusion_interval: Duration::from_secs(30),
            ao_radius_m: 10_000.0,
            situation_radius_m: SITUATION_RADIUS_M,
            auto_connect: false,
        }
    }
}

/// Orchestrator lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrchestratorState {
    Initializing,
    Starting,
    Operational,
    Error,
    Stopped,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorState::Initializing => write!(f, "INITIALIZING"),
            OrchestratorState::Starting => write!(f, "STARTING"),
            OrchestratorState::Operational => write!(f, "OPERATIONAL"),
            OrchestratorState::Error => write!(f, "ERROR"),
            OrchestratorState::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// The three supervised services
#[derive(Clone)]
pub struct ServiceHandles {
    pub geo: Arc<GeospatialService>,
    pub tracker: LocationTracker,
    pub link: TacticalLink,
}

impl ServiceHandles {
    /// Start order: geospatial, link, location
    fn managed(&self) -> [&dyn ManagedService; 3] {
        [self.geo.as_ref(), &self.link, &self.tracker]
    }
}

/// Orchestrator status report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub state: OrchestratorState,
    pub last_error: Option<String>,
    pub operational_since: Option<DateTime<Utc>>,
    pub services: Vec<ServiceHealth>,
    pub situation_available: bool,
}

struct Tasks {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

struct OrchestratorInner {
    config: OrchestratorConfig,
    state: RwLock<OrchestratorState>,
    last_error: RwLock<Option<String>>,
    operational_since: RwLock<Option<DateTime<Utc>>>,
    services: RwLock<Option<ServiceHandles>>,
    situation_tx: watch::Sender<Option<TacticalSituation>>,
    ao_centered: AtomicBool,
    events: EventBus,
    tasks: Mutex<Option<Tasks>>,
}

/// Supervises the tactical services and fuses their output
#[derive(Clone)]
pub struct ServiceOrchestrator {
    inner: Arc<OrchestratorInner>,
}

impl ServiceOrchestrator {
    pub fn new(config: OrchestratorConfig, services: ServiceHandles, events: EventBus) -> Self {
        let (situation_tx, _) = watch::channel(None);

        Self {
            inner: Arc::new(OrchestratorInner {
                config,
                state: RwLock::new(OrchestratorState::Initializing),
                last_error: RwLock::new(None),
                operational_since: RwLock::new(None),
                services: RwLock::new(Some(services)),
                situation_tx,
                ao_centered: AtomicBool::new(false),
                events,
                tasks: Mutex::new(None),
            }),
        }
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Start every service and wait for joint readiness
    ///
    /// Any startup fault or the readiness timeout leaves the orchestrator in
    /// `Error`; there is no automatic retry.
    pub async fn start(&self) -> CoreResult<()> {
        {
            let mut state = self.inner.state.write();
            if *state != OrchestratorState::Initializing {
                return Err(CoreError::invalid_transition(*state, OrchestratorState::Starting));
            }
            *state = OrchestratorState::Starting;
        }
        self.inner.publish_state(OrchestratorState::Starting, None);
        info!("Starting tactical services...");

        let Some(services) = self.services() else {
            return Err(self.inner.fail(CoreError::internal("services released")));
        };

        let result = self.bring_up(services.clone()).await;
        if result.is_err() && self.state() == OrchestratorState::Stopped {
            // Shut down mid-start; stop whatever was started after shutdown ran
            debug!("Startup abandoned, stopping services");
            services.tracker.stop().await;
            services.link.stop().await;
            services.geo.stop().await;
        }
        result
    }

    async fn bring_up(&self, services: ServiceHandles) -> CoreResult<()> {
        for service in services.managed() {
            if self.state() != OrchestratorState::Starting {
                return Err(CoreError::invalid_transition(self.state(), OrchestratorState::Starting));
            }
            if let Err(e) = service.start().await {
                error!("Service {} failed to start: {}", service.name(), e);
                return Err(self.inner.fail(e));
            }
            debug!("Service {} started", service.name());
        }

        let readiness: Vec<_> = services.managed().iter().map(|s| s.readiness()).collect();
        let timeout = self.inner.config.startup_timeout;
        let joint = async move {
            for rx in readiness {
                if !wait_until_ready(rx).await {
                    return false;
                }
            }
            true
        };

        match tokio::time::timeout(timeout, joint).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(self.inner.fail(CoreError::internal("readiness channel closed")));
            }
            Err(_) => {
                error!("Services not ready within {:?}", timeout);
                return Err(self.inner.fail(CoreError::StartupTimeout(timeout.as_secs())));
            }
        }

        {
            let mut state = self.inner.state.write();
            if *state != OrchestratorState::Starting {
                // Shut down while waiting
                return Err(CoreError::invalid_transition(*state, OrchestratorState::Operational));
            }
            *state = OrchestratorState::Operational;
        }
        *self.inner.operational_since.write() = Some(Utc::now());

        if !self.activate(services) {
            return Err(CoreError::invalid_transition(
                OrchestratorState::Stopped,
                OrchestratorState::Operational,
            ));
        }

        info!("Tactical services operational");
        Ok(())
    }

    /// Wire services and spawn background tasks unless shut down meanwhile
    ///
    /// Runs under the tasks lock so `shutdown()` either sees the tasks or
    /// prevents them from being spawned.
    fn activate(&self, services: ServiceHandles) -> bool {
        let mut tasks = self.inner.tasks.lock();
        if *self.inner.state.read() != OrchestratorState::Operational {
            return false;
        }

        self.wire(&services);
        *tasks = Some(self.spawn_tasks(services));
        self.inner.publish_state(OrchestratorState::Operational, None);
        true
    }

    /// Tracker emergency -> link beacon; tracker fixes -> link PLI
    fn wire(&self, services: &ServiceHandles) {
        services.tracker.set_beacon(Arc::new(services.link.clone()));
        services.link.set_position_source(services.tracker.subscribe());
        debug!("Tracker wired to tactical link");
    }

    fn spawn_tasks(&self, services: ServiceHandles) -> Tasks {
        let cancel = CancellationToken::new();
        let mut handles = Vec::new();

        if self.inner.config.auto_connect {
            let link = services.link.clone();
            let token = cancel.clone();
            handles.push(tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    result = link.connect() => {
                        if let Err(e) = result {
                            warn!("Auto-connect failed: {}", e);
                        }
                    }
                }
            }));
        }

        handles.push(tokio::spawn(fusion_loop(
            self.inner.clone(),
            services,
            cancel.clone(),
        )));

        Tasks { cancel, handles }
    }

    /// Cancel tasks, stop services and release bindings
    ///
    /// Safe to call from any state and more than once.
    pub async fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.inner.state.write(), OrchestratorState::Stopped);
        if previous == OrchestratorState::Stopped {
            debug!("Orchestrator already stopped");
            return;
        }
        info!("Shutting down tactical services (from {})...", previous);

        let tasks = self.inner.tasks.lock().take();
        if let Some(tasks) = tasks {
            tasks.cancel.cancel();
            for handle in tasks.handles {
                if let Err(e) = handle.await {
                    warn!("Orchestrator task ended abnormally: {}", e);
                }
            }
        }

        let services = self.inner.services.write().take();
        if let Some(services) = services {
            services.tracker.clear_beacon();
            services.link.clear_position_source();
            services.link.stop().await;
            services.tracker.stop().await;
            services.geo.stop().await;
        }

        self.inner.publish_state(OrchestratorState::Stopped, None);
        info!("Tactical services stopped");
    }

    // ========================================================================
    // OPERATIONS
    // ========================================================================

    /// Toggle emergency mode and refresh the situation
    pub async fn set_emergency(&self, active: bool) -> CoreResult<()> {
        let services = self.operational_services()?;
        services.tracker.set_emergency_mode(active).await?;
        self.inner.refresh(&services);
        Ok(())
    }

    /// Fuse a situation now instead of waiting for the next tick
    pub fn refresh_situation(&self) -> CoreResult<Option<TacticalSituation>> {
        let services = self.operational_services()?;
        self.inner.refresh(&services);
        Ok(self.situation())
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn state(&self) -> OrchestratorState {
        *self.inner.state.read()
    }

    pub fn is_operational(&self) -> bool {
        self.state() == OrchestratorState::Operational
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.read().clone()
    }

    /// Service bindings; `None` once shut down
    pub fn services(&self) -> Option<ServiceHandles> {
        self.inner.services.read().clone()
    }

    /// Bindings, only while operational
    pub fn operational_services(&self) -> CoreResult<ServiceHandles> {
        let state = self.state();
        if state != OrchestratorState::Operational {
            return Err(CoreError::invalid_transition(state, OrchestratorState::Operational));
        }
        self.services()
            .ok_or_else(|| CoreError::internal("services released"))
    }

    pub fn situation(&self) -> Option<TacticalSituation> {
        self.inner.situation_tx.borrow().clone()
    }

    /// Latest situation with change notification
    pub fn subscribe_situation(&self) -> watch::Receiver<Option<TacticalSituation>> {
        self.inner.situation_tx.subscribe()
    }

    pub fn status(&self) -> OrchestratorStatus {
        let services = self
            .services()
            .map(|s| s.managed().iter().map(|m| m.health()).collect())
            .unwrap_or_default();

        OrchestratorStatus {
            state: self.state(),
            last_error: self.last_error(),
            operational_since: *self.inner.operational_since.read(),
            services,
            situation_available: self.inner.situation_tx.borrow().is_some(),
        }
    }
}

impl OrchestratorInner {
    fn publish_state(&self, state: OrchestratorState, message: Option<String>) {
        self.events.publish(Event::component_state(
            EventType::OrchestratorStateChanged,
            "orchestrator",
            state.to_string(),
            message,
        ));
    }

    /// Record a startup fault and move to `Error`
    fn fail(&self, err: CoreError) -> CoreError {
        let message = err.to_string();
        {
            let mut state = self.state.write();
            if *state == OrchestratorState::Stopped {
                return err;
            }
            *state = OrchestratorState::Error;
        }
        *self.last_error.write() = Some(message.clone());
        self.publish_state(OrchestratorState::Error, Some(message));
        err
    }

    /// Center the AO on the first fix, then fuse a fresh situation
    fn refresh(&self, services: &ServiceHandles) {
        let Some(fix) = services.tracker.current_position() else {
            debug!("No position fix yet, skipping fusion");
            return;
        };

        let store = services.geo.store();
        if !self.ao_centered.swap(true, Ordering::SeqCst) {
            if let Err(e) = store.set_area_of_operations(fix.position, self.config.ao_radius_m) {
                warn!("Failed to center area of operations: {}", e);
                self.ao_centered.store(false, Ordering::SeqCst);
            }
        }

        let inputs = FusionInputs {
            position: fix.position,
            link_connected: services.link.is_connected(),
            emergency_active: services.tracker.is_emergency(),
        };

        match fuse(&store, services.geo.assessor(), inputs, self.config.situation_radius_m) {
            Ok(situation) => {
                debug!(
                    "Situation fused: {} features, threat {}",
                    situation.nearby_features.len(),
                    situation.threat_assessment.level
                );
                self.events.publish(Event::situation_updated(
                    situation.current_position,
                    situation.threat_assessment.level,
                    store.feature_count(),
                ));
                self.situation_tx.send_replace(Some(situation));
            }
            Err(e) => warn!("Situation fusion failed: {}", e),
        }
    }
}

async fn fusion_loop(inner: Arc<OrchestratorInner>, services: ServiceHandles, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(inner.config.fusion_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut positions = services.tracker.subscribe();
    let mut watching = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => inner.refresh(&services),
            changed = positions.changed(), if watching => {
                if changed.is_err() {
                    warn!("Position channel closed; fusing on the timer only");
                    watching = false;
                } else {
                    inner.refresh(&services);
                }
            }
        }
    }
    debug!("Fusion task stopped");
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tactical_core::GeoPoint;
    use tactical_geo::{GeoConfig, GeospatialStore, SAMPLE_CENTER};
    use tactical_link::{LinkConfig, MemoryTransport};
    use tactical_location::{
        ChannelSource, LocationConfig, PositionSource, SimulatedSource, SourceAvailability,
        TrackerState,
    };

    struct Harness {
        orchestrator: ServiceOrchestrator,
        services: ServiceHandles,
        transport: Arc<MemoryTransport>,
    }

    fn harness(source: Arc<dyn PositionSource>, config: OrchestratorConfig) -> Harness {
        let events = EventBus::new(256);
        let store = Arc::new(GeospatialStore::new().with_event_bus(events.clone()));
        let geo = Arc::new(GeospatialService::new(
            GeoConfig {
                seed_sample_data: true,
                ..GeoConfig::default()
            },
            store,
        ));
        let tracker = LocationTracker::new(LocationConfig::default(), source);
        let transport = Arc::new(MemoryTransport::new());
        let link = TacticalLink::new(LinkConfig::default(), transport.clone());

        let services = ServiceHandles { geo, tracker, link };
        let orchestrator = ServiceOrchestrator::new(config, services.clone(), events);
        Harness {
            orchestrator,
            services,
            transport,
        }
    }

    fn stationary_source(center: GeoPoint) -> Arc<dyn PositionSource> {
        Arc::new(SimulatedSource::new(center).with_radius(0.0))
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_timeout_then_shutdown() {
        // A channel source never delivers a fix, so the tracker never becomes ready
        let h = harness(Arc::new(ChannelSource::default()), OrchestratorConfig::default());

        let err = h.orchestrator.start().await.unwrap_err();
        assert!(matches!(err, CoreError::StartupTimeout(30)));
        assert_eq!(h.orchestrator.state(), OrchestratorState::Error);
        assert!(h.orchestrator.last_error().is_some());

        h.orchestrator.shutdown().await;
        assert_eq!(h.orchestrator.state(), OrchestratorState::Stopped);
        h.orchestrator.shutdown().await;
        assert_eq!(h.orchestrator.state(), OrchestratorState::Stopped);
        assert!(h.orchestrator.services().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_fault_moves_to_error() {
        let source = Arc::new(ChannelSource::default());
        source.set_availability(SourceAvailability::PermissionDenied);
        let h = harness(source, OrchestratorConfig::default());

        let err = h.orchestrator.start().await.unwrap_err();
        assert!(matches!(err, CoreError::PermissionDenied));
        assert_eq!(h.orchestrator.state(), OrchestratorState::Error);

        h.orchestrator.shutdown().await;
        assert_eq!(h.orchestrator.state(), OrchestratorState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_readiness_wait() {
        let h = harness(Arc::new(ChannelSource::default()), OrchestratorConfig::default());

        let orchestrator = h.orchestrator.clone();
        let start = tokio::spawn(async move { orchestrator.start().await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.orchestrator.state(), OrchestratorState::Starting);

        h.orchestrator.shutdown().await;
        assert_eq!(h.orchestrator.state(), OrchestratorState::Stopped);

        let err = start.await.unwrap().unwrap_err();
        assert!(matches!(err, CoreError::StartupTimeout(30)));
        assert_eq!(h.orchestrator.state(), OrchestratorState::Stopped);
        assert!(h.orchestrator.last_error().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shutdown_racing_start_leaves_no_tasks() {
        let config = OrchestratorConfig {
            startup_timeout: Duration::from_secs(1),
            ..OrchestratorConfig::default()
        };

        for _ in 0..25 {
            let h = harness(stationary_source(SAMPLE_CENTER), config.clone());

            let orchestrator = h.orchestrator.clone();
            let start = tokio::spawn(async move { orchestrator.start().await });
            let orchestrator = h.orchestrator.clone();
            let shutdown = tokio::spawn(async move { orchestrator.shutdown().await });

            let _ = start.await.unwrap();
            shutdown.await.unwrap();

            assert_eq!(h.orchestrator.state(), OrchestratorState::Stopped);
            assert!(h.orchestrator.inner.tasks.lock().is_none());
            assert!(!h.services.link.is_connected());
            assert_eq!(h.services.tracker.state(), TrackerState::Stopped);
        }
    }

    #[tokio::test]
    async fn test_shutdown_before_start() {
        let h = harness(Arc::new(ChannelSource::default()), OrchestratorConfig::default());
        h.orchestrator.shutdown().await;

        assert_eq!(h.orchestrator.state(), OrchestratorState::Stopped);
        assert!(h.orchestrator.start().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_operational_fusion_and_ao_centering() {
        let h = harness(stationary_source(SAMPLE_CENTER), OrchestratorConfig::default());
        let mut situations = h.orchestrator.subscribe_situation();

        h.orchestrator.start().await.unwrap();
        assert!(h.orchestrator.is_operational());

        tokio::time::timeout(Duration::from_secs(5), situations.wait_for(|s| s.is_some()))
            .await
            .unwrap()
            .unwrap();

        let situation = h.orchestrator.situation().unwrap();
        assert!(situation.current_position.distance_to(&SAMPLE_CENTER) < 1.0);
        assert_eq!(situation.nearby_features.len(), 2);
        assert!(!situation.link_connected);

        let area = h.services.geo.store().area_of_operations().unwrap();
        assert!(area.center.distance_to(&SAMPLE_CENTER) < 1.0);
        assert_eq!(area.radius, 10_000.0);

        let status = h.orchestrator.status();
        assert_eq!(status.services.len(), 3);
        assert!(status.services.iter().all(|s| s.ready));

        h.orchestrator.shutdown().await;
        assert!(!h.services.link.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_connect_and_emergency_beacon() {
        let config = OrchestratorConfig {
            auto_connect: true,
            ..OrchestratorConfig::default()
        };
        let h = harness(stationary_source(SAMPLE_CENTER), config);

        h.orchestrator.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(h.services.link.is_connected());
        assert!(h.transport.sent_of_kind("pli") >= 1);

        h.orchestrator.set_emergency(true).await.unwrap();
        assert_eq!(h.transport.sent_of_kind("emergency"), 1);
        assert!(h.orchestrator.situation().unwrap().emergency_active);

        h.orchestrator.set_emergency(false).await.unwrap();
        assert_eq!(h.transport.sent_of_kind("emergency"), 2);

        h.orchestrator.shutdown().await;
        assert!(!h.services.link.is_connected());
    }

    #[tokio::test]
    async fn test_operations_require_operational() {
        let h = harness(Arc::new(ChannelSource::default()), OrchestratorConfig::default());
        assert!(h.orchestrator.set_emergency(true).await.is_err());
        assert!(h.orchestrator.refresh_situation().is_err());
    }
}
