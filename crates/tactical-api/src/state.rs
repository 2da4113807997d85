//! Application state management

use crate::config::ApiConfig;

use std::sync::Arc;
use tactical_core::{EventBus, GeoPoint};
use tactical_geo::{GeospatialService, GeospatialStore};
use tactical_link::{LoggingTransport, PlaceholderConverter, TacticalLink};
use tactical_location::{ChannelSource, LocationTracker, PositionSource, SimulatedSource};
use tactical_orchestrator::{CommandRouter, ServiceHandles, ServiceOrchestrator};
use tactical_telemetry::MetricsCollector;
use tracing::info;

/// Event bus capacity shared by every component
const EVENT_BUS_CAPACITY: usize = 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub config: ApiConfig,
    /// Shared event bus
    pub events: EventBus,
    /// Prometheus metrics
    pub metrics: Arc<MetricsCollector>,
    pub store: Arc<GeospatialStore>,
    pub geo: Arc<GeospatialService>,
    pub tracker: LocationTracker,
    pub link: TacticalLink,
    pub orchestrator: ServiceOrchestrator,
    pub commands: CommandRouter,
}

impl AppState {
    /// Wire every tactical component; services are started by the orchestrator
    pub fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let events = EventBus::new(EVENT_BUS_CAPACITY);
        let metrics = Arc::new(
            MetricsCollector::new().map_err(|e| anyhow::anyhow!("metrics registry: {}", e))?,
        );

        let store = Arc::new(GeospatialStore::new().with_event_bus(events.clone()));
        let geo = Arc::new(GeospatialService::new(config.geo_config(), store.clone()));

        let source: Arc<dyn PositionSource> = if config.simulation_mode {
            let center = GeoPoint::try_new(config.sim_start_lat, config.sim_start_lon)?;
            info!("Simulated position source centered at {}", center);
            Arc::new(SimulatedSource::new(center))
        } else {
            info!("Host-fed position source; submit fixes to /api/v1/location/fix");
            Arc::new(ChannelSource::default())
        };
        let tracker =
            LocationTracker::new(config.location_config(), source).with_event_bus(events.clone());

        let link = TacticalLink::with_parts(
            config.link_config(),
            Arc::new(LoggingTransport),
            Arc::new(PlaceholderConverter),
            Some(events.clone()),
        );

        let orchestrator = ServiceOrchestrator::new(
            config.orchestrator_config(),
            ServiceHandles {
                geo: geo.clone(),
                tracker: tracker.clone(),
                link: link.clone(),
            },
            events.clone(),
        );
        let commands = CommandRouter::new(orchestrator.clone());

        Ok(Self {
            config,
            events,
            metrics,
            store,
            geo,
            tracker,
            link,
            orchestrator,
            commands,
        })
    }
}
