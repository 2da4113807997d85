//! # Tactical Telemetry - Metrics & Observability
//!
//! Prometheus metrics for the tactical engine. Most metrics are fed from the
//! shared [`EventBus`]; API request metrics are recorded by the HTTP layer.
//! Provides metrics for:
//! - Position fixes accepted and rejected
//! - Situation fusion and threat level
//! - Tactical link traffic
//! - Orchestrator state and API requests

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use tactical_core::{Event, EventBus, EventPayload, EventType};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Metrics collector for the tactical engine
pub struct MetricsCollector {
    registry: Registry,

    // Event metrics
    events_total: IntCounterVec,

    // Location metrics
    position_updates: IntCounterVec,
    emergency_active: IntGauge,

    // Geospatial metrics
    situation_fusions: IntCounter,
    threat_level: IntGauge,
    feature_count: IntGauge,

    // Link metrics
    link_connected: IntGauge,
    link_messages: IntCounterVec,
    link_transmit_failures: IntCounter,

    // System metrics
    orchestrator_state: IntGaugeVec,
    api_requests_total: IntCounterVec,
    api_request_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let events_total = IntCounterVec::new(
            Opts::new("tactical_events_total", "Events published on the event bus"),
            &["event_type"],
        )?;
        registry.register(Box::new(events_total.clone()))?;

        // Location metrics
        let position_updates = IntCounterVec::new(
            Opts::new("tactical_position_updates_total", "Position fixes by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(position_updates.clone()))?;

        let emergency_active = IntGauge::new(
            "tactical_emergency_active",
            "Whether emergency mode is active",
        )?;
        registry.register(Box::new(emergency_active.clone()))?;

        // Geospatial metrics
        let situation_fusions = IntCounter::new(
            "tactical_situation_fusions_total",
            "Situation snapshots fused",
        )?;
        registry.register(Box::new(situation_fusions.clone()))?;

        let threat_level = IntGauge::new(
            "tactical_threat_level",
            "Current threat level (0 low, 1 medium, 2 high)",
        )?;
        registry.register(Box::new(threat_level.clone()))?;

        let feature_count = IntGauge::new(
            "tactical_features_total",
            "Tactical features in the geospatial store",
        )?;
        registry.register(Box::new(feature_count.clone()))?;

        // Link metrics
        let link_connected = IntGauge::new(
            "tactical_link_connected",
            "Tactical link connection status",
        )?;
        registry.register(Box::new(link_connected.clone()))?;

        let link_messages = IntCounterVec::new(
            Opts::new("tactical_link_messages_total", "Link messages sent by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(link_messages.clone()))?;

        let link_transmit_failures = IntCounter::new(
            "tactical_link_transmit_failures_total",
            "Link messages that failed to transmit",
        )?;
        registry.register(Box::new(link_transmit_failures.clone()))?;

        // System metrics
        let orchestrator_state = IntGaugeVec::new(
            Opts::new("tactical_orchestrator_state", "Current orchestrator state"),
            &["state"],
        )?;
        registry.register(Box::new(orchestrator_state.clone()))?;

        let api_requests_total = IntCounterVec::new(
            Opts::new("tactical_api_requests_total", "API requests"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(api_requests_total.clone()))?;

        let api_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "tactical_api_request_duration_seconds",
                "API request duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["method", "path"],
        )?;
        registry.register(Box::new(api_request_duration.clone()))?;

        info!("Metrics collector initialized");

        Ok(Self {
            registry,
            events_total,
            position_updates,
            emergency_active,
            situation_fusions,
            threat_level,
            feature_count,
            link_connected,
            link_messages,
            link_transmit_failures,
            orchestrator_state,
            api_requests_total,
            api_request_duration,
        })
    }

    /// Get Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> prometheus::Result<String> {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    // ========================================================================
    // EVENT METRICS
    // ========================================================================

    /// Update metrics from one bus event
    pub fn record_event(&self, event: &Event) {
        self.events_total
            .with_label_values(&[&format!("{:?}", event.event_type)])
            .inc();

        match (&event.event_type, &event.payload) {
            (EventType::PositionAccepted, _) => {
                self.position_updates.with_label_values(&["accepted"]).inc();
            }
            (EventType::PositionRejected, _) => {
                self.position_updates.with_label_values(&["rejected"]).inc();
            }
            (EventType::SituationUpdated, EventPayload::Situation(situation)) => {
                self.situation_fusions.inc();
                self.threat_level.set(situation.level.score());
                self.feature_count.set(situation.feature_count as i64);
            }
            (EventType::LinkMessageSent, EventPayload::Link(link)) => {
                self.link_messages.with_label_values(&[&link.kind]).inc();
            }
            (EventType::LinkTransmitFailed, _) => {
                self.link_transmit_failures.inc();
            }
            (EventType::LinkStateChanged, EventPayload::Component(component)) => {
                self.link_connected
                    .set(if component.state == "CONNECTED" { 1 } else { 0 });
            }
            (EventType::EmergencyChanged, EventPayload::Emergency(emergency)) => {
                self.emergency_active.set(if emergency.active { 1 } else { 0 });
            }
            (EventType::OrchestratorStateChanged, EventPayload::Component(component)) => {
                self.orchestrator_state.reset();
                self.orchestrator_state
                    .with_label_values(&[&component.state])
                    .set(1);
            }
            _ => {}
        }
    }

    /// Feed every event from the bus into the collector until the bus closes
    pub fn spawn_event_listener(self: Arc<Self>, events: &EventBus) -> JoinHandle<()> {
        let mut rx = events.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => self.record_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Metrics listener lagged, skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Metrics listener stopped");
        })
    }

    // ========================================================================
    // API METRICS
    // ========================================================================

    /// Record API request
    pub fn record_api_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        self.api_requests_total
            .with_label_values(&[method, path, &status.to_string()])
            .inc();
        self.api_request_duration
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tactical_core::{GeoPoint, LocationRecord, ThreatLevel};

    fn fix() -> LocationRecord {
        LocationRecord::new(GeoPoint::new(34.0, -118.0), 4.0, "gps")
    }

    #[test]
    fn test_metrics_creation() {
        assert!(MetricsCollector::new().is_ok());
    }

    #[test]
    fn test_event_metrics() {
        let metrics = MetricsCollector::new().unwrap();

        metrics.record_event(&Event::position_accepted(fix()));
        metrics.record_event(&Event::position_rejected(fix(), "accuracy"));
        metrics.record_event(&Event::situation_updated(
            GeoPoint::new(34.0, -118.0),
            ThreatLevel::High,
            7,
        ));
        metrics.record_event(&Event::link_message("pli", 64, true));
        metrics.record_event(&Event::link_message("pli", 0, false));

        let export = metrics.export().unwrap();
        assert!(export.contains("tactical_position_updates_total{outcome=\"accepted\"} 1"));
        assert!(export.contains("tactical_position_updates_total{outcome=\"rejected\"} 1"));
        assert!(export.contains("tactical_threat_level 2"));
        assert!(export.contains("tactical_features_total 7"));
        assert!(export.contains("tactical_link_messages_total{kind=\"pli\"} 1"));
        assert!(export.contains("tactical_link_transmit_failures_total 1"));
    }

    #[test]
    fn test_orchestrator_state_gauge() {
        let metrics = MetricsCollector::new().unwrap();

        for state in ["STARTING", "OPERATIONAL"] {
            metrics.record_event(&Event::component_state(
                EventType::OrchestratorStateChanged,
                "orchestrator",
                state,
                None,
            ));
        }

        let export = metrics.export().unwrap();
        assert!(export.contains("tactical_orchestrator_state{state=\"OPERATIONAL\"} 1"));
        assert!(!export.contains("tactical_orchestrator_state{state=\"STARTING\"} 1"));
    }

    #[test]
    fn test_api_metrics() {
        let metrics = MetricsCollector::new().unwrap();
        metrics.record_api_request("GET", "/health", 200, 0.002);

        let export = metrics.export().unwrap();
        assert!(export.contains("tactical_api_requests_total"));
        assert!(export.contains("/health"));
    }

    #[tokio::test]
    async fn test_event_listener() {
        let bus = EventBus::new(16);
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let handle = metrics.clone().spawn_event_listener(&bus);

        bus.publish(Event::emergency_changed(true, None));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(metrics.export().unwrap().contains("tactical_emergency_active 1"));
        handle.abort();
    }
}
