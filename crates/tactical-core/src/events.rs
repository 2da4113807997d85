//! Event types and the in-process event bus
//!
//! Every tactical service publishes lifecycle and data events here so that
//! observers (metrics, HTTP consumers, logs) never reach into component state.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::{AreaOfOperations, GeoPoint, LocationRecord, ThreatLevel};

/// Event envelope for all system events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(event_type: EventType, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            payload,
        }
    }

    pub fn position_accepted(record: LocationRecord) -> Self {
        Self::new(
            EventType::PositionAccepted,
            EventPayload::Position(PositionEvent { record, reason: None }),
        )
    }

    pub fn position_rejected(record: LocationRecord, reason: impl Into<String>) -> Self {
        Self::new(
            EventType::PositionRejected,
            EventPayload::Position(PositionEvent {
                record,
                reason: Some(reason.into()),
            }),
        )
    }

    pub fn area_changed(area: AreaOfOperations) -> Self {
        Self::new(
            EventType::AreaOfOperationsChanged,
            EventPayload::Area(AreaEvent { area }),
        )
    }

    pub fn situation_updated(position: GeoPoint, level: ThreatLevel, feature_count: usize) -> Self {
        Self::new(
            EventType::SituationUpdated,
            EventPayload::Situation(SituationEvent {
                position,
                level,
                feature_count,
            }),
        )
    }

    pub fn component_state(
        event_type: EventType,
        component: impl Into<String>,
        state: impl Into<String>,
        message: Option<String>,
    ) -> Self {
        Self::new(
            event_type,
            EventPayload::Component(ComponentEvent {
                component: component.into(),
                state: state.into(),
                message,
            }),
        )
    }

    pub fn link_message(kind: impl Into<String>, bytes: usize, delivered: bool) -> Self {
        let event_type = if delivered {
            EventType::LinkMessageSent
        } else {
            EventType::LinkTransmitFailed
        };
        Self::new(
            event_type,
            EventPayload::Link(LinkMessageEvent {
                kind: kind.into(),
                bytes,
            }),
        )
    }

    pub fn emergency_changed(active: bool, position: Option<GeoPoint>) -> Self {
        Self::new(
            EventType::EmergencyChanged,
            EventPayload::Emergency(EmergencyEvent { active, position }),
        )
    }
}

/// Type of event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    // Location events
    PositionAccepted,
    PositionRejected,
    TrackerStateChanged,

    // Geospatial events
    AreaOfOperationsChanged,
    SituationUpdated,

    // Link events
    LinkStateChanged,
    LinkMessageSent,
    LinkTransmitFailed,
    EmergencyChanged,

    // System events
    OrchestratorStateChanged,
}

/// Event payload variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventPayload {
    Position(PositionEvent),
    Area(AreaEvent),
    Situation(SituationEvent),
    Component(ComponentEvent),
    Link(LinkMessageEvent),
    Emergency(EmergencyEvent),
}

/// Position fix accepted or rejected by the tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionEvent {
    pub record: LocationRecord,
    pub reason: Option<String>,
}

/// Area of operations replaced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaEvent {
    pub area: AreaOfOperations,
}

/// Summary of a freshly fused situation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SituationEvent {
    pub position: GeoPoint,
    pub level: ThreatLevel,
    pub feature_count: usize,
}

/// State machine transition of a component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentEvent {
    pub component: String,
    pub state: String,
    pub message: Option<String>,
}

/// Outbound link traffic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkMessageEvent {
    pub kind: String,
    pub bytes: usize,
}

/// Emergency mode toggled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyEvent {
    pub active: bool,
    pub position: Option<GeoPoint>,
}

// ============================================================================
// EVENT BUS
// ============================================================================

/// Event bus for distributing events across the system
#[derive(Clone)]
pub struct EventBus {
    /// Broadcast sender for events
    sender: broadcast::Sender<Event>,
    /// Event history (last N events)
    history: Arc<RwLock<Vec<Event>>>,
    /// Maximum history size
    max_history: usize,
    /// Event counter
    event_count: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);

        Self {
            sender,
            history: Arc::new(RwLock::new(Vec::with_capacity(256))),
            max_history: 256,
            event_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Publish an event
    pub fn publish(&self, event: Event) {
        {
            let mut history = self.history.write();
            history.push(event.clone());
            if history.len() > self.max_history {
                history.remove(0);
            }
        }

        let total = self.event_count.fetch_add(1, Ordering::Relaxed) + 1;

        // No receivers is not an error
        let _ = self.sender.send(event);

        debug!("Event published, total: {}", total);
    }

    /// Get recent events
    pub fn recent(&self, count: usize) -> Vec<Event> {
        let history = self.history.read();
        let start = history.len().saturating_sub(count);
        history[start..].to_vec()
    }

    /// Get event count
    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::Relaxed)
    }

    /// Get subscriber count (approximate)
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> LocationRecord {
        LocationRecord::new(GeoPoint::new(34.0522, -118.2437), 5.0, "gps")
    }

    #[test]
    fn test_event_publishing() {
        let bus = EventBus::new(16);
        bus.publish(Event::position_accepted(sample_record()));

        assert_eq!(bus.event_count(), 1);
        assert_eq!(bus.recent(10).len(), 1);
    }

    #[test]
    fn test_history_is_bounded() {
        let bus = EventBus::new(16);
        for _ in 0..300 {
            bus.publish(Event::position_rejected(sample_record(), "accuracy"));
        }

        assert_eq!(bus.event_count(), 300);
        assert_eq!(bus.recent(1_000).len(), 256);
    }

    #[tokio::test]
    async fn test_subscription() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(Event::emergency_changed(true, None));

        let received = rx.try_recv().unwrap();
        assert_eq!(received.event_type, EventType::EmergencyChanged);
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::situation_updated(GeoPoint::new(1.0, 2.0), ThreatLevel::Medium, 3);

        let json = serde_json::to_string(&event).unwrap();
        let decoded: Event = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.event_type, EventType::SituationUpdated);
        assert!(json.contains("MEDIUM"));
    }
}
