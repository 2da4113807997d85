//! Position sources feeding the tracker

use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tactical_core::{GeoPoint, LocationRecord};
use tokio::sync::broadcast;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

/// Whether a source can currently deliver fixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceAvailability {
    Available,
    PermissionDenied,
    Disabled,
}

/// Cadence and movement threshold requested by the tracker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceRequest {
    pub interval: Duration,
    /// Minimum movement between delivered fixes (meters)
    pub min_distance_m: f64,
}

/// Provider of position fixes
///
/// `observe` returns an infinite stream for one tracking session. Calling it
/// again starts a fresh session.
pub trait PositionSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn availability(&self) -> SourceAvailability;

    fn observe(&self, request: SourceRequest) -> BoxStream<'static, LocationRecord>;
}

// ============================================================================
// SIMULATED SOURCE
// ============================================================================

/// Walks a patrol circle around a fixed center
pub struct SimulatedSource {
    center: GeoPoint,
    radius_m: f64,
    /// Degrees advanced along the circle per tick
    step_degrees: f64,
    accuracy: f32,
    availability: RwLock<SourceAvailability>,
}

impl SimulatedSource {
    pub fn new(center: GeoPoint) -> Self {
        Self {
            center,
            radius_m: 500.0,
            step_degrees: 10.0,
            accuracy: 5.0,
            availability: RwLock::new(SourceAvailability::Available),
        }
    }

    pub fn with_radius(mut self, radius_m: f64) -> Self {
        self.radius_m = radius_m;
        self
    }

    pub fn with_accuracy(mut self, accuracy: f32) -> Self {
        self.accuracy = accuracy;
        self
    }

    pub fn set_availability(&self, availability: SourceAvailability) {
        *self.availability.write() = availability;
    }
}

struct PatrolState {
    ticker: Option<Interval>,
    step: u64,
    last: Option<GeoPoint>,
}

impl PositionSource for SimulatedSource {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn availability(&self) -> SourceAvailability {
        *self.availability.read()
    }

    fn observe(&self, request: SourceRequest) -> BoxStream<'static, LocationRecord> {
        let center = self.center;
        let radius = self.radius_m;
        let step_degrees = self.step_degrees;
        let accuracy = self.accuracy;

        debug!(
            "Simulated source session: every {:?}, min movement {}m",
            request.interval, request.min_distance_m
        );

        let state = PatrolState {
            ticker: None,
            step: 0,
            last: None,
        };

        stream::unfold(state, move |mut state| async move {
            let ticker = state.ticker.get_or_insert_with(|| {
                let mut ticker = tokio::time::interval(request.interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker
            });

            loop {
                ticker.tick().await;

                let bearing = (state.step as f64 * step_degrees) % 360.0;
                state.step += 1;
                let position = center.destination(radius, bearing);

                if let Some(last) = state.last {
                    if last.distance_to(&position) < request.min_distance_m {
                        continue;
                    }
                }
                state.last = Some(position);

                let record = LocationRecord::new(position, accuracy, "simulated");
                return Some((record, state));
            }
        })
        .boxed()
    }
}

// ============================================================================
// CHANNEL SOURCE
// ============================================================================

/// Host-fed source: fixes pushed with [`ChannelSource::push`] reach every
/// active session
pub struct ChannelSource {
    sender: broadcast::Sender<LocationRecord>,
    availability: RwLock<SourceAvailability>,
}

impl ChannelSource {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            availability: RwLock::new(SourceAvailability::Available),
        }
    }

    /// Deliver a fix; returns the number of sessions that received it
    pub fn push(&self, record: LocationRecord) -> usize {
        self.sender.send(record).unwrap_or(0)
    }

    pub fn set_availability(&self, availability: SourceAvailability) {
        *self.availability.write() = availability;
    }
}

impl Default for ChannelSource {
    fn default() -> Self {
        Self::new(64)
    }
}

impl PositionSource for ChannelSource {
    fn name(&self) -> &'static str {
        "channel"
    }

    fn availability(&self) -> SourceAvailability {
        *self.availability.read()
    }

    /// Host-paced; the tracker applies the movement threshold
    fn observe(&self, _request: SourceRequest) -> BoxStream<'static, LocationRecord> {
        // Lagged receivers skip the missed fixes and keep going
        BroadcastStream::new(self.sender.subscribe())
            .filter_map(|result| async move { result.ok() })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_simulated_source_walks_circle() {
        let center = GeoPoint::new(34.0522, -118.2437);
        let source = SimulatedSource::new(center).with_radius(500.0);
        let request = SourceRequest {
            interval: Duration::from_secs(10),
            min_distance_m: 5.0,
        };

        let fixes: Vec<LocationRecord> = source.observe(request).take(3).collect().await;

        assert_eq!(fixes.len(), 3);
        for fix in &fixes {
            assert!((center.distance_to(&fix.position) - 500.0).abs() < 1.0);
            assert_eq!(fix.source, "simulated");
        }
        assert!(fixes[0].position.distance_to(&fixes[1].position) >= 5.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_source_honors_min_distance() {
        let center = GeoPoint::new(10.0, 10.0);
        let source = SimulatedSource::new(center).with_radius(100.0);
        // 10 degree steps on a 100 m circle move ~17 m per tick
        let request = SourceRequest {
            interval: Duration::from_secs(1),
            min_distance_m: 30.0,
        };

        let fixes: Vec<LocationRecord> = source.observe(request).take(3).collect().await;

        for pair in fixes.windows(2) {
            assert!(pair[0].position.distance_to(&pair[1].position) >= 30.0);
        }
    }

    #[tokio::test]
    async fn test_channel_source_delivers_pushed_fixes() {
        let source = ChannelSource::default();
        let request = SourceRequest {
            interval: Duration::from_secs(10),
            min_distance_m: 0.0,
        };
        let mut stream = source.observe(request);

        let record = LocationRecord::new(GeoPoint::new(1.0, 2.0), 3.0, "gps");
        assert_eq!(source.push(record.clone()), 1);

        assert_eq!(stream.next().await.unwrap(), record);
    }

    #[test]
    fn test_availability_toggles() {
        let source = ChannelSource::default();
        assert_eq!(source.availability(), SourceAvailability::Available);
        source.set_availability(SourceAvailability::PermissionDenied);
        assert_eq!(source.availability(), SourceAvailability::PermissionDenied);
    }
}
