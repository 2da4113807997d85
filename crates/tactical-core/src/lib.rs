//! # Tactical Core
//!
//! Core domain models and types for the tactical geospatial engine.
//! This crate provides the shared vocabulary used by the geospatial store,
//! the location tracker, the tactical link and the service orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod error;
pub mod events;
pub mod geo;
pub mod service;

pub use error::{CoreError, CoreResult};
pub use events::*;
pub use geo::*;
pub use service::{EmergencyBeacon, ManagedService, Readiness, ServiceHealth, wait_until_ready};

// ============================================================================
// FEATURE MODELS
// ============================================================================

/// Category of a tactical feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    Checkpoint,
    ObservationPost,
    Logistics,
    Threat,
    Hazard,
    Obstacle,
    Friendly,
    Base,
    /// Operator-marked waypoint
    Waypoint,
}

impl FeatureType {
    pub const ALL: [FeatureType; 9] = [
        FeatureType::Checkpoint,
        FeatureType::ObservationPost,
        FeatureType::Logistics,
        FeatureType::Threat,
        FeatureType::Hazard,
        FeatureType::Obstacle,
        FeatureType::Friendly,
        FeatureType::Base,
        FeatureType::Waypoint,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureType::Checkpoint => "checkpoint",
            FeatureType::ObservationPost => "observation_post",
            FeatureType::Logistics => "logistics",
            FeatureType::Threat => "threat",
            FeatureType::Hazard => "hazard",
            FeatureType::Obstacle => "obstacle",
            FeatureType::Friendly => "friendly",
            FeatureType::Base => "base",
            FeatureType::Waypoint => "waypoint",
        }
    }

    /// Human-readable label ("observation post")
    pub fn label(&self) -> String {
        self.as_str().replace('_', " ")
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(' ', "_").replace('-', "_");
        let parsed = match normalized.as_str() {
            "checkpoint" => FeatureType::Checkpoint,
            "observation_post" | "op" => FeatureType::ObservationPost,
            "logistics" | "supply" => FeatureType::Logistics,
            "threat" => FeatureType::Threat,
            "hazard" => FeatureType::Hazard,
            "obstacle" => FeatureType::Obstacle,
            "friendly" => FeatureType::Friendly,
            "base" => FeatureType::Base,
            "waypoint" => FeatureType::Waypoint,
            _ => {
                return Err(CoreError::Configuration(format!(
                    "unknown feature type: {}",
                    s.trim()
                )));
            }
        };
        Ok(parsed)
    }
}

/// A point of tactical interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TacticalFeature {
    pub id: String,
    pub feature_type: FeatureType,
    pub name: String,
    pub position: GeoPoint,
    pub description: String,
}

impl TacticalFeature {
    pub fn new(
        id: impl Into<String>,
        feature_type: FeatureType,
        name: impl Into<String>,
        position: GeoPoint,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            feature_type,
            name: name.into(),
            position,
            description: description.into(),
        }
    }
}

// ============================================================================
// ROUTE MODELS
// ============================================================================

/// A named point on a mission route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub name: String,
    pub position: GeoPoint,
    /// Elevation in meters above sea level
    pub elevation: Option<f64>,
    pub description: Option<String>,
}

impl Waypoint {
    pub fn new(name: impl Into<String>, position: GeoPoint) -> Self {
        Self {
            name: name.into(),
            position,
            elevation: None,
            description: None,
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Purpose of a mission route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteType {
    Patrol,
    Resupply,
    Evacuation,
    Reconnaissance,
    Assault,
    Withdrawal,
}

impl RouteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteType::Patrol => "patrol",
            RouteType::Resupply => "resupply",
            RouteType::Evacuation => "evacuation",
            RouteType::Reconnaissance => "reconnaissance",
            RouteType::Assault => "assault",
            RouteType::Withdrawal => "withdrawal",
        }
    }
}

impl fmt::Display for RouteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered, immutable route of waypoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionRoute {
    pub id: String,
    pub waypoints: Vec<Waypoint>,
    pub route_type: RouteType,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Sum of great-circle segment lengths in meters
    pub total_distance: f64,
}

impl MissionRoute {
    pub fn new(
        id: impl Into<String>,
        waypoints: Vec<Waypoint>,
        route_type: RouteType,
        description: Option<String>,
    ) -> Self {
        let total_distance = Self::path_length(&waypoints);
        Self {
            id: id.into(),
            waypoints,
            route_type,
            description,
            created_at: Utc::now(),
            total_distance,
        }
    }

    /// Total route length in meters; 0 for fewer than two waypoints
    pub fn path_length(waypoints: &[Waypoint]) -> f64 {
        if waypoints.len() < 2 {
            return 0.0;
        }

        waypoints
            .windows(2)
            .map(|w| w[0].position.distance_to(&w[1].position))
            .sum()
    }
}

// ============================================================================
// FRIENDLY UNITS & CONTROL MEASURES
// ============================================================================

/// A friendly unit reported on the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendlyUnit {
    pub callsign: String,
    pub position: GeoPoint,
    pub status: String,
    pub unit_type: String,
    pub last_update: DateTime<Utc>,
}

impl FriendlyUnit {
    pub fn new(
        callsign: impl Into<String>,
        position: GeoPoint,
        status: impl Into<String>,
        unit_type: impl Into<String>,
    ) -> Self {
        Self {
            callsign: callsign.into(),
            position,
            status: status.into(),
            unit_type: unit_type.into(),
            last_update: Utc::now(),
        }
    }
}

/// Kind of tactical control measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMeasureType {
    Boundary,
    PhaseLine,
    Checkpoint,
    Objective,
    AssemblyArea,
    FireSupportArea,
}

impl ControlMeasureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlMeasureType::Boundary => "boundary",
            ControlMeasureType::PhaseLine => "phase_line",
            ControlMeasureType::Checkpoint => "checkpoint",
            ControlMeasureType::Objective => "objective",
            ControlMeasureType::AssemblyArea => "assembly_area",
            ControlMeasureType::FireSupportArea => "fire_support_area",
        }
    }
}

impl fmt::Display for ControlMeasureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Planning construct expressed as one or more points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlMeasure {
    pub id: String,
    pub measure_type: ControlMeasureType,
    pub name: String,
    pub coordinates: Vec<GeoPoint>,
    pub description: Option<String>,
}

impl ControlMeasure {
    pub fn new(
        id: impl Into<String>,
        measure_type: ControlMeasureType,
        name: impl Into<String>,
        coordinates: Vec<GeoPoint>,
    ) -> Self {
        Self {
            id: id.into(),
            measure_type,
            name: name.into(),
            coordinates,
            description: None,
        }
    }
}

// ============================================================================
// AREA OF OPERATIONS
// ============================================================================

/// Largest permitted AO radius in meters
pub const MAX_AO_RADIUS_M: f64 = 50_000.0;

/// Geographic region of current tactical interest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaOfOperations {
    pub center: GeoPoint,
    /// Radius in meters, clamped to [0, MAX_AO_RADIUS_M]
    pub radius: f64,
}

impl AreaOfOperations {
    pub fn new(center: GeoPoint, radius: f64) -> Self {
        let radius = if radius.is_nan() {
            0.0
        } else {
            radius.clamp(0.0, MAX_AO_RADIUS_M)
        };
        Self { center, radius }
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        self.center.distance_to(point) <= self.radius
    }
}

// ============================================================================
// THREAT MODELS
// ============================================================================

/// Derived threat level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
}

impl ThreatLevel {
    /// Numeric gauge value (0 = low, 2 = high)
    pub fn score(&self) -> i64 {
        match self {
            ThreatLevel::Low => 0,
            ThreatLevel::Medium => 1,
            ThreatLevel::High => 2,
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreatLevel::Low => write!(f, "LOW"),
            ThreatLevel::Medium => write!(f, "MEDIUM"),
            ThreatLevel::High => write!(f, "HIGH"),
        }
    }
}

/// Threat picture for a single position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatAssessment {
    pub position: GeoPoint,
    pub timestamp: DateTime<Utc>,
    pub level: ThreatLevel,
    pub nearby_threats: Vec<TacticalFeature>,
    pub friendly_support: Vec<TacticalFeature>,
    pub recommendations: Vec<String>,
}

impl ThreatAssessment {
    /// Compare two assessments ignoring the timestamp
    pub fn same_picture(&self, other: &ThreatAssessment) -> bool {
        self.position == other.position
            && self.level == other.level
            && self.nearby_threats == other.nearby_threats
            && self.friendly_support == other.friendly_support
            && self.recommendations == other.recommendations
    }
}

// ============================================================================
// LOCATION MODELS
// ============================================================================

/// A single position fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub position: GeoPoint,
    pub timestamp: DateTime<Utc>,
    /// Horizontal accuracy in meters
    pub accuracy: f32,
    /// Provider label (e.g. "gps", "simulated")
    pub source: String,
}

impl LocationRecord {
    pub fn new(position: GeoPoint, accuracy: f32, source: impl Into<String>) -> Self {
        Self {
            position,
            timestamp: Utc::now(),
            accuracy,
            source: source.into(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

// ============================================================================
// SITUATION
// ============================================================================

/// Fused tactical picture, fully replaced on each refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TacticalSituation {
    pub current_position: GeoPoint,
    pub timestamp: DateTime<Utc>,
    pub nearby_features: Vec<TacticalFeature>,
    pub threat_assessment: ThreatAssessment,
    pub link_connected: bool,
    pub emergency_active: bool,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_distance_three_waypoints() {
        let a = GeoPoint::new(34.0522, -118.2437);
        let b = GeoPoint::new(34.0622, -118.2437);
        let c = GeoPoint::new(34.0622, -118.2337);

        let route = MissionRoute::new(
            "patrol-1",
            vec![
                Waypoint::new("A", a),
                Waypoint::new("B", b),
                Waypoint::new("C", c),
            ],
            RouteType::Patrol,
            None,
        );

        let expected = distance(&a, &b).unwrap() + distance(&b, &c).unwrap();
        assert!((route.total_distance - expected).abs() < 1e-9);
    }

    #[test]
    fn test_route_distance_degenerate() {
        let single = MissionRoute::new(
            "single",
            vec![Waypoint::new("A", GeoPoint::new(1.0, 1.0))],
            RouteType::Resupply,
            None,
        );
        let empty = MissionRoute::new("empty", Vec::new(), RouteType::Evacuation, None);

        assert_eq!(single.total_distance, 0.0);
        assert_eq!(empty.total_distance, 0.0);
    }

    #[test]
    fn test_feature_type_parsing() {
        assert_eq!("checkpoint".parse::<FeatureType>().unwrap(), FeatureType::Checkpoint);
        assert_eq!(
            "Observation Post".parse::<FeatureType>().unwrap(),
            FeatureType::ObservationPost
        );
        assert_eq!("supply".parse::<FeatureType>().unwrap(), FeatureType::Logistics);
        assert!("tank".parse::<FeatureType>().is_err());
    }

    #[test]
    fn test_feature_type_serialization() {
        let json = serde_json::to_string(&FeatureType::ObservationPost).unwrap();
        assert_eq!(json, "\"observation_post\"");
    }

    #[test]
    fn test_area_of_operations_clamps_radius() {
        let center = GeoPoint::new(34.0522, -118.2437);

        assert_eq!(AreaOfOperations::new(center, 80_000.0).radius, MAX_AO_RADIUS_M);
        assert_eq!(AreaOfOperations::new(center, -5.0).radius, 0.0);
        assert_eq!(AreaOfOperations::new(center, f64::NAN).radius, 0.0);
        assert_eq!(AreaOfOperations::new(center, 10_000.0).radius, 10_000.0);
    }

    #[test]
    fn test_threat_level_ordering() {
        assert!(ThreatLevel::High > ThreatLevel::Medium);
        assert!(ThreatLevel::Medium > ThreatLevel::Low);
        assert_eq!(ThreatLevel::High.to_string(), "HIGH");
    }
}
