//! Rules-based threat assessment

use crate::store::GeospatialStore;
use chrono::Utc;
use std::sync::Arc;
use tactical_core::{CoreResult, FeatureType, GeoPoint, ThreatAssessment, ThreatLevel};
use tracing::debug;

/// Search radius for hostile features (meters)
pub const THREAT_RADIUS_M: f64 = 5_000.0;
/// Search radius for supporting features (meters)
pub const SUPPORT_RADIUS_M: f64 = 2_000.0;

pub const THREAT_TYPES: [FeatureType; 3] =
    [FeatureType::Threat, FeatureType::Hazard, FeatureType::Obstacle];
pub const SUPPORT_TYPES: [FeatureType; 3] =
    [FeatureType::Friendly, FeatureType::Checkpoint, FeatureType::Base];

const HIGH_ADVISORIES: [&str; 3] = [
    "Avoid area - multiple threats detected",
    "Request immediate support",
    "Consider alternate route",
];
const MEDIUM_ADVISORIES: [&str; 2] = [
    "Proceed with caution",
    "Maintain situational awareness",
];
const LOW_ADVISORIES: [&str; 2] = ["Area appears secure", "Continue normal operations"];
const NO_SUPPORT_ADVISORY: &str =
    "No friendly support within 2 km - coordinate with nearest unit";

/// Map a threat count to a level: 3+ high, 1-2 medium, 0 low
pub fn classify(threat_count: usize) -> ThreatLevel {
    match threat_count {
        0 => ThreatLevel::Low,
        1 | 2 => ThreatLevel::Medium,
        _ => ThreatLevel::High,
    }
}

/// Fixed advisory list for a level, plus the no-support advisory when needed
pub fn recommendations(level: ThreatLevel, has_support: bool) -> Vec<String> {
    let base: &[&str] = match level {
        ThreatLevel::High => &HIGH_ADVISORIES,
        ThreatLevel::Medium => &MEDIUM_ADVISORIES,
        ThreatLevel::Low => &LOW_ADVISORIES,
    };

    let mut advisories: Vec<String> = base.iter().map(|s| s.to_string()).collect();
    if !has_support {
        advisories.push(NO_SUPPORT_ADVISORY.to_string());
    }
    advisories
}

/// Derives threat assessments from the geospatial store
#[derive(Clone)]
pub struct ThreatAssessor {
    store: Arc<GeospatialStore>,
    threat_radius: f64,
    support_radius: f64,
}

impl ThreatAssessor {
    pub fn new(store: Arc<GeospatialStore>) -> Self {
        Self::with_radii(store, THREAT_RADIUS_M, SUPPORT_RADIUS_M)
    }

    pub fn with_radii(store: Arc<GeospatialStore>, threat_radius: f64, support_radius: f64) -> Self {
        Self {
            store,
            threat_radius,
            support_radius,
        }
    }

    /// Assess the threat picture at a position
    ///
    /// Apart from the timestamp, the result depends only on the stored
    /// features and the position.
    pub fn assess(&self, position: GeoPoint) -> CoreResult<ThreatAssessment> {
        let nearby_threats = self
            .store
            .query_features(position, self.threat_radius, &THREAT_TYPES)?;
        let friendly_support = self
            .store
            .query_features(position, self.support_radius, &SUPPORT_TYPES)?;

        let level = classify(nearby_threats.len());
        let recommendations = recommendations(level, !friendly_support.is_empty());

        debug!(
            "Threat assessment at {}: {} ({} threats, {} support)",
            position,
            level,
            nearby_threats.len(),
            friendly_support.len()
        );

        Ok(ThreatAssessment {
            position,
            timestamp: Utc::now(),
            level,
            nearby_threats,
            friendly_support,
            recommendations,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tactical_core::TacticalFeature;

    fn store_with(features: &[(&str, FeatureType, GeoPoint)]) -> Arc<GeospatialStore> {
        let store = Arc::new(GeospatialStore::new());
        for (id, feature_type, position) in features {
            store
                .add_feature(TacticalFeature::new(*id, *feature_type, *id, *position, ""))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_classification_thresholds() {
        assert_eq!(classify(0), ThreatLevel::Low);
        assert_eq!(classify(1), ThreatLevel::Medium);
        assert_eq!(classify(2), ThreatLevel::Medium);
        assert_eq!(classify(3), ThreatLevel::High);
        assert_eq!(classify(12), ThreatLevel::High);
    }

    #[test]
    fn test_high_threat_without_support() {
        let here = GeoPoint::new(34.0, -118.0);
        let store = store_with(&[
            ("t1", FeatureType::Threat, here.destination(1_000.0, 0.0)),
            ("t2", FeatureType::Hazard, here.destination(2_000.0, 90.0)),
            ("t3", FeatureType::Obstacle, here.destination(4_000.0, 180.0)),
            ("far", FeatureType::Threat, here.destination(6_000.0, 270.0)),
            ("base", FeatureType::Base, here.destination(3_000.0, 0.0)),
        ]);

        let assessment = ThreatAssessor::new(store).assess(here).unwrap();

        assert_eq!(assessment.level, ThreatLevel::High);
        assert_eq!(assessment.nearby_threats.len(), 3);
        assert!(assessment.friendly_support.is_empty());
        assert_eq!(
            assessment.recommendations.last().unwrap(),
            NO_SUPPORT_ADVISORY
        );
        assert_eq!(assessment.recommendations.len(), HIGH_ADVISORIES.len() + 1);
    }

    #[test]
    fn test_low_threat_with_support() {
        let here = GeoPoint::new(34.0, -118.0);
        let store = store_with(&[
            ("cp", FeatureType::Checkpoint, here.destination(500.0, 45.0)),
            ("op", FeatureType::ObservationPost, here.destination(100.0, 45.0)),
        ]);

        let assessment = ThreatAssessor::new(store).assess(here).unwrap();

        assert_eq!(assessment.level, ThreatLevel::Low);
        assert_eq!(assessment.friendly_support.len(), 1);
        assert_eq!(assessment.recommendations, recommendations(ThreatLevel::Low, true));
    }

    #[test]
    fn test_assessment_is_repeatable() {
        let here = GeoPoint::new(34.0, -118.0);
        let store = store_with(&[
            ("t1", FeatureType::Threat, here.destination(1_500.0, 10.0)),
            ("f1", FeatureType::Friendly, here.destination(1_500.0, 200.0)),
        ]);
        let assessor = ThreatAssessor::new(store);

        let first = assessor.assess(here).unwrap();
        let second = assessor.assess(here).unwrap();

        assert!(first.same_picture(&second));
        assert_eq!(first.level, ThreatLevel::Medium);
    }
}
