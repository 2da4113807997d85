//! Situation fusion

use chrono::Utc;
use tactical_core::{CoreResult, GeoPoint, TacticalSituation};
use tactical_geo::{GeospatialStore, ThreatAssessor};

/// Radius of the feature picture included in a situation (meters)
pub const SITUATION_RADIUS_M: f64 = 5_000.0;

/// Inputs gathered from the link and tracker at fusion time
#[derive(Debug, Clone, Copy)]
pub struct FusionInputs {
    pub position: GeoPoint,
    pub link_connected: bool,
    pub emergency_active: bool,
}

/// Build a complete situation snapshot for one position
pub fn fuse(
    store: &GeospatialStore,
    assessor: &ThreatAssessor,
    inputs: FusionInputs,
    radius: f64,
) -> CoreResult<TacticalSituation> {
    let nearby_features = store.query_features(inputs.position, radius, &[])?;
    let threat_assessment = assessor.assess(inputs.position)?;

    Ok(TacticalSituation {
        current_position: inputs.position,
        timestamp: Utc::now(),
        nearby_features,
        threat_assessment,
        link_connected: inputs.link_connected,
        emergency_active: inputs.emergency_active,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tactical_core::ThreatLevel;
    use tactical_geo::SAMPLE_CENTER;

    #[test]
    fn test_fuse_sample_picture() {
        let store = Arc::new(GeospatialStore::new());
        store.seed_sample_data().unwrap();
        let assessor = ThreatAssessor::new(store.clone());

        let situation = fuse(
            &store,
            &assessor,
            FusionInputs {
                position: SAMPLE_CENTER,
                link_connected: true,
                emergency_active: false,
            },
            SITUATION_RADIUS_M,
        )
        .unwrap();

        let ids: Vec<&str> = situation.nearby_features.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["checkpoint-alpha", "threat-area-1"]);
        assert_eq!(situation.threat_assessment.level, ThreatLevel::Medium);
        assert!(situation.link_connected);
        assert!(!situation.emergency_active);
    }

    #[test]
    fn test_fuse_rejects_invalid_position() {
        let store = Arc::new(GeospatialStore::new());
        let assessor = ThreatAssessor::new(store.clone());
        let inputs = FusionInputs {
            position: GeoPoint::new(91.0, 0.0),
            link_connected: false,
            emergency_active: false,
        };

        assert!(fuse(&store, &assessor, inputs, SITUATION_RADIUS_M).is_err());
    }
}
