//! Sample features for demos and field drills

use crate::store::GeospatialStore;
use tactical_core::{CoreResult, FeatureType, GeoPoint, TacticalFeature};
use tracing::info;

/// Center used by the sample scenario (downtown Los Angeles)
pub const SAMPLE_CENTER: GeoPoint = GeoPoint::new(34.0522, -118.2437);

/// The four sample features around [`SAMPLE_CENTER`]
pub fn sample_features() -> Vec<TacticalFeature> {
    vec![
        TacticalFeature::new(
            "checkpoint-alpha",
            FeatureType::Checkpoint,
            "Checkpoint Alpha",
            GeoPoint::new(34.0622, -118.2437),
            "Primary checkpoint on the northern approach",
        ),
        TacticalFeature::new(
            "obs-post-1",
            FeatureType::ObservationPost,
            "Observation Post 1",
            GeoPoint::new(34.1122, -118.2437),
            "Elevated observation position",
        ),
        TacticalFeature::new(
            "supply-depot",
            FeatureType::Logistics,
            "Supply Depot",
            GeoPoint::new(34.0522, -118.1637),
            "Forward supply point",
        ),
        TacticalFeature::new(
            "threat-area-1",
            FeatureType::Threat,
            "Threat Area 1",
            GeoPoint::new(34.0322, -118.2287),
            "Reported hostile activity",
        ),
    ]
}

impl GeospatialStore {
    /// Install the sample features, replacing any with the same ids
    pub fn seed_sample_data(&self) -> CoreResult<usize> {
        let features = sample_features();
        let count = features.len();
        for feature in features {
            self.add_feature(feature)?;
        }
        info!("Seeded {} sample features", count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threat::{ThreatAssessor, THREAT_RADIUS_M, THREAT_TYPES, classify};
    use std::sync::Arc;
    use tactical_core::distance;

    #[test]
    fn test_ao_scenario_membership() {
        let store = GeospatialStore::new();
        store.seed_sample_data().unwrap();
        store.set_area_of_operations(SAMPLE_CENTER, 10_000.0).unwrap();

        let found: Vec<String> = store
            .query_features(SAMPLE_CENTER, 5_000.0, &[])
            .unwrap()
            .into_iter()
            .map(|f| f.id)
            .collect();

        let mut expected: Vec<(f64, String)> = sample_features()
            .into_iter()
            .map(|f| (distance(&SAMPLE_CENTER, &f.position).unwrap(), f.id))
            .filter(|(d, _)| *d <= 5_000.0)
            .collect();
        expected.sort_by(|a, b| a.0.total_cmp(&b.0));
        let expected: Vec<String> = expected.into_iter().map(|(_, id)| id).collect();

        assert_eq!(found, expected);
        assert_eq!(found, vec!["checkpoint-alpha", "threat-area-1"]);
    }

    #[test]
    fn test_assess_scenario_at_center() {
        let store = Arc::new(GeospatialStore::new());
        store.seed_sample_data().unwrap();

        let threat_count = sample_features()
            .iter()
            .filter(|f| THREAT_TYPES.contains(&f.feature_type))
            .filter(|f| distance(&SAMPLE_CENTER, &f.position).unwrap() <= THREAT_RADIUS_M)
            .count();

        let assessment = ThreatAssessor::new(store).assess(SAMPLE_CENTER).unwrap();

        assert_eq!(assessment.level, classify(threat_count));
        assert_eq!(assessment.nearby_threats.len(), threat_count);
        assert_eq!(assessment.friendly_support[0].id, "checkpoint-alpha");
    }

    #[test]
    fn test_seeding_is_idempotent() {
        let store = GeospatialStore::new();
        store.seed_sample_data().unwrap();
        store.seed_sample_data().unwrap();
        assert_eq!(store.feature_count(), 4);
    }
}
