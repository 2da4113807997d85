//! # Tactical Geo
//!
//! Geospatial tactical data engine: the indexed feature store, rules-based
//! threat assessment and the JSON export snapshot.

use serde::{Deserialize, Serialize};

pub mod export;
pub mod seed;
pub mod service;
pub mod store;
pub mod threat;

pub use export::ExportSnapshot;
pub use seed::{SAMPLE_CENTER, sample_features};
pub use service::GeospatialService;
pub use store::GeospatialStore;
pub use threat::{SUPPORT_RADIUS_M, THREAT_RADIUS_M, ThreatAssessor};

/// Geospatial service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    /// Search radius for hostile features (meters)
    pub threat_radius_m: f64,
    /// Search radius for supporting features (meters)
    pub support_radius_m: f64,
    /// Install the sample features on start
    pub seed_sample_data: bool,
    /// Source label written into exports
    pub export_source: String,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            threat_radius_m: THREAT_RADIUS_M,
            support_radius_m: SUPPORT_RADIUS_M,
            seed_sample_data: false,
            export_source: "tactical-engine".to_string(),
        }
    }
}
