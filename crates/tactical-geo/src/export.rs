//! Stable JSON export of the geospatial store

use crate::store::GeospatialStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tactical_core::CoreResult;

/// Full dump of features, routes and control measures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSnapshot {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub source: String,
    pub features: Vec<ExportFeature>,
    pub routes: Vec<ExportRoute>,
    pub control_measures: Vec<ExportControlMeasure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportFeature {
    pub id: String,
    #[serde(rename = "type")]
    pub feature_type: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRoute {
    pub id: String,
    #[serde(rename = "type")]
    pub route_type: String,
    pub waypoints: Vec<ExportWaypoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportWaypoint {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportControlMeasure {
    pub id: String,
    #[serde(rename = "type")]
    pub measure_type: String,
    pub name: String,
    /// `[lat, lon]` pairs
    pub coordinates: Vec<[f64; 2]>,
}

impl ExportSnapshot {
    /// Snapshot the store contents in insertion order
    pub fn capture(store: &GeospatialStore, source: impl Into<String>) -> Self {
        let features = store
            .features()
            .into_iter()
            .map(|f| ExportFeature {
                id: f.id,
                feature_type: f.feature_type.to_string(),
                name: f.name,
                lat: f.position.latitude,
                lon: f.position.longitude,
                description: f.description,
            })
            .collect();

        let routes = store
            .routes()
            .into_iter()
            .map(|r| ExportRoute {
                id: r.id,
                route_type: r.route_type.to_string(),
                waypoints: r
                    .waypoints
                    .into_iter()
                    .map(|w| ExportWaypoint {
                        name: w.name,
                        lat: w.position.latitude,
                        lon: w.position.longitude,
                    })
                    .collect(),
            })
            .collect();

        let control_measures = store
            .control_measures()
            .into_iter()
            .map(|m| ExportControlMeasure {
                id: m.id,
                measure_type: m.measure_type.to_string(),
                name: m.name,
                coordinates: m
                    .coordinates
                    .iter()
                    .map(|p| [p.latitude, p.longitude])
                    .collect(),
            })
            .collect();

        Self {
            timestamp: Utc::now().timestamp_millis(),
            source: source.into(),
            features,
            routes,
            control_measures,
        }
    }

    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl GeospatialStore {
    /// Export the store as a stable, JSON-compatible document
    pub fn export_snapshot(&self, source: impl Into<String>) -> ExportSnapshot {
        ExportSnapshot::capture(self, source)
    }
}
