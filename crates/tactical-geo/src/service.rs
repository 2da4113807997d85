//! Managed-service wrapper around the geospatial store

use crate::GeoConfig;
use crate::export::ExportSnapshot;
use crate::store::GeospatialStore;
use crate::threat::ThreatAssessor;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tactical_core::{CoreResult, GeoPoint, ManagedService, Readiness, ServiceHealth, ThreatAssessment};
use tokio::sync::watch;
use tracing::info;

/// Owns the store and assessor and reports lifecycle to the orchestrator
pub struct GeospatialService {
    config: GeoConfig,
    store: Arc<GeospatialStore>,
    assessor: ThreatAssessor,
    readiness: Readiness,
    running: RwLock<bool>,
}

impl GeospatialService {
    pub fn new(config: GeoConfig, store: Arc<GeospatialStore>) -> Self {
        let assessor = ThreatAssessor::with_radii(
            store.clone(),
            config.threat_radius_m,
            config.support_radius_m,
        );
        Self {
            config,
            store,
            assessor,
            readiness: Readiness::new(),
            running: RwLock::new(false),
        }
    }

    pub fn store(&self) -> Arc<GeospatialStore> {
        self.store.clone()
    }

    pub fn assessor(&self) -> &ThreatAssessor {
        &self.assessor
    }

    pub fn assess(&self, position: GeoPoint) -> CoreResult<ThreatAssessment> {
        self.assessor.assess(position)
    }

    /// Export using the configured source label
    pub fn export(&self) -> ExportSnapshot {
        self.store.export_snapshot(self.config.export_source.clone())
    }
}

#[async_trait]
impl ManagedService for GeospatialService {
    fn name(&self) -> &'static str {
        "geospatial"
    }

    async fn start(&self) -> CoreResult<()> {
        if self.config.seed_sample_data {
            self.store.seed_sample_data()?;
        }
        *self.running.write() = true;
        self.readiness.set(true);
        info!(
            "Geospatial service started with {} features",
            self.store.feature_count()
        );
        Ok(())
    }

    async fn stop(&self) {
        *self.running.write() = false;
        self.readiness.set(false);
        info!("Geospatial service stopped");
    }

    fn health(&self) -> ServiceHealth {
        let running = *self.running.read();
        ServiceHealth {
            name: self.name().to_string(),
            state: if running { "running" } else { "stopped" }.to_string(),
            ready: self.readiness.is_ready(),
            detail: Some(format!("{} features", self.store.feature_count())),
        }
    }

    fn readiness(&self) -> watch::Receiver<bool> {
        self.readiness.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_seeds_and_reports_ready() {
        let config = GeoConfig {
            seed_sample_data: true,
            ..GeoConfig::default()
        };
        let service = GeospatialService::new(config, Arc::new(GeospatialStore::new()));
        let readiness = service.readiness();
        assert!(!*readiness.borrow());

        service.start().await.unwrap();

        assert!(*readiness.borrow());
        assert_eq!(service.store().feature_count(), 4);
        assert_eq!(service.health().state, "running");

        service.stop().await;
        assert!(!service.health().ready);
    }

    #[tokio::test]
    async fn test_start_without_seed_is_empty() {
        let service = GeospatialService::new(GeoConfig::default(), Arc::new(GeospatialStore::new()));
        service.start().await.unwrap();
        assert_eq!(service.store().feature_count(), 0);
        assert_eq!(service.export().source, GeoConfig::default().export_source);
    }
}
