//! API server configuration

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tactical_geo::{GeoConfig, SAMPLE_CENTER};
use tactical_link::LinkConfig;
use tactical_location::LocationConfig;
use tactical_orchestrator::{OrchestratorConfig, SITUATION_RADIUS_M};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// REST API port
    pub api_port: u16,
    /// Own callsign on the tactical link
    pub callsign: String,
    /// Use the simulated patrol source instead of host-fed fixes
    pub simulation_mode: bool,
    /// Patrol center for the simulated source
    pub sim_start_lat: f64,
    pub sim_start_lon: f64,
    /// Install the sample features on start
    pub seed_sample_data: bool,
    /// AO radius applied around the first fix (meters)
    pub ao_radius_m: f64,
    pub startup_timeout_secs: u64,
    pub fusion_interval_secs: u64,
    pub pli_interval_secs: u64,
    pub peer_interval_secs: u64,
    pub handshake_ms: u64,
    /// Connect the tactical link once operational
    pub auto_connect: bool,
    /// Enable CORS for all origins (development)
    pub cors_permissive: bool,
    pub log_format: LogFormat,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_port: 3000,
            callsign: "VIPER-1".into(),
            simulation_mode: true,
            sim_start_lat: SAMPLE_CENTER.latitude,
            sim_start_lon: SAMPLE_CENTER.longitude,
            seed_sample_data: true,
            ao_radius_m: 10_000.0,
            startup_timeout_secs: 30,
            fusion_interval_secs: 30,
            pli_interval_secs: 30,
            peer_interval_secs: 15,
            handshake_ms: 2_000,
            auto_connect: false,
            cors_permissive: true,
            log_format: LogFormat::Pretty,
        }
    }
}

impl ApiConfig {
    /// Load configuration from `.env` and environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let log_format = match std::env::var("LOG_FORMAT") {
            Ok(s) if s.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Self {
            api_port: env_or("API_PORT", defaults.api_port),
            callsign: std::env::var("CALLSIGN").unwrap_or(defaults.callsign),
            simulation_mode: env_flag("SIMULATION_MODE", defaults.simulation_mode),
            sim_start_lat: env_or("SIM_START_LAT", defaults.sim_start_lat),
            sim_start_lon: env_or("SIM_START_LON", defaults.sim_start_lon),
            seed_sample_data: env_flag("SEED_SAMPLE_DATA", defaults.seed_sample_data),
            ao_radius_m: env_or("AO_RADIUS_M", defaults.ao_radius_m),
            startup_timeout_secs: env_or("STARTUP_TIMEOUT_SECS", defaults.startup_timeout_secs),
            fusion_interval_secs: env_or("FUSION_INTERVAL_SECS", defaults.fusion_interval_secs),
            pli_interval_secs: env_or("PLI_INTERVAL_SECS", defaults.pli_interval_secs),
            peer_interval_secs: env_or("PEER_INTERVAL_SECS", defaults.peer_interval_secs),
            handshake_ms: env_or("HANDSHAKE_MS", defaults.handshake_ms),
            auto_connect: env_flag("AUTO_CONNECT", defaults.auto_connect),
            cors_permissive: env_flag("CORS_PERMISSIVE", defaults.cors_permissive),
            log_format,
        }
    }

    pub fn geo_config(&self) -> GeoConfig {
        GeoConfig {
            seed_sample_data: self.seed_sample_data,
            export_source: self.callsign.clone(),
            ..GeoConfig::default()
        }
    }

    pub fn location_config(&self) -> LocationConfig {
        LocationConfig::default()
    }

    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            callsign: self.callsign.clone(),
            handshake_delay: Duration::from_millis(self.handshake_ms),
            pli_interval: Duration::from_secs(self.pli_interval_secs.max(1)),
            peer_interval: Duration::from_secs(self.peer_interval_secs.max(1)),
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            startup_timeout: Duration::from_secs(self.startup_timeout_secs),
            fusion_interval: Duration::from_secs(self.fusion_interval_secs.max(1)),
            ao_radius_m: self.ao_radius_m,
            situation_radius_m: SITUATION_RADIUS_M,
            auto_connect: self.auto_connect,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|s| s == "true" || s == "1")
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_maps_to_services() {
        let config = ApiConfig::default();

        let link = config.link_config();
        assert_eq!(link.callsign, "VIPER-1");
        assert_eq!(link.handshake_delay, Duration::from_secs(2));

        let orchestrator = config.orchestrator_config();
        assert_eq!(orchestrator.startup_timeout, Duration::from_secs(30));
        assert_eq!(orchestrator.ao_radius_m, 10_000.0);
        assert!(!orchestrator.auto_connect);

        let geo = config.geo_config();
        assert!(geo.seed_sample_data);
        assert_eq!(geo.export_source, "VIPER-1");
    }

    #[test]
    fn test_zero_intervals_are_clamped() {
        let config = ApiConfig {
            pli_interval_secs: 0,
            fusion_interval_secs: 0,
            ..ApiConfig::default()
        };
        assert_eq!(config.link_config().pli_interval, Duration::from_secs(1));
        assert_eq!(
            config.orchestrator_config().fusion_interval,
            Duration::from_secs(1)
        );
    }
}
