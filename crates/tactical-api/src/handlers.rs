//! API request handlers

use crate::error::ApiError;
use crate::state::AppState;

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tactical_core::{
    BearingDistance, ControlMeasure, ControlMeasureType, FeatureType, FriendlyUnit, GeoPoint,
    LocationRecord, RouteType, TacticalFeature, Waypoint,
};
use tactical_link::{LinkStatus, PeerPosition};
use tactical_location::{RejectReason, TrackerStats, UpdateOutcome};
use tactical_orchestrator::{CommandResponse, OrchestratorStatus};
use tracing::{debug, info};

// ============================================================================
// RESPONSE TYPES
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub api: String,
    pub orchestrator: OrchestratorStatus,
    pub tracker_state: String,
    pub tracking_mode: String,
    pub link_state: String,
    pub feature_count: usize,
    pub events_published: u64,
}

#[derive(Serialize)]
pub struct LocationResponse {
    pub state: String,
    pub mode: String,
    pub source: String,
    pub emergency: bool,
    pub position: Option<LocationRecord>,
    pub stats: TrackerStats,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub fixes: Vec<LocationRecord>,
    pub total: usize,
}

#[derive(Serialize)]
pub struct FixResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct FeatureListResponse {
    pub features: Vec<TacticalFeature>,
    pub total: usize,
}

#[derive(Serialize)]
pub struct NearestResponse {
    pub feature: TacticalFeature,
    pub bearing: f64,
    pub distance: f64,
    pub compass: String,
}

#[derive(Serialize)]
pub struct LinkResponse {
    pub status: LinkStatus,
    pub peers: Vec<PeerPosition>,
}

#[derive(Serialize)]
pub struct EmergencyResponse {
    pub active: bool,
}

// ============================================================================
// REQUEST TYPES
// ============================================================================

/// Optional position override; falls back to the current fix
#[derive(Debug, Default, Deserialize)]
pub struct PositionQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct FixRequest {
    pub lat: f64,
    pub lon: f64,
    pub accuracy: f32,
    #[serde(default = "default_fix_source")]
    pub source: String,
}

fn default_fix_source() -> String {
    "api".into()
}

#[derive(Debug, Default, Deserialize)]
pub struct FeatureQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Meters; unbounded when omitted
    pub range: Option<f64>,
    /// Comma-separated feature types
    pub types: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeatureRequest {
    pub id: String,
    pub feature_type: FeatureType,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct NearestQuery {
    #[serde(rename = "type")]
    pub feature_type: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct WaypointRequest {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub id: String,
    pub route_type: RouteType,
    pub waypoints: Vec<WaypointRequest>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UnitRequest {
    pub callsign: String,
    pub lat: f64,
    pub lon: f64,
    pub status: String,
    pub unit_type: String,
}

#[derive(Debug, Deserialize)]
pub struct ControlMeasureRequest {
    pub id: String,
    pub measure_type: ControlMeasureType,
    pub name: String,
    /// `[lat, lon]` pairs
    #[serde(default)]
    pub coordinates: Vec<[f64; 2]>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

#[derive(Debug, Deserialize)]
pub struct EmergencyRequest {
    pub active: bool,
}

/// Query position if given, otherwise the latest accepted fix
fn resolve_position(state: &AppState, lat: Option<f64>, lon: Option<f64>) -> Result<GeoPoint, ApiError> {
    match (lat, lon) {
        (Some(lat), Some(lon)) => Ok(GeoPoint::try_new(lat, lon)?),
        (None, None) => state
            .tracker
            .current_position()
            .map(|r| r.position)
            .ok_or_else(|| ApiError::unavailable("No position fix available")),
        _ => Err(ApiError::bad_request("lat and lon must be given together")),
    }
}

// ============================================================================
// HEALTH & STATUS HANDLERS
// ============================================================================

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Ready once every tactical service is operational
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let orchestrator = state.orchestrator.state().to_string();
    if state.orchestrator.is_operational() {
        (
            StatusCode::OK,
            Json(serde_json::json!({"ready": true, "state": orchestrator})),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"ready": false, "state": orchestrator})),
        )
    }
}

/// System status overview
pub async fn system_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        api: "running".into(),
        orchestrator: state.orchestrator.status(),
        tracker_state: state.tracker.state().to_string(),
        tracking_mode: state.tracker.mode().to_string(),
        link_state: state.link.state().to_string(),
        feature_count: state.store.feature_count(),
        events_published: state.events.event_count(),
    })
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let body = state
        .metrics
        .export()
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

// ============================================================================
// SITUATION & LOCATION HANDLERS
// ============================================================================

/// Latest fused tactical situation
pub async fn get_situation(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state
        .orchestrator
        .situation()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("No tactical situation available yet"))
}

pub async fn get_location(State(state): State<AppState>) -> impl IntoResponse {
    let tracker = &state.tracker;
    Json(LocationResponse {
        state: tracker.state().to_string(),
        mode: tracker.mode().to_string(),
        source: tracker.source_name().into(),
        emergency: tracker.is_emergency(),
        position: tracker.current_position(),
        stats: tracker.stats(),
    })
}

/// Retained fixes, oldest first; `limit` keeps the newest N
pub async fn get_location_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let mut fixes = state.tracker.history();
    if let Some(limit) = query.limit {
        let skip = fixes.len().saturating_sub(limit);
        fixes = fixes.split_off(skip);
    }

    let total = fixes.len();
    Json(HistoryResponse { fixes, total })
}

/// Feed one host-supplied fix through the tracker's accuracy gate
pub async fn submit_fix(
    State(state): State<AppState>,
    Json(request): Json<FixRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let position = GeoPoint::try_new(request.lat, request.lon)?;
    let record = LocationRecord::new(position, request.accuracy, request.source);

    let response = match state.tracker.process_update(record) {
        UpdateOutcome::Accepted => FixResponse {
            accepted: true,
            reason: None,
        },
        UpdateOutcome::Rejected(reason) => {
            debug!("Fix rejected via API: {}", reason);
            if reason == RejectReason::NotTracking {
                return Err(ApiError::unavailable(reason.to_string()));
            }
            FixResponse {
                accepted: false,
                reason: Some(reason.to_string()),
            }
        }
    };

    Ok(Json(response))
}

// ============================================================================
// FEATURE HANDLERS
// ============================================================================

/// All features, or a distance-sorted query around `lat`/`lon`
pub async fn list_features(
    State(state): State<AppState>,
    Query(query): Query<FeatureQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let types = match query.types.as_deref() {
        Some(list) => list
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(FeatureType::from_str)
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    let features = match (query.lat, query.lon) {
        (None, None) => state
            .store
            .features()
            .into_iter()
            .filter(|f| types.is_empty() || types.contains(&f.feature_type))
            .collect(),
        (lat, lon) => {
            let center = resolve_position(&state, lat, lon)?;
            let range = query.range.unwrap_or(f64::INFINITY);
            state.store.query_features(center, range, &types)?
        }
    };

    let total = features.len();
    Ok(Json(FeatureListResponse { features, total }))
}

/// Insert or replace a feature
pub async fn add_feature(
    State(state): State<AppState>,
    Json(request): Json<FeatureRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let feature = TacticalFeature::new(
        request.id,
        request.feature_type,
        request.name,
        GeoPoint::new(request.lat, request.lon),
        request.description,
    );
    state.store.add_feature(feature.clone())?;
    info!("Feature {} added via API", feature.id);

    Ok((StatusCode::CREATED, Json(feature)))
}

pub async fn nearest_feature(
    State(state): State<AppState>,
    Query(query): Query<NearestQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let feature_type = FeatureType::from_str(&query.feature_type)?;
    let from = resolve_position(&state, query.lat, query.lon)?;

    let feature = state
        .store
        .find_nearest(from, feature_type)?
        .ok_or_else(|| ApiError::not_found(format!("No {} on record", feature_type.label())))?;
    let bd = BearingDistance::between(&from, &feature.position)?;

    Ok(Json(NearestResponse {
        compass: bd.compass_point().into(),
        bearing: bd.bearing,
        distance: bd.distance,
        feature,
    }))
}

// ============================================================================
// ROUTE, UNIT & CONTROL MEASURE HANDLERS
// ============================================================================

pub async fn list_routes(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.routes())
}

/// Create a route; 409 when the id is taken
pub async fn create_route(
    State(state): State<AppState>,
    Json(request): Json<RouteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let waypoints = request
        .waypoints
        .into_iter()
        .map(|w| {
            let waypoint = Waypoint::new(w.name, GeoPoint::new(w.lat, w.lon));
            match w.elevation {
                Some(elevation) => waypoint.with_elevation(elevation),
                None => waypoint,
            }
        })
        .collect();

    let route = state.store.create_route(
        request.id,
        waypoints,
        request.route_type,
        request.description,
    )?;

    Ok((StatusCode::CREATED, Json(route)))
}

pub async fn list_units(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.friendly_units())
}

pub async fn upsert_unit(
    State(state): State<AppState>,
    Json(request): Json<UnitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let unit = FriendlyUnit::new(
        request.callsign,
        GeoPoint::new(request.lat, request.lon),
        request.status,
        request.unit_type,
    );
    state.store.upsert_friendly_unit(unit.clone())?;

    Ok(Json(unit))
}

pub async fn list_control_measures(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.control_measures())
}

pub async fn upsert_control_measure(
    State(state): State<AppState>,
    Json(request): Json<ControlMeasureRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let coordinates = request
        .coordinates
        .iter()
        .map(|[lat, lon]| GeoPoint::new(*lat, *lon))
        .collect();
    let mut measure =
        ControlMeasure::new(request.id, request.measure_type, request.name, coordinates);
    measure.description = request.description;
    state.store.upsert_control_measure(measure.clone())?;

    Ok(Json(measure))
}

// ============================================================================
// THREAT & EXPORT HANDLERS
// ============================================================================

pub async fn get_threat(
    State(state): State<AppState>,
    Query(query): Query<PositionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let position = resolve_position(&state, query.lat, query.lon)?;
    Ok(Json(state.geo.assess(position)?))
}

pub async fn export(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.geo.export())
}

// ============================================================================
// COMMAND & EMERGENCY HANDLERS
// ============================================================================

/// Execute a free-text command
pub async fn command(
    State(state): State<AppState>,
    Json(request): Json<CommandRequest>,
) -> Json<CommandResponse> {
    info!("Command received: {}", request.command);
    Json(state.commands.handle(&request.command).await)
}

pub async fn set_emergency(
    State(state): State<AppState>,
    Json(request): Json<EmergencyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.orchestrator.set_emergency(request.active).await?;
    Ok(Json(EmergencyResponse {
        active: state.tracker.is_emergency(),
    }))
}

// ============================================================================
// LINK HANDLERS
// ============================================================================

pub async fn get_link(State(state): State<AppState>) -> impl IntoResponse {
    Json(LinkResponse {
        status: state.link.status(),
        peers: state.link.peers(),
    })
}

pub async fn link_connect(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.link.connect().await?;
    Ok(Json(state.link.status()))
}

pub async fn link_disconnect(State(state): State<AppState>) -> impl IntoResponse {
    state.link.disconnect().await;
    Json(state.link.status())
}
