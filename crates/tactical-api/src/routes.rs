//! API route definitions

use crate::handlers;
use crate::state::AppState;

use axum::{
    Router,
    extract::{MatchedPath, Request, State},
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use std::time::{Duration, Instant};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = if state.config.cors_permissive {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .max_age(Duration::from_secs(3600))
    } else {
        CorsLayer::new()
            .allow_origin(HeaderValue::from_static("http://localhost:8080"))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        // Health & Status
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/status", get(handlers::system_status))

        // Metrics (Prometheus format)
        .route("/metrics", get(handlers::metrics))

        // Situation & location
        .route("/api/v1/situation", get(handlers::get_situation))
        .route("/api/v1/location", get(handlers::get_location))
        .route("/api/v1/location/history", get(handlers::get_location_history))
        .route("/api/v1/location/fix", post(handlers::submit_fix))

        // Geospatial store
        .route(
            "/api/v1/features",
            get(handlers::list_features).post(handlers::add_feature),
        )
        .route("/api/v1/features/nearest", get(handlers::nearest_feature))
        .route(
            "/api/v1/routes",
            get(handlers::list_routes).post(handlers::create_route),
        )
        .route(
            "/api/v1/units",
            get(handlers::list_units).post(handlers::upsert_unit),
        )
        .route(
            "/api/v1/control-measures",
            get(handlers::list_control_measures).post(handlers::upsert_control_measure),
        )
        .route("/api/v1/threat", get(handlers::get_threat))
        .route("/api/v1/export", get(handlers::export))

        // Commands
        .route("/api/v1/command", post(handlers::command))
        .route("/api/v1/emergency", post(handlers::set_emergency))

        // Tactical link
        .route("/api/v1/link", get(handlers::get_link))
        .route("/api/v1/link/connect", post(handlers::link_connect))
        .route("/api/v1/link/disconnect", post(handlers::link_disconnect))

        // Apply middleware
        .route_layer(middleware::from_fn_with_state(state.clone(), track_metrics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state)
}

/// Count and time every routed request by its route template
async fn track_metrics(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());

    let response = next.run(req).await;

    state.metrics.record_api_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

// ============================================================================
// TESTS
// ============================================================================
