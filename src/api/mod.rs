//! API layer - HTTP handlers and routing
//!
//! This module contains the HTTP endpoints of the card catalog:
//! - Card search, facet, comparison and detail endpoints
//! - Admin card and term write endpoints
//! - Health check

pub mod admin;
pub mod cards;
pub mod common;
pub mod middleware;
pub mod responses;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState};
use crate::db::DatabasePool;
use responses::HealthResponse;

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_admin_token,
        ));

    Router::new()
        .nest("/cards", cards::router())
        .merge(admin_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Result<Router> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    let cors = if cors_origin.trim() == "*" {
        cors.allow_origin(Any)
    } else {
        let origin = cors_origin
            .parse::<HeaderValue>()
            .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;
        cors.allow_origin(origin)
    };

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// GET /health
async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    match state.pool.ping().await {
        Ok(()) => Ok(Json(HealthResponse { status: "ok" })),
        Err(e) => {
            tracing::error!("Health check failed: {:#}", e);
            Err(ApiError::upstream_unavailable("The catalog store is unavailable"))
        }
    }
}
