//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The API error type and its mapping from service errors
//! - Bearer token guard for the admin routes

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::DynDatabasePool;
use crate::services::{
    CardService, CardServiceError, FacetService, TermService, TermServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub card_service: Arc<CardService>,
    pub facet_service: Arc<FacetService>,
    pub term_service: Arc<TermService>,
    /// Token accepted by the admin routes; `None` locks them
    pub admin_token: Option<Arc<str>>,
}

/// Error response for API errors: `{"error": "<code>", "message": "<text>"}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    pub fn missing_ids() -> Self {
        Self::new("missing_ids", "The ids parameter is required")
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("conflict", message)
    }

    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::new("upstream_unavailable", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }

    /// HTTP status for the error code
    pub fn status(&self) -> StatusCode {
        match self.error.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "missing_ids" | "validation_error" => StatusCode::BAD_REQUEST,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "conflict" => StatusCode::CONFLICT,
            "upstream_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        tracing::error!("Store error: {:#}", e);
        ApiError::upstream_unavailable("The catalog store is unavailable")
    }
}

impl From<CardServiceError> for ApiError {
    fn from(e: CardServiceError) -> Self {
        match e {
            CardServiceError::NotFound(_) => ApiError::not_found("Card not found"),
            CardServiceError::Validation(msg) => ApiError::validation_error(msg),
            CardServiceError::DuplicateSlug(slug) => {
                ApiError::conflict(format!("Card slug already exists: {}", slug))
            }
            CardServiceError::Store(e) => e.into(),
        }
    }
}

impl From<TermServiceError> for ApiError {
    fn from(e: TermServiceError) -> Self {
        match e {
            TermServiceError::NotFound(msg) => ApiError::not_found(msg),
            TermServiceError::Validation(msg) => ApiError::validation_error(msg),
            TermServiceError::DuplicateSlug(slug) => {
                ApiError::conflict(format!("Term slug already exists: {}", slug))
            }
            TermServiceError::Store(e) => e.into(),
        }
    }
}

/// Extract a bearer token from the Authorization header
fn extract_bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Compare without short-circuiting on the first differing byte
fn tokens_match(given: &str, expected: &str) -> bool {
    given.len() == expected.len()
        && given
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Admin guard: requires `Authorization: Bearer <server.admin_token>`
pub async fn require_admin_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = state
        .admin_token
        .as_deref()
        .ok_or_else(|| ApiError::unauthorized("Admin access is not configured"))?;

    let token = extract_bearer_token(&request)
        .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;

    if !tokens_match(token, expected) {
        tracing::warn!("Rejected admin request to {}", request.uri().path());
        return Err(ApiError::unauthorized("Invalid bearer token"));
    }

    Ok(next.run(request).await)
}
