//! Admin API endpoints
//!
//! Write endpoints for the card catalog, guarded by the admin bearer token:
//! - POST /api/v1/admin/cards - Create a card
//! - PUT /api/v1/admin/cards/{id} - Update a card
//! - GET /api/v1/admin/terms/{taxonomy} - List terms
//! - POST /api/v1/admin/terms/{taxonomy} - Create a term

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::common::parse_card_id;
use crate::api::middleware::{ApiError, AppState};
use crate::models::{CardWithTerms, Taxonomy, Term, TermInput};
use crate::services::CardFull;

/// Response for a term
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermResponse {
    pub id: i64,
    pub taxonomy: Taxonomy,
    pub slug: String,
    pub name: String,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<Term> for TermResponse {
    fn from(term: Term) -> Self {
        Self {
            id: term.id,
            taxonomy: term.taxonomy,
            slug: term.slug,
            name: term.name,
            parent_id: term.parent_id,
            created_at: term.created_at,
        }
    }
}

/// Build the admin router (the token guard is applied by the caller)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cards", post(create_card))
        .route("/cards/{id}", put(update_card))
        .route("/terms/{taxonomy}", get(list_terms).post(create_term))
}

fn present(state: &AppState, card: &CardWithTerms) -> CardFull {
    state.card_service.presenter().full(&card.card, &card.terms)
}

fn parse_taxonomy(raw: &str) -> Result<Taxonomy, ApiError> {
    Taxonomy::from_str(raw).ok_or_else(|| ApiError::not_found(format!("Unknown taxonomy: {}", raw)))
}

/// POST /api/v1/admin/cards
async fn create_card(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<CardFull>), ApiError> {
    let card = state.card_service.create(&body).await?;
    Ok((StatusCode::CREATED, Json(present(&state, &card))))
}

/// PUT /api/v1/admin/cards/{id}
async fn update_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<CardFull>, ApiError> {
    let id = parse_card_id(&id)?;
    let card = state.card_service.update(id, &body).await?;
    Ok(Json(present(&state, &card)))
}

/// GET /api/v1/admin/terms/{taxonomy}
async fn list_terms(
    State(state): State<AppState>,
    Path(taxonomy): Path<String>,
) -> Result<Json<Vec<TermResponse>>, ApiError> {
    let taxonomy = parse_taxonomy(&taxonomy)?;
    let terms = state.term_service.list(taxonomy).await?;
    Ok(Json(terms.into_iter().map(Into::into).collect()))
}

/// POST /api/v1/admin/terms/{taxonomy}
async fn create_term(
    State(state): State<AppState>,
    Path(taxonomy): Path<String>,
    Json(body): Json<TermInput>,
) -> Result<(StatusCode, Json<TermResponse>), ApiError> {
    let taxonomy = parse_taxonomy(&taxonomy)?;
    let term = state.term_service.create(taxonomy, body).await?;
    Ok((StatusCode::CREATED, Json(term.into())))
}
