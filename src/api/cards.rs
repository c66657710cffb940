//! Card API endpoints
//!
//! Read-only catalog endpoints:
//! - GET /api/v1/cards - Search published cards
//! - GET /api/v1/cards/filters - Facet counts for filter UIs
//! - GET /api/v1/cards/compare?ids=1,2,3 - Full records of several cards
//! - GET /api/v1/cards/{id} - Full record of one card

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use super::common::{parse_card_id, parse_id_list, IdsQuery};
use super::responses::{CardListResponse, CompareResponse};
use crate::api::middleware::{ApiError, AppState};
use crate::services::{CardFull, Facets, SearchParams};

/// Build the card router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_cards))
        .route("/filters", get(get_filters))
        .route("/compare", get(compare_cards))
        .route("/{id}", get(get_card))
}

/// GET /api/v1/cards
///
/// The query string is taken as raw pairs so a repeated key never rejects
/// the request.
async fn list_cards(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<CardListResponse>, ApiError> {
    let params = SearchParams::from_pairs(pairs);
    let page = state.card_service.search(&params).await?;
    Ok(Json(page.into()))
}

/// GET /api/v1/cards/filters
async fn get_filters(State(state): State<AppState>) -> Result<Json<Facets>, ApiError> {
    let facets = state.facet_service.facets().await?;
    Ok(Json(facets))
}

/// GET /api/v1/cards/compare
async fn compare_cards(
    State(state): State<AppState>,
    Query(query): Query<IdsQuery>,
) -> Result<Json<CompareResponse>, ApiError> {
    let ids = parse_id_list(query.ids.as_deref())?;

    let cards = state.card_service.compare(&ids).await?;
    if cards.is_empty() {
        return Err(ApiError::not_found("None of the requested cards were found"));
    }

    Ok(Json(CompareResponse { cards }))
}

/// GET /api/v1/cards/{id}
///
/// The id is taken as text so a non-numeric id is a 404, not a 400.
async fn get_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CardFull>, ApiError> {
    let id = parse_card_id(&id)?;
    let card = state.card_service.get_full(id).await?;
    Ok(Json(card))
}
