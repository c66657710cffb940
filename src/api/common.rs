//! Common API utilities and shared types
//!
//! This module contains request parsing helpers used across endpoints.

use serde::Deserialize;

use super::middleware::ApiError;

// ============================================================================
// Query Types
// ============================================================================

/// `?ids=1,2,3` of the comparison endpoint
#[derive(Debug, Default, Deserialize)]
pub struct IdsQuery {
    #[serde(default)]
    pub ids: Option<String>,
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a path id; anything that is not a positive integer is "not found"
pub fn parse_card_id(raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::not_found("Card not found"))
}

/// Parse a comma-separated id list.
///
/// Tokens that are not positive integers are dropped; a missing or blank
/// list is `missing_ids`.
pub fn parse_id_list(raw: Option<&str>) -> Result<Vec<i64>, ApiError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(ApiError::missing_ids)?;

    let ids: Vec<i64> = raw
        .split(',')
        .filter_map(|token| token.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
        .collect();

    if raw.split(',').all(|token| token.trim().is_empty()) {
        return Err(ApiError::missing_ids());
    }

    Ok(ids)
}
