//! Shared API response types
//!
//! Envelope structures wrapping presenter output for the card endpoints.

use serde::Serialize;

use crate::models::SearchPage;
use crate::services::{CardFull, CardSummary};

// ============================================================================
// Card List Response Types
// ============================================================================

/// Paging metadata of a card listing
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub pages: u32,
    pub current_page: u32,
    pub per_page: u32,
}

/// `GET /cards` response
#[derive(Debug, Serialize)]
pub struct CardListResponse {
    pub data: Vec<CardSummary>,
    pub pagination: Pagination,
}

impl From<SearchPage<CardSummary>> for CardListResponse {
    fn from(page: SearchPage<CardSummary>) -> Self {
        Self {
            pagination: Pagination {
                total: page.total,
                pages: page.page_count,
                current_page: page.page,
                per_page: page.per_page,
            },
            data: page.items,
        }
    }
}

/// `GET /cards/compare` response
#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub cards: Vec<CardFull>,
}

// ============================================================================
// Health
// ============================================================================

/// `GET /health` response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
