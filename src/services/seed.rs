//! Seed import
//!
//! Loads a JSON catalog file at startup:
//!
//! ```json
//! {
//!   "banks": [{"name": "HDFC Bank", "slug": "hdfc"}],
//!   "networks": [{"name": "Visa"}],
//!   "categories": [{"name": "Travel"}, {"name": "Airline", "parent": "travel"}],
//!   "cards": [{"title": "HDFC Regalia", "status": "published", "banks": ["hdfc"]}]
//! }
//! ```
//!
//! Terms are upserted by slug and cards are created or updated by slug, so
//! importing the same file twice leaves the catalog unchanged. A card that
//! fails validation is skipped with a warning; an unreadable file or a
//! store failure aborts the import.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use super::card::{CardService, CardServiceError};
use super::term::{TermService, TermServiceError};
use crate::models::{Taxonomy, TermInput};

/// Parsed seed file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub banks: Vec<TermInput>,
    pub networks: Vec<TermInput>,
    pub categories: Vec<TermInput>,
    /// Raw card objects, sanitized on import
    pub cards: Vec<Value>,
}

/// What an import did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub terms: usize,
    pub cards: usize,
    pub skipped: usize,
}

/// Read and import a seed file
pub async fn import_file(path: &Path, terms: &TermService, cards: &CardService) -> Result<SeedReport> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read seed file '{}'", path.display()))?;
    let data: SeedData = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse seed file '{}'", path.display()))?;

    let report = import(data, terms, cards).await?;
    tracing::info!(
        "Imported seed file {}: {} terms, {} cards, {} skipped",
        path.display(),
        report.terms,
        report.cards,
        report.skipped
    );
    Ok(report)
}

/// Import parsed seed data
pub async fn import(data: SeedData, terms: &TermService, cards: &CardService) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    // Top-level categories go first so children can resolve their parent
    let (roots, children): (Vec<TermInput>, Vec<TermInput>) = data
        .categories
        .into_iter()
        .partition(|term| term.parent.as_deref().map_or(true, |p| p.trim().is_empty()));

    let batches = [
        (Taxonomy::Bank, data.banks),
        (Taxonomy::Network, data.networks),
        (Taxonomy::Category, roots),
        (Taxonomy::Category, children),
    ];
    for (taxonomy, inputs) in batches {
        for input in inputs {
            match terms.upsert(taxonomy, input).await {
                Ok(_) => report.terms += 1,
                Err(TermServiceError::Store(e)) => return Err(e.context("Seed import aborted")),
                Err(e) => {
                    tracing::warn!("Skipping seed {} term: {}", taxonomy, e);
                    report.skipped += 1;
                }
            }
        }
    }

    for raw in &data.cards {
        match cards.upsert_by_slug(raw).await {
            Ok(_) => report.cards += 1,
            Err(CardServiceError::Store(e)) => return Err(e.context("Seed import aborted")),
            Err(e) => {
                tracing::warn!("Skipping seed card: {}", e);
                report.skipped += 1;
            }
        }
    }

    Ok(report)
}
