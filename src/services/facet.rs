//! Facet aggregation
//!
//! Counts published cards per filterable dimension for filter UIs. Term
//! facets come from the card/term join; rating, fee and income facets use
//! fixed bucket thresholds that never depend on the data.
//!
//! Counts always cover the whole published catalog, whatever filters a
//! client currently has applied. The result is cached until the next write.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::presenter::format_currency;
use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::{CardRepository, TermRepository};
use crate::models::{IncomeRange, NumericRange, RangeColumn, Taxonomy, TermCount};

/// Cache key of the facet output
pub const FACETS_CACHE_KEY: &str = "facets:global";

/// Pattern dropping every cached facet entry
pub const FACETS_CACHE_PATTERN: &str = "facets:*";

/// Minimum star ratings offered as filters
pub const RATING_THRESHOLDS: [u8; 4] = [4, 3, 2, 1];

/// Annual fee ceilings offered as filters; 0 is "Free"
pub const FEE_THRESHOLDS: [i64; 4] = [0, 1_000, 2_500, 5_000];

/// "N+ Stars" bucket: cards rated at least `min`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingBucket {
    pub min: u8,
    pub label: String,
    pub count: i64,
}

/// "Up to N" annual fee bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeBucket {
    pub max: i64,
    pub label: String,
    pub count: i64,
}

/// Minimum income bracket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeBucket {
    pub key: String,
    pub label: String,
    pub min: i64,
    pub max: i64,
    pub count: i64,
}

/// Facet output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facets {
    pub banks: Vec<TermCount>,
    pub networks: Vec<TermCount>,
    pub categories: Vec<TermCount>,
    pub rating_buckets: Vec<RatingBucket>,
    pub fee_buckets: Vec<FeeBucket>,
    pub income_buckets: Vec<IncomeBucket>,
}

/// Facet aggregator with result caching
pub struct FacetService {
    cards: Arc<dyn CardRepository>,
    terms: Arc<dyn TermRepository>,
    cache: Arc<MemoryCache>,
    cache_ttl: Duration,
}

impl FacetService {
    /// Create a facet service caching for the cache's default TTL
    pub fn new(
        cards: Arc<dyn CardRepository>,
        terms: Arc<dyn TermRepository>,
        cache: Arc<MemoryCache>,
    ) -> Self {
        let cache_ttl = cache.default_ttl();
        Self {
            cards,
            terms,
            cache,
            cache_ttl,
        }
    }

    /// Facet counts over every published card
    pub async fn facets(&self) -> Result<Facets> {
        if let Some(cached) = self.cache.get::<Facets>(FACETS_CACHE_KEY).await.ok().flatten() {
            return Ok(cached);
        }

        let generation = self.cache.generation();
        let facets = self.compute().await?;
        let _ = self
            .cache
            .set_if_current(FACETS_CACHE_KEY, &facets, self.cache_ttl, generation)
            .await;
        Ok(facets)
    }

    async fn compute(&self) -> Result<Facets> {
        let banks = self.terms.counts(Taxonomy::Bank).await?;
        let networks = self.terms.counts(Taxonomy::Network).await?;
        let categories = self.terms.counts(Taxonomy::Category).await?;

        let rating_ranges = rating_ranges();
        let fee_ranges = fee_ranges();
        let income_ranges: Vec<NumericRange> = IncomeRange::ALL.iter().map(|r| r.range()).collect();

        // One aggregate query covers every bucket
        let all_ranges: Vec<NumericRange> = rating_ranges
            .iter()
            .chain(&fee_ranges)
            .chain(&income_ranges)
            .copied()
            .collect();
        let counts = self.cards.count_in_ranges(&all_ranges).await?;
        let (rating_counts, rest) = counts.split_at(rating_ranges.len().min(counts.len()));
        let (fee_counts, income_counts) = rest.split_at(fee_ranges.len().min(rest.len()));

        let rating_buckets = RATING_THRESHOLDS
            .iter()
            .zip(rating_counts)
            .map(|(&min, &count)| RatingBucket {
                min,
                label: format!("{}+ Stars", min),
                count,
            })
            .collect();

        let fee_buckets = FEE_THRESHOLDS
            .iter()
            .zip(fee_counts)
            .map(|(&max, &count)| FeeBucket {
                max,
                label: fee_label(max),
                count,
            })
            .collect();

        let income_buckets = IncomeRange::ALL
            .iter()
            .zip(income_counts)
            .map(|(range, &count)| {
                let (min, max) = range.bounds();
                IncomeBucket {
                    key: range.as_str().to_string(),
                    label: income_label(*range),
                    min,
                    max,
                    count,
                }
            })
            .collect();

        tracing::debug!(
            "Computed facets: {} banks, {} networks, {} categories",
            banks.len(),
            networks.len(),
            categories.len()
        );

        Ok(Facets {
            banks,
            networks,
            categories,
            rating_buckets,
            fee_buckets,
            income_buckets,
        })
    }
}

fn rating_ranges() -> Vec<NumericRange> {
    RATING_THRESHOLDS
        .iter()
        .map(|&min| NumericRange::at_least(RangeColumn::Rating, f64::from(min)))
        .collect()
}

fn fee_ranges() -> Vec<NumericRange> {
    FEE_THRESHOLDS
        .iter()
        .map(|&max| NumericRange::at_most(RangeColumn::AnnualFee, max as f64))
        .collect()
}

fn fee_label(max: i64) -> String {
    if max == 0 {
        format_currency("0", true)
    } else {
        format!("Up to {}", format_currency(&max.to_string(), false))
    }
}

fn income_label(range: IncomeRange) -> String {
    let (min, max) = range.bounds();
    let min = format_currency(&min.to_string(), false);
    let max = format_currency(&max.to_string(), false);
    match range {
        IncomeRange::Low => format!("Below {}", max),
        IncomeRange::Medium => format!("{} - {}", min, max),
        IncomeRange::High => format!("{}+", min),
    }
}
