//! Catalog query model
//!
//! Typed form of a catalog search: filters, ordering and pagination. Built
//! from raw request parameters by `services::search` and compiled to SQL by
//! the card repository.

use serde::{Deserialize, Serialize};

/// Hard upper bound for page sizes, whatever the configuration says
pub const MAX_PER_PAGE: u32 = 100;

/// Pagination parameters for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl ListParams {
    /// Create new pagination parameters
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Calculate the offset for database queries
    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.per_page)
    }

    /// Get the limit for database queries
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }
}

/// One page of search results with its paging metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of matches across all pages
    pub total: i64,
    /// ceil(total / per_page)
    pub page_count: u32,
    /// Current page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl<T> SearchPage<T> {
    /// Create a new result page
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page_count: page_count(total, params.per_page),
            page: params.page,
            per_page: params.per_page,
        }
    }

    /// Map the items, keeping the paging metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> SearchPage<U> {
        SearchPage {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page_count: self.page_count,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

/// Number of pages needed for `total` items
pub fn page_count(total: i64, per_page: u32) -> u32 {
    if per_page == 0 || total <= 0 {
        return 0;
    }
    let per_page = i64::from(per_page);
    u32::try_from((total + per_page - 1) / per_page).unwrap_or(u32::MAX)
}

/// Sort key requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortKey {
    /// Featured first, then rating, review count, recency
    #[default]
    Default,
    Rating,
    AnnualFee,
    ReviewCount,
}

impl SortKey {
    /// Parse the external name; unknown names yield `None`
    pub fn from_param(s: &str) -> Option<Self> {
        match s.trim() {
            "default" => Some(SortKey::Default),
            "rating" => Some(SortKey::Rating),
            "annualFee" | "annual_fee" => Some(SortKey::AnnualFee),
            "reviewCount" | "review_count" => Some(SortKey::ReviewCount),
            _ => None,
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Parse `asc`/`desc` in any case
    pub fn from_param(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Requested ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CardSort {
    pub key: SortKey,
    pub order: SortOrder,
}

/// Numeric card columns usable in range filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeColumn {
    Rating,
    AnnualFee,
    MinIncome,
}

impl RangeColumn {
    pub fn column(&self) -> &'static str {
        match self {
            RangeColumn::Rating => "c.rating",
            RangeColumn::AnnualFee => "c.annual_fee_numeric",
            RangeColumn::MinIncome => "c.min_income_numeric",
        }
    }
}

/// A range over one numeric column. The lower bound is always inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    pub column: RangeColumn,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub max_inclusive: bool,
}

impl NumericRange {
    /// `column >= min`
    pub fn at_least(column: RangeColumn, min: f64) -> Self {
        Self {
            column,
            min: Some(min),
            max: None,
            max_inclusive: true,
        }
    }

    /// `column <= max`
    pub fn at_most(column: RangeColumn, max: f64) -> Self {
        Self {
            column,
            min: None,
            max: Some(max),
            max_inclusive: true,
        }
    }

    /// Whether a value falls inside the range
    pub fn contains(&self, value: f64) -> bool {
        let above_min = self.min.map_or(true, |min| value >= min);
        let below_max = match self.max {
            Some(max) if self.max_inclusive => value <= max,
            Some(max) => value < max,
            None => true,
        };
        above_min && below_max
    }
}

/// Minimum income brackets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncomeRange {
    Low,
    Medium,
    High,
}

impl IncomeRange {
    pub const ALL: [IncomeRange; 3] = [IncomeRange::Low, IncomeRange::Medium, IncomeRange::High];

    pub fn from_param(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(IncomeRange::Low),
            "medium" => Some(IncomeRange::Medium),
            "high" => Some(IncomeRange::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IncomeRange::Low => "low",
            IncomeRange::Medium => "medium",
            IncomeRange::High => "high",
        }
    }

    /// Bracket bounds: low [0, 300000), medium [300000, 1000000), high [1000000, 9999999]
    pub fn bounds(&self) -> (i64, i64) {
        match self {
            IncomeRange::Low => (0, 300_000),
            IncomeRange::Medium => (300_000, 1_000_000),
            IncomeRange::High => (1_000_000, 9_999_999),
        }
    }

    pub fn range(&self) -> NumericRange {
        let (min, max) = self.bounds();
        NumericRange {
            column: RangeColumn::MinIncome,
            min: Some(min as f64),
            max: Some(max as f64),
            max_inclusive: matches!(self, IncomeRange::High),
        }
    }
}

/// A fully parsed catalog search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardQuery {
    /// Substring matched against title, content and excerpt
    pub search: Option<String>,
    /// Bank slugs (any of)
    pub banks: Vec<String>,
    /// Network slugs (any of)
    pub networks: Vec<String>,
    /// Category slugs (any of, descendants included)
    pub categories: Vec<String>,
    /// Numeric range filters, all must hold
    pub ranges: Vec<NumericRange>,
    pub featured: Option<bool>,
    pub trending: Option<bool>,
    pub sort: CardSort,
    pub page: ListParams,
    /// Set when a filter value could not be parsed; the query then matches nothing
    pub match_none: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_list_params_clamp() {
        let params = ListParams::new(0, 0);
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 1);

        let params = ListParams::new(3, 500);
        assert_eq!(params.per_page, MAX_PER_PAGE);
        assert_eq!(params.offset(), 200);
        assert_eq!(params.limit(), 100);
    }

    #[test]
    fn test_offset_does_not_overflow() {
        let params = ListParams::new(u32::MAX, 100);
        assert_eq!(params.offset(), (i64::from(u32::MAX) - 1) * 100);
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 10), 0);
        assert_eq!(page_count(1, 10), 1);
        assert_eq!(page_count(10, 10), 1);
        assert_eq!(page_count(11, 10), 2);
        assert_eq!(page_count(5, 0), 0);
    }

    #[test]
    fn test_sort_params() {
        assert_eq!(SortKey::from_param("annualFee"), Some(SortKey::AnnualFee));
        assert_eq!(SortKey::from_param("reviewCount"), Some(SortKey::ReviewCount));
        assert_eq!(SortKey::from_param("popularity"), None);
        assert_eq!(SortOrder::from_param("ASC"), Some(SortOrder::Asc));
        assert_eq!(SortOrder::from_param("sideways"), None);
        assert_eq!(CardSort::default().order, SortOrder::Desc);
    }

    #[test]
    fn test_income_ranges() {
        let low = IncomeRange::Low.range();
        assert!(low.contains(0.0));
        assert!(low.contains(299_999.0));
        assert!(!low.contains(300_000.0));

        let medium = IncomeRange::Medium.range();
        assert!(medium.contains(300_000.0));
        assert!(!medium.contains(1_000_000.0));

        let high = IncomeRange::High.range();
        assert!(high.contains(1_000_000.0));
        assert!(high.contains(9_999_999.0));
        assert!(!high.contains(10_000_000.0));
    }

    proptest! {
        /// Every non-negative income below the top bound falls in exactly one bracket.
        #[test]
        fn income_brackets_partition(value in 0i64..=9_999_999) {
            let hits = IncomeRange::ALL
                .iter()
                .filter(|r| r.range().contains(value as f64))
                .count();
            prop_assert_eq!(hits, 1);
        }

        /// Pages of size `per_page` cover `total` exactly.
        #[test]
        fn page_count_covers_total(total in 0i64..100_000, per_page in 1u32..=100) {
            let pages = i64::from(page_count(total, per_page));
            prop_assert!(pages * i64::from(per_page) >= total);
            prop_assert!((pages - 1).max(0) * i64::from(per_page) < total.max(1));
        }
    }
}
