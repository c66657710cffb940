//! Catalog search parameters
//!
//! Raw query-string values arrive as strings and are parsed here into a
//! typed `CardQuery`. Parsing never fails: unusable paging values fall back
//! to defaults, unknown sort or income values are ignored, and a malformed
//! numeric or boolean filter turns the query into one that matches nothing.

use serde::Deserialize;

use super::schema::parse_flag;
use crate::config::CatalogConfig;
use crate::models::{
    CardQuery, CardSort, IncomeRange, ListParams, NumericRange, RangeColumn, SortKey, SortOrder,
    MAX_PER_PAGE,
};

/// Query parameters of a catalog search, as received
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchParams {
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub search: Option<String>,
    /// Comma-separated bank slugs
    pub bank: Option<String>,
    /// Comma-separated network slugs
    pub network: Option<String>,
    /// Comma-separated category slugs
    pub category: Option<String>,
    pub min_rating: Option<String>,
    pub max_annual_fee: Option<String>,
    pub featured: Option<String>,
    pub trending: Option<String>,
    pub min_income_range: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl SearchParams {
    /// Collect decoded query-string pairs.
    ///
    /// Repeated `bank`, `network` or `category` keys are joined as one
    /// comma-separated list; for every other key the last value wins.
    /// Unknown keys are ignored.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut params = SearchParams::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "bank" => {
                    append_list(&mut params.bank, value);
                    continue;
                }
                "network" => {
                    append_list(&mut params.network, value);
                    continue;
                }
                "category" => {
                    append_list(&mut params.category, value);
                    continue;
                }
                "page" => &mut params.page,
                "perPage" => &mut params.per_page,
                "search" => &mut params.search,
                "minRating" => &mut params.min_rating,
                "maxAnnualFee" => &mut params.max_annual_fee,
                "featured" => &mut params.featured,
                "trending" => &mut params.trending,
                "minIncomeRange" => &mut params.min_income_range,
                "sortBy" => &mut params.sort_by,
                "sortOrder" => &mut params.sort_order,
                _ => continue,
            };
            *slot = Some(value);
        }
        params
    }
}

fn append_list(slot: &mut Option<String>, value: String) {
    match slot {
        Some(existing) => {
            existing.push(',');
            existing.push_str(&value);
        }
        None => *slot = Some(value),
    }
}

/// Outcome of parsing one optional filter value
enum Parsed<T> {
    Absent,
    Value(T),
    Malformed,
}

impl<T> Parsed<T> {
    fn from_raw(raw: Option<&str>, parse: impl FnOnce(&str) -> Option<T>) -> Self {
        match present(raw) {
            None => Parsed::Absent,
            Some(value) => match parse(value) {
                Some(parsed) => Parsed::Value(parsed),
                None => Parsed::Malformed,
            },
        }
    }
}

/// Build the typed query for `params`
pub fn build_query(params: &SearchParams, catalog: &CatalogConfig) -> CardQuery {
    let mut query = CardQuery {
        search: present(params.search.as_deref()).map(str::to_string),
        banks: split_slugs(params.bank.as_deref()),
        networks: split_slugs(params.network.as_deref()),
        categories: split_slugs(params.category.as_deref()),
        sort: parse_sort(params),
        page: parse_paging(params, catalog),
        ..CardQuery::default()
    };

    let mut malformed: Vec<&'static str> = Vec::new();

    match Parsed::from_raw(params.min_rating.as_deref(), parse_finite) {
        Parsed::Absent => {}
        Parsed::Value(min) => query.ranges.push(NumericRange::at_least(RangeColumn::Rating, min)),
        Parsed::Malformed => malformed.push("minRating"),
    }

    match Parsed::from_raw(params.max_annual_fee.as_deref(), parse_finite) {
        Parsed::Absent => {}
        Parsed::Value(max) => query.ranges.push(NumericRange::at_most(RangeColumn::AnnualFee, max)),
        Parsed::Malformed => malformed.push("maxAnnualFee"),
    }

    match Parsed::from_raw(params.featured.as_deref(), parse_flag) {
        Parsed::Absent => {}
        Parsed::Value(flag) => query.featured = Some(flag),
        Parsed::Malformed => malformed.push("featured"),
    }

    match Parsed::from_raw(params.trending.as_deref(), parse_flag) {
        Parsed::Absent => {}
        Parsed::Value(flag) => query.trending = Some(flag),
        Parsed::Malformed => malformed.push("trending"),
    }

    if let Some(income) = present(params.min_income_range.as_deref()).and_then(IncomeRange::from_param) {
        query.ranges.push(income.range());
    }

    if !malformed.is_empty() {
        query.match_none = true;
        tracing::debug!("Malformed filter parameter(s) {:?}, search matches nothing", malformed);
    }

    query
}

/// Trimmed, non-empty value
fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_finite(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Comma-separated slugs; empty tokens are ignored
fn split_slugs(raw: Option<&str>) -> Vec<String> {
    let mut slugs: Vec<String> = Vec::new();
    for token in raw.unwrap_or_default().split(',') {
        let slug = token.trim().to_lowercase();
        if !slug.is_empty() && !slugs.contains(&slug) {
            slugs.push(slug);
        }
    }
    slugs
}

fn parse_sort(params: &SearchParams) -> CardSort {
    let key = present(params.sort_by.as_deref())
        .and_then(SortKey::from_param)
        .unwrap_or_default();
    let order = present(params.sort_order.as_deref())
        .and_then(SortOrder::from_param)
        .unwrap_or_default();
    CardSort { key, order }
}

fn parse_paging(params: &SearchParams, catalog: &CatalogConfig) -> ListParams {
    let max_per_page = catalog.max_per_page.clamp(1, MAX_PER_PAGE);
    let default_per_page = catalog.default_per_page.clamp(1, max_per_page);

    let page = parse_positive(params.page.as_deref()).unwrap_or(1);
    let per_page = parse_positive(params.per_page.as_deref())
        .map_or(default_per_page, |n| n.min(max_per_page));

    ListParams::new(page, per_page)
}

/// Positive integer; anything else is `None`
fn parse_positive(raw: Option<&str>) -> Option<u32> {
    let value: i64 = present(raw)?.parse().ok()?;
    if value <= 0 {
        return None;
    }
    Some(u32::try_from(value).unwrap_or(u32::MAX))
}
