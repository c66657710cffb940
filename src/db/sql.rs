//! SQL compilation for catalog queries
//!
//! Turns a `CardQuery` into a parameterized WHERE clause and an ORDER BY
//! clause. The generated SQL uses `?` placeholders, which both SQLite and
//! MySQL accept, so one builder serves both drivers; only binding differs.

use sqlx::mysql::MySqlArguments;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{MySql, Sqlite};

use crate::models::{CardQuery, CardSort, NumericRange, SortKey, Taxonomy};

/// A bound query parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// WHERE clause under construction. Conditions are ANDed.
#[derive(Debug, Default)]
pub struct WhereClause {
    conditions: Vec<String>,
    params: Vec<SqlValue>,
}

impl WhereClause {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition with its parameters, in placeholder order
    pub fn push(&mut self, condition: impl Into<String>, params: impl IntoIterator<Item = SqlValue>) {
        self.conditions.push(condition.into());
        self.params.extend(params);
    }

    /// `WHERE a AND b ...`, or an empty string without conditions
    pub fn sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }
}

/// Comma-separated `?` placeholders
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Escape LIKE wildcards; pair with `ESCAPE '!'`
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '!') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped
}

/// Append the condition for one numeric range
pub fn push_range(clause: &mut WhereClause, range: &NumericRange) {
    let column = range.column.column();
    if let Some(min) = range.min {
        clause.push(format!("{} >= ?", column), [SqlValue::Float(min)]);
    }
    if let Some(max) = range.max {
        let op = if range.max_inclusive { "<=" } else { "<" };
        clause.push(format!("{} {} ?", column, op), [SqlValue::Float(max)]);
    }
}

/// SQL condition (and its parameters) for a range, used inside aggregates
pub fn range_condition(range: &NumericRange) -> (String, Vec<SqlValue>) {
    let mut clause = WhereClause::new();
    push_range(&mut clause, range);
    if clause.conditions.is_empty() {
        ("1 = 1".to_string(), Vec::new())
    } else {
        (clause.conditions.join(" AND "), clause.params)
    }
}

/// Build the WHERE clause for a catalog search over `cards c`.
///
/// Only published cards match. Slugs within one taxonomy are ORed, every
/// other condition is ANDed.
pub fn card_filter(query: &CardQuery) -> WhereClause {
    let mut clause = WhereClause::new();
    clause.push("c.status = ?", [SqlValue::Text("published".to_string())]);

    if query.match_none {
        clause.push("1 = 0", []);
        return clause;
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        clause.push(
            "(c.title LIKE ? ESCAPE '!' OR c.content LIKE ? ESCAPE '!' OR c.excerpt LIKE ? ESCAPE '!')",
            [
                SqlValue::Text(pattern.clone()),
                SqlValue::Text(pattern.clone()),
                SqlValue::Text(pattern),
            ],
        );
    }

    push_taxonomy(&mut clause, Taxonomy::Bank, &query.banks);
    push_taxonomy(&mut clause, Taxonomy::Network, &query.networks);
    push_taxonomy(&mut clause, Taxonomy::Category, &query.categories);

    for range in &query.ranges {
        push_range(&mut clause, range);
    }

    if let Some(featured) = query.featured {
        clause.push("c.featured = ?", [SqlValue::Bool(featured)]);
    }
    if let Some(trending) = query.trending {
        clause.push("c.trending = ?", [SqlValue::Bool(trending)]);
    }

    clause
}

/// Card must carry at least one of `slugs` in `taxonomy`.
/// Hierarchical taxonomies also match every descendant of the given terms.
fn push_taxonomy(clause: &mut WhereClause, taxonomy: Taxonomy, slugs: &[String]) {
    if slugs.is_empty() {
        return;
    }

    let mut params = vec![SqlValue::Text(taxonomy.as_str().to_string())];
    params.extend(slugs.iter().map(|s| SqlValue::Text(s.clone())));

    let condition = if taxonomy.is_hierarchical() {
        // UNION drops revisited ids, so a parent cycle cannot recurse forever
        format!(
            "c.id IN (SELECT ct.card_id FROM card_terms ct WHERE ct.term_id IN (\
             WITH RECURSIVE subtree(id) AS (\
             SELECT t.id FROM terms t WHERE t.taxonomy = ? AND t.slug IN ({}) \
             UNION SELECT child.id FROM terms child INNER JOIN subtree s ON child.parent_id = s.id\
             ) SELECT id FROM subtree))",
            placeholders(slugs.len())
        )
    } else {
        format!(
            "c.id IN (SELECT ct.card_id FROM card_terms ct \
             INNER JOIN terms t ON t.id = ct.term_id \
             WHERE t.taxonomy = ? AND t.slug IN ({}))",
            placeholders(slugs.len())
        )
    };

    clause.push(condition, params);
}

/// ORDER BY clause. Every ordering ends with `c.id ASC` so it is total.
pub fn card_order(sort: &CardSort) -> String {
    let primary = match sort.key {
        SortKey::Default => {
            return "ORDER BY c.featured DESC, c.rating DESC, c.review_count DESC, c.created_at DESC, c.id ASC"
                .to_string();
        }
        SortKey::Rating => "c.rating",
        SortKey::AnnualFee => "c.annual_fee_numeric",
        SortKey::ReviewCount => "c.review_count",
    };
    format!("ORDER BY {} {}, c.id ASC", primary, sort.order.as_sql())
}

/// Bind parameters to a SQLite query, in order
pub fn bind_sqlite<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlValue::Text(v) => query.bind(v.as_str()),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Float(v) => query.bind(*v),
            SqlValue::Bool(v) => query.bind(*v),
        };
    }
    query
}

/// Bind parameters to a MySQL query, in order
pub fn bind_mysql<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            SqlValue::Text(v) => query.bind(v.as_str()),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Float(v) => query.bind(*v),
            SqlValue::Bool(v) => query.bind(*v),
        };
    }
    query
}
