//! Card repository
//!
//! Database operations for cards and their term assignments.
//!
//! This module provides:
//! - `CardRepository` trait defining the interface for card data access
//! - `SqlxCardRepository` implementing the trait for SQLite and MySQL
//!
//! List-valued fields are stored as JSON text columns. Decoding is lenient:
//! a malformed column reads back as an empty list.

use crate::config::DatabaseDriver;
use crate::db::sql::{bind_mysql, bind_sqlite, card_filter, card_order, range_condition, SqlValue};
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::{Card, CardInput, CardQuery, CardStatus, NumericRange};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Card repository trait
#[async_trait]
pub trait CardRepository: Send + Sync {
    /// Insert a card and its ordered term assignments
    async fn create(&self, input: &CardInput, term_ids: &[i64]) -> Result<Card>;

    /// Overwrite a card and replace its term assignments
    async fn update(&self, id: i64, input: &CardInput, term_ids: &[i64]) -> Result<Card>;

    /// Get card by ID, whatever its status
    async fn get_by_id(&self, id: i64) -> Result<Option<Card>>;

    /// Get card by slug, whatever its status
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Card>>;

    /// Whether another card already uses `slug`
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// One page of published cards matching the query, in query order
    async fn search(&self, query: &CardQuery) -> Result<Vec<Card>>;

    /// Number of published cards matching the query, ignoring pagination
    async fn count(&self, query: &CardQuery) -> Result<i64>;

    /// Published card counts for each range, in the order given
    async fn count_in_ranges(&self, ranges: &[NumericRange]) -> Result<Vec<i64>>;
}

/// SQLx-based card repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxCardRepository {
    pool: DynDatabasePool,
}

impl SqlxCardRepository {
    /// Create a new SQLx card repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CardRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CardRepository for SqlxCardRepository {
    async fn create(&self, input: &CardInput, term_ids: &[i64]) -> Result<Card> {
        let lists = EncodedLists::encode(input)?;
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_card_sqlite(sqlite_pool(&self.pool)?, input, &lists, term_ids).await?
            }
            DatabaseDriver::Mysql => {
                create_card_mysql(mysql_pool(&self.pool)?, input, &lists, term_ids).await?
            }
        };
        self.get_by_id(id)
            .await?
            .with_context(|| format!("Card {} missing right after insert", id))
    }

    async fn update(&self, id: i64, input: &CardInput, term_ids: &[i64]) -> Result<Card> {
        let lists = EncodedLists::encode(input)?;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_card_sqlite(sqlite_pool(&self.pool)?, id, input, &lists, term_ids).await?
            }
            DatabaseDriver::Mysql => {
                update_card_mysql(mysql_pool(&self.pool)?, id, input, &lists, term_ids).await?
            }
        }
        self.get_by_id(id)
            .await?
            .with_context(|| format!("Card {} missing right after update", id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Card>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&format!("SELECT {} FROM cards c WHERE c.id = ?", *SELECT_COLUMNS))
                    .bind(id)
                    .fetch_optional(sqlite_pool(&self.pool)?)
                    .await
                    .context("Failed to get card by ID")?;
                row.as_ref().map(row_to_card_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&format!("SELECT {} FROM cards c WHERE c.id = ?", *SELECT_COLUMNS))
                    .bind(id)
                    .fetch_optional(mysql_pool(&self.pool)?)
                    .await
                    .context("Failed to get card by ID")?;
                row.as_ref().map(row_to_card_mysql).transpose()
            }
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Card>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&format!("SELECT {} FROM cards c WHERE c.slug = ?", *SELECT_COLUMNS))
                    .bind(slug)
                    .fetch_optional(sqlite_pool(&self.pool)?)
                    .await
                    .context("Failed to get card by slug")?;
                row.as_ref().map(row_to_card_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&format!("SELECT {} FROM cards c WHERE c.slug = ?", *SELECT_COLUMNS))
                    .bind(slug)
                    .fetch_optional(mysql_pool(&self.pool)?)
                    .await
                    .context("Failed to get card by slug")?;
                row.as_ref().map(row_to_card_mysql).transpose()
            }
        }
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let sql = "SELECT COUNT(*) AS count FROM cards WHERE slug = ? AND id <> ?";
        // Ids start at 1, so 0 excludes nothing
        let exclude = exclude_id.unwrap_or(0);
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(slug)
                .bind(exclude)
                .fetch_one(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to check card slug")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(slug)
                .bind(exclude)
                .fetch_one(mysql_pool(&self.pool)?)
                .await
                .context("Failed to check card slug")?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn search(&self, query: &CardQuery) -> Result<Vec<Card>> {
        let filter = card_filter(query);
        let sql = format!(
            "SELECT {} FROM cards c {} {} LIMIT ? OFFSET ?",
            *SELECT_COLUMNS,
            filter.sql(),
            card_order(&query.sort)
        );
        let mut params = filter.params().to_vec();
        params.push(SqlValue::Int(query.page.limit()));
        params.push(SqlValue::Int(query.page.offset()));

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = bind_sqlite(sqlx::query(&sql), &params)
                    .fetch_all(sqlite_pool(&self.pool)?)
                    .await
                    .context("Failed to search cards")?;
                rows.iter().map(row_to_card_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = bind_mysql(sqlx::query(&sql), &params)
                    .fetch_all(mysql_pool(&self.pool)?)
                    .await
                    .context("Failed to search cards")?;
                rows.iter().map(row_to_card_mysql).collect()
            }
        }
    }

    async fn count(&self, query: &CardQuery) -> Result<i64> {
        let filter = card_filter(query);
        let sql = format!("SELECT COUNT(*) AS total FROM cards c {}", filter.sql());

        let total: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => bind_sqlite(sqlx::query(&sql), filter.params())
                .fetch_one(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to count cards")?
                .get("total"),
            DatabaseDriver::Mysql => bind_mysql(sqlx::query(&sql), filter.params())
                .fetch_one(mysql_pool(&self.pool)?)
                .await
                .context("Failed to count cards")?
                .get("total"),
        };
        Ok(total)
    }

    async fn count_in_ranges(&self, ranges: &[NumericRange]) -> Result<Vec<i64>> {
        if ranges.is_empty() {
            return Ok(Vec::new());
        }

        let mut selects = Vec::with_capacity(ranges.len());
        let mut params = Vec::new();
        for (i, range) in ranges.iter().enumerate() {
            let (condition, range_params) = range_condition(range);
            selects.push(format!("COUNT(CASE WHEN {} THEN 1 END) AS bucket_{}", condition, i));
            params.extend(range_params);
        }
        params.push(SqlValue::Text(CardStatus::Published.as_str().to_string()));

        let sql = format!("SELECT {} FROM cards c WHERE c.status = ?", selects.join(", "));

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = bind_sqlite(sqlx::query(&sql), &params)
                    .fetch_one(sqlite_pool(&self.pool)?)
                    .await
                    .context("Failed to count range buckets")?;
                Ok((0..ranges.len())
                    .map(|i| row.get(format!("bucket_{}", i).as_str()))
                    .collect())
            }
            DatabaseDriver::Mysql => {
                let row = bind_mysql(sqlx::query(&sql), &params)
                    .fetch_one(mysql_pool(&self.pool)?)
                    .await
                    .context("Failed to count range buckets")?;
                Ok((0..ranges.len())
                    .map(|i| row.get(format!("bucket_{}", i).as_str()))
                    .collect())
            }
        }
    }
}

// ============================================================================
// Column layout
// ============================================================================

/// Writable columns, in bind order
const WRITE_COLUMNS: &[&str] = &[
    "slug",
    "title",
    "excerpt",
    "content",
    "content_html",
    "status",
    "image_url",
    "thumbnail_url",
    "rating",
    "review_count",
    "annual_fee",
    "joining_fee",
    "welcome_bonus",
    "welcome_bonus_points",
    "welcome_bonus_type",
    "cashback_rate",
    "credit_limit",
    "interest_rate",
    "processing_time",
    "min_income",
    "min_age",
    "max_age",
    "apply_link",
    "theme_color",
    "gradient",
    "annual_fee_numeric",
    "min_income_numeric",
    "reward_rate",
    "reward_type",
    "reward_conversion_rate",
    "reward_score",
    "fees_score",
    "benefits_score",
    "support_score",
    "overall_score",
    "pros",
    "cons",
    "best_for",
    "documents",
    "features",
    "rewards",
    "fees",
    "eligibility",
    "custom_faqs",
    "featured",
    "trending",
    "updated_at",
];

static SELECT_COLUMNS: Lazy<String> = Lazy::new(|| {
    std::iter::once("id")
        .chain(WRITE_COLUMNS.iter().copied())
        .chain(std::iter::once("created_at"))
        .map(|col| format!("c.{}", col))
        .collect::<Vec<_>>()
        .join(", ")
});

static INSERT_SQL: Lazy<String> = Lazy::new(|| {
    format!(
        "INSERT INTO cards ({}, created_at) VALUES ({}, ?)",
        WRITE_COLUMNS.join(", "),
        crate::db::sql::placeholders(WRITE_COLUMNS.len())
    )
});

static UPDATE_SQL: Lazy<String> = Lazy::new(|| {
    let assignments: Vec<String> = WRITE_COLUMNS.iter().map(|col| format!("{} = ?", col)).collect();
    format!("UPDATE cards SET {} WHERE id = ?", assignments.join(", "))
});

const INSERT_TERM_SQL: &str = "INSERT INTO card_terms (card_id, term_id, position) VALUES (?, ?, ?)";
const DELETE_TERMS_SQL: &str = "DELETE FROM card_terms WHERE card_id = ?";

/// JSON text of every list column
struct EncodedLists {
    pros: String,
    cons: String,
    best_for: String,
    documents: String,
    features: String,
    rewards: String,
    fees: String,
    eligibility: String,
    custom_faqs: String,
}

impl EncodedLists {
    fn encode(input: &CardInput) -> Result<Self> {
        Ok(Self {
            pros: encode_list(&input.pros)?,
            cons: encode_list(&input.cons)?,
            best_for: encode_list(&input.best_for)?,
            documents: encode_list(&input.documents)?,
            features: encode_list(&input.features)?,
            rewards: encode_list(&input.rewards)?,
            fees: encode_list(&input.fees)?,
            eligibility: encode_list(&input.eligibility)?,
            custom_faqs: encode_list(&input.custom_faqs)?,
        })
    }
}

fn encode_list<T: serde::Serialize>(items: &[T]) -> Result<String> {
    serde_json::to_string(items).context("Failed to encode card list field")
}

fn decode_list<T: serde::de::DeserializeOwned>(raw: Option<String>) -> Vec<T> {
    raw.and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or_default()
}

fn parse_status(raw: &str) -> CardStatus {
    CardStatus::from_str(raw).unwrap_or_default()
}

/// Bind every writable column of `input`, in `WRITE_COLUMNS` order
macro_rules! bind_card_fields {
    ($query:expr, $input:expr, $lists:expr, $now:expr) => {
        $query
            .bind(&$input.slug)
            .bind(&$input.title)
            .bind(&$input.excerpt)
            .bind(&$input.content)
            .bind(&$input.content_html)
            .bind($input.status.as_str())
            .bind(&$input.image_url)
            .bind(&$input.thumbnail_url)
            .bind($input.rating)
            .bind($input.review_count)
            .bind(&$input.annual_fee)
            .bind(&$input.joining_fee)
            .bind(&$input.welcome_bonus)
            .bind($input.welcome_bonus_points)
            .bind(&$input.welcome_bonus_type)
            .bind(&$input.cashback_rate)
            .bind(&$input.credit_limit)
            .bind(&$input.interest_rate)
            .bind(&$input.processing_time)
            .bind(&$input.min_income)
            .bind(&$input.min_age)
            .bind(&$input.max_age)
            .bind(&$input.apply_link)
            .bind(&$input.theme_color)
            .bind(&$input.gradient)
            .bind($input.annual_fee_numeric)
            .bind($input.min_income_numeric)
            .bind($input.reward_rate)
            .bind(&$input.reward_type)
            .bind(&$input.reward_conversion_rate)
            .bind($input.reward_score)
            .bind($input.fees_score)
            .bind($input.benefits_score)
            .bind($input.support_score)
            .bind($input.effective_overall_score())
            .bind(&$lists.pros)
            .bind(&$lists.cons)
            .bind(&$lists.best_for)
            .bind(&$lists.documents)
            .bind(&$lists.features)
            .bind(&$lists.rewards)
            .bind(&$lists.fees)
            .bind(&$lists.eligibility)
            .bind(&$lists.custom_faqs)
            .bind($input.featured)
            .bind($input.trending)
            .bind($now)
    };
}

/// Map a `SELECT_COLUMNS` row onto a `Card`
macro_rules! card_from_row {
    ($row:expr) => {{
        let row = $row;
        let status: String = row.get("status");
        Card {
            id: row.get("id"),
            slug: row.get("slug"),
            title: row.get("title"),
            excerpt: row.get("excerpt"),
            content: row.get("content"),
            content_html: row.get("content_html"),
            status: parse_status(&status),
            image_url: row.get("image_url"),
            thumbnail_url: row.get("thumbnail_url"),
            rating: row.get("rating"),
            review_count: row.get("review_count"),
            annual_fee: row.get("annual_fee"),
            joining_fee: row.get("joining_fee"),
            welcome_bonus: row.get("welcome_bonus"),
            welcome_bonus_points: row.get("welcome_bonus_points"),
            welcome_bonus_type: row.get("welcome_bonus_type"),
            cashback_rate: row.get("cashback_rate"),
            credit_limit: row.get("credit_limit"),
            interest_rate: row.get("interest_rate"),
            processing_time: row.get("processing_time"),
            min_income: row.get("min_income"),
            min_age: row.get("min_age"),
            max_age: row.get("max_age"),
            apply_link: row.get("apply_link"),
            theme_color: row.get("theme_color"),
            gradient: row.get("gradient"),
            annual_fee_numeric: row.get("annual_fee_numeric"),
            min_income_numeric: row.get("min_income_numeric"),
            reward_rate: row.get("reward_rate"),
            reward_type: row.get("reward_type"),
            reward_conversion_rate: row.get("reward_conversion_rate"),
            reward_score: row.get("reward_score"),
            fees_score: row.get("fees_score"),
            benefits_score: row.get("benefits_score"),
            support_score: row.get("support_score"),
            overall_score: row.get("overall_score"),
            pros: decode_list(row.get("pros")),
            cons: decode_list(row.get("cons")),
            best_for: decode_list(row.get("best_for")),
            documents: decode_list(row.get("documents")),
            features: decode_list(row.get("features")),
            rewards: decode_list(row.get("rewards")),
            fees: decode_list(row.get("fees")),
            eligibility: decode_list(row.get("eligibility")),
            custom_faqs: decode_list(row.get("custom_faqs")),
            featured: row.get("featured"),
            trending: row.get("trending"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }};
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_card_sqlite(
    pool: &SqlitePool,
    input: &CardInput,
    lists: &EncodedLists,
    term_ids: &[i64],
) -> Result<i64> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = bind_card_fields!(sqlx::query(INSERT_SQL.as_str()), input, lists, now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create card")?;
    let id = result.last_insert_rowid();

    for (position, term_id) in term_ids.iter().enumerate() {
        sqlx::query(INSERT_TERM_SQL)
            .bind(id)
            .bind(*term_id)
            .bind(position as i64)
            .execute(&mut *tx)
            .await
            .context("Failed to assign card term")?;
    }

    tx.commit().await.context("Failed to commit card insert")?;
    Ok(id)
}

async fn update_card_sqlite(
    pool: &SqlitePool,
    id: i64,
    input: &CardInput,
    lists: &EncodedLists,
    term_ids: &[i64],
) -> Result<()> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    bind_card_fields!(sqlx::query(UPDATE_SQL.as_str()), input, lists, now)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update card")?;

    sqlx::query(DELETE_TERMS_SQL)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear card terms")?;

    for (position, term_id) in term_ids.iter().enumerate() {
        sqlx::query(INSERT_TERM_SQL)
            .bind(id)
            .bind(*term_id)
            .bind(position as i64)
            .execute(&mut *tx)
            .await
            .context("Failed to assign card term")?;
    }

    tx.commit().await.context("Failed to commit card update")?;
    Ok(())
}

fn row_to_card_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Card> {
    Ok(card_from_row!(row))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_card_mysql(
    pool: &MySqlPool,
    input: &CardInput,
    lists: &EncodedLists,
    term_ids: &[i64],
) -> Result<i64> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = bind_card_fields!(sqlx::query(INSERT_SQL.as_str()), input, lists, now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create card")?;
    let id = result.last_insert_id() as i64;

    for (position, term_id) in term_ids.iter().enumerate() {
        sqlx::query(INSERT_TERM_SQL)
            .bind(id)
            .bind(*term_id)
            .bind(position as i64)
            .execute(&mut *tx)
            .await
            .context("Failed to assign card term")?;
    }

    tx.commit().await.context("Failed to commit card insert")?;
    Ok(id)
}

async fn update_card_mysql(
    pool: &MySqlPool,
    id: i64,
    input: &CardInput,
    lists: &EncodedLists,
    term_ids: &[i64],
) -> Result<()> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    bind_card_fields!(sqlx::query(UPDATE_SQL.as_str()), input, lists, now)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update card")?;

    sqlx::query(DELETE_TERMS_SQL)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear card terms")?;

    for (position, term_id) in term_ids.iter().enumerate() {
        sqlx::query(INSERT_TERM_SQL)
            .bind(id)
            .bind(*term_id)
            .bind(position as i64)
            .execute(&mut *tx)
            .await
            .context("Failed to assign card term")?;
    }

    tx.commit().await.context("Failed to commit card update")?;
    Ok(())
}

fn row_to_card_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Card> {
    Ok(card_from_row!(row))
}
