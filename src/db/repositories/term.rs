//! Term repository
//!
//! Database operations for taxonomy terms (banks, networks, categories).
//!
//! This module provides:
//! - `TermRepository` trait defining the interface for term data access
//! - `SqlxTermRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::sql::placeholders;
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::{Taxonomy, Term, TermCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Term repository trait
#[async_trait]
pub trait TermRepository: Send + Sync {
    /// Create a new term
    async fn create(
        &self,
        taxonomy: Taxonomy,
        slug: &str,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<Term>;

    /// Get term by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Term>>;

    /// Get term by slug within a taxonomy
    async fn get_by_slug(&self, taxonomy: Taxonomy, slug: &str) -> Result<Option<Term>>;

    /// List all terms of a taxonomy, ordered by name
    async fn list(&self, taxonomy: Taxonomy) -> Result<Vec<Term>>;

    /// Rename a term and move it under another parent
    async fn update(&self, id: i64, name: &str, parent_id: Option<i64>) -> Result<Term>;

    /// Terms referenced by at least one published card, with the number of
    /// distinct published cards for each
    async fn counts(&self, taxonomy: Taxonomy) -> Result<Vec<TermCount>>;

    /// Terms assigned to the given cards as `(card_id, term)`, in assignment order
    async fn list_for_cards(&self, card_ids: &[i64]) -> Result<Vec<(i64, Term)>>;
}

/// SQLx-based term repository implementation
pub struct SqlxTermRepository {
    pool: DynDatabasePool,
}

impl SqlxTermRepository {
    /// Create a new SQLx term repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TermRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TermRepository for SqlxTermRepository {
    async fn create(
        &self,
        taxonomy: Taxonomy,
        slug: &str,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<Term> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_term_sqlite(sqlite_pool(&self.pool)?, taxonomy, slug, name, parent_id).await
            }
            DatabaseDriver::Mysql => {
                create_term_mysql(mysql_pool(&self.pool)?, taxonomy, slug, name, parent_id).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Term>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_term_by_id_sqlite(sqlite_pool(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_term_by_id_mysql(mysql_pool(&self.pool)?, id).await,
        }
    }

    async fn get_by_slug(&self, taxonomy: Taxonomy, slug: &str) -> Result<Option<Term>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_term_by_slug_sqlite(sqlite_pool(&self.pool)?, taxonomy, slug).await
            }
            DatabaseDriver::Mysql => {
                get_term_by_slug_mysql(mysql_pool(&self.pool)?, taxonomy, slug).await
            }
        }
    }

    async fn list(&self, taxonomy: Taxonomy) -> Result<Vec<Term>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_terms_sqlite(sqlite_pool(&self.pool)?, taxonomy).await,
            DatabaseDriver::Mysql => list_terms_mysql(mysql_pool(&self.pool)?, taxonomy).await,
        }
    }

    async fn update(&self, id: i64, name: &str, parent_id: Option<i64>) -> Result<Term> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = sqlite_pool(&self.pool)?;
                sqlx::query("UPDATE terms SET name = ?, parent_id = ? WHERE id = ?")
                    .bind(name)
                    .bind(parent_id)
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to update term")?;
                get_term_by_id_sqlite(pool, id)
                    .await?
                    .with_context(|| format!("Term {} disappeared during update", id))
            }
            DatabaseDriver::Mysql => {
                let pool = mysql_pool(&self.pool)?;
                sqlx::query("UPDATE terms SET name = ?, parent_id = ? WHERE id = ?")
                    .bind(name)
                    .bind(parent_id)
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to update term")?;
                get_term_by_id_mysql(pool, id)
                    .await?
                    .with_context(|| format!("Term {} disappeared during update", id))
            }
        }
    }

    async fn counts(&self, taxonomy: Taxonomy) -> Result<Vec<TermCount>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => term_counts_sqlite(sqlite_pool(&self.pool)?, taxonomy).await,
            DatabaseDriver::Mysql => term_counts_mysql(mysql_pool(&self.pool)?, taxonomy).await,
        }
    }

    async fn list_for_cards(&self, card_ids: &[i64]) -> Result<Vec<(i64, Term)>> {
        if card_ids.is_empty() {
            return Ok(Vec::new());
        }
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                terms_for_cards_sqlite(sqlite_pool(&self.pool)?, card_ids).await
            }
            DatabaseDriver::Mysql => terms_for_cards_mysql(mysql_pool(&self.pool)?, card_ids).await,
        }
    }
}

const TERM_COLUMNS: &str = "id, taxonomy, slug, name, parent_id, created_at";

const COUNTS_SQL: &str = r#"
    SELECT t.slug, t.name, p.slug AS parent_slug, COUNT(DISTINCT c.id) AS card_count
    FROM terms t
    INNER JOIN card_terms ct ON ct.term_id = t.id
    INNER JOIN cards c ON c.id = ct.card_id AND c.status = 'published'
    LEFT JOIN terms p ON p.id = t.parent_id
    WHERE t.taxonomy = ?
    GROUP BY t.id, t.slug, t.name, p.slug
    ORDER BY t.name ASC, t.slug ASC
"#;

fn cards_terms_sql(count: usize) -> String {
    format!(
        "SELECT ct.card_id, t.id, t.taxonomy, t.slug, t.name, t.parent_id, t.created_at \
         FROM card_terms ct INNER JOIN terms t ON t.id = ct.term_id \
         WHERE ct.card_id IN ({}) \
         ORDER BY ct.card_id ASC, ct.position ASC, t.id ASC",
        placeholders(count)
    )
}

fn parse_taxonomy(raw: &str) -> Result<Taxonomy> {
    Taxonomy::from_str(raw).with_context(|| format!("Unknown taxonomy in terms table: {}", raw))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_term_sqlite(
    pool: &SqlitePool,
    taxonomy: Taxonomy,
    slug: &str,
    name: &str,
    parent_id: Option<i64>,
) -> Result<Term> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO terms (taxonomy, slug, name, parent_id, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(taxonomy.as_str())
    .bind(slug)
    .bind(name)
    .bind(parent_id)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create term")?;

    Ok(Term {
        id: result.last_insert_rowid(),
        taxonomy,
        slug: slug.to_string(),
        name: name.to_string(),
        parent_id,
        created_at: now,
    })
}

async fn get_term_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Term>> {
    let row = sqlx::query(&format!("SELECT {} FROM terms WHERE id = ?", TERM_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get term by ID")?;

    row.as_ref().map(row_to_term_sqlite).transpose()
}

async fn get_term_by_slug_sqlite(
    pool: &SqlitePool,
    taxonomy: Taxonomy,
    slug: &str,
) -> Result<Option<Term>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM terms WHERE taxonomy = ? AND slug = ?",
        TERM_COLUMNS
    ))
    .bind(taxonomy.as_str())
    .bind(slug)
    .fetch_optional(pool)
    .await
    .context("Failed to get term by slug")?;

    row.as_ref().map(row_to_term_sqlite).transpose()
}

async fn list_terms_sqlite(pool: &SqlitePool, taxonomy: Taxonomy) -> Result<Vec<Term>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM terms WHERE taxonomy = ? ORDER BY name ASC, slug ASC",
        TERM_COLUMNS
    ))
    .bind(taxonomy.as_str())
    .fetch_all(pool)
    .await
    .context("Failed to list terms")?;

    rows.iter().map(row_to_term_sqlite).collect()
}

async fn term_counts_sqlite(pool: &SqlitePool, taxonomy: Taxonomy) -> Result<Vec<TermCount>> {
    let rows = sqlx::query(COUNTS_SQL)
        .bind(taxonomy.as_str())
        .fetch_all(pool)
        .await
        .context("Failed to count terms")?;

    Ok(rows
        .iter()
        .map(|row| TermCount {
            slug: row.get("slug"),
            name: row.get("name"),
            count: row.get("card_count"),
            parent: row.get("parent_slug"),
        })
        .collect())
}

async fn terms_for_cards_sqlite(pool: &SqlitePool, card_ids: &[i64]) -> Result<Vec<(i64, Term)>> {
    let sql = cards_terms_sql(card_ids.len());
    let mut query = sqlx::query(&sql);
    for id in card_ids {
        query = query.bind(*id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to load card terms")?;

    rows.iter()
        .map(|row| Ok((row.get("card_id"), row_to_term_sqlite(row)?)))
        .collect()
}

fn row_to_term_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Term> {
    let taxonomy: String = row.get("taxonomy");
    Ok(Term {
        id: row.get("id"),
        taxonomy: parse_taxonomy(&taxonomy)?,
        slug: row.get("slug"),
        name: row.get("name"),
        parent_id: row.get("parent_id"),
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_term_mysql(
    pool: &MySqlPool,
    taxonomy: Taxonomy,
    slug: &str,
    name: &str,
    parent_id: Option<i64>,
) -> Result<Term> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO terms (taxonomy, slug, name, parent_id, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(taxonomy.as_str())
    .bind(slug)
    .bind(name)
    .bind(parent_id)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create term")?;

    Ok(Term {
        id: result.last_insert_id() as i64,
        taxonomy,
        slug: slug.to_string(),
        name: name.to_string(),
        parent_id,
        created_at: now,
    })
}

async fn get_term_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Term>> {
    let row = sqlx::query(&format!("SELECT {} FROM terms WHERE id = ?", TERM_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get term by ID")?;

    row.as_ref().map(row_to_term_mysql).transpose()
}

async fn get_term_by_slug_mysql(
    pool: &MySqlPool,
    taxonomy: Taxonomy,
    slug: &str,
) -> Result<Option<Term>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM terms WHERE taxonomy = ? AND slug = ?",
        TERM_COLUMNS
    ))
    .bind(taxonomy.as_str())
    .bind(slug)
    .fetch_optional(pool)
    .await
    .context("Failed to get term by slug")?;

    row.as_ref().map(row_to_term_mysql).transpose()
}

async fn list_terms_mysql(pool: &MySqlPool, taxonomy: Taxonomy) -> Result<Vec<Term>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM terms WHERE taxonomy = ? ORDER BY name ASC, slug ASC",
        TERM_COLUMNS
    ))
    .bind(taxonomy.as_str())
    .fetch_all(pool)
    .await
    .context("Failed to list terms")?;

    rows.iter().map(row_to_term_mysql).collect()
}

async fn term_counts_mysql(pool: &MySqlPool, taxonomy: Taxonomy) -> Result<Vec<TermCount>> {
    let rows = sqlx::query(COUNTS_SQL)
        .bind(taxonomy.as_str())
        .fetch_all(pool)
        .await
        .context("Failed to count terms")?;

    Ok(rows
        .iter()
        .map(|row| TermCount {
            slug: row.get("slug"),
            name: row.get("name"),
            count: row.get("card_count"),
            parent: row.get("parent_slug"),
        })
        .collect())
}

async fn terms_for_cards_mysql(pool: &MySqlPool, card_ids: &[i64]) -> Result<Vec<(i64, Term)>> {
    let sql = cards_terms_sql(card_ids.len());
    let mut query = sqlx::query(&sql);
    for id in card_ids {
        query = query.bind(*id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to load card terms")?;

    rows.iter()
        .map(|row| Ok((row.get("card_id"), row_to_term_mysql(row)?)))
        .collect()
}

fn row_to_term_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Term> {
    let taxonomy: String = row.get("taxonomy");
    Ok(Term {
        id: row.get("id"),
        taxonomy: parse_taxonomy(&taxonomy)?,
        slug: row.get("slug"),
        name: row.get("name"),
        parent_id: row.get("parent_id"),
        created_at: row.get("created_at"),
    })
}
