//! Database migrations module
//!
//! Code-based migrations for the card catalog. All migrations are embedded
//! directly in Rust code as SQL strings, with one variant for SQLite and one
//! for MySQL, so the binary carries its own schema.
//!
//! # Usage
//!
//! ```ignore
//! use cardfinder::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use std::collections::BTreeSet;

use super::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::config::DatabaseDriver;

/// One schema step, written once per driver
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i32,
    pub name: &'static str,
    pub up_sqlite: &'static str,
    pub up_mysql: &'static str,
}

/// All catalog migrations, applied in order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_terms",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS terms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                taxonomy VARCHAR(20) NOT NULL,
                slug VARCHAR(100) NOT NULL,
                name VARCHAR(100) NOT NULL,
                parent_id INTEGER,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (taxonomy, slug),
                FOREIGN KEY (parent_id) REFERENCES terms(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_terms_parent_id ON terms(parent_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS terms (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                taxonomy VARCHAR(20) NOT NULL,
                slug VARCHAR(100) NOT NULL,
                name VARCHAR(100) NOT NULL,
                parent_id BIGINT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE KEY uq_terms_taxonomy_slug (taxonomy, slug),
                FOREIGN KEY (parent_id) REFERENCES terms(id) ON DELETE SET NULL
            );
            CREATE INDEX idx_terms_parent_id ON terms(parent_id);
        "#,
    },
    Migration {
        version: 2,
        name: "create_cards",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS cards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug VARCHAR(200) NOT NULL UNIQUE,
                title VARCHAR(255) NOT NULL,
                excerpt TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '',
                content_html TEXT NOT NULL DEFAULT '',
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                image_url VARCHAR(500) NOT NULL DEFAULT '',
                thumbnail_url VARCHAR(500) NOT NULL DEFAULT '',
                rating REAL NOT NULL DEFAULT 0,
                review_count INTEGER NOT NULL DEFAULT 0,
                annual_fee VARCHAR(255) NOT NULL DEFAULT '',
                joining_fee VARCHAR(255) NOT NULL DEFAULT '',
                welcome_bonus VARCHAR(255) NOT NULL DEFAULT '',
                welcome_bonus_points INTEGER NOT NULL DEFAULT 0,
                welcome_bonus_type VARCHAR(255) NOT NULL DEFAULT '',
                cashback_rate VARCHAR(255) NOT NULL DEFAULT '',
                credit_limit VARCHAR(255) NOT NULL DEFAULT '',
                interest_rate VARCHAR(255) NOT NULL DEFAULT '',
                processing_time VARCHAR(255) NOT NULL DEFAULT '',
                min_income VARCHAR(255) NOT NULL DEFAULT '',
                min_age VARCHAR(255) NOT NULL DEFAULT '',
                max_age VARCHAR(255) NOT NULL DEFAULT '',
                apply_link VARCHAR(500) NOT NULL DEFAULT '',
                theme_color VARCHAR(255) NOT NULL DEFAULT '',
                gradient VARCHAR(255) NOT NULL DEFAULT '',
                annual_fee_numeric INTEGER NOT NULL DEFAULT 0,
                min_income_numeric INTEGER NOT NULL DEFAULT 0,
                reward_rate REAL NOT NULL DEFAULT 0,
                reward_type VARCHAR(255) NOT NULL DEFAULT '',
                reward_conversion_rate VARCHAR(255) NOT NULL DEFAULT '',
                reward_score REAL NOT NULL DEFAULT 0,
                fees_score REAL NOT NULL DEFAULT 0,
                benefits_score REAL NOT NULL DEFAULT 0,
                support_score REAL NOT NULL DEFAULT 0,
                overall_score REAL NOT NULL DEFAULT 0,
                pros TEXT NOT NULL DEFAULT '[]',
                cons TEXT NOT NULL DEFAULT '[]',
                best_for TEXT NOT NULL DEFAULT '[]',
                documents TEXT NOT NULL DEFAULT '[]',
                features TEXT NOT NULL DEFAULT '[]',
                rewards TEXT NOT NULL DEFAULT '[]',
                fees TEXT NOT NULL DEFAULT '[]',
                eligibility TEXT NOT NULL DEFAULT '[]',
                custom_faqs TEXT NOT NULL DEFAULT '[]',
                featured BOOLEAN NOT NULL DEFAULT 0,
                trending BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_cards_status ON cards(status);
            CREATE INDEX IF NOT EXISTS idx_cards_rating ON cards(rating);
            CREATE INDEX IF NOT EXISTS idx_cards_review_count ON cards(review_count);
            CREATE INDEX IF NOT EXISTS idx_cards_annual_fee_numeric ON cards(annual_fee_numeric);
            CREATE INDEX IF NOT EXISTS idx_cards_min_income_numeric ON cards(min_income_numeric);
            CREATE INDEX IF NOT EXISTS idx_cards_featured ON cards(featured);
            CREATE INDEX IF NOT EXISTS idx_cards_trending ON cards(trending);
            CREATE INDEX IF NOT EXISTS idx_cards_created_at ON cards(created_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS cards (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                slug VARCHAR(200) NOT NULL UNIQUE,
                title VARCHAR(255) NOT NULL,
                excerpt TEXT NOT NULL,
                content LONGTEXT NOT NULL,
                content_html LONGTEXT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                image_url VARCHAR(500) NOT NULL DEFAULT '',
                thumbnail_url VARCHAR(500) NOT NULL DEFAULT '',
                rating DOUBLE NOT NULL DEFAULT 0,
                review_count BIGINT NOT NULL DEFAULT 0,
                annual_fee VARCHAR(255) NOT NULL DEFAULT '',
                joining_fee VARCHAR(255) NOT NULL DEFAULT '',
                welcome_bonus VARCHAR(255) NOT NULL DEFAULT '',
                welcome_bonus_points BIGINT NOT NULL DEFAULT 0,
                welcome_bonus_type VARCHAR(255) NOT NULL DEFAULT '',
                cashback_rate VARCHAR(255) NOT NULL DEFAULT '',
                credit_limit VARCHAR(255) NOT NULL DEFAULT '',
                interest_rate VARCHAR(255) NOT NULL DEFAULT '',
                processing_time VARCHAR(255) NOT NULL DEFAULT '',
                min_income VARCHAR(255) NOT NULL DEFAULT '',
                min_age VARCHAR(255) NOT NULL DEFAULT '',
                max_age VARCHAR(255) NOT NULL DEFAULT '',
                apply_link VARCHAR(500) NOT NULL DEFAULT '',
                theme_color VARCHAR(255) NOT NULL DEFAULT '',
                gradient VARCHAR(255) NOT NULL DEFAULT '',
                annual_fee_numeric BIGINT NOT NULL DEFAULT 0,
                min_income_numeric BIGINT NOT NULL DEFAULT 0,
                reward_rate DOUBLE NOT NULL DEFAULT 0,
                reward_type VARCHAR(255) NOT NULL DEFAULT '',
                reward_conversion_rate VARCHAR(255) NOT NULL DEFAULT '',
                reward_score DOUBLE NOT NULL DEFAULT 0,
                fees_score DOUBLE NOT NULL DEFAULT 0,
                benefits_score DOUBLE NOT NULL DEFAULT 0,
                support_score DOUBLE NOT NULL DEFAULT 0,
                overall_score DOUBLE NOT NULL DEFAULT 0,
                pros TEXT NOT NULL,
                cons TEXT NOT NULL,
                best_for TEXT NOT NULL,
                documents TEXT NOT NULL,
                features TEXT NOT NULL,
                rewards TEXT NOT NULL,
                fees TEXT NOT NULL,
                eligibility TEXT NOT NULL,
                custom_faqs TEXT NOT NULL,
                featured BOOLEAN NOT NULL DEFAULT FALSE,
                trending BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
            );
            CREATE INDEX idx_cards_status ON cards(status);
            CREATE INDEX idx_cards_rating ON cards(rating);
            CREATE INDEX idx_cards_review_count ON cards(review_count);
            CREATE INDEX idx_cards_annual_fee_numeric ON cards(annual_fee_numeric);
            CREATE INDEX idx_cards_min_income_numeric ON cards(min_income_numeric);
            CREATE INDEX idx_cards_featured ON cards(featured);
            CREATE INDEX idx_cards_trending ON cards(trending);
            CREATE INDEX idx_cards_created_at ON cards(created_at);
        "#,
    },
    Migration {
        version: 3,
        name: "create_card_terms",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS card_terms (
                card_id INTEGER NOT NULL,
                term_id INTEGER NOT NULL,
                position INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (card_id, term_id),
                FOREIGN KEY (card_id) REFERENCES cards(id) ON DELETE CASCADE,
                FOREIGN KEY (term_id) REFERENCES terms(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_card_terms_term_id ON card_terms(term_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS card_terms (
                card_id BIGINT NOT NULL,
                term_id BIGINT NOT NULL,
                position INT NOT NULL DEFAULT 0,
                PRIMARY KEY (card_id, term_id),
                FOREIGN KEY (card_id) REFERENCES cards(id) ON DELETE CASCADE,
                FOREIGN KEY (term_id) REFERENCES terms(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_card_terms_term_id ON card_terms(term_id);
        "#,
    },
];

impl Migration {
    fn sql(&self, driver: DatabaseDriver) -> &'static str {
        match driver {
            DatabaseDriver::Sqlite => self.up_sqlite,
            DatabaseDriver::Mysql => self.up_mysql,
        }
    }
}

const LEDGER_SQLITE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY,
        name VARCHAR(255) NOT NULL UNIQUE,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
"#;

const LEDGER_MYSQL: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version BIGINT PRIMARY KEY,
        name VARCHAR(255) NOT NULL UNIQUE,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
"#;

/// Bring the catalog schema up to date, returning how many migrations ran.
///
/// Applied versions are recorded in `_migrations`; running twice is a no-op.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    let todo = pending(pool).await?;

    for migration in &todo {
        tracing::info!("Applying migration {}: {}", migration.version, migration.name);
        apply(pool, migration)
            .await
            .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
    }

    if todo.is_empty() {
        tracing::debug!("Catalog schema is up to date");
    } else {
        tracing::info!("Applied {} migration(s)", todo.len());
    }
    Ok(todo.len())
}

/// Migrations not yet recorded in the ledger, in version order
pub async fn pending(pool: &DynDatabasePool) -> Result<Vec<&'static Migration>> {
    let ledger = match pool.driver() {
        DatabaseDriver::Sqlite => LEDGER_SQLITE,
        DatabaseDriver::Mysql => LEDGER_MYSQL,
    };
    pool.execute(ledger).await?;

    let applied = applied_versions(pool).await?;
    Ok(MIGRATIONS
        .iter()
        .filter(|m| !applied.contains(&i64::from(m.version)))
        .collect())
}

async fn applied_versions(pool: &DynDatabasePool) -> Result<BTreeSet<i64>> {
    let sql = "SELECT version FROM _migrations";
    let versions: Vec<i64> = match pool.driver() {
        DatabaseDriver::Sqlite => sqlx::query_scalar::<_, i64>(sql).fetch_all(sqlite_pool(pool)?).await,
        DatabaseDriver::Mysql => sqlx::query_scalar::<_, i64>(sql).fetch_all(mysql_pool(pool)?).await,
    }
    .context("Failed to read the migration ledger")?;
    Ok(versions.into_iter().collect())
}

async fn apply(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    for statement in split_sql_statements(migration.sql(pool.driver())) {
        pool.execute(statement)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    let record = "INSERT INTO _migrations (version, name) VALUES (?, ?)";
    let version = i64::from(migration.version);
    let result = match pool.driver() {
        DatabaseDriver::Sqlite => {
            sqlx::query(record)
                .bind(version)
                .bind(migration.name)
                .execute(sqlite_pool(pool)?)
                .await
                .map(drop)
        }
        DatabaseDriver::Mysql => {
            sqlx::query(record)
                .bind(version)
                .bind(migration.name)
                .execute(mysql_pool(pool)?)
                .await
                .map(drop)
        }
    };
    result.context("Failed to record migration")
}

/// First 100 characters of a statement, for error messages
fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split a migration body on `;`, dropping empty and comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| {
            stmt.lines()
                .map(str::trim)
                .any(|line| !line.is_empty() && !line.starts_with("--"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use sqlx::Row;

    async fn migrated_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        pool
    }

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, MIGRATIONS.len());

        // Running again should apply 0 migrations
        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_pending_lists_unapplied_in_order() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let todo = pending(&pool).await.expect("Failed to check");
        let versions: Vec<i32> = todo.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);

        run_migrations(&pool).await.expect("Failed to run migrations");
        assert!(pending(&pool).await.expect("Failed to check").is_empty());
    }

    #[tokio::test]
    async fn test_cards_table_defaults() {
        let pool = migrated_pool().await;
        let sqlite = pool.as_sqlite().unwrap();

        sqlx::query("INSERT INTO cards (slug, title) VALUES ('plain', 'Plain Card')")
            .execute(sqlite)
            .await
            .expect("Failed to insert card");

        let row = sqlx::query(
            "SELECT status, rating, annual_fee_numeric, pros, featured FROM cards WHERE slug = 'plain'",
        )
        .fetch_one(sqlite)
        .await
        .expect("Failed to read card");

        let status: String = row.get("status");
        let rating: f64 = row.get("rating");
        let fee: i64 = row.get("annual_fee_numeric");
        let pros: String = row.get("pros");
        let featured: bool = row.get("featured");
        assert_eq!(status, "draft");
        assert_eq!(rating, 0.0);
        assert_eq!(fee, 0);
        assert_eq!(pros, "[]");
        assert!(!featured);
    }

    #[tokio::test]
    async fn test_term_slug_unique_per_taxonomy() {
        let pool = migrated_pool().await;
        let sqlite = pool.as_sqlite().unwrap();

        sqlx::query("INSERT INTO terms (taxonomy, slug, name) VALUES ('bank', 'axis', 'Axis')")
            .execute(sqlite)
            .await
            .expect("Failed to insert bank");

        // Same slug in another taxonomy is fine
        sqlx::query("INSERT INTO terms (taxonomy, slug, name) VALUES ('category', 'axis', 'Axis')")
            .execute(sqlite)
            .await
            .expect("Failed to insert category");

        let duplicate =
            sqlx::query("INSERT INTO terms (taxonomy, slug, name) VALUES ('bank', 'axis', 'Axis 2')")
                .execute(sqlite)
                .await;
        assert!(duplicate.is_err());
    }

    #[tokio::test]
    async fn test_card_terms_cascade_on_card_delete() {
        let pool = migrated_pool().await;
        let sqlite = pool.as_sqlite().unwrap();

        let card_id = sqlx::query("INSERT INTO cards (slug, title) VALUES ('c1', 'Card 1')")
            .execute(sqlite)
            .await
            .expect("Failed to insert card")
            .last_insert_rowid();
        let term_id = sqlx::query("INSERT INTO terms (taxonomy, slug, name) VALUES ('bank', 'b1', 'B1')")
            .execute(sqlite)
            .await
            .expect("Failed to insert term")
            .last_insert_rowid();
        sqlx::query("INSERT INTO card_terms (card_id, term_id, position) VALUES (?, ?, 0)")
            .bind(card_id)
            .bind(term_id)
            .execute(sqlite)
            .await
            .expect("Failed to link");

        sqlx::query("DELETE FROM cards WHERE id = ?")
            .bind(card_id)
            .execute(sqlite)
            .await
            .expect("Failed to delete card");

        let remaining: i64 = sqlx::query("SELECT COUNT(*) AS count FROM card_terms")
            .fetch_one(sqlite)
            .await
            .expect("Failed to count")
            .get("count");
        assert_eq!(remaining, 0);
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INT); CREATE TABLE b (id INT);";
        assert_eq!(split_sql_statements(sql).len(), 2);

        let sql = "-- header\nCREATE TABLE a (id INT);\n-- trailing note";
        assert_eq!(split_sql_statements(sql), vec!["-- header\nCREATE TABLE a (id INT)"]);
    }

    #[test]
    fn test_versions_are_sequential() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version as usize, i + 1, "{}", migration.name);
        }
    }

    #[test]
    fn test_truncate_sql() {
        let long = "x".repeat(150);
        assert_eq!(truncate_sql(&long).len(), 103);
        assert_eq!(truncate_sql("short"), "short");
    }
}
