//! Catalog store connection pool
//!
//! The catalog runs on SQLite by default and on MySQL for shared deployments.
//! `CatalogPool` wraps whichever sqlx pool the configuration selects and is
//! handed around as a `DynDatabasePool` trait object; repositories borrow the
//! concrete pool through `sqlite_pool` / `mysql_pool`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions},
    sqlite::{SqlitePool, SqlitePoolOptions},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{DatabaseConfig, DatabaseDriver};

const SQLITE_MAX_CONNECTIONS: u32 = 20;
const MYSQL_MAX_CONNECTIONS: u32 = 30;

/// Driver-independent view of the store connection
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Run one statement that returns no rows, yielding the affected row count
    async fn execute(&self, query: &str) -> Result<u64>;

    /// Round-trip a trivial query; used by the health endpoint
    async fn ping(&self) -> Result<()>;

    async fn close(&self);

    fn driver(&self) -> DatabaseDriver;

    fn as_sqlite(&self) -> Option<&SqlitePool>;

    fn as_mysql(&self) -> Option<&MySqlPool>;
}

/// Shared handle to the catalog store
pub type DynDatabasePool = Arc<dyn DatabasePool>;

/// A connected sqlx pool for one of the supported drivers
pub enum CatalogPool {
    Sqlite(SqlitePool),
    Mysql(MySqlPool),
}

/// Where a configured SQLite location points
#[derive(Debug, PartialEq, Eq)]
struct SqliteTarget {
    /// URL handed to sqlx
    url: String,
    /// Database file whose parent directory must exist, if file-backed
    file: Option<PathBuf>,
}

impl SqliteTarget {
    fn in_memory(&self) -> bool {
        self.file.is_none()
    }
}

/// Normalise a configured SQLite location: bare paths and `sqlite:` URLs get
/// create mode, `:memory:` maps to the sqlx in-memory URL.
fn sqlite_target(raw: &str) -> SqliteTarget {
    if raw == ":memory:" || raw.starts_with("sqlite::memory:") {
        let url = if raw == ":memory:" { "sqlite::memory:" } else { raw };
        return SqliteTarget {
            url: url.to_string(),
            file: None,
        };
    }

    let path = raw.strip_prefix("sqlite:").unwrap_or(raw);
    let path = path.trim_start_matches("//");
    let file_part = path.split('?').next().unwrap_or(path);
    let url = if raw.contains('?') {
        if raw.starts_with("sqlite:") {
            raw.to_string()
        } else {
            format!("sqlite:{}", raw)
        }
    } else {
        format!("sqlite:{}?mode=rwc", path)
    };

    SqliteTarget {
        url,
        file: Some(PathBuf::from(file_part)),
    }
}

fn mysql_url(raw: &str) -> String {
    if raw.starts_with("mysql://") {
        raw.to_string()
    } else {
        format!("mysql://{}", raw)
    }
}

fn ensure_parent_dir(file: &Path) -> Result<()> {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory: {:?}", parent)),
        _ => Ok(()),
    }
}

impl CatalogPool {
    /// Open a SQLite catalog, creating the database file when missing
    pub async fn sqlite(raw_url: &str) -> Result<Self> {
        let target = sqlite_target(raw_url);
        if let Some(file) = &target.file {
            ensure_parent_dir(file)?;
        }

        // Each connection to an in-memory database sees its own empty
        // database, so the pool holds a single connection that never expires
        let options = if target.in_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(SQLITE_MAX_CONNECTIONS)
        };

        let pool = options
            .connect(&target.url)
            .await
            .with_context(|| format!("Failed to connect to SQLite catalog: {}", raw_url))?;

        // card_terms rows cascade with their card and term
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await
            .context("Failed to enable foreign keys")?;

        tracing::debug!("Opened SQLite catalog at {}", target.url);
        Ok(CatalogPool::Sqlite(pool))
    }

    pub async fn mysql(raw_url: &str) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(MYSQL_MAX_CONNECTIONS)
            .connect(&mysql_url(raw_url))
            .await
            .context("Failed to connect to MySQL catalog")?;

        tracing::debug!("Opened MySQL catalog");
        Ok(CatalogPool::Mysql(pool))
    }
}

#[async_trait]
impl DatabasePool for CatalogPool {
    async fn execute(&self, query: &str) -> Result<u64> {
        let affected = match self {
            CatalogPool::Sqlite(pool) => sqlx::query(query).execute(pool).await.map(|r| r.rows_affected()),
            CatalogPool::Mysql(pool) => sqlx::query(query).execute(pool).await.map(|r| r.rows_affected()),
        };
        affected.with_context(|| format!("Failed to execute statement: {}", query))
    }

    async fn ping(&self) -> Result<()> {
        let result = match self {
            CatalogPool::Sqlite(pool) => sqlx::query("SELECT 1").execute(pool).await.map(drop),
            CatalogPool::Mysql(pool) => sqlx::query("SELECT 1").execute(pool).await.map(drop),
        };
        result.context("Catalog store ping failed")
    }

    async fn close(&self) {
        match self {
            CatalogPool::Sqlite(pool) => pool.close().await,
            CatalogPool::Mysql(pool) => pool.close().await,
        }
    }

    fn driver(&self) -> DatabaseDriver {
        match self {
            CatalogPool::Sqlite(_) => DatabaseDriver::Sqlite,
            CatalogPool::Mysql(_) => DatabaseDriver::Mysql,
        }
    }

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        match self {
            CatalogPool::Sqlite(pool) => Some(pool),
            CatalogPool::Mysql(_) => None,
        }
    }

    fn as_mysql(&self) -> Option<&MySqlPool> {
        match self {
            CatalogPool::Mysql(pool) => Some(pool),
            CatalogPool::Sqlite(_) => None,
        }
    }
}

/// Borrow the SQLite pool behind a trait object whose driver is SQLite
pub fn sqlite_pool(pool: &DynDatabasePool) -> Result<&SqlitePool> {
    pool.as_sqlite()
        .ok_or_else(|| anyhow!("Database driver is not SQLite"))
}

/// Borrow the MySQL pool behind a trait object whose driver is MySQL
pub fn mysql_pool(pool: &DynDatabasePool) -> Result<&MySqlPool> {
    pool.as_mysql()
        .ok_or_else(|| anyhow!("Database driver is not MySQL"))
}

/// Connect to the catalog store named by `config`.
///
/// ```ignore
/// use cardfinder::config::DatabaseConfig;
/// use cardfinder::db::create_pool;
///
/// let pool = create_pool(&DatabaseConfig::default()).await?;
/// pool.ping().await?;
/// ```
pub async fn create_pool(config: &DatabaseConfig) -> Result<DynDatabasePool> {
    let pool = match config.driver {
        DatabaseDriver::Sqlite => CatalogPool::sqlite(&config.url).await?,
        DatabaseDriver::Mysql => CatalogPool::mysql(&config.url).await?,
    };
    Ok(Arc::new(pool))
}

/// In-memory SQLite catalog for tests
pub async fn create_test_pool() -> Result<DynDatabasePool> {
    let config = DatabaseConfig {
        driver: DatabaseDriver::Sqlite,
        url: ":memory:".to_string(),
    };
    create_pool(&config).await
}
