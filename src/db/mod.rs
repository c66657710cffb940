//! Database layer
//!
//! This module provides database abstraction for the card catalog.
//! It supports:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (for larger deployments)
//!
//! The database driver is selected based on configuration.
//!
//! # Usage
//!
//! ```ignore
//! use cardfinder::config::DatabaseConfig;
//! use cardfinder::db::{create_pool, DatabasePool, migrations};
//!
//! let config = DatabaseConfig::default();
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;
pub mod sql;

pub use pool::{
    create_pool, create_test_pool, mysql_pool, sqlite_pool, CatalogPool, DatabasePool,
    DynDatabasePool,
};
