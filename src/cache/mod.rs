//! Cache layer
//!
//! Process-local caching of rendered card and facet data, backed by moka.
//! Services hold an `Arc<MemoryCache>` and invalidate by key pattern on
//! every write.
//!
//! # Usage
//!
//! ```rust,ignore
//! use cardfinder::cache::{create_cache, CacheLayer};
//! use cardfinder::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default());
//! cache.set("facets:global", &facets, cache.default_ttl()).await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Cache layer trait
///
/// The generic methods keep this trait out of `dyn` use; callers hold the
/// concrete cache type.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Set a value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    /// Delete a value from cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete all values matching a glob pattern
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    /// Clear all cache entries
    async fn clear(&self) -> Result<()>;
}

/// Build the cache described by `config`
pub fn create_cache(config: &CacheConfig) -> Arc<MemoryCache> {
    let ttl = Duration::from_secs(config.ttl_seconds);
    tracing::debug!(
        "Creating memory cache (capacity {}, ttl {:?})",
        config.max_capacity,
        ttl
    );
    Arc::new(MemoryCache::with_capacity_and_ttl(config.max_capacity, ttl))
}
