//! Term service
//!
//! Implements business logic for taxonomy terms:
//! - Create terms with generated slugs
//! - Upsert by slug (seed import)
//! - Parent resolution for categories
//!
//! Every write drops the cached facets and cached cards, since term names and
//! parents show up in both.

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::TermRepository;
use crate::models::{Taxonomy, Term, TermInput};
use anyhow::Context;
use std::sync::Arc;

use super::card::CARD_CACHE_PATTERN;
use super::facet::FACETS_CACHE_PATTERN;
use super::schema::generate_slug;

/// Longest accepted term name
const MAX_NAME_LEN: usize = 100;

/// Error types for term service operations
#[derive(Debug, thiserror::Error)]
pub enum TermServiceError {
    /// Term not found
    #[error("Term not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Slug already used in the taxonomy
    #[error("Term slug already exists: {0}")]
    DuplicateSlug(String),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Term service for banks, networks and categories
pub struct TermService {
    repo: Arc<dyn TermRepository>,
    cache: Arc<MemoryCache>,
}

impl TermService {
    /// Create a new term service
    pub fn new(repo: Arc<dyn TermRepository>, cache: Arc<MemoryCache>) -> Self {
        Self { repo, cache }
    }

    /// Create a term. The slug is generated from the name when empty.
    ///
    /// # Errors
    /// - `Validation` for an empty name, an unusable slug, or a bad parent
    /// - `DuplicateSlug` if the taxonomy already has the slug
    pub async fn create(&self, taxonomy: Taxonomy, input: TermInput) -> Result<Term, TermServiceError> {
        let (slug, name) = validate_input(&input)?;

        if self
            .repo
            .get_by_slug(taxonomy, &slug)
            .await
            .context("Failed to check slug uniqueness")?
            .is_some()
        {
            return Err(TermServiceError::DuplicateSlug(slug));
        }

        let parent_id = self.resolve_parent(taxonomy, input.parent.as_deref(), None).await?;
        let term = self.repo.create(taxonomy, &slug, &name, parent_id).await?;

        tracing::info!("Created {} term '{}' (id {})", taxonomy, term.slug, term.id);
        self.invalidate().await;
        Ok(term)
    }

    /// Create the term, or rename and re-parent the one with the same slug
    pub async fn upsert(&self, taxonomy: Taxonomy, input: TermInput) -> Result<Term, TermServiceError> {
        let (slug, name) = validate_input(&input)?;

        let Some(existing) = self
            .repo
            .get_by_slug(taxonomy, &slug)
            .await
            .context("Failed to look up term")?
        else {
            return self.create(taxonomy, input).await;
        };

        let parent_id = self
            .resolve_parent(taxonomy, input.parent.as_deref(), Some(existing.id))
            .await?;
        if existing.name == name && existing.parent_id == parent_id {
            return Ok(existing);
        }

        let term = self.repo.update(existing.id, &name, parent_id).await?;
        tracing::info!("Updated {} term '{}'", taxonomy, term.slug);
        self.invalidate().await;
        Ok(term)
    }

    /// Get a term by slug
    pub async fn get_by_slug(&self, taxonomy: Taxonomy, slug: &str) -> Result<Term, TermServiceError> {
        self.repo
            .get_by_slug(taxonomy, slug)
            .await?
            .ok_or_else(|| TermServiceError::NotFound(format!("{} '{}'", taxonomy, slug)))
    }

    /// All terms of a taxonomy, ordered by name
    pub async fn list(&self, taxonomy: Taxonomy) -> Result<Vec<Term>, TermServiceError> {
        Ok(self.repo.list(taxonomy).await?)
    }

    async fn resolve_parent(
        &self,
        taxonomy: Taxonomy,
        parent: Option<&str>,
        term_id: Option<i64>,
    ) -> Result<Option<i64>, TermServiceError> {
        let Some(parent_slug) = parent.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(None);
        };

        if !taxonomy.is_hierarchical() {
            return Err(TermServiceError::Validation(format!(
                "{} terms cannot have a parent",
                taxonomy
            )));
        }

        let parent = self
            .repo
            .get_by_slug(taxonomy, parent_slug)
            .await
            .context("Failed to look up parent term")?
            .ok_or_else(|| {
                TermServiceError::Validation(format!("Parent {} not found: {}", taxonomy, parent_slug))
            })?;

        if Some(parent.id) == term_id {
            return Err(TermServiceError::Validation(
                "A term cannot be its own parent".to_string(),
            ));
        }

        Ok(Some(parent.id))
    }

    async fn invalidate(&self) {
        for pattern in [CARD_CACHE_PATTERN, FACETS_CACHE_PATTERN] {
            if let Err(e) = self.cache.delete_pattern(pattern).await {
                tracing::warn!("Failed to invalidate cache pattern {}: {}", pattern, e);
            }
        }
    }
}

/// Trimmed name and final slug of a term input
fn validate_input(input: &TermInput) -> Result<(String, String), TermServiceError> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(TermServiceError::Validation("Term name cannot be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(TermServiceError::Validation(format!(
            "Term name cannot exceed {} characters",
            MAX_NAME_LEN
        )));
    }

    let source = if input.slug.trim().is_empty() {
        name
    } else {
        input.slug.as_str()
    };
    let slug = generate_slug(source);
    if slug.is_empty() {
        return Err(TermServiceError::Validation(format!(
            "Cannot derive a slug from '{}'",
            source
        )));
    }

    Ok((slug, name.to_string()))
}
