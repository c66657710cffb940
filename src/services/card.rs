//! Card service
//!
//! Implements business logic for the card catalog:
//! - Catalog search with presentation of each result
//! - Single-card and comparison lookups of published cards
//! - Create and update from raw JSON, with derived fields recomputed
//! - Upsert by slug for seed imports
//!
//! Every write drops cached cards and facets.

use crate::cache::{CacheLayer, MemoryCache};
use crate::config::CatalogConfig;
use crate::db::repositories::{CardRepository, TermRepository};
use crate::models::{
    Card, CardInput, CardStatus, CardTerms, CardWithTerms, SearchPage, Taxonomy, Term,
};
use anyhow::Context;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use super::facet::FACETS_CACHE_PATTERN;
use super::markdown::MarkdownRenderer;
use super::presenter::{extract_numeric, CardFull, CardPresenter, CardSummary};
use super::schema::{canonical_name, generate_slug, sanitize_card, SchemaError};
use super::search::{build_query, SearchParams};

/// Cache key prefix for published cards by ID
const CACHE_KEY_CARD_BY_ID: &str = "card:id:";

/// Pattern dropping every cached card
pub const CARD_CACHE_PATTERN: &str = "card:*";

/// Fields feeding the derived overall score
const SCORE_FIELDS: [&str; 4] = ["rewardScore", "feesScore", "benefitsScore", "supportScore"];

/// Error types for card service operations
#[derive(Debug, thiserror::Error)]
pub enum CardServiceError {
    /// Card not found (or not visible)
    #[error("Card not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Card slug already exists
    #[error("Card slug already exists: {0}")]
    DuplicateSlug(String),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl From<SchemaError> for CardServiceError {
    fn from(e: SchemaError) -> Self {
        CardServiceError::Validation(e.to_string())
    }
}

/// Card service for catalog reads and card writes
pub struct CardService {
    cards: Arc<dyn CardRepository>,
    terms: Arc<dyn TermRepository>,
    cache: Arc<MemoryCache>,
    catalog: CatalogConfig,
    presenter: CardPresenter,
    markdown: MarkdownRenderer,
    cache_ttl: Duration,
}

impl CardService {
    /// Create a new card service
    pub fn new(
        cards: Arc<dyn CardRepository>,
        terms: Arc<dyn TermRepository>,
        cache: Arc<MemoryCache>,
        catalog: CatalogConfig,
    ) -> Self {
        let cache_ttl = cache.default_ttl();
        Self {
            cards,
            terms,
            cache,
            presenter: CardPresenter::new(catalog.base_url.clone()),
            catalog,
            markdown: MarkdownRenderer::new(),
            cache_ttl,
        }
    }

    /// Presenter used for this catalog's output
    pub fn presenter(&self) -> &CardPresenter {
        &self.presenter
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Search published cards
    ///
    /// Malformed parameters never fail the search; see `services::search`.
    /// A page past the end is empty but still carries the totals.
    pub async fn search(&self, params: &SearchParams) -> Result<SearchPage<CardSummary>, CardServiceError> {
        let query = build_query(params, &self.catalog);

        let total = self.cards.count(&query).await?;
        let cards = if total > query.page.offset() {
            self.cards.search(&query).await?
        } else {
            Vec::new()
        };

        let with_terms = self.attach_terms(cards).await?;
        let summaries = with_terms
            .iter()
            .map(|c| self.presenter.summary(&c.card, &c.terms))
            .collect();

        Ok(SearchPage::new(summaries, total, &query.page))
    }

    /// Get a published card with its terms
    ///
    /// # Errors
    /// - `NotFound` if the card is missing or not published
    pub async fn get_published(&self, id: i64) -> Result<CardWithTerms, CardServiceError> {
        let cache_key = format!("{}{}", CACHE_KEY_CARD_BY_ID, id);
        if let Some(cached) = self.cache.get::<CardWithTerms>(&cache_key).await.ok().flatten() {
            return Ok(cached);
        }
        let generation = self.cache.generation();

        let card = self
            .cards
            .get_by_id(id)
            .await?
            .filter(Card::is_published)
            .ok_or_else(|| CardServiceError::NotFound(id.to_string()))?;

        let card = self.with_terms(card).await?;
        let _ = self
            .cache
            .set_if_current(&cache_key, &card, self.cache_ttl, generation)
            .await;
        Ok(card)
    }

    /// Full presentation of a published card
    pub async fn get_full(&self, id: i64) -> Result<CardFull, CardServiceError> {
        let card = self.get_published(id).await?;
        Ok(self.presenter.full(&card.card, &card.terms))
    }

    /// Full presentations of the published cards among `ids`, in request
    /// order, duplicates dropped. Ids that do not resolve are skipped.
    pub async fn compare(&self, ids: &[i64]) -> Result<Vec<CardFull>, CardServiceError> {
        let mut seen = HashSet::with_capacity(ids.len());
        let mut cards = Vec::new();

        for &id in ids {
            if !seen.insert(id) {
                continue;
            }
            match self.get_full(id).await {
                Ok(card) => cards.push(card),
                Err(CardServiceError::NotFound(_)) => {
                    tracing::debug!("Skipping unresolved card {} in comparison", id);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(cards)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Create a card from raw JSON
    ///
    /// # Errors
    /// - `Validation` for bad field values, unknown term slugs, or a
    ///   published card without a title
    /// - `DuplicateSlug` if the slug is taken
    pub async fn create(&self, raw: &Value) -> Result<CardWithTerms, CardServiceError> {
        let input = sanitize_card(raw)?;
        let (input, term_ids) = self.prepare(input, None).await?;

        let card = self.cards.create(&input, &term_ids).await?;
        tracing::info!("Created card '{}' (id {})", card.slug, card.id);

        self.invalidate().await;
        self.with_terms(card).await
    }

    /// Update a card from a raw JSON patch
    ///
    /// Fields missing from the patch keep their stored values. The overall
    /// score is re-derived when a sub-score changes without an explicit
    /// overall score.
    pub async fn update(&self, id: i64, patch: &Value) -> Result<CardWithTerms, CardServiceError> {
        let patch = patch.as_object().ok_or(SchemaError::NotAnObject)?;

        let stored = self
            .cards
            .get_by_id(id)
            .await?
            .ok_or_else(|| CardServiceError::NotFound(id.to_string()))?;
        let stored = self.with_terms(stored).await?;

        let base = CardInput::from_card(&stored.card, &stored.terms);
        let mut merged = match serde_json::to_value(&base).context("Failed to serialize stored card")? {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };

        let touches = |field: &str| patch.keys().any(|k| canonical_name(k) == Some(field));
        if !touches("overallScore") && SCORE_FIELDS.iter().any(|f| touches(*f)) {
            merged.remove("overallScore");
        }
        for (key, value) in patch {
            if let Some(name) = canonical_name(key) {
                merged.insert(name.to_string(), value.clone());
            }
        }

        let input = sanitize_card(&Value::Object(merged))?;
        let (input, term_ids) = self.prepare(input, Some(id)).await?;

        let card = self.cards.update(id, &input, &term_ids).await?;
        tracing::info!("Updated card '{}' (id {})", card.slug, card.id);

        self.invalidate().await;
        self.with_terms(card).await
    }

    /// Create the card, or update the one with the same slug
    pub async fn upsert_by_slug(&self, raw: &Value) -> Result<CardWithTerms, CardServiceError> {
        let input = sanitize_card(raw)?;
        let slug = card_slug(&input)?;

        match self.cards.get_by_slug(&slug).await? {
            Some(existing) => self.update(existing.id, raw).await,
            None => self.create(raw).await,
        }
    }

    /// Fill derived fields, check uniqueness and resolve term slugs
    async fn prepare(
        &self,
        mut input: CardInput,
        exclude_id: Option<i64>,
    ) -> Result<(CardInput, Vec<i64>), CardServiceError> {
        input.slug = card_slug(&input)?;

        if input.status == CardStatus::Published && input.title.is_empty() {
            return Err(CardServiceError::Validation(
                "A published card needs a title".to_string(),
            ));
        }

        if self
            .cards
            .exists_by_slug(&input.slug, exclude_id)
            .await
            .context("Failed to check slug uniqueness")?
        {
            return Err(CardServiceError::DuplicateSlug(input.slug));
        }

        input.content_html = self.markdown.render(&input.content);
        input.annual_fee_numeric = extract_numeric(&input.annual_fee);
        input.min_income_numeric = extract_numeric(&input.min_income);

        let mut term_ids = Vec::new();
        for (taxonomy, slugs) in [
            (Taxonomy::Bank, &input.banks),
            (Taxonomy::Network, &input.networks),
            (Taxonomy::Category, &input.categories),
        ] {
            for slug in slugs {
                let term = self
                    .terms
                    .get_by_slug(taxonomy, slug)
                    .await?
                    .ok_or_else(|| CardServiceError::Validation(format!("Unknown {} '{}'", taxonomy, slug)))?;
                term_ids.push(term.id);
            }
        }

        Ok((input, term_ids))
    }

    async fn with_terms(&self, card: Card) -> Result<CardWithTerms, CardServiceError> {
        let mut cards = self.attach_terms(vec![card]).await?;
        cards
            .pop()
            .ok_or_else(|| CardServiceError::Store(anyhow::anyhow!("Card vanished while loading terms")))
    }

    /// Load the terms of a batch of cards in one query
    async fn attach_terms(&self, cards: Vec<Card>) -> Result<Vec<CardWithTerms>, CardServiceError> {
        let ids: Vec<i64> = cards.iter().map(|c| c.id).collect();
        let mut by_card: HashMap<i64, Vec<Term>> = HashMap::new();
        for (card_id, term) in self.terms.list_for_cards(&ids).await? {
            by_card.entry(card_id).or_default().push(term);
        }

        Ok(cards
            .into_iter()
            .map(|card| {
                let terms = CardTerms::from_terms(by_card.remove(&card.id).unwrap_or_default());
                CardWithTerms { card, terms }
            })
            .collect())
    }

    async fn invalidate(&self) {
        for pattern in [CARD_CACHE_PATTERN, FACETS_CACHE_PATTERN] {
            if let Err(e) = self.cache.delete_pattern(pattern).await {
                tracing::warn!("Failed to invalidate cache pattern {}: {}", pattern, e);
            }
        }
    }
}

/// Explicit slug, else one generated from the title
fn card_slug(input: &CardInput) -> Result<String, CardServiceError> {
    let slug = if input.slug.is_empty() {
        generate_slug(&input.title)
    } else {
        input.slug.clone()
    };
    if slug.is_empty() {
        return Err(CardServiceError::Validation(
            "A card needs a title or a slug".to_string(),
        ));
    }
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCardRepository, SqlxTermRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{SortKey, SortOrder, TermInput};
    use crate::services::TermService;
    use serde_json::json;
    use std::collections::BTreeSet;

    struct Fixture {
        service: CardService,
        terms: Arc<dyn TermRepository>,
        cache: Arc<MemoryCache>,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool()
            .await
            .expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let cards = SqlxCardRepository::boxed(pool.clone());
        let terms = SqlxTermRepository::boxed(pool);
        let cache = Arc::new(MemoryCache::new());
        let catalog = CatalogConfig {
            base_url: "https://cards.example".to_string(),
            ..CatalogConfig::default()
        };
        Fixture {
            service: CardService::new(cards, terms.clone(), cache.clone(), catalog),
            terms,
            cache,
        }
    }

    fn search_params(pairs: &[(&str, &str)]) -> SearchParams {
        let map: serde_json::Map<String, Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        serde_json::from_value(Value::Object(map)).unwrap()
    }

    async fn seed_three(fx: &Fixture) -> Vec<i64> {
        let mut ids = Vec::new();
        for (title, rating, featured) in [("Alpha", 5.0, false), ("Beta", 3.0, true), ("Gamma", 4.0, false)] {
            let card = fx
                .service
                .create(&json!({
                    "title": title,
                    "status": "published",
                    "rating": rating,
                    "featured": featured,
                }))
                .await
                .expect("Failed to create card");
            ids.push(card.card.id);
        }
        ids
    }

    #[tokio::test]
    async fn test_create_derives_fields() {
        let fx = setup().await;
        fx.terms.create(Taxonomy::Bank, "hdfc", "HDFC", None).await.unwrap();
        fx.terms.create(Taxonomy::Network, "visa", "Visa", None).await.unwrap();

        let created = fx
            .service
            .create(&json!({
                "title": "HDFC Millennia",
                "status": "published",
                "content": "**Cashback** on everything",
                "annualFee": "₹1,200",
                "minIncome": "3.5 Lakh",
                "rewardScore": 4, "feesScore": 3, "benefitsScore": 5, "supportScore": 4,
                "banks": "hdfc",
                "networks": ["visa"],
            }))
            .await
            .expect("Failed to create card");

        let card = &created.card;
        assert_eq!(card.slug, "hdfc-millennia");
        assert_eq!(card.annual_fee_numeric, 1200);
        assert_eq!(card.min_income_numeric, 3);
        assert_eq!(card.overall_score, 4.0);
        assert!(card.content_html.contains("<strong>Cashback</strong>"));
        assert_eq!(created.terms.primary_bank().map(|t| t.slug.as_str()), Some("hdfc"));
        assert_eq!(created.terms.primary_network().map(|t| t.slug.as_str()), Some("visa"));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let fx = setup().await;

        let unknown_term = fx
            .service
            .create(&json!({ "title": "Gold", "banks": ["nobank"] }))
            .await;
        assert!(matches!(unknown_term, Err(CardServiceError::Validation(_))));

        let untitled = fx
            .service
            .create(&json!({ "slug": "gold", "status": "published" }))
            .await;
        assert!(matches!(untitled, Err(CardServiceError::Validation(_))));

        let nameless = fx.service.create(&json!({ "rating": 4 })).await;
        assert!(matches!(nameless, Err(CardServiceError::Validation(_))));

        let bad_status = fx
            .service
            .create(&json!({ "title": "Gold", "status": "pending" }))
            .await;
        assert!(matches!(bad_status, Err(CardServiceError::Validation(_))));

        fx.service.create(&json!({ "title": "Gold" })).await.unwrap();
        let dup = fx.service.create(&json!({ "title": "GOLD" })).await;
        assert!(matches!(dup, Err(CardServiceError::DuplicateSlug(slug)) if slug == "gold"));
    }

    #[tokio::test]
    async fn test_update_overlays_patch() {
        let fx = setup().await;
        fx.terms.create(Taxonomy::Bank, "sbi", "SBI", None).await.unwrap();

        let created = fx
            .service
            .create(&json!({
                "title": "SimplyClick",
                "status": "published",
                "annualFee": "499",
                "pros": ["Amazon vouchers"],
                "banks": ["sbi"],
                "rewardScore": 4, "feesScore": 4, "benefitsScore": 4, "supportScore": 4,
                "overallScore": 4.8,
            }))
            .await
            .unwrap();
        let id = created.card.id;

        let updated = fx
            .service
            .update(id, &json!({ "annual_fee": "₹999" }))
            .await
            .expect("Failed to update card");
        assert_eq!(updated.card.annual_fee, "₹999");
        assert_eq!(updated.card.annual_fee_numeric, 999);
        assert_eq!(updated.card.pros, vec!["Amazon vouchers"]);
        assert_eq!(updated.card.overall_score, 4.8);
        assert_eq!(updated.terms.banks.len(), 1);

        // A sub-score change re-derives the overall score
        let rescored = fx
            .service
            .update(id, &json!({ "supportScore": 2 }))
            .await
            .unwrap();
        assert_eq!(rescored.card.overall_score, 3.5);

        let missing = fx.service.update(9_999, &json!({ "title": "x" })).await;
        assert!(matches!(missing, Err(CardServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_keeps_own_slug_but_rejects_taken_one() {
        let fx = setup().await;
        let a = fx.service.create(&json!({ "title": "A" })).await.unwrap();
        fx.service.create(&json!({ "title": "B" })).await.unwrap();

        fx.service
            .update(a.card.id, &json!({ "title": "A renamed" }))
            .await
            .expect("Own slug should not conflict");

        let err = fx.service.update(a.card.id, &json!({ "slug": "b" })).await;
        assert!(matches!(err, Err(CardServiceError::DuplicateSlug(_))));
    }

    #[tokio::test]
    async fn test_upsert_by_slug() {
        let fx = setup().await;
        let first = fx
            .service
            .upsert_by_slug(&json!({ "title": "Regalia", "rating": 4 }))
            .await
            .unwrap();
        let second = fx
            .service
            .upsert_by_slug(&json!({ "title": "Regalia", "rating": 4.5 }))
            .await
            .unwrap();

        assert_eq!(first.card.id, second.card.id);
        assert_eq!(second.card.rating, 4.5);
    }

    #[tokio::test]
    async fn test_search_sorts_and_filters() {
        let fx = setup().await;
        seed_three(&fx).await;

        let page = fx
            .service
            .search(&search_params(&[("sortBy", "rating"), ("sortOrder", "desc")]))
            .await
            .unwrap();
        let titles: Vec<&str> = page.items.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Gamma", "Beta"]);

        // Default ordering puts the featured card first
        let page = fx.service.search(&search_params(&[])).await.unwrap();
        assert_eq!(page.items[0].title, "Beta");

        let page = fx
            .service
            .search(&search_params(&[("minRating", "4")]))
            .await
            .unwrap();
        assert_eq!(page.total, 2);

        let page = fx
            .service
            .search(&search_params(&[("minRating", "abc")]))
            .await
            .unwrap();
        assert_eq!(page.total, 0);
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn test_search_page_past_end() {
        let fx = setup().await;
        seed_three(&fx).await;

        let page = fx
            .service
            .search(&search_params(&[("page", "5"), ("perPage", "2")]))
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
        assert_eq!(page.page_count, 2);
        assert_eq!(page.page, 5);
    }

    #[tokio::test]
    async fn test_get_published_hides_drafts() {
        let fx = setup().await;
        let draft = fx.service.create(&json!({ "title": "Draft" })).await.unwrap();
        let err = fx.service.get_published(draft.card.id).await;
        assert!(matches!(err, Err(CardServiceError::NotFound(_))));

        let ids = seed_three(&fx).await;
        let full = fx.service.get_full(ids[0]).await.unwrap();
        assert_eq!(full.summary.link, "https://cards.example/credit-card/alpha/");
    }

    #[tokio::test]
    async fn test_writes_invalidate_cached_card() {
        let fx = setup().await;
        let ids = seed_three(&fx).await;

        let before = fx.service.get_published(ids[0]).await.unwrap();
        assert_eq!(before.card.title, "Alpha");
        assert!(fx
            .cache
            .get::<CardWithTerms>(&format!("card:id:{}", ids[0]))
            .await
            .unwrap()
            .is_some());

        fx.service
            .update(ids[0], &json!({ "title": "Alpha Prime" }))
            .await
            .unwrap();
        let after = fx.service.get_published(ids[0]).await.unwrap();
        assert_eq!(after.card.title, "Alpha Prime");
    }

    #[tokio::test]
    async fn test_term_rename_refreshes_cached_card() {
        let fx = setup().await;
        let term_service = TermService::new(fx.terms.clone(), fx.cache.clone());
        let bank = |name: &str| TermInput {
            name: name.to_string(),
            slug: "hdfc".to_string(),
            parent: None,
        };
        term_service.create(Taxonomy::Bank, bank("HDFC")).await.unwrap();
        let id = fx
            .service
            .create(&json!({ "title": "Millennia", "status": "published", "banks": ["hdfc"] }))
            .await
            .unwrap()
            .card
            .id;

        let before = fx.service.get_full(id).await.unwrap();
        assert_eq!(before.summary.bank.unwrap().name, "HDFC");

        term_service
            .upsert(Taxonomy::Bank, bank("HDFC Bank Renamed"))
            .await
            .unwrap();

        let detail = fx.service.get_full(id).await.unwrap();
        let listed = fx.service.search(&search_params(&[])).await.unwrap();
        assert_eq!(detail.summary.bank.unwrap().name, "HDFC Bank Renamed");
        assert_eq!(listed.items[0].bank.as_ref().unwrap().name, "HDFC Bank Renamed");
    }

    #[tokio::test]
    async fn test_compare_dedupes_and_skips() {
        let fx = setup().await;
        let ids = seed_three(&fx).await;

        let cards = fx
            .service
            .compare(&[ids[2], 999, ids[0], ids[2]])
            .await
            .unwrap();
        let titles: Vec<&str> = cards.iter().map(|c| c.summary.title.as_str()).collect();
        assert_eq!(titles, vec!["Gamma", "Alpha"]);

        assert!(fx.service.compare(&[999]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_annual_fee_filter() {
        let fx = setup().await;
        fx.service
            .create(&json!({ "title": "Fee Card", "status": "published", "annualFee": "₹1,200" }))
            .await
            .unwrap();

        let excluded = fx
            .service
            .search(&search_params(&[("maxAnnualFee", "1000")]))
            .await
            .unwrap();
        assert_eq!(excluded.total, 0);

        let included = fx
            .service
            .search(&search_params(&[("maxAnnualFee", "1500")]))
            .await
            .unwrap();
        assert_eq!(included.total, 1);
    }

    /// Eleven published cards and one draft spread over three banks, two
    /// networks and a travel > airline category tree, with repeated ratings.
    async fn seed_catalog(fx: &Fixture) {
        for (taxonomy, slug) in [
            (Taxonomy::Bank, "hdfc"),
            (Taxonomy::Bank, "sbi"),
            (Taxonomy::Bank, "axis"),
            (Taxonomy::Network, "visa"),
            (Taxonomy::Network, "mastercard"),
            (Taxonomy::Category, "fuel"),
        ] {
            fx.terms.create(taxonomy, slug, slug, None).await.unwrap();
        }
        let travel = fx.terms.create(Taxonomy::Category, "travel", "Travel", None).await.unwrap();
        fx.terms
            .create(Taxonomy::Category, "airline", "Airline", Some(travel.id))
            .await
            .unwrap();

        let banks = ["hdfc", "sbi", "axis"];
        let networks = ["visa", "mastercard"];
        let categories: [&[&str]; 4] = [&["travel"], &["airline"], &["fuel"], &[]];
        let ratings = [4.0, 4.0, 3.5];
        for i in 0..12 {
            fx.service
                .create(&json!({
                    "title": format!("Card {:02}", i),
                    "status": if i == 11 { "draft" } else { "published" },
                    "rating": ratings[i % 3],
                    "banks": [banks[i % 3]],
                    "networks": [networks[i % 2]],
                    "categories": categories[i % 4],
                }))
                .await
                .expect("Failed to create card");
        }
    }

    async fn matching_ids(fx: &Fixture, pairs: &[(&str, &str)]) -> BTreeSet<i64> {
        let mut pairs = pairs.to_vec();
        pairs.push(("perPage", "100"));
        let page = fx.service.search(&search_params(&pairs)).await.unwrap();
        assert_eq!(page.items.len() as i64, page.total);
        page.items.iter().map(|c| c.id).collect()
    }

    #[tokio::test]
    async fn test_pages_cover_every_match_once() {
        let fx = setup().await;
        seed_catalog(&fx).await;
        let all = matching_ids(&fx, &[]).await;
        assert_eq!(all.len(), 11);

        for per_page in 1..=5 {
            let per_page = per_page.to_string();
            let mut walked = Vec::new();
            let mut page_number = 1;
            loop {
                let page_param = page_number.to_string();
                let page = fx
                    .service
                    .search(&search_params(&[("page", page_param.as_str()), ("perPage", per_page.as_str())]))
                    .await
                    .unwrap();
                assert_eq!(page.total, 11);
                if page.items.is_empty() {
                    assert_eq!(page_number, page.page_count + 1);
                    break;
                }
                walked.extend(page.items.iter().map(|c| c.id));
                page_number += 1;
            }

            assert_eq!(walked.len(), all.len(), "perPage {}", per_page);
            assert_eq!(walked.iter().copied().collect::<BTreeSet<_>>(), all);
        }
    }

    #[tokio::test]
    async fn test_filters_intersect_and_never_widen() {
        let fx = setup().await;
        seed_catalog(&fx).await;
        let all = matching_ids(&fx, &[]).await;

        let filters = [("bank", "hdfc"), ("network", "visa"), ("category", "travel")];
        let singles = [
            matching_ids(&fx, &filters[..1]).await,
            matching_ids(&fx, &filters[1..2]).await,
            matching_ids(&fx, &filters[2..]).await,
        ];
        for single in &singles {
            assert!(!single.is_empty());
            assert!(single.is_subset(&all));
        }

        let mut expected = all.clone();
        for n in 1..=filters.len() {
            expected = expected.intersection(&singles[n - 1]).copied().collect();
            let combined = matching_ids(&fx, &filters[..n]).await;
            assert_eq!(combined, expected, "filters {:?}", &filters[..n]);
        }
        // hdfc cards sit at 0, 3, 6, 9; visa at even indexes; travel at 0, 1, 4, 5, 8, 9
        assert_eq!(expected.len(), 1);
    }

    #[tokio::test]
    async fn test_multi_bank_is_union_of_single_banks() {
        let fx = setup().await;
        seed_catalog(&fx).await;

        let banks = ["hdfc", "sbi", "axis"];
        for mask in 1..(1 << banks.len()) {
            let chosen: Vec<&str> = banks
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, b)| *b)
                .collect();

            let mut union = BTreeSet::new();
            for bank in &chosen {
                union.extend(matching_ids(&fx, &[("bank", *bank)]).await);
            }
            let joined = chosen.join(",");
            assert_eq!(matching_ids(&fx, &[("bank", joined.as_str())]).await, union, "bank={}", joined);
        }
    }

    #[tokio::test]
    async fn test_tied_sort_keys_give_stable_order() {
        let fx = setup().await;
        seed_catalog(&fx).await;

        for sort in [&[("sortBy", "rating")][..], &[][..]] {
            let mut runs = Vec::new();
            for _ in 0..2 {
                let mut order = Vec::new();
                for page_number in ["1", "2", "3", "4"] {
                    let mut pairs = sort.to_vec();
                    pairs.extend([("page", page_number), ("perPage", "3")]);
                    let page = fx.service.search(&search_params(&pairs)).await.unwrap();
                    order.extend(page.items.iter().map(|c| (c.rating, c.id)));
                }
                runs.push(order);
            }
            assert_eq!(runs[0], runs[1]);
            assert_eq!(runs[0].len(), 11);
        }

        // Equal ratings fall back to ascending id
        let page = fx
            .service
            .search(&search_params(&[("sortBy", "rating"), ("perPage", "100")]))
            .await
            .unwrap();
        for pair in page.items.windows(2) {
            assert!(pair[0].rating >= pair[1].rating);
            if pair[0].rating == pair[1].rating {
                assert!(pair[0].id < pair[1].id);
            }
        }
    }

    #[test]
    fn test_sort_defaults_are_desc() {
        let query = build_query(&search_params(&[("sortBy", "rating")]), &CatalogConfig::default());
        assert_eq!(query.sort.key, SortKey::Rating);
        assert_eq!(query.sort.order, SortOrder::Desc);
    }
}
