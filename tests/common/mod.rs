//! Common test utilities for HTTP tests.
//!
//! Builds the real router over an in-memory SQLite catalog.

#![allow(dead_code)]

use std::sync::Arc;

use axum_test::TestServer;
use serde_json::Value;

use cardfinder::api::{self, AppState};
use cardfinder::cache::create_cache;
use cardfinder::config::{CacheConfig, CatalogConfig};
use cardfinder::db::repositories::{SqlxCardRepository, SqlxTermRepository};
use cardfinder::db::{create_test_pool, migrations};
use cardfinder::services::{CardService, FacetService, TermService};

pub const ADMIN_TOKEN: &str = "test-admin-token";

/// Test application wrapping the real routes and services
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
}

impl TestApp {
    /// App with the admin token configured
    pub async fn new() -> Self {
        Self::with_admin_token(Some(ADMIN_TOKEN)).await
    }

    pub async fn with_admin_token(token: Option<&str>) -> Self {
        let pool = create_test_pool()
            .await
            .expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let cache = create_cache(&CacheConfig::default());
        let card_repo = SqlxCardRepository::boxed(pool.clone());
        let term_repo = SqlxTermRepository::boxed(pool.clone());
        let catalog = CatalogConfig {
            base_url: "https://cards.example".to_string(),
            ..CatalogConfig::default()
        };

        let state = AppState {
            pool,
            card_service: Arc::new(CardService::new(
                card_repo.clone(),
                term_repo.clone(),
                cache.clone(),
                catalog,
            )),
            facet_service: Arc::new(FacetService::new(card_repo, term_repo.clone(), cache.clone())),
            term_service: Arc::new(TermService::new(term_repo, cache)),
            admin_token: token.map(Arc::from),
        };

        let router = api::build_router(state.clone(), "*").expect("Failed to build router");
        let server = TestServer::new(router).expect("Failed to start test server");
        Self { server, state }
    }

    /// Create a card through the service, returning its id
    pub async fn create_card(&self, raw: Value) -> i64 {
        self.state
            .card_service
            .create(&raw)
            .await
            .expect("Failed to create card")
            .card
            .id
    }

    /// The catalog used by the E2E scenarios: ratings 5, 3, 4, the 3-rated one featured
    pub async fn seed_three(&self) -> Vec<i64> {
        let mut ids = Vec::new();
        for (title, rating, featured) in [("Five", 5.0, false), ("Three", 3.0, true), ("Four", 4.0, false)] {
            ids.push(
                self.create_card(serde_json::json!({
                    "title": title,
                    "status": "published",
                    "rating": rating,
                    "featured": featured,
                }))
                .await,
            );
        }
        ids
    }
}

/// Titles of a `GET /cards` response body
pub fn titles(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .map(|cards| {
            cards
                .iter()
                .filter_map(|c| c["title"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
