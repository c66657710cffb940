//! Cardfinder - A credit card catalog service

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cardfinder::{
    api::{self, AppState},
    cache::create_cache,
    config::{Config, ENV_PREFIX},
    db::{
        self,
        repositories::{SqlxCardRepository, SqlxTermRepository},
        DatabasePool,
    },
    services::{seed, CardService, FacetService, TermService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cardfinder=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting cardfinder...");

    // Load configuration
    let config_path = std::env::var(format!("{}CONFIG", ENV_PREFIX))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.yml"));
    let config = Config::load_with_env(&config_path)?;
    tracing::info!("Configuration loaded from {}", config_path.display());

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Initialize cache
    let cache = create_cache(&config.cache);

    // Create repositories
    let card_repo = SqlxCardRepository::boxed(pool.clone());
    let term_repo = SqlxTermRepository::boxed(pool.clone());

    // Initialize services
    let term_service = Arc::new(TermService::new(term_repo.clone(), cache.clone()));
    let card_service = Arc::new(CardService::new(
        card_repo.clone(),
        term_repo.clone(),
        cache.clone(),
        config.catalog.clone(),
    ));
    let facet_service = Arc::new(FacetService::new(card_repo, term_repo, cache));

    // Import seed data
    if let Some(seed_path) = &config.catalog.seed_path {
        seed::import_file(seed_path, &term_service, &card_service).await?;
    }

    if config.server.admin_token.is_none() {
        tracing::warn!("No admin token configured, admin routes are locked");
    }

    let state = AppState {
        pool: pool.clone(),
        card_service,
        facet_service,
        term_service,
        admin_token: config.server.admin_token.as_deref().map(Arc::from),
    };

    // Build router
    let app = api::build_router(state, &config.server.cors_origin)?;

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    pool.close().await;
    Ok(())
}
