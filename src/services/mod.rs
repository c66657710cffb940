//! Services layer - Business logic
//!
//! This module contains the business logic of the card catalog.
//! Services are responsible for:
//! - Parsing catalog searches and presenting their results
//! - Aggregating facet counts
//! - Sanitizing and validating card and term writes
//! - Coordinating between repositories and cache

pub mod card;
pub mod facet;
pub mod markdown;
pub mod presenter;
pub mod schema;
pub mod search;
pub mod seed;
pub mod term;

pub use card::{CardService, CardServiceError};
pub use facet::{FacetService, Facets};
pub use markdown::MarkdownRenderer;
pub use presenter::{
    extract_numeric, format_currency, CardFull, CardPresenter, CardSummary, Detail, PresentedCard,
};
pub use schema::{generate_slug, sanitize_card, SchemaError};
pub use search::{build_query, SearchParams};
pub use seed::SeedReport;
pub use term::{TermService, TermServiceError};
