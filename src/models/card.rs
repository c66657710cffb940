//! Card model
//!
//! This module provides:
//! - `Card` entity representing one credit card product
//! - `CardStatus` enum for publication states
//! - `CardInput`, the sanitized write shape used for create and update
//! - Small structured list items (`CardDetail`, `Faq`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::term::CardTerms;

/// Card entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Card {
    /// Unique identifier
    pub id: i64,
    /// URL-friendly slug (unique)
    pub slug: String,
    /// Card name
    pub title: String,
    /// Short summary
    pub excerpt: String,
    /// Markdown content
    pub content: String,
    /// Rendered HTML content
    pub content_html: String,
    /// Publication status
    pub status: CardStatus,
    /// Explicit card artwork
    pub image_url: String,
    /// Featured image, used when no artwork is set
    pub thumbnail_url: String,
    /// Average rating, 0 to 5
    pub rating: f64,
    /// Number of reviews behind the rating
    pub review_count: i64,
    pub annual_fee: String,
    pub joining_fee: String,
    pub welcome_bonus: String,
    pub welcome_bonus_points: i64,
    pub welcome_bonus_type: String,
    pub cashback_rate: String,
    pub credit_limit: String,
    pub interest_rate: String,
    pub processing_time: String,
    pub min_income: String,
    pub min_age: String,
    pub max_age: String,
    pub apply_link: String,
    pub theme_color: String,
    pub gradient: String,
    /// Integer value extracted from `annual_fee`
    pub annual_fee_numeric: i64,
    /// Integer value extracted from `min_income`
    pub min_income_numeric: i64,
    /// Reward rate percentage, 0 to 100
    pub reward_rate: f64,
    pub reward_type: String,
    pub reward_conversion_rate: String,
    pub reward_score: f64,
    pub fees_score: f64,
    pub benefits_score: f64,
    pub support_score: f64,
    pub overall_score: f64,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub best_for: Vec<String>,
    pub documents: Vec<String>,
    pub features: Vec<CardDetail>,
    pub rewards: Vec<CardDetail>,
    pub fees: Vec<CardDetail>,
    pub eligibility: Vec<CardDetail>,
    pub custom_faqs: Vec<Faq>,
    /// Promoted to the top of the default ordering
    pub featured: bool,
    pub trending: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Card {
    /// Whether the card is visible to catalog readers
    pub fn is_published(&self) -> bool {
        self.status == CardStatus::Published
    }

    /// Image shown in listings: the explicit artwork, else the featured image
    pub fn display_image(&self) -> Option<&str> {
        [self.image_url.as_str(), self.thumbnail_url.as_str()]
            .into_iter()
            .find(|url| !url.is_empty())
    }
}

/// Card publication status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    /// Draft - not visible to the catalog
    #[default]
    Draft,
    /// Published - visible to the catalog
    Published,
    /// Trashed - hidden, kept for recovery
    Trashed,
}

impl CardStatus {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::Draft => "draft",
            CardStatus::Published => "published",
            CardStatus::Trashed => "trashed",
        }
    }

    /// Parse from string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(CardStatus::Draft),
            "published" | "publish" => Some(CardStatus::Published),
            "trashed" | "trash" => Some(CardStatus::Trashed),
            _ => None,
        }
    }
}

impl std::fmt::Display for CardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Titled list entry used by features, rewards, fees and eligibility
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CardDetail {
    pub title: String,
    pub description: String,
    pub icon: String,
}

/// Question and answer pair
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Faq {
    pub question: String,
    pub answer: String,
}

/// A card together with its taxonomy assignments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardWithTerms {
    #[serde(flatten)]
    pub card: Card,
    pub terms: CardTerms,
}

/// Sanitized card data for create and update.
///
/// Produced by `services::schema::sanitize_card`; the derived fields at the
/// bottom are filled by the card service before the write.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CardInput {
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub status: CardStatus,
    pub image_url: String,
    pub thumbnail_url: String,
    pub rating: f64,
    pub review_count: i64,
    pub annual_fee: String,
    pub joining_fee: String,
    pub welcome_bonus: String,
    pub welcome_bonus_points: i64,
    pub welcome_bonus_type: String,
    pub cashback_rate: String,
    pub credit_limit: String,
    pub interest_rate: String,
    pub processing_time: String,
    pub min_income: String,
    pub min_age: String,
    pub max_age: String,
    pub apply_link: String,
    pub theme_color: String,
    pub gradient: String,
    pub reward_rate: f64,
    pub reward_type: String,
    pub reward_conversion_rate: String,
    pub reward_score: f64,
    pub fees_score: f64,
    pub benefits_score: f64,
    pub support_score: f64,
    /// Absent means "derive from the sub-scores"
    pub overall_score: Option<f64>,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub best_for: Vec<String>,
    pub documents: Vec<String>,
    pub features: Vec<CardDetail>,
    pub rewards: Vec<CardDetail>,
    pub fees: Vec<CardDetail>,
    pub eligibility: Vec<CardDetail>,
    pub custom_faqs: Vec<Faq>,
    pub featured: bool,
    pub trending: bool,
    /// Bank term slugs, first one is the primary bank
    pub banks: Vec<String>,
    /// Network term slugs, first one is the primary network
    pub networks: Vec<String>,
    /// Category term slugs
    pub categories: Vec<String>,

    #[serde(skip)]
    pub content_html: String,
    #[serde(skip)]
    pub annual_fee_numeric: i64,
    #[serde(skip)]
    pub min_income_numeric: i64,
}

impl CardInput {
    /// Rebuild the writable shape of a stored card, used as the base for updates
    pub fn from_card(card: &Card, terms: &CardTerms) -> Self {
        Self {
            title: card.title.clone(),
            slug: card.slug.clone(),
            excerpt: card.excerpt.clone(),
            content: card.content.clone(),
            status: card.status,
            image_url: card.image_url.clone(),
            thumbnail_url: card.thumbnail_url.clone(),
            rating: card.rating,
            review_count: card.review_count,
            annual_fee: card.annual_fee.clone(),
            joining_fee: card.joining_fee.clone(),
            welcome_bonus: card.welcome_bonus.clone(),
            welcome_bonus_points: card.welcome_bonus_points,
            welcome_bonus_type: card.welcome_bonus_type.clone(),
            cashback_rate: card.cashback_rate.clone(),
            credit_limit: card.credit_limit.clone(),
            interest_rate: card.interest_rate.clone(),
            processing_time: card.processing_time.clone(),
            min_income: card.min_income.clone(),
            min_age: card.min_age.clone(),
            max_age: card.max_age.clone(),
            apply_link: card.apply_link.clone(),
            theme_color: card.theme_color.clone(),
            gradient: card.gradient.clone(),
            reward_rate: card.reward_rate,
            reward_type: card.reward_type.clone(),
            reward_conversion_rate: card.reward_conversion_rate.clone(),
            reward_score: card.reward_score,
            fees_score: card.fees_score,
            benefits_score: card.benefits_score,
            support_score: card.support_score,
            overall_score: Some(card.overall_score),
            pros: card.pros.clone(),
            cons: card.cons.clone(),
            best_for: card.best_for.clone(),
            documents: card.documents.clone(),
            features: card.features.clone(),
            rewards: card.rewards.clone(),
            fees: card.fees.clone(),
            eligibility: card.eligibility.clone(),
            custom_faqs: card.custom_faqs.clone(),
            featured: card.featured,
            trending: card.trending,
            banks: terms.banks.iter().map(|t| t.slug.clone()).collect(),
            networks: terms.networks.iter().map(|t| t.slug.clone()).collect(),
            categories: terms.categories.iter().map(|t| t.slug.clone()).collect(),
            content_html: card.content_html.clone(),
            annual_fee_numeric: card.annual_fee_numeric,
            min_income_numeric: card.min_income_numeric,
        }
    }

    /// Overall score to persist: the explicit one, else the rounded mean of the sub-scores
    pub fn effective_overall_score(&self) -> f64 {
        match self.overall_score {
            Some(score) => score,
            None => {
                let sum = self.reward_score + self.fees_score + self.benefits_score + self.support_score;
                (sum / 4.0 * 10.0).round() / 10.0
            }
        }
    }
}
