//! Card presentation
//!
//! Turns stored cards into the JSON records served by the API, in a summary
//! shape for listings and a full shape for detail and comparison views.
//! Also hosts the value helpers shared by the write path and the facet
//! labels: numeric extraction, clamping sanitizers and currency formatting.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Card, CardDetail, CardTerms, CardWithTerms, Faq, Term, TermRef};

/// Integer value of a free-text amount.
///
/// Keeps ASCII digits and dots, then parses the part before the first dot,
/// so `"₹2,500"` is 2500 and `"3.5 Lakh"` is 3. Empty or non-numeric input
/// is 0; values past `i64::MAX` saturate.
pub fn extract_numeric(input: &str) -> i64 {
    let kept: String = input
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let integer_part = kept.split('.').next().unwrap_or_default();

    integer_part.bytes().fold(0i64, |acc, digit| {
        acc.saturating_mul(10).saturating_add(i64::from(digit - b'0'))
    })
}

fn clamp_finite(value: f64, min: f64, max: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        min
    }
}

/// Rating in [0, 5]
pub fn sanitize_rating(value: f64) -> f64 {
    clamp_finite(value, 0.0, 5.0)
}

/// Sub-score in [0, 5]
pub fn sanitize_score(value: f64) -> f64 {
    clamp_finite(value, 0.0, 5.0)
}

/// Percentage in [0, 100]
pub fn sanitize_percentage(value: f64) -> f64 {
    clamp_finite(value, 0.0, 100.0)
}

/// Non-negative count
pub fn sanitize_count(value: i64) -> i64 {
    value.max(0)
}

/// Format an amount the way Indian card listings write it.
///
/// Crore and lakh amounts get one decimal (`"1.5 Cr"`, `"2.5 L"`), smaller
/// amounts are comma grouped (`"2,500"`). With `free_if_zero`, zero reads
/// `"Free"`. Input that is not a number comes back unchanged.
pub fn format_currency(input: &str, free_if_zero: bool) -> String {
    let trimmed = input.trim();
    let amount = match trimmed.parse::<f64>() {
        Ok(amount) if amount.is_finite() => amount,
        _ => return input.to_string(),
    };

    if amount == 0.0 && free_if_zero {
        return "Free".to_string();
    }

    if amount >= 10_000_000.0 {
        format!("{:.1} Cr", amount / 10_000_000.0)
    } else if amount >= 100_000.0 {
        format!("{:.1} L", amount / 100_000.0)
    } else {
        group_thousands(amount.trunc() as i64)
    }
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// How much of a card to present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detail {
    Summary,
    Full,
}

/// Listing shape
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CardSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub link: String,
    pub excerpt: String,
    pub image: Option<String>,
    pub rating: f64,
    pub review_count: i64,
    pub annual_fee: String,
    pub joining_fee: String,
    pub welcome_bonus: String,
    pub cashback_rate: String,
    pub apply_link: String,
    pub featured: bool,
    pub trending: bool,
    pub theme_color: String,
    pub bank: Option<TermRef>,
    pub network: Option<TermRef>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Scores {
    pub reward: f64,
    pub fees: f64,
    pub benefits: f64,
    pub support: f64,
    pub overall: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RewardsInfo {
    pub rate: f64,
    #[serde(rename = "type")]
    pub reward_type: String,
    pub conversion_rate: String,
}

/// Detail shape: the summary plus everything else a reader may need
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CardFull {
    #[serde(flatten)]
    pub summary: CardSummary,
    pub content: String,
    pub credit_limit: String,
    pub interest_rate: String,
    pub processing_time: String,
    pub min_income: String,
    pub min_age: String,
    pub max_age: String,
    pub welcome_bonus_points: i64,
    pub welcome_bonus_type: String,
    pub gradient: String,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub best_for: Vec<String>,
    pub documents: Vec<String>,
    pub features: Vec<CardDetail>,
    pub rewards: Vec<CardDetail>,
    pub fees: Vec<CardDetail>,
    pub eligibility: Vec<CardDetail>,
    pub custom_faqs: Vec<Faq>,
    pub banks: Vec<TermRef>,
    pub networks: Vec<TermRef>,
    pub categories: Vec<TermRef>,
    pub scores: Scores,
    pub rewards_info: RewardsInfo,
    pub annual_fee_numeric: i64,
    pub min_income_numeric: i64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Either presentation shape
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum PresentedCard {
    Summary(CardSummary),
    Full(Box<CardFull>),
}

/// Builds presentation records; owns the public base URL for card links
#[derive(Debug, Clone)]
pub struct CardPresenter {
    base_url: String,
}

impl CardPresenter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Public page of a card
    pub fn link(&self, slug: &str) -> String {
        format!("{}/credit-card/{}/", self.base_url.trim_end_matches('/'), slug)
    }

    pub fn present(&self, card: &CardWithTerms, detail: Detail) -> PresentedCard {
        match detail {
            Detail::Summary => PresentedCard::Summary(self.summary(&card.card, &card.terms)),
            Detail::Full => PresentedCard::Full(Box::new(self.full(&card.card, &card.terms))),
        }
    }

    pub fn summary(&self, card: &Card, terms: &CardTerms) -> CardSummary {
        CardSummary {
            id: card.id,
            title: card.title.clone(),
            slug: card.slug.clone(),
            link: self.link(&card.slug),
            excerpt: card.excerpt.clone(),
            image: card.display_image().map(str::to_string),
            rating: card.rating,
            review_count: card.review_count,
            annual_fee: card.annual_fee.clone(),
            joining_fee: card.joining_fee.clone(),
            welcome_bonus: card.welcome_bonus.clone(),
            cashback_rate: card.cashback_rate.clone(),
            apply_link: card.apply_link.clone(),
            featured: card.featured,
            trending: card.trending,
            theme_color: card.theme_color.clone(),
            bank: terms.primary_bank().map(TermRef::from),
            network: terms.primary_network().map(TermRef::from),
        }
    }

    pub fn full(&self, card: &Card, terms: &CardTerms) -> CardFull {
        let refs = |list: &[Term]| -> Vec<TermRef> { list.iter().map(TermRef::from).collect() };

        CardFull {
            summary: self.summary(card, terms),
            content: card.content_html.clone(),
            credit_limit: card.credit_limit.clone(),
            interest_rate: card.interest_rate.clone(),
            processing_time: card.processing_time.clone(),
            min_income: card.min_income.clone(),
            min_age: card.min_age.clone(),
            max_age: card.max_age.clone(),
            welcome_bonus_points: card.welcome_bonus_points,
            welcome_bonus_type: card.welcome_bonus_type.clone(),
            gradient: card.gradient.clone(),
            pros: card.pros.clone(),
            cons: card.cons.clone(),
            best_for: card.best_for.clone(),
            documents: card.documents.clone(),
            features: card.features.clone(),
            rewards: card.rewards.clone(),
            fees: card.fees.clone(),
            eligibility: card.eligibility.clone(),
            custom_faqs: card.custom_faqs.clone(),
            banks: refs(&terms.banks),
            networks: refs(&terms.networks),
            categories: refs(&terms.categories),
            scores: Scores {
                reward: card.reward_score,
                fees: card.fees_score,
                benefits: card.benefits_score,
                support: card.support_score,
                overall: card.overall_score,
            },
            rewards_info: RewardsInfo {
                rate: card.reward_rate,
                reward_type: card.reward_type.clone(),
                conversion_rate: card.reward_conversion_rate.clone(),
            },
            annual_fee_numeric: card.annual_fee_numeric,
            min_income_numeric: card.min_income_numeric,
            created_at: card.created_at,
            modified_at: card.updated_at,
        }
    }
}
