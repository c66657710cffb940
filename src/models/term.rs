//! Taxonomy term model
//!
//! Banks, networks and categories share one term table, told apart by
//! `Taxonomy`. Categories may have a parent; banks and networks are flat.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Vocabulary a term belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Taxonomy {
    Bank,
    Network,
    Category,
}

impl Taxonomy {
    /// Every taxonomy, in presentation order
    pub const ALL: [Taxonomy; 3] = [Taxonomy::Bank, Taxonomy::Network, Taxonomy::Category];

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Taxonomy::Bank => "bank",
            Taxonomy::Network => "network",
            Taxonomy::Category => "category",
        }
    }

    /// Parse from string representation (singular or plural)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bank" | "banks" => Some(Taxonomy::Bank),
            "network" | "networks" => Some(Taxonomy::Network),
            "category" | "categories" => Some(Taxonomy::Category),
            _ => None,
        }
    }

    /// Whether terms of this taxonomy may have a parent
    pub fn is_hierarchical(&self) -> bool {
        matches!(self, Taxonomy::Category)
    }
}

impl std::fmt::Display for Taxonomy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Term entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Term {
    /// Unique identifier
    pub id: i64,
    /// Owning vocabulary
    pub taxonomy: Taxonomy,
    /// URL-friendly slug, unique within the taxonomy
    pub slug: String,
    /// Display name
    pub name: String,
    /// Parent term (categories only)
    pub parent_id: Option<i64>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Input for creating or updating a term
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TermInput {
    pub name: String,
    /// Generated from the name when empty
    pub slug: String,
    /// Slug of the parent category
    pub parent: Option<String>,
}

/// Compact term reference embedded in card output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TermRef {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

impl From<&Term> for TermRef {
    fn from(term: &Term) -> Self {
        Self {
            id: term.id,
            name: term.name.clone(),
            slug: term.slug.clone(),
        }
    }
}

/// Term assignments of one card, grouped by taxonomy and kept in assignment order
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CardTerms {
    pub banks: Vec<Term>,
    pub networks: Vec<Term>,
    pub categories: Vec<Term>,
}

impl CardTerms {
    /// Group an ordered term list by taxonomy
    pub fn from_terms(terms: impl IntoIterator<Item = Term>) -> Self {
        let mut grouped = Self::default();
        for term in terms {
            match term.taxonomy {
                Taxonomy::Bank => grouped.banks.push(term),
                Taxonomy::Network => grouped.networks.push(term),
                Taxonomy::Category => grouped.categories.push(term),
            }
        }
        grouped
    }

    /// First assigned bank
    pub fn primary_bank(&self) -> Option<&Term> {
        self.banks.first()
    }

    /// First assigned network
    pub fn primary_network(&self) -> Option<&Term> {
        self.networks.first()
    }
}

/// Term with the number of published cards referencing it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TermCount {
    pub slug: String,
    pub name: String,
    pub count: i64,
    /// Parent slug, only for nested categories
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(id: i64, taxonomy: Taxonomy, slug: &str) -> Term {
        Term {
            id,
            taxonomy,
            slug: slug.to_string(),
            name: slug.to_uppercase(),
            parent_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_taxonomy_parse() {
        assert_eq!(Taxonomy::from_str("bank"), Some(Taxonomy::Bank));
        assert_eq!(Taxonomy::from_str("Networks"), Some(Taxonomy::Network));
        assert_eq!(Taxonomy::from_str("categories"), Some(Taxonomy::Category));
        assert_eq!(Taxonomy::from_str("store"), None);
        assert!(Taxonomy::Category.is_hierarchical());
        assert!(!Taxonomy::Bank.is_hierarchical());
    }

    #[test]
    fn test_card_terms_grouping_keeps_order() {
        let grouped = CardTerms::from_terms(vec![
            term(1, Taxonomy::Bank, "hdfc"),
            term(2, Taxonomy::Network, "visa"),
            term(3, Taxonomy::Bank, "sbi"),
            term(4, Taxonomy::Category, "travel"),
        ]);

        assert_eq!(grouped.banks.len(), 2);
        assert_eq!(grouped.primary_bank().map(|t| t.slug.as_str()), Some("hdfc"));
        assert_eq!(grouped.primary_network().map(|t| t.slug.as_str()), Some("visa"));
        assert_eq!(grouped.categories[0].slug, "travel");
    }

    #[test]
    fn test_term_count_hides_missing_parent() {
        let count = TermCount {
            slug: "visa".to_string(),
            name: "Visa".to_string(),
            count: 3,
            parent: None,
        };
        let value = serde_json::to_value(&count).unwrap();
        assert!(value.get("parent").is_none());
    }
}
