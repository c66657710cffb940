//! Data models
//!
//! This module contains the data structures used throughout the catalog.
//! Models represent:
//! - Database entities (Card, Term)
//! - Write inputs (CardInput, TermInput)
//! - Typed catalog queries and result pages

mod card;
mod query;
mod term;

pub use card::{Card, CardDetail, CardInput, CardStatus, CardWithTerms, Faq};
pub use query::{
    page_count, CardQuery, CardSort, IncomeRange, ListParams, NumericRange, RangeColumn,
    SearchPage, SortKey, SortOrder, MAX_PER_PAGE,
};
pub use term::{CardTerms, Taxonomy, Term, TermCount, TermInput, TermRef};
