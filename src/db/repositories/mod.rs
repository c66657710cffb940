//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for one entity and dispatches on the
//! configured driver.

pub mod card;
pub mod term;

pub use card::{CardRepository, SqlxCardRepository};
pub use term::{SqlxTermRepository, TermRepository};
