//! Local persistent store, the source of truth while the remote is down.
//!
//! This module provides the `LocalStore`, which keeps one JSON file per
//! entity collection under the data directory and rewrites the whole file
//! on every mutation. All mutations of one collection are funnelled through
//! a single async lock, so concurrent read-modify-write cycles never lose
//! updates.
//!
//! Collections:
//! - users, credentials, messes, join_requests
//! - months (at most one active per mess)
//! - meals, deposits, meal_costs, other_costs
//! - notices, notes, bazar_dates, notifications
//! - current_user (session slot)

pub mod error;
pub mod local;

pub use error::StoreError;
pub use local::{generate_id, LocalStore};
