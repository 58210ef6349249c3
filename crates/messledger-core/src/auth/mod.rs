//! Authentication plumbing.
//!
//! This module provides:
//! - `TokenStore`: the bearer-token slot the remote client reads from, with
//!   an OS keychain implementation (`KeyringTokenStore`) and an in-memory one
//! - `SessionData`: the "current session user" persisted in the local store
//!
//! Sessions expire after 7 days, matching the remote token lifetime.

pub mod session;
pub mod token;

pub use session::SessionData;
pub use token::{KeyringTokenStore, MemoryTokenStore, TokenStore};
