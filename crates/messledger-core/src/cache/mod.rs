//! Short-lived response caching.
//!
//! This module provides the `ResponseCache` that sits in front of remote
//! reads. Entries live for a few seconds (see [`Ttl`]) and concurrent reads
//! of the same key share one in-flight request.
//!
//! Keys are built with the helpers in [`keys`] so that reads and write
//! invalidations always agree on the naming scheme.

pub mod keys;
pub mod response;

pub use response::{ResponseCache, Ttl};
