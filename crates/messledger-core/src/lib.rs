//! messledger core - shared household expense tracking.
//!
//! This crate holds everything except the front end:
//!
//! - `service`: `DataService`, remote-first data access with local fallback
//! - `connectivity`: tracks whether the remote and its data store are up
//! - `api`: REST client and the connectivity/rejection error split
//! - `cache`: short-lived response cache with request de-duplication
//! - `store`: JSON-file local store, authoritative while offline
//! - `allocation`: meal rate, shared cost split and member balances
//! - `models`: entities shared by all of the above
//! - `auth`, `config`: token storage, sessions and settings

pub mod allocation;
pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod models;
pub mod service;
pub mod store;

pub use config::Config;
pub use service::{DataService, DataSourceEvent, Served, ServiceError};
