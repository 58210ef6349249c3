//! REST client module for the mess backend.
//!
//! This module provides the `RemoteClient` for talking to the remote
//! authoritative service, the `ApiRequest` descriptor every call is built
//! from, and the error taxonomy that separates connectivity failures from
//! application rejections.
//!
//! Authenticated calls carry a JWT bearer token read from a `TokenStore`.

pub mod client;
pub mod error;
pub mod request;

pub use client::{AuthPayload, HealthStatus, RemoteClient, ResponseBody};
pub use error::{ApiError, ConnectivityFailure, RemoteError};
pub use request::{ApiRequest, Method};
