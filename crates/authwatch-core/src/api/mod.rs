//! Credential exchange module.
//!
//! This module provides the `CredentialExchange` seam the session store logs
//! in through, and `HttpCredentialExchange`, which trades an email/password
//! pair for a bearer token over HTTP.

pub mod client;
pub mod error;
pub mod exchange;

pub use client::HttpCredentialExchange;
pub use error::ApiError;
pub use exchange::CredentialExchange;
