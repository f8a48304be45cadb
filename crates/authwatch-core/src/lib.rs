//! authwatch core - client-side authentication session state.
//!
//! This crate holds a bearer token for the lifetime of a client session,
//! acquires one by exchanging email/password credentials, and clears it
//! automatically once the `exp` claim in its payload has passed.
//!
//! The entry point is [`SessionStore`]. Consumers read the token through
//! [`SessionStore::token`] or subscribe to changes with
//! [`SessionStore::subscribe`]; login failures and expiries are published as
//! [`SessionEvent`]s.

pub mod api;
pub mod auth;
pub mod config;

pub use api::{ApiError, CredentialExchange, HttpCredentialExchange};
pub use auth::{
    AuthError, Clock, ExpiryReason, SessionEvent, SessionStore, SystemClock, TokenClaims,
    TokenError, WatchConfig,
};
pub use config::Config;
