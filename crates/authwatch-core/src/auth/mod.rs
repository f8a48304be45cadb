//! Authentication module for managing the client session.
//!
//! This module provides:
//! - `SessionStore`: Token storage with an automatic expiration watch
//! - `token`: Payload decoding for the `exp` claim of compact JWTs
//! - `SessionEvent`: Login and expiry notifications for observers
//!
//! Sessions live in memory only and end when the store is dropped.

pub mod clock;
pub mod error;
pub mod events;
pub mod session;
pub mod token;

pub use clock::{Clock, SystemClock, TokioClock};
pub use error::AuthError;
pub use events::{ExpiryReason, SessionEvent};
pub use session::{SessionStore, WatchConfig};
pub use token::{TokenClaims, TokenError};
