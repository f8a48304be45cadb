//! Session lifecycle notifications.
//!
//! Login failures never surface as errors to the caller of
//! `SessionStore::authenticate`; observers learn about them here instead.

use chrono::{DateTime, Utc};

/// Buffer size for the session event broadcast channel.
/// Slow subscribers lag instead of blocking the store.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryReason {
    /// The `exp` claim has passed.
    Elapsed,
    /// The token payload could not be decoded.
    Malformed,
    /// `SessionStore::expire` was called.
    Explicit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A login succeeded. `expires_at` is `None` when the new token is unreadable.
    Authenticated { expires_at: Option<DateTime<Utc>> },
    AuthenticationFailed { reason: String },
    Expired { reason: ExpiryReason },
}
