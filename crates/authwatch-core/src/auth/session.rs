//! Session store with automatic token expiry.
//!
//! The store owns the current bearer token and a background watch task that
//! re-checks the token's `exp` claim once per `check_interval`. Every token
//! change aborts the running watch before a new one is armed, and dropping the
//! store aborts it as well, so a watch never outlives the token it was armed
//! for.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::api::CredentialExchange;

use super::clock::{Clock, SystemClock};
use super::events::{ExpiryReason, SessionEvent, EVENT_CHANNEL_CAPACITY};
use super::token;

/// Default period between expiry checks.
/// One second notices expiry promptly without busy-looping.
const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Floor for the check period; `tokio::time::interval` rejects zero.
const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Timing of the expiration watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchConfig {
    pub check_interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }
}

pub struct SessionStore {
    exchange: Arc<dyn CredentialExchange>,
    clock: Arc<dyn Clock>,
    config: WatchConfig,
    token_tx: Arc<watch::Sender<Option<String>>>,
    events_tx: broadcast::Sender<SessionEvent>,
    watch_task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    /// Create an unauthenticated store using the system clock.
    pub fn new(exchange: Arc<dyn CredentialExchange>) -> Self {
        let (token_tx, _) = watch::channel(None);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            exchange,
            clock: Arc::new(SystemClock),
            config: WatchConfig::default(),
            token_tx: Arc::new(token_tx),
            events_tx,
            watch_task: Mutex::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_watch_config(mut self, config: WatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Current token, if authenticated.
    pub fn token(&self) -> Option<String> {
        self.token_tx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token_tx.borrow().is_some()
    }

    /// Expiration decoded from the current token.
    /// `None` when unauthenticated or when the token cannot be decoded.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let current = self.token_tx.borrow();
        current
            .as_deref()
            .and_then(|token| token::expires_at(token).ok())
    }

    /// Subscribe to token changes. The receiver starts at the current value.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.token_tx.subscribe()
    }

    /// Subscribe to login and expiry notifications.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    /// Replace the stored token and re-arm the expiration watch.
    ///
    /// No validation happens here; an unreadable token is expired by the
    /// watch on its first check. Setting `Some` must happen inside a Tokio
    /// runtime because it spawns the watch task.
    pub fn set_token(&self, token: Option<String>) {
        let mut watch_task = self.lock_watch_task();
        Self::cancel_watch(&mut watch_task);

        self.token_tx.send_replace(token.clone());

        if let Some(token) = token {
            *watch_task = Some(self.spawn_watch(token));
        }
    }

    /// Clear the token. Calling this while unauthenticated is a no-op.
    pub fn expire(&self) {
        let mut watch_task = self.lock_watch_task();
        Self::cancel_watch(&mut watch_task);

        if self.token_tx.send_replace(None).is_some() {
            info!("Session expired");
            self.publish(SessionEvent::Expired {
                reason: ExpiryReason::Explicit,
            });
        }
    }

    /// Exchange credentials for a token and store it.
    ///
    /// Failures leave the current token untouched and are reported through
    /// tracing and [`SessionEvent::AuthenticationFailed`], never returned.
    pub async fn authenticate(&self, email: &str, password: &str) {
        match self.exchange.exchange(email, password).await {
            Ok(token) => {
                let (subject, expires_at) = match token::decode_claims(&token) {
                    Ok(claims) => match claims.expires_at() {
                        Ok(expiry) => (claims.sub, Some(expiry)),
                        Err(e) => {
                            warn!(error = %e, "Received token has no readable expiration");
                            (claims.sub, None)
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "Received token has no readable expiration");
                        (None, None)
                    }
                };
                self.set_token(Some(token));
                info!(subject = subject.as_deref().unwrap_or("-"), ?expires_at, "Login successful");
                self.publish(SessionEvent::Authenticated { expires_at });
            }
            Err(e) => {
                error!(error = %e, "Login failed");
                self.publish(SessionEvent::AuthenticationFailed {
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Run [`authenticate`](Self::authenticate) on a background task.
    pub fn spawn_authenticate(
        self: &Arc<Self>,
        email: String,
        password: String,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            store.authenticate(&email, &password).await;
        })
    }

    fn spawn_watch(&self, token: String) -> JoinHandle<()> {
        let period = self.config.check_interval.max(MIN_CHECK_INTERVAL);
        debug!(interval_ms = period.as_millis() as u64, "Arming expiration watch");
        let watch = ExpirationWatch {
            token,
            token_tx: Arc::clone(&self.token_tx),
            events_tx: self.events_tx.clone(),
            clock: Arc::clone(&self.clock),
            period,
        };
        tokio::spawn(watch.run())
    }

    fn cancel_watch(watch_task: &mut Option<JoinHandle<()>>) {
        if let Some(task) = watch_task.take() {
            task.abort();
            debug!("Cancelled expiration watch");
        }
    }

    fn lock_watch_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        // The guarded handle stays valid even if a holder panicked
        self.watch_task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events_tx.send(event);
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        let watch_task = self
            .watch_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        Self::cancel_watch(watch_task);
    }
}

/// Periodic expiry check scoped to a single token value.
struct ExpirationWatch {
    token: String,
    token_tx: Arc<watch::Sender<Option<String>>>,
    events_tx: broadcast::Sender<SessionEvent>,
    clock: Arc<dyn Clock>,
    period: Duration,
}

impl ExpirationWatch {
    async fn run(self) {
        let mut ticker = time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let reason = match token::expires_at(&self.token) {
                Ok(expiry) if self.clock.now() >= expiry => ExpiryReason::Elapsed,
                Ok(_) => continue,
                Err(e) => {
                    error!(error = %e, "Session token is unreadable, expiring session");
                    ExpiryReason::Malformed
                }
            };

            self.clear(reason);
            return;
        }
    }

    /// Clear the token only if it is still the one this watch was armed for.
    fn clear(&self, reason: ExpiryReason) {
        let cleared = self.token_tx.send_if_modified(|current| {
            if current.as_deref() == Some(self.token.as_str()) {
                *current = None;
                true
            } else {
                false
            }
        });

        if cleared {
            info!(?reason, "Session expired");
            let _ = self.events_tx.send(SessionEvent::Expired { reason });
        } else {
            debug!("Token changed before expiry, leaving replacement in place");
        }
    }
}
