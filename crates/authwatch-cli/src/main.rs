//! authwatch - log in and watch the session until it expires.
//!
//! Credentials come from `AUTHWATCH_EMAIL`/`AUTHWATCH_PASSWORD` (a `.env`
//! file is honored), falling back to interactive prompts. The process exits
//! once the session ends or on Ctrl+C.

use std::future::Future;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Result};
use authwatch_core::{Config, HttpCredentialExchange, SessionEvent, SessionStore};
use chrono::{DateTime, Local, Utc};
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ENV_EMAIL: &str = "AUTHWATCH_EMAIL";
const ENV_PASSWORD: &str = "AUTHWATCH_PASSWORD";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    info!("authwatch starting");

    let mut config = Config::load()?;
    let email = resolve_email(std::env::var(ENV_EMAIL).ok(), config.last_email.as_deref())?;
    let password = match std::env::var(ENV_PASSWORD) {
        Ok(password) => password,
        Err(_) => rpassword::prompt_password("Password: ")?,
    };

    let exchange = HttpCredentialExchange::from_config(&config)?;
    let store = SessionStore::new(Arc::new(exchange)).with_watch_config(config.watch_config());
    let mut events = store.events();
    // Subscribe before login so an expiry during the steps below is not missed
    let token_rx = store.subscribe();

    println!("Authenticating...");
    store.authenticate(&email, &password).await;

    // The token may already be expired again here, so read the login outcome
    // from the events rather than from the current token
    let expires_at = login_outcome(&mut events)?;

    config.last_email = Some(email);
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }

    match expires_at {
        Some(expiry) => println!(
            "Login successful, session expires at {}",
            expiry.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        ),
        None => println!("Login successful, but the token expiry is unreadable"),
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };
    match wait_for_session_end(&store, token_rx, shutdown).await {
        SessionEnd::Expired => println!("Session expired"),
        SessionEnd::LoggedOut => println!("Logged out"),
    }

    info!("authwatch shutting down");
    Ok(())
}

/// Find the login result among the events published by `authenticate`.
/// Returns the expiry of the new token, if readable.
fn login_outcome(
    events: &mut broadcast::Receiver<SessionEvent>,
) -> Result<Option<DateTime<Utc>>> {
    loop {
        match events.try_recv() {
            Ok(SessionEvent::Authenticated { expires_at }) => return Ok(expires_at),
            Ok(SessionEvent::AuthenticationFailed { reason }) => bail!("Login failed: {}", reason),
            Ok(SessionEvent::Expired { .. }) | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            Err(_) => bail!("Login failed: unknown error"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Expired,
    LoggedOut,
}

/// Block until the token is cleared or `shutdown` resolves, in which case the
/// session is expired explicitly.
///
/// The current value is checked before waiting, so a receiver that already
/// saw the token cleared returns at once instead of waiting for a change that
/// will never come.
async fn wait_for_session_end<F>(
    store: &SessionStore,
    mut token_rx: watch::Receiver<Option<String>>,
    shutdown: F,
) -> SessionEnd
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        if token_rx.borrow_and_update().is_none() {
            return SessionEnd::Expired;
        }

        tokio::select! {
            changed = token_rx.changed() => {
                if changed.is_err() {
                    return SessionEnd::Expired;
                }
            }
            _ = &mut shutdown => {
                store.expire();
                return SessionEnd::LoggedOut;
            }
        }
    }
}

/// Pick the login email: environment first, then a prompt defaulting to the
/// last used address.
fn resolve_email(from_env: Option<String>, last_email: Option<&str>) -> Result<String> {
    if let Some(email) = from_env.filter(|e| !e.trim().is_empty()) {
        return Ok(email.trim().to_string());
    }

    match last_email {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    choose_email(&input, last_email)
}

fn choose_email(input: &str, last_email: Option<&str>) -> Result<String> {
    let input = input.trim();
    match (input.is_empty(), last_email) {
        (false, _) => Ok(input.to_string()),
        (true, Some(last)) => Ok(last.to_string()),
        (true, None) => bail!("Email required"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use authwatch_core::{AuthError, CredentialExchange, ExpiryReason};

    struct NoExchange;

    #[async_trait]
    impl CredentialExchange for NoExchange {
        async fn exchange(&self, _email: &str, _password: &str) -> Result<String, AuthError> {
            Err(AuthError::Rejected("not used".to_string()))
        }
    }

    fn store() -> SessionStore {
        SessionStore::new(Arc::new(NoExchange))
    }

    // -------------------------------------------------------------------------
    // Session Wait Tests
    // -------------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_when_watch_expires_token() {
        let store = store();
        let token_rx = store.subscribe();
        store.set_token(Some("not-a-real-token".to_string()));

        let end = wait_for_session_end(&store, token_rx, std::future::pending()).await;

        assert_eq!(end, SessionEnd::Expired);
        assert_eq!(store.token(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_when_cleared_before_subscribing() {
        let store = store();
        store.set_token(Some("not-a-real-token".to_string()));
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(store.token(), None);

        // Receiver starts at the cleared value, already marked seen
        let token_rx = store.subscribe();
        let end = tokio::time::timeout(
            Duration::from_secs(5),
            wait_for_session_end(&store, token_rx, std::future::pending()),
        )
        .await
        .expect("wait must not hang on an already cleared token");

        assert_eq!(end, SessionEnd::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_logs_out_on_shutdown() {
        let store = store();
        let token_rx = store.subscribe();
        store.set_token(Some("opaque".to_string()));

        let end = wait_for_session_end(&store, token_rx, async {}).await;

        assert_eq!(end, SessionEnd::LoggedOut);
        assert_eq!(store.token(), None);
    }

    #[test]
    fn test_login_outcome_skips_early_expiry() {
        let expiry = DateTime::from_timestamp(1_700_000_000, 0);
        let (tx, mut rx) = broadcast::channel(4);
        tx.send(SessionEvent::Expired { reason: ExpiryReason::Elapsed }).unwrap();
        tx.send(SessionEvent::Authenticated { expires_at: expiry }).unwrap();

        assert_eq!(login_outcome(&mut rx).expect("login succeeded"), expiry);
    }

    #[test]
    fn test_login_outcome_without_result_is_error() {
        let (tx, mut rx) = broadcast::channel(4);
        tx.send(SessionEvent::Expired { reason: ExpiryReason::Explicit }).unwrap();
        assert!(login_outcome(&mut rx).is_err());
    }

    #[test]
    fn test_login_outcome_reports_failure() {
        let (tx, mut rx) = broadcast::channel(4);
        tx.send(SessionEvent::AuthenticationFailed { reason: "bad password".to_string() })
            .unwrap();
        let err = login_outcome(&mut rx).expect_err("login failed");
        assert!(err.to_string().contains("bad password"));
    }

    // -------------------------------------------------------------------------
    // Email Resolution Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_env_email_wins() {
        let email = resolve_email(Some(" a@b.com ".to_string()), Some("old@b.com"))
            .expect("email from env");
        assert_eq!(email, "a@b.com");
    }

    #[test]
    fn test_choose_email_prefers_input() {
        assert_eq!(choose_email("new@b.com\n", Some("old@b.com")).unwrap(), "new@b.com");
    }

    #[test]
    fn test_choose_email_falls_back_to_last() {
        assert_eq!(choose_email("\n", Some("old@b.com")).unwrap(), "old@b.com");
    }

    #[test]
    fn test_choose_email_requires_something() {
        assert!(choose_email("  \n", None).is_err());
    }
}
