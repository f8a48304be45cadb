use async_trait::async_trait;

use crate::auth::AuthError;

/// Trades login credentials for a signed bearer token.
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    async fn exchange(&self, email: &str, password: &str) -> Result<String, AuthError>;
}
