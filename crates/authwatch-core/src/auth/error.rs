use thiserror::Error;

use crate::api::ApiError;

/// Failure to obtain a token from the credential exchange.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Email and password required")]
    MissingCredentials,

    #[error("Credentials rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}
