use reqwest::StatusCode;
use thiserror::Error;

/// Failure talking to the login endpoint.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The server refused the email/password pair (400, 401, 403, 422).
    #[error("Login rejected ({status}): {body}")]
    CredentialsRejected { status: u16, body: String },

    #[error("Too many login attempts - please wait before retrying")]
    Throttled,

    #[error("Login service error: {0}")]
    ServerError(String),

    #[error("Could not reach login service: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Unexpected login response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Classify a non-success response from the login endpoint.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status {
            StatusCode::BAD_REQUEST
            | StatusCode::UNAUTHORIZED
            | StatusCode::FORBIDDEN
            | StatusCode::UNPROCESSABLE_ENTITY => ApiError::CredentialsRejected {
                status: status.as_u16(),
                body: truncated,
            },
            StatusCode::TOO_MANY_REQUESTS => ApiError::Throttled,
            s if s.is_server_error() => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}
