use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;

use common::crypto::{CustodyError, KeyError, SecretError};
use common::envelope::EnvelopeError;

use crate::auth::{PasswordError, TokenError, TotpError};

#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    // caller errors
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("too many requests")]
    RateLimited,
    #[error("invalid token")]
    InvalidToken,
    #[error("session expired")]
    SessionExpired,
    #[error("user already exists")]
    UserExists,
    #[error("recipients not found: {}", .0.join(", "))]
    RecipientsNotFound(Vec<String>),
    #[error("not found")]
    NotFound,
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // server errors
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("stored ciphertext is malformed: {0}")]
    Secret(#[from] SecretError),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    #[error("custody error: {0}")]
    Custody(#[from] CustodyError),
    #[error("password hashing error: {0}")]
    Password(#[from] PasswordError),
    #[error("token error: {0}")]
    Token(#[from] TokenError),
    #[error("totp error: {0}")]
    Totp(#[from] TotpError),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl MailboxError {
    pub fn status(&self) -> StatusCode {
        match self {
            MailboxError::InvalidCredentials
            | MailboxError::InvalidToken
            | MailboxError::SessionExpired => StatusCode::UNAUTHORIZED,
            MailboxError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            MailboxError::UserExists | MailboxError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            MailboxError::RecipientsNotFound(_) | MailboxError::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// What the client gets to see. Server-side detail stays in the logs.
    pub fn client_message(&self) -> String {
        match self {
            MailboxError::InvalidCredentials => "Invalid credentials".to_string(),
            MailboxError::RateLimited => "Too many requests".to_string(),
            MailboxError::InvalidToken => "Invalid token".to_string(),
            MailboxError::SessionExpired => "Session expired".to_string(),
            MailboxError::UserExists => "User already exists".to_string(),
            MailboxError::RecipientsNotFound(missing) => {
                format!("Recipients not found: {}", missing.join(", "))
            }
            MailboxError::NotFound => "Not found".to_string(),
            MailboxError::InvalidRequest(msg) => msg.clone(),
            MailboxError::Envelope(_) | MailboxError::Secret(_) => {
                "Unable to open message".to_string()
            }
            _ => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for MailboxError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("mailbox error: {}", self);
        } else {
            tracing::debug!("mailbox request rejected: {}", self);
        }

        let body = serde_json::json!({ "msg": self.client_message() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            MailboxError::InvalidCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            MailboxError::RateLimited.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            MailboxError::RecipientsNotFound(vec!["x@example.com".into()]).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            MailboxError::Envelope(EnvelopeError::Decryption).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_client_messages_are_generic() {
        assert_eq!(
            MailboxError::Envelope(EnvelopeError::KeyUnwrap).client_message(),
            "Unable to open message"
        );
        assert_eq!(
            MailboxError::Custody(CustodyError::AuthenticationFailure).client_message(),
            "Internal server error"
        );
        assert_eq!(
            MailboxError::RecipientsNotFound(vec!["a@x.io".into(), "b@x.io".into()])
                .client_message(),
            "Recipients not found: a@x.io, b@x.io"
        );
    }
}
