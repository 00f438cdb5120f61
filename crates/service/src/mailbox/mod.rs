//! Account and mailbox operations
//!
//! Each operation takes the service [`State`](crate::ServiceState) and, once
//! logged in, the caller's [`Session`]. RSA, AES and Argon2 work is pushed
//! onto tokio's blocking pool so request handling never stalls the executor.

mod accounts;
mod error;
mod read;
mod send;
mod session;
mod update;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub use accounts::{login, logout, register};
pub use error::MailboxError;
pub use read::{attachment, inbox, message};
pub use send::send;
pub use session::{authenticate, Session};
pub use update::{delete, mark_read};

use crate::database::models::User;
use crate::database::RowId;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;
pub const MAX_SUBJECT_LEN: usize = 200;
/// Applies to attachment filenames and content types
pub const MAX_ATTACHMENT_META_LEN: usize = 255;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: RowId,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub user: UserSummary,
    /// `otpauth://` URI to enroll the second factor
    pub totp_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginGrant {
    pub access_token: String,
    pub token_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAttachment {
    pub filename: String,
    pub content_type: String,
    pub data_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub subject: String,
    #[serde(default)]
    pub body: String,
    pub recipients: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<NewAttachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxItem {
    pub id: RowId,
    pub subject: String,
    pub sender_email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub read_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentMeta {
    pub id: RowId,
    pub filename: String,
    pub content_type: String,
    /// plaintext size in bytes
    pub size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDetail {
    pub id: RowId,
    pub subject: String,
    pub body: String,
    pub sender_email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub recipients: Vec<String>,
    /// whether the sender's signature over the ciphertext checked out
    pub verified: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub read_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
    pub attachments: Vec<AttachmentMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub read_at: OffsetDateTime,
}

/// A decrypted attachment, ready to be served
#[derive(Clone)]
pub struct AttachmentContent {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for AttachmentContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentContent")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size", &self.data.len())
            .finish()
    }
}

/// Run CPU-heavy crypto off the async executor
async fn blocking<T, F>(f: F) -> Result<T, MailboxError>
where
    F: FnOnce() -> Result<T, MailboxError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

/// Trim and lowercase an address, rejecting anything that is obviously not one
pub fn normalize_email(raw: &str) -> Result<String, MailboxError> {
    let email = raw.trim().to_lowercase();
    let invalid = || MailboxError::InvalidRequest(format!("Invalid email address: {}", raw.trim()));

    if email.len() > 254 || email.chars().any(|c| c.is_whitespace() || c == ':') {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
    {
        return Err(invalid());
    }
    Ok(email)
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), MailboxError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(MailboxError::InvalidRequest(format!(
            "{} must be between {} and {} characters",
            field, min, max
        )));
    }
    Ok(())
}
