use sqlx::FromRow;
use time::OffsetDateTime;

use common::crypto::{Sealed, SecretError};
use common::envelope::{Envelope, SealedAttachment};

use super::Attachment;
use crate::database::types::RowId;
use crate::database::{Database, DatabaseConnection};

/// The shared, encrypted part of a message. Per-recipient state lives in
/// [`Recipient`](super::Recipient).
#[derive(Debug, Clone, FromRow)]
pub struct Message {
    pub id: RowId,
    pub sender_id: RowId,
    pub subject_ciphertext: Vec<u8>,
    pub subject_nonce: Vec<u8>,
    pub body_ciphertext: Vec<u8>,
    pub body_nonce: Vec<u8>,
    pub signature: Vec<u8>,
    pub signature_algorithm: String,
    pub created_at: OffsetDateTime,
}

/// One inbox line: enough to decrypt the subject without loading the body
#[derive(Debug, Clone, FromRow)]
pub struct InboxRow {
    pub message_id: RowId,
    pub sender_email: String,
    pub subject_ciphertext: Vec<u8>,
    pub subject_nonce: Vec<u8>,
    pub wrapped_key: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub read_at: Option<OffsetDateTime>,
}

impl InboxRow {
    pub fn subject(&self) -> Result<Sealed, SecretError> {
        Sealed::from_parts(self.subject_ciphertext.clone(), &self.subject_nonce)
    }
}

impl Message {
    /// A new row for `envelope`, not yet persisted
    pub fn from_envelope(sender_id: RowId, envelope: &Envelope) -> Self {
        Self {
            id: RowId::generate(),
            sender_id,
            subject_ciphertext: envelope.subject.ciphertext().to_vec(),
            subject_nonce: envelope.subject.nonce().to_vec(),
            body_ciphertext: envelope.body.ciphertext().to_vec(),
            body_nonce: envelope.body.nonce().to_vec(),
            signature: envelope.signature.clone(),
            signature_algorithm: envelope.signature_algorithm.clone(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub async fn insert(&self, conn: &mut DatabaseConnection) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO messages (
                id, sender_id, subject_ciphertext, subject_nonce,
                body_ciphertext, body_nonce, signature, signature_algorithm, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(self.id)
        .bind(self.sender_id)
        .bind(&self.subject_ciphertext)
        .bind(&self.subject_nonce)
        .bind(&self.body_ciphertext)
        .bind(&self.body_nonce)
        .bind(&self.signature)
        .bind(&self.signature_algorithm)
        .bind(self.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn get(id: RowId, db: &Database) -> Result<Option<Message>, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            r#"
            SELECT
                id, sender_id, subject_ciphertext, subject_nonce,
                body_ciphertext, body_nonce, signature, signature_algorithm, created_at
            FROM messages
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&**db)
        .await
    }

    /// Messages addressed to `recipient_id` that they have not deleted,
    /// newest first
    pub async fn inbox(recipient_id: RowId, db: &Database) -> Result<Vec<InboxRow>, sqlx::Error> {
        sqlx::query_as::<_, InboxRow>(
            r#"
            SELECT
                m.id AS message_id,
                u.email AS sender_email,
                m.subject_ciphertext,
                m.subject_nonce,
                r.wrapped_key,
                m.created_at,
                r.read_at
            FROM message_recipients r
            JOIN messages m ON m.id = r.message_id
            JOIN users u ON u.id = m.sender_id
            WHERE r.recipient_id = ?1 AND r.deleted_at IS NULL
            ORDER BY m.created_at DESC, m.rowid DESC
            "#,
        )
        .bind(recipient_id)
        .fetch_all(&**db)
        .await
    }

    /// Rebuild the envelope exactly as it was sealed. `attachments` must be
    /// in declaration order.
    pub fn envelope(&self, attachments: &[Attachment]) -> Result<Envelope, SecretError> {
        let attachments = attachments
            .iter()
            .map(|attachment| -> Result<SealedAttachment, SecretError> {
                Ok(SealedAttachment {
                    filename: attachment.filename.clone(),
                    content_type: attachment.content_type.clone(),
                    payload: attachment.sealed()?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Envelope {
            subject: Sealed::from_parts(self.subject_ciphertext.clone(), &self.subject_nonce)?,
            body: Sealed::from_parts(self.body_ciphertext.clone(), &self.body_nonce)?,
            attachments,
            signature: self.signature.clone(),
            signature_algorithm: self.signature_algorithm.clone(),
        })
    }
}
