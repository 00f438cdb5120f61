use sqlx::FromRow;

use common::crypto::{Sealed, SecretError};
use common::envelope::SealedAttachment;

use crate::database::types::RowId;
use crate::database::{Database, DatabaseConnection};

/// An encrypted attachment. Name and content type are stored in clear.
#[derive(Debug, Clone, FromRow)]
pub struct Attachment {
    pub id: RowId,
    pub message_id: RowId,
    pub position: i64,
    pub filename: String,
    pub content_type: String,
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
}

impl Attachment {
    /// A new row for the `position`-th attachment of `message_id`
    pub fn from_sealed(message_id: RowId, position: usize, sealed: &SealedAttachment) -> Self {
        Self {
            id: RowId::generate(),
            message_id,
            position: position as i64,
            filename: sealed.filename.clone(),
            content_type: sealed.content_type.clone(),
            ciphertext: sealed.payload.ciphertext().to_vec(),
            nonce: sealed.payload.nonce().to_vec(),
        }
    }

    pub fn sealed(&self) -> Result<Sealed, SecretError> {
        Sealed::from_parts(self.ciphertext.clone(), &self.nonce)
    }

    pub async fn insert(&self, conn: &mut DatabaseConnection) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO attachments (
                id, message_id, position, filename, content_type, ciphertext, nonce
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(self.id)
        .bind(self.message_id)
        .bind(self.position)
        .bind(&self.filename)
        .bind(&self.content_type)
        .bind(&self.ciphertext)
        .bind(&self.nonce)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn get(id: RowId, db: &Database) -> Result<Option<Attachment>, sqlx::Error> {
        sqlx::query_as::<_, Attachment>(
            r#"
            SELECT id, message_id, position, filename, content_type, ciphertext, nonce
            FROM attachments
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&**db)
        .await
    }

    /// All attachments of a message in declaration order
    pub async fn for_message(message_id: RowId, db: &Database) -> Result<Vec<Attachment>, sqlx::Error> {
        sqlx::query_as::<_, Attachment>(
            r#"
            SELECT id, message_id, position, filename, content_type, ciphertext, nonce
            FROM attachments
            WHERE message_id = ?1
            ORDER BY position
            "#,
        )
        .bind(message_id)
        .fetch_all(&**db)
        .await
    }
}
