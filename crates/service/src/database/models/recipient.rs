use sqlx::FromRow;
use time::OffsetDateTime;

use common::crypto::KeyGrant;

use crate::database::types::RowId;
use crate::database::{Database, DatabaseConnection};

/// A recipient's grant on a message: their wrapped copy of the message key
/// plus their own read/delete state
#[derive(Debug, Clone, FromRow)]
pub struct Recipient {
    pub message_id: RowId,
    pub recipient_id: RowId,
    pub position: i64,
    pub wrapped_key: Vec<u8>,
    pub read_at: Option<OffsetDateTime>,
    pub deleted_at: Option<OffsetDateTime>,
}

impl Recipient {
    pub fn grant(&self) -> KeyGrant {
        KeyGrant::from(self.wrapped_key.clone())
    }

    pub async fn insert(
        message_id: RowId,
        recipient_id: RowId,
        position: usize,
        grant: &KeyGrant,
        conn: &mut DatabaseConnection,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO message_recipients (message_id, recipient_id, position, wrapped_key)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(message_id)
        .bind(recipient_id)
        .bind(position as i64)
        .bind(grant.bytes())
        .execute(conn)
        .await?;
        Ok(())
    }

    /// The grant of `recipient_id` on `message_id`, unless they deleted it
    pub async fn active(
        message_id: RowId,
        recipient_id: RowId,
        db: &Database,
    ) -> Result<Option<Recipient>, sqlx::Error> {
        sqlx::query_as::<_, Recipient>(
            r#"
            SELECT message_id, recipient_id, position, wrapped_key, read_at, deleted_at
            FROM message_recipients
            WHERE message_id = ?1 AND recipient_id = ?2 AND deleted_at IS NULL
            "#,
        )
        .bind(message_id)
        .bind(recipient_id)
        .fetch_optional(&**db)
        .await
    }

    /// Set `read_at` unless already set. Returns the effective timestamp,
    /// or `None` when there is no active grant.
    pub async fn mark_read(
        message_id: RowId,
        recipient_id: RowId,
        db: &Database,
    ) -> Result<Option<OffsetDateTime>, sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE message_recipients
            SET read_at = ?3
            WHERE message_id = ?1 AND recipient_id = ?2
                AND deleted_at IS NULL AND read_at IS NULL
            "#,
        )
        .bind(message_id)
        .bind(recipient_id)
        .bind(OffsetDateTime::now_utc())
        .execute(&**db)
        .await?;

        let grant = Self::active(message_id, recipient_id, db).await?;
        Ok(grant.and_then(|grant| grant.read_at))
    }

    /// Soft delete. Returns false when there was no active grant.
    pub async fn mark_deleted(
        message_id: RowId,
        recipient_id: RowId,
        db: &Database,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE message_recipients
            SET deleted_at = ?3
            WHERE message_id = ?1 AND recipient_id = ?2 AND deleted_at IS NULL
            "#,
        )
        .bind(message_id)
        .bind(recipient_id)
        .bind(OffsetDateTime::now_utc())
        .execute(&**db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Addresses of every recipient of `message_id`, in the order the sender
    /// listed them
    pub async fn emails(message_id: RowId, db: &Database) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT u.email
            FROM message_recipients r
            JOIN users u ON u.id = r.recipient_id
            WHERE r.message_id = ?1
            ORDER BY r.position
            "#,
        )
        .bind(message_id)
        .fetch_all(&**db)
        .await
    }
}
