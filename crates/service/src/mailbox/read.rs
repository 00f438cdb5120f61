use std::sync::Arc;

use common::crypto::KeyGrant;
use common::envelope::Opener;

use super::{
    blocking, AttachmentContent, AttachmentMeta, InboxItem, MailboxError, MessageDetail, Session,
};
use crate::database::models::{Attachment, Message, Recipient, User};
use crate::database::RowId;
use crate::ServiceState;

/// The caller's non-deleted messages, newest first, with subjects decrypted
pub async fn inbox(state: &ServiceState, session: &Session) -> Result<Vec<InboxItem>, MailboxError> {
    let rows = Message::inbox(session.user_id, state.database()).await?;
    let key = Arc::clone(&session.key);

    blocking(move || {
        rows.into_iter()
            .map(|row| -> Result<InboxItem, MailboxError> {
                let grant = KeyGrant::from(row.wrapped_key.clone());
                let opener = Opener::unwrap(&grant, &key)?;
                Ok(InboxItem {
                    id: row.message_id,
                    subject: opener.text(&row.subject()?)?,
                    sender_email: row.sender_email,
                    created_at: row.created_at,
                    read_at: row.read_at,
                })
            })
            .collect()
    })
    .await
}

/// Everything about one message, decrypted
///
/// A signature that fails to verify is reported through `verified`; the
/// content is returned regardless.
pub async fn message(
    state: &ServiceState,
    session: &Session,
    message_id: RowId,
) -> Result<MessageDetail, MailboxError> {
    let db = state.database();
    let grant = Recipient::active(message_id, session.user_id, db)
        .await?
        .ok_or(MailboxError::NotFound)?;
    let message = Message::get(message_id, db)
        .await?
        .ok_or(MailboxError::NotFound)?;
    let attachments = Attachment::for_message(message_id, db).await?;
    let sender = User::get(message.sender_id, db)
        .await?
        .ok_or(MailboxError::NotFound)?;
    let recipients = Recipient::emails(message_id, db).await?;

    let envelope = message.envelope(&attachments)?;
    let sender_key = sender.public_key()?;
    let key_grant = grant.grant();
    let key = Arc::clone(&session.key);
    let opened = blocking(move || {
        let opener = Opener::unwrap(&key_grant, &key)?;
        Ok(opener.open(&envelope, &sender_key)?)
    })
    .await?;

    if !opened.verification.is_verified() {
        tracing::warn!(
            message_id = %message.id,
            sender_id = %message.sender_id,
            "signature check failed"
        );
    }

    Ok(MessageDetail {
        id: message.id,
        subject: opened.subject,
        body: opened.body,
        sender_email: sender.email,
        created_at: message.created_at,
        recipients,
        verified: opened.verification.is_verified(),
        read_at: grant.read_at,
        deleted_at: grant.deleted_at,
        attachments: attachments
            .iter()
            .zip(&opened.attachments)
            .map(|(row, plain)| AttachmentMeta {
                id: row.id,
                filename: row.filename.clone(),
                content_type: row.content_type.clone(),
                size: plain.size(),
            })
            .collect(),
    })
}

/// Decrypt a single attachment for a recipient of its message
pub async fn attachment(
    state: &ServiceState,
    session: &Session,
    attachment_id: RowId,
) -> Result<AttachmentContent, MailboxError> {
    let db = state.database();
    let attachment = Attachment::get(attachment_id, db)
        .await?
        .ok_or(MailboxError::NotFound)?;
    let grant = Recipient::active(attachment.message_id, session.user_id, db)
        .await?
        .ok_or(MailboxError::NotFound)?;

    let key = Arc::clone(&session.key);
    let sealed = attachment.sealed()?;
    let data = blocking(move || {
        let opener = Opener::unwrap(&grant.grant(), &key)?;
        Ok(opener.bytes(&sealed)?)
    })
    .await?;

    Ok(AttachmentContent {
        filename: attachment.filename,
        content_type: attachment.content_type,
        data,
    })
}
