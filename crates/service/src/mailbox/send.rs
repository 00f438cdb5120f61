use std::sync::Arc;

use common::crypto::PublicKey;
use common::envelope::{self, AttachmentDraft, Draft};

use super::{
    blocking, check_len, normalize_email, AttachmentMeta, MailboxError, MessageDetail, NewMessage,
    Session, MAX_ATTACHMENT_META_LEN, MAX_SUBJECT_LEN,
};
use crate::database::models::{Attachment, Message, Recipient, User};
use crate::ServiceState;

/// Encrypt, sign and deliver a message
///
/// Validation happens before any cryptographic work, and nothing is written
/// unless every row of the message lands.
pub async fn send(
    state: &ServiceState,
    session: &Session,
    request: NewMessage,
) -> Result<MessageDetail, MailboxError> {
    check_len("subject", &request.subject, 1, MAX_SUBJECT_LEN)?;
    let recipients = recipient_list(&request.recipients)?;
    let attachments = request
        .attachments
        .iter()
        .map(|attachment| -> Result<AttachmentDraft, MailboxError> {
            check_len("filename", &attachment.filename, 1, MAX_ATTACHMENT_META_LEN)?;
            check_len(
                "content_type",
                &attachment.content_type,
                1,
                MAX_ATTACHMENT_META_LEN,
            )?;
            AttachmentDraft::from_base64(
                attachment.filename.clone(),
                attachment.content_type.clone(),
                &attachment.data_base64,
            )
            .map_err(|_| {
                MailboxError::InvalidRequest(format!("Invalid base64 for {}", attachment.filename))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let sender = User::get(session.user_id, state.database())
        .await?
        .ok_or(MailboxError::InvalidToken)?;
    let (users, missing) = User::by_emails(&recipients, state.database()).await?;
    if !missing.is_empty() {
        return Err(MailboxError::RecipientsNotFound(missing));
    }
    let public_keys = users
        .iter()
        .map(User::public_key)
        .collect::<Result<Vec<PublicKey>, _>>()?;

    let draft = Draft {
        subject: request.subject,
        body: request.body,
        attachments,
    };
    let sender_key = Arc::clone(&session.key);
    let (sealing, draft) = blocking(move || {
        let sealing = envelope::seal(&draft, &sender_key, &public_keys)?;
        Ok((sealing, draft))
    })
    .await?;

    let message = Message::from_envelope(sender.id, &sealing.envelope);
    let rows = sealing
        .envelope
        .attachments
        .iter()
        .enumerate()
        .map(|(position, sealed)| Attachment::from_sealed(message.id, position, sealed))
        .collect::<Vec<_>>();

    let mut tx = state.database().begin().await?;
    message.insert(&mut *tx).await?;
    for (position, (user, grant)) in users.iter().zip(&sealing.grants).enumerate() {
        Recipient::insert(message.id, user.id, position, grant, &mut *tx).await?;
    }
    for row in &rows {
        row.insert(&mut *tx).await?;
    }
    tx.commit().await?;

    tracing::info!(
        message_id = %message.id,
        sender_id = %sender.id,
        recipients = users.len(),
        attachments = rows.len(),
        "message sent"
    );

    Ok(MessageDetail {
        id: message.id,
        subject: draft.subject,
        body: draft.body,
        sender_email: sender.email,
        created_at: message.created_at,
        recipients,
        verified: true,
        read_at: None,
        deleted_at: None,
        attachments: rows
            .iter()
            .zip(&draft.attachments)
            .map(|(row, plain)| AttachmentMeta {
                id: row.id,
                filename: row.filename.clone(),
                content_type: row.content_type.clone(),
                size: plain.data.len(),
            })
            .collect(),
    })
}

/// Normalize, dedupe (keeping first occurrence) and require at least one
fn recipient_list(raw: &[String]) -> Result<Vec<String>, MailboxError> {
    let mut recipients: Vec<String> = Vec::with_capacity(raw.len());
    for email in raw {
        let email = normalize_email(email)?;
        if !recipients.contains(&email) {
            recipients.push(email);
        }
    }
    if recipients.is_empty() {
        return Err(MailboxError::InvalidRequest(
            "At least one recipient is required".to_string(),
        ));
    }
    Ok(recipients)
}
