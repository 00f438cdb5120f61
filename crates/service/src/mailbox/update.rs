use super::{MailboxError, ReadReceipt, Session};
use crate::database::models::Recipient;
use crate::database::RowId;
use crate::ServiceState;

/// Mark a message read. The first call sets the timestamp; later calls
/// return it unchanged.
pub async fn mark_read(
    state: &ServiceState,
    session: &Session,
    message_id: RowId,
) -> Result<ReadReceipt, MailboxError> {
    let read_at = Recipient::mark_read(message_id, session.user_id, state.database())
        .await?
        .ok_or(MailboxError::NotFound)?;

    Ok(ReadReceipt {
        status: "read".to_string(),
        read_at,
    })
}

/// Soft delete the caller's copy. Other recipients are unaffected.
pub async fn delete(
    state: &ServiceState,
    session: &Session,
    message_id: RowId,
) -> Result<(), MailboxError> {
    if !Recipient::mark_deleted(message_id, session.user_id, state.database()).await? {
        return Err(MailboxError::NotFound);
    }
    tracing::info!(message_id = %message_id, user_id = %session.user_id, "message deleted");
    Ok(())
}
