use std::sync::Arc;

use common::crypto::SecretKey;
use common::session_cache::SessionId;

use super::MailboxError;
use crate::database::RowId;
use crate::ServiceState;

/// An authenticated caller and the private key their login unlocked
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: RowId,
    pub session_id: SessionId,
    pub key: Arc<SecretKey>,
}

/// Resolve a bearer token to a live session
///
/// A token that does not verify is [`MailboxError::InvalidToken`]; a valid
/// token whose key is no longer cached (logged out, swept, or the process
/// restarted) is [`MailboxError::SessionExpired`].
pub fn authenticate(state: &ServiceState, token: &str) -> Result<Session, MailboxError> {
    let claims = state
        .tokens()
        .verify(token)
        .map_err(|_| MailboxError::InvalidToken)?;
    let key = state
        .sessions()
        .get(&claims.jti)
        .ok_or(MailboxError::SessionExpired)?;

    Ok(Session {
        user_id: RowId::from(claims.sub),
        session_id: claims.jti,
        key,
    })
}
