use axum::routing::{get, post};
use axum::Router;

pub mod attachments;
pub mod auth;
pub mod messages;

use crate::database::RowId;
use crate::mailbox::MailboxError;
use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/messages", get(messages::list).post(messages::send))
        .route("/messages/:id", get(messages::get).delete(messages::delete))
        .route("/messages/:id/read", post(messages::mark_read))
        .route("/attachments/:id", get(attachments::get))
        .with_state(state)
}

/// Ids that do not parse cannot name anything the caller can see
fn parse_id(raw: &str) -> Result<RowId, MailboxError> {
    raw.parse().map_err(|_| MailboxError::NotFound)
}
