use axum::extract::{Json, Path, State};
use axum::response::IntoResponse;
use http::StatusCode;

use super::parse_id;
use crate::http_server::AuthSession;
use crate::mailbox::{self, MailboxError, NewMessage};
use crate::ServiceState;

pub async fn list(
    State(state): State<ServiceState>,
    AuthSession(session): AuthSession,
) -> Result<impl IntoResponse, MailboxError> {
    let items = mailbox::inbox(&state, &session).await?;
    Ok(Json(items))
}

pub async fn send(
    State(state): State<ServiceState>,
    AuthSession(session): AuthSession,
    Json(req): Json<NewMessage>,
) -> Result<impl IntoResponse, MailboxError> {
    let detail = mailbox::send(&state, &session, req).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get(
    State(state): State<ServiceState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, MailboxError> {
    let detail = mailbox::message(&state, &session, parse_id(&id)?).await?;
    Ok(Json(detail))
}

pub async fn mark_read(
    State(state): State<ServiceState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, MailboxError> {
    let receipt = mailbox::mark_read(&state, &session, parse_id(&id)?).await?;
    Ok(Json(receipt))
}

pub async fn delete(
    State(state): State<ServiceState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, MailboxError> {
    mailbox::delete(&state, &session, parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}
