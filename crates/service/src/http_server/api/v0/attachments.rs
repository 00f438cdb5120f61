use axum::body::Body;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use http::{HeaderValue, StatusCode};

use super::parse_id;
use crate::http_server::AuthSession;
use crate::mailbox::{self, MailboxError};
use crate::ServiceState;

pub async fn get(
    State(state): State<ServiceState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
) -> Result<Response, MailboxError> {
    let content = mailbox::attachment(&state, &session, parse_id(&id)?).await?;

    let content_type = HeaderValue::from_str(&content.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        sanitize_filename(&content.filename)
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, content_type),
            (CONTENT_DISPOSITION, disposition),
        ],
        Body::from(content.data),
    )
        .into_response())
}

/// Keep the filename printable and unable to break out of its quotes
fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}
