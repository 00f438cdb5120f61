use axum::extract::{Json, State};
use axum::response::IntoResponse;
use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::http_server::{BearerToken, ClientAddr};
use crate::mailbox::{self, MailboxError};
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub totp_code: String,
}

pub async fn register(
    State(state): State<ServiceState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, MailboxError> {
    let registration = mailbox::register(&state, &req.email, &req.password).await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

pub async fn login(
    State(state): State<ServiceState>,
    ClientAddr(client): ClientAddr,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, MailboxError> {
    let grant = mailbox::login(&state, &req.email, &req.password, &req.totp_code, &client).await?;
    Ok(Json(grant))
}

pub async fn logout(
    State(state): State<ServiceState>,
    BearerToken(token): BearerToken,
) -> Result<impl IntoResponse, MailboxError> {
    mailbox::logout(&state, &token)?;
    Ok(StatusCode::NO_CONTENT)
}
