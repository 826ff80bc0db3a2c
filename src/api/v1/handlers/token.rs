/*
 * Responsibility
 * - POST /token (username/password → access token)
 * - 失敗理由はログのみ。レスポンスは一律 401
 */
use axum::{Json, extract::State};

use crate::api::v1::dto::token::{TokenRequest, TokenResponse};
use crate::error::AppError;
use crate::state::AppState;

pub async fn create_token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    req.validate()
        .map_err(|msg| AppError::bad_request("INVALID_INPUT", msg))?;

    let ctx = state
        .security
        .authenticate_password(&req.username, &req.password)
        .await
        .inspect_err(|err| {
            tracing::warn!(username = %req.username, error = %err, "password login failed");
        })?;

    let token = state.security.issue_token(ctx.username(), 0)?;
    tracing::info!(username = %ctx.username(), "access token issued");

    Ok(Json(token.into()))
}
