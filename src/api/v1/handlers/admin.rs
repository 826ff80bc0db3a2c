/*
 * Responsibility
 * - /admin 系 handler (token 発行, password hash, API key 管理, cache reset)
 * - 全 handler の先頭で admin role を AccessGuard で確認する
 * - 書き込み系は AccountService 経由 (invalidate まで含む)
 */
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::api::v1::dto::admin::{
    ApiKeyResponse, CreateTokenRequest, PasswordHashResponse, PasswordRequest, ResetCacheRequest,
    SetActiveRequest, UsernameByTokenRequest, UsernameResponse,
};
use crate::api::v1::dto::token::TokenResponse;
use crate::api::v1::extractors::Authenticated;
use crate::error::AppError;
use crate::services::auth::{AccessRequirement, AuthContext, Rolename};
use crate::state::AppState;

fn require_admin(state: &AppState, ctx: &AuthContext) -> Result<(), AppError> {
    let req = AccessRequirement::any().roles([Rolename::ADMIN]);
    state.guard.enforce(ctx, &req)?;
    Ok(())
}

/// POST /admin/tokens
pub async fn create_token(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Json(req): Json<CreateTokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    require_admin(&state, &ctx)?;
    req.validate()
        .map_err(|msg| AppError::bad_request("INVALID_INPUT", msg))?;

    // Only for users the store knows about
    state.security.context_for(&req.username).await?;

    let token = state
        .security
        .issue_token(&req.username, req.expire_sec.unwrap_or(0))?;
    tracing::info!(admin = %ctx.username(), username = %req.username, "access token issued by admin");

    Ok(Json(token.into()))
}

/// POST /admin/password_hash
pub async fn password_hash(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Json(req): Json<PasswordRequest>,
) -> Result<Json<PasswordHashResponse>, AppError> {
    require_admin(&state, &ctx)?;
    req.validate()
        .map_err(|msg| AppError::bad_request("INVALID_INPUT", msg))?;

    let password_hash = state.security.hash_password(&req.password).await?;
    Ok(Json(PasswordHashResponse { password_hash }))
}

/// POST /admin/username_by_token
pub async fn username_by_token(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Json(req): Json<UsernameByTokenRequest>,
) -> Result<Json<UsernameResponse>, AppError> {
    require_admin(&state, &ctx)?;

    let username = state
        .security
        .username_by_token(&req.token)
        .map_err(|err| {
            tracing::debug!(error = %err, "token lookup failed");
            AppError::bad_request("INVALID_TOKEN", "token is invalid or expired")
        })?;
    Ok(Json(UsernameResponse { username }))
}

/// GET /admin/users/{username}/apikey
pub async fn get_apikey(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(username): Path<String>,
) -> Result<Json<ApiKeyResponse>, AppError> {
    require_admin(&state, &ctx)?;

    let apikey = state.security.apikey_for_user(&username).await?;
    Ok(Json(ApiKeyResponse::new(&username, apikey)))
}

/// POST /admin/users/{username}/apikey
pub async fn renew_apikey(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(username): Path<String>,
) -> Result<(StatusCode, Json<ApiKeyResponse>), AppError> {
    require_admin(&state, &ctx)?;

    let apikey = state.accounts.renew_user_apikey(&username).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiKeyResponse::new(&username, apikey)),
    ))
}

/// DELETE /admin/users/{username}/apikey
pub async fn revoke_apikey(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(username): Path<String>,
) -> Result<StatusCode, AppError> {
    require_admin(&state, &ctx)?;

    state.accounts.revoke_user_apikey(&username).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /admin/users/{username}/password
pub async fn set_password(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(username): Path<String>,
    Json(req): Json<PasswordRequest>,
) -> Result<StatusCode, AppError> {
    require_admin(&state, &ctx)?;
    req.validate()
        .map_err(|msg| AppError::bad_request("INVALID_INPUT", msg))?;

    state.accounts.set_user_password(&username, &req.password).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /admin/users/{username}/active
///
/// Only password login checks the flag. Bearer tokens already issued keep
/// working until they expire, and the user's API key keeps working until it
/// is revoked (`DELETE /admin/users/{username}/apikey`). To lock a user out
/// completely, deactivate and revoke.
pub async fn set_active(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(username): Path<String>,
    Json(req): Json<SetActiveRequest>,
) -> Result<StatusCode, AppError> {
    require_admin(&state, &ctx)?;

    state.accounts.set_user_active(&username, req.is_active).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/cache/reset
pub async fn reset_cache(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Json(req): Json<ResetCacheRequest>,
) -> Result<StatusCode, AppError> {
    require_admin(&state, &ctx)?;

    let username = req.username.as_deref().filter(|u| !u.is_empty());
    state.security.invalidate(username);
    tracing::info!(admin = %ctx.username(), target = ?username, "auth cache reset");

    Ok(StatusCode::NO_CONTENT)
}
