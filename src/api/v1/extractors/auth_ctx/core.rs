use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

use super::AuthCtx;

/// Handler で AuthCtx を受け取るための extractor
/// middleware が AuthCtx を request.extensions() に insert 済みである前提
/// 見つからない場合は 401 を返す（ミドルウェア未設定）
pub struct AuthCtxExtractor(pub AuthCtx);

impl FromRequestParts<AppState> for AuthCtxExtractor
where
    AppState: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthCtx>()
            .cloned()
            .map(AuthCtxExtractor)
            .ok_or(AppError::Unauthorized)
    }
}

/// Like `AuthCtxExtractor`, but the anonymous context is rejected with 401.
pub struct Authenticated(pub AuthCtx);

impl FromRequestParts<AppState> for Authenticated
where
    AppState: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthCtxExtractor(ctx) = AuthCtxExtractor::from_request_parts(parts, state).await?;
        if ctx.is_empty() {
            tracing::warn!("anonymous context on a route that needs an identity");
            return Err(AppError::Unauthorized);
        }
        Ok(Authenticated(ctx))
    }
}
