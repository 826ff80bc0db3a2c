use axum::Json;

use crate::api::v1::dto::login::CurrentUserResponse;
use crate::api::v1::extractors::AuthCtxExtractor;

/// GET /login/current_user
///
/// Echoes the resolved context. Without any credential this is the debug
/// identity (non-production) or the anonymous context.
pub async fn current_user(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<CurrentUserResponse> {
    Json(CurrentUserResponse::from(&*ctx))
}
