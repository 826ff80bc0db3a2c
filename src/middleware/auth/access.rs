//! Credential -> AuthContext 解決 → request extensions に格納
//!
//! - Authorization (Bearer / Basic) または X-API-Key を読み取る
//! - 何も提示されていなければ default context (debug user or anonymous)
//! - 提示されたが検証に失敗した場合は常に 401 (anonymous に落とさない)
//! - 失敗理由はログにのみ残し、レスポンスには出さない

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::api::v1::extractors::AuthCtx;
use crate::error::AppError;
use crate::middleware::auth::credential;
use crate::services::auth::AuthError;
use crate::state::AppState;

/// Resolve the caller for every route of `router`.
///
/// ```ignore
/// let v1 = api::v1::routes::protected();
/// let v1 = middleware::auth::access::apply(v1, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let credential = match credential::extract(req.headers()) {
        Ok(c) => c,
        Err(err) => {
            tracing::warn!(error = %err, "malformed credential header");
            return Err(AppError::Unauthorized);
        }
    };

    let ctx = match state.security.resolve(credential).await {
        Ok(ctx) => ctx,
        Err(AuthError::Internal(detail)) => {
            tracing::error!(detail = %detail, "credential resolution failed internally");
            return Err(AppError::Internal);
        }
        // Reason already logged by SecurityManager::resolve
        Err(_) => return Err(AppError::Unauthorized),
    };

    // middleware → extractor への受け渡し
    req.extensions_mut().insert(AuthCtx(ctx));

    Ok(next.run(req).await)
}
