/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - public: /health, /token (認証 middleware を通さない)
 * - protected: /login, /admin (access middleware で AuthCtx を注入)
 */
use axum::{
    Router,
    routing::{get, post, put},
};

use crate::api::v1::handlers::{admin, health::health, login, token};
use crate::middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/health", get(health))
        .route("/token", post(token::create_token));

    let protected = Router::new()
        .route("/login/current_user", get(login::current_user))
        .route("/admin/tokens", post(admin::create_token))
        .route("/admin/password_hash", post(admin::password_hash))
        .route("/admin/username_by_token", post(admin::username_by_token))
        .route(
            "/admin/users/{username}/apikey",
            get(admin::get_apikey)
                .post(admin::renew_apikey)
                .delete(admin::revoke_apikey),
        )
        .route("/admin/users/{username}/password", put(admin::set_password))
        .route("/admin/users/{username}/active", put(admin::set_active))
        .route("/admin/cache/reset", post(admin::reset_cache));

    public.merge(middleware::auth::access::apply(protected, state))
}
