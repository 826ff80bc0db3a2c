/*
 * Responsibility
 * - middleware が request extensions に格納する「解決済みコンテキスト」の型
 * - handler はこの型だけを受け取り、policy check (AccessGuard) にそのまま渡す
 */
use std::ops::Deref;
use std::sync::Arc;

use crate::services::auth::AuthContext;

/// Context resolved once per request by the access middleware.
#[derive(Debug, Clone)]
pub struct AuthCtx(pub Arc<AuthContext>);

impl Deref for AuthCtx {
    type Target = AuthContext;

    fn deref(&self) -> &AuthContext {
        &self.0
    }
}
