/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - security: プロセスで唯一の SecurityManager (cache もここに一つだけ)
 *   - accounts: 認証情報の書き込み + invalidate
 *   - guard: 実行環境に束縛された AccessGuard
 * - Clone 前提で持つ (内部は Arc/Copy)
 */
use std::sync::Arc;

use crate::services::account::AccountService;
use crate::services::auth::{AccessGuard, SecurityManager};

#[derive(Clone, Debug)]
pub struct AppState {
    pub security: Arc<SecurityManager>,
    pub accounts: Arc<AccountService>,
    pub guard: AccessGuard,
}

impl AppState {
    pub fn new(
        security: Arc<SecurityManager>,
        accounts: Arc<AccountService>,
        guard: AccessGuard,
    ) -> Self {
        Self {
            security,
            accounts,
            guard,
        }
    }
}
