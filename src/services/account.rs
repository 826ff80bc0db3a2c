/*
 * Responsibility
 * - 認証情報を書き換える操作 (API key 更新・失効, password 変更, 有効/無効)
 * - 書き込み後に必ず SecurityManager の cache を invalidate する
 */
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::services::auth::identity::{AccountStore, StoreError};
use crate::services::auth::{AuthError, DerivedApiKey, SecurityManager};

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn AccountStore>,
    security: Arc<SecurityManager>,
}

impl std::fmt::Debug for AccountService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountService").finish_non_exhaustive()
    }
}

impl AccountService {
    pub fn new(store: Arc<dyn AccountStore>, security: Arc<SecurityManager>) -> Self {
        Self { store, security }
    }

    /// Issue a new API key, persist its fingerprint and seed, and return it.
    pub async fn renew_user_apikey(&self, username: &str) -> Result<DerivedApiKey, AuthError> {
        debug!(username, "renew_user_apikey");
        let apikey = self.security.issue_apikey()?;
        let apikey_hash = self.security.fingerprint(&apikey.key)?;

        let updated = self
            .store
            .update_user_apikey(username, Some(&apikey_hash), Some(&apikey.data))
            .await
            .map_err(write_failed)?;
        self.finish_write(username, updated)?;

        info!(username, prefix = %apikey.prefix, "API key renewed");
        Ok(apikey)
    }

    pub async fn revoke_user_apikey(&self, username: &str) -> Result<(), AuthError> {
        debug!(username, "revoke_user_apikey");
        let updated = self
            .store
            .update_user_apikey(username, None, None)
            .await
            .map_err(write_failed)?;
        self.finish_write(username, updated)?;

        info!(username, "API key revoked");
        Ok(())
    }

    pub async fn set_user_password(&self, username: &str, password: &str) -> Result<(), AuthError> {
        debug!(username, "set_user_password");
        let password_hash = self.security.hash_password(password).await?;

        let updated = self
            .store
            .update_user_password(username, &password_hash)
            .await
            .map_err(write_failed)?;
        self.finish_write(username, updated)
    }

    pub async fn set_user_active(&self, username: &str, is_active: bool) -> Result<(), AuthError> {
        debug!(username, is_active, "set_user_active");
        let updated = self
            .store
            .update_user_is_active(username, is_active)
            .await
            .map_err(write_failed)?;
        self.finish_write(username, updated)
    }

    fn finish_write(&self, username: &str, updated: bool) -> Result<(), AuthError> {
        if !updated {
            return Err(AuthError::NotFound(format!("user {username}")));
        }
        self.security.invalidate(Some(username));
        Ok(())
    }
}

fn write_failed(e: StoreError) -> AuthError {
    error!(error = %e, "account store write failed");
    AuthError::Internal(e.to_string())
}
