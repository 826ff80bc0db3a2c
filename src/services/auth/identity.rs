//! Narrow read/write interfaces the security core needs from account storage.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Backend failure from the identity store.
#[derive(Debug, Error)]
#[error("identity store error: {0}")]
pub struct StoreError(pub String);

pub type StoreResult<T> = Result<T, StoreError>;

/// Credential record for one user.
#[derive(Clone)]
pub struct UserCredential {
    pub id: i64,
    pub username: String,
    pub is_active: bool,
    pub password_hash: Option<String>,
    // Seed of the current API key, never the derived key itself
    pub apikey_data: Option<String>,
    pub apikey_hash: Option<String>,
    pub apikey_issued_on: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for UserCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredential")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("is_active", &self.is_active)
            .field("has_apikey", &self.apikey_data.is_some())
            .field("apikey_issued_on", &self.apikey_issued_on)
            .finish_non_exhaustive()
    }
}

/// Public part of a user record used to build an `AuthContext`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
}

/// Read side consumed by `SecurityManager`.
#[async_trait]
pub trait IdentityStore: Send + Sync + 'static {
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<UserCredential>>;

    async fn find_user_info(&self, username: &str) -> StoreResult<Option<UserInfo>>;

    /// Returns the username owning the API key fingerprint.
    async fn find_user_by_apikey_hash(&self, apikey_hash: &str) -> StoreResult<Option<String>>;

    async fn role_names_for(&self, username: &str) -> StoreResult<Vec<String>>;

    async fn device_ids_for(&self, username: &str) -> StoreResult<Vec<i64>>;
}

/// Write side used by the account management service.
///
/// Each method returns `Ok(false)` when no such user exists.
#[async_trait]
pub trait AccountStore: Send + Sync + 'static {
    async fn update_user_apikey(
        &self,
        username: &str,
        apikey_hash: Option<&str>,
        apikey_data: Option<&str>,
    ) -> StoreResult<bool>;

    async fn update_user_password(&self, username: &str, password_hash: &str)
    -> StoreResult<bool>;

    async fn update_user_is_active(&self, username: &str, is_active: bool) -> StoreResult<bool>;
}
