//! SecurityManager: turns any supported credential into an `AuthContext` and
//! issues new credentials.
//!
//! One instance is built by the composition root (`app.rs`) and shared via
//! `AppState`; its caches back every request of the process.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::services::auth::cache::AuthCache;
use crate::services::auth::context::AuthContext;
use crate::services::auth::error::{AuthError, UnauthorizedReason};
use crate::services::auth::hasher::{self, CredentialHasher, DerivedApiKey};
use crate::services::auth::identity::{IdentityStore, StoreResult, UserCredential};
use crate::services::auth::token::{Token, TokenCodec};

/// A raw credential extracted by the request adapter.
pub enum Credential {
    None,
    Basic { username: String, password: String },
    Bearer(String),
    ApiKey(String),
}

impl Credential {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Basic { .. } => "basic",
            Self::Bearer(_) => "bearer",
            Self::ApiKey(_) => "apikey",
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print secrets
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            other => f.write_str(other.kind()),
        }
    }
}

pub struct SecurityManager {
    store: Arc<dyn IdentityStore>,
    hasher: CredentialHasher,
    tokens: TokenCodec,
    cache: AuthCache,
    token_expire_sec: i64,
    store_timeout: Duration,
    debug_username: Option<String>,
    debug_context: OnceCell<Arc<AuthContext>>,
}

impl std::fmt::Debug for SecurityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityManager")
            .field("tokens", &self.tokens)
            .field("cache", &self.cache)
            .field("token_expire_sec", &self.token_expire_sec)
            .field("store_timeout", &self.store_timeout)
            .field("debug_username", &self.debug_username)
            .finish_non_exhaustive()
    }
}

impl SecurityManager {
    pub fn new(store: Arc<dyn IdentityStore>, config: &SecurityConfig) -> Result<Self, AuthError> {
        let hasher = CredentialHasher::new(config.password, config.apikey.clone())?;
        let tokens = TokenCodec::new(config.token_secret.as_bytes(), &config.token_algorithm)?;

        if config.token_expire_sec <= 0 {
            return Err(AuthError::InputInvalid(
                "token expiry must be positive".to_string(),
            ));
        }

        Ok(Self {
            store,
            hasher,
            tokens,
            cache: AuthCache::new(),
            token_expire_sec: config.token_expire_sec,
            store_timeout: config.store_timeout,
            debug_username: config.debug_username.clone(),
            debug_context: OnceCell::new(),
        })
    }

    pub fn token_expire_sec(&self) -> i64 {
        self.token_expire_sec
    }

    /// Resolve any supported credential.
    ///
    /// `Credential::None` falls back to [`Self::default_context`]. A presented
    /// credential that fails never demotes to anonymous.
    pub async fn resolve(&self, credential: Credential) -> Result<Arc<AuthContext>, AuthError> {
        let kind = credential.kind();
        let res = match credential {
            Credential::None => self.default_context().await,
            Credential::Basic { username, password } => {
                self.authenticate_password(&username, &password).await
            }
            Credential::Bearer(token) => self.resolve_token(&token).await,
            Credential::ApiKey(apikey) => self.resolve_apikey(&apikey).await,
        };

        if let Err(err) = &res {
            warn!(credential = kind, error = %err, "credential resolution failed");
        }
        res
    }

    /// Check username/password and warm the context cache.
    pub async fn authenticate_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Arc<AuthContext>, AuthError> {
        debug!(username, "authenticate_password");
        if username.is_empty() {
            return Err(AuthError::InputInvalid("empty username".to_string()));
        }

        let user = self
            .credential_for(username)
            .await?
            .ok_or(AuthError::Unauthorized(UnauthorizedReason::UserNotFound))?;

        if !user.is_active {
            return Err(AuthError::Unauthorized(UnauthorizedReason::UserInactive));
        }

        let password_hash = user.password_hash.clone().unwrap_or_default();
        if !self.verify_password(password, &password_hash).await? {
            return Err(AuthError::Unauthorized(UnauthorizedReason::InvalidPassword));
        }

        if user.username != username {
            return Err(AuthError::Unauthorized(
                UnauthorizedReason::UsernameMismatch,
            ));
        }

        self.context_for(&user.username)
            .await
            .map_err(AuthError::into_unauthorized)
    }

    pub async fn resolve_token(&self, token: &str) -> Result<Arc<AuthContext>, AuthError> {
        let username = self.username_by_token(token)?;
        self.context_for(&username)
            .await
            .map_err(AuthError::into_unauthorized)
    }

    pub async fn resolve_apikey(&self, apikey: &str) -> Result<Arc<AuthContext>, AuthError> {
        if apikey.is_empty() {
            return Err(AuthError::unauthorized(
                UnauthorizedReason::MissingCredential,
            ));
        }

        let apikey_hash = hasher::fingerprint(apikey)?;
        let username = self
            .cache
            .get_or_mark_apikey(apikey, || async {
                debug!("lookup apikey owner");
                self.bounded(self.store.find_user_by_apikey_hash(&apikey_hash))
                    .await
            })
            .await?
            .ok_or(AuthError::Unauthorized(UnauthorizedReason::InvalidApiKey))?;

        self.context_for(&username)
            .await
            .map_err(AuthError::into_unauthorized)
    }

    /// Cached context for `username`, built from the identity store on a miss.
    pub async fn context_for(&self, username: &str) -> Result<Arc<AuthContext>, AuthError> {
        if username.is_empty() {
            return Err(AuthError::InputInvalid("empty username".to_string()));
        }

        self.cache
            .get_or_build_context(username, || async {
                debug!(username, "create new auth context");
                let info = self
                    .bounded(self.store.find_user_info(username))
                    .await?
                    .ok_or_else(|| AuthError::NotFound(format!("user {username}")))?;
                let roles = self.bounded(self.store.role_names_for(username)).await?;
                let devices = self.bounded(self.store.device_ids_for(username)).await?;

                Ok::<_, AuthError>(AuthContext::new(info.id, info.username, roles, devices))
            })
            .await
    }

    /// Identity used when a request carries no credential at all.
    pub async fn default_context(&self) -> Result<Arc<AuthContext>, AuthError> {
        let Some(username) = self.debug_username.as_deref() else {
            return Ok(AuthContext::empty());
        };

        self.debug_context
            .get_or_try_init(|| async {
                let ctx = self.context_for(username).await?;
                info!(username, "created debug auth context");
                Ok::<_, AuthError>(ctx)
            })
            .await
            .cloned()
    }

    pub fn issue_token(&self, username: &str, ttl_seconds: i64) -> Result<Token, AuthError> {
        debug!(username, ttl_seconds, "issue_token");
        if username.is_empty() {
            return Err(AuthError::InputInvalid("empty username".to_string()));
        }

        let ttl = if ttl_seconds <= 0 {
            self.token_expire_sec
        } else {
            ttl_seconds
        };
        let access_token = self.tokens.encode(username, ttl)?;

        Ok(Token::bearer(access_token, ttl as u64))
    }

    /// Fresh API key from a random UUID seed. The caller persists
    /// `fingerprint(key)` and `data`, then invalidates the owner.
    pub fn issue_apikey(&self) -> Result<DerivedApiKey, AuthError> {
        let data = Uuid::new_v4().to_string();
        Ok(self.hasher.calculate_apikey(&data)?)
    }

    /// Re-derive a user's current API key from its stored seed.
    pub async fn apikey_for_user(&self, username: &str) -> Result<DerivedApiKey, AuthError> {
        let user = self
            .credential_for(username)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("user {username}")))?;

        let data = user
            .apikey_data
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| AuthError::NotFound(format!("API key of user {username}")))?;

        Ok(self.hasher.calculate_apikey(data)?)
    }

    pub fn fingerprint(&self, apikey: &str) -> Result<String, AuthError> {
        hasher::fingerprint(apikey).map_err(|e| AuthError::InputInvalid(e.to_string()))
    }

    pub fn username_by_token(&self, token: &str) -> Result<String, AuthError> {
        Ok(self.tokens.decode(token)?)
    }

    pub fn verify_token(&self, token: &str) -> bool {
        match self.tokens.decode(token) {
            Ok(_) => true,
            Err(err) => {
                debug!(error = %err, "verify_token failed");
                false
            }
        }
    }

    /// Argon2 on a blocking worker.
    pub async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || hasher.hash_password(&password))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))??;
        Ok(hash)
    }

    pub async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify_password(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    pub fn invalidate(&self, username: Option<&str>) {
        self.cache.invalidate(username);
    }

    async fn credential_for(
        &self,
        username: &str,
    ) -> Result<Option<Arc<UserCredential>>, AuthError> {
        self.cache
            .get_or_build_credential(username, || {
                self.bounded(self.store.find_user_by_username(username))
            })
            .await
    }

    async fn bounded<T>(&self, fut: impl Future<Output = StoreResult<T>>) -> Result<T, AuthError> {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!(error = %e, "identity store failure");
                Err(AuthError::Internal(e.to_string()))
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "identity store timed out"
                );
                Err(AuthError::Unauthorized(UnauthorizedReason::StoreTimeout))
            }
        }
    }
}
