#![allow(dead_code)]

//! In-memory identity store that counts reads, plus builders for the
//! security core and the HTTP router.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use studymon::config::{AppEnv, Config, SecurityConfig};
use studymon::services::account::AccountService;
use studymon::services::auth::hasher::{ApiKeyParams, PasswordParams};
use studymon::services::auth::identity::{StoreError, StoreResult};
use studymon::services::auth::{
    AccessGuard, AccountStore, CredentialHasher, IdentityStore, Rolename, SecurityManager,
    UserCredential, UserInfo,
};
use studymon::state::AppState;

pub const TOKEN_SECRET: &str = "test-token-secret-0123456789abcdef";

pub const ADMIN: &str = "admin1";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const TESTER: &str = "tester1";
pub const TESTER_PASSWORD: &str = "tester-password";
pub const INACTIVE: &str = "retired1";
pub const INACTIVE_PASSWORD: &str = "retired-password";

/// Argon2 costs low enough to keep tests fast.
pub fn password_params() -> PasswordParams {
    PasswordParams {
        m_cost: 256,
        t_cost: 1,
        p_cost: 1,
    }
}

pub fn apikey_params() -> ApiKeyParams {
    ApiKeyParams {
        secret: "test-apikey-secret".to_string(),
        salt: "test-apikey-salt".to_string(),
        rounds: 11,
    }
}

pub fn security_config(debug_username: Option<&str>) -> SecurityConfig {
    SecurityConfig {
        token_secret: TOKEN_SECRET.to_string(),
        token_algorithm: "HS256".to_string(),
        token_expire_sec: 3600,
        apikey: apikey_params(),
        password: password_params(),
        debug_username: debug_username.map(str::to_string),
        store_timeout: Duration::from_millis(200),
    }
}

pub fn config(app_env: AppEnv, debug_username: Option<&str>) -> Config {
    Config {
        addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        database_url: "postgres://unused".to_string(),
        app_env,
        cors_allowed_origins: vec![],
        security: security_config(debug_username),
    }
}

#[derive(Default)]
pub struct Reads {
    pub credentials: AtomicUsize,
    pub infos: AtomicUsize,
    pub apikeys: AtomicUsize,
    pub roles: AtomicUsize,
    pub devices: AtomicUsize,
}

impl Reads {
    pub fn total(&self) -> usize {
        self.credentials.load(Ordering::SeqCst)
            + self.infos.load(Ordering::SeqCst)
            + self.apikeys.load(Ordering::SeqCst)
            + self.roles.load(Ordering::SeqCst)
            + self.devices.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct FakeStore {
    users: RwLock<HashMap<String, UserCredential>>,
    roles: RwLock<HashMap<String, Vec<String>>>,
    devices: RwLock<HashMap<String, Vec<i64>>>,
    pub reads: Reads,
    delay: RwLock<Option<Duration>>,
    failing: AtomicBool,
}

impl FakeStore {
    /// Store with an admin, an active data collector and an inactive user.
    pub fn seeded() -> Arc<Self> {
        let hasher = CredentialHasher::new(password_params(), apikey_params()).unwrap();
        let store = Arc::new(Self::default());

        store.add_user(
            1,
            ADMIN,
            &hasher.hash_password(ADMIN_PASSWORD).unwrap(),
            true,
            &[Rolename::ADMIN],
            &[1, 2],
        );
        store.add_user(
            2,
            TESTER,
            &hasher.hash_password(TESTER_PASSWORD).unwrap(),
            true,
            &[Rolename::DATA_COLLECTOR],
            &[1],
        );
        store.add_user(
            3,
            INACTIVE,
            &hasher.hash_password(INACTIVE_PASSWORD).unwrap(),
            false,
            &[Rolename::DATA_COLLECTOR],
            &[],
        );
        store
    }

    pub fn add_user(
        &self,
        id: i64,
        username: &str,
        password_hash: &str,
        is_active: bool,
        roles: &[&str],
        devices: &[i64],
    ) {
        self.users.write().insert(
            username.to_string(),
            UserCredential {
                id,
                username: username.to_string(),
                is_active,
                password_hash: Some(password_hash.to_string()),
                apikey_data: None,
                apikey_hash: None,
                apikey_issued_on: None,
            },
        );
        self.roles.write().insert(
            username.to_string(),
            roles.iter().map(|r| r.to_string()).collect(),
        );
        self.devices
            .write()
            .insert(username.to_string(), devices.to_vec());
    }

    /// Change roles behind the cache's back.
    pub fn set_roles(&self, username: &str, roles: &[&str]) {
        self.roles.write().insert(
            username.to_string(),
            roles.iter().map(|r| r.to_string()).collect(),
        );
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write() = delay;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn apikey_hash_of(&self, username: &str) -> Option<String> {
        self.users
            .read()
            .get(username)
            .and_then(|u| u.apikey_hash.clone())
    }

    /// Count the read, then wait. `value` is what the query saw when it ran.
    async fn read<T>(&self, counter: &AtomicUsize, value: T) -> StoreResult<T> {
        counter.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError("connection refused".to_string()));
        }
        Ok(value)
    }
}

#[async_trait]
impl IdentityStore for FakeStore {
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<UserCredential>> {
        let user = self.users.read().get(username).cloned();
        self.read(&self.reads.credentials, user).await
    }

    async fn find_user_info(&self, username: &str) -> StoreResult<Option<UserInfo>> {
        let info = self.users.read().get(username).map(|u| UserInfo {
            id: u.id,
            username: u.username.clone(),
        });
        self.read(&self.reads.infos, info).await
    }

    async fn find_user_by_apikey_hash(&self, apikey_hash: &str) -> StoreResult<Option<String>> {
        let owner = self
            .users
            .read()
            .values()
            .find(|u| u.apikey_hash.as_deref() == Some(apikey_hash))
            .map(|u| u.username.clone());
        self.read(&self.reads.apikeys, owner).await
    }

    async fn role_names_for(&self, username: &str) -> StoreResult<Vec<String>> {
        let roles = self.roles.read().get(username).cloned().unwrap_or_default();
        self.read(&self.reads.roles, roles).await
    }

    async fn device_ids_for(&self, username: &str) -> StoreResult<Vec<i64>> {
        let devices = self.devices.read().get(username).cloned().unwrap_or_default();
        self.read(&self.reads.devices, devices).await
    }
}

#[async_trait]
impl AccountStore for FakeStore {
    async fn update_user_apikey(
        &self,
        username: &str,
        apikey_hash: Option<&str>,
        apikey_data: Option<&str>,
    ) -> StoreResult<bool> {
        let mut users = self.users.write();
        let Some(user) = users.get_mut(username) else {
            return Ok(false);
        };
        user.apikey_hash = apikey_hash.map(str::to_string);
        user.apikey_data = apikey_data.map(str::to_string);
        user.apikey_issued_on = apikey_hash.map(|_| chrono::Utc::now());
        Ok(true)
    }

    async fn update_user_password(
        &self,
        username: &str,
        password_hash: &str,
    ) -> StoreResult<bool> {
        let mut users = self.users.write();
        let Some(user) = users.get_mut(username) else {
            return Ok(false);
        };
        user.password_hash = Some(password_hash.to_string());
        Ok(true)
    }

    async fn update_user_is_active(&self, username: &str, is_active: bool) -> StoreResult<bool> {
        let mut users = self.users.write();
        let Some(user) = users.get_mut(username) else {
            return Ok(false);
        };
        user.is_active = is_active;
        Ok(true)
    }
}

pub struct Fixture {
    pub store: Arc<FakeStore>,
    pub security: Arc<SecurityManager>,
    pub accounts: Arc<AccountService>,
}

pub fn fixture(debug_username: Option<&str>) -> Fixture {
    let store = FakeStore::seeded();
    let security =
        Arc::new(SecurityManager::new(store.clone(), &security_config(debug_username)).unwrap());
    let accounts = Arc::new(AccountService::new(store.clone(), security.clone()));
    Fixture {
        store,
        security,
        accounts,
    }
}

impl Fixture {
    pub fn state(&self, env: AppEnv) -> AppState {
        AppState::new(
            self.security.clone(),
            self.accounts.clone(),
            AccessGuard::new(env),
        )
    }
}
