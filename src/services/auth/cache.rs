//! Read-through memoization for the security core.
//!
//! Three independent maps, no expiry:
//! - username -> `AuthContext`
//! - username -> `UserCredential`
//! - presented API key -> owner username, or a marker for "known invalid"
//!
//! Writers that change roles, devices, passwords or API keys must call
//! [`AuthCache::invalidate`]. Locks are never held across a builder call, so
//! concurrent misses for the same key may build twice; the last insert wins.
//! A build that was started before an `invalidate` is returned to its caller
//! but never stored.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::services::auth::context::AuthContext;
use crate::services::auth::identity::UserCredential;

/// Upper bound on cached API-key entries. Reaching it drops every
/// invalid-key marker; owner entries stay.
pub const MAX_APIKEY_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ApiKeyEntry {
    User(String),
    Invalid,
}

#[derive(Default)]
pub struct AuthCache {
    contexts: RwLock<HashMap<String, Arc<AuthContext>>>,
    users: RwLock<HashMap<String, Arc<UserCredential>>>,
    apikeys: RwLock<HashMap<String, ApiKeyEntry>>,
    // Bumped by every invalidate, checked under the write lock before insert
    generation: AtomicU64,
}

impl std::fmt::Debug for AuthCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCache")
            .field("contexts", &self.contexts.read().len())
            .field("users", &self.users.read().len())
            .field("apikeys", &self.apikeys.read().len())
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish()
    }
}

/// Insert `value` unless an invalidate happened since `started`.
fn insert_if_current<V>(
    map: &RwLock<HashMap<String, V>>,
    generation: &AtomicU64,
    started: u64,
    key: &str,
    value: V,
) -> bool {
    let mut guard = map.write();
    if generation.load(Ordering::SeqCst) != started {
        return false;
    }
    guard.insert(key.to_string(), value);
    true
}

impl AuthCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_build_context<F, Fut, E>(
        &self,
        username: &str,
        build: F,
    ) -> Result<Arc<AuthContext>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AuthContext, E>>,
    {
        let cached = self.contexts.read().get(username).cloned();
        if let Some(ctx) = cached {
            debug!(username, "use cached auth context");
            return Ok(ctx);
        }

        let started = self.generation.load(Ordering::SeqCst);
        let ctx = Arc::new(build().await?);
        if insert_if_current(
            &self.contexts,
            &self.generation,
            started,
            username,
            Arc::clone(&ctx),
        ) {
            debug!(username, "register auth context");
        } else {
            debug!(username, "cache invalidated during build, context not stored");
        }
        Ok(ctx)
    }

    /// `Ok(None)` from the builder (unknown user) is not cached.
    pub async fn get_or_build_credential<F, Fut, E>(
        &self,
        username: &str,
        build: F,
    ) -> Result<Option<Arc<UserCredential>>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<UserCredential>, E>>,
    {
        let cached = self.users.read().get(username).cloned();
        if let Some(user) = cached {
            debug!(username, "use cached user credential");
            return Ok(Some(user));
        }

        let started = self.generation.load(Ordering::SeqCst);
        let Some(user) = build().await? else {
            return Ok(None);
        };
        let user = Arc::new(user);
        insert_if_current(
            &self.users,
            &self.generation,
            started,
            username,
            Arc::clone(&user),
        );
        Ok(Some(user))
    }

    /// Resolve the owner of an API key.
    ///
    /// `Ok(None)` means the key is invalid, whether that was just learned from
    /// `resolve` or served from an earlier marker. Errors from `resolve` are
    /// passed through and leave no entry behind.
    pub async fn get_or_mark_apikey<F, Fut, E>(
        &self,
        apikey: &str,
        resolve: F,
    ) -> Result<Option<String>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<String>, E>>,
    {
        let cached = self.apikeys.read().get(apikey).cloned();
        match cached {
            Some(ApiKeyEntry::User(username)) => {
                debug!(username = %username, "use cached apikey owner");
                return Ok(Some(username));
            }
            Some(ApiKeyEntry::Invalid) => {
                debug!("use cached apikey value: invalid API key");
                return Ok(None);
            }
            None => {}
        }

        let started = self.generation.load(Ordering::SeqCst);
        let resolved = resolve().await?;
        let entry = match &resolved {
            Some(username) => ApiKeyEntry::User(username.clone()),
            None => ApiKeyEntry::Invalid,
        };

        let mut apikeys = self.apikeys.write();
        if self.generation.load(Ordering::SeqCst) != started {
            debug!("cache invalidated during apikey lookup, result not stored");
            return Ok(resolved);
        }
        if apikeys.len() >= MAX_APIKEY_ENTRIES {
            warn!(
                entries = apikeys.len(),
                "apikey cache full, dropping invalid-key markers"
            );
            apikeys.retain(|_, v| matches!(v, ApiKeyEntry::User(_)));
        }
        apikeys.insert(apikey.to_string(), entry);
        Ok(resolved)
    }

    /// Drop one identity's entries from every map, or everything when `None`.
    ///
    /// Builds still in flight when this runs will not store their result.
    pub fn invalidate(&self, username: Option<&str>) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        match username {
            Some(username) => {
                debug!(username, "invalidate auth cache entries");
                self.contexts.write().remove(username);
                self.users.write().remove(username);
                self.apikeys
                    .write()
                    .retain(|_, v| !matches!(v, ApiKeyEntry::User(u) if u == username));
            }
            None => {
                debug!("invalidate whole auth cache");
                self.contexts.write().clear();
                self.users.write().clear();
                self.apikeys.write().clear();
            }
        }
    }

    #[cfg(test)]
    fn apikey_entries(&self) -> usize {
        self.apikeys.read().len()
    }
}
