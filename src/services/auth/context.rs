/*
 * Responsibility
 * - "who is making this request" の値型 (AuthContext)
 * - 構築後は不変。変更が必要なら作り直して cache に入れ替える
 * - role 名の定数 (Rolename)
 */
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, LazyLock};

use serde::Serialize;

/// Role names known to the application.
pub struct Rolename;

impl Rolename {
    pub const ADMIN: &'static str = "admin";
    pub const DATA_COLLECTOR: &'static str = "data_collector";
    pub const MRI_OPERATOR: &'static str = "mri_operator";
    pub const PARTICIPANT: &'static str = "participant";
    pub const SYS_DATA_ENTRY: &'static str = "sys_data_entry";
    pub const TESTER: &'static str = "tester";
}

static EMPTY: LazyLock<Arc<AuthContext>> = LazyLock::new(|| Arc::new(AuthContext::default()));

/// Resolved identity + roles + devices for one request.
///
/// - `username` が空のものが anonymous (empty) context
/// - 共有は `Arc<AuthContext>` で行う
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthContext {
    user_id: i64,
    username: String,
    role_names: BTreeSet<String>,
    device_ids: BTreeSet<i64>,
}

impl AuthContext {
    pub fn new(
        user_id: i64,
        username: impl Into<String>,
        role_names: impl IntoIterator<Item = String>,
        device_ids: impl IntoIterator<Item = i64>,
    ) -> Self {
        Self {
            user_id,
            username: username.into(),
            role_names: role_names.into_iter().collect(),
            device_ids: device_ids.into_iter().collect(),
        }
    }

    /// The shared anonymous context.
    pub fn empty() -> Arc<AuthContext> {
        EMPTY.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_empty()
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn role_names(&self) -> &BTreeSet<String> {
        &self.role_names
    }

    pub fn device_ids(&self) -> &BTreeSet<i64> {
        &self.device_ids
    }

    pub fn has_role(&self, rolename: &str) -> bool {
        self.role_names.contains(rolename)
    }

    pub fn has_device(&self, device_id: i64) -> bool {
        self.device_ids.contains(&device_id)
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("role_names", &self.role_names)
            .field("device_ids", &self.device_ids)
            .finish()
    }
}
