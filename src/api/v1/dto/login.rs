use serde::Serialize;

use crate::services::auth::AuthContext;

#[derive(Debug, Serialize)]
pub struct CurrentUserResponse {
    pub user_id: i64,
    pub username: String,
    pub roles: Vec<String>,
    pub devices: Vec<i64>,
    pub is_empty: bool,
}

impl From<&AuthContext> for CurrentUserResponse {
    fn from(ctx: &AuthContext) -> Self {
        Self {
            user_id: ctx.user_id(),
            username: ctx.username().to_string(),
            roles: ctx.role_names().iter().cloned().collect(),
            devices: ctx.device_ids().iter().copied().collect(),
            is_empty: ctx.is_empty(),
        }
    }
}
