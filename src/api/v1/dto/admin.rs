/*
 * Responsibility
 * - /admin 系の request/response DTO
 * - API key の seed (data) はレスポンスに含めない
 */
use serde::{Deserialize, Serialize};

use crate::services::auth::DerivedApiKey;

#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
    pub username: String,
    /// `None` or `<= 0` uses the configured default.
    pub expire_sec: Option<i64>,
}

impl CreateTokenRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.username.trim().is_empty() {
            return Err("username is required");
        }
        Ok(())
    }
}

#[derive(Deserialize)]
pub struct PasswordRequest {
    pub password: String,
}

impl PasswordRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.password.is_empty() {
            return Err("password is required");
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct PasswordHashResponse {
    pub password_hash: String,
}

#[derive(Deserialize)]
pub struct UsernameByTokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UsernameResponse {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub username: String,
    pub key: String,
    pub prefix: String,
}

impl ApiKeyResponse {
    pub fn new(username: &str, apikey: DerivedApiKey) -> Self {
        Self {
            username: username.to_string(),
            key: apikey.key,
            prefix: apikey.prefix,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetCacheRequest {
    /// Omit to clear every cached identity.
    pub username: Option<String>,
}
