use serde::{Deserialize, Serialize};

use crate::services::auth::Token;

/// Request body for `/token` (password grant).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

impl TokenRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.username.trim().is_empty() {
            return Err("username is required");
        }
        if self.password.is_empty() {
            return Err("password is required");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always "bearer"
    pub token_type: String,
    /// Seconds until expiry.
    pub expires_in: u64,
}

impl From<Token> for TokenResponse {
    fn from(t: Token) -> Self {
        Self {
            access_token: t.access_token,
            token_type: t.token_type.to_string(),
            expires_in: t.expires_in,
        }
    }
}
