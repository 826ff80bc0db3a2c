/*
 * Responsibility
 * - 環境変数や設定の読み込み (DATABASE_URL, token / API key の secret, CORS など)
 * - 設定値のバリデーション (不足なら起動失敗)
 * - security core には env を読ませず、SecurityConfig として値で渡す
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::services::auth::hasher::{ApiKeyParams, PasswordParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AppEnv {
    Development,
    Test,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        Self::parse(&std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()))
    }

    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "test" | "testing" => Self::Test,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Inputs of the security core.
#[derive(Clone)]
pub struct SecurityConfig {
    pub token_secret: String,
    pub token_algorithm: String,
    pub token_expire_sec: i64,
    pub apikey: ApiKeyParams,
    pub password: PasswordParams,
    // Identity for credential-less requests outside production
    pub debug_username: Option<String>,
    pub store_timeout: Duration,
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print secrets
        f.debug_struct("SecurityConfig")
            .field("token_algorithm", &self.token_algorithm)
            .field("token_expire_sec", &self.token_expire_sec)
            .field("apikey", &self.apikey)
            .field("password", &self.password)
            .field("debug_username", &self.debug_username)
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,

    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,

    pub security: SecurityConfig,
}

pub const MIN_TOKEN_SECRET_LEN: usize = 32;

fn parsed<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = parsed("PORT", 5050)?;

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let app_env = AppEnv::from_env();

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let token_secret = std::env::var("TOKEN_SECRET_KEY")
            .map_err(|_| ConfigError::Missing("TOKEN_SECRET_KEY"))?;
        if token_secret.len() < MIN_TOKEN_SECRET_LEN {
            return Err(ConfigError::Invalid("TOKEN_SECRET_KEY"));
        }

        let token_algorithm =
            std::env::var("TOKEN_ALGORITHM").unwrap_or_else(|_| "HS256".to_string());
        if !matches!(token_algorithm.as_str(), "HS256" | "HS384" | "HS512") {
            return Err(ConfigError::Invalid("TOKEN_ALGORITHM"));
        }

        let token_expire_sec: i64 = parsed("TOKEN_EXPIRE_SEC", 3600)?;
        if token_expire_sec <= 0 {
            return Err(ConfigError::Invalid("TOKEN_EXPIRE_SEC"));
        }

        let apikey_secret =
            std::env::var("APIKEY_SECRET").map_err(|_| ConfigError::Missing("APIKEY_SECRET"))?;
        let apikey_salt =
            std::env::var("APIKEY_SALT").map_err(|_| ConfigError::Missing("APIKEY_SALT"))?;
        if apikey_salt.is_empty() {
            return Err(ConfigError::Invalid("APIKEY_SALT"));
        }
        let apikey_rounds: u32 = parsed("APIKEY_ROUNDS", 1001)?;
        if apikey_rounds == 0 {
            return Err(ConfigError::Invalid("APIKEY_ROUNDS"));
        }

        let defaults = PasswordParams::default();
        let password = PasswordParams {
            m_cost: parsed("ARGON2_M_COST", defaults.m_cost)?,
            t_cost: parsed("ARGON2_T_COST", defaults.t_cost)?,
            p_cost: parsed("ARGON2_P_COST", defaults.p_cost)?,
        };

        let debug_username = std::env::var("DEBUG_USERNAME")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let debug_username = match debug_username {
            Some(name) if app_env.is_production() => {
                tracing::warn!(username = %name, "DEBUG_USERNAME is ignored in production");
                None
            }
            other => other,
        };

        let store_timeout_ms: u64 = parsed("IDENTITY_STORE_TIMEOUT_MS", 2000)?;
        if store_timeout_ms == 0 {
            return Err(ConfigError::Invalid("IDENTITY_STORE_TIMEOUT_MS"));
        }

        Ok(Self {
            addr,
            database_url,
            app_env,
            cors_allowed_origins,
            security: SecurityConfig {
                token_secret,
                token_algorithm,
                token_expire_sec,
                apikey: ApiKeyParams {
                    secret: apikey_secret,
                    salt: apikey_salt,
                    rounds: apikey_rounds,
                },
                password,
                debug_username,
                store_timeout: Duration::from_millis(store_timeout_ms),
            },
        })
    }
}
