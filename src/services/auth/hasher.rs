//! One-way derivation for user passwords and API keys.
//!
//! - Passwords: Argon2id (PHC string, random salt per hash).
//! - API key body: iterated HMAC-SHA256 keyed with the server secret, using a
//!   fixed salt and round count, so the same seed always yields the same key.
//! - Fingerprint: plain SHA-256 of the full key, only used as a lookup column.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Minimum length (characters) of an API key seed.
pub const APIKEY_DATA_MIN_LEN: usize = 16;
/// Number of leading seed characters exposed as the key prefix.
pub const APIKEY_PREFIX_LEN: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HashError {
    #[error("invalid input: {0}")]
    InputInvalid(&'static str),
    #[error("invalid API key format")]
    InvalidFormat,
    #[error("hashing failed: {0}")]
    Hashing(String),
}

/// `{prefix}.{body}` API key together with the seed it was derived from.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct DerivedApiKey {
    pub key: String,
    pub prefix: String,
    pub body: String,
    pub data: String,
}

impl std::fmt::Debug for DerivedApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only the prefix is non-secret
        f.debug_struct("DerivedApiKey")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// Server-side inputs for API key derivation.
#[derive(Clone)]
pub struct ApiKeyParams {
    pub secret: String,
    pub salt: String,
    pub rounds: u32,
}

impl std::fmt::Debug for ApiKeyParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyParams")
            .field("rounds", &self.rounds)
            .finish_non_exhaustive()
    }
}

/// Argon2 cost parameters for password hashing.
#[derive(Debug, Clone, Copy)]
pub struct PasswordParams {
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for PasswordParams {
    fn default() -> Self {
        Self {
            m_cost: Params::DEFAULT_M_COST,
            t_cost: Params::DEFAULT_T_COST,
            p_cost: Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    apikey: ApiKeyParams,
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHasher")
            .field("apikey", &self.apikey)
            .finish_non_exhaustive()
    }
}

impl CredentialHasher {
    pub fn new(password: PasswordParams, apikey: ApiKeyParams) -> Result<Self, HashError> {
        let params = Params::new(password.m_cost, password.t_cost, password.p_cost, None)
            .map_err(|e| HashError::Hashing(e.to_string()))?;
        if apikey.rounds == 0 {
            return Err(HashError::InputInvalid("apikey rounds must be positive"));
        }

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            apikey,
        })
    }

    pub fn hash_password(&self, plaintext: &str) -> Result<String, HashError> {
        if plaintext.is_empty() {
            return Err(HashError::InputInvalid("empty password"));
        }

        let mut salt_bytes = [0u8; 16];
        getrandom::fill(&mut salt_bytes).map_err(|e| HashError::Hashing(e.to_string()))?;
        let salt =
            SaltString::encode_b64(&salt_bytes).map_err(|e| HashError::Hashing(e.to_string()))?;

        let phc = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| HashError::Hashing(e.to_string()))?;

        Ok(phc.to_string())
    }

    /// Malformed hashes verify as `false`.
    pub fn verify_password(&self, plaintext: &str, hash: &str) -> bool {
        if plaintext.is_empty() || hash.is_empty() {
            return false;
        }

        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .argon2
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                warn!(error = %e, "stored password hash is not a valid PHC string");
                false
            }
        }
    }

    /// Derive the full API key record from a seed. Pure: same seed, same key.
    pub fn calculate_apikey(&self, data: &str) -> Result<DerivedApiKey, HashError> {
        if data.is_empty() {
            return Err(HashError::InputInvalid("empty apikey data"));
        }

        let body = derive_apikey_body(
            data,
            &self.apikey.secret,
            &self.apikey.salt,
            self.apikey.rounds,
        )?;
        let prefix: String = data.chars().take(APIKEY_PREFIX_LEN).collect();
        let key = format!("{prefix}.{body}");

        Ok(DerivedApiKey {
            key,
            prefix,
            body,
            data: data.to_string(),
        })
    }
}

/// Deterministic body of an API key.
///
/// HMAC-SHA256(server_secret) over `salt || seed`, chained `rounds` times with
/// the blocks XOR-ed together. Only `[0-9A-Za-z]` survive in the output.
pub fn derive_apikey_body(
    seed: &str,
    server_secret: &str,
    salt: &str,
    rounds: u32,
) -> Result<String, HashError> {
    if seed.chars().count() < APIKEY_DATA_MIN_LEN {
        return Err(HashError::InputInvalid(
            "apikey data should be at least 16 characters",
        ));
    }
    if rounds == 0 {
        return Err(HashError::InputInvalid("apikey rounds must be positive"));
    }

    let mac = HmacSha256::new_from_slice(server_secret.as_bytes())
        .map_err(|e| HashError::Hashing(e.to_string()))?;

    let mut first = mac.clone();
    first.update(salt.as_bytes());
    first.update(seed.as_bytes());
    let mut block = first.finalize().into_bytes();
    let mut acc = block;

    for _ in 1..rounds {
        let mut next = mac.clone();
        next.update(&block);
        block = next.finalize().into_bytes();
        acc.iter_mut().zip(block.iter()).for_each(|(a, b)| *a ^= b);
    }

    Ok(URL_SAFE_NO_PAD
        .encode(acc)
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect())
}

/// Lookup key for a presented API key: `{prefix}_{base64(sha256(key))}`.
pub fn fingerprint(apikey: &str) -> Result<String, HashError> {
    let mut parts = apikey.split('.');
    let (Some(prefix), Some(_), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(HashError::InvalidFormat);
    };

    let digest = Sha256::digest(apikey.as_bytes());
    Ok(format!("{prefix}_{}", STANDARD.encode(digest)))
}
