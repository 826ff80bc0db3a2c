use std::str::FromStr;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token subject is empty")]
    InvalidSubject,
    #[error("token ttl must be positive")]
    InvalidTtl,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    Malformed,
    #[error("token is missing")]
    Missing,
    #[error("failed to encode token: {0}")]
    Encoding(String),
    #[error("unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Claims carried by a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub exp: i64,
}

/// What the token endpoint hands back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

impl Token {
    pub fn bearer(access_token: String, expires_in: u64) -> Self {
        Self {
            access_token,
            token_type: "bearer",
            expires_in,
        }
    }
}

/// HMAC-signed JWT codec carrying `{sub, exp}`.
///
/// Key material is not printable via Debug.
#[derive(Clone)]
pub struct TokenCodec {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8], algorithm: &str) -> Result<Self, TokenError> {
        let algorithm = Algorithm::from_str(algorithm)
            .map_err(|_| TokenError::UnsupportedAlgorithm(algorithm.to_string()))?;
        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(TokenError::UnsupportedAlgorithm(format!("{algorithm:?}")));
        }

        let mut validation = Validation::new(algorithm);
        validation.set_required_spec_claims(&["exp", "sub"]);
        // An expired token fails even one second past `exp`
        validation.leeway = 0;

        Ok(Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        })
    }

    pub fn encode(&self, subject: &str, ttl_seconds: i64) -> Result<String, TokenError> {
        if subject.is_empty() {
            return Err(TokenError::InvalidSubject);
        }
        if ttl_seconds <= 0 {
            return Err(TokenError::InvalidTtl);
        }

        let exp = chrono::Utc::now()
            .timestamp()
            .checked_add(ttl_seconds)
            .ok_or(TokenError::InvalidTtl)?;
        debug!(sub = %subject, exp, "encoding bearer token");

        self.sign(&TokenClaims {
            sub: subject.to_string(),
            exp,
        })
    }

    pub(crate) fn sign(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        let mut header = Header::new(self.algorithm);
        header.typ = Some("JWT".to_string());
        jsonwebtoken::encode(&header, claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "failed to sign JWT");
            TokenError::Encoding(e.to_string())
        })
    }

    /// Verify signature and expiry, returning the subject.
    pub fn decode(&self, token: &str) -> Result<String, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Missing);
        }

        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })?;

        if data.claims.sub.is_empty() {
            return Err(TokenError::Malformed);
        }

        Ok(data.claims.sub)
    }
}
