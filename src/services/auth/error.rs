use thiserror::Error;

use crate::services::auth::hasher::HashError;
use crate::services::auth::token::TokenError;

/// Why a presented credential was rejected.
///
/// Only for server-side logs: callers see a single generic "unauthorized".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnauthorizedReason {
    #[error("no credential presented")]
    MissingCredential,
    #[error("user not found")]
    UserNotFound,
    #[error("user is not active")]
    UserInactive,
    #[error("invalid password")]
    InvalidPassword,
    #[error("username mismatch")]
    UsernameMismatch,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("invalid API key")]
    InvalidApiKey,
    #[error("identity store timed out")]
    StoreTimeout,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid input: {0}")]
    InputInvalid(String),

    #[error("unauthorized: {0}")]
    Unauthorized(UnauthorizedReason),

    #[error("access denied: {}", reasons.join(". "))]
    AccessDenied { reasons: Vec<String> },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn unauthorized(reason: impl Into<UnauthorizedReason>) -> Self {
        Self::Unauthorized(reason.into())
    }

    /// Resolution paths turn "no such user" into an authentication failure.
    pub(crate) fn into_unauthorized(self) -> Self {
        match self {
            Self::NotFound(_) => Self::Unauthorized(UnauthorizedReason::UserNotFound),
            other => other,
        }
    }
}

impl From<HashError> for AuthError {
    fn from(e: HashError) -> Self {
        match e {
            HashError::InputInvalid(msg) => Self::InputInvalid(msg.to_string()),
            HashError::InvalidFormat => Self::Unauthorized(UnauthorizedReason::InvalidApiKey),
            HashError::Hashing(msg) => Self::Internal(msg),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::InvalidSubject | TokenError::InvalidTtl => Self::InputInvalid(e.to_string()),
            TokenError::Encoding(_) | TokenError::UnsupportedAlgorithm(_) => {
                Self::Internal(e.to_string())
            }
            other => Self::Unauthorized(UnauthorizedReason::Token(other)),
        }
    }
}
