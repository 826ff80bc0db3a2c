//! Request headers -> raw `Credential`.
//!
//! - `Authorization: Bearer <token>`
//! - `Authorization: Basic <base64(username:password)>`
//! - `X-API-Key: <prefix.body>`
//!
//! `Authorization` wins over `X-API-Key` when both are sent.

use axum::http::{HeaderMap, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::services::auth::Credential;

pub const APIKEY_HEADER: &str = "x-api-key";

/// A credential header was present but could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialParseError {
    #[error("authorization header is not valid UTF-8")]
    NotUtf8,
    #[error("unsupported authorization scheme")]
    UnsupportedScheme,
    #[error("malformed basic credentials")]
    MalformedBasic,
}

pub fn extract(headers: &HeaderMap) -> Result<Credential, CredentialParseError> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let value = value.to_str().map_err(|_| CredentialParseError::NotUtf8)?;
        return parse_authorization(value.trim());
    }

    if let Some(value) = headers.get(APIKEY_HEADER) {
        let apikey = value.to_str().map_err(|_| CredentialParseError::NotUtf8)?;
        return Ok(Credential::ApiKey(apikey.trim().to_string()));
    }

    Ok(Credential::None)
}

fn parse_authorization(value: &str) -> Result<Credential, CredentialParseError> {
    let (scheme, rest) = value
        .split_once(' ')
        .ok_or(CredentialParseError::UnsupportedScheme)?;
    let rest = rest.trim();

    if scheme.eq_ignore_ascii_case("bearer") {
        return Ok(Credential::Bearer(rest.to_string()));
    }
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(CredentialParseError::UnsupportedScheme);
    }

    let decoded = STANDARD
        .decode(rest)
        .map_err(|_| CredentialParseError::MalformedBasic)?;
    let decoded = String::from_utf8(decoded).map_err(|_| CredentialParseError::MalformedBasic)?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or(CredentialParseError::MalformedBasic)?;

    Ok(Credential::Basic {
        username: username.to_string(),
        password: password.to_string(),
    })
}
