/*
 * Responsibility
 * - アプリ共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / JSON error body)
 * - AuthError を統一的に変換
 *   - Unauthorized は理由を外に出さない (ログにのみ残る)
 *   - AccessDenied は認証済みの呼び出し元向けなので理由を返す
 */
use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::auth::AuthError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{code}: {message}")]
    BadRequest { code: &'static str, message: String },
    #[error("unauthorized")]
    Unauthorized,
    #[error("access denied. {}", reasons.join(". "))]
    Forbidden { reasons: Vec<String> },
    #[error("{resource} not found.")]
    NotFound { resource: String },
    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, code, message) = match self {
            AppError::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message),
            AppError::Forbidden { .. } => (StatusCode::FORBIDDEN, "FORBIDDEN", message),
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", message),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                message,
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        if status == StatusCode::UNAUTHORIZED {
            return (status, [(header::WWW_AUTHENTICATE, "Bearer")], Json(body)).into_response();
        }
        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InputInvalid(message) => AppError::bad_request("INVALID_INPUT", message),
            // The specific reason was logged where it happened
            AuthError::Unauthorized(_) => AppError::Unauthorized,
            AuthError::AccessDenied { reasons } => AppError::Forbidden { reasons },
            AuthError::NotFound(resource) => AppError::NotFound { resource },
            AuthError::Internal(detail) => {
                tracing::error!(detail = %detail, "internal error");
                AppError::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::UnauthorizedReason;

    #[test]
    fn unauthorized_reasons_collapse() {
        for reason in [
            UnauthorizedReason::UserNotFound,
            UnauthorizedReason::InvalidPassword,
            UnauthorizedReason::InvalidApiKey,
        ] {
            let resp = AppError::from(AuthError::Unauthorized(reason)).into_response();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
            assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
        }
    }

    #[test]
    fn access_denied_keeps_reasons() {
        let err = AppError::from(AuthError::AccessDenied {
            reasons: vec!["User role mismatch".into()],
        });
        assert_eq!(err.to_string(), "access denied. User role mismatch");
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }
}
