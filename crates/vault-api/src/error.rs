//! HTTP error mapping

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use vault_core::error::DomainError;

use crate::response::ApiResponse;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Status code for each domain error.
pub fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::ValidationError(_) => StatusCode::BAD_REQUEST,
        DomainError::DuplicateTenantName(_)
        | DomainError::BackupAlreadyRunning(_)
        | DomainError::InvalidJobTransition { .. }
        | DomainError::RestoreNotAllowed(_)
        | DomainError::TenantNotActive(_) => StatusCode::CONFLICT,
        DomainError::TenantNotFound(_)
        | DomainError::BackupJobNotFound(_)
        | DomainError::ModuleNotFound(_)
        | DomainError::ConfigNotFoundOrInactive(_) => StatusCode::NOT_FOUND,
        DomainError::ConnectionError(_) | DomainError::ConnectionTimeout(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        DomainError::GatewayError(_) => StatusCode::BAD_GATEWAY,
        DomainError::SchemaCreationError(_)
        | DomainError::BackupExecutionError(_)
        | DomainError::MigrationError { .. }
        | DomainError::DatabaseError(_)
        | DomainError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Domain(err) => {
                let status = domain_status(&err);
                if status.is_server_error() {
                    tracing::error!(code = err.code(), "Request failed: {}", err);
                } else {
                    tracing::warn!(code = err.code(), "Request rejected: {}", err);
                }
                // Storage details stay in the log.
                let message = match err {
                    DomainError::DatabaseError(_) => "A database error occurred".to_string(),
                    DomainError::ConnectionError(_) | DomainError::ConnectionTimeout(_) => {
                        "The database is unavailable".to_string()
                    }
                    ref other => other.to_string(),
                };
                (status, err.code(), message)
            }
            ApiError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized: {}", msg);
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
        };

        (status, Json(ApiResponse::<()>::error(code, &message))).into_response()
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_caller_errors_are_client_statuses() {
        for err in [
            DomainError::ValidationError("x".into()),
            DomainError::DuplicateTenantName("acme".into()),
            DomainError::BackupAlreadyRunning(Uuid::nil()),
            DomainError::RestoreNotAllowed("x".into()),
        ] {
            assert!(err.is_caller_error());
            assert!(domain_status(&err).is_client_error(), "{err}");
        }
    }

    #[test]
    fn test_retryable_errors_are_unavailable() {
        let err = DomainError::ConnectionTimeout("pool".into());
        assert!(err.is_retryable());
        assert_eq!(domain_status(&err), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_database_error_text_is_hidden() {
        let response = ApiError::from(DomainError::DatabaseError("relation x".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
