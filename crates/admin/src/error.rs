//! Unified error handling for the back office.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{AllocatorError, AuthError, PushError, RecordError};

/// Application-level error type for the back office.
#[derive(Debug, Error)]
pub enum AppError {
    /// Repository operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// No sequence number could be allocated.
    #[error("Allocation error: {0}")]
    Allocation(#[from] AllocatorError),

    /// Passkey authentication failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Push notification forwarding failed.
    #[error("Push error: {0}")]
    Push(#[from] PushError),

    /// An optional integration is not configured.
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RecordError> for AppError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::Allocation(e) => Self::Allocation(e),
            RecordError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session error: {err}"))
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_))
            | Self::Auth(AuthError::UserAlreadyExists) => StatusCode::CONFLICT,
            Self::Database(RepositoryError::Validation(_)) | Self::Push(PushError::Invalid(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Allocation(AllocatorError::Store(_)) | Self::NotConfigured(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Allocation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(
                AuthError::InvalidEmail(_)
                | AuthError::InvalidDisplayName { .. }
                | AuthError::InvalidSessionState,
            )
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Auth(AuthError::Repository(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(_) | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Push(_) => StatusCode::BAD_GATEWAY,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    /// Message safe to show to the client.
    fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::Validation(e)) => e.to_string(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(_) | Self::Internal(_) | Self::Allocation(_) => {
                match self.status() {
                    StatusCode::SERVICE_UNAVAILABLE => {
                        "Service temporarily unavailable, please retry".to_string()
                    }
                    _ => "Internal server error".to_string(),
                }
            }
            Self::Auth(
                e @ (AuthError::InvalidEmail(_)
                | AuthError::InvalidDisplayName { .. }
                | AuthError::UserAlreadyExists
                | AuthError::InvalidSessionState),
            ) => e.to_string(),
            Self::Auth(AuthError::Repository(_)) => "Internal server error".to_string(),
            // One message for every sign-in failure so accounts cannot be probed.
            Self::Auth(_) => "Authentication failed".to_string(),
            Self::Push(e @ PushError::Invalid(_)) => e.to_string(),
            Self::Push(_) => "External service error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Back-office request error"
            );
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

/// Set the Sentry user context from a principal.
pub fn set_sentry_user(uid: &str, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(uid.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
mod tests {
    use backoffice_core::CounterName;

    use super::*;
    use crate::db::StoreError;
    use crate::models::ValidationError;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("invoice 12".to_string());
        assert_eq!(err.to_string(), "Not found: invoice 12");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(RepositoryError::NotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(RepositoryError::Conflict("stale".to_string()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(RepositoryError::Validation(ValidationError::new("name", "empty")).into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(RepositoryError::DataCorruption("bad".to_string()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AllocatorError::Exhausted(CounterName::INVOICE).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AllocatorError::Store(StoreError::Unavailable("down".to_string())).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(AuthError::UserNotFound.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AuthError::UserAlreadyExists.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(PushError::Invalid("token").into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(
                PushError::Rejected {
                    status: 400,
                    body: String::new()
                }
                .into()
            ),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::NotConfigured("push".to_string())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::from(RepositoryError::DataCorruption(
            "invalid document users/123".to_string(),
        ));
        assert_eq!(err.public_message(), "Internal server error");

        let err = AppError::from(AuthError::NoCredentials);
        assert_eq!(err.public_message(), "Authentication failed");
    }
}
