//! Unified error handling for the API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use parcel_desk_core::api::ErrorResponse;

use crate::db::RepositoryError;
use crate::services::access::AccessError;
use crate::services::auth::AuthError;
use crate::services::lifecycle::LifecycleError;

/// Message for every 5xx.
pub const INTERNAL_MESSAGE: &str = "Internal server error";

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// No valid bearer token.
    #[error("Unauthorized")]
    Unauthenticated,

    /// Caller lacks the required role, or the target may not be modified.
    #[error("{0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("{0}")]
    InvalidInput(String),

    /// Resource not found, or not in the state the operation needs.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate registration, or target already in the requested state.
    #[error("{0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if matches!(self, Self::Database(_) | Self::Internal(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "API request error"
            );
        }

        let status = self.status();

        // Don't expose internal error details to clients
        let error = match &self {
            Self::Database(_) | Self::Internal(_) => INTERNAL_MESSAGE.to_string(),
            _ => self.to_string(),
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        tracing::debug!(error = %err, "Rejected bearer token");
        Self::Unauthenticated
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::InvalidInput(msg) => Self::InvalidInput(msg),
            LifecycleError::DuplicateActive => Self::Conflict(err.to_string()),
            LifecycleError::NoExpectedOrder | LifecycleError::NoVerifiedOrder => {
                Self::NotFound(err.to_string())
            }
            LifecycleError::OtpExhausted => Self::Internal(err.to_string()),
            LifecycleError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::InvalidInput(msg) => Self::InvalidInput(msg),
            AccessError::Forbidden(_) | AccessError::CannotModifyAdmin => {
                Self::Forbidden(err.to_string())
            }
            AccessError::UserNotFound(_) | AccessError::NotSecurity => {
                Self::NotFound(err.to_string())
            }
            AccessError::AlreadyInRole { .. } => Self::Conflict(err.to_string()),
            AccessError::Repository(e) => Self::Database(e),
        }
    }
}

/// Set the Sentry user context for the current request.
pub fn set_sentry_user(user_id: &str, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_owned()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthenticated),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::InvalidInput("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Conflict("test".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_internal_detail_hidden() {
        let response = AppError::Internal("pool timed out after 10s".to_string()).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_client_errors_carry_message() {
        let response = AppError::NotFound("Order not found".to_string()).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "Order not found" }));
    }

    #[test]
    fn test_lifecycle_errors_map_to_statuses() {
        assert_eq!(
            AppError::from(LifecycleError::NoVerifiedOrder).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(LifecycleError::DuplicateActive).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(LifecycleError::OtpExhausted).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_access_errors_map_to_statuses() {
        assert_eq!(
            AppError::from(AccessError::Forbidden(parcel_desk_core::Role::Admin)).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::from(AccessError::CannotModifyAdmin).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::from(AccessError::UserNotFound("ghost".to_string())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(AccessError::NotSecurity).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(AccessError::AlreadyInRole {
                username: "Jane".to_string(),
                role: parcel_desk_core::Role::Security,
            })
            .status(),
            StatusCode::CONFLICT
        );
    }
}
