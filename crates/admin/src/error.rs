//! Unified error handling for admin.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::middleware::AdminAuthRejection;
use crate::services::{AdminUserError, AuthError, InviteError, SignupError};

/// Application-level error type for the admin panel.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

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

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if matches!(self, Self::Database(_) | Self::Internal(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        }

        let status = match &self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

impl From<InviteError> for AppError {
    fn from(err: InviteError) -> Self {
        match err {
            InviteError::Repository(e) => Self::Database(e),
            InviteError::NotFound | InviteError::InvalidToken => Self::NotFound(err.to_string()),
            InviteError::NotPermitted | InviteError::RoleNotGrantable(_) => {
                Self::Forbidden(err.to_string())
            }
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl From<AdminUserError> for AppError {
    fn from(err: AdminUserError) -> Self {
        match err {
            AdminUserError::Repository(e) => Self::Database(e),
            AdminUserError::NotFound => Self::NotFound(err.to_string()),
            AdminUserError::NotPermitted => Self::Forbidden(err.to_string()),
            AdminUserError::CannotModifySelf => Self::BadRequest(err.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Repository(e) => Self::Database(e),
            AuthError::Identity(e) => Self::Internal(e.to_string()),
            AuthError::InvalidCredentials => Self::Unauthorized(err.to_string()),
            AuthError::AccountDeactivated | AuthError::NotAuthorized => {
                Self::Forbidden(err.to_string())
            }
        }
    }
}

impl From<AdminAuthRejection> for AppError {
    fn from(rejection: AdminAuthRejection) -> Self {
        match rejection {
            AdminAuthRejection::RedirectToLogin | AdminAuthRejection::Unauthorized => {
                Self::Unauthorized("Not signed in".to_string())
            }
            AdminAuthRejection::Forbidden => {
                Self::Forbidden("Missing permission for this action".to_string())
            }
            AdminAuthRejection::Internal => Self::Internal("session check failed".to_string()),
        }
    }
}

/// JSON error body for the signup endpoints.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    /// Create an error with a user-facing message.
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self)).into_response()
    }
}

impl From<SignupError> for ApiError {
    fn from(err: SignupError) -> Self {
        if err.is_client_error() {
            return Self::new(err.to_string());
        }
        let event_id = sentry::capture_error(&err);
        tracing::error!(error = %err, sentry_event_id = %event_id, "Signup failed");
        Self::new("Signup failed. Please try again.")
    }
}

impl From<InviteError> for ApiError {
    fn from(err: InviteError) -> Self {
        if let InviteError::Repository(e) = &err {
            tracing::error!(error = %e, "Invite lookup failed");
            return Self::new("Unable to check this invitation. Please try again.");
        }
        Self::new(err.to_string())
    }
}

/// Set the Sentry user context from an admin profile.
pub fn set_sentry_user(id: &skinproof_core::AdminUserId, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("invite 12".to_string());
        assert_eq!(err.to_string(), "Not found: invite 12");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_service_errors_map_to_status() {
        assert_eq!(get_status(InviteError::NotPermitted), StatusCode::FORBIDDEN);
        assert_eq!(get_status(InviteError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(InviteError::DuplicateActiveInvite),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AdminUserError::CannotModifySelf),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AuthError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AuthError::AccountDeactivated),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_signup_errors_keep_user_message() {
        let err = ApiError::from(SignupError::InvitationOnly);
        assert_eq!(err.error, "Registration is by invitation only");

        let err = ApiError::from(SignupError::Invite(InviteError::Expired));
        assert_eq!(err.error, "This invitation has expired");
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Internal("connection refused".to_string());
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
        let err = ApiError::from(SignupError::Repository(RepositoryError::NotFound));
        assert!(!err.error.contains("not found"));
    }
}
