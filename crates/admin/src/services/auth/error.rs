//! Admin authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::identity::IdentityError;

/// Errors that can occur during admin authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The profile was deactivated by a super admin.
    #[error("This account has been deactivated")]
    AccountDeactivated,

    /// The account has no privileged profile.
    #[error("This account does not have admin access")]
    NotAuthorized,

    /// Identity provider failure other than bad credentials.
    #[error("identity error: {0}")]
    Identity(IdentityError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<IdentityError> for AuthError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidCredentials | IdentityError::NotFound => {
                Self::InvalidCredentials
            }
            other => Self::Identity(other),
        }
    }
}
