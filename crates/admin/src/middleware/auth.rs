//! Authentication middleware and extractors for admin.
//!
//! The session only stores who signed in. Every guarded request reloads the
//! profile so deactivation and role changes apply on the next request.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use skinproof_core::{AccessDecision, AccessRule};

use crate::models::{CurrentAdmin, session_keys};
use crate::state::AppState;

/// Extractor that requires an active admin with a staff role.
///
/// Returns a redirect to the login page for HTML requests and
/// 401 Unauthorized for API requests when nobody is signed in.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAdminAuth(admin): RequireAdminAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", admin.name)
/// }
/// ```
pub struct RequireAdminAuth(pub CurrentAdmin);

/// Extractor that requires an active super admin. Other staff get 403.
pub struct RequireSuperAdmin(pub CurrentAdmin);

/// Rejection from the admin extractors.
#[derive(Debug, PartialEq, Eq)]
pub enum AdminAuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin,
    /// Unauthorized response (for API requests).
    Unauthorized,
    /// Signed in, but the profile lacks the required role or permission.
    Forbidden,
    /// The session or profile store failed.
    Internal,
}

impl IntoResponse for AdminAuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/auth/login").into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                "You do not have access to this resource",
            )
                .into_response(),
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

impl AdminAuthRejection {
    fn unauthenticated(parts: &Parts) -> Self {
        if parts.uri.path().starts_with("/api/") {
            Self::Unauthorized
        } else {
            Self::RedirectToLogin
        }
    }
}

impl FromRequestParts<AppState> for RequireAdminAuth {
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authorize(parts, state, &AccessRule::Authenticated)
            .await
            .map(Self)
    }
}

impl FromRequestParts<AppState> for RequireSuperAdmin {
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authorize(parts, state, &AccessRule::SuperAdminOnly)
            .await
            .map(Self)
    }
}

/// Load the signed-in admin, refresh it from the profile store and check `rule`.
async fn authorize(
    parts: &Parts,
    state: &AppState,
    rule: &AccessRule,
) -> Result<CurrentAdmin, AdminAuthRejection> {
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or(AdminAuthRejection::Unauthorized)?;

    let signed_in: CurrentAdmin = session
        .get(session_keys::CURRENT_ADMIN)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load admin session");
            AdminAuthRejection::Internal
        })?
        .ok_or_else(|| AdminAuthRejection::unauthenticated(parts))?;

    let profile = state
        .profiles()
        .get_by_id(signed_in.id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to reload admin profile");
            AdminAuthRejection::Internal
        })?;

    let current = profile.as_ref().map(CurrentAdmin::from);
    match rule.evaluate(current.as_ref()) {
        AccessDecision::Allow => {}
        AccessDecision::Unauthenticated | AccessDecision::Inactive => {
            tracing::warn!(profile_id = %signed_in.id, "Rejecting session for missing or deactivated profile");
            if let Err(e) = clear_current_admin(session).await {
                tracing::warn!(error = %e, "Failed to clear rejected admin session");
            }
            return Err(AdminAuthRejection::unauthenticated(parts));
        }
        AccessDecision::Forbidden => return Err(AdminAuthRejection::Forbidden),
    }

    let current = current.ok_or(AdminAuthRejection::Internal)?;
    if current != signed_in {
        set_current_admin(session, &current).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to refresh admin session");
            AdminAuthRejection::Internal
        })?;
    }
    Ok(current)
}

/// Check `rule` against an already-extracted admin, for permission checks
/// inside handlers.
///
/// # Errors
///
/// Returns `AdminAuthRejection::Forbidden` if the rule does not allow `admin`.
pub fn require_access(admin: &CurrentAdmin, rule: &AccessRule) -> Result<(), AdminAuthRejection> {
    match rule.evaluate(Some(admin)) {
        AccessDecision::Allow => Ok(()),
        AccessDecision::Unauthenticated | AccessDecision::Inactive => {
            Err(AdminAuthRejection::Unauthorized)
        }
        AccessDecision::Forbidden => Err(AdminAuthRejection::Forbidden),
    }
}

/// Helper to set the current admin in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_admin(
    session: &Session,
    admin: &CurrentAdmin,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CURRENT_ADMIN, admin).await
}

/// Helper to clear the current admin from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_admin(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
        .await?;
    Ok(())
}
