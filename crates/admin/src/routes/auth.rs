//! Authentication route handlers for admin.
//!
//! Password sign-in, logout and the signed-in admin's profile.

use askama::Template;
use axum::{
    Json, Router,
    extract::State,
    response::{Html, IntoResponse, Redirect},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{RequireAdminAuth, set_current_admin};
use crate::models::{CurrentAdmin, session_keys};
use crate::state::AppState;

/// Login page template.
#[derive(Template)]
#[template(path = "auth/login.html")]
struct LoginPageTemplate;

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", get(login_page))
        .route("/auth/logout", post(logout))
        .route("/api/auth/login", post(login))
        .route("/api/me", get(me))
}

/// Render the login page.
///
/// GET /auth/login
async fn login_page() -> impl IntoResponse {
    Html(
        LoginPageTemplate
            .render()
            .unwrap_or_else(|_| String::from("Error rendering template")),
    )
}

/// Login form body.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Sign in with email and password.
///
/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginForm>,
) -> Result<Json<CurrentAdmin>, AppError> {
    let profile = state
        .auth_service()
        .login(&form.email, &form.password)
        .await?;

    let current = CurrentAdmin::from(&profile);
    session
        .cycle_id()
        .await
        .map_err(|e| AppError::Internal(format!("Session error: {e}")))?;
    set_current_admin(&session, &current)
        .await
        .map_err(|e| AppError::Internal(format!("Session error: {e}")))?;
    set_sentry_user(&profile.id, Some(profile.email.as_str()));

    Ok(Json(current))
}

/// Logout and clear session.
///
/// POST /auth/logout
async fn logout(State(state): State<AppState>, session: Session) -> impl IntoResponse {
    if let Ok(Some(admin)) = session
        .get::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
        .await
    {
        state.auth_service().logout(admin.id);
    }

    if let Err(e) = session.flush().await {
        tracing::warn!(error = %e, "Failed to clear admin session");
    }
    clear_sentry_user();

    Redirect::to("/auth/login")
}

/// The signed-in admin, refreshed from the profile store.
///
/// GET /api/me
async fn me(RequireAdminAuth(admin): RequireAdminAuth) -> Json<CurrentAdmin> {
    Json(admin)
}
