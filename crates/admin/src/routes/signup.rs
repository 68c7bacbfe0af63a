//! Signup routes: invite acceptance and first-user bootstrap.
//!
//! The signup page validates the invite from the link before showing the
//! form. Submitting creates the identity account and profile, consumes the
//! invite and signs the new admin in.

use askama::Template;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use skinproof_core::{InviteToken, Role};

use crate::error::{ApiError, set_sentry_user};
use crate::filters;
use crate::middleware::set_current_admin;
use crate::models::CurrentAdmin;
use crate::services::SignupRequest;
use crate::state::AppState;

/// Invite details shown on the signup page.
struct InviteSummary {
    token: String,
    email: String,
    role: Role,
    department: String,
    expires_on: String,
}

impl From<&InviteToken> for InviteSummary {
    fn from(invite: &InviteToken) -> Self {
        Self {
            token: invite.token.clone(),
            email: invite.email.to_string(),
            role: invite.role,
            department: invite.department.clone(),
            expires_on: invite.expires_at.format("%B %-d, %Y").to_string(),
        }
    }
}

/// Signup page template.
#[derive(Template)]
#[template(path = "auth/signup.html")]
struct SignupPageTemplate {
    invite: Option<InviteSummary>,
    invite_error: Option<String>,
    first_user: bool,
    can_submit: bool,
}

/// Build the signup router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", get(signup_page))
        .route("/api/signup", post(signup))
        .route("/api/signup/bootstrap", get(bootstrap_status))
        .route("/api/signup/invite/{token}", get(validate_invite))
}

/// Query string of the signup link.
#[derive(Debug, Deserialize)]
pub struct SignupQuery {
    pub invite: Option<String>,
}

/// Render the signup page.
///
/// GET /signup?invite={token}
async fn signup_page(
    State(state): State<AppState>,
    Query(query): Query<SignupQuery>,
) -> impl IntoResponse {
    let mut page = SignupPageTemplate {
        invite: None,
        invite_error: None,
        first_user: false,
        can_submit: false,
    };

    match query.invite.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => match state.invite_service().validate_token(token).await {
            Ok(invite) => {
                page.invite = Some(InviteSummary::from(&invite));
                page.can_submit = true;
            }
            Err(e) => page.invite_error = Some(ApiError::from(e).error),
        },
        None => match state.signup_service().is_first_user().await {
            Ok(first_user) => {
                page.first_user = first_user;
                page.can_submit = first_user;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to check bootstrap state");
                page.invite_error = Some("Signup is unavailable right now".to_owned());
            }
        },
    }

    Html(page.render().unwrap_or_else(|e| {
        tracing::error!("Template render error: {}", e);
        "Internal Server Error".to_string()
    }))
}

/// Public view of a valid invite.
#[derive(Debug, Serialize)]
pub struct InviteInfo {
    pub email: String,
    pub role: Role,
    pub department: String,
    pub expires_at: DateTime<Utc>,
}

/// Check an invite token before signup.
///
/// GET /api/signup/invite/{token}
async fn validate_invite(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<InviteInfo>, ApiError> {
    let invite = state.invite_service().validate_token(&token).await?;
    Ok(Json(InviteInfo {
        email: invite.email.into_inner(),
        role: invite.role,
        department: invite.department,
        expires_at: invite.expires_at,
    }))
}

/// Whether the next signup would bootstrap the first super admin.
#[derive(Debug, Serialize)]
pub struct BootstrapStatus {
    pub first_user: bool,
}

/// GET /api/signup/bootstrap
async fn bootstrap_status(State(state): State<AppState>) -> Result<Json<BootstrapStatus>, ApiError> {
    let first_user = state.signup_service().is_first_user().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to check bootstrap state");
        ApiError::new("Signup is unavailable right now")
    })?;
    Ok(Json(BootstrapStatus { first_user }))
}

/// Signup form body.
#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub invite: Option<String>,
}

/// Create the account and sign in.
///
/// POST /api/signup
async fn signup(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<SignupForm>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .signup_service()
        .sign_up(SignupRequest {
            email: form.email,
            password: form.password,
            name: form.name,
            invite_token: form.invite.filter(|t| !t.trim().is_empty()),
        })
        .await?;

    let current = CurrentAdmin::from(&profile);
    session
        .cycle_id()
        .await
        .map_err(|e| ApiError::new(format!("Session error: {e}")))?;
    set_current_admin(&session, &current)
        .await
        .map_err(|e| ApiError::new(format!("Session error: {e}")))?;
    set_sentry_user(&profile.id, Some(profile.email.as_str()));

    if let Some(email_service) = state.email_service()
        && let Err(e) = email_service
            .send_welcome_email(profile.email.as_str(), &profile.name, profile.role)
            .await
    {
        tracing::warn!(error = %e, "Failed to send welcome email");
    }

    Ok((StatusCode::CREATED, Json(current)))
}
