//! Invite management API.
//!
//! Admins holding `ManageInvites` create and list their own invites. The
//! signup link is emailed when SMTP is configured and logged otherwise.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use skinproof_core::{AccessRule, InviteId, InviteStatus, InviteToken, Permission, Role};

use crate::error::AppError;
use crate::middleware::{RequireAdminAuth, require_access};
use crate::services::{CreateInviteParams, InviteStats};
use crate::state::AppState;

const MANAGE_INVITES: AccessRule = AccessRule::Permission(Permission::ManageInvites);

/// Build the invites router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/invites", get(list_invites).post(create_invite))
        .route("/api/invites/stats", get(invite_stats))
        .route("/api/invites/{id}/deactivate", post(deactivate_invite))
}

/// Invite as shown to its creator.
#[derive(Debug, Serialize)]
pub struct InviteView {
    pub id: Option<i32>,
    pub email: String,
    pub role: Role,
    pub department: String,
    pub status: InviteStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub max_uses: i32,
    pub current_uses: i32,
    pub signup_url: Option<String>,
}

impl InviteView {
    fn new(invite: &InviteToken, base_url: &str, now: DateTime<Utc>) -> Self {
        let status = invite.status_at(now);
        Self {
            id: invite.id.map(|id| id.get()),
            email: invite.email.to_string(),
            role: invite.role,
            department: invite.department.clone(),
            status,
            created_at: invite.created_at,
            expires_at: invite.expires_at,
            used_at: invite.used_at,
            max_uses: invite.max_uses,
            current_uses: invite.current_uses,
            // Only links that still work are worth sharing.
            signup_url: (status == InviteStatus::Active)
                .then(|| invite.acceptance_url(base_url).ok())
                .flatten()
                .map(String::from),
        }
    }
}

/// The caller's invites, newest first.
///
/// GET /api/invites
#[instrument(skip_all)]
async fn list_invites(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<InviteView>>, AppError> {
    require_access(&admin, &MANAGE_INVITES)?;

    let now = Utc::now();
    let base_url = &state.config().base_url;
    let invites = state.invite_service().get_invites_by_user(admin.id).await?;
    Ok(Json(
        invites
            .iter()
            .map(|invite| InviteView::new(invite, base_url, now))
            .collect(),
    ))
}

/// Counts of the caller's invites by status.
///
/// GET /api/invites/stats
async fn invite_stats(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
) -> Result<Json<InviteStats>, AppError> {
    require_access(&admin, &MANAGE_INVITES)?;
    Ok(Json(state.invite_service().get_invite_stats(admin.id).await?))
}

/// Create invite request body.
#[derive(Debug, Deserialize)]
pub struct CreateInviteForm {
    pub email: String,
    pub role: Role,
    pub department: String,
    pub expires_in_days: Option<i64>,
    pub max_uses: Option<i32>,
}

/// Create an invite and deliver its signup link.
///
/// POST /api/invites
#[instrument(skip(admin, state, form))]
async fn create_invite(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Json(form): Json<CreateInviteForm>,
) -> Result<impl IntoResponse, AppError> {
    require_access(&admin, &MANAGE_INVITES)?;

    let invite = state
        .invite_service()
        .create_invite(
            CreateInviteParams {
                email: form.email,
                role: form.role,
                department: form.department,
                expires_in_days: form.expires_in_days,
                max_uses: form.max_uses,
            },
            Some(&admin),
        )
        .await?;

    let signup_url = invite
        .acceptance_url(&state.config().base_url)
        .map_err(|e| AppError::Internal(format!("invalid base URL: {e}")))?;

    match state.email_service() {
        Some(email_service) => {
            if let Err(e) = email_service
                .send_invite_email(&invite, signup_url.as_str())
                .await
            {
                // The invite stands; the creator can copy the link instead.
                tracing::error!(error = %e, "Failed to send invite email");
            }
        }
        None => {
            tracing::info!(
                email = %invite.email,
                signup_url = %signup_url,
                "SMTP not configured - invite link logged (dev mode)"
            );
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(InviteView::new(&invite, &state.config().base_url, Utc::now())),
    ))
}

/// Deactivate an invite. Creator or super admin only.
///
/// POST /api/invites/{id}/deactivate
#[instrument(skip(admin, state))]
async fn deactivate_invite(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<InviteView>, AppError> {
    let invite = state
        .invite_service()
        .deactivate_invite(InviteId::new(id), Some(&admin))
        .await?;
    Ok(Json(InviteView::new(
        &invite,
        &state.config().base_url,
        Utc::now(),
    )))
}
