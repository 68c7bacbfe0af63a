//! Admin user management API (super admin only).

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use skinproof_core::{AdminUserId, Role};

use crate::error::AppError;
use crate::middleware::RequireSuperAdmin;
use crate::models::AdminProfile;
use crate::state::AppState;

/// Build the admin users router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin-users", get(index))
        .route("/api/admin-users/{id}/role", post(change_role))
        .route("/api/admin-users/{id}/deactivate", post(deactivate))
        .route("/api/admin-users/{id}/activate", post(activate))
}

/// All admin profiles, oldest first.
///
/// GET /api/admin-users
#[instrument(skip(admin, state))]
async fn index(
    RequireSuperAdmin(admin): RequireSuperAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<AdminProfile>>, AppError> {
    Ok(Json(state.admin_user_service().list(&admin).await?))
}

/// Role change request body.
#[derive(Debug, Deserialize)]
pub struct ChangeRoleForm {
    pub role: Role,
}

/// POST /api/admin-users/{id}/role
#[instrument(skip(admin, state, form))]
async fn change_role(
    RequireSuperAdmin(admin): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(form): Json<ChangeRoleForm>,
) -> Result<Json<AdminProfile>, AppError> {
    let profile = state
        .admin_user_service()
        .change_role(&admin, AdminUserId::new(id), form.role)
        .await?;
    Ok(Json(profile))
}

/// POST /api/admin-users/{id}/deactivate
#[instrument(skip(admin, state))]
async fn deactivate(
    RequireSuperAdmin(admin): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AdminProfile>, AppError> {
    let profile = state
        .admin_user_service()
        .deactivate(&admin, AdminUserId::new(id))
        .await?;
    Ok(Json(profile))
}

/// POST /api/admin-users/{id}/activate
#[instrument(skip(admin, state))]
async fn activate(
    RequireSuperAdmin(admin): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AdminProfile>, AppError> {
    let profile = state
        .admin_user_service()
        .reactivate(&admin, AdminUserId::new(id))
        .await?;
    Ok(Json(profile))
}
