//! Admin profile management for super admins.
//!
//! Role changes reset permissions to the new role's defaults. A super admin
//! cannot change their own role or deactivate themselves, and the store
//! re-checks the actor's standing at the moment of each write, so two super
//! admins demoting each other leave one in place.

use thiserror::Error;
use tracing::instrument;

use skinproof_core::{AdminUserId, Role};

use crate::db::{ProfileChange, ProfileStore, RepositoryError};
use crate::models::{AdminProfile, CurrentAdmin};

/// Errors from admin profile management.
#[derive(Debug, Error)]
pub enum AdminUserError {
    /// No profile with that ID.
    #[error("Admin user not found")]
    NotFound,

    /// The actor tried to demote or deactivate themselves.
    #[error("You cannot change your own role or status")]
    CannotModifySelf,

    /// Only super admins manage profiles.
    #[error("Only super admins can manage admin users")]
    NotPermitted,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for AdminUserError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Repository(other),
        }
    }
}

/// Profile management service.
pub struct AdminUserService<'a> {
    profiles: &'a dyn ProfileStore,
}

impl<'a> AdminUserService<'a> {
    /// Create a new service.
    #[must_use]
    pub const fn new(profiles: &'a dyn ProfileStore) -> Self {
        Self { profiles }
    }

    /// Every profile, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AdminUserError::NotPermitted` unless `actor` is a super admin.
    pub async fn list(&self, actor: &CurrentAdmin) -> Result<Vec<AdminProfile>, AdminUserError> {
        ensure_super_admin(actor)?;
        Ok(self.profiles.list_all().await?)
    }

    /// Assign `role` to `target`, resetting its permissions.
    ///
    /// # Errors
    ///
    /// Returns `AdminUserError::NotPermitted`, `CannotModifySelf` or `NotFound`.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn change_role(
        &self,
        actor: &CurrentAdmin,
        target: AdminUserId,
        role: Role,
    ) -> Result<AdminProfile, AdminUserError> {
        ensure_super_admin(actor)?;
        if actor.id == target {
            return Err(AdminUserError::CannotModifySelf);
        }

        let profile = self.apply(actor, target, ProfileChange::Role(role)).await?;
        tracing::info!(role = %profile.role, "Admin role changed");
        Ok(profile)
    }

    /// Block `target` from signing in. Existing sessions are rejected on
    /// their next request.
    ///
    /// # Errors
    ///
    /// Returns `AdminUserError::NotPermitted`, `CannotModifySelf` or `NotFound`.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn deactivate(
        &self,
        actor: &CurrentAdmin,
        target: AdminUserId,
    ) -> Result<AdminProfile, AdminUserError> {
        ensure_super_admin(actor)?;
        if actor.id == target {
            return Err(AdminUserError::CannotModifySelf);
        }

        let profile = self.apply(actor, target, ProfileChange::Active(false)).await?;
        tracing::info!("Admin deactivated");
        Ok(profile)
    }

    /// Allow a deactivated profile to sign in again.
    ///
    /// # Errors
    ///
    /// Returns `AdminUserError::NotPermitted` or `NotFound`.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn reactivate(
        &self,
        actor: &CurrentAdmin,
        target: AdminUserId,
    ) -> Result<AdminProfile, AdminUserError> {
        ensure_super_admin(actor)?;
        let profile = self.apply(actor, target, ProfileChange::Active(true)).await?;
        tracing::info!("Admin reactivated");
        Ok(profile)
    }
}

impl AdminUserService<'_> {
    async fn apply(
        &self,
        actor: &CurrentAdmin,
        target: AdminUserId,
        change: ProfileChange,
    ) -> Result<AdminProfile, AdminUserError> {
        self.profiles
            .apply_as_super_admin(actor.id, target, change)
            .await?
            .ok_or(AdminUserError::NotPermitted)
    }
}

fn ensure_super_admin(actor: &CurrentAdmin) -> Result<(), AdminUserError> {
    if actor.is_active && actor.role == Role::SuperAdmin {
        Ok(())
    } else {
        Err(AdminUserError::NotPermitted)
    }
}
