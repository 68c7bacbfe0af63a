//! Admin profile domain types.
//!
//! These types represent validated domain objects for admin authentication.

use chrono::{DateTime, Utc};
use serde::Serialize;

use skinproof_core::{AdminUserId, Email, InviteId, Permission, Role, Subject};

/// A staff profile (domain type).
///
/// The profile ID is the ID of the identity account that signs in as it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminProfile {
    /// Profile ID (same as the identity account ID).
    pub id: AdminUserId,
    /// Profile email address.
    pub email: Email,
    /// Display name.
    pub name: String,
    /// Role/permission level.
    pub role: Role,
    /// Department label.
    pub department: String,
    /// Permissions granted to the profile.
    pub permissions: Vec<Permission>,
    /// Inactive profiles cannot sign in.
    pub is_active: bool,
    /// When the profile was created.
    pub created_at: DateTime<Utc>,
    /// When the profile was last updated.
    pub updated_at: DateTime<Utc>,
    /// Last successful sign-in.
    pub last_login_at: Option<DateTime<Utc>>,
    /// Admin whose invite created this profile.
    pub invited_by: Option<AdminUserId>,
    /// Invite consumed at signup.
    pub invite_id: Option<InviteId>,
}

impl Subject for AdminProfile {
    fn role(&self) -> Role {
        self.role
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn permissions(&self) -> &[Permission] {
        &self.permissions
    }
}

/// Data needed to insert a new profile.
#[derive(Debug, Clone)]
pub struct NewAdminProfile {
    /// Identity account the profile belongs to.
    pub id: AdminUserId,
    /// Profile email address.
    pub email: Email,
    /// Display name.
    pub name: String,
    /// Role/permission level.
    pub role: Role,
    /// Department label.
    pub department: String,
    /// Admin whose invite created this profile.
    pub invited_by: Option<AdminUserId>,
    /// Invite consumed at signup.
    pub invite_id: Option<InviteId>,
}

impl NewAdminProfile {
    /// Permissions the profile starts with.
    #[must_use]
    pub fn permissions(&self) -> Vec<Permission> {
        self.role.default_permissions().to_vec()
    }

    /// Materialize the profile as it would be stored at `now`.
    #[must_use]
    pub fn into_profile(self, now: DateTime<Utc>) -> AdminProfile {
        let permissions = self.permissions();
        AdminProfile {
            id: self.id,
            email: self.email,
            name: self.name,
            role: self.role,
            department: self.department,
            permissions,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
            invited_by: self.invited_by,
            invite_id: self.invite_id,
        }
    }
}
