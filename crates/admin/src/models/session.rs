//! Session-related types for admin authentication.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use skinproof_core::{AdminUserId, Email, Permission, Role, Subject};

use super::admin_user::AdminProfile;

/// Session-stored admin identity.
///
/// Written at sign-in and refreshed from the profile store on every
/// authenticated request, so role changes and deactivation apply immediately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentAdmin {
    /// Profile ID.
    pub id: AdminUserId,
    /// Admin's email address.
    pub email: Email,
    /// Admin's display name.
    pub name: String,
    /// Admin's role/permission level.
    pub role: Role,
    /// Admin's department.
    pub department: String,
    /// Permissions held at the last refresh.
    pub permissions: Vec<Permission>,
    /// Whether the profile was active at the last refresh.
    pub is_active: bool,
}

impl From<&AdminProfile> for CurrentAdmin {
    fn from(profile: &AdminProfile) -> Self {
        Self {
            id: profile.id,
            email: profile.email.clone(),
            name: profile.name.clone(),
            role: profile.role,
            department: profile.department.clone(),
            permissions: profile.permissions.clone(),
            is_active: profile.is_active,
        }
    }
}

impl Subject for CurrentAdmin {
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

/// Session keys for admin authentication data.
pub mod keys {
    /// Key for storing the current logged-in admin.
    pub const CURRENT_ADMIN: &str = "current_admin";
}
