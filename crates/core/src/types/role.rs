//! Roles and the permissions they grant.

use serde::{Deserialize, Serialize};

/// Error returned when a role name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid role: {0} (expected one of user, support, admin, super_admin)")]
pub struct RoleParseError(pub String);

/// Profile role.
///
/// Every role except [`Role::User`] is *privileged*: it grants access to the
/// admin panel and can be assigned through an invite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "admin.admin_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Mobile app user without panel access.
    User,
    /// Handles support tickets and review flags.
    Support,
    /// Manages content, verifications and invites.
    Admin,
    /// Full access including admin user management.
    SuperAdmin,
}

impl Role {
    /// Roles that grant access to the admin panel.
    pub const PRIVILEGED: [Self; 3] = [Self::Support, Self::Admin, Self::SuperAdmin];

    /// Returns true for roles that grant admin panel access.
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        !matches!(self, Self::User)
    }

    /// Position in the role ordering (`user < support < admin < super_admin`).
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::User => 0,
            Self::Support => 1,
            Self::Admin => 2,
            Self::SuperAdmin => 3,
        }
    }

    /// Returns true if a holder of this role may hand out `other` in an invite.
    #[must_use]
    pub const fn can_grant(self, other: Self) -> bool {
        self.is_privileged() && other.is_privileged() && other.rank() <= self.rank()
    }

    /// Default permission set for the role.
    #[must_use]
    pub const fn default_permissions(self) -> &'static [Permission] {
        match self {
            Self::User => &[],
            Self::Support => &[
                Permission::ManageSupportTickets,
                Permission::ManageReviews,
                Permission::ViewAnalytics,
            ],
            Self::Admin => &[
                Permission::ManageReviews,
                Permission::ManageVerifications,
                Permission::ManageInsights,
                Permission::ManageSupportTickets,
                Permission::ViewAnalytics,
                Permission::ManageInvites,
            ],
            Self::SuperAdmin => &Permission::ALL,
        }
    }

    /// Canonical snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Support => "support",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "user" => Ok(Self::User),
            "support" => Ok(Self::Support),
            "admin" => Ok(Self::Admin),
            "super_admin" => Ok(Self::SuperAdmin),
            other => Err(RoleParseError(other.to_owned())),
        }
    }
}

/// A capability in the admin panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Moderate product reviews.
    ManageReviews,
    /// Approve or reject product verification requests.
    ManageVerifications,
    /// Author and publish insights articles.
    ManageInsights,
    /// Answer support tickets.
    ManageSupportTickets,
    /// Read dashboard analytics.
    ViewAnalytics,
    /// Create and revoke invites.
    ManageInvites,
    /// Change roles and deactivate admin profiles.
    ManageAdmins,
}

impl Permission {
    /// Every permission, in display order.
    pub const ALL: [Self; 7] = [
        Self::ManageReviews,
        Self::ManageVerifications,
        Self::ManageInsights,
        Self::ManageSupportTickets,
        Self::ViewAnalytics,
        Self::ManageInvites,
        Self::ManageAdmins,
    ];

    /// Canonical snake_case name, as persisted.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ManageReviews => "manage_reviews",
            Self::ManageVerifications => "manage_verifications",
            Self::ManageInsights => "manage_insights",
            Self::ManageSupportTickets => "manage_support_tickets",
            Self::ViewAnalytics => "view_analytics",
            Self::ManageInvites => "manage_invites",
            Self::ManageAdmins => "manage_admins",
        }
    }

    /// Look up a permission by its persisted name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [Role::User, Role::Support, Role::Admin, Role::SuperAdmin] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("viewer".parse::<Role>().is_err());
    }

    #[test]
    fn test_privileged_roles() {
        assert!(!Role::User.is_privileged());
        for role in Role::PRIVILEGED {
            assert!(role.is_privileged());
        }
    }

    #[test]
    fn test_super_admin_has_every_permission() {
        assert_eq!(Role::SuperAdmin.default_permissions(), &Permission::ALL);
    }

    #[test]
    fn test_admin_cannot_manage_admins() {
        let perms = Role::Admin.default_permissions();
        assert!(perms.contains(&Permission::ManageInvites));
        assert!(!perms.contains(&Permission::ManageAdmins));
    }

    #[test]
    fn test_support_and_user_permissions() {
        let perms = Role::Support.default_permissions();
        assert!(perms.contains(&Permission::ManageSupportTickets));
        assert!(!perms.contains(&Permission::ManageInvites));
        assert!(Role::User.default_permissions().is_empty());
    }

    #[test]
    fn test_can_grant_respects_rank() {
        assert!(Role::SuperAdmin.can_grant(Role::SuperAdmin));
        assert!(Role::Admin.can_grant(Role::Support));
        assert!(Role::Admin.can_grant(Role::Admin));
        assert!(!Role::Admin.can_grant(Role::SuperAdmin));
        assert!(!Role::Support.can_grant(Role::Admin));
        assert!(!Role::SuperAdmin.can_grant(Role::User));
        assert!(!Role::User.can_grant(Role::User));
    }

    #[test]
    fn test_permission_names() {
        for perm in Permission::ALL {
            assert_eq!(Permission::from_name(perm.as_str()), Some(perm));
        }
        assert_eq!(Permission::from_name("launch_rockets"), None);
    }
}
