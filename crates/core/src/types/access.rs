//! Role gates.
//!
//! A gate is a pure decision over an already-loaded profile: no I/O, no
//! caching. HTTP extractors in the admin crate translate the decision into a
//! redirect or status code.

use super::{Permission, Role};

/// Anything an access rule can be evaluated against.
pub trait Subject {
    /// The subject's role.
    fn role(&self) -> Role;

    /// Whether the subject's profile is active.
    fn is_active(&self) -> bool;

    /// Permissions held by the subject. Defaults to the role's table entry.
    fn permissions(&self) -> &[Permission] {
        self.role().default_permissions()
    }
}

/// Requirement attached to a route or action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRule {
    /// Any active, privileged profile.
    Authenticated,
    /// One of the listed roles.
    AnyRole(Vec<Role>),
    /// Exactly this role.
    Role(Role),
    /// Only super admins.
    SuperAdminOnly,
    /// A privileged profile holding this permission.
    Permission(Permission),
}

/// Outcome of evaluating an [`AccessRule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// The subject may proceed.
    Allow,
    /// No profile is loaded.
    Unauthenticated,
    /// The profile exists but is deactivated.
    Inactive,
    /// The profile lacks the required role or permission.
    Forbidden,
}

impl AccessDecision {
    /// Returns true if the subject may proceed.
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

impl AccessRule {
    /// Shorthand for [`AccessRule::AnyRole`].
    #[must_use]
    pub fn any_of(roles: &[Role]) -> Self {
        Self::AnyRole(roles.to_vec())
    }

    /// Decide whether `subject` satisfies this rule.
    ///
    /// Deactivated profiles are rejected before any role check.
    #[must_use]
    pub fn evaluate<S: Subject + ?Sized>(&self, subject: Option<&S>) -> AccessDecision {
        let Some(subject) = subject else {
            return AccessDecision::Unauthenticated;
        };

        if !subject.is_active() {
            return AccessDecision::Inactive;
        }

        let role = subject.role();
        let allowed = match self {
            Self::Authenticated => role.is_privileged(),
            Self::AnyRole(roles) => roles.contains(&role),
            Self::Role(required) => role == *required,
            Self::SuperAdminOnly => role == Role::SuperAdmin,
            Self::Permission(permission) => {
                role.is_privileged() && subject.permissions().contains(permission)
            }
        };

        if allowed {
            AccessDecision::Allow
        } else {
            AccessDecision::Forbidden
        }
    }

    /// Boolean form of [`Self::evaluate`].
    #[must_use]
    pub fn allows<S: Subject + ?Sized>(&self, subject: Option<&S>) -> bool {
        self.evaluate(subject).is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Profile {
        role: Role,
        active: bool,
    }

    impl Subject for Profile {
        fn role(&self) -> Role {
            self.role
        }

        fn is_active(&self) -> bool {
            self.active
        }
    }

    fn profile(role: Role) -> Profile {
        Profile { role, active: true }
    }

    #[test]
    fn test_missing_profile_is_unauthenticated() {
        let rule = AccessRule::Authenticated;
        assert_eq!(
            rule.evaluate::<Profile>(None),
            AccessDecision::Unauthenticated
        );
    }

    #[test]
    fn test_inactive_profile_is_blocked_regardless_of_role() {
        let root = Profile {
            role: Role::SuperAdmin,
            active: false,
        };
        for rule in [
            AccessRule::Authenticated,
            AccessRule::SuperAdminOnly,
            AccessRule::Permission(Permission::ManageAdmins),
        ] {
            assert_eq!(rule.evaluate(Some(&root)), AccessDecision::Inactive);
        }
    }

    #[test]
    fn test_authenticated_requires_privileged_role() {
        let rule = AccessRule::Authenticated;
        assert!(!rule.allows(Some(&profile(Role::User))));
        assert!(rule.allows(Some(&profile(Role::Support))));
        assert!(rule.allows(Some(&profile(Role::SuperAdmin))));
    }

    #[test]
    fn test_any_role() {
        let rule = AccessRule::any_of(&[Role::Admin, Role::SuperAdmin]);
        assert!(rule.allows(Some(&profile(Role::Admin))));
        assert_eq!(
            rule.evaluate(Some(&profile(Role::Support))),
            AccessDecision::Forbidden
        );
    }

    #[test]
    fn test_exact_role_has_no_hierarchy() {
        let rule = AccessRule::Role(Role::Support);
        assert!(rule.allows(Some(&profile(Role::Support))));
        assert!(!rule.allows(Some(&profile(Role::SuperAdmin))));
    }

    #[test]
    fn test_super_admin_only() {
        let rule = AccessRule::SuperAdminOnly;
        assert!(rule.allows(Some(&profile(Role::SuperAdmin))));
        assert!(!rule.allows(Some(&profile(Role::Admin))));
    }

    #[test]
    fn test_permission_rule_uses_role_table() {
        let rule = AccessRule::Permission(Permission::ManageInvites);
        assert!(rule.allows(Some(&profile(Role::Admin))));
        assert!(rule.allows(Some(&profile(Role::SuperAdmin))));
        assert!(!rule.allows(Some(&profile(Role::Support))));
        assert!(!rule.allows(Some(&profile(Role::User))));
    }
}
