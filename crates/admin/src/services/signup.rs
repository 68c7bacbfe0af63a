//! Signup orchestration.
//!
//! A signup either redeems an invite or, when no privileged profile exists
//! yet, bootstraps the first super admin. Steps:
//!
//! 1. validate the invite (or confirm the bootstrap window is open)
//! 2. create the identity account
//! 3. claim the bootstrap marker (bootstrap path only)
//! 4. persist the profile
//! 5. consume the invite (invite path only)
//! 6. publish [`AuthEvent::SignedUp`]
//!
//! Failures in steps 2-4 undo what already happened: the bootstrap claim is
//! released and the identity account deleted. A failure in step 5 is logged
//! and leaves the new profile in place.

use thiserror::Error;
use tracing::instrument;

use skinproof_core::{Email, EmailError, InviteToken, Role};

use super::events::{AuthEvent, AuthEvents};
use super::identity::{IdentityAccount, IdentityError, IdentityProvider};
use super::invites::{InviteError, InviteService};
use crate::config::InviteConfig;
use crate::db::{InviteStore, ProfileStore, RepositoryError};
use crate::models::{AdminProfile, NewAdminProfile};

/// Department assigned to the bootstrapped super admin.
pub const BOOTSTRAP_DEPARTMENT: &str = "Administration";

/// Errors from [`SignupService::sign_up`]. `Display` is the user-facing message.
#[derive(Debug, Error)]
pub enum SignupError {
    /// Email is malformed.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Display name is blank.
    #[error("Name is required")]
    NameRequired,

    /// No invite and the bootstrap window is closed.
    #[error("Registration is by invitation only")]
    InvitationOnly,

    /// Signup email differs from the invite's email.
    #[error("This invitation was issued for a different email address")]
    EmailMismatch,

    /// An account or profile already exists for the email.
    #[error("An account with this email already exists")]
    AlreadyRegistered,

    /// Invite could not be validated.
    #[error(transparent)]
    Invite(#[from] InviteError),

    /// Identity provider rejected the account.
    #[error(transparent)]
    Identity(IdentityError),

    /// Storage failure.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<IdentityError> for SignupError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::EmailTaken => Self::AlreadyRegistered,
            other => Self::Identity(other),
        }
    }
}

impl SignupError {
    /// Whether the error is the caller's fault (400) rather than ours (500).
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        match self {
            Self::Repository(_)
            | Self::Identity(IdentityError::PasswordHash | IdentityError::Repository(_))
            | Self::Invite(InviteError::Repository(_)) => false,
            _ => true,
        }
    }
}

/// Signup form input.
#[derive(Debug, Clone)]
pub struct SignupRequest {
    /// Email to sign up with.
    pub email: String,
    /// Chosen password.
    pub password: String,
    /// Display name.
    pub name: String,
    /// Invite token from the signup link, if any.
    pub invite_token: Option<String>,
}

/// Orchestrates identity creation, profile persistence and invite consumption.
pub struct SignupService<'a> {
    invites: InviteService<'a>,
    profiles: &'a dyn ProfileStore,
    identity: &'a dyn IdentityProvider,
    events: &'a AuthEvents,
}

impl<'a> SignupService<'a> {
    /// Create a new signup service.
    #[must_use]
    pub const fn new(
        invites: &'a dyn InviteStore,
        profiles: &'a dyn ProfileStore,
        identity: &'a dyn IdentityProvider,
        events: &'a AuthEvents,
        invite_config: InviteConfig,
    ) -> Self {
        Self {
            invites: InviteService::new(invites, profiles, invite_config),
            profiles,
            identity,
            events,
        }
    }

    /// True iff no privileged profile exists and nobody holds the bootstrap
    /// marker, i.e. the next invite-less signup would become super admin.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the profile store cannot be queried.
    pub async fn is_first_user(&self) -> Result<bool, RepositoryError> {
        if self.profiles.count_privileged().await? > 0 {
            return Ok(false);
        }
        Ok(!self.profiles.bootstrap_claimed().await?)
    }

    /// Create an identity account and admin profile.
    ///
    /// # Errors
    ///
    /// Fails without side effects when the invite is invalid, the bootstrap
    /// window is closed or the email is taken. Later failures are compensated
    /// before the error is returned.
    #[instrument(skip_all, fields(email = %request.email, with_invite = request.invite_token.is_some()))]
    pub async fn sign_up(&self, request: SignupRequest) -> Result<AdminProfile, SignupError> {
        let email = Email::parse(&request.email)?;
        let name = request.name.trim();
        if name.is_empty() {
            return Err(SignupError::NameRequired);
        }

        let token = request
            .invite_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let invite = match token {
            Some(token) => {
                let invite = self.invites.validate_token(token).await?;
                if !invite.admits(&email) {
                    return Err(SignupError::EmailMismatch);
                }
                Some(invite)
            }
            None => {
                if !self.is_first_user().await? {
                    return Err(SignupError::InvitationOnly);
                }
                None
            }
        };

        if self.profiles.get_by_email(&email).await?.is_some() {
            return Err(SignupError::AlreadyRegistered);
        }

        let account = self.identity.create_account(&email, &request.password).await?;

        let profile = match self.persist_profile(&account, name, invite.as_ref()).await {
            Ok(profile) => profile,
            Err(err) => {
                self.compensate(&account, invite.is_none()).await;
                return Err(err);
            }
        };

        if let Some(invite) = &invite
            && let Err(e) = self
                .invites
                .use_invite_token(&invite.token, profile.id)
                .await
        {
            tracing::warn!(
                error = %e,
                profile_id = %profile.id,
                "Profile created but invite could not be consumed"
            );
        }

        tracing::info!(
            profile_id = %profile.id,
            role = %profile.role,
            bootstrap = invite.is_none(),
            "Admin signed up"
        );
        self.events.publish(AuthEvent::SignedUp {
            id: profile.id,
            email: profile.email.clone(),
            role: profile.role,
            bootstrap: invite.is_none(),
        });

        Ok(profile)
    }

    /// Claim the bootstrap marker if needed, then insert the profile.
    async fn persist_profile(
        &self,
        account: &IdentityAccount,
        name: &str,
        invite: Option<&InviteToken>,
    ) -> Result<AdminProfile, SignupError> {
        let new_profile = match invite {
            Some(invite) => NewAdminProfile {
                id: account.id,
                email: account.email.clone(),
                name: name.to_owned(),
                role: invite.role,
                department: invite.department.clone(),
                invited_by: invite.invited_by,
                invite_id: invite.id,
            },
            None => {
                if !self.profiles.claim_bootstrap(account.id).await? {
                    return Err(SignupError::InvitationOnly);
                }
                NewAdminProfile {
                    id: account.id,
                    email: account.email.clone(),
                    name: name.to_owned(),
                    role: Role::SuperAdmin,
                    department: BOOTSTRAP_DEPARTMENT.to_owned(),
                    invited_by: None,
                    invite_id: None,
                }
            }
        };

        self.profiles
            .create(new_profile)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => SignupError::AlreadyRegistered,
                other => SignupError::Repository(other),
            })
    }

    /// Best-effort undo of a signup that failed after the identity existed.
    async fn compensate(&self, account: &IdentityAccount, bootstrap: bool) {
        if bootstrap && let Err(e) = self.profiles.release_bootstrap(account.id).await {
            tracing::error!(
                error = %e,
                account_id = %account.id,
                "Failed to release bootstrap claim after signup failure"
            );
        }

        match self.identity.delete_account(account.id).await {
            Ok(()) => tracing::info!(
                account_id = %account.id,
                "Removed identity account after signup failure"
            ),
            Err(e) => tracing::error!(
                error = %e,
                account_id = %account.id,
                "Orphaned identity account after signup failure"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use skinproof_core::{AdminUserId, Permission};

    use super::*;
    use crate::db::{MemoryStore, ProfileChange};
    use crate::models::CurrentAdmin;
    use crate::services::identity::MemoryIdentityProvider;
    use crate::services::invites::CreateInviteParams;

    struct Harness {
        store: MemoryStore,
        identity: MemoryIdentityProvider,
        events: AuthEvents,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: MemoryStore::new(),
                identity: MemoryIdentityProvider::new(),
                events: AuthEvents::new(),
            }
        }

        fn signup(&self) -> SignupService<'_> {
            SignupService::new(
                &self.store,
                &self.store,
                &self.identity,
                &self.events,
                InviteConfig::default(),
            )
        }

        fn invites(&self) -> InviteService<'_> {
            InviteService::new(&self.store, &self.store, InviteConfig::default())
        }
    }

    fn request(email: &str, invite: Option<&str>) -> SignupRequest {
        SignupRequest {
            email: email.to_owned(),
            password: "correct horse battery".to_owned(),
            name: "Alice Example".to_owned(),
            invite_token: invite.map(str::to_owned),
        }
    }

    fn as_current(profile: &AdminProfile) -> CurrentAdmin {
        CurrentAdmin::from(profile)
    }

    #[tokio::test]
    async fn test_first_signup_bootstraps_super_admin() {
        let h = Harness::new();
        let mut rx = h.events.subscribe();
        assert!(h.signup().is_first_user().await.expect("query"));

        let profile = h
            .signup()
            .sign_up(request("founder@skinproof.app", None))
            .await
            .expect("bootstrap signup");

        assert_eq!(profile.role, Role::SuperAdmin);
        assert_eq!(profile.department, BOOTSTRAP_DEPARTMENT);
        assert_eq!(profile.permissions, Permission::ALL);
        assert!(!h.signup().is_first_user().await.expect("query"));

        assert!(matches!(
            rx.recv().await.expect("event"),
            AuthEvent::SignedUp { bootstrap: true, role: Role::SuperAdmin, .. }
        ));
    }

    #[tokio::test]
    async fn test_second_signup_without_invite_is_refused() {
        let h = Harness::new();
        h.signup()
            .sign_up(request("founder@skinproof.app", None))
            .await
            .expect("bootstrap");

        let err = h
            .signup()
            .sign_up(request("intruder@example.com", None))
            .await
            .expect_err("invitation only");
        assert!(matches!(err, SignupError::InvitationOnly));
        assert_eq!(err.to_string(), "Registration is by invitation only");
        assert_eq!(h.identity.len().await, 1);
    }

    #[tokio::test]
    async fn test_invite_signup_copies_role_and_consumes_invite() {
        let h = Harness::new();
        let founder = h
            .signup()
            .sign_up(request("founder@skinproof.app", None))
            .await
            .expect("bootstrap");
        let invite = h
            .invites()
            .create_invite(
                CreateInviteParams {
                    email: "alice@example.com".to_owned(),
                    role: Role::Support,
                    department: "Customer Care".to_owned(),
                    expires_in_days: None,
                    max_uses: None,
                },
                Some(&as_current(&founder)),
            )
            .await
            .expect("invite");

        let profile = h
            .signup()
            .sign_up(request("Alice@Example.com", Some(&invite.token)))
            .await
            .expect("invite signup");

        assert_eq!(profile.role, Role::Support);
        assert_eq!(profile.department, "Customer Care");
        assert_eq!(profile.invited_by, Some(founder.id));
        assert_eq!(profile.invite_id, invite.id);

        let consumed = h
            .invites()
            .get_invite_by_token(&invite.token)
            .await
            .expect("lookup")
            .expect("exists");
        assert_eq!(consumed.used_by, Some(profile.id));
        assert!(!consumed.is_active);

        // The same link cannot be reused.
        let err = h
            .signup()
            .sign_up(request("alice@example.com", Some(&invite.token)))
            .await
            .expect_err("reuse");
        assert!(matches!(err, SignupError::Invite(InviteError::AlreadyUsed)));
    }

    #[tokio::test]
    async fn test_invalid_invite_has_no_side_effects() {
        let h = Harness::new();
        let err = h
            .signup()
            .sign_up(request("alice@example.com", Some("not-a-token")))
            .await
            .expect_err("invalid token");
        assert!(matches!(err, SignupError::Invite(InviteError::InvalidToken)));
        assert!(h.identity.is_empty().await);
        assert!(!h.store.bootstrap_claimed().await.expect("query"));
    }

    #[tokio::test]
    async fn test_invite_email_must_match() {
        let h = Harness::new();
        let invite = h
            .invites()
            .create_invite(
                CreateInviteParams {
                    email: "alice@example.com".to_owned(),
                    role: Role::Admin,
                    department: "Ops".to_owned(),
                    expires_in_days: None,
                    max_uses: None,
                },
                None,
            )
            .await
            .expect("invite");

        let err = h
            .signup()
            .sign_up(request("mallory@example.com", Some(&invite.token)))
            .await
            .expect_err("mismatch");
        assert!(matches!(err, SignupError::EmailMismatch));
    }

    #[tokio::test]
    async fn test_multi_use_invite_admits_each_signup() {
        let h = Harness::new();
        let invite = h
            .invites()
            .create_invite(
                CreateInviteParams {
                    email: "team@example.com".to_owned(),
                    role: Role::Support,
                    department: "Care".to_owned(),
                    expires_in_days: None,
                    max_uses: Some(2),
                },
                None,
            )
            .await
            .expect("invite");

        let first = h
            .signup()
            .sign_up(request("team@example.com", Some(&invite.token)))
            .await
            .expect("first signup");
        let second = h
            .signup()
            .sign_up(request("mate@example.com", Some(&invite.token)))
            .await
            .expect("second signup");
        assert_eq!(first.invite_id, invite.id);
        assert_eq!(second.invite_id, invite.id);
        assert_eq!(second.role, Role::Support);

        let err = h
            .signup()
            .sign_up(request("third@example.com", Some(&invite.token)))
            .await
            .expect_err("used up");
        assert!(matches!(err, SignupError::Invite(InviteError::AlreadyUsed)));
        let third = Email::parse("third@example.com").expect("valid email");
        assert!(!h.identity.contains(&third).await);
    }

    #[tokio::test]
    async fn test_weak_password_rejected_before_profile() {
        let h = Harness::new();
        let mut req = request("founder@skinproof.app", None);
        req.password = "short".to_owned();

        let err = h.signup().sign_up(req).await.expect_err("weak password");
        assert!(matches!(
            err,
            SignupError::Identity(IdentityError::WeakPassword(_))
        ));
        assert!(err.is_client_error());
        assert!(h.signup().is_first_user().await.expect("query"));
    }

    /// Profile store whose inserts always fail.
    struct BrokenProfiles(MemoryStore);

    #[async_trait]
    impl ProfileStore for BrokenProfiles {
        async fn create(&self, _: NewAdminProfile) -> Result<AdminProfile, RepositoryError> {
            Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
        }
        async fn get_by_id(
            &self,
            id: AdminUserId,
        ) -> Result<Option<AdminProfile>, RepositoryError> {
            ProfileStore::get_by_id(&self.0, id).await
        }
        async fn get_by_email(
            &self,
            email: &Email,
        ) -> Result<Option<AdminProfile>, RepositoryError> {
            self.0.get_by_email(email).await
        }
        async fn list_all(&self) -> Result<Vec<AdminProfile>, RepositoryError> {
            ProfileStore::list_all(&self.0).await
        }
        async fn count_privileged(&self) -> Result<i64, RepositoryError> {
            self.0.count_privileged().await
        }
        async fn apply_as_super_admin(
            &self,
            actor: AdminUserId,
            target: AdminUserId,
            change: ProfileChange,
        ) -> Result<Option<AdminProfile>, RepositoryError> {
            self.0.apply_as_super_admin(actor, target, change).await
        }
        async fn record_login(
            &self,
            id: AdminUserId,
            at: DateTime<Utc>,
        ) -> Result<(), RepositoryError> {
            self.0.record_login(id, at).await
        }
        async fn bootstrap_claimed(&self) -> Result<bool, RepositoryError> {
            self.0.bootstrap_claimed().await
        }
        async fn claim_bootstrap(&self, id: AdminUserId) -> Result<bool, RepositoryError> {
            self.0.claim_bootstrap(id).await
        }
        async fn release_bootstrap(&self, id: AdminUserId) -> Result<(), RepositoryError> {
            self.0.release_bootstrap(id).await
        }
    }

    #[tokio::test]
    async fn test_profile_failure_compensates() {
        let store = MemoryStore::new();
        let profiles = BrokenProfiles(store.clone());
        let identity = MemoryIdentityProvider::new();
        let events = AuthEvents::new();
        let service = SignupService::new(
            &store,
            &profiles,
            &identity,
            &events,
            InviteConfig::default(),
        );

        let err = service
            .sign_up(request("founder@skinproof.app", None))
            .await
            .expect_err("profile insert fails");

        assert!(matches!(err, SignupError::Repository(_)));
        assert!(!err.is_client_error());
        assert!(identity.is_empty().await, "identity account removed");
        assert!(
            !store.bootstrap_claimed().await.expect("query"),
            "bootstrap claim released"
        );
    }
}
