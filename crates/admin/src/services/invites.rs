//! Invite service.
//!
//! Creates, validates, consumes and deactivates invite tokens. Consumption is
//! delegated to [`InviteStore::consume`], a single conditional write, so two
//! signups racing on a single-use token cannot both succeed.

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use skinproof_core::{
    AdminUserId, Email, EmailError, InviteId, InviteStateError, InviteStatus, InviteToken,
    NewInvite, Role,
};

use crate::config::InviteConfig;
use crate::db::{InviteStore, ProfileStore, RepositoryError};
use crate::models::CurrentAdmin;

/// Longest expiry an invite may be created with.
pub const MAX_EXPIRY_DAYS: i64 = 365;

/// Errors from invite operations. `Display` is the user-facing message.
#[derive(Debug, Error)]
pub enum InviteError {
    /// Invite email is malformed.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// A valid invite for the email is still outstanding.
    #[error("An active invitation already exists for this email")]
    DuplicateActiveInvite,

    /// A profile already exists for the email.
    #[error("A user with this email already exists")]
    AlreadyRegistered,

    /// Invites must grant a privileged role.
    #[error("Invitations must grant a staff role")]
    InvalidRole,

    /// The creator may not grant this role.
    #[error("You cannot invite users with the {0} role")]
    RoleNotGrantable(Role),

    /// Expiry outside `1..=MAX_EXPIRY_DAYS`.
    #[error("Invitation expiry must be between 1 and {MAX_EXPIRY_DAYS} days")]
    InvalidExpiry,

    /// No invite has this token.
    #[error("Invalid invitation token")]
    InvalidToken,

    /// The invite's expiry has passed.
    #[error("This invitation has expired")]
    Expired,

    /// The invite has no uses left.
    #[error("This invitation has already been used")]
    AlreadyUsed,

    /// The invite was deactivated.
    #[error("This invitation is no longer active")]
    Inactive,

    /// No invite has this ID.
    #[error("Invitation not found")]
    NotFound,

    /// Only the creator or a super admin may deactivate an invite.
    #[error("You can only deactivate invitations you created")]
    NotPermitted,

    /// Storage failure.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<InviteStateError> for InviteError {
    fn from(err: InviteStateError) -> Self {
        match err {
            InviteStateError::UsedUp => Self::AlreadyUsed,
            InviteStateError::Expired => Self::Expired,
            InviteStateError::Inactive => Self::Inactive,
        }
    }
}

/// Input for [`InviteService::create_invite`].
#[derive(Debug, Clone)]
pub struct CreateInviteParams {
    /// Invitee email (normalized by the service).
    pub email: String,
    /// Role granted on signup.
    pub role: Role,
    /// Department copied onto the new profile.
    pub department: String,
    /// Days until expiry; the configured default when `None`.
    pub expires_in_days: Option<i64>,
    /// Allowed signups; the configured default when `None`.
    pub max_uses: Option<i32>,
}

/// Invite counts for a dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InviteStats {
    /// Every invite counted.
    pub total: usize,
    /// Still consumable.
    pub active: usize,
    /// Used up.
    pub used: usize,
    /// Expired before being used up.
    pub expired: usize,
    /// Deactivated before being used up or expiring.
    pub inactive: usize,
}

impl InviteStats {
    /// Tally `invites` by their status right now.
    #[must_use]
    pub fn tally(invites: &[InviteToken]) -> Self {
        let now = Utc::now();
        invites
            .iter()
            .fold(Self::default(), |mut stats, invite| {
                stats.total += 1;
                match invite.status_at(now) {
                    InviteStatus::Active => stats.active += 1,
                    InviteStatus::Used => stats.used += 1,
                    InviteStatus::Expired => stats.expired += 1,
                    InviteStatus::Inactive => stats.inactive += 1,
                }
                stats
            })
    }
}

/// Invite operations over the invite and profile stores.
pub struct InviteService<'a> {
    invites: &'a dyn InviteStore,
    profiles: &'a dyn ProfileStore,
    config: InviteConfig,
}

impl<'a> InviteService<'a> {
    /// Create a new invite service.
    #[must_use]
    pub const fn new(
        invites: &'a dyn InviteStore,
        profiles: &'a dyn ProfileStore,
        config: InviteConfig,
    ) -> Self {
        Self {
            invites,
            profiles,
            config,
        }
    }

    /// Create an invite.
    ///
    /// `creator` is `None` only for operator invites from the CLI. An existing
    /// active invite for the same email blocks creation while it is still
    /// valid; once it has expired it is deactivated and replaced.
    ///
    /// # Errors
    ///
    /// Returns `InviteError::DuplicateActiveInvite`, `AlreadyRegistered`,
    /// `InvalidRole`, `RoleNotGrantable`, `InvalidExpiry` or
    /// `InvalidEmail` when the request is refused.
    #[instrument(skip(self, params, creator), fields(role = %params.role))]
    pub async fn create_invite(
        &self,
        params: CreateInviteParams,
        creator: Option<&CurrentAdmin>,
    ) -> Result<InviteToken, InviteError> {
        let email = Email::parse(&params.email)?;

        if !params.role.is_privileged() {
            return Err(InviteError::InvalidRole);
        }
        if let Some(creator) = creator
            && !creator.role.can_grant(params.role)
        {
            return Err(InviteError::RoleNotGrantable(params.role));
        }

        let expires_in_days = params.expires_in_days.unwrap_or(self.config.expiry_days);
        if !(1..=MAX_EXPIRY_DAYS).contains(&expires_in_days) {
            return Err(InviteError::InvalidExpiry);
        }

        if self.profiles.get_by_email(&email).await?.is_some() {
            return Err(InviteError::AlreadyRegistered);
        }

        let now = Utc::now();
        if let Some(existing) = self.invites.get_active_by_email(&email).await? {
            if existing.is_valid_at(now) {
                return Err(InviteError::DuplicateActiveInvite);
            }
            if let Some(id) = existing.id {
                tracing::info!(invite_id = %id, "Deactivating stale invite before replacement");
                self.invites.deactivate(id).await?;
            }
        }

        let invite = InviteToken::new(
            NewInvite {
                email,
                role: params.role,
                department: params.department,
                invited_by: creator.map(|c| c.id),
                invited_by_email: creator.map(|c| c.email.clone()),
                expires_in_days,
                max_uses: params.max_uses.unwrap_or(self.config.max_uses),
            },
            now,
        )
        .map_err(|_| InviteError::InvalidExpiry)?;

        let invite = self.invites.insert(invite).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => InviteError::DuplicateActiveInvite,
            other => InviteError::Repository(other),
        })?;

        tracing::info!(
            invite_id = ?invite.id.map(|id| id.get()),
            expires_at = %invite.expires_at,
            max_uses = invite.max_uses,
            "Invite created"
        );
        Ok(invite)
    }

    /// Look up an invite by token without validating it.
    ///
    /// # Errors
    ///
    /// Returns `InviteError::Repository` if the lookup fails.
    pub async fn get_invite_by_token(
        &self,
        token: &str,
    ) -> Result<Option<InviteToken>, InviteError> {
        Ok(self.invites.get_by_token(token).await?)
    }

    /// Return the invite for `token` if it can be consumed now.
    ///
    /// # Errors
    ///
    /// Returns `InviteError::InvalidToken` for an unknown token, otherwise
    /// `Expired`, `AlreadyUsed` or `Inactive` describing why it is unusable.
    #[instrument(skip_all)]
    pub async fn validate_token(&self, token: &str) -> Result<InviteToken, InviteError> {
        let invite = self
            .invites
            .get_by_token(token)
            .await?
            .ok_or(InviteError::InvalidToken)?;

        invite.ensure_valid_at(Utc::now())?;
        Ok(invite)
    }

    /// Consume one use of `token` on behalf of `consumer`.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::validate_token`] when the invite
    /// was not consumable at the moment of the write.
    #[instrument(skip(self, token))]
    pub async fn use_invite_token(
        &self,
        token: &str,
        consumer: AdminUserId,
    ) -> Result<InviteToken, InviteError> {
        let now = Utc::now();
        if let Some(invite) = self.invites.consume(token, consumer, now).await? {
            tracing::info!(
                current_uses = invite.current_uses,
                max_uses = invite.max_uses,
                "Invite consumed"
            );
            return Ok(invite);
        }

        let invite = self
            .invites
            .get_by_token(token)
            .await?
            .ok_or(InviteError::InvalidToken)?;
        match invite.ensure_valid_at(now) {
            Err(e) => Err(e.into()),
            // Lost a race with a consumer that used it up.
            Ok(()) => Err(InviteError::AlreadyUsed),
        }
    }

    /// Invites created by `creator`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `InviteError::Repository` if the query fails.
    pub async fn get_invites_by_user(
        &self,
        creator: AdminUserId,
    ) -> Result<Vec<InviteToken>, InviteError> {
        Ok(self.invites.list_by_creator(creator).await?)
    }

    /// Counts of `creator`'s invites by status.
    ///
    /// # Errors
    ///
    /// Returns `InviteError::Repository` if the query fails.
    pub async fn get_invite_stats(&self, creator: AdminUserId) -> Result<InviteStats, InviteError> {
        let invites = self.invites.list_by_creator(creator).await?;
        Ok(InviteStats::tally(&invites))
    }

    /// Every invite, newest first.
    ///
    /// # Errors
    ///
    /// Returns `InviteError::Repository` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<InviteToken>, InviteError> {
        Ok(self.invites.list_all().await?)
    }

    /// Deactivate an invite without checking its state.
    ///
    /// `actor` is `None` for the operator CLI. Otherwise only the invite's
    /// creator or a super admin may deactivate it.
    ///
    /// # Errors
    ///
    /// Returns `InviteError::NotFound` for an unknown ID and
    /// `InviteError::NotPermitted` when `actor` may not deactivate it.
    #[instrument(skip(self, actor))]
    pub async fn deactivate_invite(
        &self,
        id: InviteId,
        actor: Option<&CurrentAdmin>,
    ) -> Result<InviteToken, InviteError> {
        let invite = self
            .invites
            .get_by_id(id)
            .await?
            .ok_or(InviteError::NotFound)?;

        if let Some(actor) = actor
            && actor.role != Role::SuperAdmin
            && invite.invited_by != Some(actor.id)
        {
            return Err(InviteError::NotPermitted);
        }

        let invite = self.invites.deactivate(id).await.map_err(|e| match e {
            RepositoryError::NotFound => InviteError::NotFound,
            other => InviteError::Repository(other),
        })?;
        tracing::info!("Invite deactivated");
        Ok(invite)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::NewAdminProfile;

    fn admin(role: Role) -> CurrentAdmin {
        CurrentAdmin {
            id: AdminUserId::generate(),
            email: Email::parse("boss@skinproof.app").expect("valid email"),
            name: "Boss".to_owned(),
            role,
            department: "Administration".to_owned(),
            permissions: role.default_permissions().to_vec(),
            is_active: true,
        }
    }

    fn params(email: &str, role: Role) -> CreateInviteParams {
        CreateInviteParams {
            email: email.to_owned(),
            role,
            department: "Support".to_owned(),
            expires_in_days: None,
            max_uses: None,
        }
    }

    fn service(store: &MemoryStore) -> InviteService<'_> {
        InviteService::new(store, store, InviteConfig::default())
    }

    #[tokio::test]
    async fn test_create_invite_normalizes_and_records_creator() {
        let store = MemoryStore::new();
        let boss = admin(Role::SuperAdmin);

        let invite = service(&store)
            .create_invite(params("  Alice@Example.COM ", Role::Admin), Some(&boss))
            .await
            .expect("create");

        assert_eq!(invite.email.as_str(), "alice@example.com");
        assert_eq!(invite.invited_by, Some(boss.id));
        assert_eq!(invite.invited_by_email, Some(boss.email.clone()));
        assert_eq!(invite.max_uses, 1);
        assert_eq!(invite.current_uses, 0);
        assert!(invite.is_valid());
    }

    #[tokio::test]
    async fn test_duplicate_invite_blocked_until_deactivated() {
        let store = MemoryStore::new();
        let boss = admin(Role::SuperAdmin);
        let svc = service(&store);

        let first = svc
            .create_invite(params("alice@example.com", Role::Support), Some(&boss))
            .await
            .expect("first");
        assert!(matches!(
            svc.create_invite(params("alice@example.com", Role::Support), Some(&boss))
                .await,
            Err(InviteError::DuplicateActiveInvite)
        ));

        svc.deactivate_invite(first.id.expect("stored"), Some(&boss))
            .await
            .expect("deactivate");
        svc.create_invite(params("alice@example.com", Role::Support), Some(&boss))
            .await
            .expect("second after deactivation");
    }

    #[tokio::test]
    async fn test_expired_invite_is_replaced() {
        let store = MemoryStore::new();
        let boss = admin(Role::SuperAdmin);
        let svc = service(&store);

        let mut first = svc
            .create_invite(params("alice@example.com", Role::Support), Some(&boss))
            .await
            .expect("first");
        first.expires_at = Utc::now() - Duration::seconds(1);
        store.replace_invite(first.clone()).await.expect("replace");

        let second = svc
            .create_invite(params("alice@example.com", Role::Support), Some(&boss))
            .await
            .expect("replacement");
        assert_ne!(second.token, first.token);

        let old = svc
            .get_invite_by_token(&first.token)
            .await
            .expect("lookup")
            .expect("exists");
        assert!(!old.is_active);
    }

    #[tokio::test]
    async fn test_creator_cannot_grant_higher_role() {
        let store = MemoryStore::new();
        let svc = service(&store);

        assert!(matches!(
            svc.create_invite(params("x@example.com", Role::SuperAdmin), Some(&admin(Role::Admin)))
                .await,
            Err(InviteError::RoleNotGrantable(Role::SuperAdmin))
        ));
        assert!(matches!(
            svc.create_invite(params("x@example.com", Role::User), None).await,
            Err(InviteError::InvalidRole)
        ));
        svc.create_invite(params("x@example.com", Role::Admin), Some(&admin(Role::Admin)))
            .await
            .expect("same rank is allowed");
    }

    #[tokio::test]
    async fn test_invite_for_registered_email_is_rejected() {
        let store = MemoryStore::new();
        store
            .create(NewAdminProfile {
                id: AdminUserId::generate(),
                email: Email::parse("ops@example.com").expect("valid email"),
                name: "Ops".to_owned(),
                role: Role::Support,
                department: "Support".to_owned(),
                invited_by: None,
                invite_id: None,
            })
            .await
            .expect("profile");

        assert!(matches!(
            service(&store)
                .create_invite(params("ops@example.com", Role::Support), None)
                .await,
            Err(InviteError::AlreadyRegistered)
        ));
    }

    #[tokio::test]
    async fn test_validate_token_distinguishes_failures() {
        let store = MemoryStore::new();
        let svc = service(&store);

        assert!(matches!(
            svc.validate_token("missing").await,
            Err(InviteError::InvalidToken)
        ));

        let mut expired = svc
            .create_invite(params("late@example.com", Role::Support), None)
            .await
            .expect("create");
        expired.expires_at = Utc::now() - Duration::days(1);
        store.replace_invite(expired.clone()).await.expect("replace");
        assert!(matches!(
            svc.validate_token(&expired.token).await,
            Err(InviteError::Expired)
        ));

        let used = svc
            .create_invite(params("used@example.com", Role::Support), None)
            .await
            .expect("create");
        svc.use_invite_token(&used.token, AdminUserId::generate())
            .await
            .expect("consume");
        assert!(matches!(
            svc.validate_token(&used.token).await,
            Err(InviteError::AlreadyUsed)
        ));

        let valid = svc
            .create_invite(params("ok@example.com", Role::Support), None)
            .await
            .expect("create");
        assert_eq!(
            svc.validate_token(&valid.token).await.expect("valid").id,
            valid.id
        );
    }

    #[tokio::test]
    async fn test_single_use_token_consumed_once() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let invite = svc
            .create_invite(params("alice@example.com", Role::Admin), None)
            .await
            .expect("create");
        let consumer = AdminUserId::generate();

        let used = svc
            .use_invite_token(&invite.token, consumer)
            .await
            .expect("first use");
        assert!(!used.is_active);
        assert_eq!(used.used_by, Some(consumer));
        assert!(used.used_at.is_some());

        assert!(matches!(
            svc.use_invite_token(&invite.token, AdminUserId::generate())
                .await,
            Err(InviteError::AlreadyUsed)
        ));
    }

    #[tokio::test]
    async fn test_stats_count_by_status() {
        let store = MemoryStore::new();
        let boss = admin(Role::SuperAdmin);
        let svc = service(&store);

        for to in ["a@example.com", "b@example.com", "c@example.com"] {
            svc.create_invite(params(to, Role::Support), Some(&boss))
                .await
                .expect("create");
        }
        let invites = svc.get_invites_by_user(boss.id).await.expect("list");
        svc.use_invite_token(&invites[0].token, AdminUserId::generate())
            .await
            .expect("use");
        svc.deactivate_invite(invites[1].id.expect("stored"), Some(&boss))
            .await
            .expect("deactivate");

        let stats = svc.get_invite_stats(boss.id).await.expect("stats");
        assert_eq!(
            stats,
            InviteStats {
                total: 3,
                active: 1,
                used: 1,
                expired: 0,
                inactive: 1,
            }
        );
        assert_eq!(svc.get_invite_stats(AdminUserId::generate()).await.expect("stats").total, 0);
    }

    #[tokio::test]
    async fn test_only_creator_or_super_admin_deactivates() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let creator = admin(Role::Admin);
        let invite = svc
            .create_invite(params("a@example.com", Role::Support), Some(&creator))
            .await
            .expect("create");
        let id = invite.id.expect("stored");

        assert!(matches!(
            svc.deactivate_invite(id, Some(&admin(Role::Admin))).await,
            Err(InviteError::NotPermitted)
        ));
        svc.deactivate_invite(id, Some(&admin(Role::SuperAdmin)))
            .await
            .expect("super admin may deactivate");
        assert!(matches!(
            svc.deactivate_invite(InviteId::new(999), Some(&creator)).await,
            Err(InviteError::NotFound)
        ));
    }
}
