//! In-memory store for tests and local development.
//!
//! Implements [`InviteStore`] and [`ProfileStore`] over one mutex-guarded
//! state, so each operation (including consumption and the bootstrap claim)
//! is a single critical section.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use skinproof_core::{AdminUserId, Email, InviteId, InviteToken, Role};

use super::{InviteStore, ProfileChange, ProfileStore, RepositoryError};
use crate::models::{AdminProfile, NewAdminProfile};

#[derive(Debug, Default)]
struct State {
    invites: Vec<InviteToken>,
    next_invite_id: i32,
    profiles: HashMap<AdminUserId, AdminProfile>,
    bootstrap: Option<(AdminUserId, DateTime<Utc>)>,
}

impl State {
    fn invite_mut(&mut self, id: InviteId) -> Option<&mut InviteToken> {
        self.invites.iter_mut().find(|i| i.id == Some(id))
    }

    fn profile_mut(&mut self, id: AdminUserId) -> Result<&mut AdminProfile, RepositoryError> {
        self.profiles.get_mut(&id).ok_or(RepositoryError::NotFound)
    }
}

fn newest_first(mut invites: Vec<InviteToken>) -> Vec<InviteToken> {
    invites.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.map(|id| id.get()).cmp(&a.id.map(|id| id.get())))
    });
    invites
}

/// In-memory implementation of every admin store.
///
/// Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a stored invite (matched by ID).
    ///
    /// Lets tests move an invite's clock without waiting on real time.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] if the invite was never inserted.
    pub async fn replace_invite(&self, invite: InviteToken) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let id = invite.id.ok_or(RepositoryError::NotFound)?;
        let slot = state.invite_mut(id).ok_or(RepositoryError::NotFound)?;
        *slot = invite;
        Ok(())
    }
}

#[async_trait]
impl InviteStore for MemoryStore {
    async fn insert(&self, mut invite: InviteToken) -> Result<InviteToken, RepositoryError> {
        let mut state = self.state.lock().await;

        if state.invites.iter().any(|i| i.token == invite.token) {
            return Err(RepositoryError::Conflict("invite token already exists".to_owned()));
        }
        if invite.is_active
            && state
                .invites
                .iter()
                .any(|i| i.is_active && i.email == invite.email)
        {
            return Err(RepositoryError::Conflict(
                "an active invite already exists for this email".to_owned(),
            ));
        }

        state.next_invite_id += 1;
        invite.id = Some(InviteId::new(state.next_invite_id));
        state.invites.push(invite.clone());
        Ok(invite)
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<InviteToken>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.invites.iter().find(|i| i.token == token).cloned())
    }

    async fn get_by_id(&self, id: InviteId) -> Result<Option<InviteToken>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.invites.iter().find(|i| i.id == Some(id)).cloned())
    }

    async fn get_active_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<InviteToken>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .invites
            .iter()
            .find(|i| i.is_active && &i.email == email)
            .cloned())
    }

    async fn list_by_creator(
        &self,
        creator: AdminUserId,
    ) -> Result<Vec<InviteToken>, RepositoryError> {
        let state = self.state.lock().await;
        let invites = state
            .invites
            .iter()
            .filter(|i| i.invited_by == Some(creator))
            .cloned()
            .collect();
        Ok(newest_first(invites))
    }

    async fn list_all(&self) -> Result<Vec<InviteToken>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(newest_first(state.invites.clone()))
    }

    async fn deactivate(&self, id: InviteId) -> Result<InviteToken, RepositoryError> {
        let mut state = self.state.lock().await;
        let invite = state.invite_mut(id).ok_or(RepositoryError::NotFound)?;
        invite.deactivate();
        Ok(invite.clone())
    }

    async fn consume(
        &self,
        token: &str,
        consumer: AdminUserId,
        now: DateTime<Utc>,
    ) -> Result<Option<InviteToken>, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(invite) = state.invites.iter_mut().find(|i| i.token == token) else {
            return Ok(None);
        };

        match invite.mark_as_used(consumer, now) {
            Ok(()) => Ok(Some(invite.clone())),
            Err(_) => Ok(None),
        }
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn create(&self, profile: NewAdminProfile) -> Result<AdminProfile, RepositoryError> {
        let mut state = self.state.lock().await;

        if state.profiles.contains_key(&profile.id) {
            return Err(RepositoryError::Conflict("profile ID already exists".to_owned()));
        }
        if state.profiles.values().any(|p| p.email == profile.email) {
            return Err(RepositoryError::Conflict(
                "a profile already exists for this email".to_owned(),
            ));
        }

        let profile = profile.into_profile(Utc::now());
        state.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn get_by_id(&self, id: AdminUserId) -> Result<Option<AdminProfile>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.profiles.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &Email) -> Result<Option<AdminProfile>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.profiles.values().find(|p| &p.email == email).cloned())
    }

    async fn list_all(&self) -> Result<Vec<AdminProfile>, RepositoryError> {
        let state = self.state.lock().await;
        let mut profiles: Vec<_> = state.profiles.values().cloned().collect();
        profiles.sort_by_key(|p| p.created_at);
        Ok(profiles)
    }

    async fn count_privileged(&self) -> Result<i64, RepositoryError> {
        let state = self.state.lock().await;
        let count = state
            .profiles
            .values()
            .filter(|p| p.role.is_privileged())
            .count();
        i64::try_from(count).map_err(|e| RepositoryError::DataCorruption(e.to_string()))
    }

    async fn apply_as_super_admin(
        &self,
        actor: AdminUserId,
        target: AdminUserId,
        change: ProfileChange,
    ) -> Result<Option<AdminProfile>, RepositoryError> {
        let mut state = self.state.lock().await;
        let permitted = state
            .profiles
            .get(&actor)
            .is_some_and(|p| p.is_active && p.role == Role::SuperAdmin);
        if !permitted {
            return Ok(None);
        }

        let profile = state.profile_mut(target)?;
        match change {
            ProfileChange::Role(role) => {
                profile.role = role;
                profile.permissions = role.default_permissions().to_vec();
            }
            ProfileChange::Active(active) => profile.is_active = active,
        }
        profile.updated_at = Utc::now();
        Ok(Some(profile.clone()))
    }

    async fn record_login(
        &self,
        id: AdminUserId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        state.profile_mut(id)?.last_login_at = Some(at);
        Ok(())
    }

    async fn bootstrap_claimed(&self) -> Result<bool, RepositoryError> {
        Ok(self.state.lock().await.bootstrap.is_some())
    }

    async fn claim_bootstrap(&self, id: AdminUserId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.bootstrap.is_some() {
            return Ok(false);
        }
        state.bootstrap = Some((id, Utc::now()));
        Ok(true)
    }

    async fn release_bootstrap(&self, id: AdminUserId) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if state.bootstrap.is_some_and(|(holder, _)| holder == id) {
            state.bootstrap = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use skinproof_core::NewInvite;

    use super::*;

    fn email(s: &str) -> Email {
        Email::parse(s).expect("valid email")
    }

    fn invite(to: &str, max_uses: i32) -> InviteToken {
        InviteToken::new(
            NewInvite {
                email: email(to),
                role: Role::Support,
                department: "Support".to_owned(),
                invited_by: None,
                invited_by_email: None,
                expires_in_days: 7,
                max_uses,
            },
            Utc::now(),
        )
        .expect("valid expiry")
    }

    fn new_profile(to: &str, role: Role) -> NewAdminProfile {
        NewAdminProfile {
            id: AdminUserId::generate(),
            email: email(to),
            name: "Test".to_owned(),
            role,
            department: "Ops".to_owned(),
            invited_by: None,
            invite_id: None,
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let a = store.insert(invite("a@example.com", 1)).await.expect("insert");
        let b = store.insert(invite("b@example.com", 1)).await.expect("insert");
        assert_eq!(a.id, Some(InviteId::new(1)));
        assert_eq!(b.id, Some(InviteId::new(2)));
    }

    #[tokio::test]
    async fn test_insert_rejects_second_active_invite_for_email() {
        let store = MemoryStore::new();
        store.insert(invite("a@example.com", 1)).await.expect("insert");
        let err = store
            .insert(invite("a@example.com", 1))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_consume_stops_at_max_uses() {
        let store = MemoryStore::new();
        let stored = store.insert(invite("a@example.com", 2)).await.expect("insert");
        let now = Utc::now();

        let first = store
            .consume(&stored.token, AdminUserId::generate(), now)
            .await
            .expect("consume")
            .expect("first use");
        assert!(first.is_active);

        let second = store
            .consume(&stored.token, AdminUserId::generate(), now)
            .await
            .expect("consume")
            .expect("second use");
        assert_eq!(second.current_uses, 2);
        assert!(!second.is_active);

        assert!(
            store
                .consume(&stored.token, AdminUserId::generate(), now)
                .await
                .expect("consume")
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_consume_rejects_expired_invite() {
        let store = MemoryStore::new();
        let stored = store.insert(invite("a@example.com", 1)).await.expect("insert");
        let later = Utc::now() + Duration::days(8);

        assert!(
            store
                .consume(&stored.token, AdminUserId::generate(), later)
                .await
                .expect("consume")
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_profile_email_is_unique() {
        let store = MemoryStore::new();
        store
            .create(new_profile("ops@example.com", Role::Admin))
            .await
            .expect("create");
        let err = store
            .create(new_profile("ops@example.com", Role::Support))
            .await
            .expect_err("duplicate email");
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_count_privileged_ignores_plain_users() {
        let store = MemoryStore::new();
        store
            .create(new_profile("user@example.com", Role::User))
            .await
            .expect("create");
        assert_eq!(store.count_privileged().await.expect("count"), 0);

        store
            .create(new_profile("ops@example.com", Role::Support))
            .await
            .expect("create");
        assert_eq!(store.count_privileged().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn test_super_admin_change_resets_permissions() {
        let store = MemoryStore::new();
        let root = store
            .create(new_profile("root@example.com", Role::SuperAdmin))
            .await
            .expect("create");
        let profile = store
            .create(new_profile("ops@example.com", Role::Admin))
            .await
            .expect("create");

        let updated = store
            .apply_as_super_admin(root.id, profile.id, ProfileChange::Role(Role::Support))
            .await
            .expect("update")
            .expect("root may change roles");
        assert_eq!(updated.permissions, Role::Support.default_permissions());
    }

    #[tokio::test]
    async fn test_change_requires_active_super_admin_actor() {
        let store = MemoryStore::new();
        let root = store
            .create(new_profile("root@example.com", Role::SuperAdmin))
            .await
            .expect("create");
        let admin = store
            .create(new_profile("ops@example.com", Role::Admin))
            .await
            .expect("create");

        let refused = store
            .apply_as_super_admin(admin.id, root.id, ProfileChange::Active(false))
            .await
            .expect("query");
        assert!(refused.is_none());

        store
            .apply_as_super_admin(root.id, admin.id, ProfileChange::Role(Role::SuperAdmin))
            .await
            .expect("promote")
            .expect("applied");
        store
            .apply_as_super_admin(admin.id, root.id, ProfileChange::Active(false))
            .await
            .expect("deactivate")
            .expect("applied");

        // A deactivated super admin can no longer act.
        let refused = store
            .apply_as_super_admin(root.id, admin.id, ProfileChange::Role(Role::Support))
            .await
            .expect("query");
        assert!(refused.is_none());
        let still = ProfileStore::get_by_id(&store, admin.id)
            .await
            .expect("lookup")
            .expect("exists");
        assert_eq!(still.role, Role::SuperAdmin);

        assert!(matches!(
            store
                .apply_as_super_admin(admin.id, AdminUserId::generate(), ProfileChange::Active(true))
                .await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_bootstrap_claim_is_exclusive() {
        let store = MemoryStore::new();
        let first = AdminUserId::generate();
        let second = AdminUserId::generate();

        assert!(store.claim_bootstrap(first).await.expect("claim"));
        assert!(!store.claim_bootstrap(second).await.expect("claim"));

        // Only the holder can release.
        store.release_bootstrap(second).await.expect("release");
        assert!(store.bootstrap_claimed().await.expect("claimed"));

        store.release_bootstrap(first).await.expect("release");
        assert!(!store.bootstrap_claimed().await.expect("claimed"));
        assert!(store.claim_bootstrap(second).await.expect("claim"));
    }
}
