//! Onboarding guarantees against a real database.
//!
//! Skipped unless `TEST_DATABASE_URL` is set. Every test uses unique emails so
//! runs can share one database.

use skinproof_admin::config::InviteConfig;
use skinproof_admin::db::{PgInviteStore, PgProfileStore, ProfileStore};
use skinproof_admin::models::{AdminProfile, NewAdminProfile};
use skinproof_admin::models::CurrentAdmin;
use skinproof_admin::services::{
    AdminUserError, AdminUserService, AuthEvents, CreateInviteParams, IdentityProvider,
    InviteError, InviteService, PgIdentityProvider, SignupService,
};
use skinproof_core::{Email, Role};
use skinproof_integration_tests::{PASSWORD, request, test_pool, unique_email};
use sqlx::PgPool;

struct Stores {
    invites: PgInviteStore,
    profiles: PgProfileStore,
    identity: PgIdentityProvider,
    events: AuthEvents,
}

impl Stores {
    fn new(pool: &PgPool) -> Self {
        Self {
            invites: PgInviteStore::new(pool.clone()),
            profiles: PgProfileStore::new(pool.clone()),
            identity: PgIdentityProvider::new(pool.clone()),
            events: AuthEvents::new(),
        }
    }

    fn invite_service(&self) -> InviteService<'_> {
        InviteService::new(&self.invites, &self.profiles, InviteConfig::default())
    }

    /// Identity plus profile with `role`, bypassing signup.
    async fn staff(&self, prefix: &str, role: Role) -> AdminProfile {
        let email = Email::parse(&unique_email(prefix)).expect("valid email");
        let account = self
            .identity
            .create_account(&email, PASSWORD)
            .await
            .expect("identity");
        self.profiles
            .create(NewAdminProfile {
                id: account.id,
                email,
                name: prefix.to_owned(),
                role,
                department: "QA".to_owned(),
                invited_by: None,
                invite_id: None,
            })
            .await
            .expect("profile")
    }
}

fn operator_invite(email: &str) -> CreateInviteParams {
    CreateInviteParams {
        email: email.to_owned(),
        role: Role::Admin,
        department: "Content".to_owned(),
        expires_in_days: None,
        max_uses: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pg_concurrent_consume_succeeds_once() {
    let Some(pool) = test_pool().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    let stores = Stores::new(&pool);
    let first = stores.staff("race-a", Role::Support).await;
    let second = stores.staff("race-b", Role::Support).await;

    let invite = stores
        .invite_service()
        .create_invite(operator_invite(&unique_email("raced")), None)
        .await
        .expect("invite");
    assert_eq!(invite.invited_by, None);

    let service = stores.invite_service();
    let (a, b) = tokio::join!(
        service.use_invite_token(&invite.token, first.id),
        service.use_invite_token(&invite.token, second.id),
    );

    assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);
    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(loser, Err(InviteError::AlreadyUsed)));

    let stored = service
        .get_invite_by_token(&invite.token)
        .await
        .expect("lookup")
        .expect("exists");
    assert_eq!(stored.current_uses, 1);
    assert!(!stored.is_active);
    assert!(stored.used_by == Some(first.id) || stored.used_by == Some(second.id));
}

#[tokio::test]
async fn test_pg_one_active_invite_per_email() {
    let Some(pool) = test_pool().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    let stores = Stores::new(&pool);
    let service = stores.invite_service();
    let email = unique_email("dup");

    let first = service
        .create_invite(operator_invite(&email), None)
        .await
        .expect("first");
    assert!(matches!(
        service.create_invite(operator_invite(&email), None).await,
        Err(InviteError::DuplicateActiveInvite)
    ));

    service
        .deactivate_invite(first.id.expect("id"), None)
        .await
        .expect("deactivate");
    service
        .create_invite(operator_invite(&email), None)
        .await
        .expect("after deactivation");
}

#[tokio::test]
async fn test_pg_invite_signup_links_profile_and_invite() {
    let Some(pool) = test_pool().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    let stores = Stores::new(&pool);
    let email = unique_email("invitee");
    let invite = stores
        .invite_service()
        .create_invite(operator_invite(&email), None)
        .await
        .expect("invite");

    let signup = SignupService::new(
        &stores.invites,
        &stores.profiles,
        &stores.identity,
        &stores.events,
        InviteConfig::default(),
    );
    let profile = signup
        .sign_up(request(&email, Some(&invite.token)))
        .await
        .expect("signup");

    assert_eq!(profile.role, Role::Admin);
    assert_eq!(profile.invite_id, invite.id);

    let account = stores
        .identity
        .verify_password(&profile.email, PASSWORD)
        .await
        .expect("password verifies");
    assert_eq!(account.id, profile.id);

    let stored = stores
        .invite_service()
        .get_invite_by_token(&invite.token)
        .await
        .expect("lookup")
        .expect("exists");
    assert_eq!(stored.used_by, Some(profile.id));

    let again = signup.sign_up(request(&email, Some(&invite.token))).await;
    assert!(again.is_err());
    assert!(
        stores
            .profiles
            .get_by_email(&profile.email)
            .await
            .expect("lookup")
            .is_some()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pg_mutual_demotion_keeps_one_super_admin() {
    let Some(pool) = test_pool().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    let stores = Stores::new(&pool);
    let ada = stores.staff("ada", Role::SuperAdmin).await;
    let bob = stores.staff("bob", Role::SuperAdmin).await;
    let (as_ada, as_bob) = (CurrentAdmin::from(&ada), CurrentAdmin::from(&bob));

    let service = AdminUserService::new(&stores.profiles);
    let (a, b) = tokio::join!(
        service.change_role(&as_ada, bob.id, Role::Admin),
        service.change_role(&as_bob, ada.id, Role::Admin),
    );

    assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);
    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(loser, Err(AdminUserError::NotPermitted)));

    let mut roles = Vec::new();
    for id in [ada.id, bob.id] {
        let profile = stores
            .profiles
            .get_by_id(id)
            .await
            .expect("lookup")
            .expect("exists");
        roles.push(profile.role);
    }
    assert_eq!(roles.iter().filter(|r| **r == Role::SuperAdmin).count(), 1);
}
