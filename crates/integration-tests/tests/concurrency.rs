//! Racing signups and invite consumption.

use skinproof_admin::db::ProfileStore;
use skinproof_admin::services::{InviteError, SignupError};
use skinproof_core::{AdminUserId, Role};
use skinproof_integration_tests::{Harness, request};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_use_invite_consumed_exactly_once() {
    let h = Harness::new();
    let founder = h.bootstrap("founder@skinproof.app").await;
    let invite = h.invite(&founder, "racer@skinproof.app", Role::Support).await;

    let invites = h.invites();
    let (a, b) = tokio::join!(
        invites.use_invite_token(&invite.token, AdminUserId::generate()),
        invites.use_invite_token(&invite.token, AdminUserId::generate()),
    );

    let successes = [a.is_ok(), b.is_ok()].into_iter().filter(|ok| *ok).count();
    assert_eq!(successes, 1);
    let failure = if a.is_ok() { b } else { a };
    assert!(matches!(failure, Err(InviteError::AlreadyUsed)));

    let stored = invites
        .get_invite_by_token(&invite.token)
        .await
        .expect("lookup")
        .expect("exists");
    assert_eq!(stored.current_uses, 1);
    assert!(!stored.is_active);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bootstrap_creates_one_super_admin() {
    let h = Harness::new();
    let signup = h.signup();

    let (a, b) = tokio::join!(
        signup.sign_up(request("first@skinproof.app", None)),
        signup.sign_up(request("second@skinproof.app", None)),
    );

    let winners: Vec<_> = [&a, &b].into_iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].role, Role::SuperAdmin);

    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(loser, Err(SignupError::InvitationOnly)));

    // The loser's identity account was removed.
    assert_eq!(h.identity.len().await, 1);
    assert_eq!(h.store.count_privileged().await.expect("count"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_email_signups_create_one_profile() {
    let h = Harness::new();
    let founder = h.bootstrap("founder@skinproof.app").await;
    let invite = h.invite(&founder, "twin@skinproof.app", Role::Admin).await;
    let signup = h.signup();

    let (a, b) = tokio::join!(
        signup.sign_up(request("twin@skinproof.app", Some(&invite.token))),
        signup.sign_up(request("twin@skinproof.app", Some(&invite.token))),
    );

    assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);
    let loser = if a.is_ok() { b } else { a };
    // Depending on interleaving the loser sees the profile or the used invite.
    assert!(matches!(
        loser,
        Err(SignupError::AlreadyRegistered | SignupError::Invite(InviteError::AlreadyUsed))
    ));
    assert_eq!(
        ProfileStore::list_all(&h.store).await.expect("profiles").len(),
        2
    );
}
