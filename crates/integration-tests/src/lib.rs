//! Scenario tests for SkinProof Admin onboarding.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory scenarios only
//! cargo test -p skinproof-integration-tests
//!
//! # Also run the PostgreSQL scenarios (migrations are applied first)
//! TEST_DATABASE_URL=postgres://localhost/skinproof_test cargo test -p skinproof-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `onboarding` - Bootstrap, invite signup and invite lifecycle scenarios
//! - `concurrency` - Racing consumers and racing bootstrap signups
//! - `postgres` - The same guarantees against a real database (opt-in)

#![cfg_attr(not(test), forbid(unsafe_code))]

use sqlx::PgPool;

use skinproof_admin::config::InviteConfig;
use skinproof_admin::db::MemoryStore;
use skinproof_admin::models::{AdminProfile, CurrentAdmin};
use skinproof_admin::services::{
    AuthEvents, CreateInviteParams, InviteService, MemoryIdentityProvider, SignupRequest,
    SignupService,
};
use skinproof_core::{InviteToken, Role};

/// Password used for every test account.
pub const PASSWORD: &str = "correct horse battery staple";

/// In-memory stores and services wired the way the server wires them.
#[derive(Default)]
pub struct Harness {
    pub store: MemoryStore,
    pub identity: MemoryIdentityProvider,
    pub events: AuthEvents,
    pub config: InviteConfig,
}

impl Harness {
    /// Fresh, empty system.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signup orchestrator over the harness stores.
    #[must_use]
    pub fn signup(&self) -> SignupService<'_> {
        SignupService::new(
            &self.store,
            &self.store,
            &self.identity,
            &self.events,
            self.config,
        )
    }

    /// Invite service over the harness stores.
    #[must_use]
    pub fn invites(&self) -> InviteService<'_> {
        InviteService::new(&self.store, &self.store, self.config)
    }

    /// Sign up the bootstrap super admin.
    ///
    /// # Panics
    ///
    /// Panics if the bootstrap signup is refused.
    pub async fn bootstrap(&self, email: &str) -> AdminProfile {
        self.signup()
            .sign_up(request(email, None))
            .await
            .expect("bootstrap signup")
    }

    /// Create an invite on behalf of `creator`.
    ///
    /// # Panics
    ///
    /// Panics if the invite is refused.
    pub async fn invite(&self, creator: &AdminProfile, email: &str, role: Role) -> InviteToken {
        self.invites()
            .create_invite(
                CreateInviteParams {
                    email: email.to_owned(),
                    role,
                    department: "Operations".to_owned(),
                    expires_in_days: None,
                    max_uses: None,
                },
                Some(&CurrentAdmin::from(creator)),
            )
            .await
            .expect("create invite")
    }
}

/// Signup request with the shared test password.
#[must_use]
pub fn request(email: &str, invite: Option<&str>) -> SignupRequest {
    SignupRequest {
        email: email.to_owned(),
        password: PASSWORD.to_owned(),
        name: email.split('@').next().unwrap_or(email).to_owned(),
        invite_token: invite.map(str::to_owned),
    }
}

/// Connect to `TEST_DATABASE_URL` and apply the admin migrations.
///
/// Returns `None` when the variable is unset so database scenarios can skip.
///
/// # Panics
///
/// Panics if the database is configured but unreachable or migrations fail.
pub async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPool::connect(&url).await.expect("connect to test database");
    sqlx::migrate!("../admin/migrations")
        .run(&pool)
        .await
        .expect("apply admin migrations");
    Some(pool)
}

/// Unique email for tests sharing a database.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}+{}@skinproof.test", uuid::Uuid::new_v4().simple())
}
