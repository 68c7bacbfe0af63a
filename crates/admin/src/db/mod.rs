//! Persistence for the admin panel.
//!
//! # Schema: `admin`
//!
//! ## Tables
//!
//! - `admin_user` - Staff profiles (role, department, permissions)
//! - `identity` - Password identities the profiles sign in with
//! - `invite_token` - Invite tokens gating signup
//! - `bootstrap` - Singleton marker claimed by the first super admin
//! - `session` - tower-sessions storage
//!
//! # Stores
//!
//! Services talk to [`InviteStore`] and [`ProfileStore`]. The `PostgreSQL`
//! implementations ([`PgInviteStore`], [`PgProfileStore`]) back the server;
//! [`MemoryStore`] implements both for tests and local development.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/admin/migrations/` and run via:
//! ```bash
//! cargo run -p skinproof-cli -- migrate
//! ```

pub mod admin_invites;
pub mod admin_users;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use skinproof_core::{AdminUserId, Email, InviteId, InviteToken, Role};

use crate::models::{AdminProfile, NewAdminProfile};

pub use admin_invites::PgInviteStore;
pub use admin_users::PgProfileStore;
pub use memory::MemoryStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// A change a super admin makes to another profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileChange {
    /// Assign a role and reset permissions to the role's defaults.
    Role(Role),
    /// Activate or deactivate.
    Active(bool),
}

/// Invite token persistence.
#[async_trait]
pub trait InviteStore: Send + Sync + 'static {
    /// Persist a new invite and return it with its assigned ID.
    ///
    /// Fails with [`RepositoryError::Conflict`] if the token or the active
    /// invite for the email already exists.
    async fn insert(&self, invite: InviteToken) -> Result<InviteToken, RepositoryError>;

    /// Look up an invite by its token string.
    async fn get_by_token(&self, token: &str) -> Result<Option<InviteToken>, RepositoryError>;

    /// Look up an invite by ID.
    async fn get_by_id(&self, id: InviteId) -> Result<Option<InviteToken>, RepositoryError>;

    /// The invite for `email` that is still flagged active, if any.
    ///
    /// The flag alone is checked; the invite may have expired.
    async fn get_active_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<InviteToken>, RepositoryError>;

    /// Invites created by `creator`, newest first.
    async fn list_by_creator(
        &self,
        creator: AdminUserId,
    ) -> Result<Vec<InviteToken>, RepositoryError>;

    /// All invites, newest first.
    async fn list_all(&self) -> Result<Vec<InviteToken>, RepositoryError>;

    /// Clear the active flag. Fails with [`RepositoryError::NotFound`] for an
    /// unknown ID.
    async fn deactivate(&self, id: InviteId) -> Result<InviteToken, RepositoryError>;

    /// Consume one use of `token` if it is valid at `now`.
    ///
    /// The check and the increment are a single atomic step. Returns `None`
    /// when no valid invite matched; callers re-read the token to explain why.
    async fn consume(
        &self,
        token: &str,
        consumer: AdminUserId,
        now: DateTime<Utc>,
    ) -> Result<Option<InviteToken>, RepositoryError>;
}

/// Admin profile persistence, including the first-user bootstrap marker.
#[async_trait]
pub trait ProfileStore: Send + Sync + 'static {
    /// Insert a new profile. Fails with [`RepositoryError::Conflict`] when
    /// the ID or email is taken.
    async fn create(&self, profile: NewAdminProfile) -> Result<AdminProfile, RepositoryError>;

    /// Look up a profile by ID.
    async fn get_by_id(&self, id: AdminUserId) -> Result<Option<AdminProfile>, RepositoryError>;

    /// Look up a profile by email.
    async fn get_by_email(&self, email: &Email) -> Result<Option<AdminProfile>, RepositoryError>;

    /// All profiles, oldest first.
    async fn list_all(&self) -> Result<Vec<AdminProfile>, RepositoryError>;

    /// Number of profiles holding a privileged role.
    async fn count_privileged(&self) -> Result<i64, RepositoryError>;

    /// Apply `change` to `target` on behalf of `actor`.
    ///
    /// Returns `Ok(None)` and changes nothing unless `actor` is an active
    /// super admin at the moment of the write. Changes made this way are
    /// serialized, so super admins demoting each other concurrently always
    /// leave one in place. Fails with [`RepositoryError::NotFound`] for an
    /// unknown target.
    async fn apply_as_super_admin(
        &self,
        actor: AdminUserId,
        target: AdminUserId,
        change: ProfileChange,
    ) -> Result<Option<AdminProfile>, RepositoryError>;

    /// Record a successful sign-in.
    async fn record_login(&self, id: AdminUserId, at: DateTime<Utc>)
    -> Result<(), RepositoryError>;

    /// Whether the bootstrap marker has been claimed.
    async fn bootstrap_claimed(&self) -> Result<bool, RepositoryError>;

    /// Atomically claim the bootstrap marker for `id`.
    ///
    /// Returns `false` if someone else already holds it.
    async fn claim_bootstrap(&self, id: AdminUserId) -> Result<bool, RepositoryError>;

    /// Release the bootstrap marker if `id` holds it.
    async fn release_bootstrap(&self, id: AdminUserId) -> Result<(), RepositoryError>;
}

/// Map a unique-constraint violation to [`RepositoryError::Conflict`].
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(err)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
