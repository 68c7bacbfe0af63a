//! Admin invite commands.
//!
//! Invites created here have no inviting admin, so they can bring in the
//! first staff members of any role, `super_admin` included.
//!
//! # Usage
//!
//! ```bash
//! sp-cli admin invite -e ops@skinproof.app -r admin -d Operations --days 14
//! sp-cli admin invites
//! sp-cli admin revoke --id 12
//! sp-cli admin bootstrap-status
//! ```
//!
//! # Environment Variables
//!
//! - `ADMIN_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `ADMIN_BASE_URL` - Base URL for signup links
//! - `INVITE_EXPIRY_DAYS`, `INVITE_MAX_USES` - Invite defaults

use chrono::Utc;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;

use skinproof_admin::config::{ConfigError, InviteConfig, get_database_url};
use skinproof_admin::db::{PgInviteStore, PgProfileStore, ProfileStore, RepositoryError};
use skinproof_admin::services::{CreateInviteParams, InviteError, InviteService};
use skinproof_core::{InviteId, InviteToken, Role};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Query failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Invite rejected by the invite service.
    #[error(transparent)]
    Invite(#[from] InviteError),

    /// `ADMIN_BASE_URL` cannot be joined with a signup path.
    #[error("Invalid ADMIN_BASE_URL: {0}")]
    BaseUrl(String),
}

/// Connected stores for one command.
struct Stores {
    invites: PgInviteStore,
    profiles: PgProfileStore,
}

impl Stores {
    async fn connect() -> Result<Self, AdminError> {
        let database_url = get_database_url("ADMIN_DATABASE_URL")?;

        tracing::info!("Connecting to admin database...");
        let pool = PgPool::connect(database_url.expose_secret()).await?;
        Ok(Self {
            invites: PgInviteStore::new(pool.clone()),
            profiles: PgProfileStore::new(pool),
        })
    }

    fn invite_service(&self, config: InviteConfig) -> InviteService<'_> {
        InviteService::new(&self.invites, &self.profiles, config)
    }
}

fn base_url() -> String {
    std::env::var("ADMIN_BASE_URL").unwrap_or_else(|_| {
        tracing::warn!("ADMIN_BASE_URL not set, using default");
        "http://localhost:3001".to_owned()
    })
}

/// Create an invite and log its signup link.
///
/// # Errors
///
/// Returns error if the invite is rejected or the database is unreachable.
pub async fn create_invite(
    email: String,
    role: Role,
    department: String,
    expires_in_days: Option<i64>,
    max_uses: Option<i32>,
) -> Result<InviteId, AdminError> {
    let config = InviteConfig::from_env()?;
    let stores = Stores::connect().await?;

    tracing::info!("Creating invite for: {} ({})", email, role);
    let invite = stores
        .invite_service(config)
        .create_invite(
            CreateInviteParams {
                email,
                role,
                department,
                expires_in_days,
                max_uses,
            },
            None,
        )
        .await?;

    let signup_url = invite
        .acceptance_url(&base_url())
        .map_err(|e| AdminError::BaseUrl(e.to_string()))?;

    tracing::info!("Invite created successfully!");
    tracing::info!("  Email: {}", invite.email);
    tracing::info!("  Role: {}", invite.role);
    tracing::info!("  Department: {}", invite.department);
    tracing::info!("  Expires: {}", invite.expires_at.format("%Y-%m-%d %H:%M UTC"));
    tracing::info!("  Uses allowed: {}", invite.max_uses);
    tracing::info!("");
    tracing::info!("Share this signup link with the user:");
    tracing::info!("  {}", signup_url);

    invite
        .id
        .ok_or_else(|| AdminError::Repository(RepositoryError::NotFound))
}

fn describe(invite: &InviteToken) -> String {
    format!(
        "#{id} {email} role={role} dept={dept} status={status} uses={used}/{max} expires={expires}",
        id = invite.id.map_or_else(|| "?".to_owned(), |id| id.to_string()),
        email = invite.email,
        role = invite.role,
        dept = invite.department,
        status = invite.status_at(Utc::now()),
        used = invite.current_uses,
        max = invite.max_uses,
        expires = invite.expires_at.format("%Y-%m-%d"),
    )
}

/// Log every invite, newest first.
///
/// # Errors
///
/// Returns error if the database is unreachable.
pub async fn list_invites() -> Result<(), AdminError> {
    let stores = Stores::connect().await?;
    let invites = stores
        .invite_service(InviteConfig::default())
        .list_all()
        .await?;

    if invites.is_empty() {
        tracing::info!("No invites found");
    }
    for invite in &invites {
        tracing::info!("{}", describe(invite));
    }
    Ok(())
}

/// Deactivate an invite by ID.
///
/// # Errors
///
/// Returns `InviteError::NotFound` for an unknown ID.
pub async fn revoke_invite(id: i32) -> Result<(), AdminError> {
    let stores = Stores::connect().await?;

    // Operator actions act with super admin authority.
    let invite = stores
        .invite_service(InviteConfig::default())
        .deactivate_invite(InviteId::new(id), None)
        .await?;

    tracing::info!("Invite revoked: {}", describe(&invite));
    Ok(())
}

/// Log whether the next invite-less signup would become super admin.
///
/// # Errors
///
/// Returns error if the database is unreachable.
pub async fn bootstrap_status() -> Result<(), AdminError> {
    let stores = Stores::connect().await?;
    let privileged = stores.profiles.count_privileged().await?;
    let claimed = stores.profiles.bootstrap_claimed().await?;

    tracing::info!("Staff profiles: {}", privileged);
    tracing::info!("Bootstrap marker claimed: {}", claimed);
    if privileged == 0 && !claimed {
        tracing::info!("The next signup without an invite becomes super admin.");
    } else {
        tracing::info!("Signup is invitation only.");
    }
    Ok(())
}
