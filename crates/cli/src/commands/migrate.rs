//! Database migration commands.
//!
//! # Environment Variables
//!
//! - `ADMIN_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! Admin migrations live in `crates/admin/migrations/`:
//! ```text
//! migrations/
//! ├── 20260101000001_admin_schema.sql
//! ├── 20260101000002_admin_user.sql
//! └── ...
//! ```

use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;

use skinproof_admin::config::{ConfigError, get_database_url};

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Database URL is not configured.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed to apply.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run admin database migrations.
///
/// # Errors
///
/// Returns error if the database is unreachable or a migration fails.
pub async fn admin() -> Result<(), MigrationError> {
    let database_url = get_database_url("ADMIN_DATABASE_URL")?;

    tracing::info!("Connecting to admin database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    tracing::info!("Running admin migrations...");
    sqlx::migrate!("../admin/migrations").run(&pool).await?;

    tracing::info!("Admin migrations complete!");
    Ok(())
}
