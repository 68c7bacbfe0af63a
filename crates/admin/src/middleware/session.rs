//! Session middleware configuration for admin.
//!
//! Sessions live in `admin.session` via tower-sessions with strict cookie
//! settings (SameSite=Strict, 24h inactivity expiry). The cookie is signed
//! with the key derived from `ADMIN_SESSION_SECRET`, so a session id that was
//! not issued by this server is discarded before the store is consulted.

use sqlx::PgPool;
use tower_sessions::cookie::Key;
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::AdminConfig;

/// Session cookie name for admin.
pub const SESSION_COOKIE_NAME: &str = "sp_admin_session";

/// Session expiry time in seconds (24 hours of inactivity).
const SESSION_EXPIRY_SECONDS: i64 = 24 * 60 * 60;

/// `PostgreSQL` session store in `admin.session`.
///
/// The table is created by the admin migrations, not by the store.
///
/// # Errors
///
/// Returns the store's message if the schema or table name is rejected.
pub fn postgres_session_store(pool: &PgPool) -> Result<PostgresStore, String> {
    PostgresStore::new(pool.clone())
        .with_schema_name("admin")?
        .with_table_name("session")
}

/// Wrap `store` in a session layer with the admin cookie settings.
///
/// The cookie is marked `Secure` when the panel is served over HTTPS.
#[must_use]
pub fn create_session_layer<S>(
    store: S,
    key: Key,
    config: &AdminConfig,
) -> SessionManagerLayer<S, SignedCookie>
where
    S: SessionStore + Clone,
{
    SessionManagerLayer::new(store)
        .with_signed(key)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Strict)
        .with_http_only(true)
        .with_path("/")
}
