//! HTTP middleware for admin.
//!
//! - `auth` - extractors that reload the signed-in profile and apply role gates
//! - `session` - tower-sessions layer (`PostgreSQL` store in production)

pub mod auth;
pub mod session;

pub use auth::{
    AdminAuthRejection, RequireAdminAuth, RequireSuperAdmin, clear_current_admin,
    require_access, set_current_admin,
};
pub use session::{SESSION_COOKIE_NAME, create_session_layer, postgres_session_store};
