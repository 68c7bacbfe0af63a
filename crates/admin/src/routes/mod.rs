//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (database ping)
//!
//! # Signup (public)
//! GET  /signup?invite={token}           - Signup page
//! GET  /api/signup/invite/{token}       - Validate an invite
//! GET  /api/signup/bootstrap            - Whether the next signup bootstraps
//! POST /api/signup                      - Create account and sign in
//!
//! # Auth
//! GET  /auth/login                      - Login page
//! POST /api/auth/login                  - Password sign-in
//! POST /auth/logout                     - Logout
//! GET  /api/me                          - Signed-in admin
//!
//! # Invites (ManageInvites)
//! GET  /api/invites                     - Own invites
//! POST /api/invites                     - Create invite
//! GET  /api/invites/stats               - Own invite counts
//! POST /api/invites/{id}/deactivate     - Creator or super admin
//!
//! # Admin Users (super admin only)
//! GET  /api/admin-users                 - List profiles
//! POST /api/admin-users/{id}/role       - Change role
//! POST /api/admin-users/{id}/deactivate - Block sign-in
//! POST /api/admin-users/{id}/activate   - Restore sign-in
//! ```

pub mod admin_users;
pub mod auth;
pub mod invites;
pub mod signup;

use axum::{Router, extract::State, http::StatusCode, routing::get};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tower_sessions::SessionStore;
use tracing::Span;

use crate::config::ConfigError;
use crate::middleware::create_session_layer;
use crate::state::AppState;

/// All feature routes, without state or layers.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(signup::router())
        .merge(auth::router())
        .merge(invites::router())
        .merge(admin_users::router())
}

/// The full application: health checks, feature routes, sessions and
/// request tracing. Sentry layers are added by the binary.
///
/// # Errors
///
/// Returns `ConfigError::InsecureSecret` if the session secret cannot be
/// used as a cookie signing key.
pub fn app<S>(state: AppState, session_store: S) -> Result<Router, ConfigError>
where
    S: SessionStore + Clone,
{
    let key = state.config().session_key()?;
    let session_layer = create_session_layer(session_store, key, state.config());

    Ok(Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes())
        .layer(session_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    let Some(pool) = state.pool() else {
        return StatusCode::OK;
    };
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
