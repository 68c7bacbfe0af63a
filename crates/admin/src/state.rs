//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AdminConfig;
use crate::db::{InviteStore, MemoryStore, PgInviteStore, PgProfileStore, ProfileStore};
use crate::services::{
    AdminUserService, AuthEvents, AuthService, EmailService, IdentityProvider, InviteService,
    MemoryIdentityProvider, PgIdentityProvider, SignupService,
};

/// Application state shared across all handlers.
///
/// Cheap to clone; every handle lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: Option<PgPool>,
    invites: Arc<dyn InviteStore>,
    profiles: Arc<dyn ProfileStore>,
    identity: Arc<dyn IdentityProvider>,
    email: Option<EmailService>,
    events: AuthEvents,
}

impl AppState {
    /// State backed by `PostgreSQL`.
    ///
    /// Email delivery is enabled when SMTP is configured; a relay that fails
    /// to configure is logged and email is disabled.
    #[must_use]
    pub fn new(config: AdminConfig, pool: PgPool) -> Self {
        let email = config.email.as_ref().and_then(|email_config| {
            EmailService::new(email_config, &config.base_url)
                .inspect_err(|e| tracing::error!(error = %e, "Failed to configure SMTP relay"))
                .ok()
        });
        if email.is_none() {
            tracing::warn!("SMTP not configured - invite links will be logged instead of emailed");
        }

        Self::from_parts(
            config,
            Some(pool.clone()),
            Arc::new(PgInviteStore::new(pool.clone())),
            Arc::new(PgProfileStore::new(pool.clone())),
            Arc::new(PgIdentityProvider::new(pool)),
            email,
        )
    }

    /// State backed by in-memory stores, without email.
    #[must_use]
    pub fn in_memory(config: AdminConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::from_parts(
            config,
            None,
            store.clone(),
            store,
            Arc::new(MemoryIdentityProvider::new()),
            None,
        )
    }

    fn from_parts(
        config: AdminConfig,
        pool: Option<PgPool>,
        invites: Arc<dyn InviteStore>,
        profiles: Arc<dyn ProfileStore>,
        identity: Arc<dyn IdentityProvider>,
        email: Option<EmailService>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                invites,
                profiles,
                identity,
                email,
                events: AuthEvents::new(),
            }),
        }
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    /// Database pool, when backed by `PostgreSQL`.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    /// Invite token store.
    #[must_use]
    pub fn invites(&self) -> &dyn InviteStore {
        self.inner.invites.as_ref()
    }

    /// Admin profile store.
    #[must_use]
    pub fn profiles(&self) -> &dyn ProfileStore {
        self.inner.profiles.as_ref()
    }

    /// Identity provider.
    #[must_use]
    pub fn identity(&self) -> &dyn IdentityProvider {
        self.inner.identity.as_ref()
    }

    /// Email service, if SMTP is configured.
    #[must_use]
    pub fn email_service(&self) -> Option<&EmailService> {
        self.inner.email.as_ref()
    }

    /// Auth event hub.
    #[must_use]
    pub fn events(&self) -> &AuthEvents {
        &self.inner.events
    }

    /// Invite service over this state's stores.
    #[must_use]
    pub fn invite_service(&self) -> InviteService<'_> {
        InviteService::new(self.invites(), self.profiles(), self.config().invites)
    }

    /// Signup orchestrator over this state's stores.
    #[must_use]
    pub fn signup_service(&self) -> SignupService<'_> {
        SignupService::new(
            self.invites(),
            self.profiles(),
            self.identity(),
            self.events(),
            self.config().invites,
        )
    }

    /// Sign-in service.
    #[must_use]
    pub fn auth_service(&self) -> AuthService<'_> {
        AuthService::new(self.profiles(), self.identity(), self.events())
    }

    /// Admin profile management service.
    #[must_use]
    pub fn admin_user_service(&self) -> AdminUserService<'_> {
        AdminUserService::new(self.profiles())
    }
}
