//! Admin authentication service.
//!
//! Password sign-in against the identity provider, gated on the admin
//! profile: deactivated or non-staff profiles cannot sign in.

mod error;

pub use error::AuthError;

use chrono::Utc;
use tracing::instrument;

use skinproof_core::{AdminUserId, Email};

use super::events::{AuthEvent, AuthEvents};
use super::identity::IdentityProvider;
use crate::db::ProfileStore;
use crate::models::AdminProfile;

/// Admin authentication service.
pub struct AuthService<'a> {
    profiles: &'a dyn ProfileStore,
    identity: &'a dyn IdentityProvider,
    events: &'a AuthEvents,
}

impl<'a> AuthService<'a> {
    /// Create a new admin authentication service.
    #[must_use]
    pub const fn new(
        profiles: &'a dyn ProfileStore,
        identity: &'a dyn IdentityProvider,
        events: &'a AuthEvents,
    ) -> Self {
        Self {
            profiles,
            identity,
            events,
        }
    }

    /// Verify credentials and load the profile to sign in as.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown email or wrong
    /// password, `AuthError::AccountDeactivated` for a deactivated profile
    /// and `AuthError::NotAuthorized` when the account has no staff role.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AdminProfile, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;
        let account = self.identity.verify_password(&email, password).await?;

        let mut profile = self
            .profiles
            .get_by_id(account.id)
            .await?
            .ok_or(AuthError::NotAuthorized)?;

        if !profile.is_active {
            tracing::warn!(profile_id = %profile.id, "Deactivated admin attempted to sign in");
            return Err(AuthError::AccountDeactivated);
        }
        if !profile.role.is_privileged() {
            return Err(AuthError::NotAuthorized);
        }

        let now = Utc::now();
        self.profiles.record_login(profile.id, now).await?;
        profile.last_login_at = Some(now);

        tracing::info!(profile_id = %profile.id, role = %profile.role, "Admin signed in");
        self.events.publish(AuthEvent::SignedIn {
            id: profile.id,
            email: profile.email.clone(),
        });
        Ok(profile)
    }

    /// Announce that `id` signed out. The caller clears the session.
    pub fn logout(&self, id: AdminUserId) {
        tracing::info!(profile_id = %id, "Admin signed out");
        self.events.publish(AuthEvent::SignedOut { id });
    }
}
