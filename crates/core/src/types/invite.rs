//! Invite token model.
//!
//! An invite grants a one-time (or `max_uses`-time) right to create a
//! privileged profile with a preset role and department. All predicates here
//! are pure; persistence belongs to the admin crate's invite store.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{AdminUserId, Email, InviteId, Role};

/// Length of a generated invite token.
pub const INVITE_TOKEN_LENGTH: usize = 32;

/// Uses allowed per invite unless the creator asks for more.
pub const DEFAULT_MAX_USES: i32 = 1;

/// Generate a random invite token.
///
/// 32 characters from `[A-Za-z0-9]`, drawn from the thread-local CSPRNG
/// (ChaCha, seeded from the OS), which gives about 190 bits of entropy.
#[must_use]
pub fn generate_token() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(INVITE_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Errors raised when an invite cannot transition to the requested state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InviteStateError {
    /// The invite already reached `max_uses`.
    #[error("invite has no uses left")]
    UsedUp,
    /// The invite was deactivated.
    #[error("invite is no longer active")]
    Inactive,
    /// The invite's expiry has passed.
    #[error("invite has expired")]
    Expired,
}

/// `expires_in_days` does not give a representable expiry after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invite expiry of {0} days is out of range")]
pub struct ExpiryOutOfRange(pub i64);

/// Derived lifecycle state of an invite at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    /// Can still be consumed.
    Active,
    /// Consumed up to `max_uses`.
    Used,
    /// Never fully consumed and past its expiry.
    Expired,
    /// Deactivated before being used up.
    Inactive,
}

impl std::fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Used => "used",
            Self::Expired => "expired",
            Self::Inactive => "inactive",
        })
    }
}

/// Parameters for building a new invite.
#[derive(Debug, Clone)]
pub struct NewInvite {
    /// Email the invite is addressed to.
    pub email: Email,
    /// Role granted on signup.
    pub role: Role,
    /// Department label copied onto the new profile.
    pub department: String,
    /// Admin who created the invite (`None` for operator CLI invites).
    pub invited_by: Option<AdminUserId>,
    /// Creator's email, kept for display.
    pub invited_by_email: Option<Email>,
    /// Days until the invite expires.
    pub expires_in_days: i64,
    /// How many signups the invite allows (clamped to at least 1).
    pub max_uses: i32,
}

/// An invite token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteToken {
    /// Storage identifier (`None` until persisted).
    pub id: Option<InviteId>,
    /// Opaque random token carried in the signup URL.
    pub token: String,
    /// Email that may sign up with this invite.
    pub email: Email,
    /// Role assigned to the new profile.
    pub role: Role,
    /// Department assigned to the new profile.
    pub department: String,
    /// Creator of the invite.
    pub invited_by: Option<AdminUserId>,
    /// Creator's email at creation time.
    pub invited_by_email: Option<Email>,
    /// When the invite was created.
    pub created_at: DateTime<Utc>,
    /// When the invite stops being usable.
    pub expires_at: DateTime<Utc>,
    /// When the invite was last consumed.
    pub used_at: Option<DateTime<Utc>>,
    /// Profile created by the last consumption.
    pub used_by: Option<AdminUserId>,
    /// Cleared when used up or deactivated.
    pub is_active: bool,
    /// Number of signups allowed.
    pub max_uses: i32,
    /// Number of signups so far.
    pub current_uses: i32,
}

impl InviteToken {
    /// Build a fresh, unsaved invite with a newly generated token.
    ///
    /// # Errors
    ///
    /// Returns [`ExpiryOutOfRange`] unless `expires_in_days` is positive and
    /// `now` plus that many days is a representable time.
    pub fn new(params: NewInvite, now: DateTime<Utc>) -> Result<Self, ExpiryOutOfRange> {
        let expires_at = Some(params.expires_in_days)
            .filter(|days| *days >= 1)
            .and_then(Duration::try_days)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or(ExpiryOutOfRange(params.expires_in_days))?;

        Ok(Self {
            id: None,
            token: generate_token(),
            email: params.email,
            role: params.role,
            department: params.department.trim().to_owned(),
            invited_by: params.invited_by,
            invited_by_email: params.invited_by_email,
            created_at: now,
            expires_at,
            used_at: None,
            used_by: None,
            is_active: true,
            max_uses: params.max_uses.max(1),
            current_uses: 0,
        })
    }

    /// Returns true if the invite reached its expiry at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Returns true if the invite has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Returns true once every allowed use has been consumed.
    #[must_use]
    pub const fn is_used_up(&self) -> bool {
        self.current_uses >= self.max_uses
    }

    /// Whether `email` may redeem this invite.
    ///
    /// Single-use invites are bound to the invited address. Multi-use invites
    /// admit anyone holding the link, each with their own email.
    #[must_use]
    pub fn admits(&self, email: &Email) -> bool {
        self.max_uses > 1 || &self.email == email
    }

    /// Returns true if the invite can be consumed at `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_used_up() && !self.is_expired_at(now)
    }

    /// Returns true if the invite can be consumed right now.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Lifecycle state at `now`.
    ///
    /// Use count wins over expiry, and expiry wins over manual deactivation,
    /// so a used-up invite always reports [`InviteStatus::Used`].
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>) -> InviteStatus {
        if self.is_used_up() {
            InviteStatus::Used
        } else if self.is_expired_at(now) {
            InviteStatus::Expired
        } else if !self.is_active {
            InviteStatus::Inactive
        } else {
            InviteStatus::Active
        }
    }

    /// Explain why the invite cannot be consumed at `now`, if it cannot.
    ///
    /// # Errors
    ///
    /// Returns the [`InviteStateError`] matching [`Self::status_at`].
    pub fn ensure_valid_at(&self, now: DateTime<Utc>) -> Result<(), InviteStateError> {
        match self.status_at(now) {
            InviteStatus::Active => Ok(()),
            InviteStatus::Used => Err(InviteStateError::UsedUp),
            InviteStatus::Expired => Err(InviteStateError::Expired),
            InviteStatus::Inactive => Err(InviteStateError::Inactive),
        }
    }

    /// Record one consumption by `consumer`.
    ///
    /// Deactivates the invite when the last use is consumed. The call is
    /// rejected (and the invite left untouched) when the invite is not valid,
    /// so `current_uses` never exceeds `max_uses`.
    ///
    /// # Errors
    ///
    /// Returns an [`InviteStateError`] if the invite cannot be consumed at `now`.
    pub fn mark_as_used(
        &mut self,
        consumer: AdminUserId,
        now: DateTime<Utc>,
    ) -> Result<(), InviteStateError> {
        self.ensure_valid_at(now)?;

        self.used_at = Some(now);
        self.used_by = Some(consumer);
        self.current_uses += 1;
        if self.is_used_up() {
            self.is_active = false;
        }
        Ok(())
    }

    /// Deactivate the invite without consuming it.
    pub const fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// Signup link for this invite: `{base_url}/signup?invite={token}`.
    ///
    /// # Errors
    ///
    /// Returns [`url::ParseError`] if `base_url` is not an absolute URL.
    pub fn acceptance_url(&self, base_url: &str) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(base_url.trim_end_matches('/'))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?;
            segments.pop_if_empty().push("signup");
        }
        url.query_pairs_mut().append_pair("invite", &self.token);
        Ok(url)
    }
}
