//! In-process auth event hub.
//!
//! Signup, sign-in and sign-out publish an [`AuthEvent`]; listeners hold a
//! receiver from [`AuthEvents::subscribe`] and unsubscribe by dropping it.

use serde::Serialize;
use tokio::sync::broadcast;

use skinproof_core::{AdminUserId, Email, Role};

/// Buffered events per receiver before slow listeners start lagging.
const CHANNEL_CAPACITY: usize = 64;

/// A change in who is signed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuthEvent {
    /// A new profile was created and signed in.
    SignedUp {
        /// New profile.
        id: AdminUserId,
        /// Profile email.
        email: Email,
        /// Role granted at signup.
        role: Role,
        /// Whether the profile was created by the first-user bootstrap.
        bootstrap: bool,
    },
    /// An existing profile signed in.
    SignedIn {
        /// Profile that signed in.
        id: AdminUserId,
        /// Profile email.
        email: Email,
    },
    /// A session was ended.
    SignedOut {
        /// Profile that signed out.
        id: AdminUserId,
    },
}

/// Broadcast hub for [`AuthEvent`]s. Clones share the channel.
#[derive(Debug, Clone)]
pub struct AuthEvents {
    sender: broadcast::Sender<AuthEvent>,
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthEvents {
    /// Create a hub with no listeners.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Start listening. Drop the receiver to stop.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.sender.subscribe()
    }

    /// Deliver `event` to every current listener.
    ///
    /// Returns how many listeners received it; zero listeners is not an error.
    pub fn publish(&self, event: AuthEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Number of live listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
