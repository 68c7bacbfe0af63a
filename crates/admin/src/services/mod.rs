//! Business logic services for admin.
//!
//! # Services
//!
//! - `admin_users` - Role changes and deactivation (super admin only)
//! - `auth` - Password sign-in gated on the admin profile
//! - `email` - Invite and welcome emails via SMTP
//! - `events` - Broadcast hub for sign-up/in/out events
//! - `identity` - Identity accounts and password hashing
//! - `invites` - Invite token lifecycle
//! - `signup` - Invite or bootstrap signup orchestration

pub mod admin_users;
pub mod auth;
pub mod email;
pub mod events;
pub mod identity;
pub mod invites;
pub mod signup;

pub use admin_users::{AdminUserError, AdminUserService};
pub use auth::{AuthError, AuthService};
pub use email::{EmailDeliveryError, EmailService};
pub use events::{AuthEvent, AuthEvents};
pub use identity::{
    IdentityAccount, IdentityError, IdentityProvider, MemoryIdentityProvider, PgIdentityProvider,
};
pub use invites::{CreateInviteParams, InviteError, InviteService, InviteStats};
pub use signup::{SignupError, SignupRequest, SignupService};
