//! Core types for SkinProof.
//!
//! This module provides type-safe wrappers for the onboarding domain.

pub mod access;
pub mod email;
pub mod id;
pub mod invite;
pub mod role;

pub use access::{AccessDecision, AccessRule, Subject};
pub use email::{Email, EmailError};
pub use id::*;
pub use invite::{
    DEFAULT_MAX_USES, ExpiryOutOfRange, INVITE_TOKEN_LENGTH, InviteStateError, InviteStatus,
    InviteToken, NewInvite, generate_token,
};
pub use role::{Permission, Role, RoleParseError};
