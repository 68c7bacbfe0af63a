//! SkinProof Core - Shared types library.
//!
//! This crate provides the domain types used across the SkinProof admin components:
//! - `admin` - Staff administration panel (invites, signup, role-gated routes)
//! - `cli` - Command-line tools for migrations and operator tasks
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database access,
//! no HTTP clients. Invite validity rules and role gates live here so they can be
//! evaluated anywhere without a store.
//!
//! # Modules
//!
//! - [`types`] - Emails, type-safe IDs, roles and permissions, invite tokens, access rules

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
