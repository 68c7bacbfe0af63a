//! SkinProof Admin library.
//!
//! Staff-facing admin panel for the SkinProof app: invite-gated onboarding,
//! first-user bootstrap and role-gated routes. Exposed as a library so the
//! CLI and integration tests drive the same services as the server.
//!
//! # Security
//!
//! Admin accounts are created only through an invite or, while no staff
//! profile exists, through the one-time bootstrap. Every guarded request
//! reloads the profile, so deactivation is immediate.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
