//! Domain models for Warden.
//!
//! These are the core types shared across all crates.

pub mod assignment;
pub mod policy;
pub mod role;
pub mod secret_token;
pub mod tenant;
pub mod user;
