//! Warden Core: domain models, error taxonomy, repository traits and the
//! unit-of-work scope shared by every other crate.

pub mod clock;
pub mod error;
pub mod models;
pub mod notifier;
pub mod repository;
pub mod uow;
