//! Warden Database: SurrealDB connection management, schema migrations,
//! repository implementations and the transactional unit of work.
//!
//! [`SurrealRepositories`] bundles every store behind the
//! [`Repositories`](warden_core::repository::Repositories) trait the
//! services are generic over.

mod connection;
mod error;
pub mod repository;
mod schema;
mod uow;

pub use connection::{DbConfig, DbManager, RootCredentials};
pub use error::DbError;
pub use repository::SurrealRepositories;
pub use schema::run_migrations;
pub use uow::SurrealUnitOfWork;
