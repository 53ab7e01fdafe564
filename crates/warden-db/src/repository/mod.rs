//! SurrealDB repository implementations.

mod assignment;
mod policy_rule;
mod role;
mod secret_token;
mod tenant;
mod user;

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::repository::Repositories;

pub use assignment::SurrealRoleAssignmentRepository;
pub use policy_rule::SurrealPolicyRuleRepository;
pub use role::SurrealRoleRepository;
pub use secret_token::SurrealSecretTokenRepository;
pub use tenant::SurrealTenantRepository;
pub use user::SurrealUserRepository;

use crate::error::DbError;
use crate::uow::SurrealUnitOfWork;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub(crate) total: u64,
}

pub(crate) fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::decode(what, e))
}

/// Every SurrealDB-backed store over one shared connection.
#[derive(Clone)]
pub struct SurrealRepositories<C: Connection> {
    tenants: SurrealTenantRepository<C>,
    users: SurrealUserRepository<C>,
    roles: SurrealRoleRepository<C>,
    assignments: SurrealRoleAssignmentRepository<C>,
    rules: SurrealPolicyRuleRepository<C>,
    tokens: SurrealSecretTokenRepository<C>,
    uow: SurrealUnitOfWork<C>,
}

impl<C: Connection> SurrealRepositories<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            tenants: SurrealTenantRepository::new(db.clone()),
            users: SurrealUserRepository::new(db.clone()),
            roles: SurrealRoleRepository::new(db.clone()),
            assignments: SurrealRoleAssignmentRepository::new(db.clone()),
            rules: SurrealPolicyRuleRepository::new(db.clone()),
            tokens: SurrealSecretTokenRepository::new(db.clone()),
            uow: SurrealUnitOfWork::new(db),
        }
    }
}

impl<C: Connection> Repositories for SurrealRepositories<C> {
    type Tenants = SurrealTenantRepository<C>;
    type Users = SurrealUserRepository<C>;
    type Roles = SurrealRoleRepository<C>;
    type Assignments = SurrealRoleAssignmentRepository<C>;
    type Rules = SurrealPolicyRuleRepository<C>;
    type Tokens = SurrealSecretTokenRepository<C>;
    type Uow = SurrealUnitOfWork<C>;

    fn tenants(&self) -> &Self::Tenants {
        &self.tenants
    }

    fn users(&self) -> &Self::Users {
        &self.users
    }

    fn roles(&self) -> &Self::Roles {
        &self.roles
    }

    fn assignments(&self) -> &Self::Assignments {
        &self.assignments
    }

    fn rules(&self) -> &Self::Rules {
        &self.rules
    }

    fn tokens(&self) -> &Self::Tokens {
        &self.tokens
    }

    fn uow(&self) -> &Self::Uow {
        &self.uow
    }
}
