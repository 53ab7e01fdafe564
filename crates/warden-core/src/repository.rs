//! Repository trait definitions for data access abstraction.
//!
//! Repositories cover reads and single-row updates. Anything that creates
//! entities, or touches more than one row, goes through the
//! [`UnitOfWork`](crate::uow::UnitOfWork) instead.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::WardenResult;
use crate::models::{
    assignment::TenantMember,
    policy::PolicyRule,
    role::Role,
    secret_token::{SecretToken, TokenPurpose},
    tenant::{Tenant, TenantSummary},
    user::{Profile, UpdateUser, User},
};
use crate::uow::UnitOfWork;

pub trait TenantRepository: Send + Sync {
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardenResult<Tenant>> + Send;
    /// Includes inactive and soft-deleted tenants; callers decide usability.
    fn find_by_slug(&self, slug: &str)
    -> impl Future<Output = WardenResult<Option<Tenant>>> + Send;
    fn set_active(&self, id: Uuid, active: bool)
    -> impl Future<Output = WardenResult<Tenant>> + Send;
    /// Marks the tenant deleted and inactive. There is no hard delete.
    fn soft_delete(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = WardenResult<Tenant>> + Send;
    /// Non-deleted tenants with their distinct member counts.
    fn summaries(&self) -> impl Future<Output = WardenResult<Vec<TenantSummary>>> + Send;
}

pub trait UserRepository: Send + Sync {
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardenResult<User>> + Send;
    /// `email` must already be normalized.
    fn find_by_email(&self, email: &str)
    -> impl Future<Output = WardenResult<Option<User>>> + Send;
    fn get_profile(&self, user_id: Uuid) -> impl Future<Output = WardenResult<Profile>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = WardenResult<User>> + Send;
    fn count(&self) -> impl Future<Output = WardenResult<u64>> + Send;
}

pub trait RoleRepository: Send + Sync {
    /// `name` must already be normalized to uppercase.
    fn find_by_name(&self, name: &str)
    -> impl Future<Output = WardenResult<Option<Role>>> + Send;
    fn list(&self) -> impl Future<Output = WardenResult<Vec<Role>>> + Send;
}

pub trait RoleAssignmentRepository: Send + Sync {
    /// Names of the roles `user_id` holds in `tenant_id`.
    fn role_names(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> impl Future<Output = WardenResult<Vec<String>>> + Send;
    fn members(
        &self,
        tenant_id: Uuid,
    ) -> impl Future<Output = WardenResult<Vec<TenantMember>>> + Send;
}

pub trait PolicyRuleRepository: Send + Sync {
    fn list(&self, tenant_id: Uuid) -> impl Future<Output = WardenResult<Vec<PolicyRule>>> + Send;
    fn active(&self, tenant_id: Uuid)
    -> impl Future<Output = WardenResult<Vec<PolicyRule>>> + Send;
}

pub trait SecretTokenRepository: Send + Sync {
    fn find(
        &self,
        purpose: TokenPurpose,
        id: Uuid,
    ) -> impl Future<Output = WardenResult<Option<SecretToken>>> + Send;
    /// Unused tokens for `user_id` created at or after `since` that have
    /// not expired by `now`.
    fn count_open_since(
        &self,
        purpose: TokenPurpose,
        user_id: Uuid,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> impl Future<Output = WardenResult<u64>> + Send;
}

/// Every store a service needs, bundled behind one type parameter.
pub trait Repositories: Send + Sync + 'static {
    type Tenants: TenantRepository;
    type Users: UserRepository;
    type Roles: RoleRepository;
    type Assignments: RoleAssignmentRepository;
    type Rules: PolicyRuleRepository;
    type Tokens: SecretTokenRepository;
    type Uow: UnitOfWork;

    fn tenants(&self) -> &Self::Tenants;
    fn users(&self) -> &Self::Users;
    fn roles(&self) -> &Self::Roles;
    fn assignments(&self) -> &Self::Assignments;
    fn rules(&self) -> &Self::Rules;
    fn tokens(&self) -> &Self::Tokens;
    fn uow(&self) -> &Self::Uow;
}
