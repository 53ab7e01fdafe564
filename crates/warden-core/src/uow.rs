//! Unit of work: multi-entity writes that commit or roll back together.
//!
//! A [`TxScope`] records typed write operations through short-lived
//! handles. Ids are generated when an operation is recorded, so later
//! operations in the same scope can reference rows created earlier.
//! Nothing touches storage until [`UnitOfWork::commit`] applies the whole
//! batch atomically.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::WardenResult;
use crate::models::{
    policy::{RuleCode, UpsertPolicyRule},
    role::CreateRole,
    secret_token::{CreateSecretToken, TokenPurpose},
    tenant::CreateTenant,
    user::{CreateProfile, CreateUser},
};

/// One recorded write.
#[derive(Debug, Clone)]
pub enum TxOp {
    CreateTenant {
        id: Uuid,
        input: CreateTenant,
    },
    CreateRole {
        id: Uuid,
        input: CreateRole,
    },
    CreateUser {
        id: Uuid,
        user: CreateUser,
        profile: CreateProfile,
    },
    SetUserVerified {
        user_id: Uuid,
        verified: bool,
    },
    SetPasswordHash {
        user_id: Uuid,
        password_hash: String,
    },
    /// Fails with `DuplicateRoleAssignment` if the triple exists, and
    /// `NotFound` if the tenant or role does not.
    AssignRole {
        user_id: Uuid,
        tenant_id: Uuid,
        role_id: Uuid,
    },
    UpsertRule(UpsertPolicyRule),
    IssueToken {
        purpose: TokenPurpose,
        id: Uuid,
        input: CreateSecretToken,
        /// When set, fails with `RateLimited` if an open token for the
        /// same user was created at or after this instant.
        cooldown_since: Option<DateTime<Utc>>,
    },
    /// Fails with `TokenInvalid` unless the token exists and is unused.
    ConsumeToken {
        purpose: TokenPurpose,
        id: Uuid,
        used_at: DateTime<Utc>,
    },
    /// Fails with `AlreadyInitialized` if any user exists.
    RequireNoUsers,
}

/// Write operations collected for a single atomic commit.
#[derive(Debug, Default)]
pub struct TxScope {
    ops: Vec<TxOp>,
}

impl TxScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tenants(&mut self) -> TenantWrites<'_> {
        TenantWrites { scope: self }
    }

    pub fn users(&mut self) -> UserWrites<'_> {
        UserWrites { scope: self }
    }

    pub fn roles(&mut self) -> RoleWrites<'_> {
        RoleWrites { scope: self }
    }

    pub fn assignments(&mut self) -> AssignmentWrites<'_> {
        AssignmentWrites { scope: self }
    }

    pub fn rules(&mut self) -> RuleWrites<'_> {
        RuleWrites { scope: self }
    }

    pub fn verifications(&mut self) -> SecretTokenWrites<'_> {
        SecretTokenWrites {
            scope: self,
            purpose: TokenPurpose::EmailVerification,
        }
    }

    pub fn resets(&mut self) -> SecretTokenWrites<'_> {
        SecretTokenWrites {
            scope: self,
            purpose: TokenPurpose::PasswordReset,
        }
    }

    /// Abort the commit if any user already exists.
    pub fn require_no_users(&mut self) {
        self.ops.push(TxOp::RequireNoUsers);
    }

    pub fn ops(&self) -> &[TxOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<TxOp> {
        self.ops
    }

    fn push(&mut self, op: TxOp) {
        self.ops.push(op);
    }
}

pub struct TenantWrites<'a> {
    scope: &'a mut TxScope,
}

impl TenantWrites<'_> {
    pub fn create(self, input: CreateTenant) -> Uuid {
        let id = Uuid::new_v4();
        self.scope.push(TxOp::CreateTenant { id, input });
        id
    }
}

pub struct UserWrites<'a> {
    scope: &'a mut TxScope,
}

impl UserWrites<'_> {
    /// Create a user together with their profile.
    pub fn create(self, user: CreateUser, profile: CreateProfile) -> Uuid {
        let id = Uuid::new_v4();
        self.scope.push(TxOp::CreateUser { id, user, profile });
        id
    }

    pub fn set_verified(self, user_id: Uuid, verified: bool) {
        self.scope.push(TxOp::SetUserVerified { user_id, verified });
    }

    pub fn set_password_hash(self, user_id: Uuid, password_hash: String) {
        self.scope.push(TxOp::SetPasswordHash {
            user_id,
            password_hash,
        });
    }
}

pub struct RoleWrites<'a> {
    scope: &'a mut TxScope,
}

impl RoleWrites<'_> {
    pub fn create(self, input: CreateRole) -> Uuid {
        let id = Uuid::new_v4();
        self.scope.push(TxOp::CreateRole { id, input });
        id
    }
}

pub struct AssignmentWrites<'a> {
    scope: &'a mut TxScope,
}

impl AssignmentWrites<'_> {
    pub fn assign(self, user_id: Uuid, tenant_id: Uuid, role_id: Uuid) {
        self.scope.push(TxOp::AssignRole {
            user_id,
            tenant_id,
            role_id,
        });
    }
}

pub struct RuleWrites<'a> {
    scope: &'a mut TxScope,
}

impl RuleWrites<'_> {
    pub fn upsert(self, tenant_id: Uuid, code: RuleCode, value: serde_json::Value, is_active: bool) {
        self.scope.push(TxOp::UpsertRule(UpsertPolicyRule {
            tenant_id,
            code,
            value,
            is_active,
        }));
    }
}

pub struct SecretTokenWrites<'a> {
    scope: &'a mut TxScope,
    purpose: TokenPurpose,
}

impl SecretTokenWrites<'_> {
    pub fn issue(self, input: CreateSecretToken) -> Uuid {
        self.push_issue(input, None)
    }

    /// Issue unless an open token for the same user was created at or
    /// after `since`.
    pub fn issue_with_cooldown(self, input: CreateSecretToken, since: DateTime<Utc>) -> Uuid {
        self.push_issue(input, Some(since))
    }

    /// Mark a token used. Loses to any earlier consumer.
    pub fn consume(self, id: Uuid, used_at: DateTime<Utc>) {
        let purpose = self.purpose;
        self.scope.push(TxOp::ConsumeToken {
            purpose,
            id,
            used_at,
        });
    }

    fn push_issue(self, input: CreateSecretToken, cooldown_since: Option<DateTime<Utc>>) -> Uuid {
        let id = Uuid::new_v4();
        let purpose = self.purpose;
        self.scope.push(TxOp::IssueToken {
            purpose,
            id,
            input,
            cooldown_since,
        });
        id
    }
}

pub trait UnitOfWork: Send + Sync {
    /// Apply every operation in `scope` atomically. An empty scope is a
    /// no-op.
    fn commit(&self, scope: TxScope) -> impl Future<Output = WardenResult<()>> + Send;

    /// Record operations with `build`, then commit them. Nothing is
    /// written if `build` fails.
    fn within<T, F>(&self, build: F) -> impl Future<Output = WardenResult<T>> + Send
    where
        T: Send,
        F: FnOnce(&mut TxScope) -> WardenResult<T> + Send,
    {
        async move {
            let mut scope = TxScope::new();
            let out = build(&mut scope)?;
            self.commit(scope).await?;
            Ok(out)
        }
    }
}
