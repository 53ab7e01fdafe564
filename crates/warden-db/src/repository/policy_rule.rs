//! SurrealDB implementation of [`PolicyRuleRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::error::WardenResult;
use warden_core::models::policy::{PolicyRule, RuleCode};
use warden_core::repository::PolicyRuleRepository;

use super::parse_uuid;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct RuleRowWithId {
    record_id: String,
    tenant_id: String,
    code: String,
    value: serde_json::Value,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RuleRowWithId {
    fn try_into_rule(self) -> Result<PolicyRule, DbError> {
        let code = self
            .code
            .parse::<RuleCode>()
            .map_err(|e| DbError::decode("policy_rule code", e))?;
        Ok(PolicyRule {
            id: parse_uuid(&self.record_id, "policy_rule id")?,
            tenant_id: parse_uuid(&self.tenant_id, "policy_rule tenant id")?,
            code,
            value: self.value,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct SurrealPolicyRuleRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPolicyRuleRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn select(&self, tenant_id: Uuid, only_active: bool) -> WardenResult<Vec<PolicyRule>> {
        let filter = if only_active { "AND is_active = true" } else { "" };
        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, tenant_id, code, value, \
                 is_active, created_at, updated_at FROM policy_rule \
                 WHERE tenant_id = $tenant_id {filter} ORDER BY code ASC"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RuleRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(|r| r.try_into_rule())
            .collect::<Result<Vec<_>, _>>()?)
    }
}

impl<C: Connection> PolicyRuleRepository for SurrealPolicyRuleRepository<C> {
    async fn list(&self, tenant_id: Uuid) -> WardenResult<Vec<PolicyRule>> {
        self.select(tenant_id, false).await
    }

    async fn active(&self, tenant_id: Uuid) -> WardenResult<Vec<PolicyRule>> {
        self.select(tenant_id, true).await
    }
}
