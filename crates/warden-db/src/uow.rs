//! SurrealDB implementation of [`UnitOfWork`].
//!
//! A [`TxScope`] is rendered into a single `BEGIN … COMMIT` query. Guards
//! are `IF … { THROW … }` statements; a throw or a unique index violation
//! cancels the whole transaction and is mapped back to a domain error in
//! [`crate::error`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use tracing::debug;
use uuid::Uuid;
use warden_core::error::WardenResult;
use warden_core::models::policy::UpsertPolicyRule;
use warden_core::models::secret_token::{CreateSecretToken, TokenPurpose};
use warden_core::uow::{TxOp, TxScope, UnitOfWork};

use crate::error::{DbError, marker};

enum Param {
    Str(String),
    Bool(bool),
    Time(DateTime<Utc>),
    Json(serde_json::Value),
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Uuid> for Param {
    fn from(v: Uuid) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<DateTime<Utc>> for Param {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Time(v)
    }
}

impl From<serde_json::Value> for Param {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

/// Transaction text plus its bound parameters.
#[derive(Default)]
struct Batch {
    statements: Vec<String>,
    params: Vec<(String, Param)>,
}

impl Batch {
    /// Register a parameter and return its `$name` placeholder.
    fn param(&mut self, value: impl Into<Param>) -> String {
        let name = format!("p{}", self.params.len());
        let placeholder = format!("${name}");
        self.params.push((name, value.into()));
        placeholder
    }

    fn push(&mut self, statement: String) {
        self.statements.push(statement);
    }

    fn sql(&self) -> String {
        let mut sql = String::from("BEGIN TRANSACTION;\n");
        for statement in &self.statements {
            sql.push_str(statement);
            sql.push('\n');
        }
        sql.push_str("COMMIT TRANSACTION;");
        sql
    }

    fn render(&mut self, op: TxOp) {
        match op {
            TxOp::RequireNoUsers => self.push(format!(
                "IF array::len(SELECT id FROM user LIMIT 1) > 0 {{ THROW \"{}\" }};",
                marker::ALREADY_INITIALIZED
            )),
            TxOp::CreateTenant { id, input } => {
                let id = self.param(id);
                let slug = self.param(input.slug);
                let name = self.param(input.name);
                let description = self.param(input.description);
                let secret_hash = self.param(input.secret_hash);
                let is_active = self.param(input.is_active);
                self.push(format!(
                    "CREATE type::record('tenant', {id}) SET slug = {slug}, name = {name}, \
                     description = {description}, secret_hash = {secret_hash}, \
                     is_active = {is_active};"
                ));
            }
            TxOp::CreateRole { id, input } => {
                let id = self.param(id);
                let name = self.param(input.name);
                let description = self.param(input.description);
                self.push(format!(
                    "CREATE type::record('role', {id}) SET name = {name}, \
                     description = {description};"
                ));
            }
            TxOp::CreateUser { id, user, profile } => {
                let id = self.param(id);
                let email = self.param(user.email);
                let password_hash = self.param(user.password_hash);
                let is_active = self.param(user.is_active);
                let is_verified = self.param(user.is_verified);
                self.push(format!(
                    "CREATE type::record('user', {id}) SET email = {email}, \
                     password_hash = {password_hash}, is_active = {is_active}, \
                     is_verified = {is_verified};"
                ));

                let first_name = self.param(profile.first_name);
                let last_name = self.param(profile.last_name);
                let mut sets = vec![
                    format!("user_id = {id}"),
                    format!("first_name = {first_name}"),
                    format!("last_name = {last_name}"),
                ];
                if let Some(avatar_url) = profile.avatar_url {
                    sets.push(format!("avatar_url = {}", self.param(avatar_url)));
                }
                if let Some(birth_date) = profile.birth_date {
                    sets.push(format!("birth_date = {}", self.param(birth_date)));
                }
                self.push(format!(
                    "CREATE type::record('profile', {id}) SET {};",
                    sets.join(", ")
                ));
            }
            TxOp::SetUserVerified { user_id, verified } => {
                let id = self.param(user_id);
                let verified = self.param(verified);
                self.push(format!(
                    "UPDATE type::record('user', {id}) SET is_verified = {verified}, \
                     updated_at = time::now();"
                ));
            }
            TxOp::SetPasswordHash {
                user_id,
                password_hash,
            } => {
                let id = self.param(user_id);
                let hash = self.param(password_hash);
                self.push(format!(
                    "UPDATE type::record('user', {id}) SET password_hash = {hash}, \
                     updated_at = time::now();"
                ));
            }
            TxOp::AssignRole {
                user_id,
                tenant_id,
                role_id,
            } => {
                let tenant = self.param(tenant_id);
                let role = self.param(role_id);
                self.push(format!(
                    "IF array::len(SELECT id FROM type::record('tenant', {tenant})) = 0 \
                     {{ THROW \"{}\" }};",
                    marker::MISSING_TENANT
                ));
                self.push(format!(
                    "IF array::len(SELECT id FROM type::record('role', {role})) = 0 \
                     {{ THROW \"{}\" }};",
                    marker::MISSING_ROLE
                ));
                // RELATE needs literal record ids; UUIDs are safe to embed.
                self.push(format!(
                    "RELATE user:`{user_id}` -> has_role -> role:`{role_id}` \
                     SET tenant_id = {tenant};"
                ));
            }
            TxOp::UpsertRule(rule) => self.render_upsert_rule(rule),
            TxOp::IssueToken {
                purpose,
                id,
                input,
                cooldown_since,
            } => self.render_issue_token(purpose, id, input, cooldown_since),
            TxOp::ConsumeToken {
                purpose,
                id,
                used_at,
            } => {
                let table = purpose.as_str();
                let id = self.param(id);
                let used_at = self.param(used_at);
                self.push(format!(
                    "IF array::len(SELECT id FROM type::record('{table}', {id}) \
                     WHERE used_at = NONE) = 0 {{ THROW \"{}\" }};",
                    marker::TOKEN_CONSUMED
                ));
                self.push(format!(
                    "UPDATE type::record('{table}', {id}) SET used_at = {used_at};"
                ));
            }
        }
    }

    fn render_upsert_rule(&mut self, rule: UpsertPolicyRule) {
        let id = self.param(Uuid::new_v4());
        let tenant = self.param(rule.tenant_id);
        let code = self.param(rule.code.as_str().to_string());
        let value = self.param(rule.value);
        let is_active = self.param(rule.is_active);
        self.push(format!(
            "IF array::len(SELECT id FROM policy_rule \
                 WHERE tenant_id = {tenant} AND code = {code}) > 0 {{ \
                 UPDATE policy_rule SET value = {value}, is_active = {is_active}, \
                 updated_at = time::now() \
                 WHERE tenant_id = {tenant} AND code = {code}; \
             }} ELSE {{ \
                 CREATE type::record('policy_rule', {id}) SET tenant_id = {tenant}, \
                 code = {code}, value = {value}, is_active = {is_active}; \
             }};"
        ));
    }

    fn render_issue_token(
        &mut self,
        purpose: TokenPurpose,
        id: Uuid,
        input: CreateSecretToken,
        cooldown_since: Option<DateTime<Utc>>,
    ) {
        let table = purpose.as_str();
        let user = self.param(input.user_id);
        let created_at = self.param(input.created_at);
        if let Some(since) = cooldown_since {
            let since = self.param(since);
            self.push(format!(
                "IF array::len(SELECT id FROM {table} WHERE user_id = {user} \
                 AND used_at = NONE AND created_at >= {since} \
                 AND expires_at > {created_at}) > 0 {{ THROW \"{}\" }};",
                marker::RATE_LIMITED
            ));
        }
        let id = self.param(id);
        let salt = self.param(input.salt);
        let token_hash = self.param(input.token_hash);
        let expires_at = self.param(input.expires_at);
        self.push(format!(
            "CREATE type::record('{table}', {id}) SET user_id = {user}, salt = {salt}, \
             token_hash = {token_hash}, expires_at = {expires_at}, \
             created_at = {created_at};"
        ));
    }
}

/// Applies recorded scopes as single SurrealDB transactions.
#[derive(Clone)]
pub struct SurrealUnitOfWork<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUnitOfWork<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> UnitOfWork for SurrealUnitOfWork<C> {
    async fn commit(&self, scope: TxScope) -> WardenResult<()> {
        if scope.is_empty() {
            return Ok(());
        }

        let ops = scope.into_ops();
        let op_count = ops.len();
        let mut batch = Batch::default();
        for op in ops {
            batch.render(op);
        }

        debug!(ops = op_count, "Committing unit of work");

        let mut builder = self.db.query(batch.sql());
        for (name, param) in batch.params {
            builder = match param {
                Param::Str(v) => builder.bind((name, v)),
                Param::Bool(v) => builder.bind((name, v)),
                Param::Time(v) => builder.bind((name, v)),
                Param::Json(v) => builder.bind((name, v)),
            };
        }

        let mut response = builder.await.map_err(DbError::from)?;
        let mut errors: Vec<_> = response.take_errors().into_iter().collect();
        if errors.is_empty() {
            return Ok(());
        }

        errors.sort_by_key(|(index, _)| *index);
        let message = errors
            .iter()
            .map(|(_, e)| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        debug!(error = %message, "Unit of work rolled back");
        Err(DbError::Query(message).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::models::role::CreateRole;

    #[test]
    fn batch_wraps_statements_in_a_transaction() {
        let mut scope = TxScope::new();
        scope.require_no_users();
        scope.roles().create(CreateRole {
            name: "ROOT".into(),
            description: String::new(),
        });

        let mut batch = Batch::default();
        for op in scope.into_ops() {
            batch.render(op);
        }
        let sql = batch.sql();

        assert!(sql.starts_with("BEGIN TRANSACTION;"));
        assert!(sql.ends_with("COMMIT TRANSACTION;"));
        assert!(sql.contains(marker::ALREADY_INITIALIZED));
        assert!(sql.contains("CREATE type::record('role', $p0)"));
        assert_eq!(batch.params.len(), 3);
    }

    #[test]
    fn cooldown_guard_only_rendered_when_requested() {
        let input = || CreateSecretToken {
            user_id: Uuid::new_v4(),
            salt: "salt".into(),
            token_hash: "hash".into(),
            expires_at: Utc::now(),
            created_at: Utc::now(),
        };

        let mut scope = TxScope::new();
        scope.resets().issue(input());
        let mut plain = Batch::default();
        for op in scope.into_ops() {
            plain.render(op);
        }
        assert!(!plain.sql().contains(marker::RATE_LIMITED));

        let mut scope = TxScope::new();
        scope.resets().issue_with_cooldown(input(), Utc::now());
        let mut guarded = Batch::default();
        for op in scope.into_ops() {
            guarded.render(op);
        }
        assert!(guarded.sql().contains(marker::RATE_LIMITED));
        assert!(guarded.sql().contains("password_reset"));
    }
}
