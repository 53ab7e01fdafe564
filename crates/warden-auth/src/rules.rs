//! Per-tenant rule evaluation for registration and login.
//!
//! Stored rule payloads are raw JSON. Every payload is parsed into a
//! [`RulePolicy`] before use, and anything that fails to parse, or any
//! tenant with two active rules for the same code, is rejected.

use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;
use warden_core::error::{PasswordWeakness, RuleViolation, WardenResult};
use warden_core::models::policy::{PolicyRule, RuleCode};
use warden_core::models::role::{ADMIN_ROLE, ROOT_ROLE, Role, normalize_role_name};
use warden_core::repository::{
    PolicyRuleRepository, Repositories, RoleAssignmentRepository, RoleRepository,
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SelfRegister {
    pub allow: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PasswordStrength {
    pub min: usize,
    pub upper: bool,
    pub digits: bool,
    pub symbols: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DefaultRole {
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AdminOnly {
    pub enabled: bool,
}

/// A rule payload parsed for its code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RulePolicy {
    SelfRegister(SelfRegister),
    PwdStrength(PasswordStrength),
    DefaultRole(DefaultRole),
    AdminOnly(AdminOnly),
}

fn payload<T: DeserializeOwned>(code: RuleCode, value: &serde_json::Value) -> Result<T, RuleViolation> {
    serde_json::from_value(value.clone()).map_err(|e| invalid(code, e.to_string()))
}

fn invalid(code: RuleCode, reason: impl Into<String>) -> RuleViolation {
    RuleViolation::InvalidRuleConfig {
        code: code.as_str().to_string(),
        reason: reason.into(),
    }
}

impl RulePolicy {
    /// Parse `value` against the schema for `code`. Unknown fields are
    /// ignored; missing or mistyped fields are not.
    pub fn parse(code: RuleCode, value: &serde_json::Value) -> Result<Self, RuleViolation> {
        match code {
            RuleCode::SelfRegister => payload(code, value).map(Self::SelfRegister),
            RuleCode::PwdStrength => payload(code, value).map(Self::PwdStrength),
            RuleCode::DefaultRole => {
                let rule: DefaultRole = payload(code, value)?;
                if rule.role.trim().is_empty() {
                    return Err(invalid(code, "role must not be empty"));
                }
                Ok(Self::DefaultRole(rule))
            }
            RuleCode::AdminOnly => payload(code, value).map(Self::AdminOnly),
        }
    }

    pub fn code(&self) -> RuleCode {
        match self {
            Self::SelfRegister(_) => RuleCode::SelfRegister,
            Self::PwdStrength(_) => RuleCode::PwdStrength,
            Self::DefaultRole(_) => RuleCode::DefaultRole,
            Self::AdminOnly(_) => RuleCode::AdminOnly,
        }
    }
}

/// The active rules of one tenant, at most one per code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    pub self_register: Option<SelfRegister>,
    pub pwd_strength: Option<PasswordStrength>,
    pub default_role: Option<DefaultRole>,
    pub admin_only: Option<AdminOnly>,
}

impl RuleSet {
    /// Parse every active rule. Inactive rules are skipped.
    pub fn from_rules(rules: &[PolicyRule]) -> Result<Self, RuleViolation> {
        let mut set = Self::default();
        for rule in rules.iter().filter(|r| r.is_active) {
            let duplicate = match RulePolicy::parse(rule.code, &rule.value)? {
                RulePolicy::SelfRegister(p) => set.self_register.replace(p).is_some(),
                RulePolicy::PwdStrength(p) => set.pwd_strength.replace(p).is_some(),
                RulePolicy::DefaultRole(p) => set.default_role.replace(p).is_some(),
                RulePolicy::AdminOnly(p) => set.admin_only.replace(p).is_some(),
            };
            if duplicate {
                return Err(invalid(rule.code, "more than one active rule"));
            }
        }
        Ok(set)
    }
}

/// Check `password` against a `PWD_STRENGTH` rule. Constraints are
/// tested in a fixed order and the first one unmet is reported.
pub fn password_check(rule: &PasswordStrength, password: &str) -> Result<(), PasswordWeakness> {
    if password.chars().count() < rule.min {
        return Err(PasswordWeakness::TooShort { min: rule.min });
    }
    if rule.upper && !password.chars().any(char::is_uppercase) {
        return Err(PasswordWeakness::MissingUppercase);
    }
    if rule.digits && !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordWeakness::MissingDigit);
    }
    if rule.symbols && password.chars().all(char::is_alphanumeric) {
        return Err(PasswordWeakness::MissingSymbol);
    }
    Ok(())
}

/// Outcome of a successful registration evaluation.
#[derive(Debug, Clone)]
pub struct RegistrationDecision {
    pub default_role: Role,
}

/// Applies a tenant's rules to registration and login attempts.
pub struct RuleEvaluator<R: Repositories> {
    repos: Arc<R>,
}

impl<R: Repositories> Clone for RuleEvaluator<R> {
    fn clone(&self) -> Self {
        Self {
            repos: Arc::clone(&self.repos),
        }
    }
}

impl<R: Repositories> RuleEvaluator<R> {
    pub fn new(repos: Arc<R>) -> Self {
        Self { repos }
    }

    pub async fn evaluate_registration(
        &self,
        tenant_id: Uuid,
        password: &str,
    ) -> WardenResult<RegistrationDecision> {
        let rules = self.repos.rules().active(tenant_id).await?;

        // A closed tenant is reported as closed even if other rules are
        // broken.
        let closed = rules
            .iter()
            .filter(|r| r.code == RuleCode::SelfRegister)
            .any(|r| {
                matches!(
                    RulePolicy::parse(r.code, &r.value),
                    Ok(RulePolicy::SelfRegister(SelfRegister { allow: false }))
                )
            });
        if closed {
            debug!(tenant_id = %tenant_id, "Registration rejected: self-registration disabled");
            return Err(RuleViolation::SelfRegisterDisabled.into());
        }

        let set = RuleSet::from_rules(&rules)?;

        if let Some(strength) = &set.pwd_strength {
            password_check(strength, password)
                .map_err(|reason| RuleViolation::WeakPassword { reason })?;
        }

        let Some(default_role) = set.default_role else {
            debug!(tenant_id = %tenant_id, "Registration rejected: no DEFAULT_ROLE rule");
            return Err(RuleViolation::MissingDefaultRole.into());
        };
        let role_name = normalize_role_name(&default_role.role);
        let Some(role) = self.repos.roles().find_by_name(&role_name).await? else {
            debug!(
                tenant_id = %tenant_id,
                role = %role_name,
                "Registration rejected: default role does not exist"
            );
            return Err(RuleViolation::MissingDefaultRole.into());
        };

        debug!(tenant_id = %tenant_id, role = %role.name, "Registration rules passed");
        Ok(RegistrationDecision { default_role: role })
    }

    pub async fn evaluate_login(&self, tenant_id: Uuid, user_id: Uuid) -> WardenResult<()> {
        let rules = self.repos.rules().active(tenant_id).await?;
        let set = RuleSet::from_rules(&rules)?;

        if set.admin_only.is_some_and(|r| r.enabled) {
            let roles = self
                .repos
                .assignments()
                .role_names(user_id, tenant_id)
                .await?;
            let privileged = roles
                .iter()
                .any(|r| r.eq_ignore_ascii_case(ADMIN_ROLE) || r.eq_ignore_ascii_case(ROOT_ROLE));
            if !privileged {
                debug!(tenant_id = %tenant_id, user_id = %user_id, "Login rejected: ADMIN_ONLY");
                return Err(RuleViolation::AdminOnlyRestriction.into());
            }
        }

        debug!(tenant_id = %tenant_id, user_id = %user_id, "Login rules passed");
        Ok(())
    }
}
