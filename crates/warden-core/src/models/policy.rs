//! Per-tenant policy rules.
//!
//! Rule codes form a closed set. The payload is kept as raw JSON here;
//! the auth layer parses it into a typed policy before use.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleCode {
    SelfRegister,
    PwdStrength,
    DefaultRole,
    AdminOnly,
}

impl RuleCode {
    pub const ALL: [RuleCode; 4] = [
        RuleCode::SelfRegister,
        RuleCode::PwdStrength,
        RuleCode::DefaultRole,
        RuleCode::AdminOnly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelfRegister => "SELF_REGISTER",
            Self::PwdStrength => "PWD_STRENGTH",
            Self::DefaultRole => "DEFAULT_ROLE",
            Self::AdminOnly => "ADMIN_ONLY",
        }
    }
}

impl fmt::Display for RuleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRuleCode(pub String);

impl fmt::Display for UnknownRuleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown rule code: {}", self.0)
    }
}

impl std::error::Error for UnknownRuleCode {}

impl FromStr for RuleCode {
    type Err = UnknownRuleCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| UnknownRuleCode(s.to_string()))
    }
}

/// A stored rule: one per (tenant, code).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub code: RuleCode,
    pub value: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertPolicyRule {
    pub tenant_id: Uuid,
    pub code: RuleCode,
    pub value: serde_json::Value,
    pub is_active: bool,
}
