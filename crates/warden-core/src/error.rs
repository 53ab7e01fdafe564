//! Error types for the Warden identity provider.
//!
//! Every caller-facing failure is a [`WardenError`] variant. Boundary
//! layers map [`WardenError::category`] to a status code and
//! [`WardenError::code`] to a stable machine-readable identifier.

use thiserror::Error;

/// Reason a policy rule rejected a registration or login attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    #[error("self-registration is disabled for this tenant")]
    SelfRegisterDisabled,

    #[error("password is too weak: {reason}")]
    WeakPassword { reason: PasswordWeakness },

    #[error("login is restricted to tenant administrators")]
    AdminOnlyRestriction,

    #[error("tenant has no usable default role configured")]
    MissingDefaultRole,

    #[error("invalid {code} rule configuration: {reason}")]
    InvalidRuleConfig { code: String, reason: String },
}

/// The first `PWD_STRENGTH` constraint a candidate password failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PasswordWeakness {
    #[error("must be at least {min} characters long")]
    TooShort { min: usize },
    #[error("must contain an uppercase letter")]
    MissingUppercase,
    #[error("must contain a digit")]
    MissingDigit,
    #[error("must contain a symbol")]
    MissingSymbol,
}

/// Why a signed or one-time token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
}

/// Coarse classification used by boundary layers to pick a response
/// status without inspecting messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Unauthenticated,
    Forbidden,
    NotFound,
    Conflict,
    InvalidInput,
    RateLimited,
    Unavailable,
    Internal,
}

#[derive(Debug, Error)]
pub enum WardenError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user has not verified their email")]
    UnverifiedUser,

    #[error("user is deactivated")]
    InactiveUser,

    #[error("unknown tenant: {slug}")]
    UnknownTenant { slug: String },

    #[error("tenant is inactive: {slug}")]
    TenantInactive { slug: String },

    #[error("rule violation: {0}")]
    RuleViolation(#[from] RuleViolation),

    #[error("email is already registered in this tenant")]
    AlreadyRegisteredInTenant,

    #[error("user already holds this role in this tenant")]
    DuplicateRoleAssignment,

    #[error("user holds no roles in this tenant")]
    NoRolesInTenant,

    #[error("insufficient permissions")]
    Forbidden,

    #[error("invalid token: {0}")]
    TokenInvalid(#[from] TokenError),

    #[error("setup token is invalid")]
    SetupTokenInvalid,

    #[error("setup token has expired, restart the server to issue a new one")]
    SetupTokenExpired,

    #[error("system is already initialized")]
    AlreadyInitialized,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type WardenResult<T> = Result<T, WardenError>;

impl WardenError {
    /// Stable identifier for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::UnverifiedUser => "unverified_user",
            Self::InactiveUser => "inactive_user",
            Self::UnknownTenant { .. } => "unknown_tenant",
            Self::TenantInactive { .. } => "tenant_inactive",
            Self::RuleViolation(v) => match v {
                RuleViolation::SelfRegisterDisabled => "self_register_disabled",
                RuleViolation::WeakPassword { .. } => "weak_password",
                RuleViolation::AdminOnlyRestriction => "admin_only_restriction",
                RuleViolation::MissingDefaultRole => "missing_default_role",
                RuleViolation::InvalidRuleConfig { .. } => "invalid_rule_config",
            },
            Self::AlreadyRegisteredInTenant => "already_registered_in_tenant",
            Self::DuplicateRoleAssignment => "duplicate_role_assignment",
            Self::NoRolesInTenant => "no_roles_in_tenant",
            Self::Forbidden => "forbidden",
            Self::TokenInvalid(t) => match t {
                TokenError::Malformed => "token_malformed",
                TokenError::InvalidSignature => "token_invalid_signature",
                TokenError::Expired => "token_expired",
            },
            Self::SetupTokenInvalid => "setup_token_invalid",
            Self::SetupTokenExpired => "setup_token_expired",
            Self::AlreadyInitialized => "already_initialized",
            Self::RateLimited => "rate_limited",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::Validation { .. } => "validation",
            Self::Database(_) => "database",
            Self::Crypto(_) => "crypto",
            Self::Internal(_) => "internal",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidCredentials
            | Self::UnverifiedUser
            | Self::InactiveUser
            | Self::TokenInvalid(_)
            | Self::SetupTokenInvalid
            | Self::SetupTokenExpired => ErrorCategory::Unauthenticated,
            Self::TenantInactive { .. }
            | Self::NoRolesInTenant
            | Self::Forbidden
            | Self::RuleViolation(
                RuleViolation::SelfRegisterDisabled | RuleViolation::AdminOnlyRestriction,
            ) => ErrorCategory::Forbidden,
            Self::UnknownTenant { .. } | Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AlreadyRegisteredInTenant
            | Self::DuplicateRoleAssignment
            | Self::AlreadyInitialized
            | Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::RuleViolation(RuleViolation::WeakPassword { .. }) | Self::Validation { .. } => {
                ErrorCategory::InvalidInput
            }
            // A tenant without usable rules is an operator problem, not
            // something the end user can fix.
            Self::RuleViolation(
                RuleViolation::MissingDefaultRole | RuleViolation::InvalidRuleConfig { .. },
            ) => ErrorCategory::Internal,
            Self::RateLimited => ErrorCategory::RateLimited,
            Self::StorageUnavailable(_) => ErrorCategory::Unavailable,
            Self::Database(_) | Self::Crypto(_) | Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_violations_keep_their_own_codes() {
        let err: WardenError = RuleViolation::WeakPassword {
            reason: PasswordWeakness::MissingDigit,
        }
        .into();
        assert_eq!(err.code(), "weak_password");
        assert_eq!(err.category(), ErrorCategory::InvalidInput);
        assert!(err.to_string().contains("digit"));
    }

    #[test]
    fn token_errors_are_unauthenticated() {
        let err: WardenError = TokenError::Expired.into();
        assert_eq!(err.code(), "token_expired");
        assert_eq!(err.category(), ErrorCategory::Unauthenticated);
    }

    #[test]
    fn misconfigured_tenant_is_internal() {
        let err = WardenError::RuleViolation(RuleViolation::MissingDefaultRole);
        assert_eq!(err.category(), ErrorCategory::Internal);
        let err = WardenError::RuleViolation(RuleViolation::AdminOnlyRestriction);
        assert_eq!(err.category(), ErrorCategory::Forbidden);
    }

    #[test]
    fn storage_outage_is_distinct_from_database_errors() {
        let outage = WardenError::StorageUnavailable("connection refused".into());
        let failure = WardenError::Database("syntax".into());
        assert_eq!(outage.category(), ErrorCategory::Unavailable);
        assert_eq!(failure.category(), ErrorCategory::Internal);
    }
}
