//! Database-specific error types and conversions.

use warden_core::error::{TokenError, WardenError};

/// Markers thrown by transaction guards; see [`crate::uow`].
pub(crate) mod marker {
    pub const RATE_LIMITED: &str = "warden:rate_limited";
    pub const ALREADY_INITIALIZED: &str = "warden:already_initialized";
    pub const TOKEN_CONSUMED: &str = "warden:token_consumed";
    pub const MISSING_TENANT: &str = "warden:missing_tenant";
    pub const MISSING_ROLE: &str = "warden:missing_role";
}

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Cannot connect to SurrealDB ({stage}): {source}")]
    Connect {
        stage: &'static str,
        #[source]
        source: surrealdb::Error,
    },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// A statement inside a query or transaction failed. Holds every
    /// reported error message, joined.
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Corrupt row: {0}")]
    Decode(String),
}

impl DbError {
    pub(crate) fn decode(what: &str, err: impl std::fmt::Display) -> Self {
        Self::Decode(format!("{what}: {err}"))
    }
}

fn is_unavailable(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["connection", "websocket", "timed out", "unreachable"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// Map a failed statement's message onto the domain error it represents.
fn classify(message: String) -> WardenError {
    if message.contains("idx_has_role_unique") {
        WardenError::DuplicateRoleAssignment
    } else if message.contains(marker::RATE_LIMITED) {
        WardenError::RateLimited
    } else if message.contains(marker::ALREADY_INITIALIZED) {
        WardenError::AlreadyInitialized
    } else if message.contains(marker::TOKEN_CONSUMED) {
        WardenError::TokenInvalid(TokenError::InvalidSignature)
    } else if message.contains(marker::MISSING_TENANT) {
        WardenError::NotFound {
            entity: "tenant".into(),
            id: String::new(),
        }
    } else if message.contains(marker::MISSING_ROLE) {
        WardenError::NotFound {
            entity: "role".into(),
            id: String::new(),
        }
    } else if let Some(entity) = unique_entity(&message) {
        WardenError::AlreadyExists {
            entity: entity.into(),
        }
    } else if is_unavailable(&message) {
        WardenError::StorageUnavailable(message)
    } else {
        WardenError::Database(message)
    }
}

fn unique_entity(message: &str) -> Option<&'static str> {
    [
        ("idx_user_email", "user"),
        ("idx_tenant_slug", "tenant"),
        ("idx_role_name", "role"),
        ("idx_policy_rule_code", "policy_rule"),
        ("idx_profile_user", "profile"),
    ]
    .into_iter()
    .find(|(index, _)| message.contains(index))
    .map(|(_, entity)| entity)
}

impl From<DbError> for WardenError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => WardenError::NotFound { entity, id },
            DbError::Query(message) => classify(message),
            err @ DbError::Connect { .. } => WardenError::StorageUnavailable(err.to_string()),
            DbError::Surreal(e) => {
                let message = e.to_string();
                if is_unavailable(&message) {
                    WardenError::StorageUnavailable(message)
                } else {
                    WardenError::Database(message)
                }
            }
            other => WardenError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_markers_map_to_domain_errors() {
        let err: WardenError = DbError::Query(format!(
            "The query was not executed due to a failed transaction; An error occurred: {}",
            marker::RATE_LIMITED
        ))
        .into();
        assert!(matches!(err, WardenError::RateLimited));

        let err: WardenError = DbError::Query(marker::TOKEN_CONSUMED.into()).into();
        assert!(matches!(
            err,
            WardenError::TokenInvalid(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn unique_index_violations_map_to_conflicts() {
        let err: WardenError = DbError::Query(
            "Database index `idx_has_role_unique` already contains [user:1, role:2, 't']".into(),
        )
        .into();
        assert!(matches!(err, WardenError::DuplicateRoleAssignment));

        let err: WardenError =
            DbError::Query("Database index `idx_user_email` already contains 'a@b.c'".into())
                .into();
        assert!(matches!(err, WardenError::AlreadyExists { entity } if entity == "user"));
    }

    #[test]
    fn unknown_failures_stay_database_errors() {
        let err: WardenError = DbError::Query("Parse error".into()).into();
        assert!(matches!(err, WardenError::Database(_)));

        let err: WardenError = DbError::Query("Connection refused".into()).into();
        assert!(matches!(err, WardenError::StorageUnavailable(_)));
    }
}
