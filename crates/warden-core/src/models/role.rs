//! Role domain model.
//!
//! Roles are global; where a role applies is recorded by the
//! assignment, not by the role itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Held in the root tenant by system operators.
pub const ROOT_ROLE: &str = "ROOT";
/// Tenant super-user; passes every RBAC check within its tenant.
pub const ADMIN_ROLE: &str = "ADMIN";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    /// Uppercase, unique.
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRole {
    pub name: String,
    pub description: String,
}

/// Role names are compared case-insensitively by storing them uppercase.
pub fn normalize_role_name(name: &str) -> String {
    name.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_are_uppercased() {
        assert_eq!(normalize_role_name(" member "), "MEMBER");
        assert_eq!(normalize_role_name("Admin"), ADMIN_ROLE);
    }
}
