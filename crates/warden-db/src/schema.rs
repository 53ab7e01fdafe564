//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings and double as record ids. Rule codes are
//! stored as strings with an ASSERT constraint.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1: initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Tenants (client applications)
-- =======================================================================
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD slug ON TABLE tenant TYPE string;
DEFINE FIELD name ON TABLE tenant TYPE string;
DEFINE FIELD description ON TABLE tenant TYPE string DEFAULT '';
DEFINE FIELD secret_hash ON TABLE tenant TYPE string;
DEFINE FIELD is_active ON TABLE tenant TYPE bool DEFAULT true;
DEFINE FIELD deleted_at ON TABLE tenant TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_tenant_slug ON TABLE tenant COLUMNS slug UNIQUE;

-- =======================================================================
-- Users and profiles (global identities)
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD email ON TABLE user TYPE string \
    ASSERT $value = string::lowercase(string::trim($value));
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD is_active ON TABLE user TYPE bool DEFAULT true;
DEFINE FIELD is_verified ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD last_login ON TABLE user TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;

-- Record id equals the owning user's id.
DEFINE TABLE profile SCHEMAFULL;
DEFINE FIELD user_id ON TABLE profile TYPE string;
DEFINE FIELD first_name ON TABLE profile TYPE string;
DEFINE FIELD last_name ON TABLE profile TYPE string;
DEFINE FIELD avatar_url ON TABLE profile TYPE option<string>;
DEFINE FIELD birth_date ON TABLE profile TYPE option<datetime>;
DEFINE INDEX idx_profile_user ON TABLE profile COLUMNS user_id UNIQUE;

-- =======================================================================
-- Roles and assignments
-- =======================================================================
DEFINE TABLE role SCHEMAFULL;
DEFINE FIELD name ON TABLE role TYPE string;
DEFINE FIELD description ON TABLE role TYPE string DEFAULT '';
DEFINE FIELD created_at ON TABLE role TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_role_name ON TABLE role COLUMNS name UNIQUE;

-- user -> has_role -> role, scoped by tenant
DEFINE TABLE has_role TYPE RELATION FROM user TO role SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE has_role TYPE string;
DEFINE FIELD created_at ON TABLE has_role TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_has_role_unique ON TABLE has_role \
    COLUMNS in, out, tenant_id UNIQUE;
DEFINE INDEX idx_has_role_tenant ON TABLE has_role COLUMNS tenant_id;

-- =======================================================================
-- Policy rules (one per tenant and code)
-- =======================================================================
DEFINE TABLE policy_rule SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE policy_rule TYPE string;
DEFINE FIELD code ON TABLE policy_rule TYPE string \
    ASSERT $value IN ['SELF_REGISTER', 'PWD_STRENGTH', 'DEFAULT_ROLE', \
    'ADMIN_ONLY'];
DEFINE FIELD value ON TABLE policy_rule TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD is_active ON TABLE policy_rule TYPE bool DEFAULT true;
DEFINE FIELD created_at ON TABLE policy_rule TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE policy_rule TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_policy_rule_code ON TABLE policy_rule \
    COLUMNS tenant_id, code UNIQUE;

-- =======================================================================
-- Single-use secrets (salted SHA-256 digests only)
-- =======================================================================
DEFINE TABLE email_verification SCHEMAFULL;
DEFINE FIELD user_id ON TABLE email_verification TYPE string;
DEFINE FIELD salt ON TABLE email_verification TYPE string;
DEFINE FIELD token_hash ON TABLE email_verification TYPE string;
DEFINE FIELD expires_at ON TABLE email_verification TYPE datetime;
DEFINE FIELD used_at ON TABLE email_verification TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE email_verification TYPE datetime;
DEFINE INDEX idx_email_verification_user ON TABLE email_verification \
    COLUMNS user_id;

DEFINE TABLE password_reset SCHEMAFULL;
DEFINE FIELD user_id ON TABLE password_reset TYPE string;
DEFINE FIELD salt ON TABLE password_reset TYPE string;
DEFINE FIELD token_hash ON TABLE password_reset TYPE string;
DEFINE FIELD expires_at ON TABLE password_reset TYPE datetime;
DEFINE FIELD used_at ON TABLE password_reset TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE password_reset TYPE datetime;
DEFINE INDEX idx_password_reset_user ON TABLE password_reset \
    COLUMNS user_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Bring the schema up to date.
///
/// Each pending migration is applied together with its `_migration`
/// record in one transaction, so a failed migration leaves no trace and
/// is retried on the next start. Returns the number of migrations
/// applied.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<usize, DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version, name FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    let mut applied = 0;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        let sql = format!(
            "BEGIN TRANSACTION;\n{}\n\
             CREATE _migration SET version = $version, name = $name;\n\
             COMMIT TRANSACTION;",
            migration.sql
        );
        db.query(sql)
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;
        applied += 1;
    }

    if applied == 0 {
        info!(version = current_version, "Schema is up to date");
    } else {
        info!(applied, "Migrations applied");
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_v1_is_nonempty() {
        assert!(!SCHEMA_V1.is_empty());
    }

    #[test]
    fn schema_v1_defines_every_table() {
        for table in [
            "tenant",
            "user",
            "profile",
            "role",
            "has_role",
            "policy_rule",
            "email_verification",
            "password_reset",
        ] {
            assert!(
                SCHEMA_V1.contains(&format!("DEFINE TABLE {table} ")),
                "missing table {table}"
            );
        }
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }
}
