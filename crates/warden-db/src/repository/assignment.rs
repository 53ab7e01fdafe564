//! SurrealDB implementation of [`RoleAssignmentRepository`].
//!
//! Assignments are `user -> has_role -> role` edges carrying the tenant
//! id. They are created through the unit of work only.

use std::collections::HashMap;

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::error::WardenResult;
use warden_core::models::assignment::TenantMember;
use warden_core::repository::RoleAssignmentRepository;

use super::parse_uuid;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct MemberRow {
    user_id: String,
    email: String,
    is_verified: bool,
    is_active: bool,
    role_name: String,
}

#[derive(Debug, SurrealValue)]
struct ProfileNameRow {
    user_id: String,
    first_name: String,
    last_name: String,
}

#[derive(Clone)]
pub struct SurrealRoleAssignmentRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRoleAssignmentRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> RoleAssignmentRepository for SurrealRoleAssignmentRepository<C> {
    async fn role_names(&self, user_id: Uuid, tenant_id: Uuid) -> WardenResult<Vec<String>> {
        let mut result = self
            .db
            .query(
                "SELECT VALUE out.name FROM has_role \
                 WHERE in = type::record('user', $user_id) \
                 AND tenant_id = $tenant_id",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut names: Vec<String> = result.take(0).map_err(DbError::from)?;
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn members(&self, tenant_id: Uuid) -> WardenResult<Vec<TenantMember>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(in) AS user_id, in.email AS email, \
                 in.is_verified AS is_verified, in.is_active AS is_active, \
                 out.name AS role_name \
                 FROM has_role WHERE tenant_id = $tenant_id; \
                 SELECT user_id, first_name, last_name FROM profile \
                 WHERE user_id IN (\
                     SELECT VALUE meta::id(in) FROM has_role \
                     WHERE tenant_id = $tenant_id\
                 );",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MemberRow> = result.take(0).map_err(DbError::from)?;
        let profiles: Vec<ProfileNameRow> = result.take(1).map_err(DbError::from)?;
        let names: HashMap<String, (String, String)> = profiles
            .into_iter()
            .map(|p| (p.user_id, (p.first_name, p.last_name)))
            .collect();

        let mut members = rows
            .into_iter()
            .map(|row| -> WardenResult<TenantMember> {
                let (first_name, last_name) =
                    names.get(&row.user_id).cloned().unwrap_or_default();
                Ok(TenantMember {
                    user_id: parse_uuid(&row.user_id, "member user id")?,
                    email: row.email,
                    is_verified: row.is_verified,
                    is_active: row.is_active,
                    first_name,
                    last_name,
                    role_name: row.role_name,
                })
            })
            .collect::<WardenResult<Vec<_>>>()?;
        members.sort_by(|a, b| (&a.email, &a.role_name).cmp(&(&b.email, &b.role_name)));
        Ok(members)
    }
}
