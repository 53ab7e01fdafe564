//! SurrealDB implementation of [`TenantRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::error::WardenResult;
use warden_core::models::tenant::{Tenant, TenantSummary};
use warden_core::repository::TenantRepository;

use super::parse_uuid;
use crate::error::DbError;

const SELECT_TENANT: &str = "SELECT meta::id(id) AS record_id, slug, name, description, \
     secret_hash, is_active, deleted_at, created_at, updated_at FROM";

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct TenantRowWithId {
    record_id: String,
    slug: String,
    name: String,
    description: String,
    secret_hash: String,
    is_active: bool,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TenantRowWithId {
    fn try_into_tenant(self) -> Result<Tenant, DbError> {
        Ok(Tenant {
            id: parse_uuid(&self.record_id, "tenant id")?,
            slug: self.slug,
            name: self.name,
            description: self.description,
            secret_hash: self.secret_hash,
            is_active: self.is_active,
            deleted_at: self.deleted_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct SummaryRow {
    record_id: String,
    slug: String,
    name: String,
    description: String,
    is_active: bool,
    member_count: u64,
}

/// SurrealDB implementation of the Tenant repository.
#[derive(Clone)]
pub struct SurrealTenantRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTenantRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn first(&self, query: String, id: Uuid) -> WardenResult<Tenant> {
        let id_str = id.to_string();
        let mut result = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<TenantRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "tenant".into(),
            id: id_str,
        })?;
        Ok(row.try_into_tenant()?)
    }
}

impl<C: Connection> TenantRepository for SurrealTenantRepository<C> {
    async fn get_by_id(&self, id: Uuid) -> WardenResult<Tenant> {
        self.first(
            format!("{SELECT_TENANT} type::record('tenant', $id)"),
            id,
        )
        .await
    }

    async fn find_by_slug(&self, slug: &str) -> WardenResult<Option<Tenant>> {
        let mut result = self
            .db
            .query(format!("{SELECT_TENANT} tenant WHERE slug = $slug LIMIT 1"))
            .bind(("slug", slug.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRowWithId> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .next()
            .map(|row| row.try_into_tenant().map_err(Into::into))
            .transpose()
    }

    async fn set_active(&self, id: Uuid, active: bool) -> WardenResult<Tenant> {
        let id_str = id.to_string();
        self.db
            .query(
                "UPDATE type::record('tenant', $id) SET \
                 is_active = $active, updated_at = time::now() \
                 WHERE deleted_at = NONE",
            )
            .bind(("id", id_str))
            .bind(("active", active))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        self.get_by_id(id).await
    }

    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> WardenResult<Tenant> {
        self.db
            .query(
                "UPDATE type::record('tenant', $id) SET \
                 is_active = false, deleted_at = $at, updated_at = time::now()",
            )
            .bind(("id", id.to_string()))
            .bind(("at", at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        self.get_by_id(id).await
    }

    async fn summaries(&self) -> WardenResult<Vec<TenantSummary>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, slug, name, description, is_active, \
                 array::len(array::distinct(\
                     (SELECT VALUE in FROM has_role WHERE tenant_id = meta::id($parent.id))\
                 )) AS member_count \
                 FROM tenant WHERE deleted_at = NONE ORDER BY name ASC",
            )
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SummaryRow> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| -> WardenResult<TenantSummary> {
                Ok(TenantSummary {
                    id: parse_uuid(&row.record_id, "tenant id")?,
                    slug: row.slug,
                    name: row.name,
                    description: row.description,
                    is_active: row.is_active,
                    member_count: row.member_count,
                })
            })
            .collect()
    }
}
