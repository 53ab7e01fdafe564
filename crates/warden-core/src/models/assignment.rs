//! User × tenant × role assignments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role_id: Uuid,
    pub role_name: String,
    pub created_at: DateTime<Utc>,
}

/// A user as listed on a tenant's membership page, one row per role held.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantMember {
    pub user_id: Uuid,
    pub email: String,
    pub is_verified: bool,
    pub is_active: bool,
    pub first_name: String,
    pub last_name: String,
    pub role_name: String,
}
