//! Role-based authorization within a tenant.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;
use warden_core::clock::Clock;
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::role::{ADMIN_ROLE, normalize_role_name};
use warden_core::repository::{Repositories, RoleAssignmentRepository};

use crate::tenants::resolve_usable;
use crate::token::{TokenCodec, VerifiedIdentity};

/// A successful authorization decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    /// Every role the user holds in the tenant.
    pub roles: Vec<String>,
    /// True when access came from the `ADMIN` override rather than a
    /// listed role.
    pub via_admin: bool,
}

impl Grant {
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(name))
    }
}

pub struct RbacGuard<R: Repositories> {
    repos: Arc<R>,
    codec: Arc<TokenCodec>,
    clock: Arc<dyn Clock>,
}

impl<R: Repositories> Clone for RbacGuard<R> {
    fn clone(&self) -> Self {
        Self {
            repos: Arc::clone(&self.repos),
            codec: Arc::clone(&self.codec),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<R: Repositories> RbacGuard<R> {
    pub fn new(repos: Arc<R>, codec: Arc<TokenCodec>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repos,
            codec,
            clock,
        }
    }

    /// Allow the user when they hold any of `required` in the tenant, or
    /// hold `ADMIN` there.
    pub async fn authorize(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        required: &[&str],
    ) -> WardenResult<Grant> {
        if required.is_empty() {
            return Err(WardenError::validation(
                "authorization requires at least one role",
            ));
        }

        let roles = self
            .repos
            .assignments()
            .role_names(user_id, tenant_id)
            .await?;
        if roles.is_empty() {
            debug!(user_id = %user_id, tenant_id = %tenant_id, "No roles in tenant");
            return Err(WardenError::NoRolesInTenant);
        }

        let required: Vec<String> = required.iter().map(|r| normalize_role_name(r)).collect();
        let listed = roles
            .iter()
            .any(|held| required.iter().any(|r| held.eq_ignore_ascii_case(r)));
        let admin = roles.iter().any(|held| held.eq_ignore_ascii_case(ADMIN_ROLE));

        if !listed && !admin {
            debug!(
                user_id = %user_id,
                tenant_id = %tenant_id,
                required = ?required,
                "Authorization denied"
            );
            return Err(WardenError::Forbidden);
        }

        Ok(Grant {
            user_id,
            tenant_id,
            roles,
            via_admin: !listed,
        })
    }

    /// Verify an identity token, resolve its tenant, then authorize.
    pub async fn authorize_token(
        &self,
        token: &str,
        required: &[&str],
    ) -> WardenResult<(VerifiedIdentity, Grant)> {
        let identity = self.codec.verify_at(token, self.clock.now())?;
        let tenant = resolve_usable(self.repos.as_ref(), &identity.tenant_slug).await?;
        let grant = self.authorize(identity.user_id, tenant.id, required).await?;
        Ok((identity, grant))
    }
}
