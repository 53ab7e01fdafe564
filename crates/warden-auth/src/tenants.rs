//! Tenant directory: resolution, client credentials, lifecycle, rules,
//! membership and the role catalogue.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;
use warden_core::clock::Clock;
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::assignment::TenantMember;
use warden_core::models::policy::{PolicyRule, RuleCode};
use warden_core::models::role::{CreateRole, Role, normalize_role_name};
use warden_core::models::tenant::{
    CreateTenant, Tenant, TenantSummary, client_credentials, slugify,
};
use warden_core::models::user::{CreateProfile, CreateUser, normalize_email};
use warden_core::repository::{
    PolicyRuleRepository, Repositories, RoleAssignmentRepository, RoleRepository,
    TenantRepository, UserRepository,
};
use warden_core::uow::UnitOfWork;

use crate::config::AuthConfig;
use crate::password;
use crate::rules::RulePolicy;
use crate::token::generate_secret;

/// Look up a tenant that may currently be used for logins and
/// registrations.
pub(crate) async fn resolve_usable<R: Repositories>(repos: &R, slug: &str) -> WardenResult<Tenant> {
    let tenant = repos
        .tenants()
        .find_by_slug(slug)
        .await?
        .ok_or_else(|| WardenError::UnknownTenant { slug: slug.into() })?;
    if !tenant.is_usable() {
        return Err(WardenError::TenantInactive { slug: slug.into() });
    }
    Ok(tenant)
}

/// A newly created tenant and its plaintext secret, shown once.
#[derive(Debug, Clone)]
pub struct CreatedTenant {
    pub tenant: Tenant,
    pub secret: String,
}

/// Result of an admin-side enrolment.
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub user_id: Uuid,
    /// True when the email was unknown and a placeholder identity was
    /// created for it.
    pub created_identity: bool,
}

enum Identity {
    Existing(Uuid),
    Placeholder(CreateUser),
}

pub struct TenantDirectory<R: Repositories> {
    repos: Arc<R>,
    config: AuthConfig,
    clock: Arc<dyn Clock>,
}

impl<R: Repositories> Clone for TenantDirectory<R> {
    fn clone(&self) -> Self {
        Self {
            repos: Arc::clone(&self.repos),
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<R: Repositories> TenantDirectory<R> {
    pub fn new(repos: Arc<R>, config: AuthConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            repos,
            config,
            clock,
        }
    }

    /// Active, non-deleted tenant by slug.
    pub async fn resolve(&self, slug: &str) -> WardenResult<Tenant> {
        resolve_usable(self.repos.as_ref(), slug).await
    }

    /// Authenticate a client application from its request headers
    /// (`X-App-Id` and `X-App-Secret`).
    pub async fn authenticate_headers<'a, I>(&self, headers: I) -> WardenResult<Tenant>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let Some((slug, secret)) = client_credentials(headers) else {
            warn!("Client call without credentials");
            return Err(WardenError::InvalidCredentials);
        };
        self.authenticate_client(slug, secret).await
    }

    /// Check the credential pair a client application presents.
    pub async fn authenticate_client(&self, slug: &str, secret: &str) -> WardenResult<Tenant> {
        let pepper = self.config.pepper.as_deref();
        let Some(tenant) = self.repos.tenants().find_by_slug(slug).await? else {
            password::verify_dummy(secret, pepper);
            warn!(tenant = %slug, "Client authentication for unknown tenant");
            return Err(WardenError::InvalidCredentials);
        };

        if !password::verify_password(secret, &tenant.secret_hash, pepper)? {
            warn!(tenant = %slug, "Client authentication with wrong secret");
            return Err(WardenError::InvalidCredentials);
        }
        if !tenant.is_usable() {
            return Err(WardenError::TenantInactive { slug: slug.into() });
        }
        Ok(tenant)
    }

    /// Register a new tenant with a generated secret and the default
    /// `SELF_REGISTER {allow: true}` rule.
    pub async fn create_tenant(
        &self,
        name: &str,
        description: &str,
        is_active: bool,
    ) -> WardenResult<CreatedTenant> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(WardenError::validation(
                "tenant name must contain at least one letter or digit",
            ));
        }
        if self.repos.tenants().find_by_slug(&slug).await?.is_some() {
            return Err(WardenError::AlreadyExists {
                entity: "tenant".into(),
            });
        }

        let secret = generate_secret();
        let secret_hash = password::hash_password(&secret, self.config.pepper.as_deref())?;
        let input = CreateTenant {
            slug: slug.clone(),
            name: name.trim().to_string(),
            description: description.trim().to_string(),
            secret_hash,
            is_active,
        };

        let tenant_id = self
            .repos
            .uow()
            .within(|tx| {
                let id = tx.tenants().create(input);
                tx.rules().upsert(
                    id,
                    RuleCode::SelfRegister,
                    serde_json::json!({ "allow": true }),
                    true,
                );
                Ok(id)
            })
            .await?;

        info!(tenant = %slug, tenant_id = %tenant_id, "Tenant created");
        let tenant = self.repos.tenants().get_by_id(tenant_id).await?;
        Ok(CreatedTenant { tenant, secret })
    }

    pub async fn set_active(&self, slug: &str, active: bool) -> WardenResult<Tenant> {
        let tenant = self.managed(slug).await?;
        let tenant = self.repos.tenants().set_active(tenant.id, active).await?;
        info!(tenant = %slug, active, "Tenant activation changed");
        Ok(tenant)
    }

    pub async fn soft_delete(&self, slug: &str) -> WardenResult<Tenant> {
        let tenant = self.managed(slug).await?;
        let tenant = self
            .repos
            .tenants()
            .soft_delete(tenant.id, self.clock.now())
            .await?;
        info!(tenant = %slug, "Tenant deleted");
        Ok(tenant)
    }

    /// Create or replace the tenant's rule for `code`. The payload is
    /// validated before anything is written.
    pub async fn set_rule(
        &self,
        slug: &str,
        code: RuleCode,
        value: serde_json::Value,
        is_active: bool,
    ) -> WardenResult<PolicyRule> {
        RulePolicy::parse(code, &value)?;
        let tenant = self.managed(slug).await?;

        self.repos
            .uow()
            .within(|tx| {
                tx.rules().upsert(tenant.id, code, value, is_active);
                Ok(())
            })
            .await?;
        info!(tenant = %slug, code = %code, is_active, "Tenant rule updated");

        self.repos
            .rules()
            .list(tenant.id)
            .await?
            .into_iter()
            .find(|r| r.code == code)
            .ok_or_else(|| WardenError::NotFound {
                entity: "policy_rule".into(),
                id: format!("{slug}/{code}"),
            })
    }

    pub async fn rules(&self, slug: &str) -> WardenResult<Vec<PolicyRule>> {
        let tenant = self.managed(slug).await?;
        self.repos.rules().list(tenant.id).await
    }

    pub async fn members(&self, slug: &str) -> WardenResult<Vec<TenantMember>> {
        let tenant = self.managed(slug).await?;
        self.repos.assignments().members(tenant.id).await
    }

    pub async fn dashboard(&self) -> WardenResult<Vec<TenantSummary>> {
        self.repos.tenants().summaries().await
    }

    /// Give `email` the role `role_name` in the tenant. Unknown emails
    /// get a placeholder identity that must be verified before use.
    pub async fn enroll_member(
        &self,
        slug: &str,
        email: &str,
        role_name: &str,
    ) -> WardenResult<Enrollment> {
        let tenant = self.managed(slug).await?;
        let role_name = normalize_role_name(role_name);
        let role = self
            .repos
            .roles()
            .find_by_name(&role_name)
            .await?
            .ok_or_else(|| WardenError::NotFound {
                entity: "role".into(),
                id: role_name.clone(),
            })?;

        let email = normalize_email(email);
        if email.is_empty() {
            return Err(WardenError::validation("email must not be empty"));
        }
        let existing = self.repos.users().find_by_email(&email).await?;

        let identity = match existing {
            Some(user) => Identity::Existing(user.id),
            None => {
                let password_hash =
                    password::hash_password(&generate_secret(), self.config.pepper.as_deref())?;
                Identity::Placeholder(CreateUser {
                    email: email.clone(),
                    password_hash,
                    is_active: true,
                    is_verified: false,
                })
            }
        };
        let created_identity = matches!(identity, Identity::Placeholder(_));

        let user_id = self
            .repos
            .uow()
            .within(|tx| {
                let user_id = match identity {
                    Identity::Existing(id) => id,
                    Identity::Placeholder(user) => tx.users().create(
                        user,
                        CreateProfile {
                            first_name: "Invited".into(),
                            last_name: "User".into(),
                            ..Default::default()
                        },
                    ),
                };
                tx.assignments().assign(user_id, tenant.id, role.id);
                Ok(user_id)
            })
            .await?;

        info!(
            tenant = %slug,
            user_id = %user_id,
            role = %role.name,
            created_identity,
            "Member enrolled"
        );
        Ok(Enrollment {
            user_id,
            created_identity,
        })
    }

    pub async fn create_role(&self, name: &str, description: &str) -> WardenResult<Role> {
        let name = normalize_role_name(name);
        if name.is_empty() {
            return Err(WardenError::validation("role name must not be empty"));
        }
        if self.repos.roles().find_by_name(&name).await?.is_some() {
            return Err(WardenError::AlreadyExists {
                entity: "role".into(),
            });
        }

        let input = CreateRole {
            name: name.clone(),
            description: description.trim().to_string(),
        };
        self.repos
            .uow()
            .within(|tx| Ok(tx.roles().create(input)))
            .await?;
        info!(role = %name, "Role created");

        self.repos
            .roles()
            .find_by_name(&name)
            .await?
            .ok_or_else(|| WardenError::NotFound {
                entity: "role".into(),
                id: name,
            })
    }

    pub async fn roles(&self) -> WardenResult<Vec<Role>> {
        self.repos.roles().list().await
    }

    /// Existing, non-deleted tenant regardless of its active flag.
    async fn managed(&self, slug: &str) -> WardenResult<Tenant> {
        match self.repos.tenants().find_by_slug(slug).await? {
            Some(tenant) if tenant.deleted_at.is_none() => Ok(tenant),
            _ => Err(WardenError::UnknownTenant { slug: slug.into() }),
        }
    }
}
