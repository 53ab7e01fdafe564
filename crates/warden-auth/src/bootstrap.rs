//! First-run bootstrap.
//!
//! When the store holds no users, the server arms an ephemeral setup
//! credential that lives only in process memory. Presenting it once,
//! before the setup window closes, creates the root tenant, the `ROOT`
//! role and the first administrator.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};
use warden_core::clock::Clock;
use warden_core::error::{PasswordWeakness, RuleViolation, WardenError, WardenResult};
use warden_core::models::policy::RuleCode;
use warden_core::models::role::{CreateRole, ROOT_ROLE};
use warden_core::models::tenant::{CreateTenant, Tenant};
use warden_core::models::user::{CreateProfile, CreateUser, User, normalize_email};
use warden_core::repository::{Repositories, RoleRepository, TenantRepository, UserRepository};
use warden_core::uow::UnitOfWork;

use crate::config::{AuthConfig, lifetime, render_link};
use crate::password;
use crate::token::{digests_match, generate_secret};

enum SetupState {
    Uninitialised,
    Armed {
        secret: String,
        expires_at: DateTime<Utc>,
    },
    Consumed,
}

/// What the operator needs to finish setup.
#[derive(Debug, Clone)]
pub struct SetupInvitation {
    pub token: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RootAccount {
    pub user: User,
    pub tenant: Tenant,
}

pub struct BootstrapCoordinator<R: Repositories> {
    repos: Arc<R>,
    config: AuthConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<SetupState>,
}

impl<R: Repositories> BootstrapCoordinator<R> {
    pub fn new(repos: Arc<R>, config: AuthConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            repos,
            config,
            clock,
            state: Mutex::new(SetupState::Uninitialised),
        }
    }

    /// Arm a fresh setup credential if no user exists yet.
    pub async fn initialize(&self, setup_base_url: &str) -> WardenResult<Option<SetupInvitation>> {
        if !self.is_first_run().await? {
            info!("System already initialized, setup disabled");
            return Ok(None);
        }

        let mut state = self.state.lock().await;
        let token = generate_secret();
        let expires_at = self.clock.now() + lifetime(self.config.setup_window_secs)?;
        let url = render_link(setup_base_url, &token);
        *state = SetupState::Armed {
            secret: token.clone(),
            expires_at,
        };

        warn!(
            setup_url = %url,
            expires_at = %expires_at,
            "No users found. Open the setup URL to create the root account"
        );
        Ok(Some(SetupInvitation {
            token,
            url,
            expires_at,
        }))
    }

    pub async fn is_first_run(&self) -> WardenResult<bool> {
        Ok(self.repos.users().count().await? == 0)
    }

    /// Check a presented setup credential without consuming it.
    pub async fn validate(&self, token: &str) -> WardenResult<()> {
        let state = self.state.lock().await;
        check(&state, token, self.clock.now())
    }

    /// Create the root account. Succeeds at most once per process; the
    /// store-level first-run guard covers other processes.
    pub async fn complete_setup(
        &self,
        token: &str,
        email: &str,
        password: &str,
    ) -> WardenResult<RootAccount> {
        let mut state = self.state.lock().await;
        check(&state, token, self.clock.now())?;

        let email = normalize_email(email);
        if email.is_empty() {
            return Err(WardenError::validation("email must not be empty"));
        }
        let min = self.config.min_password_length;
        if password.chars().count() < min {
            return Err(RuleViolation::WeakPassword {
                reason: PasswordWeakness::TooShort { min },
            }
            .into());
        }

        let pepper = self.config.pepper.as_deref();
        let slug = self.config.root_tenant_slug.clone();
        let existing_tenant = self.repos.tenants().find_by_slug(&slug).await?;
        let existing_role = self.repos.roles().find_by_name(ROOT_ROLE).await?;
        let password_hash = password::hash_password(password, pepper)?;
        let tenant_secret_hash = password::hash_password(&generate_secret(), pepper)?;

        let result = self
            .repos
            .uow()
            .within(|tx| {
                tx.require_no_users();
                let tenant_id = match &existing_tenant {
                    Some(tenant) => tenant.id,
                    None => {
                        let id = tx.tenants().create(CreateTenant {
                            slug: slug.clone(),
                            name: "Warden Root".into(),
                            description: "System administration".into(),
                            secret_hash: tenant_secret_hash,
                            is_active: true,
                        });
                        tx.rules().upsert(
                            id,
                            RuleCode::SelfRegister,
                            serde_json::json!({ "allow": false }),
                            true,
                        );
                        id
                    }
                };
                let role_id = match &existing_role {
                    Some(role) => role.id,
                    None => tx.roles().create(CreateRole {
                        name: ROOT_ROLE.into(),
                        description: "System administrator".into(),
                    }),
                };
                let user_id = tx.users().create(
                    CreateUser {
                        email,
                        password_hash,
                        is_active: true,
                        is_verified: true,
                    },
                    CreateProfile {
                        first_name: "System".into(),
                        last_name: "Root".into(),
                        ..Default::default()
                    },
                );
                tx.assignments().assign(user_id, tenant_id, role_id);
                Ok((user_id, tenant_id))
            })
            .await;

        let (user_id, tenant_id) = match result {
            Ok(ids) => ids,
            Err(WardenError::AlreadyInitialized) => {
                *state = SetupState::Consumed;
                warn!("Setup attempted on an initialized system, credential discarded");
                return Err(WardenError::AlreadyInitialized);
            }
            Err(e) => return Err(e),
        };
        *state = SetupState::Consumed;
        info!(user_id = %user_id, tenant = %slug, "Root account created, setup credential discarded");

        let user = self.repos.users().get_by_id(user_id).await?;
        let tenant = self.repos.tenants().get_by_id(tenant_id).await?;
        Ok(RootAccount { user, tenant })
    }
}

fn check(state: &SetupState, token: &str, now: DateTime<Utc>) -> WardenResult<()> {
    let SetupState::Armed { secret, expires_at } = state else {
        return Err(WardenError::SetupTokenInvalid);
    };
    if !digests_match(secret, token.trim()) {
        return Err(WardenError::SetupTokenInvalid);
    }
    if now >= *expires_at {
        return Err(WardenError::SetupTokenExpired);
    }
    Ok(())
}
