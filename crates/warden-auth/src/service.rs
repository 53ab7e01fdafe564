//! Authentication service: login, registration, email verification and
//! password reset.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;
use warden_core::clock::Clock;
use warden_core::error::{PasswordWeakness, RuleViolation, TokenError, WardenError, WardenResult};
use warden_core::models::role::ROOT_ROLE;
use warden_core::models::secret_token::{CreateSecretToken, SecretToken, TokenPurpose};
use warden_core::models::user::{CreateProfile, CreateUser, UpdateUser, User, normalize_email};
use warden_core::notifier::{Notification, OutboundNotifier};
use warden_core::repository::{
    Repositories, RoleAssignmentRepository, SecretTokenRepository, UserRepository,
};
use warden_core::uow::UnitOfWork;

use crate::config::{AuthConfig, ExistingIdentityPolicy, lifetime, render_link};
use crate::password;
use crate::rules::RuleEvaluator;
use crate::tenants::resolve_usable;
use crate::token::{
    IssuedSecret, SealedSecret, TokenCodec, VerifiedIdentity, digests_match, parse_secret_token,
    salted_digest, token_from_cookie,
};

/// Input for the tenant login flow.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub tenant_slug: String,
    pub email: String,
    pub password: String,
}

/// A signed identity token and what it was issued for.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub tenant_slug: String,
}

#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub tenant_slug: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    pub user: User,
    /// Verification secret; the same value is sent through the notifier.
    pub verification: IssuedSecret,
    /// True when an identity from another tenant joined this one.
    pub joined_existing: bool,
}

/// Steps of a login attempt, logged as they complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginState {
    CredentialsChecked,
    TenantResolved,
    PolicyChecked,
    TokenIssued,
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CredentialsChecked => "credentials_checked",
            Self::TenantResolved => "tenant_resolved",
            Self::PolicyChecked => "policy_checked",
            Self::TokenIssued => "token_issued",
        })
    }
}

enum Registrant {
    Existing(Uuid),
    New(CreateUser, CreateProfile),
}

/// Authentication service.
///
/// Generic over the repository bundle so that the auth layer has no
/// dependency on the database crate.
pub struct AuthService<R: Repositories, N: OutboundNotifier> {
    repos: Arc<R>,
    codec: Arc<TokenCodec>,
    rules: RuleEvaluator<R>,
    notifier: Arc<N>,
    config: AuthConfig,
    clock: Arc<dyn Clock>,
}

impl<R: Repositories, N: OutboundNotifier> Clone for AuthService<R, N> {
    fn clone(&self) -> Self {
        Self {
            repos: Arc::clone(&self.repos),
            codec: Arc::clone(&self.codec),
            rules: self.rules.clone(),
            notifier: Arc::clone(&self.notifier),
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<R: Repositories, N: OutboundNotifier> AuthService<R, N> {
    pub fn new(
        repos: Arc<R>,
        codec: Arc<TokenCodec>,
        notifier: Arc<N>,
        config: AuthConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rules: RuleEvaluator::new(Arc::clone(&repos)),
            repos,
            codec,
            notifier,
            config,
            clock,
        }
    }

    /// Authenticate against a tenant and issue an identity token for it.
    pub async fn login(&self, request: LoginRequest) -> WardenResult<IssuedToken> {
        let slug = request.tenant_slug.as_str();
        let user = self
            .check_credentials(&request.email, &request.password)
            .await?;
        trace_login(LoginState::CredentialsChecked, slug, user.id);

        let tenant = resolve_usable(self.repos.as_ref(), slug).await?;
        trace_login(LoginState::TenantResolved, slug, user.id);

        self.rules.evaluate_login(tenant.id, user.id).await?;
        trace_login(LoginState::PolicyChecked, slug, user.id);

        let issued = self.issue_token(&user, &tenant.slug, self.config.tenant_token_lifetime_secs)?;
        trace_login(LoginState::TokenIssued, slug, user.id);

        self.touch_last_login(user.id).await;
        Ok(issued)
    }

    /// Log into the administration surface. The user must hold `ROOT` in
    /// the root tenant.
    pub async fn admin_login(&self, email: &str, password: &str) -> WardenResult<IssuedToken> {
        let user = self.check_credentials(email, password).await?;
        let slug = self.config.root_tenant_slug.as_str();

        let tenant = match resolve_usable(self.repos.as_ref(), slug).await {
            Ok(tenant) => tenant,
            Err(WardenError::UnknownTenant { .. } | WardenError::TenantInactive { .. }) => {
                warn!(user_id = %user.id, "Admin login without a usable root tenant");
                return Err(WardenError::Forbidden);
            }
            Err(e) => return Err(e),
        };

        let roles = self
            .repos
            .assignments()
            .role_names(user.id, tenant.id)
            .await?;
        if !roles.iter().any(|r| r.eq_ignore_ascii_case(ROOT_ROLE)) {
            warn!(user_id = %user.id, "Admin login by a user without ROOT");
            return Err(WardenError::Forbidden);
        }

        let issued = self.issue_token(&user, &tenant.slug, self.config.admin_token_lifetime_secs)?;
        info!(user_id = %user.id, "Admin logged in");
        self.touch_last_login(user.id).await;
        Ok(issued)
    }

    /// Verify a bearer or cookie token.
    pub fn authenticate(&self, token: &str) -> WardenResult<VerifiedIdentity> {
        Ok(self.codec.verify_at(token, self.clock.now())?)
    }

    /// Verify the identity token carried in a `Cookie` header.
    pub fn authenticate_cookie(&self, cookie_header: &str) -> WardenResult<VerifiedIdentity> {
        let token = token_from_cookie(cookie_header).ok_or(TokenError::Malformed)?;
        self.authenticate(token)
    }

    /// Register `email` in a tenant, or let an identity from another
    /// tenant join it, and issue an email verification secret.
    pub async fn register(&self, request: RegistrationRequest) -> WardenResult<RegistrationOutcome> {
        let tenant = resolve_usable(self.repos.as_ref(), &request.tenant_slug).await?;
        let email = normalize_email(&request.email);
        if email.is_empty() {
            return Err(WardenError::validation("email must not be empty"));
        }
        let pepper = self.config.pepper.as_deref();

        let existing = self.repos.users().find_by_email(&email).await?;
        if let Some(user) = &existing {
            let roles = self
                .repos
                .assignments()
                .role_names(user.id, tenant.id)
                .await?;
            if !roles.is_empty() {
                return Err(WardenError::AlreadyRegisteredInTenant);
            }
        }

        let decision = self
            .rules
            .evaluate_registration(tenant.id, &request.password)
            .await?;

        // Joining another tenant needs the identity's own password.
        if let Some(user) = &existing {
            if !password::verify_password(&request.password, &user.password_hash, pepper)? {
                warn!(tenant = %tenant.slug, user_id = %user.id, "Join attempt with wrong password");
                return Err(WardenError::InvalidCredentials);
            }
        }

        let registrant = match &existing {
            Some(user) => Registrant::Existing(user.id),
            None => Registrant::New(
                CreateUser {
                    email: email.clone(),
                    password_hash: password::hash_password(&request.password, pepper)?,
                    is_active: true,
                    is_verified: false,
                },
                CreateProfile {
                    first_name: request.first_name.trim().to_string(),
                    last_name: request.last_name.trim().to_string(),
                    ..Default::default()
                },
            ),
        };
        let joined_existing = existing.is_some();
        let reverify = self.config.existing_identity_policy
            == ExistingIdentityPolicy::RequireReverification;

        let now = self.clock.now();
        let expires_at = now + lifetime(self.config.verification_token_lifetime_secs)?;
        let sealed = SealedSecret::generate();

        let (user_id, token_id) = self
            .repos
            .uow()
            .within(|tx| {
                let user_id = match registrant {
                    Registrant::Existing(id) => {
                        if reverify {
                            tx.users().set_verified(id, false);
                        }
                        id
                    }
                    Registrant::New(user, profile) => tx.users().create(user, profile),
                };
                tx.assignments()
                    .assign(user_id, tenant.id, decision.default_role.id);
                let token_id = tx.verifications().issue(CreateSecretToken {
                    user_id,
                    salt: sealed.salt.clone(),
                    token_hash: sealed.digest.clone(),
                    expires_at,
                    created_at: now,
                });
                Ok((user_id, token_id))
            })
            .await?;

        info!(
            tenant = %tenant.slug,
            user_id = %user_id,
            role = %decision.default_role.name,
            joined_existing,
            "User registered"
        );

        let plaintext = sealed.plaintext(token_id);
        self.deliver(Notification::EmailVerification {
            email,
            link: render_link(&self.config.verify_url_template, &plaintext),
        })
        .await;

        let user = self.repos.users().get_by_id(user_id).await?;
        Ok(RegistrationOutcome {
            user,
            verification: IssuedSecret {
                token_id,
                plaintext,
                expires_at,
            },
            joined_existing,
        })
    }

    /// Redeem an email verification secret.
    pub async fn verify_email(&self, token: &str) -> WardenResult<User> {
        let now = self.clock.now();
        let record = self
            .redeemable(TokenPurpose::EmailVerification, token, now)
            .await?;

        self.repos
            .uow()
            .within(|tx| {
                tx.verifications().consume(record.id, now);
                tx.users().set_verified(record.user_id, true);
                Ok(())
            })
            .await?;

        info!(user_id = %record.user_id, "Email verified");
        self.repos.users().get_by_id(record.user_id).await
    }

    /// Start a password reset. Unknown and unverified emails yield `None`
    /// so callers cannot tell them apart.
    pub async fn request_password_reset(&self, email: &str) -> WardenResult<Option<IssuedSecret>> {
        let email = normalize_email(email);
        let user = match self.repos.users().find_by_email(&email).await? {
            Some(user) if user.is_verified => user,
            Some(user) => {
                info!(user_id = %user.id, "Password reset requested for unverified user");
                return Ok(None);
            }
            None => {
                info!("Password reset requested for unknown email");
                return Ok(None);
            }
        };

        let now = self.clock.now();
        let since = now - lifetime(self.config.reset_cooldown_secs)?;
        let open = self
            .repos
            .tokens()
            .count_open_since(TokenPurpose::PasswordReset, user.id, since, now)
            .await?;
        if open > 0 {
            warn!(user_id = %user.id, "Password reset rate limited");
            return Err(WardenError::RateLimited);
        }

        let expires_at = now + lifetime(self.config.reset_token_lifetime_secs)?;
        let sealed = SealedSecret::generate();
        let token_id = self
            .repos
            .uow()
            .within(|tx| {
                Ok(tx.resets().issue_with_cooldown(
                    CreateSecretToken {
                        user_id: user.id,
                        salt: sealed.salt.clone(),
                        token_hash: sealed.digest.clone(),
                        expires_at,
                        created_at: now,
                    },
                    since,
                ))
            })
            .await?;

        info!(user_id = %user.id, "Password reset issued");

        let plaintext = sealed.plaintext(token_id);
        self.deliver(Notification::PasswordReset {
            email,
            link: render_link(&self.config.reset_url_template, &plaintext),
        })
        .await;

        Ok(Some(IssuedSecret {
            token_id,
            plaintext,
            expires_at,
        }))
    }

    /// Redeem a reset secret and replace the user's password.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> WardenResult<()> {
        let now = self.clock.now();
        let record = self
            .redeemable(TokenPurpose::PasswordReset, token, now)
            .await?;

        let min = self.config.min_password_length;
        if new_password.chars().count() < min {
            return Err(RuleViolation::WeakPassword {
                reason: PasswordWeakness::TooShort { min },
            }
            .into());
        }
        let password_hash = password::hash_password(new_password, self.config.pepper.as_deref())?;

        self.repos
            .uow()
            .within(|tx| {
                tx.resets().consume(record.id, now);
                tx.users().set_password_hash(record.user_id, password_hash);
                Ok(())
            })
            .await?;

        info!(user_id = %record.user_id, "Password reset completed");
        Ok(())
    }

    /// Email/password check shared by both login flows.
    async fn check_credentials(&self, email: &str, password: &str) -> WardenResult<User> {
        let email = normalize_email(email);
        let pepper = self.config.pepper.as_deref();

        let Some(user) = self.repos.users().find_by_email(&email).await? else {
            password::verify_dummy(password, pepper);
            return Err(WardenError::InvalidCredentials);
        };
        if !password::verify_password(password, &user.password_hash, pepper)? {
            return Err(WardenError::InvalidCredentials);
        }
        if !user.is_verified {
            return Err(WardenError::UnverifiedUser);
        }
        if !user.is_active {
            return Err(WardenError::InactiveUser);
        }
        Ok(user)
    }

    fn issue_token(
        &self,
        user: &User,
        tenant_slug: &str,
        lifetime_secs: u64,
    ) -> WardenResult<IssuedToken> {
        let issued_at = self.clock.now();
        let ttl = lifetime(lifetime_secs)?;
        let token = self
            .codec
            .issue_at(user.id, &user.email, tenant_slug, ttl, issued_at)?;
        Ok(IssuedToken {
            token,
            expires_at: issued_at + ttl,
            user_id: user.id,
            tenant_slug: tenant_slug.to_string(),
        })
    }

    async fn touch_last_login(&self, user_id: Uuid) {
        let update = UpdateUser {
            last_login: Some(self.clock.now()),
            ..Default::default()
        };
        if let Err(e) = self.repos.users().update(user_id, update).await {
            warn!(user_id = %user_id, error = %e, "Failed to record last login");
        }
    }

    /// Look up a single-use secret and check it can still be redeemed.
    async fn redeemable(
        &self,
        purpose: TokenPurpose,
        token: &str,
        now: DateTime<Utc>,
    ) -> WardenResult<SecretToken> {
        let (id, secret) = parse_secret_token(token)?;
        let Some(record) = self.repos.tokens().find(purpose, id).await? else {
            return Err(TokenError::InvalidSignature.into());
        };
        if !digests_match(&salted_digest(&record.salt, secret), &record.token_hash) {
            return Err(TokenError::InvalidSignature.into());
        }
        if record.is_spent() {
            return Err(TokenError::InvalidSignature.into());
        }
        if record.is_expired(now) {
            return Err(TokenError::Expired.into());
        }
        Ok(record)
    }

    async fn deliver(&self, notification: Notification) {
        let kind = notification.kind();
        if let Err(e) = self.notifier.notify(notification).await {
            warn!(kind, error = %e, "Notification delivery failed");
        }
    }
}

fn trace_login(state: LoginState, tenant: &str, user_id: Uuid) {
    info!(tenant = %tenant, user_id = %user_id, state = %state, "Login progressed");
}
