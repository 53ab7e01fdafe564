//! Authentication configuration.

use chrono::Duration;
use warden_core::error::{WardenError, WardenResult};

/// HTTP-only cookie that carries the identity token for browser sessions.
pub const TOKEN_COOKIE_NAME: &str = "warden_token";

/// Placeholder replaced by the plaintext secret in link templates.
pub const TOKEN_PLACEHOLDER: &str = "{token}";

/// What happens to an existing identity's verification state when it
/// registers with another tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistingIdentityPolicy {
    /// Keep `is_verified` as is. A fresh verification token is still
    /// issued.
    #[default]
    KeepVerification,
    /// Reset `is_verified` to false in the same unit of work as the
    /// assignment.
    RequireReverification,
}

/// Configuration for the authentication services.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// PEM-encoded Ed25519 private key for token signing.
    pub jwt_private_key_pem: String,
    /// PEM-encoded Ed25519 public key for token verification.
    pub jwt_public_key_pem: String,
    /// Token issuer (`iss` claim).
    pub jwt_issuer: String,
    /// Tenant login token lifetime in seconds (default: 86_400 = 24 hours).
    pub tenant_token_lifetime_secs: u64,
    /// Admin login token lifetime in seconds (default: 43_200 = 12 hours).
    pub admin_token_lifetime_secs: u64,
    /// Email verification token lifetime (default: 24 hours).
    pub verification_token_lifetime_secs: u64,
    /// Password reset token lifetime (default: 1 hour).
    pub reset_token_lifetime_secs: u64,
    /// Minimum spacing between reset requests per user (default: 15 minutes).
    pub reset_cooldown_secs: u64,
    /// Lifetime of the first-run setup credential (default: 2 hours).
    pub setup_window_secs: u64,
    /// Optional pepper prepended to passwords before Argon2id hashing.
    pub pepper: Option<String>,
    /// Minimum length for passwords chosen through a reset.
    pub min_password_length: usize,
    /// Slug of the tenant whose `ROOT` holders administer the system.
    pub root_tenant_slug: String,
    /// Email verification link, with a `{token}` placeholder.
    pub verify_url_template: String,
    /// Password reset link, with a `{token}` placeholder.
    pub reset_url_template: String,
    pub existing_identity_policy: ExistingIdentityPolicy,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_private_key_pem: String::new(),
            jwt_public_key_pem: String::new(),
            jwt_issuer: "warden".into(),
            tenant_token_lifetime_secs: 86_400,
            admin_token_lifetime_secs: 43_200,
            verification_token_lifetime_secs: 86_400,
            reset_token_lifetime_secs: 3_600,
            reset_cooldown_secs: 900,
            setup_window_secs: 7_200,
            pepper: None,
            min_password_length: 8,
            root_tenant_slug: "warden-root".into(),
            verify_url_template: "http://localhost:8080/verify?token={token}".into(),
            reset_url_template: "http://localhost:8080/reset-password?token={token}".into(),
            existing_identity_policy: ExistingIdentityPolicy::default(),
        }
    }
}

/// Convert a configured lifetime in seconds into a [`Duration`].
pub(crate) fn lifetime(secs: u64) -> WardenResult<Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| WardenError::validation(format!("lifetime of {secs}s is out of range")))
}

/// Substitute the plaintext secret into a link template. Templates
/// without a placeholder get the token appended as a query parameter.
pub fn render_link(template: &str, token: &str) -> String {
    if template.contains(TOKEN_PLACEHOLDER) {
        template.replace(TOKEN_PLACEHOLDER, token)
    } else if template.contains('?') {
        format!("{template}&token={token}")
    } else {
        format!("{template}?token={token}")
    }
}
