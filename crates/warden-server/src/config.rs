//! Server configuration from CLI flags and environment.

use std::path::{Path, PathBuf};

use clap::Parser;
use thiserror::Error;
use warden_auth::config::{AuthConfig, ExistingIdentityPolicy};
use warden_db::{DbConfig, RootCredentials};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Warden identity provider configuration.
#[derive(Debug, Parser)]
#[command(name = "warden-server", about = "Warden multi-tenant identity provider", long_about = None)]
pub struct ServerConfig {
    /// Log filter used when `RUST_LOG` is unset
    #[arg(long, env = "WARDEN_LOG", default_value = "warden=info")]
    pub log_filter: String,

    /// SurrealDB WebSocket address
    #[arg(long, env = "WARDEN_DB_URL", default_value = "127.0.0.1:8000")]
    pub db_url: String,

    #[arg(long, env = "WARDEN_DB_NAMESPACE", default_value = "warden")]
    pub db_namespace: String,

    #[arg(long, env = "WARDEN_DB_DATABASE", default_value = "main")]
    pub db_database: String,

    #[arg(long, env = "WARDEN_DB_USERNAME", default_value = "root")]
    pub db_username: String,

    #[arg(long, env = "WARDEN_DB_PASSWORD", default_value = "root", hide_env_values = true)]
    pub db_password: String,

    /// Ed25519 private key (PEM) used to sign identity tokens
    #[arg(long, env = "WARDEN_JWT_PRIVATE_KEY_FILE")]
    pub jwt_private_key_file: PathBuf,

    /// Ed25519 public key (PEM) used to verify identity tokens
    #[arg(long, env = "WARDEN_JWT_PUBLIC_KEY_FILE")]
    pub jwt_public_key_file: PathBuf,

    #[arg(long, env = "WARDEN_JWT_ISSUER", default_value = "warden")]
    pub jwt_issuer: String,

    /// Secret prepended to passwords before hashing
    #[arg(long, env = "WARDEN_PEPPER", hide_env_values = true)]
    pub pepper: Option<String>,

    #[arg(long, env = "WARDEN_TENANT_TOKEN_TTL_SECS", default_value_t = 86_400)]
    pub tenant_token_ttl_secs: u64,

    #[arg(long, env = "WARDEN_ADMIN_TOKEN_TTL_SECS", default_value_t = 43_200)]
    pub admin_token_ttl_secs: u64,

    #[arg(long, env = "WARDEN_VERIFICATION_TTL_SECS", default_value_t = 86_400)]
    pub verification_ttl_secs: u64,

    #[arg(long, env = "WARDEN_RESET_TTL_SECS", default_value_t = 3_600)]
    pub reset_ttl_secs: u64,

    #[arg(long, env = "WARDEN_RESET_COOLDOWN_SECS", default_value_t = 900)]
    pub reset_cooldown_secs: u64,

    #[arg(long, env = "WARDEN_SETUP_WINDOW_SECS", default_value_t = 7_200)]
    pub setup_window_secs: u64,

    #[arg(long, env = "WARDEN_MIN_PASSWORD_LENGTH", default_value_t = 8)]
    pub min_password_length: usize,

    #[arg(long, env = "WARDEN_ROOT_TENANT", default_value = "warden-root")]
    pub root_tenant_slug: String,

    /// Email verification link; `{token}` is replaced by the secret
    #[arg(
        long,
        env = "WARDEN_VERIFY_URL",
        default_value = "http://localhost:8080/verify?token={token}"
    )]
    pub verify_url_template: String,

    /// Password reset link; `{token}` is replaced by the secret
    #[arg(
        long,
        env = "WARDEN_RESET_URL",
        default_value = "http://localhost:8080/reset-password?token={token}"
    )]
    pub reset_url_template: String,

    /// Base of the first-run setup link
    #[arg(long, env = "WARDEN_SETUP_URL", default_value = "http://localhost:8080/setup")]
    pub setup_base_url: String,

    /// Reset `is_verified` when an existing identity joins another tenant
    #[arg(long, env = "WARDEN_REQUIRE_REVERIFICATION")]
    pub require_reverification: bool,
}

impl ServerConfig {
    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            endpoint: self.db_url.clone(),
            namespace: self.db_namespace.clone(),
            database: self.db_database.clone(),
            credentials: RootCredentials {
                username: self.db_username.clone(),
                password: self.db_password.clone(),
            },
        }
    }

    /// Build the auth configuration, reading the key pair from disk.
    pub fn auth_config(&self) -> Result<AuthConfig, ConfigError> {
        Ok(AuthConfig {
            jwt_private_key_pem: read_pem(&self.jwt_private_key_file)?,
            jwt_public_key_pem: read_pem(&self.jwt_public_key_file)?,
            jwt_issuer: self.jwt_issuer.clone(),
            tenant_token_lifetime_secs: self.tenant_token_ttl_secs,
            admin_token_lifetime_secs: self.admin_token_ttl_secs,
            verification_token_lifetime_secs: self.verification_ttl_secs,
            reset_token_lifetime_secs: self.reset_ttl_secs,
            reset_cooldown_secs: self.reset_cooldown_secs,
            setup_window_secs: self.setup_window_secs,
            pepper: self.pepper.clone(),
            min_password_length: self.min_password_length,
            root_tenant_slug: self.root_tenant_slug.clone(),
            verify_url_template: self.verify_url_template.clone(),
            reset_url_template: self.reset_url_template.clone(),
            existing_identity_policy: if self.require_reverification {
                ExistingIdentityPolicy::RequireReverification
            } else {
                ExistingIdentityPolicy::KeepVerification
            },
        })
    }
}

fn read_pem(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::KeyFile {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> ServerConfig {
        let mut args = vec![
            "warden-server",
            "--jwt-private-key-file",
            "/keys/private.pem",
            "--jwt-public-key-file",
            "/keys/public.pem",
        ];
        args.extend_from_slice(extra);
        ServerConfig::try_parse_from(args).unwrap()
    }

    #[test]
    fn defaults_match_the_auth_defaults() {
        let config = parse(&[]);
        let defaults = AuthConfig::default();
        assert_eq!(config.tenant_token_ttl_secs, defaults.tenant_token_lifetime_secs);
        assert_eq!(config.admin_token_ttl_secs, defaults.admin_token_lifetime_secs);
        assert_eq!(config.reset_cooldown_secs, defaults.reset_cooldown_secs);
        assert_eq!(config.setup_window_secs, defaults.setup_window_secs);
        assert_eq!(config.root_tenant_slug, defaults.root_tenant_slug);
        assert_eq!(config.db_config().namespace, "warden");
    }

    #[test]
    fn missing_key_file_is_reported_with_its_path() {
        let config = parse(&["--jwt-private-key-file", "/definitely/not/here.pem"]);
        let err = config.auth_config().unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.pem"));
    }

    #[test]
    fn key_files_are_required() {
        assert!(ServerConfig::try_parse_from(["warden-server"]).is_err());
    }
}
