//! Warden Server: process entry point.
//!
//! Connects to SurrealDB, applies migrations, validates the signing keys
//! and arms first-run setup when the store holds no users.

mod config;

use std::process;
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use warden_auth::bootstrap::BootstrapCoordinator;
use warden_auth::error::AuthError;
use warden_auth::tenants::TenantDirectory;
use warden_auth::token::TokenCodec;
use warden_core::clock::{Clock, SystemClock};
use warden_core::error::WardenError;
use warden_db::{DbError, DbManager};

use crate::config::{ConfigError, ServerConfig};

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error(transparent)]
    Keys(#[from] AuthError),
    #[error(transparent)]
    Warden(#[from] WardenError),
    #[error("signal handler failed: {0}")]
    Signal(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    let config = ServerConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .json()
        .init();

    info!("Starting Warden server");

    if let Err(e) = run(config).await {
        error!(error = %e, "Warden server failed");
        process::exit(1);
    }

    info!("Warden server stopped");
}

async fn run(config: ServerConfig) -> Result<(), StartupError> {
    let auth_config = config.auth_config()?;
    let codec = TokenCodec::new(
        &auth_config.jwt_private_key_pem,
        &auth_config.jwt_public_key_pem,
        auth_config.jwt_issuer.clone(),
    )?;
    info!(issuer = %codec.issuer(), "Signing keys loaded");

    let db = DbManager::connect(&config.db_config()).await?;
    let applied = warden_db::run_migrations(db.session()).await?;
    info!(applied, "Migrations complete");

    let repos = Arc::new(db.repositories());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let directory = TenantDirectory::new(Arc::clone(&repos), auth_config.clone(), Arc::clone(&clock));
    let tenants = directory.dashboard().await?;
    info!(tenants = tenants.len(), "Tenant directory ready");

    let bootstrap = BootstrapCoordinator::new(repos, auth_config, clock);
    if bootstrap.initialize(&config.setup_base_url).await?.is_some() {
        info!("Waiting for first-run setup");
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    Ok(())
}
