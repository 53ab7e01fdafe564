//! Opening the SurrealDB session that backs every Warden store.

use std::fmt;

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::{debug, info};

use crate::error::DbError;
use crate::repository::SurrealRepositories;

/// Root account used to sign in.
#[derive(Clone)]
pub struct RootCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for RootCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where Warden keeps its data.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// `host:port` of the WebSocket endpoint.
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    pub credentials: RootCredentials,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:8000".into(),
            namespace: "warden".into(),
            database: "main".into(),
            credentials: RootCredentials {
                username: "root".into(),
                password: "root".into(),
            },
        }
    }
}

#[derive(Clone)]
pub struct DbManager {
    session: Surreal<Client>,
}

impl DbManager {
    /// Dial, authenticate and scope the session. Each step that fails is
    /// reported as [`DbError::Connect`] naming the step.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        let session = Surreal::new::<Ws>(config.endpoint.as_str())
            .await
            .map_err(|source| DbError::Connect { stage: "dial", source })?;
        debug!(endpoint = %config.endpoint, "WebSocket open");

        session
            .signin(Root {
                username: config.credentials.username.clone(),
                password: config.credentials.password.clone(),
            })
            .await
            .map_err(|source| DbError::Connect { stage: "signin", source })?;

        session
            .use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|source| DbError::Connect { stage: "select", source })?;

        info!(
            endpoint = %config.endpoint,
            namespace = %config.namespace,
            database = %config.database,
            "Store connected"
        );
        Ok(Self { session })
    }

    pub fn session(&self) -> &Surreal<Client> {
        &self.session
    }

    /// Stores and unit of work over this session.
    pub fn repositories(&self) -> SurrealRepositories<Client> {
        SurrealRepositories::new(self.session.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_the_root_password() {
        let config = DbConfig {
            credentials: RootCredentials {
                username: "admin".into(),
                password: "s3cret-pass".into(),
            },
            ..DbConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("s3cret-pass"));
        assert_eq!(config.namespace, "warden");
    }
}
