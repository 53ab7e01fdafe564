//! SurrealDB implementation of [`SecretTokenRepository`].
//!
//! Each [`TokenPurpose`] has its own table with identical layout.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::error::WardenResult;
use warden_core::models::secret_token::{SecretToken, TokenPurpose};
use warden_core::repository::SecretTokenRepository;

use super::{CountRow, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct TokenRowWithId {
    record_id: String,
    user_id: String,
    salt: String,
    token_hash: String,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TokenRowWithId {
    fn try_into_token(self, purpose: TokenPurpose) -> Result<SecretToken, DbError> {
        Ok(SecretToken {
            id: parse_uuid(&self.record_id, "token id")?,
            purpose,
            user_id: parse_uuid(&self.user_id, "token user id")?,
            salt: self.salt,
            token_hash: self.token_hash,
            expires_at: self.expires_at,
            used_at: self.used_at,
            created_at: self.created_at,
        })
    }
}

#[derive(Clone)]
pub struct SurrealSecretTokenRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSecretTokenRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> SecretTokenRepository for SurrealSecretTokenRepository<C> {
    async fn find(&self, purpose: TokenPurpose, id: Uuid) -> WardenResult<Option<SecretToken>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, user_id, salt, token_hash, \
                 expires_at, used_at, created_at FROM type::record($table, $id)",
            )
            .bind(("table", purpose.as_str()))
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TokenRowWithId> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.try_into_token(purpose)?)),
            None => Ok(None),
        }
    }

    async fn count_open_since(
        &self,
        purpose: TokenPurpose,
        user_id: Uuid,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> WardenResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM type::table($table) \
                 WHERE user_id = $user_id AND used_at = NONE \
                 AND created_at >= $since AND expires_at > $now GROUP ALL",
            )
            .bind(("table", purpose.as_str()))
            .bind(("user_id", user_id.to_string()))
            .bind(("since", since))
            .bind(("now", now))
            .await
            .map_err(DbError::from)?;

        let count: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(count.first().map(|c| c.total).unwrap_or(0))
    }
}
