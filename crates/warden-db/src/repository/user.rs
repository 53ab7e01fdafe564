//! SurrealDB implementation of [`UserRepository`].
//!
//! Password hashes arrive pre-computed; hashing and verification live in
//! the auth crate.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::error::WardenResult;
use warden_core::models::user::{Profile, UpdateUser, User};
use warden_core::repository::UserRepository;

use super::{CountRow, parse_uuid};
use crate::error::DbError;

const SELECT_USER: &str = "SELECT meta::id(id) AS record_id, email, password_hash, \
     is_active, is_verified, last_login, created_at, updated_at FROM";

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct UserRowWithId {
    record_id: String,
    email: String,
    password_hash: String,
    is_active: bool,
    is_verified: bool,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRowWithId {
    fn try_into_user(self) -> Result<User, DbError> {
        Ok(User {
            id: parse_uuid(&self.record_id, "user id")?,
            email: self.email,
            password_hash: self.password_hash,
            is_active: self.is_active,
            is_verified: self.is_verified,
            last_login: self.last_login,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct ProfileRow {
    user_id: String,
    first_name: String,
    last_name: String,
    avatar_url: Option<String>,
    birth_date: Option<DateTime<Utc>>,
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn get_by_id(&self, id: Uuid) -> WardenResult<User> {
        let id_str = id.to_string();
        let mut result = self
            .db
            .query(format!("{SELECT_USER} type::record('user', $id)"))
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;
        Ok(row.try_into_user()?)
    }

    async fn find_by_email(&self, email: &str) -> WardenResult<Option<User>> {
        let mut result = self
            .db
            .query(format!("{SELECT_USER} user WHERE email = $email LIMIT 1"))
            .bind(("email", email.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.try_into_user()?)),
            None => Ok(None),
        }
    }

    async fn get_profile(&self, user_id: Uuid) -> WardenResult<Profile> {
        let id_str = user_id.to_string();
        let mut result = self
            .db
            .query(
                "SELECT user_id, first_name, last_name, avatar_url, birth_date \
                 FROM type::record('profile', $id)",
            )
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ProfileRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "profile".into(),
            id: id_str,
        })?;
        Ok(Profile {
            user_id: parse_uuid(&row.user_id, "profile user id")?,
            first_name: row.first_name,
            last_name: row.last_name,
            avatar_url: row.avatar_url,
            birth_date: row.birth_date,
        })
    }

    async fn update(&self, id: Uuid, input: UpdateUser) -> WardenResult<User> {
        let mut sets = vec!["updated_at = time::now()"];
        if input.is_active.is_some() {
            sets.push("is_active = $is_active");
        }
        if input.is_verified.is_some() {
            sets.push("is_verified = $is_verified");
        }
        if input.password_hash.is_some() {
            sets.push("password_hash = $password_hash");
        }
        if input.last_login.is_some() {
            sets.push("last_login = $last_login");
        }

        let query = format!(
            "UPDATE type::record('user', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id.to_string()));
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }
        if let Some(is_verified) = input.is_verified {
            builder = builder.bind(("is_verified", is_verified));
        }
        if let Some(password_hash) = input.password_hash {
            builder = builder.bind(("password_hash", password_hash));
        }
        if let Some(last_login) = input.last_login {
            builder = builder.bind(("last_login", last_login));
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        self.get_by_id(id).await
    }

    async fn count(&self) -> WardenResult<u64> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM user GROUP ALL")
            .await
            .map_err(DbError::from)?;

        let count: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(count.first().map(|c| c.total).unwrap_or(0))
    }
}
