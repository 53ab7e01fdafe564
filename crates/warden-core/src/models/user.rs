//! User and profile domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Globally unique, stored trimmed and lowercased.
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Personal data owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: Option<String>,
    pub birth_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,
    /// Argon2id hash; hashing happens in the auth layer.
    pub password_hash: String,
    pub is_active: bool,
    pub is_verified: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateProfile {
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: Option<String>,
    pub birth_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
    pub password_hash: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Canonical form of an email address used for storage and lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
