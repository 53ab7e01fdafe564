//! Single-use secrets: email verification and password reset tokens.
//!
//! Only a salted SHA-256 digest of the secret is persisted. The value
//! handed to the user is `<id>.<secret>`, where the id locates the row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenPurpose {
    EmailVerification,
    PasswordReset,
}

impl TokenPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmailVerification => "email_verification",
            Self::PasswordReset => "password_reset",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretToken {
    pub id: Uuid,
    pub purpose: TokenPurpose,
    pub user_id: Uuid,
    pub salt: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    /// Once set the token is permanently spent, regardless of expiry.
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SecretToken {
    pub fn is_spent(&self) -> bool {
        self.used_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSecretToken {
    pub user_id: Uuid,
    pub salt: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
