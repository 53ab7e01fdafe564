//! Authentication error types.

use thiserror::Error;
use warden_core::error::WardenError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token lifetime must be positive")]
    NonPositiveTtl,

    #[error("signing key not configured")]
    SigningKeyMissing,

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for WardenError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NonPositiveTtl => WardenError::validation(err.to_string()),
            AuthError::SigningKeyMissing => WardenError::Crypto(err.to_string()),
            AuthError::Crypto(msg) => WardenError::Crypto(msg),
        }
    }
}
