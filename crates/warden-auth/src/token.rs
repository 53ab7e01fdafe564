//! Identity token issuance/verification and single-use secrets.
//!
//! Identity tokens are EdDSA (Ed25519) JWTs. Single-use secrets back
//! email verification and password reset: only a salted SHA-256 digest
//! is stored, and the caller receives `<token-id>.<secret>`.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;
use warden_core::error::TokenError;

use crate::config::TOKEN_COOKIE_NAME;
use crate::error::AuthError;

/// JWT claims embedded in every identity token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject: user ID (UUID string).
    pub sub: String,
    /// Slug of the tenant the token was issued for.
    pub tenant: String,
    /// Display name.
    pub name: String,
    /// Issuer.
    pub iss: String,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Unique token ID (UUID string).
    pub jti: String,
}

/// What a verified token asserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub user_id: Uuid,
    pub tenant_slug: String,
    pub display_name: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub token_id: String,
}

/// Signs and verifies identity tokens.
///
/// A codec built with [`TokenCodec::verify_only`] holds no private key
/// and refuses to issue.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: Option<EncodingKey>,
    decoding: DecodingKey,
    issuer: String,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .field("can_issue", &self.encoding.is_some())
            .finish()
    }
}

impl TokenCodec {
    pub fn new(
        private_key_pem: &str,
        public_key_pem: &str,
        issuer: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let encoding = EncodingKey::from_ed_pem(private_key_pem.as_bytes())
            .map_err(|e| AuthError::Crypto(format!("bad private key: {e}")))?;
        let mut codec = Self::verify_only(public_key_pem, issuer)?;
        codec.encoding = Some(encoding);
        Ok(codec)
    }

    pub fn verify_only(public_key_pem: &str, issuer: impl Into<String>) -> Result<Self, AuthError> {
        let decoding = DecodingKey::from_ed_pem(public_key_pem.as_bytes())
            .map_err(|e| AuthError::Crypto(format!("bad public key: {e}")))?;
        Ok(Self {
            encoding: None,
            decoding,
            issuer: issuer.into(),
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue a token valid from now for `ttl`.
    pub fn issue(
        &self,
        user_id: Uuid,
        display_name: &str,
        tenant_slug: &str,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        self.issue_at(user_id, display_name, tenant_slug, ttl, Utc::now())
    }

    /// Issue a token as if the current time were `issued_at`.
    pub fn issue_at(
        &self,
        user_id: Uuid,
        display_name: &str,
        tenant_slug: &str,
        ttl: Duration,
        issued_at: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        if ttl <= Duration::zero() {
            return Err(AuthError::NonPositiveTtl);
        }
        let key = self.encoding.as_ref().ok_or(AuthError::SigningKeyMissing)?;

        let iat = issued_at.timestamp();
        let claims = IdentityClaims {
            sub: user_id.to_string(),
            tenant: tenant_slug.to_string(),
            name: display_name.to_string(),
            iss: self.issuer.clone(),
            iat,
            exp: iat + ttl.num_seconds().max(1),
            jti: Uuid::new_v4().to_string(),
        };

        let header = Header::new(Algorithm::EdDSA);
        jsonwebtoken::encode(&header, &claims, key)
            .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedIdentity, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify signature, algorithm and issuer, then check expiry against
    /// `now` with zero leeway.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<VerifiedIdentity, TokenError> {
        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);
        // Expiry is checked below against the supplied clock.
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = jsonwebtoken::decode::<IdentityClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| classify(e.kind()))?;

        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| TokenError::Malformed)?;
        let issued_at = DateTime::from_timestamp(claims.iat, 0).ok_or(TokenError::Malformed)?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or(TokenError::Malformed)?;

        Ok(VerifiedIdentity {
            user_id,
            tenant_slug: claims.tenant,
            display_name: claims.name,
            issued_at,
            expires_at,
            token_id: claims.jti,
        })
    }
}

fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::InvalidIssuer
        | ErrorKind::ImmatureSignature => TokenError::InvalidSignature,
        _ => TokenError::Malformed,
    }
}

// ---------------------------------------------------------------------------
// Single-use secrets
// ---------------------------------------------------------------------------

/// A freshly minted single-use secret. `plaintext` is shown once and
/// never stored.
#[derive(Debug, Clone)]
pub struct IssuedSecret {
    pub token_id: Uuid,
    pub plaintext: String,
    pub expires_at: DateTime<Utc>,
}

/// Secret material ready to be persisted alongside its plaintext.
#[derive(Debug, Clone)]
pub struct SealedSecret {
    pub secret: String,
    pub salt: String,
    pub digest: String,
}

impl SealedSecret {
    pub fn generate() -> Self {
        let secret = generate_secret();
        let salt = generate_secret();
        let digest = salted_digest(&salt, &secret);
        Self {
            secret,
            salt,
            digest,
        }
    }

    pub fn plaintext(&self, token_id: Uuid) -> String {
        format!("{token_id}.{}", self.secret)
    }
}

/// Generate a cryptographically random secret
/// (32 bytes → base64url-encoded, no padding).
pub fn generate_secret() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rand::Rng::random(&mut rng);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// `SHA-256(salt ‖ secret)`, hex-encoded.
pub fn salted_digest(salt: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare two digests without leaking the position of the first
/// differing byte.
pub fn digests_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Split `<token-id>.<secret>` into its parts.
/// Extract the identity token from a `Cookie` header value.
pub fn token_from_cookie(cookie_header: &str) -> Option<&str> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == TOKEN_COOKIE_NAME)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

pub fn parse_secret_token(token: &str) -> Result<(Uuid, &str), TokenError> {
    let (id, secret) = token.trim().split_once('.').ok_or(TokenError::Malformed)?;
    let id = Uuid::parse_str(id).map_err(|_| TokenError::Malformed)?;
    if secret.is_empty() {
        return Err(TokenError::Malformed);
    }
    Ok((id, secret))
}
