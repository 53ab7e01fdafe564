//! Tenant domain model.
//!
//! A tenant is a registered client application. End users hold roles
//! within tenants, and each tenant carries its own policy rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Header carrying the tenant's public slug on client calls.
pub const TENANT_ID_HEADER: &str = "X-App-Id";
/// Header carrying the tenant's plaintext secret on client calls.
pub const TENANT_SECRET_HEADER: &str = "X-App-Secret";

/// Pick the `(slug, secret)` pair out of request headers. Names match
/// case-insensitively; `None` unless both are present and non-blank.
pub fn client_credentials<'a, I>(headers: I) -> Option<(&'a str, &'a str)>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut slug = None;
    let mut secret = None;
    for (name, value) in headers {
        if name.eq_ignore_ascii_case(TENANT_ID_HEADER) {
            slug = Some(value.trim());
        } else if name.eq_ignore_ascii_case(TENANT_SECRET_HEADER) {
            secret = Some(value.trim());
        }
    }
    match (slug, secret) {
        (Some(slug), Some(secret)) if !slug.is_empty() && !secret.is_empty() => {
            Some((slug, secret))
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    /// Public, URL-safe unique identifier (e.g. `acme`).
    pub slug: String,
    /// Human-readable name.
    pub name: String,
    pub description: String,
    /// Argon2id hash of the tenant secret.
    #[serde(skip_serializing)]
    pub secret_hash: String,
    pub is_active: bool,
    /// Set when the tenant was soft-deleted. Deleted tenants are never
    /// resolvable.
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn is_usable(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }
}

/// Fields required to create a new tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub secret_hash: String,
    pub is_active: bool,
}

/// Dashboard row: a tenant with the number of distinct users holding
/// any role in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSummary {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub member_count: u64,
}

/// Derive a URL-safe slug from a display name.
///
/// ASCII letters and digits are kept (lowercased); every other run of
/// characters collapses into a single `-`. Leading and trailing
/// separators are trimmed.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_credentials_need_both_headers() {
        let headers = [("x-app-id", " acme "), ("X-APP-SECRET", "s3cret"), ("Accept", "*/*")];
        assert_eq!(client_credentials(headers), Some(("acme", "s3cret")));

        assert_eq!(client_credentials([(TENANT_ID_HEADER, "acme")]), None);
        assert_eq!(
            client_credentials([(TENANT_ID_HEADER, "acme"), (TENANT_SECRET_HEADER, "  ")]),
            None
        );
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Acme  Corp!"), "acme-corp");
        assert_eq!(slugify("--Books & Co--"), "books-co");
        assert_eq!(slugify("Libreria Mariela 2"), "libreria-mariela-2");
    }

    #[test]
    fn slugify_drops_non_ascii() {
        assert_eq!(slugify("Café Raíz"), "caf-ra-z");
        assert_eq!(slugify("¡¡¡"), "");
    }
}
