//! Warden Auth: identity tokens, password hashing, tenant rules,
//! registration and login workflows, RBAC and first-run bootstrap.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod password;
pub mod rbac;
pub mod rules;
pub mod service;
pub mod tenants;
pub mod token;

pub use bootstrap::{BootstrapCoordinator, RootAccount, SetupInvitation};
pub use config::{AuthConfig, ExistingIdentityPolicy};
pub use error::AuthError;
pub use rbac::{Grant, RbacGuard};
pub use rules::RuleEvaluator;
pub use service::{AuthService, IssuedToken, LoginRequest, RegistrationOutcome, RegistrationRequest};
pub use tenants::{CreatedTenant, Enrollment, TenantDirectory};
pub use token::{IssuedSecret, TokenCodec, VerifiedIdentity};
