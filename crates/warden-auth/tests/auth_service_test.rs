//! Integration tests for login, registration, verification and password
//! reset against in-memory SurrealDB.

mod common;

use chrono::Duration;
use common::{Harness, PASSWORD, test_config};
use serde_json::json;
use warden_auth::config::{ExistingIdentityPolicy, TOKEN_COOKIE_NAME};
use warden_auth::service::LoginRequest;
use warden_core::error::{PasswordWeakness, RuleViolation, TokenError, WardenError};
use warden_core::models::policy::RuleCode;
use warden_core::models::user::UpdateUser;
use warden_core::notifier::Notification;
use warden_core::repository::{Repositories, RoleAssignmentRepository, UserRepository};

fn login(slug: &str, email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        tenant_slug: slug.into(),
        email: email.into(),
        password: password.into(),
    }
}

#[tokio::test]
async fn register_verify_and_login() {
    let h = Harness::new().await;
    let acme = h.open_tenant("Acme").await;

    let outcome = h
        .auth
        .register(h.registration("acme", "Ana@Example.com "))
        .await
        .unwrap();
    assert_eq!(outcome.user.email, "ana@example.com");
    assert!(!outcome.user.is_verified);
    assert!(!outcome.joined_existing);
    assert_eq!(
        outcome.verification.expires_at,
        h.clock_now() + Duration::hours(24)
    );
    let roles = h
        .repos
        .assignments()
        .role_names(outcome.user.id, acme.tenant.id)
        .await
        .unwrap();
    assert_eq!(roles, ["MEMBER"]);

    let tampered = format!("{}.{}", outcome.verification.token_id, "wrong-secret");
    let err = h.auth.verify_email(&tampered).await.unwrap_err();
    assert!(matches!(
        err,
        WardenError::TokenInvalid(TokenError::InvalidSignature)
    ));
    let stored = h.repos.users().get_by_id(outcome.user.id).await.unwrap();
    assert!(!stored.is_verified);

    let err = h
        .auth
        .login(login("acme", "ana@example.com", PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::UnverifiedUser));

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient(), "ana@example.com");
    assert_eq!(
        h.notifier.last_link(),
        format!("https://app.test/verify/{}", outcome.verification.plaintext)
    );

    let user = h
        .auth
        .verify_email(&outcome.verification.plaintext)
        .await
        .unwrap();
    assert!(user.is_verified);

    let issued = h
        .auth
        .login(login("acme", "ana@example.com", PASSWORD))
        .await
        .unwrap();
    assert_eq!(issued.user_id, user.id);
    assert_eq!(issued.tenant_slug, acme.tenant.slug);
    assert_eq!(issued.expires_at, h.clock_now() + Duration::hours(24));

    let identity = h.auth.authenticate(&issued.token).unwrap();
    assert_eq!(identity.user_id, user.id);
    assert_eq!(identity.tenant_slug, "acme");
    assert_eq!(identity.display_name, "ana@example.com");

    let stored = h.repos.users().get_by_id(user.id).await.unwrap();
    assert!(stored.last_login.is_some());

    let cookie = format!("lang=en; {TOKEN_COOKIE_NAME}={}", issued.token);
    let identity = h.auth.authenticate_cookie(&cookie).unwrap();
    assert_eq!(identity.user_id, user.id);
    let err = h.auth.authenticate_cookie("lang=en").unwrap_err();
    assert!(matches!(err, WardenError::TokenInvalid(TokenError::Malformed)));
}

#[tokio::test]
async fn verification_secret_is_single_use() {
    let h = Harness::new().await;
    h.open_tenant("Acme").await;
    let outcome = h
        .auth
        .register(h.registration("acme", "ana@example.com"))
        .await
        .unwrap();

    h.auth
        .verify_email(&outcome.verification.plaintext)
        .await
        .unwrap();
    let err = h
        .auth
        .verify_email(&outcome.verification.plaintext)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WardenError::TokenInvalid(TokenError::InvalidSignature)
    ));
}

#[tokio::test]
async fn verification_rejects_bad_and_expired_secrets() {
    let h = Harness::new().await;
    h.open_tenant("Acme").await;
    let outcome = h
        .auth
        .register(h.registration("acme", "ana@example.com"))
        .await
        .unwrap();
    let plaintext = outcome.verification.plaintext;

    let err = h.auth.verify_email("not-a-token").await.unwrap_err();
    assert!(matches!(err, WardenError::TokenInvalid(TokenError::Malformed)));

    let tampered = format!("{}.{}", outcome.verification.token_id, "wrong-secret");
    let err = h.auth.verify_email(&tampered).await.unwrap_err();
    assert!(matches!(
        err,
        WardenError::TokenInvalid(TokenError::InvalidSignature)
    ));
    let stored = h.repos.users().get_by_id(outcome.user.id).await.unwrap();
    assert!(!stored.is_verified);

    h.clock.advance(Duration::hours(24));
    let err = h.auth.verify_email(&plaintext).await.unwrap_err();
    assert!(matches!(err, WardenError::TokenInvalid(TokenError::Expired)));
}

#[tokio::test]
async fn login_failures_do_not_reveal_which_part_was_wrong() {
    let h = Harness::new().await;
    h.open_tenant("Acme").await;
    h.verified_member("acme", "ana@example.com").await;

    let wrong_password = h
        .auth
        .login(login("acme", "ana@example.com", "not-the-password"))
        .await
        .unwrap_err();
    let unknown_email = h
        .auth
        .login(login("acme", "nobody@example.com", PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(wrong_password, WardenError::InvalidCredentials));
    assert!(matches!(unknown_email, WardenError::InvalidCredentials));
}

#[tokio::test]
async fn login_checks_tenant_and_account_state() {
    let h = Harness::new().await;
    h.open_tenant("Acme").await;
    let user = h.verified_member("acme", "ana@example.com").await;

    let err = h
        .auth
        .login(login("globex", "ana@example.com", PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::UnknownTenant { .. }));

    h.directory.set_active("acme", false).await.unwrap();
    let err = h
        .auth
        .login(login("acme", "ana@example.com", PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::TenantInactive { .. }));
    h.directory.set_active("acme", true).await.unwrap();

    h.repos
        .users()
        .update(
            user.id,
            UpdateUser {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let err = h
        .auth
        .login(login("acme", "ana@example.com", PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::InactiveUser));
}

#[tokio::test]
async fn admin_only_tenant_admits_admins() {
    let h = Harness::new().await;
    h.open_tenant("Acme").await;
    h.ensure_role("ADMIN").await;
    h.verified_member("acme", "ana@example.com").await;
    h.directory
        .set_rule("acme", RuleCode::AdminOnly, json!({ "enabled": true }), true)
        .await
        .unwrap();

    let err = h
        .auth
        .login(login("acme", "ana@example.com", PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WardenError::RuleViolation(RuleViolation::AdminOnlyRestriction)
    ));

    h.directory
        .enroll_member("acme", "ana@example.com", "admin")
        .await
        .unwrap();
    h.auth
        .login(login("acme", "ana@example.com", PASSWORD))
        .await
        .unwrap();
}

#[tokio::test]
async fn registration_needs_a_default_role() {
    let h = Harness::new().await;
    h.directory.create_tenant("Bare", "", true).await.unwrap();

    let err = h
        .auth
        .register(h.registration("bare", "ana@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WardenError::RuleViolation(RuleViolation::MissingDefaultRole)
    ));
    assert!(
        h.repos
            .users()
            .find_by_email("ana@example.com")
            .await
            .unwrap()
            .is_none()
    );
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn default_role_must_exist() {
    let h = Harness::new().await;
    h.directory.create_tenant("Acme", "", true).await.unwrap();
    h.directory
        .set_rule("acme", RuleCode::DefaultRole, json!({ "role": "ghost" }), true)
        .await
        .unwrap();

    let err = h
        .auth
        .register(h.registration("acme", "ana@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WardenError::RuleViolation(RuleViolation::MissingDefaultRole)
    ));
}

#[tokio::test]
async fn closed_tenant_rejects_self_registration() {
    let h = Harness::new().await;
    h.open_tenant("Acme").await;
    h.directory
        .set_rule("acme", RuleCode::SelfRegister, json!({ "allow": false }), true)
        .await
        .unwrap();

    let err = h
        .auth
        .register(h.registration("acme", "ana@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WardenError::RuleViolation(RuleViolation::SelfRegisterDisabled)
    ));
}

#[tokio::test]
async fn password_strength_rule_applies_to_registration() {
    let h = Harness::new().await;
    h.open_tenant("Acme").await;
    h.directory
        .set_rule(
            "acme",
            RuleCode::PwdStrength,
            json!({ "min": 20, "upper": true, "digits": true, "symbols": true }),
            true,
        )
        .await
        .unwrap();

    let err = h
        .auth
        .register(h.registration("acme", "ana@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WardenError::RuleViolation(RuleViolation::WeakPassword {
            reason: PasswordWeakness::TooShort { min: 20 }
        })
    ));
}

#[tokio::test]
async fn second_registration_in_the_same_tenant_is_rejected() {
    let h = Harness::new().await;
    h.open_tenant("Acme").await;
    h.auth
        .register(h.registration("acme", "ana@example.com"))
        .await
        .unwrap();

    let err = h
        .auth
        .register(h.registration("acme", "ANA@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::AlreadyRegisteredInTenant));
}

#[tokio::test]
async fn existing_identity_joins_another_tenant() {
    let h = Harness::new().await;
    h.open_tenant("Acme").await;
    h.open_tenant("Globex").await;
    let user = h.verified_member("acme", "ana@example.com").await;

    let mut wrong = h.registration("globex", "ana@example.com");
    wrong.password = "Someone-Else-99".into();
    let err = h.auth.register(wrong).await.unwrap_err();
    assert!(matches!(err, WardenError::InvalidCredentials));

    let outcome = h
        .auth
        .register(h.registration("globex", "ana@example.com"))
        .await
        .unwrap();
    assert!(outcome.joined_existing);
    assert_eq!(outcome.user.id, user.id);
    assert!(outcome.user.is_verified);

    h.auth
        .login(login("globex", "ana@example.com", PASSWORD))
        .await
        .unwrap();
}

#[tokio::test]
async fn closed_tenant_rejects_known_emails_like_unknown_ones() {
    let h = Harness::new().await;
    h.open_tenant("Acme").await;
    h.open_tenant("Beta").await;
    h.verified_member("beta", "ana@example.com").await;
    h.directory
        .set_rule("acme", RuleCode::SelfRegister, json!({ "allow": false }), true)
        .await
        .unwrap();

    for email in ["ana@example.com", "nobody@example.com"] {
        let mut request = h.registration("acme", email);
        request.password = "nope".into();
        let err = h.auth.register(request).await.unwrap_err();
        assert!(matches!(
            err,
            WardenError::RuleViolation(RuleViolation::SelfRegisterDisabled)
        ));
    }
}

#[tokio::test]
async fn reverification_policy_resets_the_flag_on_join() {
    let config = warden_auth::AuthConfig {
        existing_identity_policy: ExistingIdentityPolicy::RequireReverification,
        ..test_config()
    };
    let h = Harness::with_config(config).await;
    h.open_tenant("Acme").await;
    h.open_tenant("Globex").await;
    h.verified_member("acme", "ana@example.com").await;

    let outcome = h
        .auth
        .register(h.registration("globex", "ana@example.com"))
        .await
        .unwrap();
    assert!(!outcome.user.is_verified);

    let user = h
        .auth
        .verify_email(&outcome.verification.plaintext)
        .await
        .unwrap();
    assert!(user.is_verified);
}

#[tokio::test]
async fn issued_tokens_expire_with_the_clock() {
    let h = Harness::new().await;
    h.open_tenant("Acme").await;
    h.verified_member("acme", "ana@example.com").await;
    let issued = h
        .auth
        .login(login("acme", "ana@example.com", PASSWORD))
        .await
        .unwrap();

    h.clock.advance(Duration::hours(23));
    h.auth.authenticate(&issued.token).unwrap();

    h.clock.advance(Duration::hours(1));
    let err = h.auth.authenticate(&issued.token).unwrap_err();
    assert!(matches!(err, WardenError::TokenInvalid(TokenError::Expired)));
}

#[tokio::test]
async fn password_reset_flow() {
    let h = Harness::new().await;
    h.open_tenant("Acme").await;
    h.verified_member("acme", "ana@example.com").await;

    let secret = h
        .auth
        .request_password_reset("ana@example.com")
        .await
        .unwrap()
        .expect("verified user gets a reset secret");
    assert!(matches!(
        h.notifier.sent().last(),
        Some(Notification::PasswordReset { .. })
    ));
    assert_eq!(
        h.notifier.last_link(),
        format!("https://app.test/reset?token={}", secret.plaintext)
    );

    let err = h
        .auth
        .reset_password(&secret.plaintext, "short")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WardenError::RuleViolation(RuleViolation::WeakPassword {
            reason: PasswordWeakness::TooShort { min: 8 }
        })
    ));

    h.auth
        .reset_password(&secret.plaintext, "brand-new-password")
        .await
        .unwrap();

    let err = h
        .auth
        .login(login("acme", "ana@example.com", PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::InvalidCredentials));
    h.auth
        .login(login("acme", "ana@example.com", "brand-new-password"))
        .await
        .unwrap();

    let err = h
        .auth
        .reset_password(&secret.plaintext, "another-password")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WardenError::TokenInvalid(TokenError::InvalidSignature)
    ));
}

#[tokio::test]
async fn password_reset_is_rate_limited() {
    let h = Harness::new().await;
    h.open_tenant("Acme").await;
    h.verified_member("acme", "ana@example.com").await;

    h.auth
        .request_password_reset("ana@example.com")
        .await
        .unwrap()
        .unwrap();

    h.clock.advance(Duration::minutes(14));
    let err = h
        .auth
        .request_password_reset("ana@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::RateLimited));

    h.clock.advance(Duration::minutes(2));
    let second = h
        .auth
        .request_password_reset("ana@example.com")
        .await
        .unwrap();
    assert!(second.is_some());
}

#[tokio::test]
async fn password_reset_ignores_unknown_and_unverified_emails() {
    let h = Harness::new().await;
    h.open_tenant("Acme").await;
    h.auth
        .register(h.registration("acme", "ana@example.com"))
        .await
        .unwrap();
    let delivered = h.notifier.sent().len();

    assert!(
        h.auth
            .request_password_reset("nobody@example.com")
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        h.auth
            .request_password_reset("ana@example.com")
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(h.notifier.sent().len(), delivered);
}

#[tokio::test]
async fn expired_reset_secret_is_rejected() {
    let h = Harness::new().await;
    h.open_tenant("Acme").await;
    h.verified_member("acme", "ana@example.com").await;
    let secret = h
        .auth
        .request_password_reset("ana@example.com")
        .await
        .unwrap()
        .unwrap();

    h.clock.advance(Duration::hours(1));
    let err = h
        .auth
        .reset_password(&secret.plaintext, "brand-new-password")
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::TokenInvalid(TokenError::Expired)));
}
