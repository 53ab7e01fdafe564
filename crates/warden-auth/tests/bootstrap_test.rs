//! Integration tests for first-run setup and administrator login.

mod common;

use chrono::Duration;
use common::{Harness, PASSWORD};
use warden_core::error::WardenError;
use warden_core::repository::{Repositories, RoleAssignmentRepository, UserRepository};

const SETUP_URL: &str = "https://admin.test/setup";

#[tokio::test]
async fn setup_creates_the_root_account_once() {
    let h = Harness::new().await;
    assert!(h.bootstrap.is_first_run().await.unwrap());

    let invitation = h.bootstrap.initialize(SETUP_URL).await.unwrap().unwrap();
    assert_eq!(
        invitation.url,
        format!("{SETUP_URL}?token={}", invitation.token)
    );
    assert_eq!(invitation.expires_at, h.clock_now() + Duration::hours(2));

    let err = h.bootstrap.validate("wrong").await.unwrap_err();
    assert!(matches!(err, WardenError::SetupTokenInvalid));
    h.bootstrap.validate(&invitation.token).await.unwrap();

    let root = h
        .bootstrap
        .complete_setup(&invitation.token, "Admin@Example.com", PASSWORD)
        .await
        .unwrap();
    assert_eq!(root.user.email, "admin@example.com");
    assert!(root.user.is_verified);
    assert_eq!(root.tenant.slug, "warden-root");

    let profile = h.repos.users().get_profile(root.user.id).await.unwrap();
    assert_eq!(profile.first_name, "System");
    assert_eq!(profile.last_name, "Root");
    let roles = h
        .repos
        .assignments()
        .role_names(root.user.id, root.tenant.id)
        .await
        .unwrap();
    assert_eq!(roles, ["ROOT"]);

    let err = h
        .bootstrap
        .complete_setup(&invitation.token, "other@example.com", PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::SetupTokenInvalid));

    assert!(!h.bootstrap.is_first_run().await.unwrap());
    assert!(h.bootstrap.initialize(SETUP_URL).await.unwrap().is_none());
}

#[tokio::test]
async fn setup_window_expires() {
    let h = Harness::new().await;
    let invitation = h.bootstrap.initialize(SETUP_URL).await.unwrap().unwrap();

    h.clock.advance(Duration::hours(2));
    let err = h
        .bootstrap
        .complete_setup(&invitation.token, "admin@example.com", PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::SetupTokenExpired));
    assert!(h.bootstrap.is_first_run().await.unwrap());
}

#[tokio::test]
async fn setup_is_never_armed_without_initialize() {
    let h = Harness::new().await;
    let err = h
        .bootstrap
        .complete_setup("anything", "admin@example.com", PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::SetupTokenInvalid));
}

#[tokio::test]
async fn concurrent_setup_completes_exactly_once() {
    let h = Harness::new().await;
    let invitation = h.bootstrap.initialize(SETUP_URL).await.unwrap().unwrap();

    let (first, second) = tokio::join!(
        h.bootstrap
            .complete_setup(&invitation.token, "one@example.com", PASSWORD),
        h.bootstrap
            .complete_setup(&invitation.token, "two@example.com", PASSWORD),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|r| matches!(r, Err(WardenError::SetupTokenInvalid))));
    assert_eq!(h.repos.users().count().await.unwrap(), 1);
}

#[tokio::test]
async fn setup_fails_closed_when_users_appear() {
    let h = Harness::new().await;
    let invitation = h.bootstrap.initialize(SETUP_URL).await.unwrap().unwrap();

    // Another process got there first.
    h.open_tenant("Acme").await;
    h.directory
        .enroll_member("acme", "early@example.com", "MEMBER")
        .await
        .unwrap();

    let err = h
        .bootstrap
        .complete_setup(&invitation.token, "admin@example.com", PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::AlreadyInitialized));
    assert_eq!(h.repos.users().count().await.unwrap(), 1);

    let err = h.bootstrap.validate(&invitation.token).await.unwrap_err();
    assert!(matches!(err, WardenError::SetupTokenInvalid));
}

#[tokio::test]
async fn admin_login_requires_root_in_the_root_tenant() {
    let h = Harness::new().await;
    let invitation = h.bootstrap.initialize(SETUP_URL).await.unwrap().unwrap();
    let root = h
        .bootstrap
        .complete_setup(&invitation.token, "admin@example.com", PASSWORD)
        .await
        .unwrap();

    let issued = h
        .auth
        .admin_login("admin@example.com", PASSWORD)
        .await
        .unwrap();
    assert_eq!(issued.user_id, root.user.id);
    assert_eq!(issued.tenant_slug, "warden-root");
    assert_eq!(issued.expires_at, h.clock_now() + Duration::hours(12));

    h.open_tenant("Acme").await;
    h.verified_member("acme", "ana@example.com").await;
    let err = h
        .auth
        .admin_login("ana@example.com", PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::Forbidden));

    let err = h
        .auth
        .admin_login("admin@example.com", "wrong-password")
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::InvalidCredentials));
}

#[tokio::test]
async fn root_tenant_is_closed_to_self_registration() {
    let h = Harness::new().await;
    let invitation = h.bootstrap.initialize(SETUP_URL).await.unwrap().unwrap();
    h.bootstrap
        .complete_setup(&invitation.token, "admin@example.com", PASSWORD)
        .await
        .unwrap();

    let err = h
        .auth
        .register(h.registration("warden-root", "intruder@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WardenError::RuleViolation(warden_core::error::RuleViolation::SelfRegisterDisabled)
    ));
}
