//! Password login, refresh rotation, logout and project delegation.

mod common;

use std::time::Duration;

use common::{Harness, PASSWORD, PROJECT, email};
use rig_auth::ErrorKind;
use rig_auth::auth::claims::{SubjectClaims, SubjectType, TokenKind};
use rig_auth::models::auth::{AuthMethod, LoginType, UserIdentifier, UserUpdate};
use rig_auth::repository::UserStore;
use uuid::Uuid;

#[tokio::test]
async fn register_login_refresh_logout() {
    let h = Harness::unverified();
    let registered = h
        .service
        .register_user_password(PROJECT, email("a@b.com"), PASSWORD)
        .await
        .unwrap();

    let login = h
        .service
        .login_user_password(PROJECT, email("a@b.com"), PASSWORD)
        .await
        .unwrap();
    assert_eq!(login.user_id, registered.user_id);
    assert_ne!(login.session_id, registered.session_id);

    let access = h
        .service
        .validate_access_token(&login.token.access_token)
        .unwrap();
    assert_eq!(access.subject(), login.user_id);
    assert_eq!(access.project_id(), PROJECT);
    assert_eq!(access.session_id(), Some(login.session_id));
    assert_eq!(access.subject_type(), SubjectType::User);

    let refreshed = h
        .service
        .refresh_token(&login.token.refresh_token)
        .await
        .unwrap();
    let renewed = h
        .service
        .validate_refresh_token(&refreshed.refresh_token)
        .unwrap();
    assert_eq!(renewed.session_id(), Some(login.session_id));

    h.service.logout(&access).await.unwrap();
    let err = h
        .service
        .refresh_token(&login.token.refresh_token)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    // A second logout of the same session is not an error.
    h.service.logout(&access).await.unwrap();
}

#[tokio::test]
async fn old_refresh_token_keeps_working_until_logout() {
    let h = Harness::unverified();
    let login = h
        .service
        .register_user_password(PROJECT, email("a@b.com"), PASSWORD)
        .await
        .unwrap();
    let caller = h
        .service
        .validate_access_token(&login.token.access_token)
        .unwrap();
    let before = h
        .service
        .list_sessions(&caller, login.user_id)
        .await
        .unwrap();

    for _ in 0..3 {
        h.service
            .refresh_token(&login.token.refresh_token)
            .await
            .unwrap();
    }

    let after = h
        .service
        .list_sessions(&caller, login.user_id)
        .await
        .unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].session_id, login.session_id);
    assert_eq!(
        after[0].session.auth_method,
        AuthMethod::LoginType(LoginType::EmailPassword)
    );
    assert!(after[0].session.renewed_at > before[0].session.renewed_at);
    assert!(after[0].session.expires_at > before[0].session.expires_at);
}

#[tokio::test]
async fn reset_sessions_supersedes_tokens_from_the_same_second() {
    let h = Harness::unverified();
    let login = h
        .service
        .register_user_password(PROJECT, email("a@b.com"), PASSWORD)
        .await
        .unwrap();
    h.service
        .refresh_token(&login.token.refresh_token)
        .await
        .unwrap();

    h.backend
        .users
        .update_user(PROJECT, login.user_id, vec![UserUpdate::ResetSessions])
        .await
        .unwrap();

    let err = h
        .service
        .refresh_token(&login.token.refresh_token)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
}

#[tokio::test]
async fn login_after_reset_can_refresh() {
    let h = Harness::unverified();
    let login = h
        .service
        .register_user_password(PROJECT, email("a@b.com"), PASSWORD)
        .await
        .unwrap();
    h.backend
        .users
        .update_user(PROJECT, login.user_id, vec![UserUpdate::ResetSessions])
        .await
        .unwrap();

    // `iat` has whole-second resolution; move past the reset's second.
    std::thread::sleep(Duration::from_millis(1100));
    let fresh = h
        .service
        .login_user_password(PROJECT, email("a@b.com"), PASSWORD)
        .await
        .unwrap();
    h.service
        .refresh_token(&fresh.token.refresh_token)
        .await
        .unwrap();
}

#[tokio::test]
async fn wrong_password_is_unauthenticated() {
    let h = Harness::unverified();
    h.service
        .register_user_password(PROJECT, UserIdentifier::Username("ada".into()), PASSWORD)
        .await
        .unwrap();

    let err = h
        .service
        .login_user_password(PROJECT, UserIdentifier::Username("ada".into()), "Secret124!")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);
}

#[tokio::test]
async fn unknown_project_or_user_is_not_found() {
    let h = Harness::unverified();
    let err = h
        .service
        .login_user_password("nope", email("a@b.com"), PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = h
        .service
        .login_user_password(PROJECT, email("ghost@b.com"), PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn malformed_identifier_is_invalid_argument() {
    let h = Harness::unverified();
    let err = h
        .service
        .login_user_password(PROJECT, email("not-an-email"), PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn registration_checks_settings_and_policy() {
    let h = Harness::with(|s| s.allow_register = false);
    let err = h
        .service
        .register_user_password(PROJECT, email("a@b.com"), PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let h = Harness::unverified();
    let err = h
        .service
        .register_user_password(PROJECT, email("a@b.com"), "short")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(h.backend.users.user_count(PROJECT), 0);

    h.service
        .register_user_password(PROJECT, email("a@b.com"), PASSWORD)
        .await
        .unwrap();
    let err = h
        .service
        .register_user_password(PROJECT, email("A@b.com"), PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

#[tokio::test]
async fn unverified_email_blocks_login_and_sends_code() {
    let h = Harness::new();
    let err = h
        .service
        .register_user_password(PROJECT, email("a@b.com"), PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    assert_eq!(h.outbox.sent().len(), 1);
    assert_eq!(h.outbox.sent()[0].to[0].email, "a@b.com");

    // Username logins are not gated on the email.
    let h = Harness::new();
    h.service
        .register_user_password(PROJECT, UserIdentifier::Username("ada".into()), PASSWORD)
        .await
        .unwrap();
}

#[tokio::test]
async fn unverified_phone_login_is_unimplemented() {
    let h = Harness::with(|s| s.is_verified_phone_required = true);
    let err = h
        .service
        .register_user_password(
            PROJECT,
            UserIdentifier::PhoneNumber("+45 12345678".into()),
            PASSWORD,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unimplemented);
}

#[tokio::test]
async fn groups_are_embedded_in_tokens() {
    let h = Harness::unverified();
    let login = h
        .service
        .register_user_password(PROJECT, email("a@b.com"), PASSWORD)
        .await
        .unwrap();
    let group = Uuid::new_v4();
    h.backend
        .users
        .add_group_member(PROJECT, login.user_id, group);

    let token = h
        .service
        .refresh_token(&login.token.refresh_token)
        .await
        .unwrap();
    let access = h.service.validate_access_token(&token.access_token).unwrap();
    assert_eq!(access.groups, vec![group]);
}

#[tokio::test]
async fn use_project_mints_delegated_token() {
    let h = Harness::unverified();
    h.backend.settings.add_project("other", "Other");
    let login = h
        .service
        .register_user_password(PROJECT, email("a@b.com"), PASSWORD)
        .await
        .unwrap();
    let caller = h
        .service
        .validate_access_token(&login.token.access_token)
        .unwrap();

    let token = h.service.use_project(&caller, "other").await.unwrap();
    let claims = h.service.validate_project_token(&token).unwrap();
    assert_eq!(claims.use_project_id, "other");
    assert_eq!(claims.project_id(), PROJECT);
    assert_eq!(claims.subject(), login.user_id);
    assert_eq!(claims.session_id(), None);
    assert_eq!(claims.kind(), TokenKind::Project);

    // Delegated tokens are bearer tokens but cannot log out.
    let any = h.service.validate_token(&token).unwrap();
    let err = h.service.logout(&any).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = h.service.use_project(&caller, "missing").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn token_kinds_are_not_interchangeable() {
    let h = Harness::unverified();
    let login = h
        .service
        .register_user_password(PROJECT, email("a@b.com"), PASSWORD)
        .await
        .unwrap();

    let err = h
        .service
        .refresh_token(&login.token.access_token)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let err = h
        .service
        .validate_token(&login.token.refresh_token)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let err = h
        .service
        .validate_project_token(&login.token.access_token)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
}
