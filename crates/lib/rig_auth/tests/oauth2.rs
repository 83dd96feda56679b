//! Federated login: linking, auto-provisioning and the callback gates.

mod common;

use common::{Harness, PASSWORD, PROJECT, claims_for, email, google_creds};
use rig_auth::ErrorKind;
use rig_auth::auth::claims::SubjectClaims;
use rig_auth::models::settings::OauthProviderSettings;
use rig_auth::oauth2::{ProviderType, State};
use url::Url;

const APP_REDIRECT: &str = "https://app.example.com/done";

/// A project with Google login enabled and credentials stored.
async fn federated(allow_login: bool, allow_register: bool) -> Harness {
    let h = Harness::with(|s| {
        s.is_verified_email_required = false;
        s.oauth_settings.callback_urls = vec![APP_REDIRECT.to_string()];
        s.oauth_settings.providers.insert(
            ProviderType::Google,
            OauthProviderSettings {
                client_id: "google-client".into(),
                secret_id: None,
                allow_login,
                allow_register,
            },
        );
    });
    let secret_id = h
        .service
        .set_oauth2_credentials(PROJECT, ProviderType::Google, &google_creds())
        .await
        .unwrap();
    h.backend
        .settings
        .update_user_settings(PROJECT, |s| {
            if let Some(p) = s.oauth_settings.providers.get_mut(&ProviderType::Google) {
                p.secret_id = Some(secret_id);
            }
        })
        .unwrap();
    h
}

fn google(allow_register: bool) -> OauthProviderSettings {
    OauthProviderSettings {
        client_id: "google-client".into(),
        secret_id: None,
        allow_login: true,
        allow_register,
    }
}

fn query_param(url: &str, key: &str) -> String {
    Url::parse(url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

#[tokio::test]
async fn repeated_login_resolves_to_same_user() {
    let h = federated(true, true).await;
    let claims = claims_for("subject-1");

    let first = h
        .service
        .login_oauth2(PROJECT, ProviderType::Google, &claims, &google(true))
        .await
        .unwrap();
    let second = h
        .service
        .login_oauth2(PROJECT, ProviderType::Google, &claims, &google(true))
        .await
        .unwrap();

    assert_eq!(first.user_id, second.user_id);
    assert_ne!(first.session_id, second.session_id);
    assert_eq!(h.backend.users.user_count(PROJECT), 1);
    assert_eq!(h.backend.users.link_count(PROJECT), 1);
}

#[tokio::test]
async fn existing_email_account_is_linked() {
    let h = federated(true, false).await;
    let registered = h
        .service
        .register_user_password(PROJECT, email("subject-2@example.com"), PASSWORD)
        .await
        .unwrap();

    let login = h
        .service
        .login_oauth2(
            PROJECT,
            ProviderType::Google,
            &claims_for("subject-2"),
            &google(false),
        )
        .await
        .unwrap();
    assert_eq!(login.user_id, registered.user_id);
    assert_eq!(h.backend.users.user_count(PROJECT), 1);
    assert_eq!(h.backend.users.link_count(PROJECT), 1);
}

#[tokio::test]
async fn unknown_identity_needs_register_permission() {
    let h = federated(true, false).await;
    let err = h
        .service
        .login_oauth2(
            PROJECT,
            ProviderType::Google,
            &claims_for("subject-3"),
            &google(false),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert_eq!(h.backend.users.user_count(PROJECT), 0);
    assert_eq!(h.backend.users.link_count(PROJECT), 0);
}

#[tokio::test]
async fn callback_round_trip_issues_tokens() {
    let h = federated(true, true).await;
    let providers = h
        .service
        .get_oauth2_providers(PROJECT, APP_REDIRECT)
        .await
        .unwrap();
    assert_eq!(providers.len(), 1);
    assert_eq!(providers[0].provider, ProviderType::Google);
    assert!(
        providers[0]
            .url
            .starts_with("https://accounts.example.com/o/oauth2/auth?")
    );
    assert_eq!(
        query_param(&providers[0].url, "redirect_uri"),
        "http://localhost:4747/oauth/callback"
    );

    let state = query_param(&providers[0].url, "state");
    let redirect = h
        .service
        .handle_oauth2_callback(&state, "subject-4")
        .await
        .unwrap();
    assert!(redirect.starts_with(APP_REDIRECT));

    let access = h
        .service
        .validate_access_token(&query_param(&redirect, "access_token"))
        .unwrap();
    assert_eq!(access.project_id(), PROJECT);
    h.service
        .refresh_token(&query_param(&redirect, "refresh_token"))
        .await
        .unwrap();
}

#[tokio::test]
async fn callback_rejects_unlisted_redirect_and_disabled_login() {
    let h = federated(true, true).await;
    let state = State::new(PROJECT, "https://evil.example.com", ProviderType::Google)
        .encode()
        .unwrap();
    let err = h
        .service
        .handle_oauth2_callback(&state, "subject-5")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let h = federated(false, true).await;
    let state = State::new(PROJECT, APP_REDIRECT, ProviderType::Google)
        .encode()
        .unwrap();
    let err = h
        .service
        .handle_oauth2_callback(&state, "subject-5")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    assert_eq!(h.backend.users.user_count(PROJECT), 0);

    // Disabled providers are not offered either.
    let providers = h
        .service
        .get_oauth2_providers(PROJECT, APP_REDIRECT)
        .await
        .unwrap();
    assert!(providers.is_empty());
}

#[tokio::test]
async fn callback_requires_state_and_code() {
    let h = federated(true, true).await;
    let state = State::new(PROJECT, APP_REDIRECT, ProviderType::Google)
        .encode()
        .unwrap();

    for (state, code) in [("", "code"), (state.as_str(), ""), ("not base64!", "code")] {
        let err = h
            .service
            .handle_oauth2_callback(state, code)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}

#[tokio::test]
async fn credentials_are_overwritten_in_place() {
    let h = federated(true, true).await;
    let first = h
        .service
        .set_oauth2_credentials(PROJECT, ProviderType::Google, &google_creds())
        .await
        .unwrap();
    let second = h
        .service
        .set_oauth2_credentials(PROJECT, ProviderType::Google, &google_creds())
        .await
        .unwrap();
    assert_eq!(first, second);

    let err = h
        .service
        .set_oauth2_credentials(PROJECT, ProviderType::Github, &google_creds())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
