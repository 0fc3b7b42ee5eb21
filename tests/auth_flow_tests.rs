// SPDX-License-Identifier: MIT

//! Login flow tests: the Facebook redirect flow and the one-time
//! login-code exchange, exercised through the router without any real
//! provider network calls.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use dashboard_auth::models::{NormalizedProfile, Provider, UserRecord};
use tower::ServiceExt;

mod common;

fn test_user(email: &str) -> UserRecord {
    let mut profile = NormalizedProfile::new(Provider::Facebook, "fb-1");
    profile.name = "Flow Test".to_string();
    profile.email = email.to_string();
    UserRecord::from_profile(&profile)
}

#[tokio::test]
async fn test_facebook_start_redirects_to_dialog() {
    let (app, state) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/auth/facebook")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();

    assert!(location.starts_with("https://www.facebook.com/v18.0/dialog/oauth?"));
    assert!(location.contains(&format!("client_id={}", state.config.facebook_app_id)));
    assert!(location.contains("scope=email,public_profile"));
    assert!(location.contains("response_type=code"));
    assert!(location.contains("state="));
    // Redirect URI derives from our base URL and is URL-encoded
    assert!(location.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fapi%2Fauth%2Ffacebook%2Fcallback"));
}

#[tokio::test]
async fn test_callback_without_code_is_bad_request() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/auth/facebook/callback")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_with_provider_error_redirects_to_login() {
    let (app, state) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/auth/facebook/callback?error=access_denied")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();

    assert_eq!(
        location,
        format!("{}/login?error=access_denied", state.config.frontend_url)
    );
}

#[tokio::test]
async fn test_callback_with_rejected_code_reports_exchange_failure() {
    // The Facebook client points at an unroutable endpoint, so the code
    // exchange fails the way a rejected code does
    let (app, _) = common::create_test_app_with_dead_facebook();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/auth/facebook/callback?code=bad-code")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "Failed to get access token");
}

#[tokio::test]
async fn test_login_code_exchange_returns_token_and_user() {
    let (app, state) = common::create_test_app();

    let user = test_user("flow@example.com");
    let code = state
        .tickets
        .issue("session-jwt".to_string(), user.clone());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/session")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(format!("{{\"code\": \"{}\"}}", code)))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["token"], "session-jwt");
    assert_eq!(json["user"]["email"], "flow@example.com");
    assert_eq!(json["user"]["provider"], "facebook");
    // Credential material never leaves the server
    assert!(json["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_login_code_is_single_use() {
    let (app, state) = common::create_test_app();

    let code = state
        .tickets
        .issue("session-jwt".to_string(), test_user("once@example.com"));

    let request = |code: &str| {
        Request::builder()
            .method("POST")
            .uri("/api/auth/session")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(format!("{{\"code\": \"{}\"}}", code)))
            .unwrap()
    };

    let first = app.clone().oneshot(request(&code)).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.oneshot(request(&code)).await.unwrap();
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_login_code_is_bad_request() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/session")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"code": "nope"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
