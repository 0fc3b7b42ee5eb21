// SPDX-License-Identifier: MIT

//! JWT session token tests.
//!
//! These tests verify that tokens minted by `create_jwt` decode through
//! `verify_jwt`, and that the middleware's error taxonomy distinguishes
//! an expired token from a forged one.

use dashboard_auth::error::AppError;
use dashboard_auth::middleware::auth::{create_jwt, verify_jwt, Claims};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use std::time::{SystemTime, UNIX_EPOCH};

const SIGNING_KEY: &[u8] = b"test_signing_key_32_bytes_long!!";

fn now_secs() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize
}

fn encode_claims(claims: &Claims, key: &[u8]) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(key),
    )
    .unwrap()
}

#[test]
fn test_jwt_roundtrip() {
    let token = create_jwt("user-42", SIGNING_KEY).unwrap();

    let claims = verify_jwt(&token, SIGNING_KEY).expect("freshly minted token must verify");

    assert_eq!(claims.sub, "user-42");
    assert!(claims.exp > claims.iat);
    // 7 day lifetime
    assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
}

#[test]
fn test_expired_token_maps_to_token_expired() {
    let now = now_secs();
    // Well past the default 60s leeway
    let claims = Claims {
        sub: "user-42".to_string(),
        exp: now - 3600,
        iat: now - 7200,
    };
    let token = encode_claims(&claims, SIGNING_KEY);

    let err = verify_jwt(&token, SIGNING_KEY).unwrap_err();
    assert!(matches!(err, AppError::TokenExpired));
}

#[test]
fn test_wrong_key_maps_to_unauthorized() {
    let token = create_jwt("user-42", SIGNING_KEY).unwrap();

    let err = verify_jwt(&token, b"a_completely_different_key_here!").unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));
}

#[test]
fn test_garbage_token_maps_to_unauthorized() {
    let err = verify_jwt("not.a.jwt", SIGNING_KEY).unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));
}

#[test]
fn test_tampered_payload_rejected() {
    let token = create_jwt("user-42", SIGNING_KEY).unwrap();

    // Swap the payload segment for one claiming a different subject
    let parts: Vec<&str> = token.split('.').collect();
    let forged_claims = Claims {
        sub: "admin-1".to_string(),
        exp: now_secs() + 3600,
        iat: now_secs(),
    };
    let forged = encode_claims(&forged_claims, SIGNING_KEY);
    let forged_payload = forged.split('.').nth(1).unwrap();

    let tampered = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

    let err = verify_jwt(&tampered, SIGNING_KEY).unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));
}
