//! Tests for the request gate, silent renewal, logout and session revocation.
//!
//! Tests cover:
//! - Bearer header shape and strict token checks
//! - Renewal of an expired access token from the refresh token cookie
//! - Logout revoking the access token before its natural expiry
//! - Revoking all sessions of the caller or, as admin, of another user

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{
    Session, body_json, codec, create_test_app, create_user, expired_token, extract_set_cookies,
    login,
};
use lunch_menu::{db::UserRole, jwt::now_secs};
use tower::ServiceExt;

fn get_me(token: Option<&str>, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri("/api/user/me");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn logout_request(token: Option<&str>, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/api/user/logout");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn delete_with_csrf(uri: &str, token: &str, session: &Session) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header("cookie", session.cookie_header())
        .header("x-csrf-token", &session.csrf)
        .body(Body::empty())
        .unwrap()
}

// =============================================================================
// Request Gate
// =============================================================================

#[tokio::test]
async fn test_valid_bearer_authenticates() {
    let (app, db) = create_test_app().await;
    let user = create_user(&db, "chef", UserRole::Admin, true).await;
    let session = login(&app, "chef").await;

    let response = app.oneshot(get_me(Some(&session.access), None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-new-access-token").is_none());

    let body = body_json(response).await;
    assert_eq!(body["data"]["user_id"], user.id);
    assert_eq!(body["data"]["username"], "chef");
    assert_eq!(body["data"]["role"], "admin");
}

#[tokio::test]
async fn test_missing_or_malformed_header() {
    let (app, _) = create_test_app().await;

    let response = app.clone().oneshot(get_me(None, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["error"],
        "Missing or invalid Authorization header"
    );

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/user/me")
                .header("authorization", "Token abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_access_cookie_alone_is_not_enough() {
    let (app, db) = create_test_app().await;
    create_user(&db, "chef", UserRole::Admin, true).await;
    let session = login(&app, "chef").await;

    let response = app
        .oneshot(get_me(None, Some(&session.cookie_header())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_signature_is_not_renewed() {
    let (app, db) = create_test_app().await;
    let user = create_user(&db, "chef", UserRole::Admin, true).await;
    let session = login(&app, "chef").await;

    let forged = lunch_menu::jwt::JwtCodec::new(b"some-other-secret-that-is-long-enough")
        .unwrap()
        .issue(user.id, "chef", UserRole::Admin)
        .unwrap();

    let response = app
        .oneshot(get_me(Some(&forged.token), Some(&session.cookie_header())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get("x-new-access-token").is_none());
    assert_eq!(body_json(response).await["error"], "Invalid or expired token");
}

// =============================================================================
// Renewal
// =============================================================================

#[tokio::test]
async fn test_expired_token_renewed_with_refresh_cookie() {
    let (app, db) = create_test_app().await;
    let user = create_user(&db, "chef", UserRole::Admin, true).await;
    let session = login(&app, "chef").await;
    let expired = expired_token(&user);

    let response = app
        .oneshot(get_me(Some(&expired), Some(&session.cookie_header())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let renewed = response
        .headers()
        .get("x-new-access-token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .expect("renewed token header");
    // The original cookies are left alone.
    assert!(extract_set_cookies(&response).is_empty());

    let claims = codec().parse(&renewed).unwrap();
    assert_eq!(claims.user_id, user.id);
    assert_eq!(claims.username, "chef");
    assert_eq!(claims.role, UserRole::Admin);
    assert!(claims.exp > now_secs().unwrap());

    let body = body_json(response).await;
    assert_eq!(body["data"]["user_id"], user.id);
}

#[tokio::test]
async fn test_expired_token_without_refresh_cookie() {
    let (app, db) = create_test_app().await;
    let user = create_user(&db, "chef", UserRole::Admin, true).await;

    let response = app
        .oneshot(get_me(Some(&expired_token(&user)), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get("x-new-access-token").is_none());
}

#[tokio::test]
async fn test_expired_refresh_token_is_terminal() {
    let (app, db) = create_test_app().await;
    let user = create_user(&db, "chef", UserRole::Admin, true).await;
    let now = now_secs().unwrap() as i64;
    db.refresh_tokens()
        .save(user.id, "old-refresh", "unknown", "unknown", now - 10)
        .await
        .unwrap();

    let response = app
        .oneshot(get_me(
            Some(&expired_token(&user)),
            Some("refresh_token=old-refresh"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["error"],
        "Invalid or expired refresh token"
    );
}

#[tokio::test]
async fn test_refresh_token_of_another_user_is_terminal() {
    let (app, db) = create_test_app().await;
    let alice = create_user(&db, "alice", UserRole::Admin, true).await;
    create_user(&db, "bob", UserRole::Admin, true).await;
    let bob = login(&app, "bob").await;

    let response = app
        .oneshot(get_me(
            Some(&expired_token(&alice)),
            Some(&format!("refresh_token={}", bob.refresh)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Logout
// =============================================================================

#[tokio::test]
async fn test_logout_revokes_access_and_refresh_tokens() {
    let (app, db) = create_test_app().await;
    let user = create_user(&db, "chef", UserRole::Admin, true).await;
    let session = login(&app, "chef").await;

    let response = app
        .clone()
        .oneshot(logout_request(
            Some(&session.access),
            Some(&session.cookie_header()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = extract_set_cookies(&response);
    for name in ["access_token=;", "refresh_token=;", "csrf_token=;"] {
        assert!(
            cookies
                .iter()
                .any(|c| c.starts_with(name) && c.contains("Max-Age=0")),
            "{name} should be expired"
        );
    }

    // Still cryptographically valid, but on the ledger now.
    assert!(codec().parse(&session.access).is_ok());
    let response = app
        .clone()
        .oneshot(get_me(Some(&session.access), Some(&session.cookie_header())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Token has been revoked");
    assert_eq!(body["reason"], "revoked");

    let now = now_secs().unwrap() as i64;
    assert!(
        db.refresh_tokens()
            .find(user.id, &session.refresh, now)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_logout_always_succeeds() {
    let (app, _) = create_test_app().await;

    let response = app
        .clone()
        .oneshot(logout_request(None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_set_cookies(&response).len(), 3);
    assert_eq!(
        body_json(response).await["message"],
        "Logged out successfully"
    );

    let response = app
        .oneshot(logout_request(Some("garbage"), Some("refresh_token=junk")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_logout_succeeds_when_ledger_write_fails() {
    let (app, db) = create_test_app().await;
    let user = create_user(&db, "chef", UserRole::Admin, true).await;
    let session = login(&app, "chef").await;

    sqlx::query("DROP TABLE revoked_access_tokens")
        .execute(db.pool())
        .await
        .unwrap();

    let response = app
        .oneshot(logout_request(
            Some(&session.access),
            Some(&session.cookie_header()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = extract_set_cookies(&response);
    assert_eq!(cookies.len(), 3);
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
    for name in ["access_token=", "refresh_token=", "csrf_token="] {
        assert!(cookies.iter().any(|c| c.starts_with(name)), "{name}");
    }
    assert_eq!(
        body_json(response).await["message"],
        "Logged out successfully"
    );

    // The refresh token is still removed even though the ledger step failed.
    let now = now_secs().unwrap() as i64;
    assert!(
        db.refresh_tokens()
            .find(user.id, &session.refresh, now)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_logout_with_expired_token_removes_refresh_token() {
    let (app, db) = create_test_app().await;
    let user = create_user(&db, "chef", UserRole::Admin, true).await;
    let session = login(&app, "chef").await;

    let response = app
        .clone()
        .oneshot(logout_request(
            Some(&expired_token(&user)),
            Some(&session.cookie_header()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get_me(
            Some(&expired_token(&user)),
            Some(&session.cookie_header()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Session revocation
// =============================================================================

#[tokio::test]
async fn test_revoke_own_sessions() {
    let (app, db) = create_test_app().await;
    let user = create_user(&db, "chef", UserRole::Admin, true).await;
    let session = login(&app, "chef").await;

    let response = app
        .clone()
        .oneshot(delete_with_csrf("/api/user/sessions", &session.access, &session))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["revoked"], 1);

    let response = app
        .clone()
        .oneshot(get_me(Some(&session.access), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(get_me(
            Some(&expired_token(&user)),
            Some(&session.cookie_header()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_revokes_other_user_sessions() {
    let (app, db) = create_test_app().await;
    create_user(&db, "chef", UserRole::Admin, true).await;
    let sous = create_user(&db, "sous", UserRole::Admin, true).await;
    let chef_session = login(&app, "chef").await;
    let sous_session = login(&app, "sous").await;

    let uri = format!("/api/user/{}/sessions", sous.id);
    let response = app
        .clone()
        .oneshot(delete_with_csrf(&uri, &chef_session.access, &chef_session))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["revoked"], 1);

    let response = app
        .clone()
        .oneshot(get_me(
            Some(&expired_token(&sous)),
            Some(&sous_session.cookie_header()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(delete_with_csrf(
            "/api/user/9999/sessions",
            &chef_session.access,
            &chef_session,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_revoke_other_user_requires_admin() {
    let (app, db) = create_test_app().await;
    let chef = create_user(&db, "chef", UserRole::Admin, true).await;
    let waiter = create_user(&db, "waiter", UserRole::User, true).await;
    let session = login(&app, "chef").await;

    // Only admins can log in, so mint the token directly.
    let waiter_token = codec()
        .issue(waiter.id, "waiter", UserRole::User)
        .unwrap();

    let uri = format!("/api/user/{}/sessions", chef.id);
    let response = app
        .oneshot(delete_with_csrf(&uri, &waiter_token.token, &session))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "Admin access required");
}
