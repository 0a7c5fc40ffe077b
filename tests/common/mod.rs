#![allow(dead_code)]

use axum::{
    Json, Router,
    body::Body,
    http::{Request, Response, StatusCode},
    routing::get,
};
use lunch_menu::{
    ServerConfig,
    auth::{AdminOnly, Auth},
    create_app,
    db::{Database, NewUser, User, UserRole},
    jwt::{AccessClaims, JwtCodec, now_secs},
    password::hash_password,
};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const SECRET: &[u8] = b"integration-test-secret-at-least-32-bytes";
pub const PASSWORD: &str = "s3cret-lunch";

/// Stand-in for the menu resources mounted behind the gate.
fn menu_router() -> Router {
    async fn list_menu(Auth(user): Auth) -> Json<Value> {
        Json(json!({ "viewer": user.claims.username, "items": [] }))
    }

    async fn add_item(Auth(user): Auth) -> (StatusCode, Json<Value>) {
        (
            StatusCode::CREATED,
            Json(json!({ "created_by": user.claims.user_id })),
        )
    }

    async fn clear_menu(AdminOnly(_admin): AdminOnly) -> StatusCode {
        StatusCode::NO_CONTENT
    }

    Router::new().route("/menu", get(list_menu).post(add_item).delete(clear_menu))
}

pub fn test_config(db: Database) -> ServerConfig {
    let mut config = ServerConfig::new(db, SECRET.to_vec());
    config.login_rate_per_minute = 10_000;
    config.resources = Some(menu_router());
    config
}

/// Create a test app and return (app, db).
pub async fn create_test_app() -> (Router, Database) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let app = create_app(&test_config(db.clone())).expect("Failed to create app");
    (app, db)
}

pub fn codec() -> JwtCodec {
    JwtCodec::new(SECRET).unwrap()
}

pub async fn create_user(db: &Database, username: &str, role: UserRole, active: bool) -> User {
    let hash = hash_password(PASSWORD).unwrap();
    db.users()
        .create(&NewUser {
            username,
            password_hash: &hash,
            email: &format!("{username}@example.com"),
            role,
            is_active: active,
        })
        .await
        .unwrap()
}

/// An access token for `user` that expired an hour ago.
pub fn expired_token(user: &User) -> String {
    let now = now_secs().unwrap();
    codec()
        .encode_claims(&AccessClaims {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            iat: now - 25 * 3600,
            exp: now - 3600,
        })
        .unwrap()
}

/// Extract Set-Cookie headers from response
pub fn extract_set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Value of a cookie set by the response.
pub fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    cookies
        .iter()
        .find_map(|c| c.strip_prefix(&prefix))
        .and_then(|rest| rest.split(';').next())
        .map(str::to_string)
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Tokens handed out by a successful login.
pub struct Session {
    pub access: String,
    pub refresh: String,
    pub csrf: String,
}

impl Session {
    pub fn cookie_header(&self) -> String {
        format!(
            "access_token={}; refresh_token={}; csrf_token={}",
            self.access, self.refresh, self.csrf
        )
    }
}

pub async fn login(app: &Router, username: &str) -> Session {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/user/login",
            json!({ "username": username, "password_hash": PASSWORD }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK, "login as {username}");

    let cookies = extract_set_cookies(&response);
    Session {
        access: cookie_value(&cookies, "access_token").unwrap(),
        refresh: cookie_value(&cookies, "refresh_token").unwrap(),
        csrf: cookie_value(&cookies, "csrf_token").unwrap(),
    }
}
