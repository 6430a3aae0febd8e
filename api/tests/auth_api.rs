mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn register_login_and_me() {
    let app = TestApp::new();

    let (status, json) = app
        .request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "username": "johndoe",
                "email": "John@Example.com",
                "password": "password123"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["data"]["user"]["username"], "johndoe");
    assert_eq!(json["data"]["user"]["reputation"], 0);
    assert!(json["data"]["user"].get("password_hash").is_none());

    let (status, json) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "john@example.com", "password": "password123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = json["data"]["token"].as_str().unwrap().to_string();

    let (status, json) = app
        .request(Method::GET, "/api/auth/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["username"], "johndoe");
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = TestApp::new();
    app.request(
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": "janedoe",
            "email": "jane@example.com",
            "password": "password123"
        })),
    )
    .await;

    let (status, json) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "jane@example.com", "password": "nope-nope" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Invalid credentials");

    let (status, _) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ghost@example.com", "password": "password123" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_validates_input() {
    let app = TestApp::new();
    app.user("taken");

    for body in [
        json!({ "username": "ab", "email": "ab@example.com", "password": "password123" }),
        json!({ "username": "abc", "email": "not-an-email", "password": "password123" }),
        json!({ "username": "abc", "email": "abc@localhost", "password": "password123" }),
        json!({ "username": "<b>abc</b>", "email": "b@example.com", "password": "password123" }),
        json!({ "username": "abc", "email": "abc@example.com", "password": "short" }),
        json!({ "username": "taken", "email": "new@example.com", "password": "password123" }),
    ] {
        let (status, json) = app
            .request(Method::POST, "/api/auth/register", None, Some(body))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{json}");
        assert_eq!(json["success"], false);
    }
}

#[tokio::test]
async fn garbage_token_is_unauthorized() {
    let app = TestApp::new();
    let (status, json) = app
        .request(Method::GET, "/api/auth/me", Some("not.a.jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn token_for_removed_user_is_unauthorized() {
    let app = TestApp::new();
    let (id, token) = app.user("ghost");
    {
        let conn = app.state.db.get().unwrap();
        conn.execute("DELETE FROM users WHERE id = ?1", [id]).unwrap();
    }

    let (status, _) = app
        .request(Method::GET, "/api/auth/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_and_categories_are_public() {
    let app = TestApp::new();

    let (status, _) = app.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = app.get("/api/categories").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 5);

    let (status, json) = app.get("/api/categories/node.js").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["name"], "Node.js");

    let (status, json) = app.get("/api/categories/haskell").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Category not found");
}
