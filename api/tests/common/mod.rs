//! Helpers for driving the router in-process with `tower::ServiceExt`.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use qaforum_api::config::JwtConfig;
use qaforum_api::{auth, categories, db, router, users, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    /// Fresh database file in a temp dir, migrated and seeded.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qaforum-test.db");
        let pool = db::create_pool(path.to_str().unwrap()).unwrap();
        db::initialize(&pool).unwrap();

        let state = AppState {
            db: pool,
            jwt: JwtConfig {
                secret: "integration-test-secret".into(),
                expiry_days: 1,
            },
        };

        Self {
            app: router(state.clone()),
            state,
            _dir: dir,
        }
    }

    /// Insert a user straight into the store and mint a token for them.
    pub fn user(&self, name: &str) -> (i64, String) {
        let conn = self.state.db.get().unwrap();
        let user =
            users::insert_user(&conn, name, &format!("{name}@example.com"), "unused").unwrap();
        let token = auth::issue_token(user.id, &self.state.jwt).unwrap();
        (user.id, token)
    }

    pub fn category_id(&self, slug: &str) -> i64 {
        let conn = self.state.db.get().unwrap();
        categories::find_category(&conn, slug).unwrap().unwrap().id
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None, None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Create a question in the JavaScript category and return its id.
    pub async fn ask(&self, token: &str, title: &str, body: &str) -> i64 {
        let category = self.category_id("javascript");
        let (status, json) = self
            .post(
                "/api/questions",
                token,
                json!({ "title": title, "body": body, "category": category }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["data"]["id"].as_i64().unwrap()
    }

    pub async fn answer(&self, token: &str, question_id: i64, body: &str) -> i64 {
        let (status, json) = self
            .post(
                &format!("/api/questions/{question_id}/answers"),
                token,
                json!({ "body": body }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["data"]["id"].as_i64().unwrap()
    }
}
