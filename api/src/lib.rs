pub mod answers;
pub mod auth;
pub mod categories;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod password;
pub mod questions;
pub mod users;
pub mod validation;
pub mod votes;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use db::DbPool;

use crate::config::JwtConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub jwt: JwtConfig,
}

/// All API routes with request tracing; CORS is layered on by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(|| async { "ok" }))
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        // Categories
        .route("/api/categories", get(categories::list_categories))
        .route("/api/categories/{key}", get(categories::get_category))
        // Questions
        .route(
            "/api/questions",
            get(questions::list_questions).post(questions::create_question),
        )
        .route(
            "/api/questions/{id}",
            get(questions::get_question)
                .put(questions::update_question)
                .delete(questions::delete_question),
        )
        .route("/api/questions/{id}/vote", post(questions::vote_question))
        .route(
            "/api/questions/{id}/answers",
            get(answers::list_answers).post(answers::create_answer),
        )
        // Answers
        .route(
            "/api/answers/{id}",
            get(answers::get_answer)
                .put(answers::update_answer)
                .delete(answers::delete_answer),
        )
        .route("/api/answers/{id}/vote", post(answers::vote_answer))
        .route("/api/answers/{id}/accept", post(answers::accept_answer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
