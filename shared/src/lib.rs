use serde::{Deserialize, Serialize};

// ── Envelope ──

/// Successful response body: `{ "success": true, "data": ..., "count": n }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            count: None,
            data,
        }
    }
}

impl<T> ApiResponse<Vec<T>> {
    pub fn list(data: Vec<T>) -> Self {
        Self {
            success: true,
            count: Some(data.len()),
            data,
        }
    }
}

/// Failure response body: `{ "success": false, "error": "..." }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
}

// ── Auth ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub reputation: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginUser {
    pub email: String,
    pub password: String,
}

// ── Categories ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub color: String,
    pub icon: String,
    pub created_at: String,
}

/// The part of a category embedded in every question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub color: String,
    pub icon: String,
}

// ── Questions ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub category: CategorySummary,
    pub author: User,
    pub views: i64,
    pub upvotes: Vec<i64>,
    pub downvotes: Vec<i64>,
    pub vote_count: i64,
    pub tags: Vec<String>,
    pub is_solved: bool,
    pub accepted_answer: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQuestion {
    pub title: String,
    pub body: String,
    pub category: i64,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateQuestion {
    pub title: Option<String>,
    pub body: Option<String>,
    pub category: Option<i64>,
    pub tags: Option<Vec<String>>,
}

// ── Answers ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub id: i64,
    pub question: i64,
    pub body: String,
    pub author: User,
    pub upvotes: Vec<i64>,
    pub downvotes: Vec<i64>,
    pub vote_count: i64,
    pub is_accepted: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAnswer {
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAnswer {
    pub body: String,
}

// ── Votes ──

/// `vote` is `"up"` or `"down"`; anything else is rejected by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastVote {
    pub vote: String,
}
