use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use qaforum_shared::{ApiResponse, CastVote, CreateQuestion, Question, UpdateQuestion};
use rusqlite::{types::Type, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    auth::AuthUser,
    categories,
    db::{self, NOW},
    error::{AppError, AppResult},
    extract::{AppJson, AppPath},
    users,
    validation::{normalize_tags, QUESTION_BODY, QUESTION_TITLE},
    votes::{self, VoteDirection, VoteTarget},
    AppState,
};

// ── Listing ──

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QuestionSort {
    #[default]
    Newest,
    Oldest,
    Views,
    Votes,
}

impl QuestionSort {
    /// Unknown or missing keys fall back to newest-first.
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some("oldest") => QuestionSort::Oldest,
            Some("views") => QuestionSort::Views,
            Some("votes") => QuestionSort::Votes,
            _ => QuestionSort::Newest,
        }
    }

    fn order_by(self) -> &'static str {
        match self {
            QuestionSort::Newest => "q.created_at DESC, q.id DESC",
            QuestionSort::Oldest => "q.created_at ASC, q.id ASC",
            QuestionSort::Views => "q.views DESC, q.id DESC",
            QuestionSort::Votes => {
                "COALESCE((SELECT SUM(v.value) FROM votes v
                           WHERE v.target_type = 'question' AND v.target_id = q.id), 0) DESC,
                 q.created_at DESC, q.id DESC"
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QuestionFilter {
    pub category_id: Option<i64>,
    pub search: Option<String>,
    pub sort: QuestionSort,
}

const QUESTION_SELECT: &str = "
    SELECT q.id, q.title, q.body, q.views, q.tags, q.is_solved, q.accepted_answer_id,
           q.created_at, q.updated_at,
           c.id, c.name, c.slug, c.color, c.icon,
           u.id, u.username, u.reputation, u.created_at
    FROM questions q
    JOIN categories c ON q.category_id = c.id
    JOIN users u ON q.user_id = u.id";

fn question_from_row(row: &Row) -> rusqlite::Result<Question> {
    let tags: String = row.get(4)?;
    let tags = serde_json::from_str(&tags)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(Question {
        id: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        views: row.get(3)?,
        tags,
        is_solved: row.get(5)?,
        accepted_answer: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        category: categories::summary_from_row(row, 9)?,
        author: users::user_from_row(row, 14)?,
        upvotes: Vec::new(),
        downvotes: Vec::new(),
        vote_count: 0,
    })
}

fn with_votes(conn: &Connection, mut question: Question) -> rusqlite::Result<Question> {
    let sets = votes::load_vote_sets(conn, VoteTarget::Question, question.id)?;
    question.vote_count = sets.count();
    (question.upvotes, question.downvotes) = sets.into_vecs();
    Ok(question)
}

fn matches_search(question: &Question, needle: &str) -> bool {
    question.title.to_lowercase().contains(needle) || question.body.to_lowercase().contains(needle)
}

pub fn find_questions(conn: &Connection, filter: &QuestionFilter) -> AppResult<Vec<Question>> {
    let mut stmt = conn.prepare(&format!(
        "{QUESTION_SELECT}
         WHERE (?1 IS NULL OR q.category_id = ?1)
         ORDER BY {}",
        filter.sort.order_by()
    ))?;
    let rows = stmt.query_map([filter.category_id], question_from_row)?;

    let needle = filter.search.as_deref().map(str::to_lowercase);

    let mut questions = Vec::new();
    for row in rows {
        let question = row?;
        if needle.as_deref().map_or(true, |n| matches_search(&question, n)) {
            questions.push(with_votes(conn, question)?);
        }
    }
    Ok(questions)
}

pub fn load_question(conn: &Connection, id: i64) -> AppResult<Question> {
    let question = conn
        .query_row(
            &format!("{QUESTION_SELECT} WHERE q.id = ?1"),
            [id],
            question_from_row,
        )
        .optional()?
        .ok_or_else(|| AppError::not_found("Question"))?;
    Ok(with_votes(conn, question)?)
}

/// Bump the view counter and return the question as seen after the bump.
pub fn record_view(conn: &Connection, id: i64) -> AppResult<Question> {
    let updated = conn.execute("UPDATE questions SET views = views + 1 WHERE id = ?1", [id])?;
    if updated == 0 {
        return Err(AppError::not_found("Question"));
    }
    load_question(conn, id)
}

pub fn question_author(conn: &Connection, id: i64) -> AppResult<i64> {
    conn.query_row("SELECT user_id FROM questions WHERE id = ?1", [id], |row| {
        row.get(0)
    })
    .optional()?
    .ok_or_else(|| AppError::not_found("Question"))
}

// ── Writes ──

/// A validated question ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub title: String,
    pub body: String,
    pub category_id: i64,
    pub tags: Vec<String>,
}

impl NewQuestion {
    pub fn new(payload: &CreateQuestion) -> AppResult<Self> {
        Ok(Self {
            title: QUESTION_TITLE.apply(&payload.title)?,
            body: QUESTION_BODY.apply(&payload.body)?,
            category_id: payload.category,
            tags: normalize_tags(&payload.tags),
        })
    }
}

fn encode_tags(tags: &[String]) -> AppResult<String> {
    serde_json::to_string(tags).map_err(|e| AppError::Internal(format!("tag encoding: {e}")))
}

pub fn insert_question(
    conn: &Connection,
    author_id: i64,
    question: &NewQuestion,
) -> AppResult<Question> {
    if !categories::category_exists(conn, question.category_id)? {
        return Err(AppError::not_found("Category"));
    }

    conn.execute(
        "INSERT INTO questions (category_id, user_id, title, body, tags)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            question.category_id,
            author_id,
            question.title,
            question.body,
            encode_tags(&question.tags)?
        ],
    )?;

    load_question(conn, conn.last_insert_rowid())
}

pub fn apply_update(
    conn: &mut Connection,
    id: i64,
    requester: i64,
    changes: &UpdateQuestion,
) -> AppResult<Question> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if question_author(&tx, id)? != requester {
        return Err(AppError::Unauthorized(
            "Not authorized to update this question".into(),
        ));
    }

    let title = changes
        .title
        .as_deref()
        .map(|t| QUESTION_TITLE.apply(t))
        .transpose()?;
    let body = changes
        .body
        .as_deref()
        .map(|b| QUESTION_BODY.apply(b))
        .transpose()?;
    let tags = changes
        .tags
        .as_deref()
        .map(|t| encode_tags(&normalize_tags(t)))
        .transpose()?;
    if let Some(category_id) = changes.category {
        if !categories::category_exists(&tx, category_id)? {
            return Err(AppError::not_found("Category"));
        }
    }

    tx.execute(
        &format!(
            "UPDATE questions
             SET title = COALESCE(?2, title),
                 body = COALESCE(?3, body),
                 category_id = COALESCE(?4, category_id),
                 tags = COALESCE(?5, tags),
                 updated_at = {NOW}
             WHERE id = ?1"
        ),
        rusqlite::params![id, title, body, changes.category, tags],
    )?;
    tx.commit()?;

    load_question(conn, id)
}

/// Delete a question together with its answers and every vote on either.
/// Returns the number of answers removed.
pub fn remove_question(conn: &mut Connection, id: i64, requester: i64) -> AppResult<usize> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if question_author(&tx, id)? != requester {
        return Err(AppError::Unauthorized(
            "Not authorized to delete this question".into(),
        ));
    }

    tx.execute(
        "DELETE FROM votes
         WHERE target_type = ?1
           AND target_id IN (SELECT id FROM answers WHERE question_id = ?2)",
        rusqlite::params![VoteTarget::Answer.as_str(), id],
    )?;
    votes::clear_votes(&tx, VoteTarget::Question, id)?;
    let answers = tx.execute("DELETE FROM answers WHERE question_id = ?1", [id])?;
    tx.execute("DELETE FROM questions WHERE id = ?1", [id])?;

    tx.commit()?;
    Ok(answers)
}

// ── Handlers ──

#[derive(Debug, Deserialize)]
pub struct QuestionListParams {
    category: Option<String>,
    search: Option<String>,
    sort: Option<String>,
}

/// GET /api/questions?category=&search=&sort=
pub async fn list_questions(
    State(state): State<AppState>,
    Query(params): Query<QuestionListParams>,
) -> AppResult<Json<ApiResponse<Vec<Question>>>> {
    let questions = db::run(&state.db, move |conn| {
        let category_id = match params.category.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Some(
                categories::find_category(conn, key)?
                    .ok_or_else(|| AppError::not_found("Category"))?
                    .id,
            ),
            _ => None,
        };

        let filter = QuestionFilter {
            category_id,
            search: params.search,
            sort: QuestionSort::from_param(params.sort.as_deref()),
        };
        find_questions(conn, &filter)
    })
    .await?;

    Ok(Json(ApiResponse::list(questions)))
}

/// GET /api/questions/{id}, counts as a view
pub async fn get_question(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<ApiResponse<Question>>> {
    let question = db::run(&state.db, move |conn| record_view(conn, id)).await?;
    Ok(Json(ApiResponse::ok(question)))
}

/// POST /api/questions
pub async fn create_question(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(payload): AppJson<CreateQuestion>,
) -> AppResult<(StatusCode, Json<ApiResponse<Question>>)> {
    let new_question = NewQuestion::new(&payload)?;
    let author_id = auth.id();

    let question = db::run(&state.db, move |conn| {
        insert_question(conn, author_id, &new_question)
    })
    .await?;

    tracing::info!(question_id = question.id, author_id, "question created");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(question))))
}

/// PUT /api/questions/{id}
pub async fn update_question(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<i64>,
    AppJson(changes): AppJson<UpdateQuestion>,
) -> AppResult<Json<ApiResponse<Question>>> {
    let requester = auth.id();
    let question = db::run(&state.db, move |conn| {
        apply_update(conn, id, requester, &changes)
    })
    .await?;

    tracing::info!(question_id = id, "question updated");
    Ok(Json(ApiResponse::ok(question)))
}

/// DELETE /api/questions/{id}
pub async fn delete_question(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let requester = auth.id();
    let answers = db::run(&state.db, move |conn| remove_question(conn, id, requester)).await?;

    tracing::info!(question_id = id, answers, "question deleted");
    Ok(Json(ApiResponse::ok(Value::Object(Default::default()))))
}

/// POST /api/questions/{id}/vote
pub async fn vote_question(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<CastVote>,
) -> AppResult<Json<ApiResponse<Question>>> {
    let direction: VoteDirection = payload.vote.parse()?;
    let voter = auth.id();

    let question = db::run(&state.db, move |conn| {
        votes::apply_vote(conn, VoteTarget::Question, id, voter, direction)?;
        load_question(conn, id)
    })
    .await?;

    tracing::debug!(question_id = id, voter, ?direction, "question vote recorded");
    Ok(Json(ApiResponse::ok(question)))
}
