use axum::{extract::State, http::StatusCode, Json};
use qaforum_shared::{Answer, ApiResponse, CastVote, CreateAnswer, UpdateAnswer};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior};
use serde_json::Value;

use crate::{
    auth::AuthUser,
    db::{self, NOW},
    error::{AppError, AppResult},
    extract::{AppJson, AppPath},
    questions, users,
    validation::ANSWER_BODY,
    votes::{self, VoteDirection, VoteTarget},
    AppState,
};

const ANSWER_SELECT: &str = "
    SELECT a.id, a.question_id, a.body, a.is_accepted, a.created_at, a.updated_at,
           u.id, u.username, u.reputation, u.created_at
    FROM answers a
    JOIN users u ON a.user_id = u.id";

fn answer_from_row(row: &Row) -> rusqlite::Result<Answer> {
    Ok(Answer {
        id: row.get(0)?,
        question: row.get(1)?,
        body: row.get(2)?,
        is_accepted: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        author: users::user_from_row(row, 6)?,
        upvotes: Vec::new(),
        downvotes: Vec::new(),
        vote_count: 0,
    })
}

fn with_votes(conn: &Connection, mut answer: Answer) -> rusqlite::Result<Answer> {
    let sets = votes::load_vote_sets(conn, VoteTarget::Answer, answer.id)?;
    answer.vote_count = sets.count();
    (answer.upvotes, answer.downvotes) = sets.into_vecs();
    Ok(answer)
}

/// Answers of one question: accepted first, then best voted, then oldest.
pub fn find_answers(conn: &Connection, question_id: i64) -> AppResult<Vec<Answer>> {
    questions::question_author(conn, question_id)?;

    let mut stmt = conn.prepare(&format!(
        "{ANSWER_SELECT}
         WHERE a.question_id = ?1
         ORDER BY a.is_accepted DESC,
                  COALESCE((SELECT SUM(v.value) FROM votes v
                            WHERE v.target_type = 'answer' AND v.target_id = a.id), 0) DESC,
                  a.created_at ASC, a.id ASC"
    ))?;
    let rows = stmt.query_map([question_id], answer_from_row)?;

    let mut answers = Vec::new();
    for row in rows {
        answers.push(with_votes(conn, row?)?);
    }
    Ok(answers)
}

pub fn load_answer(conn: &Connection, id: i64) -> AppResult<Answer> {
    let answer = conn
        .query_row(
            &format!("{ANSWER_SELECT} WHERE a.id = ?1"),
            [id],
            answer_from_row,
        )
        .optional()?
        .ok_or_else(|| AppError::not_found("Answer"))?;
    Ok(with_votes(conn, answer)?)
}

struct AnswerOwnership {
    question_id: i64,
    author_id: i64,
    is_accepted: bool,
}

fn answer_ownership(conn: &Connection, id: i64) -> AppResult<AnswerOwnership> {
    conn.query_row(
        "SELECT question_id, user_id, is_accepted FROM answers WHERE id = ?1",
        [id],
        |row| {
            Ok(AnswerOwnership {
                question_id: row.get(0)?,
                author_id: row.get(1)?,
                is_accepted: row.get(2)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("Answer"))
}

pub fn insert_answer(
    conn: &Connection,
    question_id: i64,
    author_id: i64,
    body: &str,
) -> AppResult<Answer> {
    questions::question_author(conn, question_id)?;

    conn.execute(
        "INSERT INTO answers (question_id, user_id, body) VALUES (?1, ?2, ?3)",
        rusqlite::params![question_id, author_id, body],
    )?;

    load_answer(conn, conn.last_insert_rowid())
}

pub fn edit_answer(conn: &Connection, id: i64, requester: i64, body: &str) -> AppResult<Answer> {
    if answer_ownership(conn, id)?.author_id != requester {
        return Err(AppError::Unauthorized(
            "Not authorized to update this answer".into(),
        ));
    }

    conn.execute(
        &format!("UPDATE answers SET body = ?2, updated_at = {NOW} WHERE id = ?1"),
        rusqlite::params![id, body],
    )?;
    load_answer(conn, id)
}

/// Delete an answer and its votes. Removing the accepted answer reopens the
/// question so it never points at a missing answer.
pub fn remove_answer(conn: &mut Connection, id: i64, requester: i64) -> AppResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let owner = answer_ownership(&tx, id)?;
    if owner.author_id != requester {
        return Err(AppError::Unauthorized(
            "Not authorized to delete this answer".into(),
        ));
    }

    if owner.is_accepted {
        tx.execute(
            &format!(
                "UPDATE questions
                 SET is_solved = 0, accepted_answer_id = NULL, updated_at = {NOW}
                 WHERE id = ?1 AND accepted_answer_id = ?2"
            ),
            rusqlite::params![owner.question_id, id],
        )?;
    }
    votes::clear_votes(&tx, VoteTarget::Answer, id)?;
    tx.execute("DELETE FROM answers WHERE id = ?1", [id])?;

    tx.commit()?;
    Ok(())
}

/// Mark `answer_id` as the accepted answer of its question.
///
/// Only the question's author may accept. Accepting on an already solved
/// question moves the acceptance to the new answer; there is no un-accept.
/// All three writes commit together or not at all.
pub fn mark_accepted(conn: &mut Connection, answer_id: i64, requester: i64) -> AppResult<Answer> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let question_id = answer_ownership(&tx, answer_id)?.question_id;
    if questions::question_author(&tx, question_id)? != requester {
        return Err(AppError::Unauthorized(
            "Only question author can accept answers".into(),
        ));
    }

    tx.execute(
        &format!(
            "UPDATE answers SET is_accepted = 0, updated_at = {NOW}
             WHERE question_id = ?1 AND is_accepted = 1"
        ),
        [question_id],
    )?;
    tx.execute(
        &format!("UPDATE answers SET is_accepted = 1, updated_at = {NOW} WHERE id = ?1"),
        [answer_id],
    )?;
    tx.execute(
        &format!(
            "UPDATE questions
             SET is_solved = 1, accepted_answer_id = ?2, updated_at = {NOW}
             WHERE id = ?1"
        ),
        rusqlite::params![question_id, answer_id],
    )?;

    tx.commit()?;
    load_answer(conn, answer_id)
}

// ── Handlers ──

/// GET /api/questions/{id}/answers
pub async fn list_answers(
    State(state): State<AppState>,
    AppPath(question_id): AppPath<i64>,
) -> AppResult<Json<ApiResponse<Vec<Answer>>>> {
    let answers = db::run(&state.db, move |conn| find_answers(conn, question_id)).await?;
    Ok(Json(ApiResponse::list(answers)))
}

/// GET /api/answers/{id}
pub async fn get_answer(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<ApiResponse<Answer>>> {
    let answer = db::run(&state.db, move |conn| load_answer(conn, id)).await?;
    Ok(Json(ApiResponse::ok(answer)))
}

/// POST /api/questions/{id}/answers
pub async fn create_answer(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(question_id): AppPath<i64>,
    AppJson(payload): AppJson<CreateAnswer>,
) -> AppResult<(StatusCode, Json<ApiResponse<Answer>>)> {
    let body = ANSWER_BODY.apply(&payload.body)?;
    let author_id = auth.id();

    let answer = db::run(&state.db, move |conn| {
        insert_answer(conn, question_id, author_id, &body)
    })
    .await?;

    tracing::info!(answer_id = answer.id, question_id, author_id, "answer posted");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(answer))))
}

/// PUT /api/answers/{id}
pub async fn update_answer(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<UpdateAnswer>,
) -> AppResult<Json<ApiResponse<Answer>>> {
    let body = ANSWER_BODY.apply(&payload.body)?;
    let requester = auth.id();

    let answer = db::run(&state.db, move |conn| edit_answer(conn, id, requester, &body)).await?;
    Ok(Json(ApiResponse::ok(answer)))
}

/// DELETE /api/answers/{id}
pub async fn delete_answer(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let requester = auth.id();
    db::run(&state.db, move |conn| remove_answer(conn, id, requester)).await?;

    tracing::info!(answer_id = id, "answer deleted");
    Ok(Json(ApiResponse::ok(Value::Object(Default::default()))))
}

/// POST /api/answers/{id}/vote
pub async fn vote_answer(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<CastVote>,
) -> AppResult<Json<ApiResponse<Answer>>> {
    let direction: VoteDirection = payload.vote.parse()?;
    let voter = auth.id();

    let answer = db::run(&state.db, move |conn| {
        votes::apply_vote(conn, VoteTarget::Answer, id, voter, direction)?;
        load_answer(conn, id)
    })
    .await?;

    tracing::debug!(answer_id = id, voter, ?direction, "answer vote recorded");
    Ok(Json(ApiResponse::ok(answer)))
}

/// POST /api/answers/{id}/accept
pub async fn accept_answer(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<ApiResponse<Answer>>> {
    let requester = auth.id();
    let answer = db::run(&state.db, move |conn| mark_accepted(conn, id, requester)).await?;

    tracing::info!(answer_id = id, question_id = answer.question, "answer accepted");
    Ok(Json(ApiResponse::ok(answer)))
}
