use qaforum_shared::User;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row};

use crate::error::{AppError, AppResult};

/// Public user columns, for joins aliasing `users` as `u`.
pub const USER_COLUMNS: &str = "u.id, u.username, u.reputation, u.created_at";

/// Read a [`User`] from four consecutive columns starting at `offset`.
pub fn user_from_row(row: &Row, offset: usize) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(offset)?,
        username: row.get(offset + 1)?,
        reputation: row.get(offset + 2)?,
        created_at: row.get(offset + 3)?,
    })
}

pub fn find_user(conn: &Connection, id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1"),
        [id],
        |row| user_from_row(row, 0),
    )
    .optional()
}

pub struct Credentials {
    pub user: User,
    pub password_hash: String,
}

pub fn find_credentials(conn: &Connection, email: &str) -> rusqlite::Result<Option<Credentials>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS}, u.password_hash FROM users u WHERE u.email = ?1"),
        [email],
        |row| {
            Ok(Credentials {
                user: user_from_row(row, 0)?,
                password_hash: row.get(4)?,
            })
        },
    )
    .optional()
}

pub fn insert_user(
    conn: &Connection,
    username: &str,
    email: &str,
    password_hash: &str,
) -> AppResult<User> {
    let inserted = conn.execute(
        "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, ?3)",
        rusqlite::params![username, email, password_hash],
    );

    match inserted {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            return Err(AppError::Validation(
                "Username or email is already registered".into(),
            ));
        }
        Err(e) => return Err(e.into()),
    }

    let id = conn.last_insert_rowid();
    find_user(conn, id)?.ok_or_else(|| AppError::not_found("User"))
}
