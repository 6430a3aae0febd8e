use std::time::Duration;

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::categories;
use crate::error::AppResult;

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;

/// SQL expression for the current UTC time with millisecond precision.
pub const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

pub fn create_pool(database_url: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_url).with_init(configure);
    r2d2::Pool::new(manager)
}

fn configure(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.pragma_update(None, "foreign_keys", true)
}

/// Apply the schema and seed the default categories.
pub fn initialize(pool: &DbPool) -> AppResult<()> {
    let conn = pool.get()?;
    run_migrations(&conn)?;
    let seeded = categories::seed_default_categories(&conn)?;
    if seeded > 0 {
        tracing::info!(seeded, "seeded default categories");
    }
    Ok(())
}

/// Run `f` against a pooled connection on the blocking thread pool.
pub async fn run<F, T>(pool: &DbPool, f: F) -> AppResult<T>
where
    F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await?
}

pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            username      TEXT UNIQUE NOT NULL,
            email         TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            reputation    INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE TABLE IF NOT EXISTS categories (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT UNIQUE NOT NULL,
            slug        TEXT UNIQUE NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            color       TEXT NOT NULL DEFAULT '#007bff',
            icon        TEXT NOT NULL DEFAULT '💬',
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE TABLE IF NOT EXISTS questions (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            category_id        INTEGER NOT NULL REFERENCES categories(id),
            user_id            INTEGER NOT NULL REFERENCES users(id),
            title              TEXT NOT NULL,
            body               TEXT NOT NULL,
            views              INTEGER NOT NULL DEFAULT 0,
            tags               TEXT NOT NULL DEFAULT '[]',
            is_solved          INTEGER NOT NULL DEFAULT 0,
            accepted_answer_id INTEGER,
            created_at         TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            updated_at         TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            CHECK ((is_solved = 1) = (accepted_answer_id IS NOT NULL))
        );
        CREATE INDEX IF NOT EXISTS idx_questions_cat ON questions(category_id);

        CREATE TABLE IF NOT EXISTS answers (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            question_id INTEGER NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            body        TEXT NOT NULL,
            is_accepted INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );
        CREATE INDEX IF NOT EXISTS idx_answers_question ON answers(question_id);
        -- At most one accepted answer per question
        CREATE UNIQUE INDEX IF NOT EXISTS idx_answers_accepted
            ON answers(question_id) WHERE is_accepted = 1;

        CREATE TABLE IF NOT EXISTS votes (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            target_type TEXT NOT NULL,
            target_id   INTEGER NOT NULL,
            value       INTEGER NOT NULL CHECK (value IN (1, -1)),
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            UNIQUE(user_id, target_type, target_id)
        );
        CREATE INDEX IF NOT EXISTS idx_votes_target ON votes(target_type, target_id);
        ",
    )
}

#[cfg(test)]
pub(crate) mod testing {
    use rusqlite::Connection;

    use crate::categories;

    pub fn open_in_memory() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        super::configure(&mut conn).unwrap();
        super::run_migrations(&conn).unwrap();
        categories::seed_default_categories(&conn).unwrap();
        conn
    }

    pub fn insert_user(conn: &Connection, username: &str) -> i64 {
        conn.execute(
            "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, 'x')",
            rusqlite::params![username, format!("{username}@example.com")],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    pub fn category_id(conn: &Connection, slug: &str) -> i64 {
        conn.query_row("SELECT id FROM categories WHERE slug = ?1", [slug], |row| {
            row.get(0)
        })
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = testing::open_in_memory();
        run_migrations(&conn).unwrap();
        let seeded = categories::seed_default_categories(&conn).unwrap();
        assert_eq!(seeded, 0);
    }

    #[test]
    fn solved_flag_requires_accepted_answer() {
        let conn = testing::open_in_memory();
        let user = testing::insert_user(&conn, "alice");
        let cat = testing::category_id(&conn, "python");
        let res = conn.execute(
            "INSERT INTO questions (category_id, user_id, title, body, is_solved)
             VALUES (?1, ?2, 't', 'b', 1)",
            rusqlite::params![cat, user],
        );
        assert!(res.is_err());
    }
}
