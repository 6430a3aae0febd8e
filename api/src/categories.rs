use axum::{extract::State, Json};
use qaforum_shared::{ApiResponse, Category, CategorySummary};
use rusqlite::{Connection, OptionalExtension, Row};

use crate::{
    db,
    error::{AppError, AppResult},
    extract::AppPath,
    AppState,
};

const MAX_NAME_LEN: usize = 50;
const MAX_DESCRIPTION_LEN: usize = 200;
const DEFAULT_COLOR: &str = "#007bff";
const DEFAULT_ICON: &str = "💬";

/// Lowercase the name and collapse each whitespace run into a single `-`.
pub fn slugify(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// A validated category ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub color: String,
    pub icon: String,
}

impl NewCategory {
    pub fn new(
        name: &str,
        description: &str,
        color: Option<&str>,
        icon: Option<&str>,
    ) -> AppResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Please add a category name".into()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(AppError::Validation(format!(
                "Name can not be more than {MAX_NAME_LEN} characters"
            )));
        }
        if description.trim().is_empty() {
            return Err(AppError::Validation("Please add a description".into()));
        }
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(AppError::Validation(format!(
                "Description can not be more than {MAX_DESCRIPTION_LEN} characters"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            slug: slugify(name),
            description: description.trim().to_string(),
            color: color.unwrap_or(DEFAULT_COLOR).to_string(),
            icon: icon.unwrap_or(DEFAULT_ICON).to_string(),
        })
    }
}

const DEFAULT_CATEGORIES: [(&str, &str, &str, &str); 5] = [
    (
        "JavaScript",
        "Questions about JavaScript, ES6+, and modern JS features",
        "#f7df1e",
        "📜",
    ),
    (
        "Python",
        "Python programming, Django, Flask, and data science",
        "#3776ab",
        "🐍",
    ),
    (
        "React",
        "React.js, hooks, state management, and components",
        "#61dafb",
        "⚛️",
    ),
    (
        "Database",
        "SQL, MongoDB, PostgreSQL, and database design",
        "#47a248",
        "🗄️",
    ),
    (
        "Node.js",
        "Node.js, Express, and backend development",
        "#68a063",
        "🟢",
    ),
];

/// Insert the default categories that are missing; returns how many were added.
pub fn seed_default_categories(conn: &Connection) -> AppResult<usize> {
    let mut added = 0;
    for (name, description, color, icon) in DEFAULT_CATEGORIES {
        let category = NewCategory::new(name, description, Some(color), Some(icon))?;
        added += insert_category(conn, &category)?;
    }
    Ok(added)
}

/// Returns the number of rows inserted (0 when the name or slug is taken).
pub fn insert_category(conn: &Connection, category: &NewCategory) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT OR IGNORE INTO categories (name, slug, description, color, icon)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            category.name,
            category.slug,
            category.description,
            category.color,
            category.icon
        ],
    )
}

fn category_from_row(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        color: row.get(4)?,
        icon: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Read a [`CategorySummary`] from five consecutive columns starting at `offset`.
pub fn summary_from_row(row: &Row, offset: usize) -> rusqlite::Result<CategorySummary> {
    Ok(CategorySummary {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        slug: row.get(offset + 2)?,
        color: row.get(offset + 3)?,
        icon: row.get(offset + 4)?,
    })
}

pub fn list_all(conn: &Connection) -> rusqlite::Result<Vec<Category>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, slug, description, color, icon, created_at
         FROM categories ORDER BY name COLLATE NOCASE",
    )?;
    let rows = stmt.query_map([], category_from_row)?;
    rows.collect()
}

/// Look a category up by numeric id or by slug.
pub fn find_category(conn: &Connection, key: &str) -> rusqlite::Result<Option<Category>> {
    let sql = "SELECT id, name, slug, description, color, icon, created_at FROM categories";
    match key.parse::<i64>() {
        Ok(id) => conn
            .query_row(&format!("{sql} WHERE id = ?1"), [id], category_from_row)
            .optional(),
        Err(_) => conn
            .query_row(
                &format!("{sql} WHERE slug = ?1"),
                [key.to_lowercase()],
                category_from_row,
            )
            .optional(),
    }
}

pub fn category_exists(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )
}

// ── Handlers ──

/// GET /api/categories
pub async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<Category>>>> {
    let cats = db::run(&state.db, |conn| Ok(list_all(conn)?)).await?;
    Ok(Json(ApiResponse::list(cats)))
}

/// GET /api/categories/{id_or_slug}
pub async fn get_category(
    State(state): State<AppState>,
    AppPath(key): AppPath<String>,
) -> AppResult<Json<ApiResponse<Category>>> {
    let cat = db::run(&state.db, move |conn| {
        find_category(conn, &key)?.ok_or_else(|| AppError::not_found("Category"))
    })
    .await?;
    Ok(Json(ApiResponse::ok(cat)))
}
