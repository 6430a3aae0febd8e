use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use qaforum_shared::ApiError;

/// Error type returned by every handler and store function.
///
/// The first three variants are caller mistakes and are reported verbatim.
/// The rest are infrastructure failures: they are logged and the client only
/// sees a generic message.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(entity: &str) -> Self {
        Self::NotFound(format!("{entity} not found"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(rusqlite::Error::QueryReturnedNoRows) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Pool(_) | AppError::Task(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::NotFound(msg) | AppError::Unauthorized(msg) | AppError::Validation(msg) => {
                msg.clone()
            }
            AppError::Database(rusqlite::Error::QueryReturnedNoRows) => {
                "Resource not found".to_string()
            }
            other => {
                tracing::error!(error = %other, "request failed");
                "An internal error occurred".to_string()
            }
        };

        let body = ApiError {
            success: false,
            error: message,
        };

        (status, Json(body)).into_response()
    }
}
