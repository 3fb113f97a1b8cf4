use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::social::SocialError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

impl From<SocialError> for AppError {
    fn from(err: SocialError) -> Self {
        match err {
            SocialError::Validation { field, message } => AppError::Validation { field, message },
            SocialError::NotFound(_) => AppError::NotFound,
            SocialError::Forbidden(msg) => AppError::Forbidden(msg),
            SocialError::Sql(e) => AppError::Database(e),
            SocialError::Hash(e) => AppError::Hash(e),
        }
    }
}

fn internal(kind: &str, err: &dyn std::fmt::Display) -> (StatusCode, String) {
    tracing::error!("{kind} error: {err}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let field = match &self {
            AppError::Validation { field, .. } => Some(*field),
            _ => None,
        };

        let (status, detail) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found.".to_string()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Authentication credentials were not provided.".to_string(),
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Validation { message, .. } => (StatusCode::BAD_REQUEST, message.clone()),
            AppError::Token(e) => {
                tracing::debug!("Rejected token: {}", e);
                (
                    StatusCode::UNAUTHORIZED,
                    "Given token not valid for any token type".to_string(),
                )
            }
            AppError::Database(e) => internal("Database", e),
            AppError::Pool(e) => internal("Pool", e),
            AppError::Internal(msg) => internal("Internal", msg),
            AppError::Json(e) => internal("JSON", e),
            AppError::Template(e) => internal("Template", e),
            AppError::Hash(e) => internal("Password hashing", e),
        };

        let body = match field {
            Some(field) => json!({ "detail": detail, "field": field }),
            None => json!({ "detail": detail }),
        };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
