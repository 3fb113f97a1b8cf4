//! JSON REST API, mounted under `/api`.
//!
//! Authentication is either `Authorization: Bearer <access token>` or the web
//! session cookie. Errors use the `{"detail", "field"?}` body of [`AppError`].
//!
//! [`AppError`]: crate::error::AppError

pub mod auth;
pub mod comments;
pub mod posts;
pub mod users;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Serialize;

use crate::social::Toggle;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(users::router())
        .merge(posts::router())
        .merge(comments::router())
}

/// Body returned by every toggle endpoint.
#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub success: bool,
    pub detail: String,
    pub active: bool,
}

impl ToggleResponse {
    pub fn new(outcome: Toggle, detail: impl Into<String>) -> Self {
        Self {
            success: true,
            detail: detail.into(),
            active: outcome.is_added(),
        }
    }
}

/// 201 when the toggle created something, 200 when it removed it.
impl IntoResponse for ToggleResponse {
    fn into_response(self) -> Response {
        let status = if self.active {
            StatusCode::CREATED
        } else {
            StatusCode::OK
        };
        (status, Json(self)).into_response()
    }
}
