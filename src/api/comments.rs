use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::posts::BodyRequest;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::social::interactions::{self, CommentView};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/comments/{id}", get(detail).patch(update).delete(remove))
}

async fn detail(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<CommentView>> {
    let conn = state.db.get()?;
    Ok(Json(interactions::get_comment_view(&conn, &id)?))
}

async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<BodyRequest>,
) -> AppResult<Json<CommentView>> {
    let conn = state.db.get()?;
    Ok(Json(interactions::edit_comment(&conn, &user.actor(), &id, &req.body)?))
}

async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    interactions::delete_comment(&conn, &user.actor(), &id)?;
    Ok(StatusCode::NO_CONTENT)
}
