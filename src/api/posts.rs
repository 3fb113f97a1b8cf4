use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::api::ToggleResponse;
use crate::error::AppResult;
use crate::extractors::{CurrentUser, MaybeUser};
use crate::social::feed::{self, post_detail, FeedScope, PostView};
use crate::social::interactions::{self, CommentView};
use crate::social::posts::{self, PostEdit};
use crate::social::{Page, PageQuery, PageRequest, PostAction};
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct ListParams {
    pub author: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Deserialize)]
pub struct BodyRequest {
    pub body: String,
}

/// Partial update: omitted fields keep their value.
#[derive(Deserialize)]
pub struct PatchRequest {
    pub body: Option<String>,
    pub parent: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list).post(create))
        .route("/posts/following", get(following))
        .route("/posts/bookmarks", get(bookmarks))
        .route("/posts/liked", get(liked))
        .route("/posts/{id}", get(detail).patch(update).delete(remove))
        .route("/posts/{id}/quote", post(quote))
        .route("/posts/{id}/comments", get(comments).post(comment))
        .route("/posts/{id}/{action}", post(act))
}

fn page_of(
    state: &AppState,
    scope: FeedScope,
    viewer_id: Option<&str>,
    page: PageQuery,
) -> AppResult<Json<Page<PostView>>> {
    let req = PageRequest::resolve(page, &state.config.pagination);
    let conn = state.db.get()?;
    Ok(Json(feed::feed(&conn, &scope, viewer_id, req)?))
}

/// Global feed, optionally `?author=<username>`.
async fn list(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Page<PostView>>> {
    let author = params
        .author
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty());
    let page = PageQuery {
        page: params.page,
        page_size: params.page_size,
    };
    page_of(&state, FeedScope::Global { author }, viewer.id(), page)
}

async fn following(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<Page<PostView>>> {
    page_of(&state, FeedScope::Following(user.id().to_string()), Some(user.id()), page)
}

async fn bookmarks(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<Page<PostView>>> {
    page_of(&state, FeedScope::Bookmarks(user.id().to_string()), Some(user.id()), page)
}

async fn liked(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<Page<PostView>>> {
    page_of(&state, FeedScope::Liked(user.id().to_string()), Some(user.id()), page)
}

async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<BodyRequest>,
) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    let post = posts::create_post(&conn, user.id(), &req.body)?;
    let view = post_detail(&conn, &post.id, Some(user.id()))?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn detail(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Json<PostView>> {
    let conn = state.db.get()?;
    Ok(Json(post_detail(&conn, &id, viewer.id())?))
}

async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<PatchRequest>,
) -> AppResult<Json<PostView>> {
    let conn = state.db.get()?;
    let edit = PostEdit {
        body: req.body,
        parent_id: req.parent,
    };
    posts::edit_post(&conn, &user.actor(), &id, &edit)?;
    Ok(Json(post_detail(&conn, &id, Some(user.id()))?))
}

async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    posts::delete_post(&conn, &user.actor(), &id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn quote(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<BodyRequest>,
) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    let post = posts::quote_post(&conn, user.id(), &id, &req.body)?;
    let view = post_detail(&conn, &post.id, Some(user.id()))?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `react`, `bookmark`, `pin` or `repost`; anything else is a 400 from the path extractor.
async fn act(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, action)): Path<(String, PostAction)>,
) -> AppResult<ToggleResponse> {
    let conn = state.db.get()?;
    let outcome = action.apply(&conn, &user.actor(), &id)?;
    tracing::info!(user_id = %user.id(), post_id = %id, ?action, ?outcome, "Post action");
    Ok(ToggleResponse::new(outcome, action.describe(outcome)))
}

async fn comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<Page<CommentView>>> {
    let conn = state.db.get()?;
    // 404 for unknown posts rather than an empty page.
    posts::get_post(&conn, &id)?;
    let req = PageRequest::resolve(page, &state.config.pagination);
    Ok(Json(interactions::list_comments(&conn, &id, req)?))
}

async fn comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<BodyRequest>,
) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    let created = interactions::add_comment(&conn, user.id(), &id, &req.body)?;
    Ok((StatusCode::CREATED, Json(created)))
}
