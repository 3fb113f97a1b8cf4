use askama::Template;
use axum::extract::{OriginalUri, Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::extractors::{MaybeUser, WebUser};
use crate::routes::home::Html;
use crate::routes::views::{safe_next, CommentCard, Nav, Pager, PostCard};
use crate::social::feed::post_detail;
use crate::social::posts::{self, PostEdit};
use crate::social::{interactions, PageQuery, PageRequest, PostAction, PostKind};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/post_detail.html")]
pub struct PostDetailTemplate {
    pub nav: Nav,
    pub post: PostCard,
    pub comments: Vec<CommentCard>,
    pub pager: Pager,
    pub error: String,
    pub draft: String,
}

#[derive(Template)]
#[template(path = "pages/post_form.html")]
pub struct PostFormTemplate {
    pub nav: Nav,
    pub heading: &'static str,
    pub action: String,
    pub submit_label: &'static str,
    pub body: String,
    pub error: String,
    pub has_quoted: bool,
    pub quoted_username: String,
    pub quoted_text: String,
}

#[derive(Deserialize)]
pub struct BodyForm {
    pub body: String,
    pub next: Option<String>,
}

#[derive(Deserialize)]
pub struct NextForm {
    pub next: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts/{id}", get(detail))
        .route("/posts/{id}/edit", get(edit_form).post(edit))
        .route("/posts/{id}/quote", get(quote_form).post(quote))
        .route("/posts/{id}/delete", post(delete))
        .route("/posts/{id}/comments", post(comment))
        .route("/posts/{id}/{action}", post(toggle))
        .route("/comments/{id}/delete", post(delete_comment))
}

fn render_detail(
    state: &AppState,
    viewer: Option<&User>,
    uri: &OriginalUri,
    id: &str,
    page: PageQuery,
    error: String,
    draft: String,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let view = post_detail(&conn, id, viewer.map(|u| u.id.as_str()))?;

    // Reposts have no conversation of their own.
    if view.is_repost() {
        return Ok(Redirect::to(&format!("/posts/{}", view.subject_id())).into_response());
    }

    let req = PageRequest::resolve(page, &state.config.pagination);
    let comments = interactions::list_comments(&conn, id, req)?;

    Ok(Html(PostDetailTemplate {
        nav: Nav::new(viewer, &uri.0),
        pager: Pager::new(&comments, &format!("/posts/{id}")),
        comments: comments
            .results
            .into_iter()
            .map(|c| CommentCard::new(c, viewer))
            .collect(),
        post: PostCard::new(view, viewer),
        error,
        draft,
    })
    .into_response())
}

async fn detail(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    uri: OriginalUri,
    Path(id): Path<String>,
    Query(page): Query<PageQuery>,
) -> AppResult<Response> {
    let viewer = maybe_user.0.as_ref().map(|u| &u.0);
    render_detail(&state, viewer, &uri, &id, page, String::new(), String::new())
}

async fn edit_form(
    State(state): State<AppState>,
    WebUser(user): WebUser,
    uri: OriginalUri,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let post = posts::get_post(&conn, &id)?;
    if post.author_id != user.id() {
        return Err(AppError::Forbidden("You can only edit your own posts.".into()));
    }
    if posts::kind_of(&post) == PostKind::Repost {
        return Err(AppError::BadRequest("Reposts have nothing to edit.".into()));
    }

    let (has_quoted, quoted_username, quoted_text) = match post.parent_id.as_deref() {
        Some(parent_id) => {
            let parent = post_detail(&conn, parent_id, Some(user.id()))?;
            (true, parent.author.username, parent.body.unwrap_or_default())
        }
        None => (false, String::new(), String::new()),
    };

    Ok(Html(PostFormTemplate {
        nav: Nav::new(Some(&user.0), &uri.0),
        heading: "Edit post",
        action: format!("/posts/{id}/edit"),
        submit_label: "Save",
        body: post.body.unwrap_or_default(),
        error: String::new(),
        has_quoted,
        quoted_username,
        quoted_text,
    })
    .into_response())
}

async fn edit(
    State(state): State<AppState>,
    WebUser(user): WebUser,
    uri: OriginalUri,
    Path(id): Path<String>,
    Form(form): Form<BodyForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let edit = PostEdit {
        body: Some(form.body.clone()),
        parent_id: None,
    };
    match posts::edit_post(&conn, &user.actor(), &id, &edit).map_err(AppError::from) {
        Ok(_) => Ok(Redirect::to(&format!("/posts/{id}")).into_response()),
        Err(AppError::Validation { message, .. }) => Ok(Html(PostFormTemplate {
            nav: Nav::new(Some(&user.0), &uri.0),
            heading: "Edit post",
            action: format!("/posts/{id}/edit"),
            submit_label: "Save",
            body: form.body,
            error: message,
            has_quoted: false,
            quoted_username: String::new(),
            quoted_text: String::new(),
        })
        .into_response()),
        Err(other) => Err(other),
    }
}

fn quote_template(user: &User, uri: &OriginalUri, parent: &PostCard, body: String, error: String) -> PostFormTemplate {
    PostFormTemplate {
        nav: Nav::new(Some(user), &uri.0),
        heading: "Quote post",
        action: format!("/posts/{}/quote", parent.id),
        submit_label: "Quote",
        body,
        error,
        has_quoted: true,
        quoted_username: parent.shown_username.clone(),
        quoted_text: parent.text.clone(),
    }
}

async fn quote_form(
    State(state): State<AppState>,
    WebUser(user): WebUser,
    uri: OriginalUri,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let parent = PostCard::new(post_detail(&conn, &id, Some(user.id()))?, Some(&user.0));
    if parent.is_repost {
        return Ok(Redirect::to(&format!("/posts/{}/quote", parent.subject_id)).into_response());
    }
    Ok(Html(quote_template(&user.0, &uri, &parent, String::new(), String::new())).into_response())
}

async fn quote(
    State(state): State<AppState>,
    WebUser(user): WebUser,
    uri: OriginalUri,
    Path(id): Path<String>,
    Form(form): Form<BodyForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    match posts::quote_post(&conn, user.id(), &id, &form.body).map_err(AppError::from) {
        Ok(created) => Ok(Redirect::to(&format!("/posts/{}", created.id)).into_response()),
        Err(AppError::Validation { message, .. }) => {
            let parent = PostCard::new(post_detail(&conn, &id, Some(user.id()))?, Some(&user.0));
            Ok(Html(quote_template(&user.0, &uri, &parent, form.body, message)).into_response())
        }
        Err(other) => Err(other),
    }
}

async fn delete(
    State(state): State<AppState>,
    WebUser(user): WebUser,
    Path(id): Path<String>,
    Form(form): Form<NextForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    posts::delete_post(&conn, &user.actor(), &id)?;
    // The post page itself is gone, so never return there.
    let next = safe_next(form.next.as_deref(), "/");
    let next = if next.starts_with(&format!("/posts/{id}")) {
        "/".to_string()
    } else {
        next
    };
    Ok(Redirect::to(&next).into_response())
}

async fn comment(
    State(state): State<AppState>,
    WebUser(user): WebUser,
    uri: OriginalUri,
    Path(id): Path<String>,
    Form(form): Form<BodyForm>,
) -> AppResult<Response> {
    let added = {
        let conn = state.db.get()?;
        interactions::add_comment(&conn, user.id(), &id, &form.body)
    };
    match added.map_err(AppError::from) {
        Ok(_) => Ok(Redirect::to(&format!("/posts/{id}")).into_response()),
        Err(AppError::Validation { message, .. }) => render_detail(
            &state,
            Some(&user.0),
            &uri,
            &id,
            PageQuery::default(),
            message,
            form.body,
        ),
        Err(other) => Err(other),
    }
}

async fn toggle(
    State(state): State<AppState>,
    WebUser(user): WebUser,
    Path((id, action)): Path<(String, PostAction)>,
    Form(form): Form<NextForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let outcome = action.apply(&conn, &user.actor(), &id)?;
    tracing::debug!(post_id = %id, ?action, ?outcome, "Post action from web");
    Ok(Redirect::to(&safe_next(form.next.as_deref(), &format!("/posts/{id}"))).into_response())
}

async fn delete_comment(
    State(state): State<AppState>,
    WebUser(user): WebUser,
    Path(id): Path<String>,
    Form(form): Form<NextForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let comment = interactions::get_comment(&conn, &id)?;
    interactions::delete_comment(&conn, &user.actor(), &id)?;
    let fallback = format!("/posts/{}", comment.post_id);
    Ok(Redirect::to(&safe_next(form.next.as_deref(), &fallback)).into_response())
}
