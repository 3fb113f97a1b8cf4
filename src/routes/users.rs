use askama::Template;
use axum::extract::{OriginalUri, Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use crate::db::models::User;
use crate::error::AppResult;
use crate::extractors::{MaybeUser, WebUser};
use crate::routes::home::Html;
use crate::routes::posts::NextForm;
use crate::routes::views::{safe_next, Nav, Pager, PostCard, ProfileCard, UserCard};
use crate::social::feed::{self, FeedScope};
use crate::social::{follows, users, PageQuery, PageRequest, Toggle};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/profile.html")]
pub struct ProfileTemplate {
    pub nav: Nav,
    pub profile: ProfileCard,
    pub tab: &'static str,
    pub posts: Vec<PostCard>,
    pub people: Vec<UserCard>,
    pub empty_message: &'static str,
    pub pager: Pager,
}

#[derive(Template)]
#[template(path = "pages/search.html")]
pub struct SearchTemplate {
    pub nav: Nav,
    pub query: String,
    pub people: Vec<UserCard>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/{username}", get(profile_posts))
        .route("/users/{username}/followers", get(profile_followers))
        .route("/users/{username}/following", get(profile_following))
        .route("/users/{username}/follow", post(follow))
        .route("/search", get(search))
}

#[derive(Clone, Copy)]
enum ProfileTab {
    Posts,
    Followers,
    Following,
}

fn render_profile(
    state: &AppState,
    viewer: Option<&User>,
    uri: &OriginalUri,
    username: &str,
    tab: ProfileTab,
    page: PageQuery,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let viewer_id = viewer.map(|u| u.id.as_str());
    let profile = users::get_profile(&conn, username, viewer_id)?;
    let user_id = profile.summary.id.clone();
    let base = format!("/users/{}", profile.summary.username);
    let req = PageRequest::resolve(page, &state.config.pagination);

    let (tab_name, posts, people, pager, empty_message) = match tab {
        ProfileTab::Posts => {
            let page = feed::feed(&conn, &FeedScope::Profile(user_id), viewer_id, req)?;
            let pager = Pager::new(&page, &base);
            let posts: Vec<PostCard> = page.results.into_iter().map(|p| PostCard::new(p, viewer)).collect();
            ("posts", posts, Vec::new(), pager, "No posts yet.")
        }
        ProfileTab::Followers | ProfileTab::Following => {
            let (name, page, empty) = match tab {
                ProfileTab::Followers => (
                    "followers",
                    follows::followers(&conn, &user_id, viewer_id, req)?,
                    "No followers yet.",
                ),
                _ => (
                    "following",
                    follows::following(&conn, &user_id, viewer_id, req)?,
                    "Not following anyone yet.",
                ),
            };
            let pager = Pager::new(&page, &format!("{base}/{name}"));
            let people: Vec<UserCard> = page.results.into_iter().map(|u| UserCard::new(u, viewer)).collect();
            (name, Vec::new(), people, pager, empty)
        }
    };

    Ok(Html(ProfileTemplate {
        nav: Nav::new(viewer, &uri.0),
        profile: ProfileCard::new(profile, viewer),
        tab: tab_name,
        posts,
        people,
        empty_message,
        pager,
    })
    .into_response())
}

async fn profile_posts(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    uri: OriginalUri,
    Path(username): Path<String>,
    Query(page): Query<PageQuery>,
) -> AppResult<Response> {
    let viewer = maybe_user.0.as_ref().map(|u| &u.0);
    render_profile(&state, viewer, &uri, &username, ProfileTab::Posts, page)
}

async fn profile_followers(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    uri: OriginalUri,
    Path(username): Path<String>,
    Query(page): Query<PageQuery>,
) -> AppResult<Response> {
    let viewer = maybe_user.0.as_ref().map(|u| &u.0);
    render_profile(&state, viewer, &uri, &username, ProfileTab::Followers, page)
}

async fn profile_following(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    uri: OriginalUri,
    Path(username): Path<String>,
    Query(page): Query<PageQuery>,
) -> AppResult<Response> {
    let viewer = maybe_user.0.as_ref().map(|u| &u.0);
    render_profile(&state, viewer, &uri, &username, ProfileTab::Following, page)
}

async fn follow(
    State(state): State<AppState>,
    WebUser(user): WebUser,
    Path(username): Path<String>,
    Form(form): Form<NextForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let target = users::get_by_username(&conn, &username)?;
    let outcome = follows::toggle_follow(&conn, user.id(), &target.id)?;
    tracing::info!(
        follower = %user.0.username,
        followed = %target.username,
        following = matches!(outcome, Toggle::Added),
        "Follow toggled"
    );
    let fallback = format!("/users/{}", target.username);
    Ok(Redirect::to(&safe_next(form.next.as_deref(), &fallback)).into_response())
}

async fn search(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    uri: OriginalUri,
    Query(query): Query<SearchQuery>,
) -> AppResult<Response> {
    let viewer = maybe_user.0.as_ref().map(|u| &u.0);
    let q = query.q.unwrap_or_default().trim().to_string();
    let people = if q.is_empty() {
        Vec::new()
    } else {
        let conn = state.db.get()?;
        users::search(&conn, &q, maybe_user.id())?
            .into_iter()
            .map(|u| UserCard::new(u, viewer))
            .collect()
    };

    Ok(Html(SearchTemplate {
        nav: Nav::new(viewer, &uri.0),
        query: q,
        people,
    })
    .into_response())
}
