use askama::Template;
use axum::extract::{OriginalUri, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::extractors::{MaybeUser, WebUser};
use crate::routes::views::{safe_next, Nav, Pager, PostCard, UserCard};
use crate::social::feed::{self, FeedScope};
use crate::social::users::{suggested_users, DEFAULT_SUGGESTIONS};
use crate::social::{posts, PageQuery, PageRequest};
use crate::state::AppState;

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

#[derive(Template)]
#[template(path = "pages/feed.html")]
pub struct FeedTemplate {
    pub nav: Nav,
    pub title: String,
    pub tab: &'static str,
    pub show_compose: bool,
    pub author_filter: String,
    pub empty_message: &'static str,
    pub error: String,
    pub draft: String,
    pub posts: Vec<PostCard>,
    pub pager: Pager,
    pub suggestions: Vec<UserCard>,
}

#[derive(Deserialize, Default)]
pub struct FeedQuery {
    pub author: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl FeedQuery {
    fn page_query(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

#[derive(Deserialize)]
pub struct ComposeForm {
    pub body: String,
    pub next: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/following", get(following))
        .route("/bookmarks", get(bookmarks))
        .route("/liked", get(liked))
        .route("/posts", post(compose))
}

struct FeedPage {
    title: String,
    tab: &'static str,
    scope: FeedScope,
    base_url: String,
    empty_message: &'static str,
    error: String,
    draft: String,
}

/// Feeds that only make sense for the signed-in viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PersonalTab {
    Following,
    Bookmarks,
    Liked,
}

impl PersonalTab {
    fn as_str(self) -> &'static str {
        match self {
            Self::Following => "following",
            Self::Bookmarks => "bookmarks",
            Self::Liked => "liked",
        }
    }
}

impl FeedPage {
    fn global(author: Option<String>) -> Self {
        let (title, base_url) = match &author {
            Some(a) => (format!("Posts by @{a}"), format!("/?author={}", urlencoding::encode(a))),
            None => ("Home".to_string(), "/".to_string()),
        };
        Self {
            title,
            tab: "home",
            scope: FeedScope::Global { author },
            base_url,
            empty_message: "No posts yet.",
            error: String::new(),
            draft: String::new(),
        }
    }

    fn personal(tab: PersonalTab, user_id: &str) -> Self {
        let user_id = user_id.to_string();
        let (title, scope, empty_message) = match tab {
            PersonalTab::Following => (
                "Following",
                FeedScope::Following(user_id),
                "Posts from people you follow show up here.",
            ),
            PersonalTab::Bookmarks => (
                "Bookmarks",
                FeedScope::Bookmarks(user_id),
                "You have not bookmarked anything yet.",
            ),
            PersonalTab::Liked => (
                "Liked posts",
                FeedScope::Liked(user_id),
                "Posts you like show up here.",
            ),
        };
        Self {
            title: title.to_string(),
            tab: tab.as_str(),
            scope,
            base_url: format!("/{}", tab.as_str()),
            empty_message,
            error: String::new(),
            draft: String::new(),
        }
    }
}

fn render_feed(
    state: &AppState,
    viewer: Option<&User>,
    uri: &OriginalUri,
    page: PageQuery,
    listing: FeedPage,
) -> AppResult<Response> {
    let req = PageRequest::resolve(page, &state.config.pagination);
    let conn = state.db.get()?;
    let viewer_id = viewer.map(|u| u.id.as_str());

    let page = feed::feed(&conn, &listing.scope, viewer_id, req)?;
    let suggestions = match viewer {
        Some(user) => suggested_users(&conn, &user.id, DEFAULT_SUGGESTIONS)?
            .into_iter()
            .map(|s| UserCard::new(s, viewer))
            .collect(),
        None => Vec::new(),
    };

    let author_filter = match &listing.scope {
        FeedScope::Global { author } => author.clone().unwrap_or_default(),
        _ => String::new(),
    };

    Ok(Html(FeedTemplate {
        nav: Nav::new(viewer, &uri.0),
        title: listing.title,
        tab: listing.tab,
        show_compose: viewer.is_some(),
        author_filter,
        empty_message: listing.empty_message,
        error: listing.error,
        draft: listing.draft,
        pager: Pager::new(&page, &listing.base_url),
        posts: page
            .results
            .into_iter()
            .map(|p| PostCard::new(p, viewer))
            .collect(),
        suggestions,
    })
    .into_response())
}

/// Global feed, optionally filtered by `?author=<username>`.
pub async fn index(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    uri: OriginalUri,
    Query(query): Query<FeedQuery>,
) -> AppResult<Response> {
    let author = query
        .author
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string);
    let viewer = maybe_user.0.as_ref().map(|u| &u.0);
    render_feed(&state, viewer, &uri, query.page_query(), FeedPage::global(author))
}

async fn following(
    State(state): State<AppState>,
    WebUser(user): WebUser,
    uri: OriginalUri,
    Query(page): Query<PageQuery>,
) -> AppResult<Response> {
    let listing = FeedPage::personal(PersonalTab::Following, user.id());
    render_feed(&state, Some(&user.0), &uri, page, listing)
}

async fn bookmarks(
    State(state): State<AppState>,
    WebUser(user): WebUser,
    uri: OriginalUri,
    Query(page): Query<PageQuery>,
) -> AppResult<Response> {
    let listing = FeedPage::personal(PersonalTab::Bookmarks, user.id());
    render_feed(&state, Some(&user.0), &uri, page, listing)
}

async fn liked(
    State(state): State<AppState>,
    WebUser(user): WebUser,
    uri: OriginalUri,
    Query(page): Query<PageQuery>,
) -> AppResult<Response> {
    let listing = FeedPage::personal(PersonalTab::Liked, user.id());
    render_feed(&state, Some(&user.0), &uri, page, listing)
}

/// New original post from the compose box. Invalid input re-renders the
/// home feed with the draft kept.
async fn compose(
    State(state): State<AppState>,
    WebUser(user): WebUser,
    uri: OriginalUri,
    Form(form): Form<ComposeForm>,
) -> AppResult<Response> {
    let created = {
        let conn = state.db.get()?;
        posts::create_post(&conn, user.id(), &form.body)
    };
    match created.map_err(AppError::from) {
        Ok(_) => Ok(Redirect::to(&safe_next(form.next.as_deref(), "/")).into_response()),
        Err(AppError::Validation { message, .. }) => {
            let mut listing = FeedPage::global(None);
            listing.error = message;
            listing.draft = form.body;
            render_feed(&state, Some(&user.0), &uri, PageQuery::default(), listing)
        }
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn personal_tabs_map_to_their_own_scope() {
        let page = FeedPage::personal(PersonalTab::Bookmarks, "u1");
        assert_eq!(page.tab, "bookmarks");
        assert_eq!(page.base_url, "/bookmarks");
        assert!(matches!(page.scope, FeedScope::Bookmarks(ref id) if id == "u1"));

        let page = FeedPage::personal(PersonalTab::Following, "u1");
        assert_eq!(page.base_url, "/following");
        assert!(matches!(page.scope, FeedScope::Following(_)));

        let page = FeedPage::personal(PersonalTab::Liked, "u1");
        assert!(matches!(page.scope, FeedScope::Liked(_)));
    }

    #[test]
    fn author_filter_is_percent_encoded_in_pager_links() {
        let page = FeedPage::global(Some("a+b&c".to_string()));
        assert_eq!(page.base_url, "/?author=a%2Bb%26c");
        assert_eq!(FeedPage::global(None).base_url, "/");
    }
}
