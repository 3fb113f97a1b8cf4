//! Display models for the HTML pages. Templates only read plain fields.

use axum::http::Uri;
use chrono::NaiveDateTime;

use crate::db::models::User;
use crate::social::feed::PostView;
use crate::social::interactions::CommentView;
use crate::social::users::{Profile, UserSummary};
use crate::social::Page;

/// Top navigation state shared by every page.
pub struct Nav {
    pub signed_in: bool,
    pub username: String,
    pub avatar: String,
    pub is_staff: bool,
    /// Path and query of the current page, used as the return target of forms.
    pub here: String,
}

impl Nav {
    pub fn new(viewer: Option<&User>, uri: &Uri) -> Self {
        let here = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        match viewer {
            Some(user) => Self {
                signed_in: true,
                username: user.username.clone(),
                avatar: user.avatar(),
                is_staff: user.is_staff,
                here,
            },
            None => Self {
                signed_in: false,
                username: String::new(),
                avatar: String::new(),
                is_staff: false,
                here,
            },
        }
    }
}

/// Only same-site relative paths are accepted as redirect targets.
pub fn safe_next(next: Option<&str>, fallback: &str) -> String {
    match next {
        Some(n) if n.starts_with('/') && !n.starts_with("//") && !n.contains('\\') => n.to_string(),
        _ => fallback.to_string(),
    }
}

/// `2026-10-17 09:30:12.345` as `Oct 17, 2026 09:30`.
pub fn display_time(ts: &str) -> String {
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S%.f")
        .map(|t| t.format("%b %-d, %Y %H:%M").to_string())
        .unwrap_or_else(|_| ts.to_string())
}

pub struct PostCard {
    pub id: String,
    /// Where likes, bookmarks, comments and reposts go.
    pub subject_id: String,
    pub is_repost: bool,
    pub is_quote: bool,
    pub is_pinned: bool,
    pub is_edited: bool,
    /// The account that created this row (the reposter for reposts).
    pub author_username: String,
    /// Whose words are shown in the card body.
    pub shown_username: String,
    pub shown_name: String,
    pub shown_avatar: String,
    pub text: String,
    pub created_at: String,
    pub has_quoted: bool,
    pub quoted_id: String,
    pub quoted_username: String,
    pub quoted_name: String,
    pub quoted_text: String,
    pub likes_count: i64,
    pub comments_count: i64,
    pub reposts_count: i64,
    pub quotes_count: i64,
    pub is_liked: bool,
    pub is_bookmarked: bool,
    pub is_reposted: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_pin: bool,
}

impl PostCard {
    pub fn new(view: PostView, viewer: Option<&User>) -> Self {
        let owns = viewer.is_some_and(|u| view.is_owned_by(&u.id));
        let staff = viewer.is_some_and(|u| u.is_staff);
        let is_repost = view.is_repost();
        let is_quote = view.is_quote();
        let subject_id = view.subject_id().to_string();

        let (shown_username, shown_name, shown_avatar, text) = match (&view.parent, is_repost) {
            (Some(parent), true) => (
                parent.author.username.clone(),
                parent.author.name.clone(),
                parent.author.avatar.clone(),
                parent.body.clone().unwrap_or_default(),
            ),
            _ => (
                view.author.username.clone(),
                view.author.name.clone(),
                view.author.avatar.clone(),
                view.body.clone().unwrap_or_default(),
            ),
        };

        let quoted = view.parent.as_ref().filter(|_| is_quote);

        Self {
            subject_id,
            is_repost,
            is_quote,
            is_pinned: view.is_pinned,
            is_edited: view.is_edited(),
            author_username: view.author.username.clone(),
            shown_username,
            shown_name,
            shown_avatar,
            text,
            created_at: display_time(&view.created_at),
            has_quoted: quoted.is_some(),
            quoted_id: quoted.map(|p| p.id.clone()).unwrap_or_default(),
            quoted_username: quoted.map(|p| p.author.username.clone()).unwrap_or_default(),
            quoted_name: quoted.map(|p| p.author.name.clone()).unwrap_or_default(),
            quoted_text: quoted.and_then(|p| p.body.clone()).unwrap_or_default(),
            likes_count: view.counts.likes_count,
            comments_count: view.counts.comments_count,
            reposts_count: view.counts.reposts_count,
            quotes_count: view.counts.quotes_count,
            is_liked: view.viewer.is_liked,
            is_bookmarked: view.viewer.is_bookmarked,
            is_reposted: view.viewer.is_reposted,
            can_edit: owns && !is_repost,
            can_delete: owns || staff,
            can_pin: owns && !is_repost,
            id: view.id,
        }
    }
}

pub struct CommentCard {
    pub id: String,
    pub author_username: String,
    pub author_name: String,
    pub author_avatar: String,
    pub body: String,
    pub created_at: String,
    pub can_delete: bool,
}

impl CommentCard {
    pub fn new(comment: CommentView, viewer: Option<&User>) -> Self {
        let can_delete = viewer.is_some_and(|u| u.is_staff || u.id == comment.author_id);
        Self {
            id: comment.id,
            author_username: comment.author_username,
            author_name: comment.author_name,
            author_avatar: comment.author_avatar,
            body: comment.body,
            created_at: display_time(&comment.created_at),
            can_delete,
        }
    }
}

pub struct UserCard {
    pub username: String,
    pub name: String,
    pub avatar: String,
    pub bio: String,
    pub followers_count: i64,
    pub following_count: i64,
    pub posts_count: i64,
    pub is_following: bool,
    pub is_self: bool,
}

impl UserCard {
    pub fn new(summary: UserSummary, viewer: Option<&User>) -> Self {
        let is_self = viewer.is_some_and(|u| u.id == summary.id);
        Self {
            username: summary.username,
            name: summary.name,
            avatar: summary.avatar,
            bio: summary.bio.unwrap_or_default(),
            followers_count: summary.followers_count,
            following_count: summary.following_count,
            posts_count: summary.posts_count,
            is_following: summary.is_following,
            is_self,
        }
    }
}

pub struct ProfileCard {
    pub user: UserCard,
    pub dob: String,
    pub date_joined: String,
}

impl ProfileCard {
    pub fn new(profile: Profile, viewer: Option<&User>) -> Self {
        Self {
            dob: profile.dob.map(|d| d.format("%B %-d, %Y").to_string()).unwrap_or_default(),
            date_joined: display_time(&profile.date_joined),
            user: UserCard::new(profile.summary, viewer),
        }
    }
}

/// Previous/next links for a paginated list.
pub struct Pager {
    pub page: u32,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_url: String,
    pub next_url: String,
}

impl Pager {
    /// `base` is the page URL with any non-pagination query already applied.
    pub fn new<T>(page: &Page<T>, base: &str) -> Self {
        let sep = if base.contains('?') { '&' } else { '?' };
        Self {
            page: page.page,
            has_previous: page.has_previous,
            has_next: page.has_next,
            previous_url: format!("{base}{sep}page={}", page.previous_page()),
            next_url: format!("{base}{sep}page={}", page.next_page()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_must_be_a_local_path() {
        assert_eq!(safe_next(Some("/posts/1"), "/"), "/posts/1");
        assert_eq!(safe_next(Some("//evil.example"), "/"), "/");
        assert_eq!(safe_next(Some("https://evil.example"), "/"), "/");
        assert_eq!(safe_next(None, "/home"), "/home");
    }

    #[test]
    fn timestamps_render_with_or_without_fraction() {
        assert_eq!(display_time("2026-10-17 09:30:12.345"), "Oct 17, 2026 09:30");
        assert_eq!(display_time("2026-01-02 23:05:00"), "Jan 2, 2026 23:05");
        assert_eq!(display_time("garbage"), "garbage");
    }

    #[test]
    fn pager_keeps_existing_query() {
        let page = Page::new(vec![1, 2], 5, crate::social::PageRequest::new(2, 2));
        let pager = Pager::new(&page, "/?author=alice");
        assert_eq!(pager.previous_url, "/?author=alice&page=1");
        assert_eq!(pager.next_url, "/?author=alice&page=3");
        assert!(pager.has_next);

        let pager = Pager::new(&page, "/following");
        assert_eq!(pager.next_url, "/following?page=3");
    }
}
