//! Feed composition. Every page is one SQL statement: author, parent snapshot,
//! counts and viewer flags are joined or sub-selected per row, never fetched
//! per post afterwards.

use rusqlite::{params, Connection, Row};
use serde::Serialize;

use crate::social::domain::{avatar_url, PostKind};
use crate::social::error::{OptionalRow, SocialResult};
use crate::social::pagination::{Page, PageRequest};

/// Which posts a feed contains and how they are ordered.
#[derive(Debug, Clone)]
pub enum FeedScope {
    /// Everyone's posts, optionally narrowed to one author's username.
    Global { author: Option<String> },
    /// Posts by the users `viewer_id` follows.
    Following(String),
    /// One author's posts, pinned post first.
    Profile(String),
    /// Posts the user bookmarked, most recent bookmark first.
    Bookmarks(String),
    /// Posts the user liked, most recent like first.
    Liked(String),
}

impl FeedScope {
    fn join(&self) -> &'static str {
        match self {
            Self::Bookmarks(_) => "JOIN bookmarks m ON m.post_id = p.id AND m.user_id = ?2",
            Self::Liked(_) => "JOIN reactions m ON m.post_id = p.id AND m.user_id = ?2",
            _ => "",
        }
    }

    fn filter(&self) -> &'static str {
        match self {
            Self::Global { .. } => "?2 IS NULL OR a.username = ?2",
            Self::Following(_) => "p.author_id IN (SELECT followed_id FROM follows WHERE follower_id = ?2)",
            Self::Profile(_) => "p.author_id = ?2",
            Self::Bookmarks(_) | Self::Liked(_) => "1",
        }
    }

    fn order(&self) -> &'static str {
        match self {
            Self::Global { .. } | Self::Following(_) => "p.created_at DESC, p.seq DESC",
            Self::Profile(_) => "p.is_pinned DESC, p.created_at DESC, p.seq DESC",
            Self::Bookmarks(_) | Self::Liked(_) => "m.created_at DESC, m.rowid DESC",
        }
    }

    fn arg(&self) -> Option<&str> {
        match self {
            Self::Global { author } => author.as_deref().map(str::trim).filter(|a| !a.is_empty()),
            Self::Following(id) | Self::Profile(id) | Self::Bookmarks(id) | Self::Liked(id) => Some(id),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorRef {
    pub id: String,
    pub username: String,
    pub name: String,
    pub avatar: String,
}

/// What a quote or repost points at, as of the read.
#[derive(Debug, Clone, Serialize)]
pub struct ParentSnapshot {
    pub id: String,
    pub body: Option<String>,
    pub created_at: String,
    pub author: AuthorRef,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PostCounts {
    pub likes_count: i64,
    pub comments_count: i64,
    pub reposts_count: i64,
    pub quotes_count: i64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ViewerFlags {
    pub is_liked: bool,
    pub is_bookmarked: bool,
    pub is_reposted: bool,
    pub is_quoted: bool,
}

/// A post ready for display. For reposts, `counts` and `viewer` describe
/// the reposted parent, since that is what readers interact with.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: String,
    pub kind: PostKind,
    pub body: Option<String>,
    pub parent_id: Option<String>,
    pub is_pinned: bool,
    pub created_at: String,
    pub updated_at: String,
    pub author: AuthorRef,
    pub parent: Option<ParentSnapshot>,
    #[serde(flatten)]
    pub counts: PostCounts,
    #[serde(flatten)]
    pub viewer: ViewerFlags,
}

impl PostView {
    pub fn is_repost(&self) -> bool {
        self.kind == PostKind::Repost
    }

    pub fn is_quote(&self) -> bool {
        self.kind == PostKind::Quote
    }

    pub fn is_edited(&self) -> bool {
        self.updated_at != self.created_at
    }

    /// The post that likes, bookmarks, comments and reposts act on.
    pub fn subject_id(&self) -> &str {
        match (&self.kind, &self.parent_id) {
            (PostKind::Repost, Some(parent_id)) => parent_id,
            _ => &self.id,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.author.id == user_id
    }
}

// `p` exposes `subject_id` (the parent for reposts) and `seq` (rowid) so
// counts, flags and tie-breaks can be expressed against the derived table.
const VIEW_SELECT: &str = "
    SELECT p.id, p.body, p.parent_id, p.is_pinned, p.created_at, p.updated_at,
           a.id, a.username, a.name, a.image,
           pp.id, pp.body, pp.created_at, pa.id, pa.username, pa.name, pa.image,
           (SELECT COUNT(*) FROM reactions r WHERE r.post_id = p.subject_id),
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.subject_id),
           (SELECT COUNT(*) FROM posts ch WHERE ch.parent_id = p.subject_id AND ch.body IS NULL),
           (SELECT COUNT(*) FROM posts ch WHERE ch.parent_id = p.subject_id AND ch.body IS NOT NULL),
           EXISTS(SELECT 1 FROM reactions r WHERE r.post_id = p.subject_id AND r.user_id = ?1),
           EXISTS(SELECT 1 FROM bookmarks b WHERE b.post_id = p.subject_id AND b.user_id = ?1),
           EXISTS(SELECT 1 FROM posts ch WHERE ch.parent_id = p.subject_id AND ch.author_id = ?1 AND ch.body IS NULL),
           EXISTS(SELECT 1 FROM posts ch WHERE ch.parent_id = p.subject_id AND ch.author_id = ?1 AND ch.body IS NOT NULL)
    FROM (SELECT posts.*, posts.rowid AS seq,
                 CASE WHEN posts.body IS NULL THEN posts.parent_id ELSE posts.id END AS subject_id
          FROM posts) p
    JOIN users a ON a.id = p.author_id
    LEFT JOIN posts pp ON pp.id = p.parent_id
    LEFT JOIN users pa ON pa.id = pp.author_id";

fn author_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<AuthorRef> {
    let name: String = row.get(offset + 2)?;
    let image: Option<String> = row.get(offset + 3)?;
    Ok(AuthorRef {
        id: row.get(offset)?,
        username: row.get(offset + 1)?,
        avatar: avatar_url(image.as_deref(), &name),
        name,
    })
}

fn view_from_row(row: &Row<'_>) -> rusqlite::Result<PostView> {
    let body: Option<String> = row.get(1)?;
    let parent_id: Option<String> = row.get(2)?;
    let kind = PostKind::classify(parent_id.is_some(), body.as_deref()).unwrap_or(PostKind::Original);

    let parent = match row.get::<_, Option<String>>(10)? {
        Some(id) => Some(ParentSnapshot {
            id,
            body: row.get(11)?,
            created_at: row.get(12)?,
            author: author_at(row, 13)?,
        }),
        None => None,
    };

    Ok(PostView {
        id: row.get(0)?,
        kind,
        body,
        parent_id,
        is_pinned: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        author: author_at(row, 6)?,
        parent,
        counts: PostCounts {
            likes_count: row.get(17)?,
            comments_count: row.get(18)?,
            reposts_count: row.get(19)?,
            quotes_count: row.get(20)?,
        },
        viewer: ViewerFlags {
            is_liked: row.get(21)?,
            is_bookmarked: row.get(22)?,
            is_reposted: row.get(23)?,
            is_quoted: row.get(24)?,
        },
    })
}

/// One page of `scope`, annotated for `viewer_id`.
pub fn feed(
    conn: &Connection,
    scope: &FeedScope,
    viewer_id: Option<&str>,
    req: PageRequest,
) -> SocialResult<Page<PostView>> {
    let viewer = viewer_id.unwrap_or("");
    let arg = scope.arg();
    let (join, filter, order) = (scope.join(), scope.filter(), scope.order());

    let count: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM (SELECT posts.*, posts.rowid AS seq FROM posts) p
             JOIN users a ON a.id = p.author_id
             {join}
             WHERE {filter}"
        ),
        params![viewer, arg],
        |r| r.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "{VIEW_SELECT}
         {join}
         WHERE {filter}
         ORDER BY {order}
         LIMIT ?3 OFFSET ?4"
    ))?;
    let posts = stmt
        .query_map(params![viewer, arg, req.limit(), req.offset()], view_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(?scope, page = req.page, returned = posts.len(), total = count, "Composed feed");
    Ok(Page::new(posts, count, req))
}

/// A single post with the same annotations a feed row carries.
pub fn post_detail(conn: &Connection, post_id: &str, viewer_id: Option<&str>) -> SocialResult<PostView> {
    conn.query_row(
        &format!("{VIEW_SELECT} WHERE p.id = ?2"),
        params![viewer_id.unwrap_or(""), post_id],
        view_from_row,
    )
    .or_not_found("Post")
}
