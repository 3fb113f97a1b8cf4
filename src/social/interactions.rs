//! Reactions, bookmarks and comments. None of them attach to reposts.

use rusqlite::{params, Connection, Row};
use serde::Serialize;

use crate::db::models::Comment;
use crate::db::{immediate_transaction, is_unique_violation, now_timestamp};
use crate::social::domain::{avatar_url, check_length, normalize_body, PostKind, Toggle, MAX_BODY_CHARS};
use crate::social::error::{OptionalRow, SocialError, SocialResult};
use crate::social::pagination::{Page, PageRequest};
use crate::social::posts::load_kind;
use crate::social::Actor;

#[derive(Clone, Copy)]
enum Mark {
    Reaction,
    Bookmark,
}

impl Mark {
    fn table(self) -> &'static str {
        match self {
            Self::Reaction => "reactions",
            Self::Bookmark => "bookmarks",
        }
    }

    fn repost_message(self) -> &'static str {
        match self {
            Self::Reaction => "Cannot react to a repost. React to the original post instead.",
            Self::Bookmark => "Cannot bookmark a repost. Bookmark the original post instead.",
        }
    }
}

/// Like `post_id`, or remove the like.
pub fn toggle_reaction(conn: &Connection, user_id: &str, post_id: &str) -> SocialResult<Toggle> {
    toggle_mark(conn, Mark::Reaction, user_id, post_id)
}

/// Bookmark `post_id`, or remove the bookmark.
pub fn toggle_bookmark(conn: &Connection, user_id: &str, post_id: &str) -> SocialResult<Toggle> {
    toggle_mark(conn, Mark::Bookmark, user_id, post_id)
}

fn toggle_mark(conn: &Connection, mark: Mark, user_id: &str, post_id: &str) -> SocialResult<Toggle> {
    let table = mark.table();
    let tx = immediate_transaction(conn)?;

    let removed = tx.execute(
        &format!("DELETE FROM {table} WHERE user_id = ?1 AND post_id = ?2"),
        params![user_id, post_id],
    )?;

    let outcome = if removed > 0 {
        Toggle::Removed
    } else {
        if load_kind(&tx, post_id)? == PostKind::Repost {
            return Err(SocialError::validation("post", mark.repost_message()));
        }
        let id = uuid::Uuid::now_v7().to_string();
        match tx.execute(
            &format!("INSERT INTO {table} (id, post_id, user_id, created_at) VALUES (?1, ?2, ?3, ?4)"),
            params![id, post_id, user_id, now_timestamp()],
        ) {
            Ok(_) => Toggle::Added,
            Err(e) if is_unique_violation(&e) => Toggle::Added,
            Err(e) => return Err(e.into()),
        }
    };
    tx.commit()?;

    tracing::debug!(table, user_id, post_id, ?outcome, "Toggled mark");
    Ok(outcome)
}

/// A comment joined with its author for display.
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub author_username: String,
    pub author_name: String,
    pub author_avatar: String,
    pub body: String,
    pub created_at: String,
    pub updated_at: String,
}

const COMMENT_SELECT: &str = "
    SELECT c.id, c.post_id, c.author_id, u.username, u.name, u.image,
           c.body, c.created_at, c.updated_at
    FROM comments c
    JOIN users u ON u.id = c.author_id";

fn comment_view_from_row(row: &Row<'_>) -> rusqlite::Result<CommentView> {
    let name: String = row.get(4)?;
    let image: Option<String> = row.get(5)?;
    Ok(CommentView {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        author_username: row.get(3)?,
        author_avatar: avatar_url(image.as_deref(), &name),
        author_name: name,
        body: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn comment_body(body: &str) -> SocialResult<String> {
    let body = normalize_body(Some(body))
        .ok_or_else(|| SocialError::validation("body", "Comment body cannot be empty."))?;
    check_length("body", &body, MAX_BODY_CHARS)?;
    Ok(body)
}

pub fn get_comment(conn: &Connection, comment_id: &str) -> SocialResult<Comment> {
    conn.query_row(
        "SELECT id, post_id, author_id, body, created_at, updated_at FROM comments WHERE id = ?1",
        params![comment_id],
        |r| {
            Ok(Comment {
                id: r.get(0)?,
                post_id: r.get(1)?,
                author_id: r.get(2)?,
                body: r.get(3)?,
                created_at: r.get(4)?,
                updated_at: r.get(5)?,
            })
        },
    )
    .or_not_found("Comment")
}

pub fn get_comment_view(conn: &Connection, comment_id: &str) -> SocialResult<CommentView> {
    conn.query_row(
        &format!("{COMMENT_SELECT} WHERE c.id = ?1"),
        params![comment_id],
        comment_view_from_row,
    )
    .or_not_found("Comment")
}

pub fn add_comment(conn: &Connection, author_id: &str, post_id: &str, body: &str) -> SocialResult<CommentView> {
    let body = comment_body(body)?;
    if load_kind(conn, post_id)? == PostKind::Repost {
        return Err(SocialError::validation(
            "post",
            "Cannot comment on a repost. Comment on the original post instead.",
        ));
    }

    let id = uuid::Uuid::now_v7().to_string();
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO comments (id, post_id, author_id, body, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![id, post_id, author_id, body, now],
    )?;

    tracing::info!(comment_id = %id, post_id, author_id, "Added comment");
    get_comment_view(conn, &id)
}

pub fn edit_comment(conn: &Connection, actor: &Actor<'_>, comment_id: &str, body: &str) -> SocialResult<CommentView> {
    let comment = get_comment(conn, comment_id)?;
    if comment.author_id != actor.id {
        return Err(SocialError::forbidden("You can only edit your own comments."));
    }
    let body = comment_body(body)?;
    conn.execute(
        "UPDATE comments SET body = ?1, updated_at = ?2 WHERE id = ?3",
        params![body, now_timestamp(), comment.id],
    )?;
    get_comment_view(conn, comment_id)
}

/// Author or staff only.
pub fn delete_comment(conn: &Connection, actor: &Actor<'_>, comment_id: &str) -> SocialResult<()> {
    let comment = get_comment(conn, comment_id)?;
    if comment.author_id != actor.id && !actor.is_staff {
        return Err(SocialError::forbidden("You can only delete your own comments."));
    }
    conn.execute("DELETE FROM comments WHERE id = ?1", params![comment.id])?;
    tracing::info!(comment_id, actor_id = actor.id, "Deleted comment");
    Ok(())
}

/// Comments on a post, newest first.
pub fn list_comments(conn: &Connection, post_id: &str, req: PageRequest) -> SocialResult<Page<CommentView>> {
    load_kind(conn, post_id)?;

    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM comments WHERE post_id = ?1",
        params![post_id],
        |r| r.get(0),
    )?;
    let mut stmt = conn.prepare(&format!(
        "{COMMENT_SELECT}
         WHERE c.post_id = ?1
         ORDER BY c.created_at DESC, c.rowid DESC
         LIMIT ?2 OFFSET ?3"
    ))?;
    let comments = stmt
        .query_map(params![post_id, req.limit(), req.offset()], comment_view_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page::new(comments, count, req))
}
