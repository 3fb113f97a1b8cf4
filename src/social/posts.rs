//! The post tree: originals, reposts and quotes linked through `parent_id`.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;

use crate::db::models::Post;
use crate::db::{immediate_transaction, is_unique_violation, now_timestamp};
use crate::social::domain::{normalize_body, validate_shape, PostKind, PostShape, Toggle};
use crate::social::error::{OptionalRow, SocialError, SocialResult};
use crate::social::Actor;

/// Upper bound on ancestor hops when checking for loops. Only originals and
/// quotes can be parents, so real chains are quote-of-quote chains.
pub const MAX_ANCESTOR_HOPS: usize = 10_000;

/// Changes an author may make to an existing post.
#[derive(Debug, Clone, Default)]
pub struct PostEdit {
    pub body: Option<String>,
    pub parent_id: Option<String>,
}

pub fn get_post(conn: &Connection, post_id: &str) -> SocialResult<Post> {
    conn.query_row(
        &format!("SELECT {} FROM posts WHERE id = ?1", Post::COLUMNS),
        params![post_id],
        Post::from_row,
    )
    .or_not_found("Post")
}

pub fn kind_of(post: &Post) -> PostKind {
    // Stored rows always satisfy the schema CHECK, so a row with no parent has a body.
    PostKind::classify(post.parent_id.is_some(), post.body.as_deref()).unwrap_or(PostKind::Original)
}

/// Kind of an existing post, `NotFound` if it does not exist.
pub fn load_kind(conn: &Connection, post_id: &str) -> SocialResult<PostKind> {
    get_post(conn, post_id).map(|p| kind_of(&p))
}

/// Runs every tree rule against the post as it would be written.
fn validate(conn: &Connection, shape: &PostShape<'_>) -> SocialResult<PostKind> {
    let parent_kind = match shape.parent_id {
        Some(parent_id) => Some(load_kind(conn, parent_id).map_err(|e| match e {
            SocialError::NotFound(_) => SocialError::validation("parent", "Parent post does not exist."),
            other => other,
        })?),
        None => None,
    };

    let kind = validate_shape(shape, parent_kind)?;

    if let (Some(id), Some(parent_id)) = (shape.id, shape.parent_id) {
        if creates_loop(conn, id, parent_id)? {
            return Err(SocialError::validation(
                "parent",
                "Post repost/quote chain cannot form a loop.",
            ));
        }
    }

    Ok(kind)
}

/// Walks up from `parent_id` and reports whether `post_id` is among its
/// ancestors. A chain that revisits a node or exceeds the hop limit is
/// treated as a loop so that corrupt data cannot spin forever.
pub fn creates_loop(conn: &Connection, post_id: &str, parent_id: &str) -> SocialResult<bool> {
    reaches_within(conn, post_id, parent_id, MAX_ANCESTOR_HOPS)
}

fn reaches_within(conn: &Connection, post_id: &str, parent_id: &str, max_hops: usize) -> SocialResult<bool> {
    let mut stmt = conn.prepare_cached("SELECT parent_id FROM posts WHERE id = ?1")?;
    let mut visited = HashSet::new();
    let mut current = Some(parent_id.to_string());

    while let Some(ancestor) = current {
        if ancestor == post_id {
            return Ok(true);
        }
        if !visited.insert(ancestor.clone()) || visited.len() > max_hops {
            tracing::warn!(post_id, ancestor = %ancestor, "Ancestor walk hit a cycle or the hop limit");
            return Ok(true);
        }
        current = stmt
            .query_row(params![ancestor], |r| r.get::<_, Option<String>>(0))
            .optional()?
            .flatten();
    }

    Ok(false)
}

/// Create an original post.
pub fn create_post(conn: &Connection, author_id: &str, body: &str) -> SocialResult<Post> {
    let body = normalize_body(Some(body));
    let id = uuid::Uuid::now_v7().to_string();
    let shape = PostShape {
        id: Some(&id),
        parent_id: None,
        body: body.as_deref(),
        is_pinned: false,
    };
    validate(conn, &shape)?;
    insert(conn, &id, author_id, body.as_deref(), None)?;

    tracing::info!(post_id = %id, author_id, "Created post");
    get_post(conn, &id)
}

/// Quote `parent_id` with a body of the author's own. Any number of quotes
/// per author and parent are allowed.
pub fn quote_post(conn: &Connection, author_id: &str, parent_id: &str, body: &str) -> SocialResult<Post> {
    let body = normalize_body(Some(body));
    if body.is_none() {
        return Err(SocialError::validation("body", "A quote must have a body."));
    }
    let id = uuid::Uuid::now_v7().to_string();
    let shape = PostShape {
        id: Some(&id),
        parent_id: Some(parent_id),
        body: body.as_deref(),
        is_pinned: false,
    };
    validate(conn, &shape)?;
    insert(conn, &id, author_id, body.as_deref(), Some(parent_id))?;

    tracing::info!(post_id = %id, parent_id, author_id, "Created quote");
    get_post(conn, &id)
}

/// Repost `parent_id`, or undo the author's existing repost of it.
pub fn toggle_repost(conn: &Connection, author_id: &str, parent_id: &str) -> SocialResult<Toggle> {
    let tx = immediate_transaction(conn)?;

    let removed = tx.execute(
        "DELETE FROM posts WHERE author_id = ?1 AND parent_id = ?2 AND body IS NULL",
        params![author_id, parent_id],
    )?;

    let outcome = if removed > 0 {
        Toggle::Removed
    } else {
        let id = uuid::Uuid::now_v7().to_string();
        let shape = PostShape {
            id: Some(&id),
            parent_id: Some(parent_id),
            body: None,
            is_pinned: false,
        };
        validate(&tx, &shape)?;
        match insert(&tx, &id, author_id, None, Some(parent_id)) {
            Ok(()) => Toggle::Added,
            Err(SocialError::Sql(e)) if is_unique_violation(&e) => Toggle::Added,
            Err(e) => return Err(e),
        }
    };
    tx.commit()?;

    tracing::info!(parent_id, author_id, ?outcome, "Toggled repost");
    Ok(outcome)
}

/// Author-only edit. The body may be replaced and the parent re-pointed;
/// the result must still satisfy every tree rule.
pub fn edit_post(conn: &Connection, actor: &Actor<'_>, post_id: &str, edit: &PostEdit) -> SocialResult<Post> {
    let tx = immediate_transaction(conn)?;
    let post = get_post(&tx, post_id)?;
    if post.author_id != actor.id {
        return Err(SocialError::forbidden("You can only edit your own posts."));
    }

    let current_kind = kind_of(&post);
    let body = match &edit.body {
        Some(body) => normalize_body(Some(body)),
        None => post.body.clone(),
    };
    let parent_id = edit.parent_id.as_deref().or(post.parent_id.as_deref());

    let shape = PostShape {
        id: Some(&post.id),
        parent_id,
        body: body.as_deref(),
        is_pinned: post.is_pinned,
    };
    let kind = validate(&tx, &shape)?;
    if kind == PostKind::Repost && current_kind != PostKind::Repost {
        return Err(SocialError::validation(
            "body",
            "Post body cannot be removed. Delete the post instead.",
        ));
    }

    tx.execute(
        "UPDATE posts SET body = ?1, parent_id = ?2, updated_at = ?3 WHERE id = ?4",
        params![body, parent_id, now_timestamp(), post.id],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            SocialError::validation("parent", "You have already reposted this post.")
        } else {
            e.into()
        }
    })?;
    tx.commit()?;

    tracing::info!(post_id, kind = %kind, "Edited post");
    get_post(conn, post_id)
}

/// Author or staff only. Reposts, quotes, comments, reactions and
/// bookmarks of the post go with it.
pub fn delete_post(conn: &Connection, actor: &Actor<'_>, post_id: &str) -> SocialResult<()> {
    let post = get_post(conn, post_id)?;
    if post.author_id != actor.id && !actor.is_staff {
        return Err(SocialError::forbidden("You can only delete your own posts."));
    }
    conn.execute("DELETE FROM posts WHERE id = ?1", params![post.id])?;
    tracing::info!(post_id, actor_id = actor.id, "Deleted post");
    Ok(())
}

/// Pin `post_id` (unpinning whatever the author had pinned) or unpin it if
/// it already is. The swap happens in one transaction.
pub fn toggle_pin(conn: &Connection, actor: &Actor<'_>, post_id: &str) -> SocialResult<Toggle> {
    let tx = immediate_transaction(conn)?;
    let post = get_post(&tx, post_id)?;
    if post.author_id != actor.id {
        return Err(SocialError::forbidden("You can only pin your own posts."));
    }

    let outcome = if post.is_pinned {
        tx.execute("UPDATE posts SET is_pinned = 0 WHERE id = ?1", params![post.id])?;
        Toggle::Removed
    } else {
        let shape = PostShape {
            id: Some(&post.id),
            parent_id: post.parent_id.as_deref(),
            body: post.body.as_deref(),
            is_pinned: true,
        };
        validate_shape(&shape, None)?;
        tx.execute(
            "UPDATE posts SET is_pinned = 0 WHERE author_id = ?1 AND is_pinned = 1",
            params![post.author_id],
        )?;
        tx.execute("UPDATE posts SET is_pinned = 1 WHERE id = ?1", params![post.id])?;
        Toggle::Added
    };
    tx.commit()?;

    tracing::info!(post_id, ?outcome, "Toggled pin");
    Ok(outcome)
}

pub fn pinned_post_id(conn: &Connection, author_id: &str) -> SocialResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT id FROM posts WHERE author_id = ?1 AND is_pinned = 1",
            params![author_id],
            |r| r.get(0),
        )
        .optional()?)
}

fn insert(conn: &Connection, id: &str, author_id: &str, body: Option<&str>, parent_id: Option<&str>) -> SocialResult<()> {
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO posts (id, author_id, body, parent_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![id, author_id, body, parent_id, now],
    )?;
    Ok(())
}
