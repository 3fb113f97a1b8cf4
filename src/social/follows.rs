//! Directed follow edges between users.

use rusqlite::{params, Connection};

use crate::db::{immediate_transaction, is_unique_violation, now_timestamp};
use crate::social::domain::Toggle;
use crate::social::error::{SocialError, SocialResult};
use crate::social::pagination::{Page, PageRequest};
use crate::social::users::{summary_from_row, UserSummary, SUMMARY_SELECT};

/// Follow `followed_id` if not followed yet, otherwise unfollow.
pub fn toggle_follow(conn: &Connection, follower_id: &str, followed_id: &str) -> SocialResult<Toggle> {
    if follower_id == followed_id {
        return Err(SocialError::validation("user", "Users cannot follow themselves."));
    }
    ensure_user_exists(conn, followed_id)?;

    let tx = immediate_transaction(conn)?;
    let removed = tx.execute(
        "DELETE FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
        params![follower_id, followed_id],
    )?;

    let outcome = if removed > 0 {
        Toggle::Removed
    } else {
        let id = uuid::Uuid::now_v7().to_string();
        match tx.execute(
            "INSERT INTO follows (id, follower_id, followed_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, follower_id, followed_id, now_timestamp()],
        ) {
            Ok(_) => Toggle::Added,
            // A concurrent request created the edge first; the end state is the same.
            Err(e) if is_unique_violation(&e) => Toggle::Added,
            Err(e) => return Err(e.into()),
        }
    };
    tx.commit()?;

    tracing::debug!(follower_id, followed_id, ?outcome, "Toggled follow");
    Ok(outcome)
}

pub fn is_following(conn: &Connection, follower_id: &str, followed_id: &str) -> SocialResult<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND followed_id = ?2)",
        params![follower_id, followed_id],
        |r| r.get(0),
    )?)
}

/// Users following `user_id`, most recent follow first.
pub fn followers(
    conn: &Connection,
    user_id: &str,
    viewer_id: Option<&str>,
    req: PageRequest,
) -> SocialResult<Page<UserSummary>> {
    edge_page(conn, Edge::Followers, user_id, viewer_id, req)
}

/// Users `user_id` follows, most recent follow first.
pub fn following(
    conn: &Connection,
    user_id: &str,
    viewer_id: Option<&str>,
    req: PageRequest,
) -> SocialResult<Page<UserSummary>> {
    edge_page(conn, Edge::Following, user_id, viewer_id, req)
}

/// Users that `user_id` follows and who follow `user_id` back.
pub fn mutual_follows(conn: &Connection, user_id: &str, viewer_id: Option<&str>) -> SocialResult<Vec<UserSummary>> {
    let mut stmt = conn.prepare(&format!(
        "{SUMMARY_SELECT}
         JOIN follows out ON out.followed_id = u.id AND out.follower_id = ?2
         JOIN follows back ON back.follower_id = u.id AND back.followed_id = ?2
         ORDER BY out.created_at DESC, out.rowid DESC"
    ))?;
    let users = stmt
        .query_map(params![viewer_id.unwrap_or(""), user_id], summary_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

/// `(followers, following)` for a user.
pub fn follow_counts(conn: &Connection, user_id: &str) -> SocialResult<(i64, i64)> {
    Ok(conn.query_row(
        "SELECT (SELECT COUNT(*) FROM follows WHERE followed_id = ?1),
                (SELECT COUNT(*) FROM follows WHERE follower_id = ?1)",
        params![user_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?)
}

#[derive(Clone, Copy)]
enum Edge {
    Followers,
    Following,
}

fn edge_page(
    conn: &Connection,
    edge: Edge,
    user_id: &str,
    viewer_id: Option<&str>,
    req: PageRequest,
) -> SocialResult<Page<UserSummary>> {
    ensure_user_exists(conn, user_id)?;

    // `fo.<anchor>` is the profile owner, `fo.<other>` the listed user.
    let (anchor, other) = match edge {
        Edge::Followers => ("followed_id", "follower_id"),
        Edge::Following => ("follower_id", "followed_id"),
    };

    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM follows WHERE {anchor} = ?1"),
        params![user_id],
        |r| r.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "{SUMMARY_SELECT}
         JOIN follows fo ON fo.{other} = u.id
         WHERE fo.{anchor} = ?2
         ORDER BY fo.created_at DESC, fo.rowid DESC
         LIMIT ?3 OFFSET ?4"
    ))?;
    let users = stmt
        .query_map(
            params![viewer_id.unwrap_or(""), user_id, req.limit(), req.offset()],
            summary_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page::new(users, count, req))
}

fn ensure_user_exists(conn: &Connection, user_id: &str) -> SocialResult<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
        params![user_id],
        |r| r.get(0),
    )?;
    if !exists {
        return Err(SocialError::NotFound("User"));
    }
    Ok(())
}
