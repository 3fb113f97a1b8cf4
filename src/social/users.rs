//! Accounts: registration, credentials, profile edits and user listings.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::auth::password;
use crate::db::models::{User, USER_COLUMNS};
use crate::db::{is_unique_violation, now_timestamp};
use crate::social::domain::{
    check_length, normalize_email, normalize_name, normalize_username, validate_password,
    MAX_BIO_CHARS,
};
use crate::social::error::{OptionalRow, SocialError, SocialResult};

pub const DEFAULT_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub dob: Option<NaiveDate>,
    pub avatar: Option<String>,
}

/// A user row with its social counts and the viewer's follow status.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub name: String,
    pub avatar: String,
    pub bio: Option<String>,
    pub followers_count: i64,
    pub following_count: i64,
    pub posts_count: i64,
    pub is_following: bool,
}

/// Full profile for the profile page.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    #[serde(flatten)]
    pub summary: UserSummary,
    pub dob: Option<NaiveDate>,
    pub is_active: bool,
    pub date_joined: String,
}

/// Selects the summary columns for alias `u`; `?1` is the viewer id
/// (empty string for anonymous viewers, which never matches).
pub(crate) const SUMMARY_SELECT: &str = "
    SELECT u.id, u.username, u.name, u.image, u.bio,
           (SELECT COUNT(*) FROM follows f WHERE f.followed_id = u.id) AS followers_count,
           (SELECT COUNT(*) FROM follows f WHERE f.follower_id = u.id) AS following_count,
           (SELECT COUNT(*) FROM posts p WHERE p.author_id = u.id) AS posts_count,
           EXISTS(SELECT 1 FROM follows f WHERE f.follower_id = ?1 AND f.followed_id = u.id) AS is_following,
           u.dob, u.is_active, u.created_at
    FROM users u";

pub(crate) fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<UserSummary> {
    let name: String = row.get(2)?;
    let image: Option<String> = row.get(3)?;
    Ok(UserSummary {
        id: row.get(0)?,
        username: row.get(1)?,
        avatar: crate::social::domain::avatar_url(image.as_deref(), &name),
        name,
        bio: row.get(4)?,
        followers_count: row.get(5)?,
        following_count: row.get(6)?,
        posts_count: row.get(7)?,
        is_following: row.get(8)?,
    })
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        summary: summary_from_row(row)?,
        dob: row.get(9)?,
        is_active: row.get(10)?,
        date_joined: row.get(11)?,
    })
}

pub fn register(conn: &Connection, new: &NewUser) -> SocialResult<User> {
    let username = normalize_username(&new.username)?;
    let email = normalize_email(&new.email)?;
    let name = normalize_name(&new.name)?;
    validate_password(&new.password, &username)?;

    ensure_username_free(conn, &username, None)?;
    ensure_email_free(conn, &email, None)?;

    let id = uuid::Uuid::now_v7().to_string();
    let hash = password::hash_password(&new.password)?;

    let inserted = conn.execute(
        "INSERT INTO users (id, username, email, name, password_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, username, email, name, hash, now_timestamp()],
    );
    match inserted {
        Ok(_) => {}
        // Lost a race with a concurrent registration; report it like the pre-check would.
        Err(e) if is_unique_violation(&e) => {
            ensure_username_free(conn, &username, None)?;
            ensure_email_free(conn, &email, None)?;
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(user_id = %id, %username, "Registered user");
    get_by_id(conn, &id)
}

/// Checks credentials. Inactive accounts cannot log in.
pub fn authenticate(conn: &Connection, username: &str, password_plain: &str) -> SocialResult<User> {
    let invalid = || SocialError::validation("credentials", "Invalid username or password.");

    let username = username.trim().to_lowercase();
    let user = match find_by_username(conn, &username)? {
        Some(user) => user,
        None => return Err(invalid()),
    };
    if !user.is_active || !password::verify_password(password_plain, &user.password_hash) {
        return Err(invalid());
    }
    Ok(user)
}

pub fn get_by_id(conn: &Connection, id: &str) -> SocialResult<User> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1"),
        params![id],
        |row| User::from_row(row, 0),
    )
    .or_not_found("User")
}

pub fn find_by_username(conn: &Connection, username: &str) -> SocialResult<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.username = ?1 COLLATE NOCASE"),
            params![username.trim()],
            |row| User::from_row(row, 0),
        )
        .optional()?)
}

pub fn get_by_username(conn: &Connection, username: &str) -> SocialResult<User> {
    find_by_username(conn, username)?.ok_or(SocialError::NotFound("User"))
}

/// Profile with counts and follow status in a single query.
pub fn get_profile(conn: &Connection, username: &str, viewer_id: Option<&str>) -> SocialResult<Profile> {
    conn.query_row(
        &format!("{SUMMARY_SELECT} WHERE u.username = ?2 COLLATE NOCASE"),
        params![viewer_id.unwrap_or(""), username.trim()],
        profile_from_row,
    )
    .or_not_found("User")
}

pub fn update_profile(conn: &Connection, user_id: &str, update: &ProfileUpdate) -> SocialResult<User> {
    let mut user = get_by_id(conn, user_id)?;

    if let Some(name) = &update.name {
        user.name = normalize_name(name)?;
    }
    if let Some(bio) = &update.bio {
        let bio = bio.trim();
        check_length("bio", bio, MAX_BIO_CHARS)?;
        user.bio = (!bio.is_empty()).then(|| bio.to_string());
    }
    if let Some(dob) = update.dob {
        user.dob = Some(dob);
    }
    if let Some(avatar) = &update.avatar {
        let avatar = avatar.trim();
        if !avatar.is_empty() && !(avatar.starts_with("http://") || avatar.starts_with("https://")) {
            return Err(SocialError::validation("avatar", "Enter a valid URL."));
        }
        user.image = (!avatar.is_empty()).then(|| avatar.to_string());
    }

    conn.execute(
        "UPDATE users SET name = ?1, bio = ?2, dob = ?3, image = ?4 WHERE id = ?5",
        params![user.name, user.bio, user.dob, user.image, user.id],
    )?;
    Ok(user)
}

pub fn change_password(conn: &Connection, user_id: &str, current: &str, new: &str) -> SocialResult<()> {
    let user = get_by_id(conn, user_id)?;
    if !password::verify_password(current, &user.password_hash) {
        return Err(SocialError::validation(
            "current_password",
            "Current password is incorrect.",
        ));
    }
    validate_password(new, &user.username).map_err(|e| retarget(e, "new_password", None))?;

    let hash = password::hash_password(new)?;
    conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE id = ?2",
        params![hash, user.id],
    )?;
    tracing::info!(user_id = %user.id, "Password changed");
    Ok(())
}

pub fn change_email(conn: &Connection, user_id: &str, new_email: &str, password_plain: &str) -> SocialResult<User> {
    let user = confirm_password(conn, user_id, password_plain)?;
    let email = normalize_email(new_email).map_err(|e| retarget(e, "new_email", None))?;
    ensure_email_free(conn, &email, Some(&user.id))
        .map_err(|e| retarget(e, "new_email", Some("Email already in use.")))?;

    conn.execute("UPDATE users SET email = ?1 WHERE id = ?2", params![email, user.id])
        .map_err(|e| unique_as_field(e, "new_email", "Email already in use."))?;
    get_by_id(conn, &user.id)
}

pub fn change_username(conn: &Connection, user_id: &str, new_username: &str, password_plain: &str) -> SocialResult<User> {
    let user = confirm_password(conn, user_id, password_plain)?;
    let username = normalize_username(new_username).map_err(|e| retarget(e, "new_username", None))?;
    ensure_username_free(conn, &username, Some(&user.id))
        .map_err(|e| retarget(e, "new_username", Some("Username already taken.")))?;

    conn.execute(
        "UPDATE users SET username = ?1 WHERE id = ?2",
        params![username, user.id],
    )
    .map_err(|e| unique_as_field(e, "new_username", "Username already taken."))?;
    get_by_id(conn, &user.id)
}

/// Soft delete: the account stays but can no longer log in.
pub fn deactivate(conn: &Connection, user_id: &str, password_plain: &str) -> SocialResult<()> {
    let user = confirm_password(conn, user_id, password_plain)?;
    let tx = conn.unchecked_transaction()?;
    tx.execute("UPDATE users SET is_active = 0 WHERE id = ?1", params![user.id])?;
    tx.execute("DELETE FROM sessions WHERE user_id = ?1", params![user.id])?;
    tx.commit()?;
    tracing::info!(user_id = %user.id, "Account deactivated");
    Ok(())
}

/// Hard delete; follows, posts, comments, reactions and bookmarks cascade.
pub fn delete_account(conn: &Connection, user_id: &str, password_plain: &str) -> SocialResult<()> {
    let user = confirm_password(conn, user_id, password_plain)?;
    conn.execute("DELETE FROM users WHERE id = ?1", params![user.id])?;
    tracing::info!(user_id = %user.id, "Account deleted");
    Ok(())
}

pub fn set_staff(conn: &Connection, username: &str, is_staff: bool) -> SocialResult<()> {
    let changed = conn.execute(
        "UPDATE users SET is_staff = ?1 WHERE username = ?2 COLLATE NOCASE",
        params![is_staff, username.trim()],
    )?;
    if changed == 0 {
        return Err(SocialError::NotFound("User"));
    }
    Ok(())
}

/// Staff see every account, everyone else only their own.
pub fn list_users(conn: &Connection, viewer: &User) -> SocialResult<Vec<User>> {
    let sql = if viewer.is_staff {
        format!("SELECT {USER_COLUMNS} FROM users u ORDER BY u.username")
    } else {
        format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1")
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = if viewer.is_staff {
        stmt.query_map([], |row| User::from_row(row, 0))?
            .collect::<Result<Vec<_>, _>>()?
    } else {
        stmt.query_map(params![viewer.id], |row| User::from_row(row, 0))?
            .collect::<Result<Vec<_>, _>>()?
    };
    Ok(rows)
}

/// Case-insensitive substring match on username or display name.
pub fn search(conn: &Connection, query: &str, viewer_id: Option<&str>) -> SocialResult<Vec<UserSummary>> {
    let pattern = format!("%{}%", escape_like(query.trim()));
    let mut stmt = conn.prepare(&format!(
        "{SUMMARY_SELECT}
         WHERE u.is_active = 1
           AND (u.username LIKE ?2 ESCAPE '\\' OR u.name LIKE ?2 ESCAPE '\\')
         ORDER BY u.username
         LIMIT 50"
    ))?;
    let users = stmt
        .query_map(params![viewer_id.unwrap_or(""), pattern], summary_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

/// Active accounts the viewer does not follow yet, most followed first.
pub fn suggested_users(conn: &Connection, viewer_id: &str, limit: usize) -> SocialResult<Vec<UserSummary>> {
    let mut stmt = conn.prepare(&format!(
        "{SUMMARY_SELECT}
         WHERE u.is_active = 1
           AND u.id <> ?1
           AND NOT EXISTS (SELECT 1 FROM follows f WHERE f.follower_id = ?1 AND f.followed_id = u.id)
         ORDER BY followers_count DESC, u.created_at DESC
         LIMIT ?2"
    ))?;
    let users = stmt
        .query_map(params![viewer_id, limit as i64], summary_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

fn confirm_password(conn: &Connection, user_id: &str, password_plain: &str) -> SocialResult<User> {
    let user = get_by_id(conn, user_id)?;
    if !password::verify_password(password_plain, &user.password_hash) {
        return Err(SocialError::validation("password", "Incorrect password."));
    }
    Ok(user)
}

fn ensure_username_free(conn: &Connection, username: &str, except: Option<&str>) -> SocialResult<()> {
    let taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1 COLLATE NOCASE AND id <> ?2)",
        params![username, except.unwrap_or("")],
        |r| r.get(0),
    )?;
    if taken {
        return Err(SocialError::validation(
            "username",
            "A user with that username already exists.",
        ));
    }
    Ok(())
}

fn ensure_email_free(conn: &Connection, email: &str, except: Option<&str>) -> SocialResult<()> {
    let taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1 COLLATE NOCASE AND id <> ?2)",
        params![email, except.unwrap_or("")],
        |r| r.get(0),
    )?;
    if taken {
        return Err(SocialError::validation(
            "email",
            "A user with that email already exists.",
        ));
    }
    Ok(())
}

/// Moves a validation error onto another field, optionally rewording it.
fn retarget(e: SocialError, field: &'static str, message: Option<&str>) -> SocialError {
    match e {
        SocialError::Validation { message: original, .. } => {
            SocialError::validation(field, message.map(str::to_string).unwrap_or(original))
        }
        other => other,
    }
}

fn unique_as_field(e: rusqlite::Error, field: &'static str, message: &str) -> SocialError {
    if is_unique_violation(&e) {
        SocialError::validation(field, message)
    } else {
        e.into()
    }
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
