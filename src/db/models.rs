use chrono::NaiveDate;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Column list matching [`User::from_row`].
pub const USER_COLUMNS: &str =
    "u.id, u.username, u.email, u.name, u.password_hash, u.image, u.dob, u.bio, u.is_active, u.is_staff, u.created_at";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub image: Option<String>,
    pub dob: Option<NaiveDate>,
    pub bio: Option<String>,
    pub is_active: bool,
    pub is_staff: bool,
    pub created_at: String,
}

impl User {
    /// Reads the columns in [`USER_COLUMNS`] order starting at `offset`.
    pub fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(offset)?,
            username: row.get(offset + 1)?,
            email: row.get(offset + 2)?,
            name: row.get(offset + 3)?,
            password_hash: row.get(offset + 4)?,
            image: row.get(offset + 5)?,
            dob: row.get(offset + 6)?,
            bio: row.get(offset + 7)?,
            is_active: row.get(offset + 8)?,
            is_staff: row.get(offset + 9)?,
            created_at: row.get(offset + 10)?,
        })
    }

    pub fn avatar(&self) -> String {
        crate::social::domain::avatar_url(self.image.as_deref(), &self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub body: Option<String>,
    pub parent_id: Option<String>,
    pub is_pinned: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Post {
    pub const COLUMNS: &'static str =
        "id, author_id, body, parent_id, is_pinned, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            author_id: row.get(1)?,
            body: row.get(2)?,
            parent_id: row.get(3)?,
            is_pinned: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: String,
    pub updated_at: String,
}

