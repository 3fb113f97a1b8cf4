// Domain rules - pure functions, no database access
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::social::error::{SocialError, SocialResult};

pub const MAX_BODY_CHARS: usize = 280;
pub const MAX_BIO_CHARS: usize = 160;
pub const MAX_NAME_CHARS: usize = 150;
pub const MAX_USERNAME_CHARS: usize = 150;
pub const MIN_PASSWORD_CHARS: usize = 8;

/// Classification of a post node by its (parent, body) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostKind {
    Original,
    Repost,
    Quote,
}

impl PostKind {
    /// `None` when the post has neither parent nor body.
    pub fn classify(has_parent: bool, body: Option<&str>) -> Option<Self> {
        let has_body = body.is_some_and(|b| !b.trim().is_empty());
        match (has_parent, has_body) {
            (false, true) => Some(Self::Original),
            (true, false) => Some(Self::Repost),
            (true, true) => Some(Self::Quote),
            (false, false) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Repost => "repost",
            Self::Quote => "quote",
        }
    }

    /// Reposts are leaves: they cannot be reposted, quoted, liked,
    /// bookmarked, commented on or pinned.
    pub fn accepts_interactions(&self) -> bool {
        !matches!(self, Self::Repost)
    }
}

impl fmt::Display for PostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a toggle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Toggle {
    Added,
    Removed,
}

impl Toggle {
    pub fn is_added(&self) -> bool {
        matches!(self, Self::Added)
    }
}

/// The fields of a post that the tree rules look at.
#[derive(Debug, Clone, Copy)]
pub struct PostShape<'a> {
    pub id: Option<&'a str>,
    pub parent_id: Option<&'a str>,
    pub body: Option<&'a str>,
    pub is_pinned: bool,
}

/// Checks every tree rule that does not need the ancestor chain.
/// `parent_kind` is the kind of the referenced parent, if any.
pub fn validate_shape(shape: &PostShape<'_>, parent_kind: Option<PostKind>) -> SocialResult<PostKind> {
    if let (Some(id), Some(parent)) = (shape.id, shape.parent_id) {
        if id == parent {
            return Err(SocialError::validation(
                "parent",
                "Post cannot reference itself as parent.",
            ));
        }
    }

    if parent_kind == Some(PostKind::Repost) {
        return Err(SocialError::validation(
            "parent",
            "Cannot repost or quote a repost. Only posts and quotes can be reposted or quoted.",
        ));
    }

    let kind = PostKind::classify(shape.parent_id.is_some(), shape.body).ok_or_else(|| {
        SocialError::validation("body", "A post must have a body or reference a parent post.")
    })?;

    if shape.is_pinned && kind == PostKind::Repost {
        return Err(SocialError::validation(
            "is_pinned",
            "Cannot pin a repost. Only posts and quotes can be pinned.",
        ));
    }

    if let Some(body) = shape.body {
        check_length("body", body, MAX_BODY_CHARS)?;
    }

    Ok(kind)
}

/// Trims a post or comment body; blank input becomes `None`.
pub fn normalize_body(body: Option<&str>) -> Option<String> {
    body.map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
}

pub fn check_length(field: &'static str, value: &str, max: usize) -> SocialResult<()> {
    if value.chars().count() > max {
        return Err(SocialError::validation(
            field,
            format!("Ensure this field has no more than {max} characters."),
        ));
    }
    Ok(())
}

pub fn normalize_username(raw: &str) -> SocialResult<String> {
    let username = raw.trim().to_lowercase();
    if username.is_empty() {
        return Err(SocialError::validation("username", "This field is required."));
    }
    check_length("username", &username, MAX_USERNAME_CHARS)?;
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(SocialError::validation(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    Ok(username)
}

pub fn normalize_email(raw: &str) -> SocialResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
        }
        None => false,
    };
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(SocialError::validation("email", "Enter a valid email address."));
    }
    Ok(email)
}

pub fn normalize_name(raw: &str) -> SocialResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(SocialError::validation("name", "This field is required."));
    }
    check_length("name", name, MAX_NAME_CHARS)?;
    Ok(name.to_string())
}

pub fn validate_password(password: &str, username: &str) -> SocialResult<()> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(SocialError::validation(
            "password",
            format!("This password is too short. It must contain at least {MIN_PASSWORD_CHARS} characters."),
        ));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(SocialError::validation(
            "password",
            "This password is entirely numeric.",
        ));
    }
    if !username.is_empty() && password.eq_ignore_ascii_case(username) {
        return Err(SocialError::validation(
            "password",
            "The password is too similar to the username.",
        ));
    }
    Ok(())
}

/// Uploaded image when set, otherwise a generated initials avatar.
pub fn avatar_url(image: Option<&str>, name: &str) -> String {
    if let Some(image) = image.filter(|i| !i.is_empty()) {
        return image.to_string();
    }
    let initials: String = name
        .split_whitespace()
        .take(2)
        .filter_map(|part| part.chars().next())
        .flat_map(char::to_uppercase)
        .collect();
    format!("https://ui-avatars.com/api/?name={initials}&background=random&bold=true")
}
