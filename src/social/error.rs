use thiserror::Error;

#[derive(Debug, Error)]
pub enum SocialError {
    /// Rejected input, scoped to the field that caused it.
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

impl SocialError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }
}

pub type SocialResult<T> = Result<T, SocialError>;

/// Maps `QueryReturnedNoRows` to `NotFound(what)`.
pub trait OptionalRow<T> {
    fn or_not_found(self, what: &'static str) -> SocialResult<T>;
}

impl<T> OptionalRow<T> for rusqlite::Result<T> {
    fn or_not_found(self, what: &'static str) -> SocialResult<T> {
        match self {
            Ok(v) => Ok(v),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(SocialError::NotFound(what)),
            Err(e) => Err(e.into()),
        }
    }
}
