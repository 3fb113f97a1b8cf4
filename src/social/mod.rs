pub mod actions;
pub mod domain;
pub mod error;
pub mod feed;
pub mod follows;
pub mod interactions;
pub mod pagination;
pub mod posts;
pub mod users;

pub use actions::PostAction;
pub use domain::{PostKind, Toggle};
pub use error::{SocialError, SocialResult};
pub use pagination::{Page, PageQuery, PageRequest};

/// Who is performing an author-or-staff gated mutation.
#[derive(Debug, Clone, Copy)]
pub struct Actor<'a> {
    pub id: &'a str,
    pub is_staff: bool,
}

impl<'a> Actor<'a> {
    pub fn of(user: &'a crate::db::models::User) -> Self {
        Self {
            id: &user.id,
            is_staff: user.is_staff,
        }
    }
}
