use rusqlite::Connection;
use serde::Deserialize;

use crate::social::domain::Toggle;
use crate::social::error::SocialResult;
use crate::social::{interactions, posts, Actor};

/// Toggle-style actions a signed-in user can take on a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostAction {
    React,
    Bookmark,
    Pin,
    Repost,
}

impl PostAction {
    pub fn apply(self, conn: &Connection, actor: &Actor<'_>, post_id: &str) -> SocialResult<Toggle> {
        match self {
            Self::React => interactions::toggle_reaction(conn, actor.id, post_id),
            Self::Bookmark => interactions::toggle_bookmark(conn, actor.id, post_id),
            Self::Pin => posts::toggle_pin(conn, actor, post_id),
            Self::Repost => posts::toggle_repost(conn, actor.id, post_id),
        }
    }

    /// Human-readable result, e.g. "Post liked." / "Post unliked."
    pub fn describe(self, outcome: Toggle) -> &'static str {
        match (self, outcome) {
            (Self::React, Toggle::Added) => "Post liked.",
            (Self::React, Toggle::Removed) => "Post unliked.",
            (Self::Bookmark, Toggle::Added) => "Post bookmarked.",
            (Self::Bookmark, Toggle::Removed) => "Post unbookmarked.",
            (Self::Pin, Toggle::Added) => "Post pinned.",
            (Self::Pin, Toggle::Removed) => "Post unpinned.",
            (Self::Repost, Toggle::Added) => "Post reposted successfully.",
            (Self::Repost, Toggle::Removed) => "Repost removed.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::social::posts::create_post;
    use crate::social::users::{register, tests::new_user};

    #[test]
    fn actions_parse_from_path_segments() {
        let action: PostAction = serde_json::from_str("\"repost\"").unwrap();
        assert_eq!(action, PostAction::Repost);
        assert!(serde_json::from_str::<PostAction>("\"quote\"").is_err());
    }

    #[test]
    fn each_action_toggles() {
        let pool = memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let alice = register(&conn, &new_user("alice")).unwrap();
        let hello = create_post(&conn, &alice.id, "hello").unwrap();
        let actor = Actor::of(&alice);

        for action in [PostAction::React, PostAction::Bookmark, PostAction::Pin, PostAction::Repost] {
            assert_eq!(action.apply(&conn, &actor, &hello.id).unwrap(), Toggle::Added, "{action:?}");
            assert_eq!(action.apply(&conn, &actor, &hello.id).unwrap(), Toggle::Removed, "{action:?}");
        }
    }
}
