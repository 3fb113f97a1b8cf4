//! End-to-end behaviour of the social core against a real SQLite database:
//! post taxonomy, toggles, pinning, tree integrity and cascading deletes.

use qwitter::db::{self, models::User};
use qwitter::state::DbPool;
use qwitter::social::feed::{self, FeedScope};
use qwitter::social::posts::{self, PostEdit};
use qwitter::social::users::{self, NewUser};
use qwitter::social::{follows, interactions, Actor, PageRequest, PostKind, SocialError, Toggle};
use rusqlite::{params, Connection};
use std::thread;
use tempfile::TempDir;

fn create_test_db() -> (TempDir, DbPool) {
    let temp_dir = TempDir::new().unwrap();
    let pool = db::create_pool(&temp_dir.path().join("test.db")).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");
    (temp_dir, pool)
}

fn signup(conn: &Connection, username: &str) -> User {
    users::register(
        conn,
        &NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            name: username.to_string(),
            password: "correct horse".to_string(),
        },
    )
    .unwrap()
}

fn likes_on(conn: &Connection, post_id: &str) -> i64 {
    let view = feed::post_detail(conn, post_id, None).unwrap();
    view.counts.likes_count
}

fn rows(conn: &Connection, table: &str, post_id: &str) -> i64 {
    conn.query_row(
        &format!("SELECT COUNT(*) FROM {table} WHERE post_id = ?1"),
        params![post_id],
        |r| r.get(0),
    )
    .unwrap()
}

#[test]
fn test_alice_bob_carol_dave_scenario() {
    let (_dir, pool) = create_test_db();
    let conn = pool.get().unwrap();

    let alice = signup(&conn, "alice");
    let bob = signup(&conn, "bob");
    let carol = signup(&conn, "carol");
    let dave = signup(&conn, "dave");

    let hello = posts::create_post(&conn, &alice.id, "hello").unwrap();
    assert_eq!(posts::kind_of(&hello), PostKind::Original);
    assert_eq!(likes_on(&conn, &hello.id), 0);

    // Bob likes, then unlikes.
    assert_eq!(interactions::toggle_reaction(&conn, &bob.id, &hello.id).unwrap(), Toggle::Added);
    assert_eq!(likes_on(&conn, &hello.id), 1);
    assert_eq!(rows(&conn, "reactions", &hello.id), 1);
    assert_eq!(interactions::toggle_reaction(&conn, &bob.id, &hello.id).unwrap(), Toggle::Removed);
    assert_eq!(likes_on(&conn, &hello.id), 0);

    // Carol reposts.
    assert_eq!(posts::toggle_repost(&conn, &carol.id, &hello.id).unwrap(), Toggle::Added);
    let carol_posts = feed::feed(&conn, &FeedScope::Profile(carol.id.clone()), None, PageRequest::default()).unwrap();
    assert_eq!(carol_posts.count, 1);
    let repost = &carol_posts.results[0];
    assert_eq!(repost.kind, PostKind::Repost);
    assert_eq!(repost.parent_id.as_deref(), Some(hello.id.as_str()));

    // Reposts take no comments, not even from their author.
    let err = interactions::add_comment(&conn, &carol.id, &repost.id, "mine").unwrap_err();
    assert!(matches!(err, SocialError::Validation { .. }));

    // Dave quotes, and the quote can be liked.
    let quote = posts::quote_post(&conn, &dave.id, &hello.id, "nice").unwrap();
    assert_eq!(posts::kind_of(&quote), PostKind::Quote);
    assert_eq!(quote.parent_id.as_deref(), Some(hello.id.as_str()));
    assert_eq!(interactions::toggle_reaction(&conn, &bob.id, &quote.id).unwrap(), Toggle::Added);

    let view = feed::post_detail(&conn, &hello.id, Some(&carol.id)).unwrap();
    assert_eq!(view.counts.reposts_count, 1);
    assert_eq!(view.counts.quotes_count, 1);
    assert!(view.viewer.is_reposted);

    // Deleting the original takes its reposts, quotes and interactions with it.
    interactions::toggle_bookmark(&conn, &bob.id, &hello.id).unwrap();
    interactions::add_comment(&conn, &bob.id, &hello.id, "first").unwrap();
    posts::delete_post(&conn, &Actor::of(&alice), &hello.id).unwrap();

    let repost_id = repost.id.clone();
    assert!(matches!(posts::get_post(&conn, &repost_id), Err(SocialError::NotFound(_))));
    assert!(matches!(posts::get_post(&conn, &quote.id), Err(SocialError::NotFound(_))));
    for table in ["reactions", "bookmarks", "comments"] {
        assert_eq!(rows(&conn, table, &hello.id), 0, "{table} should be gone");
    }
}

#[test]
fn test_reparenting_into_a_cycle_is_refused() {
    let (_dir, pool) = create_test_db();
    let conn = pool.get().unwrap();
    let alice = signup(&conn, "alice");

    let a = posts::create_post(&conn, &alice.id, "A").unwrap();
    let b = posts::quote_post(&conn, &alice.id, &a.id, "B").unwrap();

    let edit = PostEdit {
        body: None,
        parent_id: Some(b.id.clone()),
    };
    let err = posts::edit_post(&conn, &Actor::of(&alice), &a.id, &edit).unwrap_err();
    assert!(matches!(err, SocialError::Validation { .. }));

    // Nothing was written.
    assert_eq!(posts::get_post(&conn, &a.id).unwrap().parent_id, None);
}

#[test]
fn test_reposts_cannot_be_reshared() {
    let (_dir, pool) = create_test_db();
    let conn = pool.get().unwrap();
    let alice = signup(&conn, "alice");
    let bob = signup(&conn, "bob");

    let original = posts::create_post(&conn, &alice.id, "original").unwrap();
    posts::toggle_repost(&conn, &bob.id, &original.id).unwrap();
    let repost_id: String = conn
        .query_row(
            "SELECT id FROM posts WHERE author_id = ?1 AND body IS NULL",
            params![bob.id],
            |r| r.get(0),
        )
        .unwrap();

    assert!(posts::toggle_repost(&conn, &alice.id, &repost_id).is_err());
    assert!(posts::quote_post(&conn, &alice.id, &repost_id, "quoting a repost").is_err());
    assert!(interactions::toggle_bookmark(&conn, &alice.id, &repost_id).is_err());
    assert!(posts::toggle_pin(&conn, &Actor::of(&bob), &repost_id).is_err());
}

#[test]
fn test_follow_toggles_and_refuses_self() {
    let (_dir, pool) = create_test_db();
    let conn = pool.get().unwrap();
    let alice = signup(&conn, "alice");
    let bob = signup(&conn, "bob");

    assert!(follows::toggle_follow(&conn, &alice.id, &alice.id).is_err());

    assert_eq!(follows::toggle_follow(&conn, &alice.id, &bob.id).unwrap(), Toggle::Added);
    assert!(follows::is_following(&conn, &alice.id, &bob.id).unwrap());
    assert_eq!(follows::toggle_follow(&conn, &alice.id, &bob.id).unwrap(), Toggle::Removed);
    assert!(!follows::is_following(&conn, &alice.id, &bob.id).unwrap());
}

#[test]
fn test_only_one_pinned_post_per_author() {
    let (_dir, pool) = create_test_db();
    let conn = pool.get().unwrap();
    let alice = signup(&conn, "alice");
    let actor = Actor::of(&alice);

    let p = posts::create_post(&conn, &alice.id, "P").unwrap();
    let q = posts::create_post(&conn, &alice.id, "Q").unwrap();

    assert_eq!(posts::toggle_pin(&conn, &actor, &p.id).unwrap(), Toggle::Added);
    assert_eq!(posts::toggle_pin(&conn, &actor, &q.id).unwrap(), Toggle::Added);

    assert_eq!(posts::pinned_post_id(&conn, &alice.id).unwrap(), Some(q.id.clone()));
    assert!(!posts::get_post(&conn, &p.id).unwrap().is_pinned);

    // The pinned post leads the profile.
    let profile = feed::feed(&conn, &FeedScope::Profile(alice.id.clone()), None, PageRequest::default()).unwrap();
    assert_eq!(profile.results[0].id, q.id);

    assert_eq!(posts::toggle_pin(&conn, &actor, &q.id).unwrap(), Toggle::Removed);
    assert_eq!(posts::pinned_post_id(&conn, &alice.id).unwrap(), None);
}

#[test]
fn test_concurrent_reaction_toggles_never_duplicate() {
    let (_dir, pool) = create_test_db();
    let (bob_id, post_id) = {
        let conn = pool.get().unwrap();
        let alice = signup(&conn, "alice");
        let bob = signup(&conn, "bob");
        let post = posts::create_post(&conn, &alice.id, "contended").unwrap();
        (bob.id, post.id)
    };

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pool = pool.clone();
            let bob_id = bob_id.clone();
            let post_id = post_id.clone();
            thread::spawn(move || {
                let conn = pool.get().unwrap();
                for _ in 0..25 {
                    interactions::toggle_reaction(&conn, &bob_id, &post_id).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // 100 toggles in total, so the like ends up removed.
    let conn = pool.get().unwrap();
    assert_eq!(rows(&conn, "reactions", &post_id), 0);
    assert_eq!(likes_on(&conn, &post_id), 0);

    assert_eq!(interactions::toggle_reaction(&conn, &bob_id, &post_id).unwrap(), Toggle::Added);
    assert_eq!(rows(&conn, "reactions", &post_id), 1);
}
