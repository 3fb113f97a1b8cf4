pub mod models;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::path::Path;

use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../../migrations/001_initial.sql"),
)];

const PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    PRAGMA foreign_keys = ON;
    PRAGMA busy_timeout = 5000;
";

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas are per-connection, so every pooled connection gets them.
    let manager = SqliteConnectionManager::file(db_path).with_init(|c| c.execute_batch(PRAGMAS));
    let pool = Pool::builder().max_size(8).build(manager)?;

    Ok(pool)
}

/// Single-connection in-memory pool. Every connection of a memory manager is
/// its own database, so the pool must never hand out a second one.
pub fn memory_pool() -> anyhow::Result<DbPool> {
    let manager = SqliteConnectionManager::memory()
        .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
    let pool = Pool::builder().max_size(1).build(manager)?;
    run_migrations(&pool)?;
    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    // Create migrations tracking table
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// Current UTC time in the same text format the schema defaults use.
pub fn now_timestamp() -> String {
    chrono::Utc::now()
        .naive_utc()
        .format("%Y-%m-%d %H:%M:%S%.3f")
        .to_string()
}

/// Starts a `BEGIN IMMEDIATE` transaction so concurrent writers queue on the
/// write lock up front instead of failing when a read lock is upgraded.
pub fn immediate_transaction(conn: &Connection) -> rusqlite::Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
}

/// True when the error is a UNIQUE / PRIMARY KEY constraint failure.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == rusqlite::ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_pool_creates_db_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("sub/dir/test.db");
        let pool = create_pool(&db_path).unwrap();
        assert!(db_path.exists());

        let conn = pool.get().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn migrations_run_successfully() {
        let pool = memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };
        for table in [
            "users",
            "sessions",
            "follows",
            "posts",
            "comments",
            "reactions",
            "bookmarks",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let pool = memory_pool().unwrap();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    fn insert_user(conn: &rusqlite::Connection, id: &str, username: &str) {
        conn.execute(
            "INSERT INTO users (id, username, email, name, password_hash)
             VALUES (?1, ?2, ?3, ?2, 'x')",
            params![id, username, format!("{username}@example.com")],
        )
        .unwrap();
    }

    #[test]
    fn foreign_keys_enforced() {
        let pool = memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let result = conn.execute(
            "INSERT INTO posts (id, author_id, body) VALUES (?1, ?2, ?3)",
            params!["post-1", "nonexistent-user", "hello"],
        );
        assert!(result.is_err());
    }

    #[test]
    fn schema_rejects_self_follow_and_empty_post() {
        let pool = memory_pool().unwrap();
        let conn = pool.get().unwrap();
        insert_user(&conn, "u1", "alice");

        let self_follow = conn.execute(
            "INSERT INTO follows (id, follower_id, followed_id) VALUES ('f1', 'u1', 'u1')",
            [],
        );
        assert!(self_follow.is_err());

        let empty = conn.execute(
            "INSERT INTO posts (id, author_id, body, parent_id) VALUES ('p1', 'u1', NULL, NULL)",
            [],
        );
        assert!(empty.is_err());
    }

    #[test]
    fn duplicate_reaction_is_a_unique_violation() {
        let pool = memory_pool().unwrap();
        let conn = pool.get().unwrap();
        insert_user(&conn, "u1", "alice");
        conn.execute(
            "INSERT INTO posts (id, author_id, body) VALUES ('p1', 'u1', 'hi')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO reactions (id, post_id, user_id) VALUES ('r1', 'p1', 'u1')",
            [],
        )
        .unwrap();

        let err = conn
            .execute(
                "INSERT INTO reactions (id, post_id, user_id) VALUES ('r2', 'p1', 'u1')",
                [],
            )
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn deleting_user_cascades_to_posts() {
        let pool = memory_pool().unwrap();
        let conn = pool.get().unwrap();
        insert_user(&conn, "u1", "alice");
        conn.execute(
            "INSERT INTO posts (id, author_id, body) VALUES ('p1', 'u1', 'hi')",
            [],
        )
        .unwrap();
        conn.execute("DELETE FROM users WHERE id = 'u1'", []).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM posts", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
