pub mod models;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_initial",
        include_str!("../../migrations/001_initial.sql"),
    ),
    (
        "002_blog_search",
        include_str!("../../migrations/002_blog_search.sql"),
    ),
];

const CONNECTION_PRAGMAS: &str = "
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

    // Pragmas are per-connection, so apply them to every pooled connection
    let manager = SqliteConnectionManager::file(db_path)
        .with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));
    let pool = Pool::builder().max_size(8).build(manager)?;

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

/// Current time in the same text format the schema defaults use.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
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
    }

    #[test]
    fn migrations_run_successfully() {
        let (_tmp, pool) = test_pool();
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
        for table in ["users", "blogs", "comments", "likes", "blogs_fts"] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let (_tmp, pool) = test_pool();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn email_is_unique() {
        let (_tmp, pool) = test_pool();
        let conn = pool.get().unwrap();
        insert_user(&conn, "u1", "a@x.com", "A");
        let result = conn.execute(
            "INSERT INTO users (id, email, password_hash, name) VALUES ('u2', 'a@x.com', 'x', 'B')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn foreign_keys_enforced_on_every_connection() {
        let (_tmp, pool) = test_pool();
        // Hold one connection so the pool hands out a second one
        let _first = pool.get().unwrap();
        let conn = pool.get().unwrap();
        let result = conn.execute(
            "INSERT INTO comments (id, content, author_id, blog_id) VALUES ('c1', 'hi', 'nobody', 'nothing')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn search_index_follows_blog_rows() {
        let (_tmp, pool) = test_pool();
        let conn = pool.get().unwrap();
        insert_user(&conn, "u1", "a@x.com", "A");
        conn.execute(
            "INSERT INTO blogs (id, title, content, cover_image, cover_public_id, author_id)
             VALUES ('b1', 'Rust ownership', 'borrowing explained', 'u', 'p', 'u1')",
            [],
        )
        .unwrap();

        let hits = |term: &str| -> i64 {
            conn.query_row(
                "SELECT COUNT(*) FROM blogs_fts WHERE blogs_fts MATCH ?1",
                params![term],
                |r| r.get(0),
            )
            .unwrap()
        };
        assert_eq!(hits("borrowing"), 1);

        conn.execute("UPDATE blogs SET content = 'lifetimes' WHERE id = 'b1'", [])
            .unwrap();
        assert_eq!(hits("borrowing"), 0);
        assert_eq!(hits("lifetimes"), 1);

        conn.execute("DELETE FROM blogs WHERE id = 'b1'", []).unwrap();
        assert_eq!(hits("lifetimes"), 0);
    }
}
