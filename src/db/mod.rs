pub mod models;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_documents",
        include_str!("../../migrations/001_documents.sql"),
    ),
    (
        "002_upload_order",
        include_str!("../../migrations/002_upload_order.sql"),
    ),
];

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(db_path);
    let pool = Pool::builder().max_size(8).build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    Ok(pool)
}

/// Single-connection in-memory pool. Each SQLite memory connection is its own
/// database, so the pool must never hand out a second one.
pub fn memory_pool() -> anyhow::Result<DbPool> {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(manager)?;
    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

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
    }

    #[test]
    fn migrations_run_successfully() {
        let pool = memory_pool().unwrap();
        run_migrations(&pool).unwrap();

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
        assert!(tables.contains(&"documents".to_string()));
    }

    #[test]
    fn migrations_are_idempotent() {
        let pool = memory_pool().unwrap();
        run_migrations(&pool).unwrap();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn documents_are_unique_per_collection_and_id() {
        let pool = memory_pool().unwrap();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3)",
            params!["publicUploads", "a", "{}"],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3)",
            params!["publicUploads", "a", "{}"],
        );
        assert!(dup.is_err());

        // Same id under another collection is a different document
        conn.execute(
            "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3)",
            params!["users", "a", "{}"],
        )
        .unwrap();
    }
}
