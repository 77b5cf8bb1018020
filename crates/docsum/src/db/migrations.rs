//! Database migration system.
//!
//! Tracks applied migrations in a `_migrations` table and applies
//! pending ones in order.

use rusqlite::Connection;

use super::error::DatabaseError;

/// A single migration definition.
struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const CREATE_SUMMARIES: &str = "
CREATE TABLE summaries (
    id TEXT PRIMARY KEY,
    file_url TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    summary TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (file_url, owner_id)
);
CREATE INDEX idx_summaries_owner ON summaries (owner_id, created_at);
";

const CREATE_JOBS: &str = "
CREATE TABLE jobs (
    id TEXT PRIMARY KEY,
    topic TEXT NOT NULL,
    file_url TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'queued',
    attempts INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX idx_jobs_claim ON jobs (topic, status);
";

/// All migrations in order. Each is applied at most once.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_summaries_table",
        sql: CREATE_SUMMARIES,
    },
    Migration {
        version: 2,
        description: "create_jobs_table",
        sql: CREATE_JOBS,
    },
];

/// Runs all pending migrations on the given connection.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    // Create the migrations tracking table.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        log::info!(
            "Running migration v{}: {}",
            migration.version,
            migration.description
        );

        conn.execute_batch(migration.sql)
            .map_err(|e| DatabaseError::Migration {
                version: migration.version,
                reason: e.to_string(),
            })?;

        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_run_on_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_all(&conn).unwrap();
        // Running again should be a no-op.
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_summaries_unique_per_owner_and_url() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        conn.execute(
            "INSERT INTO summaries (id, file_url, owner_id, status, created_at, updated_at)
             VALUES ('a', 'blob://doc1', 'u1', 'pending', '2026-01-01', '2026-01-01')",
            [],
        )
        .unwrap();

        // Same key must be rejected by the uniqueness constraint.
        let dup = conn.execute(
            "INSERT INTO summaries (id, file_url, owner_id, status, created_at, updated_at)
             VALUES ('b', 'blob://doc1', 'u1', 'pending', '2026-01-01', '2026-01-01')",
            [],
        );
        assert!(dup.is_err());

        // Same URL for a different owner is a distinct record.
        conn.execute(
            "INSERT INTO summaries (id, file_url, owner_id, status, created_at, updated_at)
             VALUES ('c', 'blob://doc1', 'u2', 'pending', '2026-01-01', '2026-01-01')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_jobs_table_exists() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        conn.execute(
            "INSERT INTO jobs (id, topic, file_url, owner_id, created_at, updated_at)
             VALUES ('j1', 'pdf-summarization', 'blob://doc1', 'u1', '2026-01-01', '2026-01-01')",
            [],
        )
        .unwrap();
    }
}
