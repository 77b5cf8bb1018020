//! Summary repository — the result store, keyed by `(file_url, owner_id)`.
//!
//! Exclusively written by the enqueue endpoint (placeholder rows) and the
//! worker (terminal states). All reads and deletes are scoped to an owner;
//! cross-owner access reads as absent, never as a distinct "forbidden".

use rusqlite::{params, OptionalExtension, Row};

use super::{now_rfc3339, Database, DatabaseError};

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_DONE: &str = "done";
pub const STATUS_FAILED: &str = "failed";

/// A summary row from the database.
#[derive(Debug, Clone)]
pub struct SummaryRow {
    pub id: String,
    pub file_url: String,
    pub owner_id: String,
    /// Null until the worker persists a result.
    pub summary: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl SummaryRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            file_url: row.get("file_url")?,
            owner_id: row.get("owner_id")?,
            summary: row.get("summary")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts a `pending` placeholder row so the poller can distinguish
/// "queued, not yet finished" from "never submitted".
///
/// A no-op if a record for the key already exists, so re-enqueueing a
/// finished document does not disturb its terminal record.
pub fn insert_pending(db: &Database, file_url: &str, owner_id: &str) -> Result<(), DatabaseError> {
    let now = now_rfc3339();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO summaries (id, file_url, owner_id, summary, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?5)
             ON CONFLICT (file_url, owner_id) DO NOTHING",
            params![
                uuid::Uuid::new_v4().to_string(),
                file_url,
                owner_id,
                STATUS_PENDING,
                now,
            ],
        )?;
        Ok(())
    })
}

/// Records a completed summary. Last-write-wins upsert: redelivering an
/// already-processed job rewrites the same record instead of corrupting
/// the store, which is what makes ack-after-persist safe.
pub fn record_done(
    db: &Database,
    file_url: &str,
    owner_id: &str,
    summary: &str,
) -> Result<(), DatabaseError> {
    let now = now_rfc3339();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO summaries (id, file_url, owner_id, summary, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT (file_url, owner_id) DO UPDATE SET
                 summary = excluded.summary,
                 status = excluded.status,
                 updated_at = excluded.updated_at",
            params![
                uuid::Uuid::new_v4().to_string(),
                file_url,
                owner_id,
                summary,
                STATUS_DONE,
                now,
            ],
        )?;
        Ok(())
    })
}

/// Marks the record for a dead-lettered job as `failed`, leaving the
/// poller an explicit terminal signal instead of an eternal `pending`.
/// Never downgrades a record that already reached `done`.
pub fn record_failed(db: &Database, file_url: &str, owner_id: &str) -> Result<(), DatabaseError> {
    let now = now_rfc3339();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO summaries (id, file_url, owner_id, summary, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?5)
             ON CONFLICT (file_url, owner_id) DO UPDATE SET
                 status = excluded.status,
                 updated_at = excluded.updated_at
             WHERE summaries.status <> 'done'",
            params![
                uuid::Uuid::new_v4().to_string(),
                file_url,
                owner_id,
                STATUS_FAILED,
                now,
            ],
        )?;
        Ok(())
    })
}

/// Finds the record for `(file_url, owner_id)`, if any.
pub fn find(
    db: &Database,
    file_url: &str,
    owner_id: &str,
) -> Result<Option<SummaryRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM summaries WHERE file_url = ?1 AND owner_id = ?2",
                params![file_url, owner_id],
                SummaryRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Lists an owner's summaries, newest first.
pub fn list_for_owner(db: &Database, owner_id: &str) -> Result<Vec<SummaryRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM summaries WHERE owner_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows: Vec<SummaryRow> = stmt
            .query_map(params![owner_id], SummaryRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Deletes a record by id, scoped to its owner. Returns false when no
/// matching row exists — including when the row belongs to someone else.
pub fn delete(db: &Database, id: &str, owner_id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "DELETE FROM summaries WHERE id = ?1 AND owner_id = ?2",
            params![id, owner_id],
        )?;
        Ok(affected > 0)
    })
}
