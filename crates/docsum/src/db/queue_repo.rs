//! Queue repository — SQL for the durable `jobs` table.
//!
//! The claim sequence (select oldest queued, then flip it to `active`)
//! is atomic because every call runs under the connection mutex, which
//! is what guarantees a job is delivered to at most one worker at a time.

use rusqlite::{params, OptionalExtension, Row};

use super::{now_rfc3339, Database, DatabaseError};

pub const STATUS_QUEUED: &str = "queued";
pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_DONE: &str = "done";
pub const STATUS_DEAD: &str = "dead";

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub topic: String,
    pub file_url: String,
    pub owner_id: String,
    pub status: String,
    /// Number of deliveries so far, incremented on each claim.
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            topic: row.get("topic")?,
            file_url: row.get("file_url")?,
            owner_id: row.get("owner_id")?,
            status: row.get("status")?,
            attempts: row.get("attempts")?,
            last_error: row.get("last_error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts a fresh job in the `queued` state and returns its id.
pub fn insert(
    db: &Database,
    topic: &str,
    file_url: &str,
    owner_id: &str,
) -> Result<String, DatabaseError> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_rfc3339();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, topic, file_url, owner_id, status, attempts, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)",
            params![id, topic, file_url, owner_id, STATUS_QUEUED, now],
        )?;
        Ok(())
    })?;
    Ok(id)
}

/// Inserts a fresh `queued` job unless a queued or active one already
/// exists for the key. Returns the in-flight job's id and whether this
/// call created it.
///
/// Check and insert run inside one `with_conn`, so concurrent enqueues
/// for the same key cannot both pass the check and double-insert.
pub fn insert_if_not_in_flight(
    db: &Database,
    topic: &str,
    file_url: &str,
    owner_id: &str,
) -> Result<(String, bool), DatabaseError> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_rfc3339();
    db.with_conn(|conn| {
        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM jobs
                 WHERE topic = ?1 AND file_url = ?2 AND owner_id = ?3
                   AND status IN (?4, ?5)
                 LIMIT 1",
                params![topic, file_url, owner_id, STATUS_QUEUED, STATUS_ACTIVE],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(existing) = existing {
            return Ok((existing, false));
        }

        conn.execute(
            "INSERT INTO jobs (id, topic, file_url, owner_id, status, attempts, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)",
            params![id, topic, file_url, owner_id, STATUS_QUEUED, now],
        )?;
        Ok((id, true))
    })
}

/// Returns the id of a queued or active job for the given key, if one exists.
pub fn find_in_flight(
    db: &Database,
    topic: &str,
    file_url: &str,
    owner_id: &str,
) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let id = conn
            .query_row(
                "SELECT id FROM jobs
                 WHERE topic = ?1 AND file_url = ?2 AND owner_id = ?3
                   AND status IN (?4, ?5)
                 LIMIT 1",
                params![topic, file_url, owner_id, STATUS_QUEUED, STATUS_ACTIVE],
                |r| r.get(0),
            )
            .optional()?;
        Ok(id)
    })
}

/// Claims the oldest queued job on the topic: flips it to `active` and
/// increments its delivery counter. Returns the claimed row (with the
/// incremented counter), or None when the topic is idle.
pub fn claim_next(db: &Database, topic: &str) -> Result<Option<JobRow>, DatabaseError> {
    let now = now_rfc3339();
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM jobs
                 WHERE topic = ?1 AND status = ?2
                 ORDER BY rowid LIMIT 1",
                params![topic, STATUS_QUEUED],
                JobRow::from_row,
            )
            .optional()?;

        let Some(mut job) = row else {
            return Ok(None);
        };

        conn.execute(
            "UPDATE jobs SET status = ?2, attempts = attempts + 1, updated_at = ?3
             WHERE id = ?1",
            params![job.id, STATUS_ACTIVE, now],
        )?;

        job.status = STATUS_ACTIVE.to_string();
        job.attempts += 1;
        job.updated_at = now.clone();
        Ok(Some(job))
    })
}

/// Marks a job as successfully completed.
pub fn mark_done(db: &Database, id: &str) -> Result<(), DatabaseError> {
    set_status(db, id, STATUS_DONE, None)
}

/// Puts a failed job back in the queue for redelivery.
pub fn requeue(db: &Database, id: &str, error: &str) -> Result<(), DatabaseError> {
    set_status(db, id, STATUS_QUEUED, Some(error))
}

/// Moves a job to the dead-letter state. It will not be retried further.
pub fn mark_dead(db: &Database, id: &str, error: &str) -> Result<(), DatabaseError> {
    set_status(db, id, STATUS_DEAD, Some(error))
}

fn set_status(
    db: &Database,
    id: &str,
    status: &str,
    error: Option<&str>,
) -> Result<(), DatabaseError> {
    let now = now_rfc3339();
    db.with_conn(|conn| {
        match error {
            Some(error) => conn.execute(
                "UPDATE jobs SET status = ?2, last_error = ?3, updated_at = ?4 WHERE id = ?1",
                params![id, status, error, now],
            )?,
            None => conn.execute(
                "UPDATE jobs SET status = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, status, now],
            )?,
        };
        Ok(())
    })
}

/// Requeues jobs left `active` by a crashed worker process. Called once
/// at startup; this is how at-least-once redelivery survives a crash
/// between processing and acknowledgment.
pub fn requeue_stale_active(db: &Database, topic: &str) -> Result<u64, DatabaseError> {
    let now = now_rfc3339();
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE jobs SET status = ?3, updated_at = ?4
             WHERE topic = ?1 AND status = ?2",
            params![topic, STATUS_ACTIVE, STATUS_QUEUED, now],
        )?;
        Ok(affected as u64)
    })
}

/// Finds a job by its id.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM jobs WHERE id = ?1",
                params![id],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Counts jobs on a topic with the given status.
pub fn count_by_status(db: &Database, topic: &str, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE topic = ?1 AND status = ?2",
            params![topic, status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
