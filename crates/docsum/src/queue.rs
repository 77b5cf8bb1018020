//! Durable job queue client.
//!
//! A thin typed layer over `db::queue_repo` implementing the queue
//! contract: enqueue, claim-one dequeue, ack, and fail-with-retry up to
//! a bounded attempt count, after which a job is dead-lettered.
//!
//! Delivery is at least once: a job claimed but never acked (worker
//! crash) is requeued by `recover` at the next startup, so consumers
//! must be idempotent.

use crate::db::{queue_repo, Database, DatabaseError};
use crate::error::FailureKind;

/// Topic for document summarization jobs.
pub const SUMMARIZE_TOPIC: &str = "pdf-summarization";

/// The immutable payload of a summarization job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPayload {
    pub file_url: String,
    pub owner_id: String,
}

/// A job delivered to a worker. `attempts` counts this delivery too.
#[derive(Debug, Clone)]
pub struct DeliveredJob {
    pub id: String,
    pub payload: JobPayload,
    pub attempts: u32,
}

/// Outcome of reporting a failure back to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// The job went back in the queue for another delivery.
    Requeued { attempts: u32 },
    /// The job exhausted its attempts (or failed permanently) and will
    /// not be retried.
    DeadLettered,
}

#[derive(Clone)]
pub struct JobQueue {
    db: Database,
    max_attempts: u32,
}

impl JobQueue {
    pub fn new(db: Database, max_attempts: u32) -> Self {
        Self { db, max_attempts }
    }

    /// Enqueues a job and returns its id.
    ///
    /// Dedupe-on-enqueue: a second enqueue for a `(file_url, owner_id)`
    /// pair whose job is still queued or active merges into the in-flight
    /// job instead of racing it. The check-and-insert is a single
    /// critical section, so this holds under concurrent submissions too.
    pub fn enqueue(&self, topic: &str, payload: &JobPayload) -> Result<String, DatabaseError> {
        let (id, created) = queue_repo::insert_if_not_in_flight(
            &self.db,
            topic,
            &payload.file_url,
            &payload.owner_id,
        )?;
        if created {
            tracing::debug!(job_id = %id, topic, "Enqueued job");
        } else {
            tracing::debug!(job_id = %id, "Merged enqueue into in-flight job");
        }
        Ok(id)
    }

    /// Claims the oldest queued job on the topic, or None when idle.
    /// The claimed job is delivered to this caller only.
    pub fn dequeue(&self, topic: &str) -> Result<Option<DeliveredJob>, DatabaseError> {
        let Some(row) = queue_repo::claim_next(&self.db, topic)? else {
            return Ok(None);
        };
        Ok(Some(DeliveredJob {
            id: row.id,
            payload: JobPayload {
                file_url: row.file_url,
                owner_id: row.owner_id,
            },
            attempts: row.attempts,
        }))
    }

    /// Acknowledges a job after its result has been durably persisted.
    pub fn ack(&self, job_id: &str) -> Result<(), DatabaseError> {
        queue_repo::mark_done(&self.db, job_id)
    }

    /// Reports a processing failure. Transient failures requeue until the
    /// attempt limit; permanent failures dead-letter immediately.
    pub fn fail(
        &self,
        job_id: &str,
        error: &str,
        kind: FailureKind,
    ) -> Result<FailOutcome, DatabaseError> {
        let attempts = queue_repo::find_by_id(&self.db, job_id)?
            .map(|j| j.attempts)
            .unwrap_or(0);

        let exhausted = attempts >= self.max_attempts;
        if kind == FailureKind::Permanent || exhausted {
            queue_repo::mark_dead(&self.db, job_id, error)?;
            return Ok(FailOutcome::DeadLettered);
        }

        queue_repo::requeue(&self.db, job_id, error)?;
        Ok(FailOutcome::Requeued { attempts })
    }

    /// Requeues jobs left `active` by a previous process. Call once at
    /// startup before spawning workers.
    pub fn recover(&self, topic: &str) -> Result<u64, DatabaseError> {
        queue_repo::requeue_stale_active(&self.db, topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_queue(max_attempts: u32) -> JobQueue {
        let db = Database::open_in_memory().expect("Failed to create test database");
        JobQueue::new(db, max_attempts)
    }

    fn payload(file_url: &str, owner_id: &str) -> JobPayload {
        JobPayload {
            file_url: file_url.to_string(),
            owner_id: owner_id.to_string(),
        }
    }

    #[test]
    fn test_enqueue_dequeue_ack() {
        let queue = test_queue(3);
        let id = queue.enqueue(SUMMARIZE_TOPIC, &payload("blob://doc1", "u1")).unwrap();

        let job = queue.dequeue(SUMMARIZE_TOPIC).unwrap().unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.payload.file_url, "blob://doc1");
        assert_eq!(job.attempts, 1);

        queue.ack(&job.id).unwrap();
        assert!(queue.dequeue(SUMMARIZE_TOPIC).unwrap().is_none());
    }

    #[test]
    fn test_enqueue_dedupes_in_flight_key() {
        let queue = test_queue(3);
        let first = queue.enqueue(SUMMARIZE_TOPIC, &payload("blob://doc1", "u1")).unwrap();
        let second = queue.enqueue(SUMMARIZE_TOPIC, &payload("blob://doc1", "u1")).unwrap();
        assert_eq!(first, second);

        // Only one delivery results.
        assert!(queue.dequeue(SUMMARIZE_TOPIC).unwrap().is_some());
        assert!(queue.dequeue(SUMMARIZE_TOPIC).unwrap().is_none());
    }

    #[test]
    fn test_concurrent_enqueues_never_double_insert() {
        use std::sync::{Arc, Barrier};

        let queue = test_queue(3);

        // Rounds of two racing submissions for the same key. Exactly one
        // job may exist in flight afterwards, every round.
        for round in 0..100 {
            let barrier = Arc::new(Barrier::new(2));
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let queue = queue.clone();
                    let barrier = barrier.clone();
                    std::thread::spawn(move || {
                        barrier.wait();
                        queue
                            .enqueue(SUMMARIZE_TOPIC, &payload("blob://doc1", "u1"))
                            .unwrap()
                    })
                })
                .collect();
            let ids: Vec<String> = handles
                .into_iter()
                .map(|h| h.join().expect("enqueue thread panicked"))
                .collect();
            assert_eq!(ids[0], ids[1], "round {round}: duplicate in-flight jobs");

            let job = queue.dequeue(SUMMARIZE_TOPIC).unwrap().unwrap();
            assert!(
                queue.dequeue(SUMMARIZE_TOPIC).unwrap().is_none(),
                "round {round}: second delivery for one key"
            );
            queue.ack(&job.id).unwrap();
        }
    }

    #[test]
    fn test_enqueue_same_url_different_owners_are_independent() {
        let queue = test_queue(3);
        let a = queue.enqueue(SUMMARIZE_TOPIC, &payload("blob://doc1", "u1")).unwrap();
        let b = queue.enqueue(SUMMARIZE_TOPIC, &payload("blob://doc1", "u2")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_transient_failures_retry_until_limit() {
        let queue = test_queue(3);
        queue.enqueue(SUMMARIZE_TOPIC, &payload("blob://doc1", "u1")).unwrap();

        // Two transient failures leave the job retryable.
        for expected_attempt in 1..=2 {
            let job = queue.dequeue(SUMMARIZE_TOPIC).unwrap().unwrap();
            assert_eq!(job.attempts, expected_attempt);
            let outcome = queue.fail(&job.id, "timeout", FailureKind::Transient).unwrap();
            assert_eq!(
                outcome,
                FailOutcome::Requeued {
                    attempts: expected_attempt
                }
            );
        }

        // The third delivery is the last: failing it dead-letters.
        let job = queue.dequeue(SUMMARIZE_TOPIC).unwrap().unwrap();
        assert_eq!(job.attempts, 3);
        let outcome = queue.fail(&job.id, "timeout", FailureKind::Transient).unwrap();
        assert_eq!(outcome, FailOutcome::DeadLettered);
        assert!(queue.dequeue(SUMMARIZE_TOPIC).unwrap().is_none());
    }

    #[test]
    fn test_permanent_failure_dead_letters_immediately() {
        let queue = test_queue(3);
        queue.enqueue(SUMMARIZE_TOPIC, &payload("blob://doc1", "u1")).unwrap();

        let job = queue.dequeue(SUMMARIZE_TOPIC).unwrap().unwrap();
        let outcome = queue
            .fail(&job.id, "unparseable document", FailureKind::Permanent)
            .unwrap();
        assert_eq!(outcome, FailOutcome::DeadLettered);
        assert!(queue.dequeue(SUMMARIZE_TOPIC).unwrap().is_none());
    }

    #[test]
    fn test_recover_redelivers_unacked_job() {
        let queue = test_queue(3);
        let id = queue.enqueue(SUMMARIZE_TOPIC, &payload("blob://doc1", "u1")).unwrap();

        // Claimed but never acked — the worker "crashed".
        queue.dequeue(SUMMARIZE_TOPIC).unwrap().unwrap();
        assert!(queue.dequeue(SUMMARIZE_TOPIC).unwrap().is_none());

        assert_eq!(queue.recover(SUMMARIZE_TOPIC).unwrap(), 1);
        let job = queue.dequeue(SUMMARIZE_TOPIC).unwrap().unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.attempts, 2);
    }

    #[test]
    fn test_dead_letter_key_can_be_enqueued_again() {
        let queue = test_queue(3);
        queue.enqueue(SUMMARIZE_TOPIC, &payload("blob://doc1", "u1")).unwrap();
        let job = queue.dequeue(SUMMARIZE_TOPIC).unwrap().unwrap();
        queue.fail(&job.id, "bad pdf", FailureKind::Permanent).unwrap();

        // Dead jobs are not in flight; a resubmission gets a fresh job.
        let fresh = queue.enqueue(SUMMARIZE_TOPIC, &payload("blob://doc1", "u1")).unwrap();
        assert_ne!(fresh, job.id);
        assert!(queue.dequeue(SUMMARIZE_TOPIC).unwrap().is_some());
    }
}
