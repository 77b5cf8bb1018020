//! Worker pool.
//!
//! Each worker is a tokio task running a dequeue loop on the
//! summarization topic: claim a job, run the pipeline, then ack or
//! report the failure back to the queue. An idle worker sleeps for the
//! configured poll interval between dequeue attempts.
//!
//! Acking happens only after the result is durably persisted, so a
//! worker dying mid-job loses nothing; the job is redelivered on the
//! next startup.

pub mod pipeline;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::db::{summary_repo, Database};
use crate::queue::{DeliveredJob, FailOutcome, JobQueue, SUMMARIZE_TOPIC};

pub use pipeline::SummaryPipeline;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_count: usize,
    pub poll_interval: Duration,
}

pub struct WorkerPool {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns the configured number of workers and returns immediately.
    pub fn spawn(
        config: &WorkerConfig,
        db: Database,
        queue: JobQueue,
        pipeline: Arc<SummaryPipeline>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);

        let handles = (0..config.worker_count)
            .map(|worker_id| {
                let worker = Worker {
                    id: worker_id,
                    db: db.clone(),
                    queue: queue.clone(),
                    pipeline: pipeline.clone(),
                    poll_interval: config.poll_interval,
                };
                let shutdown_rx = shutdown.subscribe();
                tokio::spawn(async move { worker.run(shutdown_rx).await })
            })
            .collect();

        tracing::info!(workers = config.worker_count, "Worker pool started");
        Self { shutdown, handles }
    }

    /// Signals all workers to stop and waits for them to drain. A worker
    /// mid-job finishes that job first.
    pub async fn shutdown(self) {
        // Receivers may all have dropped already if every worker exited.
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::warn!("Worker task panicked during shutdown: {e}");
            }
        }
        tracing::info!("Worker pool stopped");
    }
}

struct Worker {
    id: usize,
    db: Database,
    queue: JobQueue,
    pipeline: Arc<SummaryPipeline>,
    poll_interval: Duration,
}

impl Worker {
    async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::debug!(worker_id = self.id, "Worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.queue.dequeue(SUMMARIZE_TOPIC) {
                Ok(Some(job)) => self.process_one(&job).await,
                Ok(None) => {
                    // Idle: sleep, but wake immediately on shutdown.
                    tokio::select! {
                        _ = tokio::time::sleep(self.poll_interval) => {}
                        _ = shutdown.changed() => {}
                    }
                }
                Err(e) => {
                    tracing::error!(worker_id = self.id, "Dequeue failed: {e}");
                    tokio::select! {
                        _ = tokio::time::sleep(self.poll_interval) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }
        tracing::debug!(worker_id = self.id, "Worker stopped");
    }

    async fn process_one(&self, job: &DeliveredJob) {
        match self.pipeline.run(job).await {
            Ok(_) => {
                if let Err(e) = self.queue.ack(&job.id) {
                    // The result is already persisted; a redelivery after
                    // restart rewrites the same record.
                    tracing::error!(job_id = %job.id, "Failed to ack job: {e}");
                }
            }
            Err(err) => {
                let kind = err.kind();
                tracing::warn!(
                    job_id = %job.id,
                    attempt = job.attempts,
                    ?kind,
                    "Job failed: {err}"
                );
                match self.queue.fail(&job.id, &err.to_string(), kind) {
                    Ok(FailOutcome::Requeued { attempts }) => {
                        tracing::info!(job_id = %job.id, attempts, "Job requeued");
                    }
                    Ok(FailOutcome::DeadLettered) => {
                        tracing::error!(job_id = %job.id, "Job dead-lettered");
                        if let Err(e) = summary_repo::record_failed(
                            &self.db,
                            &job.payload.file_url,
                            &job.payload.owner_id,
                        ) {
                            tracing::error!(job_id = %job.id, "Failed to record failure: {e}");
                        }
                    }
                    Err(e) => {
                        tracing::error!(job_id = %job.id, "Failed to report job failure: {e}");
                    }
                }
            }
        }
    }
}
