use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use docsum::api::{self, AppState};
use docsum::fetch::HttpBlobFetcher;
use docsum::summarizer::OpenAiSummarizer;
use docsum::worker::{SummaryPipeline, WorkerConfig, WorkerPool};
use docsum::{Config, Database, JobQueue, SUMMARIZE_TOPIC};

#[tokio::main]
async fn main() -> docsum::Result<()> {
    // Route log:: records from the db layer into tracing.
    let _ = tracing_log::LogTracer::init();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("docsum=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let db = Database::open(&config.database_path)?;
    let queue = JobQueue::new(db.clone(), config.max_attempts);

    // Jobs a previous process claimed but never finished go back in the
    // queue before any worker starts.
    let recovered = queue.recover(SUMMARIZE_TOPIC)?;
    if recovered > 0 {
        tracing::info!(recovered, "Requeued jobs from previous run");
    }

    let pipeline = Arc::new(SummaryPipeline::new(
        db.clone(),
        Arc::new(HttpBlobFetcher::new(config.fetch_timeout)?),
        Arc::new(OpenAiSummarizer::new(&config.summarizer)?),
        config.max_input_chars,
    ));

    let pool = WorkerPool::spawn(
        &WorkerConfig {
            worker_count: config.worker_count,
            poll_interval: config.queue_poll_interval,
        },
        db.clone(),
        queue.clone(),
        pipeline,
    );

    let app = api::router(AppState { db, queue });
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The listener is closed; drain in-flight jobs before exiting.
    pool.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install shutdown signal handler: {e}");
        return;
    }
    tracing::info!("Shutdown signal received");
}
