//! HTTP API.
//!
//! The outward surface of the service: submit a document, poll its
//! status, list and delete stored summaries. Handlers never block on
//! summarization; the worker pool picks jobs up from the durable queue.

pub mod auth;
pub mod error;
pub mod routes;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::db::Database;
use crate::queue::JobQueue;

pub use auth::{AuthUser, SESSION_HEADER};
pub use error::ApiError;

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub queue: JobQueue,
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/queue-job", post(routes::queue_job))
        .route("/api/summary-status", get(routes::summary_status))
        .route("/api/summaries", get(routes::list_summaries))
        .route("/api/summaries/:id", delete(routes::delete_summary))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::db::summary_repo;

    fn test_state() -> AppState {
        let db = Database::open_in_memory().expect("Failed to create test database");
        let queue = JobQueue::new(db.clone(), 3);
        AppState { db, queue }
    }

    fn authed(method: &str, uri: &str, user: &str, body: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(SESSION_HEADER, user);
        if body.is_some() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        builder
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_default())
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_queue_job_requires_auth() {
        let app = router(test_state());
        let request = Request::builder()
            .method("POST")
            .uri("/api/queue-job")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"fileUrl":"blob://doc1"}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_queue_job_requires_file_url() {
        let state = test_state();
        let response = router(state.clone())
            .oneshot(authed("POST", "/api/queue-job", "u1", Some("{}")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Missing fileUrl");

        // Nothing was enqueued and no placeholder row was written.
        assert!(state
            .queue
            .dequeue(crate::queue::SUMMARIZE_TOPIC)
            .unwrap()
            .is_none());
        assert!(summary_repo::list_for_owner(&state.db, "u1")
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_queue_job_enqueues_and_inserts_pending() {
        let state = test_state();
        let app = router(state.clone());

        let response = app
            .oneshot(authed(
                "POST",
                "/api/queue-job",
                "u1",
                Some(r#"{"fileUrl":"blob://doc1"}"#),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "queued");

        let row = summary_repo::find(&state.db, "blob://doc1", "u1")
            .unwrap()
            .unwrap();
        assert_eq!(row.status, summary_repo::STATUS_PENDING);
        assert!(state
            .queue
            .dequeue(crate::queue::SUMMARIZE_TOPIC)
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_summary_status_lifecycle() {
        let state = test_state();

        // Unknown document.
        let response = router(state.clone())
            .oneshot(authed(
                "GET",
                "/api/summary-status?fileUrl=blob://doc1",
                "u1",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["status"], "not_found");

        // Pending after enqueue.
        summary_repo::insert_pending(&state.db, "blob://doc1", "u1").unwrap();
        let response = router(state.clone())
            .oneshot(authed(
                "GET",
                "/api/summary-status?fileUrl=blob://doc1",
                "u1",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "pending");
        assert_eq!(body["summary"], serde_json::Value::Null);

        // Done once the worker persists.
        summary_repo::record_done(&state.db, "blob://doc1", "u1", "A summary.").unwrap();
        let response = router(state.clone())
            .oneshot(authed(
                "GET",
                "/api/summary-status?fileUrl=blob://doc1",
                "u1",
                None,
            ))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["status"], "done");
        assert_eq!(body["summary"], "A summary.");

        // Another owner sees nothing for the same URL.
        let response = router(state)
            .oneshot(authed(
                "GET",
                "/api/summary-status?fileUrl=blob://doc1",
                "u2",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_summaries_owner_scoped_newest_first() {
        let state = test_state();
        summary_repo::record_done(&state.db, "blob://a", "u1", "First.").unwrap();
        summary_repo::record_done(&state.db, "blob://b", "u1", "Second.").unwrap();
        summary_repo::record_done(&state.db, "blob://c", "u2", "Other owner.").unwrap();

        let response = router(state)
            .oneshot(authed("GET", "/api/summaries", "u1", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let list = body["summaries"].as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["fileUrl"], "blob://b");
        assert_eq!(list[1]["fileUrl"], "blob://a");
        assert_eq!(list[0]["summary"], "Second.");
    }

    #[tokio::test]
    async fn test_delete_summary_owner_scoped() {
        let state = test_state();
        summary_repo::record_done(&state.db, "blob://doc1", "u1", "A summary.").unwrap();
        let id = summary_repo::find(&state.db, "blob://doc1", "u1")
            .unwrap()
            .unwrap()
            .id;

        // Foreign owner gets not-found, record survives.
        let response = router(state.clone())
            .oneshot(authed("DELETE", &format!("/api/summaries/{id}"), "u2", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = router(state.clone())
            .oneshot(authed("DELETE", &format!("/api/summaries/{id}"), "u1", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(summary_repo::find(&state.db, "blob://doc1", "u1")
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let response = router(test_state())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
