//! API Module
//!
//! HTTP surface through which the platform pushes trigger changes.

pub mod cronjob;
pub mod error;
pub mod health;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::engine::Engines;
use crate::handler::CronjobHandler;

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<CronjobHandler>,
    pub engines: Arc<Engines>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/cronjob", post(cronjob::handle_messages))
        .route("/cronjob/registered", get(cronjob::list_registered))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::testing::{FakeSource, RecordingInvoker};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::util::ServiceExt;

    async fn app() -> Router {
        let engines = Arc::new(
            Engines::new(Arc::new(RecordingInvoker::default()))
                .await
                .unwrap(),
        );
        let handler = Arc::new(CronjobHandler::new(
            engines.clone(),
            Arc::new(FakeSource::default()),
        ));
        create_router(AppState { handler, engines })
    }

    fn enable_message(cron: &str) -> serde_json::Value {
        json!([{
            "name": "nightly",
            "product_name": "shop",
            "action": "enable",
            "kind": "workflow",
            "engine": "recurring",
            "triggers": [{
                "id": "65f0c1",
                "name": "nightly",
                "schedule": { "type": "crontab", "cron": cron },
                "payload": { "kind": "workflow", "args": { "name": "nightly" } },
            }],
        }])
    }

    fn post(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/cronjob")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_enable_message_registers_trigger() {
        let router = app().await;

        let response = router
            .clone()
            .oneshot(post(enable_message("30 2 * * *")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/cronjob/registered")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let registered: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(registered["recurring"], json!(["65f0c1"]));
        assert_eq!(registered["one_shot"], json!([]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_bad_schedule_is_rejected() {
        let response = app()
            .await
            .oneshot(post(enable_message("whenever")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
