//! `/health` dependency probes and their time budget.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use vellum_db::{DbConfig, DbManager};
use vellum_mail::MemoryMailer;
use vellum_server::AppState;
use vellum_storage::{MemoryStore, ObjectInfo, ObjectStore, StorageResult};

/// An object store whose reachability check never completes.
struct UnresponsiveStore(MemoryStore);

#[async_trait]
impl ObjectStore for UnresponsiveStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        self.0.put(key, data, content_type).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.0.get(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.0.delete(key).await
    }

    async fn copy(&self, from: &str, to: &str) -> StorageResult<()> {
        self.0.copy(from, to).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        self.0.list(prefix).await
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        self.0.presign_get(key, ttl).await
    }

    async fn check(&self) -> StorageResult<()> {
        std::future::pending().await
    }
}

async fn get_health(store: Arc<dyn ObjectStore>) -> (StatusCode, Value, Duration) {
    let db = DbManager::connect(&DbConfig::in_memory()).await.unwrap();
    let mut settings = common::settings();
    settings.health_check_timeout = Duration::from_millis(200);
    let state = Arc::new(AppState::new(
        db,
        common::auth_config(),
        store,
        Arc::new(MemoryMailer::new()),
        settings,
    ));
    let router = vellum_server::router(state);

    let started = Instant::now();
    let response = router
        .oneshot(
            Request::get("/api/v1/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let elapsed = started.elapsed();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap(), elapsed)
}

#[tokio::test]
async fn healthy_dependencies_report_up() {
    let (status, body, _) = get_health(Arc::new(MemoryStore::new())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["database"], "up");
    assert_eq!(body["data"]["storage"], "up");
}

#[tokio::test]
async fn hung_store_is_reported_down_within_the_budget() {
    let (status, body, elapsed) =
        get_health(Arc::new(UnresponsiveStore(MemoryStore::new()))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["data"]["status"], "degraded");
    assert_eq!(body["data"]["storage"], "down");
    assert_eq!(body["data"]["database"], "up");
    assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
}
