//! Liveness endpoint, unauthenticated and outside the rate limiter.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use tokio::time::timeout;
use tracing::warn;

use crate::response::{self, ApiResponse};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub database: &'static str,
    pub storage: &'static str,
    pub cpu_usage_percent: f32,
    pub memory_total_bytes: u64,
    pub memory_used_bytes: u64,
    pub memory_usage_percent: f32,
}

fn up_or_down(up: bool) -> &'static str {
    if up { "up" } else { "down" }
}

/// Run one dependency probe under `budget`; a probe that overruns counts
/// as down.
async fn probe(name: &str, budget: Duration, check: impl Future<Output = bool>) -> bool {
    match timeout(budget, check).await {
        Ok(up) => up,
        Err(_) => {
            warn!(
                dependency = name,
                budget_ms = budget.as_millis() as u64,
                "health probe timed out"
            );
            false
        }
    }
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let budget = state.settings.health_check_timeout;
    let (database_up, storage_up) = tokio::join!(
        probe("database", budget, state.db.ping()),
        probe("storage", budget, async { state.store.check().await.is_ok() }),
    );
    let healthy = database_up && storage_up;

    let (cpu_usage_percent, memory_total_bytes, memory_used_bytes) = {
        let mut system = state.system.lock().await;
        system.refresh_cpu();
        system.refresh_memory();
        let cpus = system.cpus();
        let cpu = if cpus.is_empty() {
            0.0
        } else {
            cpus.iter().map(|c| c.cpu_usage()).sum::<f32>() / cpus.len() as f32
        };
        (cpu, system.total_memory(), system.used_memory())
    };
    let memory_usage_percent = if memory_total_bytes > 0 {
        memory_used_bytes as f32 / memory_total_bytes as f32 * 100.0
    } else {
        0.0
    };

    let body = Health {
        status: if healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        database: up_or_down(database_up),
        storage: up_or_down(storage_up),
        cpu_usage_percent,
        memory_total_bytes,
        memory_used_bytes,
        memory_usage_percent,
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let envelope: Json<ApiResponse<Health>> = response::ok(body);
    (status, envelope)
}
