use std::time::Duration;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use sysinfo::{System, MINIMUM_CPU_UPDATE_INTERVAL};
use tracing::{info, warn};

use crate::{adapters::state::AppState, services::OperationScope};

const PING_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub driver: String,
    pub storage: StorageHealth,
    pub metrics: SystemMetrics,
}

#[derive(Debug, Serialize)]
pub struct StorageHealth {
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SystemMetrics {
    #[serde(rename = "cpuUsagePercent")]
    pub cpu_usage_percent: f32,
    #[serde(rename = "memoryUsedBytes")]
    pub memory_used_bytes: u64,
    #[serde(rename = "memoryTotalBytes")]
    pub memory_total_bytes: u64,
    #[serde(rename = "memoryUsagePercent")]
    pub memory_usage_percent: f32,
}

pub struct HealthController;

impl HealthController {
    /// GET /api/v1/health
    pub async fn health_check(
        State(app_state): State<AppState>,
    ) -> (StatusCode, Json<HealthResponse>) {
        info!("Health check requested");

        let scope = OperationScope::new(PING_TIMEOUT, app_state.shutdown.child_token());
        let storage = match app_state.storage.ping(&scope).await {
            Ok(()) => StorageHealth {
                reachable: true,
                error: None,
            },
            Err(e) => {
                warn!(error = %e, "Storage liveness check failed");
                StorageHealth {
                    reachable: false,
                    error: Some(e.to_string()),
                }
            }
        };

        let metrics = sample_metrics().await;

        let (status, label) = if storage.reachable {
            (StatusCode::OK, "healthy")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
        };

        (
            status,
            Json(HealthResponse {
                status: label.to_string(),
                driver: app_state.storage.driver().to_string(),
                storage,
                metrics,
            }),
        )
    }
}

/// CPU usage is a delta, so it needs two refreshes spaced by the minimum
/// interval sysinfo supports.
async fn sample_metrics() -> SystemMetrics {
    let mut sys = System::new();
    sys.refresh_cpu_usage();
    tokio::time::sleep(MINIMUM_CPU_UPDATE_INTERVAL).await;
    sys.refresh_cpu_usage();
    sys.refresh_memory();

    let memory_used = sys.used_memory();
    let memory_total = sys.total_memory();
    let memory_usage_percent = if memory_total > 0 {
        (memory_used as f32 / memory_total as f32) * 100.0
    } else {
        0.0
    };

    SystemMetrics {
        cpu_usage_percent: sys.global_cpu_usage(),
        memory_used_bytes: memory_used,
        memory_total_bytes: memory_total,
        memory_usage_percent,
    }
}
