use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::adapters::{
    controllers::{file_controller::FileController, health_controller::HealthController},
    state::AppState,
};

/// Room for multipart boundaries and the non-file fields.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn cors_layer(allowed_origins: Option<&[String]>) -> CorsLayer {
    match allowed_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        // development only
        None => CorsLayer::permissive(),
    }
}

pub fn build_router(app_state: AppState, cors: CorsLayer, max_file_size: u64) -> Router {
    let body_limit = usize::try_from(max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/api/v1/health", get(HealthController::health_check))
        .route("/api/v1/settings", get(FileController::get_settings))
        .route(
            "/api/v1/files",
            get(FileController::list_files).post(FileController::upload_file),
        )
        .route(
            "/api/v1/files/{file_id}",
            get(FileController::get_file_info).delete(FileController::delete_file),
        )
        .route(
            "/api/v1/files/{file_id}/content",
            get(FileController::download_file),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(app_state)
}
