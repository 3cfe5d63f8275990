use axum::{extract::State, response::IntoResponse};
use serde_json::json;

use super::response::success;
use super::AppState;

/// 健康检查端点
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.compressor.config();

    success(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "compressed_dir": config.compressed_dir.display().to_string(),
        "lifetime": config.lifetime.to_string(),
        "default_quality": config.default_quality,
    }))
}
