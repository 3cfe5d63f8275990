pub mod compress;
pub mod error;
pub mod health;
pub mod response;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::services::ImageCompressor;

#[derive(Clone)]
pub struct AppState {
    pub compressor: Arc<ImageCompressor>,
}

/// 构建路由
///
/// 压缩产物目录以静态文件的形式挂载在 `/compressed` 下
pub fn router(state: AppState) -> Router {
    let compressed_dir = state.compressor.config().compressed_dir().to_path_buf();

    Router::new()
        .route("/", get(|| async { "Image Compression Backend API v1.0" }))
        .route("/api/health", get(health::health_check))
        .route(
            "/api/compress",
            get(compress::compress_image).post(compress::compress_image_form),
        )
        .route("/api/compress/lookup", get(compress::lookup_artifact))
        .nest_service("/compressed", ServeDir::new(compressed_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
