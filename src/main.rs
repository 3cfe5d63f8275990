use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use image_compression_backend::api::{self, AppState};
use image_compression_backend::services::compression::FsArtifactStore;
use image_compression_backend::{CompressionConfig, ImageCompressor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    // 支持环境变量配置路径，默认使用 compression_config.json
    let config_path = std::env::var("COMPRESSION_CONFIG_PATH")
        .ok()
        .map(PathBuf::from);
    let config = CompressionConfig::load(config_path).await?.apply_env()?;

    tracing::info!(
        "压缩缓存配置: dir={:?}, lifetime={}, default_quality={}, policy={:?}",
        config.compressed_dir,
        config.lifetime,
        config.default_quality,
        config.fresh_entry_policy
    );

    // 清理上次进程异常退出时残留的临时文件
    match FsArtifactStore::new()
        .sweep_temp_files(&config.compressed_dir)
        .await
    {
        Ok(0) => {}
        Ok(removed) => tracing::info!("已清理 {} 个残留临时文件", removed),
        Err(e) => tracing::warn!("清理残留临时文件失败: {}", e),
    }

    let compressor = Arc::new(ImageCompressor::new(config)?);
    let app = api::router(AppState { compressor });

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .unwrap_or(3000);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("🚀 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
