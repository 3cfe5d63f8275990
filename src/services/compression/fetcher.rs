// 源图片获取 - 读取待压缩图片的原始字节
//
// 支持：
// - http/https：reqwest 下载（带超时）
// - file://：读取本地文件

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio::fs;
use tokio::time::timeout;
use tracing::debug;

use crate::services::compression::error::FetchError;
use crate::services::compression::source::SourceReference;

/// 源图片获取能力
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, source: &SourceReference) -> Result<Vec<u8>, FetchError>;
}

/// 基于 reqwest 的获取器
#[derive(Clone)]
pub struct HttpSourceFetcher {
    /// HTTP 客户端
    client: Client,

    /// 下载超时
    timeout: Duration,
}

impl HttpSourceFetcher {
    /// 创建新的获取器
    ///
    /// # 参数
    /// - `timeout`: 单次下载的超时时间
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .pool_max_idle_per_host(10) // 每个主机最多保持 10 个空闲连接
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| FetchError::NetworkError(format!("failed to build http client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// 下载图片（带超时控制）
    async fn download_with_timeout(&self, source: &SourceReference) -> Result<Vec<u8>, FetchError> {
        match timeout(self.timeout, self.download(source)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        }
    }

    async fn download(&self, source: &SourceReference) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(source.url().clone())
            .header("Accept", "image/jpeg,image/png,image/gif,image/*;q=0.8")
            .send()
            .await?;

        // 检查 HTTP 状态码
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpError(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn read_local(source: &SourceReference) -> Result<Vec<u8>, FetchError> {
        let path = source
            .url()
            .to_file_path()
            .map_err(|_| FetchError::InvalidUrl(source.as_str().to_string()))?;
        Ok(fs::read(path).await?)
    }
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    async fn fetch(&self, source: &SourceReference) -> Result<Vec<u8>, FetchError> {
        debug!("开始获取源图片: {}", source);

        let bytes = match source.url().scheme() {
            "http" | "https" => self.download_with_timeout(source).await?,
            "file" => Self::read_local(source).await?,
            other => return Err(FetchError::UnsupportedScheme(other.to_string())),
        };

        debug!("源图片获取完成: {} ({} 字节)", source, bytes.len());
        Ok(bytes)
    }
}
