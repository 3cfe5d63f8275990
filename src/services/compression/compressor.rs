// 压缩服务 - 协调各组件，决定复用已有产物还是重新压缩
//
// 状态流转：
// Requested -> Validating -> (ServeCached | DirectoryCheck -> Compressing -> Done) | Rejected
//
// 本模块负责：
// - 校验源 URL，派生缓存键
// - 判断已有产物是否仍然新鲜
// - 准备目录、获取源图片、转码并写入产物
// - 把所有失败统一为 CompressionError

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task;
use tracing::{debug, error, info, warn};

use crate::services::compression::codec::{transcode, CodecDispatcher, ImageCodec, TargetFormat};
use crate::services::compression::config::{CompressionConfig, FreshEntryPolicy};
use crate::services::compression::directory::DirectoryProvisioner;
use crate::services::compression::error::{CodecError, CompressionError, FetchError};
use crate::services::compression::fetcher::{HttpSourceFetcher, SourceFetcher};
use crate::services::compression::freshness::{Clock, FreshnessEvaluator, SystemClock};
use crate::services::compression::key_lock::KeyLocks;
use crate::services::compression::path::CacheKey;
use crate::services::compression::source::SourceReference;
use crate::services::compression::store::{ArtifactMetadata, ArtifactStore, FsArtifactStore};

/// 压缩结果的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// 本次重新压缩并写入了产物
    Compressed,
    /// 已有产物仍然新鲜，未做任何压缩（仅在 FreshEntryPolicy::Serve 下出现）
    CacheHit,
}

/// 一次压缩请求的成功结果
#[derive(Debug, Clone, Serialize)]
pub struct CompressionOutcome {
    pub status: OutcomeStatus,
    /// 原始源 URL
    pub source_url: String,
    /// 产物完整路径
    pub path: PathBuf,
    /// 相对压缩根目录的路径
    pub relative_path: PathBuf,
    /// 本次编码的目标格式，缓存命中时未知
    pub format: Option<TargetFormat>,
    /// 产物的 Content-Type，缓存命中时未知
    pub content_type: Option<&'static str>,
    /// 产物字节大小
    pub size: u64,
    /// 产物有效期截止时间
    pub valid_until: Option<DateTime<Utc>>,
}

/// 产物查询结果（不触发压缩）
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactLookup {
    pub path: PathBuf,
    pub relative_path: PathBuf,
    pub exists: bool,
    pub fresh: bool,
    pub modified_at: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

/// 图片压缩服务
pub struct ImageCompressor {
    /// 配置
    config: CompressionConfig,

    /// 新鲜度判定器
    freshness: FreshnessEvaluator,

    /// 产物存储
    store: Arc<dyn ArtifactStore>,

    /// 源图片获取器
    fetcher: Arc<dyn SourceFetcher>,

    /// 编解码器
    codec: Arc<dyn ImageCodec>,

    /// 时钟
    clock: Arc<dyn Clock>,

    /// 按缓存键串行化
    key_locks: KeyLocks,
}

impl ImageCompressor {
    /// 使用默认组件创建压缩服务（磁盘存储、HTTP 获取、image/webp 编解码、系统时钟）
    pub fn new(config: CompressionConfig) -> Result<Self, FetchError> {
        let fetcher = HttpSourceFetcher::new(std::time::Duration::from_secs(
            config.fetch_timeout_secs,
        ))?;

        Ok(Self::with_components(
            config,
            Arc::new(FsArtifactStore::new()),
            Arc::new(fetcher),
            Arc::new(CodecDispatcher::new()),
            Arc::new(SystemClock),
        ))
    }

    /// 使用注入的组件创建压缩服务
    pub fn with_components(
        config: CompressionConfig,
        store: Arc<dyn ArtifactStore>,
        fetcher: Arc<dyn SourceFetcher>,
        codec: Arc<dyn ImageCodec>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            freshness: FreshnessEvaluator::new(config.lifetime),
            config,
            store,
            fetcher,
            codec,
            clock,
            key_locks: KeyLocks::new(),
        }
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// 压缩入口
    ///
    /// # 参数
    /// - `origin_url`: 源图片 URL
    /// - `quality`: 压缩质量（0-100），None 时使用配置的默认值
    /// - `sub_dir`: 附加子目录，空字符串表示不使用
    ///
    /// # 返回
    /// - `Ok(CompressionOutcome)`: 已写入新产物，或（Serve 策略下）命中新鲜缓存
    /// - `Err(CompressionError::StillFresh)`: Reject 策略下命中新鲜缓存
    /// - `Err(..)`: 其他失败
    pub async fn compress(
        &self,
        origin_url: &str,
        quality: Option<u8>,
        sub_dir: &str,
    ) -> Result<CompressionOutcome, CompressionError> {
        let quality = quality.unwrap_or(self.config.default_quality).min(100);

        // Requested -> Rejected
        let source = SourceReference::parse(origin_url).map_err(|e| {
            warn!("拒绝压缩请求: {}", e);
            e
        })?;

        // Requested -> Validating
        let key = CacheKey::derive(&self.config.compressed_dir, sub_dir, &source)?;
        let destination = key.path();
        debug!("缓存键已派生: {} -> {:?}", source, destination);

        let _permit = if self.config.single_flight {
            Some(self.key_locks.acquire(&destination).await)
        } else {
            None
        };

        let now = self.clock.now();
        let existing = self.entry_metadata(&destination).await;

        // Validating -> ServeCached
        if let Some(meta) = existing
            .as_ref()
            .filter(|meta| self.freshness.is_entry_fresh(Some(*meta), now))
        {
            return self.serve_cached(&source, &key, meta);
        }

        if existing.is_some() {
            info!("压缩产物已过期，重新压缩: {:?}", destination);
        }

        // Validating -> DirectoryCheck
        DirectoryProvisioner::ensure_dir(self.store.as_ref(), &key.dir()).await?;

        // DirectoryCheck -> Compressing
        let source_bytes = self.fetcher.fetch(&source).await.map_err(|e| {
            warn!("源图片获取失败: {}, 错误: {}", source, e);
            CompressionError::from(e)
        })?;

        let codec = Arc::clone(&self.codec);
        let artifact = task::spawn_blocking(move || transcode(codec.as_ref(), &source_bytes, quality))
            .await
            .map_err(|e| CompressionError::CodecFailure {
                mime: "unknown".to_string(),
                reason: format!("codec task failed: {}", e),
            })?
            .map_err(|e| Self::codec_failure(e, &destination, &source))?;

        if let Err(e) = self.store.write(&destination, &artifact.bytes).await {
            return Err(Self::report_compression_failed(
                &destination,
                artifact.format,
                &source,
                e.to_string(),
            ));
        }

        // Compressing -> Done
        // 有效期以产物实际的修改时间为准，与 lookup 的结果一致
        let modified_at = match self.entry_metadata(&destination).await {
            Some(meta) => meta.modified_at,
            None => self.clock.now(),
        };
        let valid_until = self.freshness.valid_until(modified_at);
        info!(
            "图片压缩完成: {} -> {:?} ({} -> {}, 质量 {}, {} 字节)",
            source,
            destination,
            artifact.source_mime,
            artifact.format,
            quality,
            artifact.bytes.len()
        );

        Ok(CompressionOutcome {
            status: OutcomeStatus::Compressed,
            source_url: source.as_str().to_string(),
            path: destination,
            relative_path: key.relative_path(),
            format: Some(artifact.format),
            content_type: Some(artifact.format.mime()),
            size: artifact.bytes.len() as u64,
            valid_until,
        })
    }

    /// 查询产物状态，不触发压缩
    pub async fn lookup(
        &self,
        origin_url: &str,
        sub_dir: &str,
    ) -> Result<ArtifactLookup, CompressionError> {
        let source = SourceReference::parse(origin_url)?;
        let key = CacheKey::derive(&self.config.compressed_dir, sub_dir, &source)?;
        let path = key.path();

        let existing = self
            .entry_metadata(&path)
            .await
            .filter(|meta| meta.is_file);
        let now = self.clock.now();

        Ok(ArtifactLookup {
            exists: existing.is_some(),
            fresh: self.freshness.is_entry_fresh(existing.as_ref(), now),
            modified_at: existing.as_ref().map(|meta| meta.modified_at),
            valid_until: existing
                .as_ref()
                .and_then(|meta| self.freshness.valid_until(meta.modified_at)),
            relative_path: key.relative_path(),
            path,
        })
    }

    /// 命中新鲜缓存
    fn serve_cached(
        &self,
        source: &SourceReference,
        key: &CacheKey,
        meta: &ArtifactMetadata,
    ) -> Result<CompressionOutcome, CompressionError> {
        let path = key.path();
        let valid_until = self.freshness.valid_until(meta.modified_at);

        match self.config.fresh_entry_policy {
            FreshEntryPolicy::Reject => {
                info!("压缩产物仍在生命周期内，跳过压缩: {:?}", path);
                Err(CompressionError::StillFresh {
                    path,
                    valid_until: valid_until.unwrap_or(DateTime::<Utc>::MAX_UTC),
                })
            }
            FreshEntryPolicy::Serve => {
                info!("命中压缩缓存: {:?}", path);
                Ok(CompressionOutcome {
                    status: OutcomeStatus::CacheHit,
                    source_url: source.as_str().to_string(),
                    path,
                    relative_path: key.relative_path(),
                    format: None,
                    content_type: None,
                    size: meta.len,
                    valid_until,
                })
            }
        }
    }

    /// 读取产物元数据；读取出错时按不存在处理，强制重新压缩
    async fn entry_metadata(&self, path: &Path) -> Option<ArtifactMetadata> {
        match self.store.metadata(path).await {
            Ok(meta) => meta,
            Err(e) => {
                warn!("读取压缩产物元数据失败，按不存在处理: {:?}, 错误: {}", path, e);
                None
            }
        }
    }

    fn codec_failure(
        err: CodecError,
        destination: &Path,
        source: &SourceReference,
    ) -> CompressionError {
        match err {
            CodecError::UnknownFormat(reason) => {
                warn!("无法识别源图片格式: {}, 错误: {}", source, reason);
                CompressionError::CodecFailure {
                    mime: "unknown".to_string(),
                    reason,
                }
            }
            CodecError::Decode { mime, reason } => {
                warn!("源图片解码失败: {} ({}), 错误: {}", source, mime, reason);
                CompressionError::CodecFailure {
                    mime: mime.to_string(),
                    reason,
                }
            }
            CodecError::Encode { format, reason } => {
                Self::report_compression_failed(destination, format, source, reason)
            }
        }
    }

    fn report_compression_failed(
        destination: &Path,
        format: TargetFormat,
        source: &SourceReference,
        reason: String,
    ) -> CompressionError {
        error!(
            destination = %destination.display(),
            format = %format,
            origin = %source,
            "图片压缩失败: {}",
            reason
        );
        CompressionError::CompressionFailed {
            destination: destination.to_path_buf(),
            format,
            origin: source.as_str().to_string(),
            reason,
        }
    }
}
