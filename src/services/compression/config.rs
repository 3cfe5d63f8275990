// 压缩缓存配置
//
// 配置来源（后者覆盖前者）：
// - 内置默认值
// - JSON 配置文件（默认 compression_config.json，可用 COMPRESSION_CONFIG_PATH 指定）
// - 环境变量 COMPRESSED_DIR / IMG_LIFETIME / DEFAULT_QUALITY

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::services::compression::error::ConfigError;
use crate::services::compression::freshness::Lifetime;

/// 命中新鲜缓存时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshEntryPolicy {
    /// 兼容旧行为：把“仍在生命周期内”作为压缩请求的失败返回
    #[default]
    Reject,
    /// 返回 CacheHit 成功结果
    Serve,
}

/// 压缩缓存配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// 压缩产物根目录
    pub compressed_dir: PathBuf,

    /// 产物生命周期，例如 "6 hours"
    pub lifetime: Lifetime,

    /// 默认压缩质量（0-100）
    pub default_quality: u8,

    /// 命中新鲜缓存时的处理策略
    pub fresh_entry_policy: FreshEntryPolicy,

    /// 是否按缓存键串行化并发请求
    pub single_flight: bool,

    /// 源图片下载超时（秒）
    pub fetch_timeout_secs: u64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            compressed_dir: PathBuf::from(Self::DEFAULT_COMPRESSED_DIR),
            lifetime: Lifetime::DEFAULT,
            default_quality: 50,
            fresh_entry_policy: FreshEntryPolicy::Reject,
            single_flight: true,
            fetch_timeout_secs: 30,
        }
    }
}

impl CompressionConfig {
    /// 默认压缩目录
    const DEFAULT_COMPRESSED_DIR: &'static str = "compressed_imgs";

    /// 默认配置文件路径
    pub const DEFAULT_CONFIG_PATH: &'static str = "compression_config.json";

    /// 从配置文件加载配置
    ///
    /// # 行为
    /// - 如果配置文件不存在，使用默认配置
    /// - 如果配置文件损坏，记录警告并使用默认配置
    pub async fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config_path =
            config_path.unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CONFIG_PATH));

        if !config_path.exists() {
            tracing::info!("配置文件不存在，使用默认配置: {:?}", config_path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).await?;
        match serde_json::from_str::<CompressionConfig>(&content) {
            Ok(config) => {
                tracing::info!("成功加载压缩配置: {:?}", config_path);
                Ok(config)
            }
            Err(e) => {
                tracing::warn!("配置文件损坏，使用默认配置: {:?}, 错误: {}", config_path, e);
                Ok(Self::default())
            }
        }
    }

    /// 用环境变量覆盖配置
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// 用任意键值来源覆盖配置
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("COMPRESSED_DIR").filter(|v| !v.trim().is_empty()) {
            self.compressed_dir = PathBuf::from(dir.trim());
        }

        if let Some(lifetime) = lookup("IMG_LIFETIME") {
            self.lifetime = Lifetime::parse(&lifetime)?;
        }

        if let Some(quality) = lookup("DEFAULT_QUALITY") {
            self.default_quality = parse_quality(&quality)?;
        }

        Ok(self)
    }

    pub fn compressed_dir(&self) -> &Path {
        &self.compressed_dir
    }
}

/// 解析 0-100 的质量参数
pub fn parse_quality(raw: &str) -> Result<u8, ConfigError> {
    raw.trim()
        .parse::<u8>()
        .ok()
        .filter(|q| *q <= 100)
        .ok_or_else(|| ConfigError::InvalidQuality(raw.to_string()))
}
