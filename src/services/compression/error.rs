// 压缩模块错误类型定义
//
// 定义了图片压缩缓存流程中可能出现的各种错误类型

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

use crate::services::compression::codec::{SourceMime, TargetFormat};

/// 压缩操作的统一错误类型
///
/// 所有失败路径都在编排器边界汇总为该类型，不会以 panic 的形式传到请求边界
#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("url incomplete or image type not supported [{url}]: {reason}")]
    UnsupportedSource { url: String, reason: String },

    #[error("invalid additional directory [{0}]")]
    InvalidSubDirectory(String),

    #[error("image still within lifetime [{}] (valid until {valid_until})", path.display())]
    StillFresh {
        path: PathBuf,
        valid_until: DateTime<Utc>,
    },

    #[error("directory [{}] does not exist and could not be created: {source}", path.display())]
    DirectoryUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source image could not be fetched: {0}")]
    SourceFetch(#[from] FetchError),

    #[error("virtual image of type [{mime}] could not be created: {reason}")]
    CodecFailure { mime: String, reason: String },

    #[error("image at path [{}] ({format}) could not be compressed: {reason}", destination.display())]
    CompressionFailed {
        destination: PathBuf,
        format: TargetFormat,
        origin: String,
        reason: String,
    },
}

impl CompressionError {
    /// 错误种类的稳定标识（用于日志和 API 响应）
    pub fn kind(&self) -> &'static str {
        match self {
            CompressionError::UnsupportedSource { .. } => "unsupported_source",
            CompressionError::InvalidSubDirectory(_) => "invalid_sub_directory",
            CompressionError::StillFresh { .. } => "still_fresh",
            CompressionError::DirectoryUnavailable { .. } => "directory_unavailable",
            CompressionError::SourceFetch(_) => "source_fetch",
            CompressionError::CodecFailure { .. } => "codec_failure",
            CompressionError::CompressionFailed { .. } => "compression_failed",
        }
    }

    pub(crate) fn unsupported(url: &str, reason: impl Into<String>) -> Self {
        CompressionError::UnsupportedSource {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

/// 编解码相关错误
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unrecognized image format: {0}")]
    UnknownFormat(String),

    #[error("decode of [{mime}] failed: {reason}")]
    Decode { mime: SourceMime, reason: String },

    #[error("encode to [{format}] failed: {reason}")]
    Encode { format: TargetFormat, reason: String },
}

/// 源图片获取相关错误
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    NetworkError(String),

    #[error("download timed out")]
    Timeout,

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("http error: status {0}")]
    HttpError(u16),

    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),

    #[error("local file read failed: {0}")]
    LocalRead(#[from] std::io::Error),
}

// 实现从 reqwest::Error 到 FetchError 的转换
impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_status() {
            match err.status() {
                Some(status) => FetchError::HttpError(status.as_u16()),
                None => FetchError::NetworkError(err.to_string()),
            }
        } else {
            FetchError::NetworkError(err.to_string())
        }
    }
}

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid lifetime [{0}], expected e.g. \"6 hours\"")]
    InvalidLifetime(String),

    #[error("invalid quality [{0}], expected 0-100")]
    InvalidQuality(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = CompressionError::unsupported("https://example.com/a.gif", "gif");
        assert_eq!(err.kind(), "unsupported_source");

        let err = CompressionError::InvalidSubDirectory("../etc".to_string());
        assert_eq!(err.kind(), "invalid_sub_directory");
    }

    #[test]
    fn test_directory_unavailable_message_keeps_path_and_cause() {
        let err = CompressionError::DirectoryUnavailable {
            path: PathBuf::from("/tmp/compressed"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let message = err.to_string();
        assert!(message.contains("/tmp/compressed"));
        assert!(message.contains("denied"));
    }

    #[test]
    fn test_compression_failed_carries_context() {
        let err = CompressionError::CompressionFailed {
            destination: PathBuf::from("compressed_imgs/a.png"),
            format: TargetFormat::Webp,
            origin: "https://example.com/a.png".to_string(),
            reason: "encoder refused".to_string(),
        };
        assert!(err.to_string().contains("compressed_imgs/a.png"));
        assert!(err.to_string().contains("webp"));
        match err {
            CompressionError::CompressionFailed { origin, .. } => {
                assert_eq!(origin, "https://example.com/a.png");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_fetch_error_converts_into_compression_error() {
        let err: CompressionError = FetchError::HttpError(404).into();
        assert_eq!(err.kind(), "source_fetch");
        assert!(err.to_string().contains("404"));
    }
}
