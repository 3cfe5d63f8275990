use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

use crate::services::compression::CompressionError;

/// 统一的API错误类型
///
/// 所有变体都携带源 URL，响应体中以 `data: [origin_img_url]` 返回
#[derive(Debug)]
pub enum ApiError {
    /// 压缩流程失败
    Compression {
        origin_url: String,
        error: CompressionError,
    },
    /// 请求参数错误
    BadRequest { origin_url: String, message: String },
}

impl ApiError {
    pub fn compression(origin_url: impl Into<String>, error: CompressionError) -> Self {
        ApiError::Compression {
            origin_url: origin_url.into(),
            error,
        }
    }

    pub fn bad_request(origin_url: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            origin_url: origin_url.into(),
            message: message.into(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Compression { error, .. } => match error {
                CompressionError::UnsupportedSource { .. }
                | CompressionError::InvalidSubDirectory(_)
                | CompressionError::CodecFailure { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                // 产物仍可用，只是本次无需压缩
                CompressionError::StillFresh { .. } => StatusCode::OK,
                CompressionError::SourceFetch(_) => StatusCode::BAD_GATEWAY,
                CompressionError::DirectoryUnavailable { .. }
                | CompressionError::CompressionFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ApiError::BadRequest { .. } => "bad_request",
            ApiError::Compression { error, .. } => error.kind(),
        }
    }

    fn origin_url(&self) -> &str {
        match self {
            ApiError::Compression { origin_url, .. } | ApiError::BadRequest { origin_url, .. } => {
                origin_url
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Compression { error, .. } => {
                write!(f, "unable to compress image: {}", error)
            }
            ApiError::BadRequest { message, .. } => write!(f, "Bad request: {}", message),
        }
    }
}

impl std::error::Error for ApiError {}

/// 实现IntoResponse，将错误转换为HTTP响应
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("压缩请求失败: {}", self);
        } else {
            tracing::debug!("压缩请求未执行: {}", self);
        }

        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
            "data": [self.origin_url()],
            "error": {
                "type": self.error_type(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result类型别名
pub type ApiResult<T> = Result<T, ApiError>;
