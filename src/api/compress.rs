// 图片压缩 API
//
// 提供图片压缩的 HTTP API 端点，包括：
// - 压缩指定 URL 的图片（GET 查询参数或 POST 表单）
// - 查询压缩产物状态

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Form,
};
use serde::Deserialize;

use crate::services::compression::{config::parse_quality, OutcomeStatus};

use super::error::{ApiError, ApiResult};
use super::response::{success, ApiResponse};
use super::AppState;

/// 压缩请求参数
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompressParams {
    /// 源图片 URL
    #[serde(default)]
    pub origin_img_url: String,

    /// 压缩质量（0-100），不传则使用配置默认值
    #[serde(default)]
    pub quality: Option<String>,

    /// 附加子目录
    #[serde(default)]
    pub additional_dir: Option<String>,
}

impl CompressParams {
    /// 取出必填的源 URL，为空时返回 400
    fn origin_url(&self) -> ApiResult<String> {
        let origin_url = self.origin_img_url.trim();
        if origin_url.is_empty() {
            return Err(ApiError::bad_request(origin_url, "origin_img_url is required"));
        }
        Ok(origin_url.to_string())
    }
}

/// 压缩图片
///
/// # 端点
/// GET /api/compress?origin_img_url=...&quality=50&additional_dir=products
///
/// # 响应
/// ```json
/// {
///   "success": true,
///   "message": "image compressed",
///   "data": ["https://example.com/images/photo.jpg"]
/// }
/// ```
pub async fn compress_image(
    State(state): State<AppState>,
    Query(params): Query<CompressParams>,
) -> ApiResult<impl IntoResponse> {
    handle_compress(state, params).await
}

/// 压缩图片（表单提交）
///
/// # 端点
/// POST /api/compress
pub async fn compress_image_form(
    State(state): State<AppState>,
    Form(params): Form<CompressParams>,
) -> ApiResult<impl IntoResponse> {
    handle_compress(state, params).await
}

async fn handle_compress(
    state: AppState,
    params: CompressParams,
) -> ApiResult<ApiResponse<Vec<String>>> {
    let origin_url = params.origin_url()?;

    let quality = match params.quality.as_deref().filter(|q| !q.trim().is_empty()) {
        Some(raw) => {
            let quality = parse_quality(raw)
                .map_err(|e| ApiError::bad_request(origin_url.as_str(), e.to_string()))?;
            Some(quality)
        }
        None => None,
    };
    let additional_dir = params.additional_dir.unwrap_or_default();

    tracing::info!(
        "收到压缩请求: url={}, quality={:?}, additional_dir={:?}",
        origin_url,
        quality,
        additional_dir
    );

    let outcome = state
        .compressor
        .compress(&origin_url, quality, &additional_dir)
        .await
        .map_err(|e| ApiError::compression(origin_url.as_str(), e))?;

    let message = match outcome.status {
        OutcomeStatus::Compressed => "image compressed",
        OutcomeStatus::CacheHit => "image served from cache",
    };

    Ok(ApiResponse::success_with_message(vec![origin_url], message))
}

/// 查询压缩产物状态
///
/// # 端点
/// GET /api/compress/lookup?origin_img_url=...&additional_dir=products
///
/// # 响应
/// ```json
/// {
///   "success": true,
///   "message": "success",
///   "data": {
///     "path": "compressed_imgs/products/photo.jpg",
///     "relative_path": "products/photo.jpg",
///     "exists": true,
///     "fresh": true,
///     "modified_at": "2026-01-27T15:30:00Z",
///     "valid_until": "2026-01-27T21:30:00Z"
///   }
/// }
/// ```
pub async fn lookup_artifact(
    State(state): State<AppState>,
    Query(params): Query<CompressParams>,
) -> ApiResult<impl IntoResponse> {
    let origin_url = params.origin_url()?;
    let additional_dir = params.additional_dir.unwrap_or_default();

    let lookup = state
        .compressor
        .lookup(&origin_url, &additional_dir)
        .await
        .map_err(|e| ApiError::compression(origin_url.as_str(), e))?;

    Ok(success(lookup))
}
