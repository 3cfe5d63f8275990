use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// 统一的API响应包装器
///
/// 格式：`{ "success": bool, "message": string, "data": ... }`，
/// message 为空时使用默认值 "success" / "error"
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// 创建响应，空消息替换为默认消息
    pub fn new(success: bool, data: T, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            default_message(success).to_string()
        } else {
            message
        };

        Self {
            success,
            message,
            data,
        }
    }

    /// 创建成功响应
    pub fn success(data: T) -> Self {
        Self::new(true, data, "")
    }

    /// 创建成功响应（带消息）
    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self::new(true, data, message)
    }
}

fn default_message(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// 辅助函数：创建成功响应
pub fn success<T: Serialize>(data: T) -> impl IntoResponse {
    ApiResponse::success(data)
}
