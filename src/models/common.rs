use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 统一成功响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    pub data: T,
}

/// 统一错误响应（见 `AppError::error_response`）
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// HTTP 状态码
    pub code: u16,
    /// 状态说明
    pub message: String,
    /// 错误详情
    pub error: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 200,
            message: "success".to_string(),
            data,
        }
    }
}
