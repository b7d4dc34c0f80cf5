use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ShareTaskRequest {
    #[serde(alias = "userid")]
    pub user_id: String,
    /// discord / x / telegram / telegramGroup
    #[serde(rename = "type")]
    pub task_type: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
pub struct ShareTaskResponse {
    pub message: String,
    pub achievement: String,
    /// 本次发放的余额
    pub amount: f64,
    pub balance: f64,
}
