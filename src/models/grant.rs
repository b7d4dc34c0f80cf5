use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GrantTriggerQuery {
    #[serde(default)]
    pub user_id: String,
}

/// 触发仅返回确认，实际发放由后台任务异步完成
#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
pub struct GrantTriggerResponse {
    pub message: String,
    /// 预计发放时间
    pub grant_at: DateTime<Utc>,
    /// 当天首次触发立即发放的卡片数
    pub bonus_cards: i64,
}
