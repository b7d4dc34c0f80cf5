use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 抽奖请求
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct DrawRequest {
    #[serde(alias = "userid")]
    pub user_id: String,
    /// 玩法
    #[serde(alias = "playmode")]
    pub play_mode: String,
}

/// 抽奖结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct DrawOutcome {
    pub message: String,
    /// 奖品名称
    pub name: String,
    /// 奖品面值（积分数 / 卡片数 / 实物为配置值）
    pub prize_value: f64,
    /// 积分奖品时返回更新后的余额
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
    /// 抽奖后的卡片数
    pub card_count: i64,
    pub image_ref: String,
}
