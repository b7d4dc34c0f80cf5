use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::user_entity as users;

/// 用户账本（经缓存读取）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct LedgerResponse {
    pub card_count: i64,
    pub balance: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateUserRequest {
    #[serde(alias = "userid")]
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub user_id: String,
    pub card_count: i64,
    pub balance: f64,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<users::Model> for UserResponse {
    fn from(m: users::Model) -> Self {
        UserResponse {
            user_id: m.user_id,
            card_count: m.card_count,
            balance: m.balance,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct PurchaseCardsRequest {
    #[serde(alias = "userid")]
    pub user_id: String,
    /// 卡包类型
    #[serde(rename = "type")]
    pub card_type: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
pub struct PurchaseCardsResponse {
    pub message: String,
    pub card_type: String,
    /// 本次获得的卡片数
    pub cards_added: i64,
    pub card_count: i64,
    pub balance: f64,
}
