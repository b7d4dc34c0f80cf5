use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 延迟发放任务
/// 状态: is_granted=false (pending) -> true (granted, 终态)
/// 记录永不删除，作为“一次触发只发一次”的审计
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "deferred_grant_tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub grant_at: DateTime<Utc>,
    pub is_granted: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
