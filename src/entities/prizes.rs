use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 奖品配置实体
/// 概念说明:
/// - prize_type: 原样存储的字符串，加载目录时校验（见 `PrizeType`）
/// - probability_weight: 相对权重，>= 0
/// - quota: 0 = 不限量
/// - distributed_count: 已发放数量，抽奖时原子自增
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "prizes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub prize_type: String,
    pub value: f64,
    pub probability_weight: f64,
    pub play_mode: String,
    pub is_time_based: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub quota: i64,
    pub distributed_count: i64,
    pub image_ref: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
