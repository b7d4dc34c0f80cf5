use crate::entities::prize_entity as prizes;
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::str::FromStr;
use utoipa::ToSchema;

/// 奖品类型（加载目录时校验，抽奖时不会再遇到未知类型）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PrizeType {
    Points,
    Card,
    Material,
    Thanks,
}

impl FromStr for PrizeType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "points" => Ok(PrizeType::Points),
            "card" => Ok(PrizeType::Card),
            "material" => Ok(PrizeType::Material),
            // 旧数据写法
            "thanks" | "thank you" => Ok(PrizeType::Thanks),
            other => Err(AppError::ConfigurationError(format!(
                "unknown prize type: {other}"
            ))),
        }
    }
}

impl PrizeType {
    pub fn outcome_message(&self) -> &'static str {
        match self {
            PrizeType::Points => "Congratulations! You have won the prize!",
            PrizeType::Card => "Congratulations! You have won a lottery card!",
            PrizeType::Material => "Congratulations! You have won a material prize!",
            PrizeType::Thanks => "Thank you for participating!",
        }
    }
}

/// 已校验的奖品定义
#[derive(Debug, Clone, PartialEq)]
pub struct Prize {
    pub id: i64,
    pub name: String,
    pub prize_type: PrizeType,
    pub value: f64,
    pub weight: f64,
    pub play_mode: String,
    pub is_time_based: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub quota: i64,
    pub distributed_count: i64,
    pub image_ref: String,
}

impl TryFrom<prizes::Model> for Prize {
    type Error = AppError;

    fn try_from(m: prizes::Model) -> Result<Self, Self::Error> {
        let prize_type = m.prize_type.parse::<PrizeType>()?;
        if !m.probability_weight.is_finite() || m.probability_weight < 0.0 {
            return Err(AppError::ConfigurationError(format!(
                "invalid probability weight {}",
                m.probability_weight
            )));
        }
        if m.quota < 0 {
            return Err(AppError::ConfigurationError(format!(
                "invalid quota {}",
                m.quota
            )));
        }
        Ok(Prize {
            id: m.id,
            name: m.name,
            prize_type,
            value: m.value,
            weight: m.probability_weight,
            play_mode: m.play_mode,
            is_time_based: m.is_time_based,
            start_time: m.start_time,
            end_time: m.end_time,
            quota: m.quota,
            distributed_count: m.distributed_count,
            image_ref: m.image_ref,
        })
    }
}

impl Prize {
    /// 是否限量
    pub fn has_quota(&self) -> bool {
        self.quota > 0
    }

    /// 时间窗口为 [start_time, end_time)；缺少任一端的限时奖品不可抽
    pub fn in_window(&self, now: DateTime<Utc>) -> bool {
        if !self.is_time_based {
            return true;
        }
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => start <= now && now < end,
            _ => false,
        }
    }

    pub fn is_eligible(&self, play_mode: &str, now: DateTime<Utc>) -> bool {
        self.play_mode == play_mode
            && self.in_window(now)
            && (!self.has_quota() || self.distributed_count < self.quota)
    }
}

/// 单次抽奖使用的不可变奖品快照
#[derive(Debug, Clone, Default)]
pub struct PrizeCatalog {
    prizes: Vec<Prize>,
}

impl PrizeCatalog {
    /// 校验并构建快照；非法配置的奖品被剔除并记录错误日志
    pub fn from_models(models: Vec<prizes::Model>) -> Self {
        let prizes = models
            .into_iter()
            .filter_map(|m| {
                let id = m.id;
                match Prize::try_from(m) {
                    Ok(p) => Some(p),
                    Err(e) => {
                        log::error!("Prize {id} excluded from catalog: {e}");
                        None
                    }
                }
            })
            .collect();
        Self { prizes }
    }

    pub fn prizes(&self) -> &[Prize] {
        &self.prizes
    }

    /// 按目录顺序返回当前可抽的奖品
    pub fn eligible_prizes(&self, play_mode: &str, now: DateTime<Utc>) -> Vec<Prize> {
        self.prizes
            .iter()
            .filter(|p| p.is_eligible(play_mode, now))
            .cloned()
            .collect()
    }
}

#[derive(Clone)]
pub struct PrizeCatalogService {
    pool: DatabaseConnection,
}

impl PrizeCatalogService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 从数据库加载某玩法的奖品快照（按 id 升序，决定加权选择时的先后顺序）
    pub async fn snapshot(&self, play_mode: &str) -> AppResult<PrizeCatalog> {
        let models = prizes::Entity::find()
            .filter(prizes::Column::PlayMode.eq(play_mode))
            .order_by_asc(prizes::Column::Id)
            .all(&self.pool)
            .await?;
        Ok(PrizeCatalog::from_models(models))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, hour, 0, 0).unwrap()
    }

    fn model(id: i64, prize_type: &str) -> prizes::Model {
        testing::prize_model(id, "1", prize_type, 1.0)
    }

    #[test]
    fn test_parse_prize_types() {
        assert_eq!("points".parse::<PrizeType>().unwrap(), PrizeType::Points);
        assert_eq!("Card".parse::<PrizeType>().unwrap(), PrizeType::Card);
        assert_eq!("thank you".parse::<PrizeType>().unwrap(), PrizeType::Thanks);
        assert!(matches!(
            "coupon".parse::<PrizeType>(),
            Err(AppError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_catalog_drops_invalid_rows() {
        let mut negative = model(3, "points");
        negative.probability_weight = -1.0;
        let catalog =
            PrizeCatalog::from_models(vec![model(1, "points"), model(2, "coupon"), negative]);
        let ids: Vec<i64> = catalog.prizes().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_time_window_is_half_open() {
        let mut m = model(1, "points");
        m.is_time_based = true;
        m.start_time = Some(at(10));
        m.end_time = Some(at(12));
        let catalog = PrizeCatalog::from_models(vec![m]);

        assert!(catalog.eligible_prizes("1", at(10)).len() == 1);
        assert!(catalog.eligible_prizes("1", at(11)).len() == 1);
        assert!(catalog.eligible_prizes("1", at(12)).is_empty());
        assert!(catalog
            .eligible_prizes("1", at(10) - Duration::seconds(1))
            .is_empty());
    }

    #[test]
    fn test_time_based_without_bounds_is_ineligible() {
        let mut m = model(1, "points");
        m.is_time_based = true;
        m.start_time = Some(at(10));
        let catalog = PrizeCatalog::from_models(vec![m]);
        assert!(catalog.eligible_prizes("1", at(11)).is_empty());
    }

    #[test]
    fn test_quota_and_play_mode_filters() {
        let mut exhausted = model(1, "material");
        exhausted.quota = 2;
        exhausted.distributed_count = 2;
        let mut remaining = model(2, "material");
        remaining.quota = 2;
        remaining.distributed_count = 1;
        let unlimited = model(3, "points");
        let mut other_mode = model(4, "points");
        other_mode.play_mode = "2".into();

        let catalog =
            PrizeCatalog::from_models(vec![exhausted, remaining, unlimited, other_mode]);
        let ids: Vec<i64> = catalog
            .eligible_prizes("1", at(9))
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_snapshot_loads_only_requested_mode_in_id_order() {
        let ctx = testing::setup().await;
        testing::insert_prize(&ctx.db, testing::prize_model(0, "2", "points", 1.0)).await;
        let b = testing::insert_prize(&ctx.db, testing::prize_model(0, "1", "card", 1.0)).await;
        let c = testing::insert_prize(&ctx.db, testing::prize_model(0, "1", "thanks", 1.0)).await;

        let catalog = PrizeCatalogService::new(ctx.db.clone())
            .snapshot("1")
            .await
            .unwrap();
        let ids: Vec<i64> = catalog.prizes().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![b.id, c.id]);
    }
}
