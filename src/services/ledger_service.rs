use crate::cache::{SharedCache, keys};
use crate::entities::user_entity as users;
use crate::error::{AppError, AppResult};
use crate::models::LedgerResponse;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::str::FromStr;

/// 对账结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// 缓存与数据库一致
    InSync,
    /// 数据库已按缓存值覆盖
    Healed,
    /// 缓存缺失，已从数据库回填
    Reseeded,
}

/// 卡片 / 余额账本
///
/// 缓存是请求路径上的权威值：读走 read-through，写只用缓存的原子增减。
/// 数据库行由对账任务 (`reconcile`) 按“缓存优先”回写；与其它写入者之间的竞争
/// 以缓存为准，不保证线性一致。
#[derive(Clone)]
pub struct LedgerService {
    pool: DatabaseConnection,
    cache: SharedCache,
}

impl LedgerService {
    pub fn new(pool: DatabaseConnection, cache: SharedCache) -> Self {
        Self { pool, cache }
    }

    pub async fn get(&self, user_id: &str) -> AppResult<LedgerResponse> {
        Ok(LedgerResponse {
            card_count: self.card_count(user_id).await?,
            balance: self.balance(user_id).await?,
        })
    }

    pub async fn card_count(&self, user_id: &str) -> AppResult<i64> {
        self.read_through(&keys::card_count(user_id), user_id, |u| {
            u.card_count.to_string()
        })
        .await
    }

    pub async fn balance(&self, user_id: &str) -> AppResult<f64> {
        self.read_through(&keys::balance(user_id), user_id, |u| u.balance.to_string())
            .await
    }

    /// 扣除一张卡（仅当余量 > 0），返回扣除后的数量；余量不足返回 None
    pub async fn try_spend_card(&self, user_id: &str) -> AppResult<Option<i64>> {
        self.card_count(user_id).await?;
        self.cache
            .decr_if_positive(&keys::card_count(user_id))
            .await
    }

    pub async fn add_cards(&self, user_id: &str, count: i64) -> AppResult<i64> {
        self.card_count(user_id).await?;
        self.cache
            .incr_by(&keys::card_count(user_id), count)
            .await
    }

    pub async fn add_balance(&self, user_id: &str, amount: f64) -> AppResult<f64> {
        self.balance(user_id).await?;
        self.cache
            .incr_by_float(&keys::balance(user_id), amount)
            .await
    }

    /// 扣除余额（仅当余额足够），返回扣除后的余额；不足返回 None
    pub async fn try_spend_balance(&self, user_id: &str, amount: f64) -> AppResult<Option<f64>> {
        self.balance(user_id).await?;
        self.cache
            .decr_float_if_at_least(&keys::balance(user_id), amount)
            .await
    }

    /// 用数据库行回填缓存（只写缺失的键，不覆盖请求路径上的新值）
    pub async fn seed_user(&self, user: &users::Model) -> AppResult<()> {
        self.cache
            .set_nx(&keys::card_count(&user.user_id), user.card_count.to_string())
            .await?;
        self.cache
            .set_nx(&keys::balance(&user.user_id), user.balance.to_string())
            .await?;
        self.write_snapshot(user).await;
        Ok(())
    }

    /// 单用户对账：缓存缺失则回填，缓存与数据库不一致则以缓存覆盖数据库
    pub async fn reconcile(&self, user: &users::Model) -> AppResult<ReconcileOutcome> {
        let card_key = keys::card_count(&user.user_id);
        let balance_key = keys::balance(&user.user_id);

        let cached_cards = self.cache.get(&card_key).await?;
        let cached_balance = self.cache.get(&balance_key).await?;

        let (Some(cards_raw), Some(balance_raw)) = (cached_cards, cached_balance) else {
            self.seed_user(user).await?;
            return Ok(ReconcileOutcome::Reseeded);
        };

        let card_count: i64 = parse_counter(&card_key, &cards_raw)?;
        let balance: f64 = parse_counter(&balance_key, &balance_raw)?;

        if card_count == user.card_count && balance == user.balance {
            return Ok(ReconcileOutcome::InSync);
        }

        let now = Utc::now();
        users::Entity::update_many()
            .col_expr(users::Column::CardCount, Expr::value(card_count))
            .col_expr(users::Column::Balance, Expr::value(balance))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::UserId.eq(user.user_id.as_str()))
            .exec(&self.pool)
            .await?;

        log::debug!(
            "Ledger healed for {}: cards {} -> {}, balance {} -> {}",
            user.user_id,
            user.card_count,
            card_count,
            user.balance,
            balance
        );

        let healed = users::Model {
            card_count,
            balance,
            updated_at: Some(now),
            ..user.clone()
        };
        self.write_snapshot(&healed).await;
        Ok(ReconcileOutcome::Healed)
    }

    async fn read_through<T, F>(&self, key: &str, user_id: &str, from_row: F) -> AppResult<T>
    where
        T: FromStr,
        F: FnOnce(&users::Model) -> String,
    {
        if let Some(raw) = self.cache.get(key).await? {
            return parse_counter(key, &raw);
        }

        let user = self.find_user(user_id).await?;
        let seeded = from_row(&user);
        if self.cache.set_nx(key, seeded.clone()).await? {
            return parse_counter(key, &seeded);
        }
        // 并发请求已先一步回填
        match self.cache.get(key).await? {
            Some(raw) => parse_counter(key, &raw),
            None => parse_counter(key, &seeded),
        }
    }

    async fn find_user(&self, user_id: &str) -> AppResult<users::Model> {
        users::Entity::find()
            .filter(users::Column::UserId.eq(user_id))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    // 快照仅供其它读方参考，写失败不影响账本
    async fn write_snapshot(&self, user: &users::Model) {
        if let Err(e) = self.store_snapshot(user).await {
            log::warn!("Failed to cache user snapshot {}: {e}", user.user_id);
        }
    }

    async fn store_snapshot(&self, user: &users::Model) -> AppResult<()> {
        let json = serde_json::to_string(user)?;
        self.cache.set(&keys::user_snapshot(&user.user_id), json).await
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }
}

fn parse_counter<T: FromStr>(key: &str, raw: &str) -> AppResult<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| AppError::InternalError(format!("cached value at {key} is not a number")))
}
