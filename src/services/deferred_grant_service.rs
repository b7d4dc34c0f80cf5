use crate::cache::{CounterCache, keys};
use crate::config::GrantConfig;
use crate::entities::{
    daily_bonus_claim_entity as bonus_claims, deferred_grant_task_entity as tasks,
    user_entity as users,
};
use crate::error::{AppError, AppResult};
use crate::models::GrantTriggerResponse;
use crate::services::LedgerService;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};

/// 触发锁的过期时间，持锁进程崩溃后自动释放
const TRIGGER_LOCK_TTL: std::time::Duration = std::time::Duration::from_secs(10);

/// 一轮扫描的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub granted: u64,
    /// 已被其它扫描抢先发放
    pub skipped: u64,
    pub failed: u64,
}

/// 延迟免费卡发放
#[derive(Clone)]
pub struct DeferredGrantService {
    pool: DatabaseConnection,
    ledger: LedgerService,
    config: GrantConfig,
}

impl DeferredGrantService {
    pub fn new(pool: DatabaseConnection, ledger: LedgerService, config: GrantConfig) -> Self {
        Self {
            pool,
            ledger,
            config,
        }
    }

    /// 创建一条延迟发放任务
    ///
    /// 规则:
    /// - 用户必须存在
    /// - 每用户每个 UTC 日最多 daily_cap 条
    /// - 上一条任务的 grant_at 未到时拒绝（时间窗口不重叠）
    /// - 当天第一条任务立即赠送 daily_login_bonus 张卡
    ///
    /// 同一用户的检查与写入在缓存锁内串行执行；拿不到锁视为已有任务在创建中
    pub async fn trigger(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<GrantTriggerResponse> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(AppError::ValidationError("user_id is required".into()));
        }

        users::Entity::find()
            .filter(users::Column::UserId.eq(user_id))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let lock_key = keys::grant_lock(user_id);
        let cache = self.ledger.cache();
        if !cache.set_nx_ex(&lock_key, "1".to_string(), TRIGGER_LOCK_TTL).await? {
            log::info!("Grant trigger for {user_id} already in progress");
            return Err(AppError::GrantPending);
        }

        let result = self.create_task(user_id, now).await;

        if let Err(e) = cache.delete(&lock_key).await {
            log::warn!("Failed to release grant lock for {user_id}: {e}");
        }
        result
    }

    async fn create_task(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<GrantTriggerResponse> {
        let day_start = Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::default()));
        let today_count = tasks::Entity::find()
            .filter(tasks::Column::UserId.eq(user_id))
            .filter(tasks::Column::CreatedAt.gte(day_start))
            .filter(tasks::Column::CreatedAt.lt(day_start + Duration::days(1)))
            .count(&self.pool)
            .await?;
        if today_count >= self.config.daily_cap {
            return Err(AppError::DailyGrantLimit);
        }

        let latest = tasks::Entity::find()
            .filter(tasks::Column::UserId.eq(user_id))
            .order_by_desc(tasks::Column::GrantAt)
            .one(&self.pool)
            .await?;
        if let Some(latest) = latest {
            if now < latest.grant_at {
                return Err(AppError::GrantPending);
            }
        }

        let grant_at = now + self.config.delay();
        tasks::ActiveModel {
            user_id: Set(user_id.to_string()),
            created_at: Set(now),
            grant_at: Set(grant_at),
            is_granted: Set(false),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        let bonus_cards = self.claim_daily_bonus(user_id, now).await?;

        Ok(GrantTriggerResponse {
            message: "Free card task successfully created".to_string(),
            grant_at,
            bonus_cards,
        })
    }

    /// 每日登录奖励：先按 (user_id, 日期) 唯一键写领取记录，写入成功的一方才发卡。
    /// 发卡失败时删除记录，返回 0，任务本身仍然创建成功
    async fn claim_daily_bonus(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<i64> {
        let cards = self.config.daily_login_bonus;
        if cards <= 0 {
            return Ok(0);
        }

        let claim = bonus_claims::ActiveModel {
            user_id: Set(user_id.to_string()),
            claim_date: Set(now.format("%Y-%m-%d").to_string()),
            cards: Set(cards),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&self.pool)
        .await;
        let claim = match claim {
            Ok(claim) => claim,
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = self.ledger.add_cards(user_id, cards).await {
            log::error!("Failed to grant daily login bonus to {user_id}: {e}");
            bonus_claims::Entity::delete_by_id(claim.id)
                .exec(&self.pool)
                .await?;
            return Ok(0);
        }

        log::info!("Daily login bonus of {cards} cards granted to {user_id}");
        Ok(cards)
    }

    /// 扫描到期任务并发放；重复扫描不会重复发放
    pub async fn sweep_due(&self, now: DateTime<Utc>) -> AppResult<SweepSummary> {
        let cutoff = now - self.config.grace_period();
        let due = tasks::Entity::find()
            .filter(tasks::Column::IsGranted.eq(false))
            .filter(tasks::Column::GrantAt.lte(cutoff))
            .order_by_asc(tasks::Column::GrantAt)
            .all(&self.pool)
            .await?;

        let mut summary = SweepSummary::default();
        for task in &due {
            match self.grant_task(task).await {
                Ok(true) => summary.granted += 1,
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    log::error!("Failed to grant deferred task {}: {e}", task.id);
                }
            }
        }

        if !due.is_empty() {
            log::info!(
                "Deferred grant sweep: granted={} skipped={} failed={}",
                summary.granted,
                summary.skipped,
                summary.failed
            );
        }
        Ok(summary)
    }

    /// 条件翻转 is_granted，只有翻转成功的一方发卡；发卡失败则恢复待发放
    async fn grant_task(&self, task: &tasks::Model) -> AppResult<bool> {
        let claimed = tasks::Entity::update_many()
            .col_expr(tasks::Column::IsGranted, Expr::value(true))
            .filter(tasks::Column::Id.eq(task.id))
            .filter(tasks::Column::IsGranted.eq(false))
            .exec(&self.pool)
            .await?;
        if claimed.rows_affected == 0 {
            return Ok(false);
        }

        if let Err(e) = self
            .ledger
            .add_cards(&task.user_id, self.config.cards_per_grant)
            .await
        {
            tasks::Entity::update_many()
                .col_expr(tasks::Column::IsGranted, Expr::value(false))
                .filter(tasks::Column::Id.eq(task.id))
                .exec(&self.pool)
                .await?;
            return Err(e);
        }

        log::debug!(
            "Granted {} free cards to {} (task {})",
            self.config.cards_per_grant,
            task.user_id,
            task.id
        );
        Ok(true)
    }
}
