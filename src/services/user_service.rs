use crate::cache::{CounterCache, keys};
use crate::config::{LedgerConfig, PurchaseConfig};
use crate::entities::{card_purchase_entity as purchases, card_type_entity as card_types, user_entity as users};
use crate::error::{AppError, AppResult};
use crate::models::{LedgerResponse, PurchaseCardsResponse};
use crate::services::LedgerService;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set, SqlErr,
};

/// 购买计数器保留到次日之后，跨零点的请求仍能看到前一天的计数
const PURCHASE_COUNTER_TTL: std::time::Duration = std::time::Duration::from_secs(2 * 24 * 60 * 60);

#[derive(Clone)]
pub struct UserService {
    pool: DatabaseConnection,
    ledger: LedgerService,
    initial_card_count: i64,
    daily_purchase_limit: u64,
}

impl UserService {
    pub fn new(
        pool: DatabaseConnection,
        ledger: LedgerService,
        ledger_config: &LedgerConfig,
        purchase_config: &PurchaseConfig,
    ) -> Self {
        Self {
            pool,
            ledger,
            initial_card_count: ledger_config.initial_card_count,
            daily_purchase_limit: purchase_config.daily_limit,
        }
    }

    /// 注册用户并回填账本缓存
    pub async fn register(&self, user_id: &str) -> AppResult<users::Model> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(AppError::ValidationError("user_id is required".into()));
        }

        let existing = users::Entity::find()
            .filter(users::Column::UserId.eq(user_id))
            .one(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(AppError::AlreadyExists("User already exists".to_string()));
        }

        let now = Utc::now();
        let user = users::ActiveModel {
            user_id: Set(user_id.to_string()),
            card_count: Set(self.initial_card_count),
            balance: Set(0.0),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&self.pool)
        .await
        .map_err(|e| match e.sql_err() {
            // 并发注册：另一请求已先写入
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                AppError::AlreadyExists("User already exists".to_string())
            }
            _ => AppError::from(e),
        })?;

        self.ledger.seed_user(&user).await?;
        log::info!("Registered user {user_id} with {} cards", user.card_count);
        Ok(user)
    }

    pub async fn ledger(&self, user_id: &str) -> AppResult<LedgerResponse> {
        self.ledger.get(user_id.trim()).await
    }

    /// 用余额购买卡包
    ///
    /// 逻辑:
    /// 1. 用户存在
    /// 2. 占用当天（UTC）该类型的一个购买名额，超过上限则归还并拒绝
    /// 3. 卡包类型存在
    /// 4. 原子扣余额（不足则 402），再加卡
    /// 5. 写购买记录
    ///
    /// 3、4 失败时归还第 2 步占用的名额
    pub async fn purchase_cards(
        &self,
        user_id: &str,
        card_type: &str,
        now: DateTime<Utc>,
    ) -> AppResult<PurchaseCardsResponse> {
        let user_id = user_id.trim();
        let card_type = card_type.trim();
        if user_id.is_empty() {
            return Err(AppError::ValidationError("user_id is required".into()));
        }
        if card_type.is_empty() {
            return Err(AppError::ValidationError("type is required".into()));
        }

        // 顺带确认用户存在
        self.ledger.balance(user_id).await?;

        let slot_key = self.claim_purchase_slot(user_id, card_type, now).await?;

        match self.complete_purchase(user_id, card_type, now).await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                self.release_purchase_slot(&slot_key).await;
                Err(e)
            }
        }
    }

    /// 计数器不存在时用数据库中当天的购买数初始化，然后原子 +1 占位
    async fn claim_purchase_slot(
        &self,
        user_id: &str,
        card_type: &str,
        now: DateTime<Utc>,
    ) -> AppResult<String> {
        let cache = self.ledger.cache();
        let key = keys::daily_purchases(user_id, card_type, &now.format("%Y-%m-%d").to_string());

        if cache.get(&key).await?.is_none() {
            let day_start = Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::default()));
            let purchased_today = purchases::Entity::find()
                .filter(purchases::Column::UserId.eq(user_id))
                .filter(purchases::Column::CardType.eq(card_type))
                .filter(purchases::Column::PurchasedAt.gte(day_start))
                .filter(purchases::Column::PurchasedAt.lt(day_start + Duration::days(1)))
                .count(&self.pool)
                .await?;
            cache
                .set_nx_ex(&key, purchased_today.to_string(), PURCHASE_COUNTER_TTL)
                .await?;
        }

        let taken = cache.incr_by(&key, 1).await?;
        if taken > self.daily_purchase_limit as i64 {
            self.release_purchase_slot(&key).await;
            return Err(AppError::PurchaseLimitReached);
        }
        Ok(key)
    }

    async fn release_purchase_slot(&self, key: &str) {
        if let Err(e) = self.ledger.cache().incr_by(key, -1).await {
            log::warn!("Failed to release purchase slot {key}: {e}");
        }
    }

    async fn complete_purchase(
        &self,
        user_id: &str,
        card_type: &str,
        now: DateTime<Utc>,
    ) -> AppResult<PurchaseCardsResponse> {
        let bundle = card_types::Entity::find()
            .filter(card_types::Column::CardType.eq(card_type))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Card type {card_type} not found")))?;

        let balance = self
            .ledger
            .try_spend_balance(user_id, bundle.price)
            .await?
            .ok_or(AppError::InsufficientBalance)?;
        let card_count = self.ledger.add_cards(user_id, bundle.card_count).await?;

        let record = purchases::ActiveModel {
            user_id: Set(user_id.to_string()),
            card_type: Set(bundle.card_type.clone()),
            price: Set(bundle.price),
            card_count: Set(bundle.card_count),
            purchased_at: Set(now),
            ..Default::default()
        };
        // 余额和卡片已在缓存中生效，名额也已由计数器占用，记录失败只记日志
        if let Err(e) = record.insert(&self.pool).await {
            log::error!("Failed to record card purchase for {user_id}: {e}");
        }

        Ok(PurchaseCardsResponse {
            message: "Purchase successful".to_string(),
            card_type: bundle.card_type,
            cards_added: bundle.card_count,
            card_count,
            balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use futures_util::future::join_all;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 8, 30, 0).unwrap()
    }

    fn service(ctx: &testing::TestContext, daily_limit: u64) -> UserService {
        let ledger = LedgerService::new(ctx.db.clone(), ctx.shared_cache());
        UserService::new(
            ctx.db.clone(),
            ledger,
            &LedgerConfig::default(),
            &PurchaseConfig { daily_limit },
        )
    }

    async fn insert_card_type(ctx: &testing::TestContext, name: &str, price: f64, count: i64) {
        card_types::ActiveModel {
            card_type: Set(name.to_string()),
            price: Set(price),
            card_count: Set(count),
            ..Default::default()
        }
        .insert(&ctx.db)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_register_seeds_ledger() {
        let ctx = testing::setup().await;
        let svc = service(&ctx, 3);

        let user = svc.register("alice").await.unwrap();
        assert_eq!(user.card_count, 10);
        assert_eq!(
            ctx.cache.get("alice_card_count").await.unwrap().as_deref(),
            Some("10")
        );
        assert!(ctx.cache.get("user:alice").await.unwrap().is_some());

        assert!(matches!(
            svc.register("alice").await,
            Err(AppError::AlreadyExists(_))
        ));
        assert!(matches!(
            svc.register(" ").await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_purchase_moves_balance_into_cards() {
        let ctx = testing::setup().await;
        testing::insert_user(&ctx.db, "alice", 1, 50.0).await;
        insert_card_type(&ctx, "small", 20.0, 5).await;
        let svc = service(&ctx, 3);

        let resp = svc.purchase_cards("alice", "small", now()).await.unwrap();
        assert_eq!(resp.cards_added, 5);
        assert_eq!(resp.card_count, 6);
        assert_eq!(resp.balance, 30.0);

        let recorded = purchases::Entity::find().all(&ctx.db).await.unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].user_id, "alice");
        assert_eq!(svc.ledger("alice").await.unwrap().card_count, 6);
    }

    #[tokio::test]
    async fn test_purchase_rejects_insufficient_balance() {
        let ctx = testing::setup().await;
        testing::insert_user(&ctx.db, "alice", 1, 5.0).await;
        insert_card_type(&ctx, "small", 20.0, 5).await;
        let svc = service(&ctx, 3);

        assert!(matches!(
            svc.purchase_cards("alice", "small", now()).await,
            Err(AppError::InsufficientBalance)
        ));
        let state = svc.ledger("alice").await.unwrap();
        assert_eq!(state.card_count, 1);
        assert_eq!(state.balance, 5.0);
        assert!(purchases::Entity::find().all(&ctx.db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purchase_daily_limit_per_type() {
        let ctx = testing::setup().await;
        testing::insert_user(&ctx.db, "alice", 0, 100.0).await;
        insert_card_type(&ctx, "small", 1.0, 1).await;
        insert_card_type(&ctx, "large", 1.0, 10).await;
        let svc = service(&ctx, 2);

        svc.purchase_cards("alice", "small", now()).await.unwrap();
        svc.purchase_cards("alice", "small", now()).await.unwrap();
        assert!(matches!(
            svc.purchase_cards("alice", "small", now()).await,
            Err(AppError::PurchaseLimitReached)
        ));
        // 其它类型和第二天不受影响
        svc.purchase_cards("alice", "large", now()).await.unwrap();
        svc.purchase_cards("alice", "small", now() + Duration::days(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_purchase_unknown_user_or_type() {
        let ctx = testing::setup().await;
        testing::insert_user(&ctx.db, "alice", 0, 100.0).await;
        let svc = service(&ctx, 3);

        assert!(matches!(
            svc.purchase_cards("ghost", "small", now()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            svc.purchase_cards("alice", "missing", now()).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(svc.ledger("alice").await.unwrap().balance, 100.0);
    }

    #[tokio::test]
    async fn test_concurrent_purchases_respect_daily_limit() {
        let ctx = testing::setup().await;
        testing::insert_user(&ctx.db, "alice", 0, 100.0).await;
        insert_card_type(&ctx, "small", 1.0, 1).await;
        let svc = service(&ctx, 3);

        let results = join_all((0..8).map(|_| {
            let svc = svc.clone();
            async move { svc.purchase_cards("alice", "small", now()).await }
        }))
        .await;

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 3);
        for e in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(matches!(e, AppError::PurchaseLimitReached), "{e:?}");
        }
        let state = svc.ledger("alice").await.unwrap();
        assert_eq!(state.card_count, 3);
        assert_eq!(state.balance, 97.0);
        assert_eq!(purchases::Entity::find().count(&ctx.db).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_failed_purchase_releases_slot() {
        let ctx = testing::setup().await;
        testing::insert_user(&ctx.db, "alice", 0, 1.0).await;
        insert_card_type(&ctx, "small", 1.0, 1).await;
        let svc = service(&ctx, 1);

        assert!(matches!(
            svc.purchase_cards("alice", "missing", now()).await,
            Err(AppError::NotFound(_))
        ));
        svc.purchase_cards("alice", "small", now()).await.unwrap();
        // 失败的那次已归还名额，上限 1 仍能成交一次
        assert!(matches!(
            svc.purchase_cards("alice", "small", now()).await,
            Err(AppError::PurchaseLimitReached)
        ));
        assert_eq!(
            ctx.cache
                .get("purchases:alice:small:2025-09-01")
                .await
                .unwrap()
                .as_deref(),
            Some("1")
        );
    }

    #[tokio::test]
    async fn test_purchase_counter_seeded_from_recorded_purchases() {
        let ctx = testing::setup().await;
        testing::insert_user(&ctx.db, "alice", 0, 100.0).await;
        insert_card_type(&ctx, "small", 1.0, 1).await;
        purchases::ActiveModel {
            user_id: Set("alice".to_string()),
            card_type: Set("small".to_string()),
            price: Set(1.0),
            card_count: Set(1),
            purchased_at: Set(now()),
            ..Default::default()
        }
        .insert(&ctx.db)
        .await
        .unwrap();
        let svc = service(&ctx, 2);

        svc.purchase_cards("alice", "small", now()).await.unwrap();
        assert!(matches!(
            svc.purchase_cards("alice", "small", now()).await,
            Err(AppError::PurchaseLimitReached)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_register_yields_conflict() {
        let ctx = testing::setup().await;
        let svc = service(&ctx, 3);

        let results = join_all((0..4).map(|_| {
            let svc = svc.clone();
            async move { svc.register("alice").await }
        }))
        .await;

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for e in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(matches!(e, AppError::AlreadyExists(_)), "{e:?}");
        }
        assert_eq!(users::Entity::find().count(&ctx.db).await.unwrap(), 1);
    }
}
