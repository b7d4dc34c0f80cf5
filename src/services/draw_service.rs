use crate::entities::{physical_prize_award_entity as awards, prize_entity as prizes};
use crate::error::{AppError, AppResult};
use crate::models::DrawOutcome;
use crate::services::{LedgerService, Prize, PrizeCatalogService, PrizeType};
use chrono::Utc;
use rand::Rng;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

/// 按权重选择奖品，返回下标
///
/// 在 [0, T) 中均匀取 r，返回第一个累计权重严格大于 r 的奖品（按列表顺序）。
/// T == 0 视为配置错误。
pub fn pick_weighted<R: Rng + ?Sized>(prizes: &[Prize], rng: &mut R) -> AppResult<usize> {
    let total = total_weight(prizes);
    if !(total > 0.0) {
        return Err(AppError::ConfigurationError(
            "total probability weight is zero".into(),
        ));
    }

    let r = rng.gen_range(0.0..total);
    let mut acc = 0.0;
    for (i, p) in prizes.iter().enumerate() {
        acc += p.weight;
        if acc > r {
            return Ok(i);
        }
    }

    // 浮点累加误差：退回最后一个正权重奖品
    prizes
        .iter()
        .rposition(|p| p.weight > 0.0)
        .ok_or_else(|| AppError::ConfigurationError("total probability weight is zero".into()))
}

pub fn total_weight(prizes: &[Prize]) -> f64 {
    prizes.iter().map(|p| p.weight).sum()
}

#[derive(Clone)]
pub struct DrawService {
    pool: DatabaseConnection,
    ledger: LedgerService,
    catalog: PrizeCatalogService,
}

impl DrawService {
    pub fn new(pool: DatabaseConnection, ledger: LedgerService) -> Self {
        let catalog = PrizeCatalogService::new(pool.clone());
        Self {
            pool,
            ledger,
            catalog,
        }
    }

    /// 抽奖
    ///
    /// 逻辑:
    /// 1. 校验参数、用户剩余卡片
    /// 2. 加载奖品快照并过滤（时间窗口 / 限量）；无可抽奖品时不扣卡
    /// 3. 原子扣除一张卡（准入）
    /// 4. 按权重选择；限量奖品条件占用名额，占用失败则在剩余奖品中重抽
    /// 5. 按奖品类型发放
    pub async fn draw(&self, user_id: &str, play_mode: &str) -> AppResult<DrawOutcome> {
        let user_id = user_id.trim();
        let play_mode = play_mode.trim();
        if user_id.is_empty() {
            return Err(AppError::ValidationError("user_id is required".into()));
        }
        if play_mode.is_empty() {
            return Err(AppError::ValidationError("play_mode is required".into()));
        }

        let card_count = self.ledger.card_count(user_id).await?;
        if card_count <= 0 {
            return Err(AppError::InsufficientCards);
        }

        let catalog = self.catalog.snapshot(play_mode).await?;
        let eligible = catalog.eligible_prizes(play_mode, Utc::now());
        if eligible.is_empty() {
            return Err(AppError::NoEligiblePrizes);
        }
        if !(total_weight(&eligible) > 0.0) {
            return Err(AppError::ConfigurationError(format!(
                "play mode {play_mode} has zero total probability weight"
            )));
        }

        if self.ledger.try_spend_card(user_id).await?.is_none() {
            return Err(AppError::InsufficientCards);
        }

        let prize = match self.select_and_reserve(eligible).await {
            Ok(prize) => prize,
            Err(AppError::NoPrizesAvailable) => {
                // 没有任何奖品成交，退还本次扣除的卡
                self.ledger.add_cards(user_id, 1).await?;
                return Err(AppError::NoPrizesAvailable);
            }
            Err(e) => return Err(e),
        };

        log::info!(
            "User {user_id} drew prize {} ({:?}) in mode {play_mode}",
            prize.id,
            prize.prize_type
        );

        self.pay_out(user_id, &prize).await
    }

    /// 选择并占用名额（针对限量奖品），名额竞争失败时剔除该奖品重抽。
    /// 候选集每轮严格缩小，因此必然终止。
    async fn select_and_reserve(&self, mut candidates: Vec<Prize>) -> AppResult<Prize> {
        loop {
            let index = {
                let mut rng = rand::thread_rng();
                pick_weighted(&candidates, &mut rng)?
            };

            if !candidates[index].has_quota() || self.reserve_quota(&candidates[index]).await? {
                return Ok(candidates.swap_remove(index));
            }

            let rejected = candidates.remove(index);
            log::info!(
                "Prize {} quota exhausted during draw, redrawing among {} prizes",
                rejected.id,
                candidates.len()
            );
            if candidates.is_empty() {
                return Err(AppError::NoPrizesAvailable);
            }
        }
    }

    /// 条件自增：仅当 distributed_count < quota 时 +1，单条语句完成判断与占用。
    /// 未更新到行即名额已满，返回 false
    async fn reserve_quota(&self, prize: &Prize) -> AppResult<bool> {
        let result = prizes::Entity::update_many()
            .col_expr(
                prizes::Column::DistributedCount,
                Expr::col(prizes::Column::DistributedCount).add(1),
            )
            .filter(prizes::Column::Id.eq(prize.id))
            .filter(Expr::col(prizes::Column::DistributedCount).lt(Expr::col(prizes::Column::Quota)))
            .exec(&self.pool)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// 根据奖品类型发放:
    /// - points   -> 余额增加 value
    /// - card     -> 卡片 +1
    /// - material -> 写实物中奖记录（名额已在选择阶段占用）
    /// - thanks   -> 无发放
    ///
    /// 名额占用成功后的发放失败不会自动回滚
    async fn pay_out(&self, user_id: &str, prize: &Prize) -> AppResult<DrawOutcome> {
        let mut balance = None;
        let card_count = match prize.prize_type {
            PrizeType::Points => {
                balance = Some(self.ledger.add_balance(user_id, prize.value).await?);
                self.ledger.card_count(user_id).await?
            }
            PrizeType::Card => self.ledger.add_cards(user_id, 1).await?,
            PrizeType::Material => {
                awards::ActiveModel {
                    user_id: Set(user_id.to_string()),
                    prize_id: Set(prize.id),
                    prize_name: Set(prize.name.clone()),
                    won_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(&self.pool)
                .await?;
                self.ledger.card_count(user_id).await?
            }
            PrizeType::Thanks => self.ledger.card_count(user_id).await?,
        };

        Ok(DrawOutcome {
            message: prize.prize_type.outcome_message().to_string(),
            name: prize.name.clone(),
            prize_value: prize.value,
            balance,
            card_count,
            image_ref: prize.image_ref.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CounterCache;
    use crate::services::PrizeCatalog;
    use crate::testing;
    use chrono::Duration;
    use futures_util::future::join_all;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use sea_orm::PaginatorTrait;

    fn prizes_with_weights(weights: &[f64]) -> Vec<Prize> {
        let models = weights
            .iter()
            .enumerate()
            .map(|(i, w)| testing::prize_model(i as i64 + 1, "1", "points", *w))
            .collect();
        PrizeCatalog::from_models(models).prizes().to_vec()
    }

    async fn draw_service(ctx: &testing::TestContext) -> DrawService {
        let ledger = LedgerService::new(ctx.db.clone(), ctx.shared_cache());
        DrawService::new(ctx.db.clone(), ledger)
    }

    async fn prize_row(ctx: &testing::TestContext, id: i64) -> prizes::Model {
        prizes::Entity::find_by_id(id)
            .one(&ctx.db)
            .await
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_weighted_frequencies_converge() {
        let prizes = prizes_with_weights(&[1.0, 3.0, 6.0]);
        let mut rng = StdRng::seed_from_u64(7);
        let mut hits = [0usize; 3];
        let n = 100_000;
        for _ in 0..n {
            hits[pick_weighted(&prizes, &mut rng).unwrap()] += 1;
        }
        for (i, expected) in [0.1, 0.3, 0.6].iter().enumerate() {
            let freq = hits[i] as f64 / n as f64;
            assert!(
                (freq - expected).abs() < 0.01,
                "prize {i}: {freq} vs {expected}"
            );
        }
    }

    #[test]
    fn test_zero_weight_prizes_never_selected() {
        let prizes = prizes_with_weights(&[0.0, 2.0, 0.0]);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1_000 {
            assert_eq!(pick_weighted(&prizes, &mut rng).unwrap(), 1);
        }
    }

    #[test]
    fn test_zero_total_weight_is_configuration_error() {
        let prizes = prizes_with_weights(&[0.0, 0.0]);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            pick_weighted(&prizes, &mut rng),
            Err(AppError::ConfigurationError(_))
        ));
        assert!(matches!(
            pick_weighted(&[], &mut rng),
            Err(AppError::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn test_single_card_draw_spends_exactly_one() {
        let ctx = testing::setup().await;
        testing::insert_user(&ctx.db, "alice", 1, 0.0).await;
        testing::insert_prize(&ctx.db, testing::prize_model(0, "1", "points", 0.5)).await;
        testing::insert_prize(&ctx.db, testing::prize_model(0, "1", "thanks", 0.5)).await;
        let svc = draw_service(&ctx).await;

        let outcome = svc.draw("alice", "1").await.unwrap();
        assert_eq!(outcome.card_count, 0);
        match outcome.balance {
            Some(balance) => assert_eq!(balance, 100.0),
            None => assert_eq!(outcome.message, "Thank you for participating!"),
        }

        assert!(matches!(
            svc.draw("alice", "1").await,
            Err(AppError::InsufficientCards)
        ));
    }

    #[tokio::test]
    async fn test_card_prize_refunds_the_spend() {
        let ctx = testing::setup().await;
        testing::insert_user(&ctx.db, "alice", 1, 0.0).await;
        testing::insert_prize(&ctx.db, testing::prize_model(0, "1", "card", 1.0)).await;
        let svc = draw_service(&ctx).await;

        let outcome = svc.draw("alice", "1").await.unwrap();
        assert_eq!(outcome.card_count, 1);
        assert!(outcome.balance.is_none());
    }

    #[tokio::test]
    async fn test_material_award_bound_to_drawing_user() {
        let ctx = testing::setup().await;
        testing::insert_user(&ctx.db, "alice", 2, 0.0).await;
        let mut m = testing::prize_model(0, "1", "material", 1.0);
        m.quota = 5;
        let prize = testing::insert_prize(&ctx.db, m).await;
        let svc = draw_service(&ctx).await;

        let outcome = svc.draw("alice", "1").await.unwrap();
        assert_eq!(outcome.card_count, 1);

        let records = awards::Entity::find().all(&ctx.db).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_id, "alice");
        assert_eq!(records[0].prize_id, prize.id);
        // 名额只在占用时计一次
        assert_eq!(prize_row(&ctx, prize.id).await.distributed_count, 1);
    }

    #[tokio::test]
    async fn test_zero_cards_fails_without_mutation() {
        let ctx = testing::setup().await;
        testing::insert_user(&ctx.db, "alice", 0, 5.0).await;
        let prize =
            testing::insert_prize(&ctx.db, testing::prize_model(0, "1", "points", 1.0)).await;
        let svc = draw_service(&ctx).await;

        assert!(matches!(
            svc.draw("alice", "1").await,
            Err(AppError::InsufficientCards)
        ));
        assert_eq!(
            ctx.cache.get("alice_card_count").await.unwrap().as_deref(),
            Some("0")
        );
        assert_eq!(
            ctx.cache.get("alice_balance").await.unwrap(),
            None
        );
        assert_eq!(prize_row(&ctx, prize.id).await.distributed_count, 0);
    }

    #[tokio::test]
    async fn test_unknown_user_and_bad_input() {
        let ctx = testing::setup().await;
        let svc = draw_service(&ctx).await;

        assert!(matches!(
            svc.draw("ghost", "1").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            svc.draw("  ", "1").await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            svc.draw("alice", "").await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_outside_every_window_fails_without_spend() {
        let ctx = testing::setup().await;
        testing::insert_user(&ctx.db, "alice", 3, 0.0).await;
        let now = Utc::now();
        let mut expired = testing::prize_model(0, "1", "points", 1.0);
        expired.is_time_based = true;
        expired.start_time = Some(now - Duration::days(2));
        expired.end_time = Some(now - Duration::days(1));
        let mut upcoming = testing::prize_model(0, "1", "card", 1.0);
        upcoming.is_time_based = true;
        upcoming.start_time = Some(now + Duration::days(1));
        upcoming.end_time = Some(now + Duration::days(2));
        testing::insert_prize(&ctx.db, expired).await;
        testing::insert_prize(&ctx.db, upcoming).await;
        let svc = draw_service(&ctx).await;

        assert!(matches!(
            svc.draw("alice", "1").await,
            Err(AppError::NoEligiblePrizes)
        ));
        assert_eq!(
            ctx.cache.get("alice_card_count").await.unwrap().as_deref(),
            Some("3")
        );
    }

    #[tokio::test]
    async fn test_zero_weight_catalog_fails_before_spend() {
        let ctx = testing::setup().await;
        testing::insert_user(&ctx.db, "alice", 3, 0.0).await;
        testing::insert_prize(&ctx.db, testing::prize_model(0, "1", "points", 0.0)).await;
        let svc = draw_service(&ctx).await;

        assert!(matches!(
            svc.draw("alice", "1").await,
            Err(AppError::ConfigurationError(_))
        ));
        assert_eq!(
            ctx.cache.get("alice_card_count").await.unwrap().as_deref(),
            Some("3")
        );
    }

    #[tokio::test]
    async fn test_exhausted_quota_prize_is_not_drawn_again() {
        let ctx = testing::setup().await;
        testing::insert_user(&ctx.db, "alice", 2, 0.0).await;
        let mut m = testing::prize_model(0, "1", "material", 1.0);
        m.quota = 1;
        let prize = testing::insert_prize(&ctx.db, m).await;
        let svc = draw_service(&ctx).await;

        svc.draw("alice", "1").await.unwrap();
        assert!(matches!(
            svc.draw("alice", "1").await,
            Err(AppError::NoEligiblePrizes)
        ));
        assert_eq!(prize_row(&ctx, prize.id).await.distributed_count, 1);
        assert_eq!(
            ctx.cache.get("alice_card_count").await.unwrap().as_deref(),
            Some("1")
        );
    }

    #[tokio::test]
    async fn test_stale_snapshot_cannot_overshoot_quota() {
        let ctx = testing::setup().await;
        let mut m = testing::prize_model(0, "1", "material", 1.0);
        m.quota = 1;
        let prize = testing::insert_prize(&ctx.db, m).await;
        let svc = draw_service(&ctx).await;

        // 快照认为还有名额，但另一请求已占满
        let stale = PrizeCatalog::from_models(vec![prize.clone()]).eligible_prizes("1", Utc::now());
        prizes::Entity::update_many()
            .col_expr(prizes::Column::DistributedCount, Expr::value(1))
            .filter(prizes::Column::Id.eq(prize.id))
            .exec(&ctx.db)
            .await
            .unwrap();

        assert!(matches!(
            svc.select_and_reserve(stale).await,
            Err(AppError::NoPrizesAvailable)
        ));
        assert_eq!(prize_row(&ctx, prize.id).await.distributed_count, 1);
    }

    #[tokio::test]
    async fn test_overshoot_redraws_among_remaining() {
        let ctx = testing::setup().await;
        let mut limited = testing::prize_model(0, "1", "material", 1_000_000.0);
        limited.quota = 1;
        limited.distributed_count = 1;
        let limited = testing::insert_prize(&ctx.db, limited).await;
        let fallback =
            testing::insert_prize(&ctx.db, testing::prize_model(0, "1", "thanks", 1.0)).await;
        let svc = draw_service(&ctx).await;

        let mut stale_limited = limited.clone();
        stale_limited.distributed_count = 0;
        let stale = PrizeCatalog::from_models(vec![stale_limited, fallback.clone()])
            .eligible_prizes("1", Utc::now());

        let chosen = svc.select_and_reserve(stale).await.unwrap();
        assert_eq!(chosen.id, fallback.id);
        assert_eq!(prize_row(&ctx, limited.id).await.distributed_count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_draws_never_exceed_quota() {
        let ctx = testing::setup().await;
        for i in 0..10 {
            testing::insert_user(&ctx.db, &format!("user{i}"), 1, 0.0).await;
        }
        let mut limited = testing::prize_model(0, "1", "material", 1_000_000.0);
        limited.quota = 1;
        let limited = testing::insert_prize(&ctx.db, limited).await;
        testing::insert_prize(&ctx.db, testing::prize_model(0, "1", "thanks", 0.1)).await;
        let svc = draw_service(&ctx).await;

        let results = join_all((0..10).map(|i| {
            let svc = svc.clone();
            async move { svc.draw(&format!("user{i}"), "1").await }
        }))
        .await;

        let winners = results
            .iter()
            .filter(|r| matches!(r, Ok(o) if o.name == limited.name))
            .count();
        assert_eq!(winners, 1);
        assert_eq!(prize_row(&ctx, limited.id).await.distributed_count, 1);
        let award_count = awards::Entity::find().count(&ctx.db).await.unwrap();
        assert_eq!(award_count as usize, winners);
        for r in &results {
            match r {
                Ok(o) => assert_eq!(o.card_count, 0),
                Err(e) => assert!(matches!(e, AppError::NoPrizesAvailable), "{e:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_two_users_race_for_last_material_prize() {
        let ctx = testing::setup().await;
        testing::insert_user(&ctx.db, "alice", 1, 0.0).await;
        testing::insert_user(&ctx.db, "bob", 1, 0.0).await;
        let mut limited = testing::prize_model(0, "1", "material", 1.0);
        limited.quota = 1;
        let limited = testing::insert_prize(&ctx.db, limited).await;
        let svc = draw_service(&ctx).await;

        let results = join_all(["alice", "bob"].into_iter().map(|user| {
            let svc = svc.clone();
            async move { (user, svc.draw(user, "1").await) }
        }))
        .await;

        let winners: Vec<_> = results.iter().filter(|(_, r)| r.is_ok()).collect();
        assert_eq!(winners.len(), 1);
        assert_eq!(prize_row(&ctx, limited.id).await.distributed_count, 1);
        assert_eq!(awards::Entity::find().count(&ctx.db).await.unwrap(), 1);

        // 落败方的卡已退还
        let (loser, err) = results
            .iter()
            .find(|(_, r)| r.is_err())
            .map(|(u, r)| (*u, r.as_ref().err()))
            .unwrap();
        assert!(matches!(err, Some(AppError::NoPrizesAvailable)));
        assert_eq!(ctx.cache.get(&format!("{loser}_card_count")).await.unwrap().as_deref(), Some("1"));
    }
}
