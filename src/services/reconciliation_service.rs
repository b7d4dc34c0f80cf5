use crate::entities::user_entity as users;
use crate::error::AppResult;
use crate::services::{LedgerService, ReconcileOutcome};
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait, QueryOrder};

/// 一轮对账的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub checked: u64,
    pub healed: u64,
    pub reseeded: u64,
    pub failed: u64,
}

/// 周期性把缓存中的卡片 / 余额写回数据库（缓存优先）
#[derive(Clone)]
pub struct ReconciliationService {
    pool: DatabaseConnection,
    ledger: LedgerService,
    batch_size: u64,
}

impl ReconciliationService {
    pub fn new(pool: DatabaseConnection, ledger: LedgerService, batch_size: u64) -> Self {
        Self {
            pool,
            ledger,
            batch_size: batch_size.max(1),
        }
    }

    /// 分批遍历全部用户；单个用户失败只记日志，不中断本轮
    pub async fn run_once(&self) -> AppResult<ReconcileSummary> {
        let mut summary = ReconcileSummary::default();
        let mut pages = users::Entity::find()
            .order_by_asc(users::Column::Id)
            .paginate(&self.pool, self.batch_size);

        while let Some(batch) = pages.fetch_and_next().await? {
            for user in &batch {
                summary.checked += 1;
                match self.ledger.reconcile(user).await {
                    Ok(ReconcileOutcome::InSync) => {}
                    Ok(ReconcileOutcome::Healed) => summary.healed += 1,
                    Ok(ReconcileOutcome::Reseeded) => summary.reseeded += 1,
                    Err(e) => {
                        summary.failed += 1;
                        log::error!("Failed to reconcile ledger for {}: {e}", user.user_id);
                    }
                }
            }
        }

        if summary.healed > 0 || summary.reseeded > 0 || summary.failed > 0 {
            log::info!(
                "Ledger reconciliation: checked={} healed={} reseeded={} failed={}",
                summary.checked,
                summary.healed,
                summary.reseeded,
                summary.failed
            );
        }
        Ok(summary)
    }
}
