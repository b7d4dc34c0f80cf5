use crate::config::AchievementConfig;
use crate::entities::achievement_reward_entity as rewards;
use crate::error::{AppError, AppResult};
use crate::models::ShareTaskResponse;
use crate::services::LedgerService;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set, SqlErr};
use std::str::FromStr;

/// 分享任务（加入社群），每种每用户只奖励一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareTask {
    Discord,
    X,
    Telegram,
    TelegramGroup,
}

impl FromStr for ShareTask {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "discord" => Ok(ShareTask::Discord),
            "x" => Ok(ShareTask::X),
            "telegram" => Ok(ShareTask::Telegram),
            "telegramGroup" => Ok(ShareTask::TelegramGroup),
            other => Err(AppError::ValidationError(format!(
                "unknown share task type: {other}"
            ))),
        }
    }
}

impl ShareTask {
    /// 成就名，即奖励记录里的 achievement_name
    pub fn achievement_name(&self) -> &'static str {
        match self {
            ShareTask::Discord => "discord",
            ShareTask::X => "x",
            ShareTask::Telegram => "telegram",
            ShareTask::TelegramGroup => "telegramGroup",
        }
    }
}

#[derive(Clone)]
pub struct AchievementService {
    pool: DatabaseConnection,
    ledger: LedgerService,
    config: AchievementConfig,
}

impl AchievementService {
    pub fn new(pool: DatabaseConnection, ledger: LedgerService, config: AchievementConfig) -> Self {
        Self {
            pool,
            ledger,
            config,
        }
    }

    fn amount_for(&self, task: ShareTask) -> f64 {
        match task {
            ShareTask::Discord => self.config.discord_amount,
            ShareTask::X => self.config.x_amount,
            ShareTask::Telegram => self.config.telegram_amount,
            ShareTask::TelegramGroup => self.config.telegram_group_amount,
        }
    }

    /// 完成分享任务并发放余额奖励
    ///
    /// 先在 (user_id, achievement_name) 唯一索引下写奖励记录，写入成功才加余额；
    /// 重复或并发领取只有一方成功，其余返回 409。加余额失败则删除记录，允许重试
    pub async fn complete_share_task(
        &self,
        user_id: &str,
        task_type: &str,
    ) -> AppResult<ShareTaskResponse> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(AppError::ValidationError("user_id is required".into()));
        }
        let task = ShareTask::from_str(task_type)?;

        // 顺带确认用户存在
        self.ledger.balance(user_id).await?;

        let amount = self.amount_for(task);
        let record = rewards::ActiveModel {
            user_id: Set(user_id.to_string()),
            achievement_name: Set(task.achievement_name().to_string()),
            reward_type: Set("Balance".to_string()),
            amount: Set(amount),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.pool)
        .await
        .map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                AppError::AlreadyExists("Reward already granted for this achievement".to_string())
            }
            _ => AppError::from(e),
        })?;

        let balance = match self.ledger.add_balance(user_id, amount).await {
            Ok(balance) => balance,
            Err(e) => {
                if let Err(del) = rewards::Entity::delete_by_id(record.id).exec(&self.pool).await {
                    log::error!(
                        "Failed to remove achievement record {} after ledger error: {del}",
                        record.id
                    );
                }
                return Err(e);
            }
        };

        log::info!(
            "Achievement {} rewarded to {user_id}: +{amount}",
            task.achievement_name()
        );
        Ok(ShareTaskResponse {
            message: "Task completed successfully".to_string(),
            achievement: task.achievement_name().to_string(),
            amount,
            balance,
        })
    }
}
