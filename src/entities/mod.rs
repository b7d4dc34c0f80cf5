pub mod achievement_rewards;
pub mod card_purchases;
pub mod card_types;
pub mod daily_bonus_claims;
pub mod deferred_grant_tasks;
pub mod physical_prize_awards;
pub mod prizes;
pub mod users;

pub use achievement_rewards as achievement_reward_entity;
pub use card_purchases as card_purchase_entity;
pub use card_types as card_type_entity;
pub use daily_bonus_claims as daily_bonus_claim_entity;
pub use deferred_grant_tasks as deferred_grant_task_entity;
pub use physical_prize_awards as physical_prize_award_entity;
pub use prizes as prize_entity;
pub use users as user_entity;
