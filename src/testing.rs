//! Shared fixtures for service tests: in-memory SQLite with the real
//! migrations, plus the in-process cache.

use crate::cache::{MemoryCache, SharedCache};
use crate::entities::{prize_entity as prizes, user_entity as users};
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use std::sync::Arc;

pub struct TestContext {
    pub db: DatabaseConnection,
    pub cache: Arc<MemoryCache>,
}

impl TestContext {
    pub fn shared_cache(&self) -> SharedCache {
        self.cache.clone()
    }
}

pub async fn setup() -> TestContext {
    // 内存库每个连接都是独立的数据库，只能用单连接
    let mut opt = ConnectOptions::new("sqlite::memory:".to_string());
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    TestContext {
        db,
        cache: Arc::new(MemoryCache::new()),
    }
}

pub async fn insert_user(
    db: &DatabaseConnection,
    user_id: &str,
    card_count: i64,
    balance: f64,
) -> users::Model {
    users::ActiveModel {
        user_id: Set(user_id.to_string()),
        card_count: Set(card_count),
        balance: Set(balance),
        created_at: Set(Some(Utc::now())),
        updated_at: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

/// Unlimited, always-on prize; tests tweak fields as needed.
pub fn prize_model(id: i64, play_mode: &str, prize_type: &str, weight: f64) -> prizes::Model {
    prizes::Model {
        id,
        name: format!("{prize_type}-{id}"),
        prize_type: prize_type.to_string(),
        value: 100.0,
        probability_weight: weight,
        play_mode: play_mode.to_string(),
        is_time_based: false,
        start_time: None,
        end_time: None,
        quota: 0,
        distributed_count: 0,
        image_ref: format!("img-{id}"),
        created_at: None,
        updated_at: None,
    }
}

/// Insert a prize; the id of `m` is ignored.
pub async fn insert_prize(db: &DatabaseConnection, m: prizes::Model) -> prizes::Model {
    prizes::ActiveModel {
        name: Set(m.name),
        prize_type: Set(m.prize_type),
        value: Set(m.value),
        probability_weight: Set(m.probability_weight),
        play_mode: Set(m.play_mode),
        is_time_based: Set(m.is_time_based),
        start_time: Set(m.start_time),
        end_time: Set(m.end_time),
        quota: Set(m.quota),
        distributed_count: Set(m.distributed_count),
        image_ref: Set(m.image_ref),
        created_at: Set(Some(Utc::now())),
        updated_at: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}
