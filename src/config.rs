use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub grants: GrantConfig,
    #[serde(default)]
    pub purchase: PurchaseConfig,
    #[serde(default)]
    pub achievements: AchievementConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 为空时允许任意来源
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// 缓存层配置；未配置 redis_url 时使用进程内缓存（仅适合单实例/本地开发）
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheConfig {
    #[serde(default)]
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
    #[serde(default = "default_reconcile_batch_size")]
    pub reconcile_batch_size: u64,
    /// 新注册用户的初始卡片数
    #[serde(default = "default_initial_card_count")]
    pub initial_card_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantConfig {
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// 触发到发放之间的固定延迟
    #[serde(default = "default_grant_delay_secs")]
    pub delay_secs: i64,
    /// 扫描时额外等待的宽限期
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: i64,
    /// 每用户每天最多创建的任务数
    #[serde(default = "default_daily_cap")]
    pub daily_cap: u64,
    #[serde(default = "default_cards_per_grant")]
    pub cards_per_grant: i64,
    /// 当天首次触发时立即发放的卡片数
    #[serde(default = "default_daily_login_bonus")]
    pub daily_login_bonus: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseConfig {
    /// 每用户每种卡包每天限购次数
    #[serde(default = "default_daily_purchase_limit")]
    pub daily_limit: u64,
}

/// 分享任务奖励金额（一次性，计入余额）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementConfig {
    #[serde(default = "default_share_reward")]
    pub discord_amount: f64,
    #[serde(default = "default_share_reward")]
    pub x_amount: f64,
    #[serde(default = "default_share_reward")]
    pub telegram_amount: f64,
    #[serde(default = "default_share_reward")]
    pub telegram_group_amount: f64,
}

fn default_reconcile_interval_secs() -> u64 {
    5
}
fn default_reconcile_batch_size() -> u64 {
    500
}
fn default_initial_card_count() -> i64 {
    10
}
fn default_sweep_interval_secs() -> u64 {
    10
}
fn default_grant_delay_secs() -> i64 {
    600
}
fn default_grace_period_secs() -> i64 {
    10
}
fn default_daily_cap() -> u64 {
    15
}
fn default_cards_per_grant() -> i64 {
    1
}
fn default_daily_login_bonus() -> i64 {
    5
}
fn default_daily_purchase_limit() -> u64 {
    3
}
fn default_share_reward() -> f64 {
    100.0
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: default_reconcile_interval_secs(),
            reconcile_batch_size: default_reconcile_batch_size(),
            initial_card_count: default_initial_card_count(),
        }
    }
}

impl Default for GrantConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            delay_secs: default_grant_delay_secs(),
            grace_period_secs: default_grace_period_secs(),
            daily_cap: default_daily_cap(),
            cards_per_grant: default_cards_per_grant(),
            daily_login_bonus: default_daily_login_bonus(),
        }
    }
}

impl Default for PurchaseConfig {
    fn default() -> Self {
        Self {
            daily_limit: default_daily_purchase_limit(),
        }
    }
}

impl Default for AchievementConfig {
    fn default() -> Self {
        Self {
            discord_amount: default_share_reward(),
            x_amount: default_share_reward(),
            telegram_amount: default_share_reward(),
            telegram_group_amount: default_share_reward(),
        }
    }
}

impl LedgerConfig {
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs.max(1))
    }
}

impl GrantConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn delay(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.delay_secs)
    }

    pub fn grace_period(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.grace_period_secs)
    }
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => Self::parse(&config_str)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                // 数据库 URL 在无配置文件时必须提供
                let database_url = get_env("DATABASE_URL")
                    .ok_or("DATABASE_URL is not set and config.toml was not found")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                        cors_allowed_origins: Vec::new(),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    cache: CacheConfig::default(),
                    ledger: LedgerConfig::default(),
                    grants: GrantConfig::default(),
                    purchase: PurchaseConfig::default(),
                    achievements: AchievementConfig::default(),
                }
            }
            Err(e) => {
                return Err(format!("Unable to read config file {config_path}: {e}").into());
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn parse(config_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        toml::from_str(config_str).map_err(|e| format!("Failed to parse config file: {e}").into())
    }

    // 环境变量覆盖（即便文件存在时也覆盖）
    fn apply_env_overrides(&mut self) {
        fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
            env::var(name).ok().and_then(|v| v.parse().ok())
        }

        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(p) = parsed("SERVER_PORT") {
            self.server.port = p;
        }
        if let Ok(v) = env::var("CORS_ALLOWED_ORIGINS") {
            self.server.cors_allowed_origins = v
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(mc) = parsed("DB_MAX_CONNECTIONS") {
            self.database.max_connections = mc;
        }
        if let Ok(v) = env::var("REDIS_URL") {
            self.cache.redis_url = Some(v);
        }
        if let Some(n) = parsed("LEDGER_RECONCILE_INTERVAL_SECS") {
            self.ledger.reconcile_interval_secs = n;
        }
        if let Some(n) = parsed("LEDGER_INITIAL_CARD_COUNT") {
            self.ledger.initial_card_count = n;
        }
        if let Some(n) = parsed("GRANT_SWEEP_INTERVAL_SECS") {
            self.grants.sweep_interval_secs = n;
        }
        if let Some(n) = parsed("GRANT_DELAY_SECS") {
            self.grants.delay_secs = n;
        }
        if let Some(n) = parsed("GRANT_GRACE_PERIOD_SECS") {
            self.grants.grace_period_secs = n;
        }
        if let Some(n) = parsed("GRANT_DAILY_CAP") {
            self.grants.daily_cap = n;
        }
        if let Some(n) = parsed("PURCHASE_DAILY_LIMIT") {
            self.purchase.daily_limit = n;
        }
    }
}
