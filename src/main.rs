use actix_web::{App, HttpServer, middleware::Logger, web};
use anyhow::Context;
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter

use reward_draw_backend::{
    cache,
    config::Config,
    database::{create_pool, run_migrations},
    handlers,
    middlewares::create_cors,
    openapi::openapi_config,
    services::*,
    tasks::BackgroundTasks,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {e}"))?;

    // 创建数据库连接池
    let pool = create_pool(&config.database)
        .await
        .context("Failed to create database connection pool")?;

    // 运行数据库迁移
    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    // 缓存层（账本请求路径）
    let cache = cache::connect(&config.cache)
        .await
        .context("Failed to connect to cache")?;

    // 创建服务
    let ledger_service = LedgerService::new(pool.clone(), cache);
    let draw_service = DrawService::new(pool.clone(), ledger_service.clone());
    let user_service = UserService::new(
        pool.clone(),
        ledger_service.clone(),
        &config.ledger,
        &config.purchase,
    );
    let grant_service =
        DeferredGrantService::new(pool.clone(), ledger_service.clone(), config.grants.clone());
    let achievement_service = AchievementService::new(
        pool.clone(),
        ledger_service.clone(),
        config.achievements.clone(),
    );
    let reconciliation_service = ReconciliationService::new(
        pool.clone(),
        ledger_service,
        config.ledger.reconcile_batch_size,
    );

    // 启动后台任务（对账 / 延迟发放）
    let background = BackgroundTasks::start(reconciliation_service, grant_service.clone(), &config);

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    let cors_origins = config.server.cors_allowed_origins.clone();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors(&cors_origins))
            .app_data(handlers::json_config())
            .app_data(handlers::query_config())
            .app_data(web::Data::new(draw_service.clone()))
            .app_data(web::Data::new(user_service.clone()))
            .app_data(web::Data::new(grant_service.clone()))
            .app_data(web::Data::new(achievement_service.clone()))
            .configure(openapi_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::draw_config)
                    .configure(handlers::user_config)
                    .configure(handlers::grants_config)
                    .configure(handlers::achievements_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await;

    // 服务退出后停止后台任务
    background.stop().await;
    log::info!("Server stopped");

    server.map_err(Into::into)
}
