//! Background scheduled tasks for the application.
//!
//! Two recurring jobs run for the lifetime of the server: the ledger
//! reconciliation (cache -> store) and the deferred grant sweep. Call
//! `BackgroundTasks::start` once during startup and `stop` on shutdown.

use crate::config::Config;
use crate::services::{DeferredGrantService, ReconciliationService};
use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub struct BackgroundTasks {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Spawn all background tasks.
    ///
    /// Each job is idempotent per item, so a stop in the middle of a pass is
    /// picked up again by the next start.
    pub fn start(
        reconciliation: ReconciliationService,
        grants: DeferredGrantService,
        config: &Config,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let mut handles = Vec::new();

        // 账本对账（缓存 -> 数据库）
        handles.push(spawn_periodic(
            "ledger reconciliation",
            config.ledger.reconcile_interval(),
            shutdown.subscribe(),
            move || {
                let svc = reconciliation.clone();
                async move {
                    if let Err(e) = svc.run_once().await {
                        log::error!("Ledger reconciliation pass failed: {e}");
                    }
                }
            },
        ));

        // 延迟免费卡发放
        handles.push(spawn_periodic(
            "deferred grant sweep",
            config.grants.sweep_interval(),
            shutdown.subscribe(),
            move || {
                let svc = grants.clone();
                async move {
                    if let Err(e) = svc.sweep_due(Utc::now()).await {
                        log::error!("Deferred grant sweep failed: {e}");
                    }
                }
            },
        ));

        Self { shutdown, handles }
    }

    /// 通知所有任务退出，并等待当前一轮执行完
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                log::error!("Background task ended abnormally: {e}");
            }
        }
    }
}

fn spawn_periodic<F, Fut>(
    name: &'static str,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut job: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        log::info!("Background task started: {name} (every {}s)", every.as_secs());
        loop {
            tokio::select! {
                _ = interval.tick() => job().await,
                _ = shutdown.changed() => break,
            }
        }
        log::info!("Background task stopped: {name}");
    })
}
