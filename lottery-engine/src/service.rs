use crate::engine::LotteryEngine;
use crate::triggers::ReconcileTrigger;
use engine_api::{Engine, EngineError, EngineHealth, EngineResult, HealthStatus};
use log::{error, info};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Background driver for a [`LotteryEngine`]: a refresh timer plus an identity
/// watcher, both feeding triggers into the engine.
pub struct ReconcileService {
    engine: Arc<LotteryEngine>,
    refresh_interval: Duration,
    tasks: Mutex<Option<Vec<JoinHandle<()>>>>,
    health: Arc<Mutex<EngineHealth>>,
}

impl ReconcileService {
    pub fn new(engine: Arc<LotteryEngine>, refresh_interval: Duration) -> Self {
        Self {
            engine,
            refresh_interval,
            tasks: Mutex::new(None),
            health: Arc::new(Mutex::new(EngineHealth::default())),
        }
    }

    pub fn engine(&self) -> &Arc<LotteryEngine> {
        &self.engine
    }
}

impl Engine for ReconcileService {
    fn start(&self) -> EngineResult<()> {
        let mut guard = self.tasks.lock();
        if guard.is_some() {
            return Err(EngineError::AlreadyRunning);
        }
        let runtime = Handle::try_current().map_err(|err| EngineError::Failure {
            source: Box::new(err),
        })?;
        set_health(&self.health, HealthStatus::Starting, None);

        let timer = runtime.spawn(run_timer(
            Arc::clone(&self.engine),
            self.refresh_interval,
            Arc::clone(&self.health),
        ));
        let watcher = runtime.spawn(watch_identity(
            Arc::clone(&self.engine),
            Arc::clone(&self.health),
        ));
        info!(
            "reconciler started (refresh every {}s)",
            self.refresh_interval.as_secs()
        );
        *guard = Some(vec![timer, watcher]);
        Ok(())
    }

    fn stop(&self) -> EngineResult<()> {
        let Some(tasks) = self.tasks.lock().take() else {
            return Err(EngineError::NotRunning);
        };
        for task in tasks {
            task.abort();
        }
        set_health(&self.health, HealthStatus::Stopped, None);
        info!("reconciler stopped");
        Ok(())
    }

    fn health(&self) -> EngineHealth {
        self.health.lock().clone()
    }
}

async fn run_timer(engine: Arc<LotteryEngine>, every: Duration, health: Arc<Mutex<EngineHealth>>) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        run_pass(&engine, ReconcileTrigger::Timer, &health).await;
    }
}

async fn watch_identity(engine: Arc<LotteryEngine>, health: Arc<Mutex<EngineHealth>>) {
    let mut changes = engine.identity_changes();
    while changes.changed().await.is_ok() {
        let identity = changes.borrow_and_update().clone();
        run_pass(&engine, ReconcileTrigger::IdentityChanged(identity), &health).await;
    }
}

async fn run_pass(engine: &LotteryEngine, trigger: ReconcileTrigger, health: &Mutex<EngineHealth>) {
    match engine.handle(trigger).await {
        Ok(_) => set_health(health, HealthStatus::Ready, None),
        Err(err) => {
            error!("reconciliation pass failed: {err}");
            set_health(health, HealthStatus::Degraded, Some(err.to_string()));
        }
    }
}

fn set_health(health: &Mutex<EngineHealth>, status: HealthStatus, detail: Option<String>) {
    *health.lock() = EngineHealth::new(status, detail);
}
