// Copyright (c) James Kassemi, SC, US. All rights reserved.

mod sandbox;

use std::{env, path::PathBuf, process, sync::Arc, time::Duration};

use config::ConfigError;
use core_types::config::AppConfig;
use core_types::{Clock, Identity, SystemClock};
use engine_api::{Engine, EngineError};
use ledger_client::{MemoryLedger, MemoryWallet};
use log::{error, info, warn};
use lottery_engine::{EngineSettings, LotteryEngine, ReconcileService};
use metrics::Metrics;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const STATUS_LOG_INTERVAL_SECS: u64 = 30;
const METRICS_COLLECT_INTERVAL_SECS: u64 = 5;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("lotteryd failed: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let config = match env::args().nth(1) {
        Some(arg) if arg == "-h" || arg == "--help" => return Err(AppError::Usage),
        Some(path) => AppConfig::load_from(&PathBuf::from(path))?,
        None => AppConfig::load()?,
    };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(AppError::Runtime)?;
    runtime.block_on(serve(config))
}

async fn serve(config: AppConfig) -> Result<(), AppError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ledger = Arc::new(MemoryLedger::new(Arc::clone(&clock), config.sandbox.seed));
    sandbox::seed(&ledger, clock.now_unix());

    let initial = config
        .admin()
        .unwrap_or_else(|| Identity::new(sandbox::DEMO_PLAYERS[0]));
    let wallet = Arc::new(MemoryWallet::new(initial.clone()));

    let engine = Arc::new(LotteryEngine::new(
        ledger.clone(),
        ledger,
        wallet,
        clock,
        EngineSettings::from_config(&config),
    ));
    let service = ReconcileService::new(Arc::clone(&engine), config.engine.refresh_interval());

    println!(
        "lotteryd booted; caller {} (admin: {}), refresh every {}s, snapshot max age {}s",
        initial.short(),
        config
            .admin()
            .map(|a| a.short())
            .unwrap_or_else(|| "none".to_string()),
        config.engine.refresh_interval().as_secs(),
        config.engine.snapshot_max_age_s
    );

    let mut background: Vec<JoinHandle<()>> = Vec::new();
    if config.metrics.enabled {
        let metrics = Arc::new(Metrics::new()?);
        metrics.register_service_status(engine.status_handle());
        background.push(
            metrics.spawn_service_metric_task(Duration::from_secs(METRICS_COLLECT_INTERVAL_SECS)),
        );
        let listener = TcpListener::bind(config.metrics.addr.as_str())
            .await
            .map_err(|source| AppError::Bind {
                addr: config.metrics.addr.clone(),
                source,
            })?;
        println!("Metrics exporter listening on http://{}/metrics", config.metrics.addr);
        background.push(tokio::spawn(async move {
            if let Err(err) = metrics.serve(listener).await {
                error!("metrics server stopped: {err}");
            }
        }));
    }

    service.start()?;
    log_engine_health(&service);
    background.push(spawn_status_logger(
        Arc::clone(&engine),
        Duration::from_secs(STATUS_LOG_INTERVAL_SECS),
    ));
    println!("Reconciler is running; press Ctrl+C to shut down.");

    tokio::signal::ctrl_c().await.map_err(AppError::Signal)?;
    println!("Shutdown signal received; stopping reconciler...");
    for task in background {
        task.abort();
    }
    service.stop()?;
    Ok(())
}

fn log_engine_health(engine: &dyn Engine) {
    let health = engine.health();
    println!("lottery reconciler status: {health}");
}

fn spawn_status_logger(engine: Arc<LotteryEngine>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(current) = engine.snapshot() else {
                warn!("no snapshot published yet");
                continue;
            };
            info!(
                "snapshot #{} for {} ({} view): {}",
                current.generation,
                current.snapshot.caller().short(),
                engine.filter(),
                current.snapshot.summary()
            );
            for winner in engine.winners_feed().iter().take(5) {
                info!("  {winner}");
            }
        }
    })
}

#[derive(Debug, Error)]
enum AppError {
    #[error("usage: lotteryd [config.toml]")]
    Usage,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("metrics registry: {0}")]
    Metrics(#[from] prometheus::Error),
    #[error("failed to bind metrics listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed while waiting for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}
