mod common;

use common::*;
use core_types::Identity;
use engine_api::{Engine, EngineError, HealthStatus};
use lottery_engine::ReconcileService;
use std::time::Duration;

const REFRESH: Duration = Duration::from_secs(15);

async fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    for _ in 0..100 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

fn caller_of_snapshot(h: &Harness) -> Option<Identity> {
    h.engine.snapshot().map(|p| p.snapshot.caller().clone())
}

#[tokio::test(start_paused = true)]
async fn wallet_switch_publishes_for_the_new_caller() {
    let h = Harness::new(ALICE);
    let id = h.ledger.insert_record(open_seed("alpha"));
    let service = ReconcileService::new(h.engine.clone(), REFRESH);
    service.start().unwrap();

    wait_until("first snapshot", || {
        caller_of_snapshot(&h) == Some(Identity::new(ALICE))
    })
    .await;
    assert!(h.engine.managed_records().is_empty());

    h.wallet.switch_to(Identity::new(MANAGER));
    wait_until("snapshot for the manager", || {
        caller_of_snapshot(&h) == Some(Identity::new(MANAGER))
    })
    .await;
    assert_eq!(h.engine.managed_records(), vec![id]);
    assert_eq!(service.health().status, HealthStatus::Ready);

    service.stop().unwrap();
}

#[tokio::test(start_paused = true)]
async fn timer_refreshes_and_reports_registry_failures() {
    let h = Harness::new(ALICE);
    let service = ReconcileService::new(h.engine.clone(), REFRESH);
    service.start().unwrap();
    wait_until("first snapshot", || h.engine.snapshot().is_some()).await;
    assert!(h.engine.snapshot().unwrap().snapshot.is_empty());

    h.ledger.insert_record(open_seed("alpha"));
    tokio::time::advance(REFRESH).await;
    wait_until("timer pass", || {
        h.engine
            .snapshot()
            .is_some_and(|p| p.snapshot.records().len() == 1)
    })
    .await;

    h.ledger.set_registry_down(true);
    let generation = h.engine.snapshot().unwrap().generation;
    tokio::time::advance(REFRESH).await;
    wait_until("degraded health", || {
        service.health().status == HealthStatus::Degraded
    })
    .await;
    let health = service.health();
    assert!(health.detail.unwrap().contains("registry"));
    assert_eq!(h.engine.snapshot().unwrap().generation, generation);

    service.stop().unwrap();
}

#[tokio::test]
async fn start_and_stop_are_not_reentrant() {
    let h = Harness::new(ALICE);
    let service = ReconcileService::new(h.engine.clone(), REFRESH);
    assert_eq!(service.health().status, HealthStatus::Stopped);

    service.start().unwrap();
    assert!(service.health().is_running());
    assert!(matches!(service.start(), Err(EngineError::AlreadyRunning)));

    service.stop().unwrap();
    assert_eq!(service.health().status, HealthStatus::Stopped);
    assert!(matches!(service.stop(), Err(EngineError::NotRunning)));
}

#[test]
fn start_needs_a_runtime() {
    let h = Harness::new(ALICE);
    let service = ReconcileService::new(h.engine.clone(), REFRESH);
    assert!(matches!(service.start(), Err(EngineError::Failure { .. })));
    assert!(matches!(service.stop(), Err(EngineError::NotRunning)));
}
