mod common;

use common::*;
use core_types::status::OverallStatus;
use core_types::{FieldName, Identity, LifecycleStatus, RecordId};
use ledger_client::{LedgerUint, RecordSeed};
use core_types::retry::RetryPolicy;
use lottery_engine::{
    EngineSettings, FilterMode, InvalidReason, PassOutcome, ReconcileError, ReconcileTrigger,
};
use std::time::Duration;

fn published(outcome: PassOutcome) -> std::sync::Arc<lottery_engine::PublishedSnapshot> {
    match outcome {
        PassOutcome::Published(p) => p,
        PassOutcome::Superseded { generation } => panic!("pass {generation} was superseded"),
    }
}

#[tokio::test]
async fn invalid_records_shrink_the_snapshot() {
    let h = Harness::new(ALICE);
    let good_a = h.ledger.insert_record(open_seed("alpha"));
    let nameless = h.ledger.insert_record(open_seed("beta"));
    let good_c = h.ledger.insert_record(open_seed("gamma"));
    let unreachable = h.ledger.insert_record(open_seed("delta"));
    h.ledger.push_placeholder();
    h.ledger.fail_field(&nameless, FieldName::DisplayName);
    h.ledger.make_unreachable(&unreachable);

    let snap = published(h.engine.refresh().await.unwrap());
    let ids: Vec<RecordId> = snap.snapshot.records().iter().map(|e| e.id.clone()).collect();
    assert_eq!(ids, vec![good_a, good_c]);
    assert_eq!(snap.snapshot.excluded().len(), 2);
    assert!(snap
        .snapshot
        .excluded()
        .iter()
        .all(|x| x.reason == InvalidReason::MissingField(FieldName::DisplayName)));

    for mode in [FilterMode::All, FilterMode::Open, FilterMode::Closed] {
        assert!(!h.engine.filtered_view(mode).contains(&nameless));
    }
    assert_eq!(h.engine.status_handle().overall(), OverallStatus::Warn);
}

#[tokio::test]
async fn optional_field_failure_keeps_record() {
    let h = Harness::new(ALICE);
    let id = h.ledger.insert_record(open_seed("alpha"));
    h.ledger.fail_field(&id, FieldName::Participants);
    h.ledger
        .set_raw_number(&id, FieldName::PrizeAmount, LedgerUint::Encoded("5n".into()));

    let snap = published(h.engine.refresh().await.unwrap());
    let entry = snap.snapshot.get(&id).unwrap();
    assert!(entry.fields.participants.is_empty());
    assert_eq!(entry.fields.prize_amount, 5);
    assert_eq!(entry.status, Some(LifecycleStatus::Open));
    assert!(entry.eligibility.can_buy_ticket);
}

#[tokio::test]
async fn passes_without_ledger_changes_are_identical() {
    let h = Harness::new(ALICE);
    h.ledger.insert_record(open_seed("alpha"));
    h.ledger.insert_record(RecordSeed {
        deadline: NOW - 10,
        participants: vec![Identity::new(ALICE)],
        winner: Some(Identity::new(ALICE)),
        ..open_seed("beta")
    });

    let first = published(h.engine.refresh().await.unwrap());
    let second = published(h.engine.refresh().await.unwrap());
    assert_eq!(first.snapshot, second.snapshot);
    assert!(second.generation > first.generation);
}

#[tokio::test(start_paused = true)]
async fn later_started_pass_wins() {
    let h = Harness::new(ALICE);
    h.ledger.insert_record(open_seed("alpha"));
    h.ledger.delay_next_listing(Duration::from_millis(500));

    let (slow, fast) = tokio::join!(h.engine.refresh(), h.engine.refresh());
    assert!(matches!(slow.unwrap(), PassOutcome::Superseded { generation: 1 }));
    let fast = published(fast.unwrap());
    assert_eq!(fast.generation, 2);

    let current = h.engine.snapshot().unwrap();
    assert_eq!(current.generation, 2);
    assert_eq!(h.engine.discarded_passes(), 1);
}

#[tokio::test]
async fn registry_failure_keeps_previous_snapshot() {
    let h = Harness::new(ALICE);
    h.ledger.insert_record(open_seed("alpha"));
    let before = published(h.engine.refresh().await.unwrap());

    h.ledger.set_registry_down(true);
    let err = h.engine.refresh().await.unwrap_err();
    assert!(matches!(err, ReconcileError::Registry(_)));
    assert_eq!(h.engine.snapshot().unwrap().generation, before.generation);
    assert_eq!(h.engine.status_handle().overall(), OverallStatus::Crit);

    h.ledger.set_registry_down(false);
    h.engine.refresh().await.unwrap();
    assert_eq!(h.engine.status_handle().overall(), OverallStatus::Ok);
}

#[tokio::test(start_paused = true)]
async fn transient_registry_failure_is_retried() {
    let h = Harness::with_settings(
        ALICE,
        EngineSettings {
            retry: RetryPolicy::new(3, 10, 10, 0.0),
            ..settings()
        },
    );
    let id = h.ledger.insert_record(open_seed("alpha"));
    h.ledger.fail_next_listings(2);

    let snap = published(h.engine.refresh().await.unwrap());
    assert_eq!(snap.snapshot.records().len(), 1);
    assert!(snap.snapshot.get(&id).is_some());
    assert_eq!(h.engine.status_handle().overall(), OverallStatus::Ok);
}

#[tokio::test(start_paused = true)]
async fn stale_registry_failure_leaves_newer_status_alone() {
    let h = Harness::new(ALICE);
    h.ledger.insert_record(open_seed("alpha"));
    h.ledger.delay_next_listing(Duration::from_millis(500));
    h.ledger.fail_next_listings(1);

    let (slow, fast) = tokio::join!(h.engine.refresh(), h.engine.refresh());
    assert!(matches!(slow.unwrap_err(), ReconcileError::Registry(_)));
    assert_eq!(published(fast.unwrap()).generation, 2);

    assert_eq!(h.engine.snapshot().unwrap().generation, 2);
    let status = h.engine.status_handle();
    assert_eq!(status.overall(), OverallStatus::Ok);
    assert!(status.snapshot().errors.is_empty());
}

#[tokio::test]
async fn identity_change_recomputes_roles() {
    let h = Harness::new(ALICE);
    let id = h.ledger.insert_record(open_seed("alpha"));
    h.engine.refresh().await.unwrap();
    assert!(h.engine.managed_records().is_empty());

    h.wallet.switch_to(Identity::new(MANAGER));
    let outcome = h
        .engine
        .handle(ReconcileTrigger::IdentityChanged(Identity::new(MANAGER)))
        .await
        .unwrap()
        .unwrap();
    let snap = published(outcome);
    assert_eq!(snap.snapshot.caller(), &Identity::new(MANAGER));
    assert!(snap.snapshot.get(&id).unwrap().roles.is_manager);
    assert_eq!(h.engine.managed_records(), vec![id]);
}

#[tokio::test]
async fn filter_change_does_not_touch_the_ledger() {
    let h = Harness::new(ALICE);
    let open = h.ledger.insert_record(open_seed("alpha"));
    let closed = h.ledger.insert_record(RecordSeed {
        deadline: NOW - 1,
        ..open_seed("beta")
    });
    h.engine.refresh().await.unwrap();
    assert_eq!(h.engine.current_view(), vec![open.clone(), closed.clone()]);

    let reads = h.ledger.read_count();
    let outcome = h
        .engine
        .handle(ReconcileTrigger::FilterChanged(FilterMode::Closed))
        .await
        .unwrap();
    assert!(outcome.is_none());
    assert_eq!(h.ledger.read_count(), reads);
    assert_eq!(h.engine.filter(), FilterMode::Closed);
    assert_eq!(h.engine.current_view(), vec![closed]);
    assert_eq!(h.engine.filtered_view(FilterMode::Open), vec![open]);
}

#[tokio::test]
async fn time_alone_moves_records_forward() {
    let h = Harness::new(ALICE);
    let id = h.ledger.insert_record(open_seed("alpha"));
    let before = published(h.engine.refresh().await.unwrap());
    assert_eq!(
        before.snapshot.get(&id).unwrap().status,
        Some(LifecycleStatus::Open)
    );

    h.clock.advance(3_600);
    let after = published(h.engine.refresh().await.unwrap());
    assert_eq!(
        after.snapshot.get(&id).unwrap().status,
        Some(LifecycleStatus::ClosedPendingWinner)
    );
}
