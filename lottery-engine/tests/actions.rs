mod common;

use common::*;
use core_types::{Identity, LifecycleStatus, RecordId};
use ledger_client::{LedgerWriter, RecordSeed};
use lottery_engine::{
    ActionError, ActionKind, PreconditionError, ReconcileTrigger, RecordDraft, SubmissionError,
};
use std::time::Duration;

async fn switch_to(h: &Harness, who: &str) {
    h.wallet.switch_to(Identity::new(who));
    h.engine
        .handle(ReconcileTrigger::IdentityChanged(Identity::new(who)))
        .await
        .unwrap();
}

fn status_of(h: &Harness, id: &RecordId) -> Option<LifecycleStatus> {
    h.engine.snapshot().unwrap().snapshot.get(id).unwrap().status
}

#[tokio::test]
async fn full_lifecycle_through_the_gateway() {
    let h = Harness::new(ALICE);
    let id = h.ledger.insert_record(open_seed("weekly"));
    h.engine.refresh().await.unwrap();

    let bought = h.engine.submit_action(ActionKind::BuyTicket, &id).await.unwrap();
    assert_eq!(bought.kind, ActionKind::BuyTicket);
    let entry = h.engine.snapshot().unwrap().snapshot.get(&id).cloned().unwrap();
    assert!(entry.roles.is_participant);
    assert!(!entry.eligibility.can_buy_ticket);

    h.clock.advance(3_600);
    switch_to(&h, MANAGER).await;
    assert_eq!(status_of(&h, &id), Some(LifecycleStatus::ClosedPendingWinner));
    let selected = h
        .engine
        .submit_action(ActionKind::SelectWinner, &id)
        .await
        .unwrap();
    assert_eq!(selected.winner, Some(Identity::new(ALICE)));
    assert_eq!(status_of(&h, &id), Some(LifecycleStatus::CompletedUnclaimed));

    let feed = h.engine.winners_feed();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].winner, Identity::new(ALICE));
    assert!(!feed[0].claimed);

    switch_to(&h, ALICE).await;
    h.engine.submit_action(ActionKind::ClaimPrize, &id).await.unwrap();
    assert_eq!(status_of(&h, &id), Some(LifecycleStatus::CompletedClaimed));
    assert!(h.engine.winners_feed()[0].claimed);
    assert_eq!(h.ledger.write_count(), 3);
}

#[tokio::test]
async fn ineligible_actions_never_reach_the_ledger() {
    let h = Harness::new(ALICE);
    let id = h.ledger.insert_record(RecordSeed {
        participants: vec![Identity::new(ALICE)],
        ..open_seed("weekly")
    });
    h.engine.refresh().await.unwrap();

    let err = h
        .engine
        .submit_action(ActionKind::BuyTicket, &id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ActionError::Precondition(PreconditionError::NotEligible {
            action: ActionKind::BuyTicket,
            ..
        })
    ));
    let err = h
        .engine
        .submit_action(ActionKind::SelectWinner, &id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ActionError::Precondition(PreconditionError::NotEligible { reason, .. })
            if reason == "only the manager can select a winner"
    ));
    assert_eq!(h.ledger.write_count(), 0);
}

#[tokio::test]
async fn disconnected_wallet_cannot_act() {
    let h = Harness::new(ALICE);
    let id = h.ledger.insert_record(open_seed("weekly"));
    h.wallet.disconnect();
    h.engine.refresh().await.unwrap();

    let entry = h.engine.snapshot().unwrap().snapshot.get(&id).cloned().unwrap();
    assert!(!entry.roles.is_participant && !entry.roles.is_manager);

    let err = h
        .engine
        .submit_action(ActionKind::BuyTicket, &id)
        .await
        .unwrap_err();
    assert_eq!(err, ActionError::Precondition(PreconditionError::NoIdentity));
    assert_eq!(h.ledger.write_count(), 0);
}

#[tokio::test]
async fn invalid_record_is_rejected_before_submission() {
    let h = Harness::new(ALICE);
    let ghost = RecordId::new("0x00000000000000000000000000000000000000ff");
    h.ledger.push_unknown(ghost.clone());
    h.engine.refresh().await.unwrap();
    assert!(h.engine.snapshot().unwrap().snapshot.is_empty());

    let err = h
        .engine
        .submit_action(ActionKind::BuyTicket, &ghost)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ActionError::Precondition(PreconditionError::UnknownRecord(ghost))
    );
    assert_eq!(h.ledger.write_count(), 0);
}

#[tokio::test]
async fn rejected_write_is_reported_once() {
    let h = Harness::new(ALICE);
    let id = h.ledger.insert_record(open_seed("weekly"));
    h.engine.refresh().await.unwrap();
    h.ledger.reject_next_write("user denied transaction");

    let err = h
        .engine
        .submit_action(ActionKind::BuyTicket, &id)
        .await
        .unwrap_err();
    match err {
        ActionError::Submission(SubmissionError {
            operation, detail, ..
        }) => {
            assert_eq!(operation, "buy_ticket");
            assert_eq!(detail.as_deref(), Some("user denied transaction"));
        }
        other => panic!("expected submission error, got {other:?}"),
    }
    assert_eq!(h.ledger.write_count(), 1);

    let entry = h.engine.snapshot().unwrap().snapshot.get(&id).cloned().unwrap();
    assert!(entry.eligibility.can_buy_ticket);
}

#[tokio::test(start_paused = true)]
async fn stale_snapshot_forces_a_fresh_read() {
    let h = Harness::new(MANAGER);
    let id = h.ledger.insert_record(open_seed("weekly"));
    h.engine.refresh().await.unwrap();

    // Bought outside this engine, so the published snapshot still shows no players.
    h.ledger
        .buy_ticket(&Identity::new(BOB), &id, TICKET)
        .await
        .unwrap();
    h.clock.advance(3_600);

    let err = h
        .engine
        .submit_action(ActionKind::SelectWinner, &id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ActionError::Precondition(PreconditionError::NotEligible { reason, .. })
            if reason == "no participants"
    ));

    tokio::time::advance(Duration::from_secs(31)).await;
    let outcome = h
        .engine
        .submit_action(ActionKind::SelectWinner, &id)
        .await
        .unwrap();
    assert_eq!(outcome.winner, Some(Identity::new(BOB)));
    assert_eq!(h.ledger.write_count(), 2);
}

#[tokio::test]
async fn admin_creates_records() {
    let h = Harness::new(ADMIN);
    h.engine.refresh().await.unwrap();
    let draft = RecordDraft::from_form("Friday draw", "0.01", "3600", "1").unwrap();

    let created = h.engine.create_record(&draft).await.unwrap();
    let id = created.record.unwrap();
    assert_eq!(created.deadline, NOW + 3_600);

    let snap = h.engine.snapshot().unwrap();
    let entry = snap.snapshot.get(&id).unwrap();
    assert_eq!(entry.fields.display_name, "Friday draw");
    assert_eq!(entry.fields.ticket_price, TICKET);
    assert_eq!(entry.fields.prize_amount, PRIZE);
    assert_eq!(entry.status, Some(LifecycleStatus::Open));
    assert_eq!(h.engine.managed_records(), vec![id]);
}

#[tokio::test]
async fn only_the_admin_creates_records() {
    let h = Harness::new(ALICE);
    let draft = RecordDraft::from_form("Friday draw", "0.01", "3600", "1").unwrap();
    let err = h.engine.create_record(&draft).await.unwrap_err();
    assert_eq!(err, ActionError::Precondition(PreconditionError::NotAdmin));
    assert_eq!(h.ledger.write_count(), 0);
}
