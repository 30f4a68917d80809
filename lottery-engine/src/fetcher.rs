//! Per-record field reads.
//!
//! The eight fields are independent read tasks run concurrently. Each yields
//! `Result<_, FieldFetchError>`; failures are logged and replaced with the
//! field's default rather than aborting the record. Validity is judged only after
//! every read has settled.

use crate::error::{FieldFetchError, InvalidReason};
use core_types::retry::RetryPolicy;
use core_types::{Amount, FieldName, Identity, RecordFields, RecordId};
use ledger_client::{LedgerError, LedgerReader, LedgerResult, LedgerUint};
use log::warn;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Outcome of reading one record: normalized fields plus what went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedRecord {
    pub id: RecordId,
    pub fields: RecordFields,
    pub field_errors: Vec<FieldFetchError>,
    pub validity: Result<(), InvalidReason>,
}

impl FetchedRecord {
    pub fn is_valid(&self) -> bool {
        self.validity.is_ok()
    }
}

pub struct RecordFetcher {
    reader: Arc<dyn LedgerReader>,
    retry: RetryPolicy,
    field_timeout: Duration,
}

impl RecordFetcher {
    pub fn new(reader: Arc<dyn LedgerReader>, retry: RetryPolicy, field_timeout: Duration) -> Self {
        Self {
            reader,
            retry,
            field_timeout,
        }
    }

    pub async fn fetch(&self, id: &RecordId) -> FetchedRecord {
        let reader = &self.reader;
        let (name, ticket_price, deadline, prize, manager, winner, participants, claimed) = tokio::join!(
            self.read(FieldName::DisplayName, || reader.name(id)),
            self.read(FieldName::TicketPrice, || reader.ticket_price(id)),
            self.read(FieldName::Deadline, || reader.deadline(id)),
            self.read(FieldName::PrizeAmount, || reader.prize(id)),
            self.read(FieldName::Manager, || reader.manager(id)),
            self.read(FieldName::Winner, || reader.winner(id)),
            self.read(FieldName::Participants, || reader.participants(id)),
            self.read(FieldName::Claimed, || reader.claimed(id)),
        );

        let mut errors = Vec::new();
        let mut unparsable_deadline = None;

        let display_name = settle(name, &mut errors).unwrap_or_default();
        let ticket_price = settle(ticket_price, &mut errors)
            .and_then(|raw| decode_amount(FieldName::TicketPrice, &raw, &mut errors))
            .unwrap_or(0);
        let prize_amount = settle(prize, &mut errors)
            .and_then(|raw| decode_amount(FieldName::PrizeAmount, &raw, &mut errors))
            .unwrap_or(0);
        let deadline = match settle(deadline, &mut errors).map(|raw| raw.to_timestamp()) {
            Some(Ok(ts)) => ts,
            Some(Err(raw)) => {
                unparsable_deadline = Some(raw);
                0
            }
            None => 0,
        };
        let manager = settle(manager, &mut errors).unwrap_or_else(Identity::sentinel);
        let winner = settle(winner, &mut errors).unwrap_or_else(Identity::sentinel);
        let participants = settle(participants, &mut errors).unwrap_or_default();
        let claimed = settle(claimed, &mut errors).unwrap_or(false);

        for err in &errors {
            warn!("[{}] {}", id.short(), err);
        }

        let fields = RecordFields {
            display_name,
            ticket_price,
            deadline,
            prize_amount,
            manager,
            winner,
            participants,
            claimed,
        };
        let validity = match unparsable_deadline {
            Some(raw) => Err(InvalidReason::UnparsableTimestamp(raw)),
            None => check_validity(&fields),
        };
        FetchedRecord {
            id: id.clone(),
            fields,
            field_errors: errors,
            validity,
        }
    }

    /// One field read: bounded by the field timeout, retried only on transient errors.
    async fn read<T, F, Fut>(&self, field: FieldName, call: F) -> Result<T, FieldFetchError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        let limit = self.field_timeout;
        let call = &call;
        self.retry
            .retry_async_when(
                move |_| {
                    let pending = call();
                    async move {
                        match timeout(limit, pending).await {
                            Ok(result) => result,
                            Err(_) => Err(LedgerError::Timeout),
                        }
                    }
                },
                LedgerError::is_transient,
            )
            .await
            .map_err(|source| FieldFetchError { field, source })
    }
}

fn settle<T>(result: Result<T, FieldFetchError>, errors: &mut Vec<FieldFetchError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            errors.push(err);
            None
        }
    }
}

fn decode_amount(
    field: FieldName,
    raw: &LedgerUint,
    errors: &mut Vec<FieldFetchError>,
) -> Option<Amount> {
    match raw.to_u128() {
        Ok(value) => Some(value),
        Err(raw) => {
            errors.push(FieldFetchError {
                field,
                source: LedgerError::Decode(format!("not an integer: '{raw}'")),
            });
            None
        }
    }
}

/// A record is usable only when name, deadline, manager, and ticket price all hold
/// non-default values.
fn check_validity(fields: &RecordFields) -> Result<(), InvalidReason> {
    if fields.display_name.trim().is_empty() {
        return Err(InvalidReason::MissingField(FieldName::DisplayName));
    }
    if fields.deadline <= 0 {
        return Err(InvalidReason::MissingField(FieldName::Deadline));
    }
    if fields.manager.is_sentinel() {
        return Err(InvalidReason::MissingField(FieldName::Manager));
    }
    if fields.ticket_price == 0 {
        return Err(InvalidReason::MissingField(FieldName::TicketPrice));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::ManualClock;
    use ledger_client::{MemoryLedger, RecordSeed};

    const NOW: i64 = 1_700_000_000;

    fn manager() -> Identity {
        Identity::new("0xMA00000000000000000000000000000000000001")
    }

    fn setup() -> (Arc<MemoryLedger>, RecordFetcher, RecordId) {
        let ledger = Arc::new(MemoryLedger::new(Arc::new(ManualClock::new(NOW)), 3));
        let id = ledger.insert_record(RecordSeed {
            name: "daily draw".into(),
            ticket_price: 25,
            deadline: NOW + 3_600,
            prize: 500,
            manager: manager(),
            participants: vec![Identity::new("0xp1")],
            ..RecordSeed::default()
        });
        let fetcher = RecordFetcher::new(
            ledger.clone(),
            RetryPolicy::none(),
            Duration::from_secs(1),
        );
        (ledger, fetcher, id)
    }

    #[tokio::test]
    async fn reads_all_fields() {
        let (_ledger, fetcher, id) = setup();
        let fetched = fetcher.fetch(&id).await;
        assert!(fetched.is_valid());
        assert!(fetched.field_errors.is_empty());
        assert_eq!(fetched.fields.display_name, "daily draw");
        assert_eq!(fetched.fields.ticket_price, 25);
        assert_eq!(fetched.fields.deadline, NOW + 3_600);
        assert_eq!(fetched.fields.prize_amount, 500);
        assert_eq!(fetched.fields.manager, manager());
        assert!(fetched.fields.winner.is_sentinel());
        assert_eq!(fetched.fields.participants.len(), 1);
    }

    #[tokio::test]
    async fn optional_field_failure_defaults_without_invalidating() {
        let (ledger, fetcher, id) = setup();
        ledger.fail_field(&id, FieldName::PrizeAmount);
        ledger.fail_field(&id, FieldName::Participants);
        let fetched = fetcher.fetch(&id).await;
        assert!(fetched.is_valid());
        assert_eq!(fetched.fields.prize_amount, 0);
        assert!(fetched.fields.participants.is_empty());
        assert_eq!(fetched.field_errors.len(), 2);
        assert_eq!(fetched.fields.display_name, "daily draw");
    }

    #[tokio::test]
    async fn missing_name_invalidates() {
        let (ledger, fetcher, id) = setup();
        ledger.fail_field(&id, FieldName::DisplayName);
        let fetched = fetcher.fetch(&id).await;
        assert_eq!(
            fetched.validity,
            Err(InvalidReason::MissingField(FieldName::DisplayName))
        );
        assert_eq!(fetched.fields.ticket_price, 25);
    }

    #[tokio::test]
    async fn big_integer_strings_are_normalized() {
        let (ledger, fetcher, id) = setup();
        ledger.set_raw_number(
            &id,
            FieldName::Deadline,
            LedgerUint::Encoded(format!("{}n", NOW + 10)),
        );
        ledger.set_raw_number(&id, FieldName::TicketPrice, LedgerUint::Encoded("0x19".into()));
        let fetched = fetcher.fetch(&id).await;
        assert!(fetched.is_valid());
        assert_eq!(fetched.fields.deadline, NOW + 10);
        assert_eq!(fetched.fields.ticket_price, 25);
    }

    #[tokio::test]
    async fn unparsable_deadline_invalidates() {
        let (ledger, fetcher, id) = setup();
        ledger.set_raw_number(&id, FieldName::Deadline, LedgerUint::Encoded("soon".into()));
        let fetched = fetcher.fetch(&id).await;
        assert_eq!(
            fetched.validity,
            Err(InvalidReason::UnparsableTimestamp("soon".into()))
        );
        assert_eq!(fetched.fields.deadline, 0);
    }

    #[tokio::test]
    async fn unreachable_record_fails_every_field() {
        let (ledger, fetcher, id) = setup();
        ledger.make_unreachable(&id);
        let fetched = fetcher.fetch(&id).await;
        assert!(!fetched.is_valid());
        assert_eq!(fetched.field_errors.len(), FieldName::ALL.len());
    }

    #[tokio::test]
    async fn slow_field_times_out() {
        let (ledger, _fetcher, id) = setup();
        ledger.set_read_latency(&id, Duration::from_millis(200));
        let fetcher = RecordFetcher::new(ledger.clone(), RetryPolicy::none(), Duration::from_millis(20));
        let fetched = fetcher.fetch(&id).await;
        assert!(!fetched.is_valid());
        assert!(fetched
            .field_errors
            .iter()
            .all(|err| err.source == LedgerError::Timeout));
    }
}
