use crate::error::{InvalidReason, ReconcileError};
use crate::fetcher::{FetchedRecord, RecordFetcher};
use crate::lifecycle;
use crate::snapshot::{ExcludedRecord, RecordEntry, Snapshot};
use core_types::retry::RetryPolicy;
use core_types::{CallerContext, Identity, RecordId};
use futures::{stream, FutureExt, StreamExt};
use ledger_client::{LedgerError, LedgerReader};
use log::{debug, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Fans record fetches out over a registry listing and joins them into a [`Snapshot`].
pub struct Reconciler {
    reader: Arc<dyn LedgerReader>,
    fetcher: RecordFetcher,
    retry: RetryPolicy,
    max_concurrency: usize,
}

impl Reconciler {
    pub fn new(
        reader: Arc<dyn LedgerReader>,
        retry: RetryPolicy,
        field_timeout: Duration,
        max_concurrency: usize,
    ) -> Self {
        Self {
            fetcher: RecordFetcher::new(Arc::clone(&reader), retry.clone(), field_timeout),
            reader,
            retry,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Current registry listing, read once per pass. Transient failures are retried.
    pub async fn list_identifiers(&self) -> Result<Vec<RecordId>, ReconcileError> {
        let reader = &self.reader;
        self.retry
            .retry_async_when(move |_| reader.list_records(), LedgerError::is_transient)
            .await
            .map_err(ReconcileError::Registry)
    }

    /// Fetch and derive every listed record. Per-record failures only shrink the
    /// result; the snapshot is returned once every record has settled.
    pub async fn reconcile(&self, ids: &[RecordId], caller: &CallerContext) -> Snapshot {
        let now = caller.now();
        let ids = normalize_identifiers(ids);
        let fetcher = &self.fetcher;
        let fetched: Vec<FetchedRecord> = stream::iter(ids)
            .map(|id| async move { fetcher.fetch(&id).await }.boxed())
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut records = Vec::with_capacity(fetched.len());
        let mut excluded = Vec::new();
        for record in fetched {
            match into_entry(record, now, &caller.caller) {
                Ok(entry) => records.push(entry),
                Err(skip) => {
                    warn!("[{}] excluded: {}", skip.id.short(), skip.reason);
                    excluded.push(skip);
                }
            }
        }
        debug!(
            "reconciled {} records ({} excluded) for {}",
            records.len(),
            excluded.len(),
            caller.caller.short()
        );
        Snapshot::new(caller.caller.clone(), now, records, excluded)
    }

    /// Fetch and derive a single record outside a full pass.
    pub async fn reconcile_one(
        &self,
        id: &RecordId,
        caller: &CallerContext,
    ) -> Result<RecordEntry, InvalidReason> {
        let fetched = self.fetcher.fetch(id).await;
        into_entry(fetched, caller.now(), &caller.caller).map_err(|skip| skip.reason)
    }
}

fn into_entry(
    record: FetchedRecord,
    now: i64,
    caller: &Identity,
) -> Result<RecordEntry, ExcludedRecord> {
    if let Err(reason) = record.validity {
        return Err(ExcludedRecord {
            id: record.id,
            reason,
        });
    }
    let derived = lifecycle::derive(&record.fields, now, caller);
    Ok(RecordEntry {
        id: record.id,
        fields: record.fields,
        status: derived.status,
        roles: derived.roles,
        eligibility: derived.eligibility,
    })
}

/// Drops placeholder ids and repeats, keeping first-seen order.
pub fn normalize_identifiers(ids: &[RecordId]) -> Vec<RecordId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter()
        .filter(|id| !id.is_placeholder())
        .filter(|id| seen.insert((*id).clone()))
        .cloned()
        .collect()
}
