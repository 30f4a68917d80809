// Copyright (c) James Kassemi, SC, US. All rights reserved.

use crate::error::{ActionError, ReconcileError};
use crate::gateway::{ActionGateway, ActionKind, ActionOutcome, CreateOutcome, RecordDraft};
use crate::lifecycle;
use crate::reconciler::Reconciler;
use crate::snapshot::Snapshot;
use crate::triggers::{ReconcileTrigger, TriggerEffect};
use crate::views::{self, FilterMode, WinnerEntry};
use core_types::config::AppConfig;
use core_types::retry::RetryPolicy;
use core_types::status::{OverallStatus, ServiceStatusHandle, StatusGauge};
use core_types::{CallerContext, Clock, Identity, RecordId};
use ledger_client::{IdentityProvider, LedgerReader, LedgerWriter};
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

pub(crate) const SERVICE_NAME: &str = "lottery_reconciler";

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub admin: Option<Identity>,
    /// A published snapshot older than this is not trusted for pre-action checks.
    pub snapshot_max_age: Duration,
    pub max_concurrent_records: usize,
    pub field_timeout: Duration,
    pub retry: RetryPolicy,
}

impl EngineSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            admin: cfg.admin(),
            snapshot_max_age: cfg.engine.snapshot_max_age(),
            max_concurrent_records: cfg.engine.max_concurrent_records,
            field_timeout: cfg.engine.field_timeout(),
            retry: RetryPolicy::from_config(&cfg.retry),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// A snapshot together with the pass that produced it.
#[derive(Debug)]
pub struct PublishedSnapshot {
    pub generation: u64,
    pub published_at: Instant,
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone)]
pub enum PassOutcome {
    Published(Arc<PublishedSnapshot>),
    /// A pass started later already published; this result was dropped.
    Superseded { generation: u64 },
}

impl PassOutcome {
    pub fn published(&self) -> Option<&Arc<PublishedSnapshot>> {
        match self {
            PassOutcome::Published(published) => Some(published),
            PassOutcome::Superseded { .. } => None,
        }
    }
}

/// Owns the current snapshot and serializes its replacement.
///
/// Every pass gets a generation number when it starts. A finished pass is published
/// only if no pass with a higher generation has been published already, so at most
/// one snapshot is current and a slow, older pass can never overwrite a newer one.
pub struct LotteryEngine {
    reconciler: Reconciler,
    gateway: ActionGateway,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    admin: Option<Identity>,
    filter: RwLock<FilterMode>,
    published: watch::Sender<Option<Arc<PublishedSnapshot>>>,
    next_generation: AtomicU64,
    discarded: AtomicU64,
    status: ServiceStatusHandle,
}

impl LotteryEngine {
    pub fn new(
        reader: Arc<dyn LedgerReader>,
        writer: Arc<dyn LedgerWriter>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        let (published, _rx) = watch::channel(None);
        Self {
            reconciler: Reconciler::new(
                reader,
                settings.retry,
                settings.field_timeout,
                settings.max_concurrent_records,
            ),
            gateway: ActionGateway::new(writer, settings.snapshot_max_age),
            identity,
            clock,
            admin: settings.admin,
            filter: RwLock::new(FilterMode::default()),
            published,
            next_generation: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            status: ServiceStatusHandle::new(SERVICE_NAME),
        }
    }

    /// Caller as of right now, read from the identity provider.
    pub fn caller_context(&self) -> CallerContext {
        CallerContext::new(
            self.identity.current(),
            self.admin.as_ref(),
            Arc::clone(&self.clock),
        )
    }

    pub fn identity_changes(&self) -> watch::Receiver<Identity> {
        self.identity.subscribe()
    }

    pub fn snapshot(&self) -> Option<Arc<PublishedSnapshot>> {
        self.published.borrow().clone()
    }

    /// Notified on every publication.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<PublishedSnapshot>>> {
        self.published.subscribe()
    }

    pub fn filter(&self) -> FilterMode {
        *self.filter.read()
    }

    /// Filtered ids from the current snapshot, evaluated for the identity the
    /// snapshot was built for. Empty until the first publication.
    pub fn filtered_view(&self, mode: FilterMode) -> Vec<RecordId> {
        self.snapshot()
            .map(|p| views::filtered_view(&p.snapshot, mode, p.snapshot.caller()))
            .unwrap_or_default()
    }

    pub fn current_view(&self) -> Vec<RecordId> {
        self.filtered_view(self.filter())
    }

    pub fn winners_feed(&self) -> Vec<WinnerEntry> {
        self.snapshot()
            .map(|p| views::winners_feed(&p.snapshot))
            .unwrap_or_default()
    }

    pub fn managed_records(&self) -> Vec<RecordId> {
        self.snapshot()
            .map(|p| views::managed_records(&p.snapshot, p.snapshot.caller()))
            .unwrap_or_default()
    }

    pub fn discarded_passes(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    pub fn status_handle(&self) -> ServiceStatusHandle {
        self.status.clone()
    }

    pub async fn handle(
        &self,
        trigger: ReconcileTrigger,
    ) -> Result<Option<PassOutcome>, ReconcileError> {
        debug!("trigger: {trigger}");
        if let ReconcileTrigger::FilterChanged(mode) = &trigger {
            *self.filter.write() = *mode;
        }
        match trigger.effect() {
            TriggerEffect::RecomputeView => Ok(None),
            TriggerEffect::RecomputeSnapshot => self.refresh().await.map(Some),
        }
    }

    /// One full pass: list, fetch, derive, publish. A failed listing leaves the
    /// current snapshot in place.
    pub async fn refresh(&self) -> Result<PassOutcome, ReconcileError> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let caller = self.caller_context();
        let started = Instant::now();

        let ids = match self.reconciler.list_identifiers().await {
            Ok(ids) => ids,
            Err(err) if self.published_after(generation) => {
                debug!("pass #{generation} failed after a newer pass published: {err}");
                return Err(err);
            }
            Err(err) => {
                error!("pass #{generation} aborted: {err}");
                self.status.set_overall(OverallStatus::Crit);
                self.status.push_error(err.to_string());
                return Err(err);
            }
        };
        let snapshot = self.reconciler.reconcile(&ids, &caller).await;
        let candidate = Arc::new(PublishedSnapshot {
            generation,
            published_at: Instant::now(),
            snapshot,
        });

        let mut previous = None;
        let accepted = self.published.send_if_modified(|slot| {
            let newer = slot
                .as_ref()
                .map_or(true, |current| current.generation < generation);
            if newer {
                previous = slot.replace(Arc::clone(&candidate));
            }
            newer
        });
        if !accepted {
            let total = self.discarded.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("pass #{generation} superseded; discarded ({total} total)");
            return Ok(PassOutcome::Superseded { generation });
        }

        if let Some(previous) = previous.as_deref() {
            warn_on_regressions(&previous.snapshot, &candidate.snapshot);
        }
        let elapsed = started.elapsed();
        self.record_status(&candidate.snapshot, elapsed);
        info!(
            "snapshot #{generation} published for {} in {}ms: {}",
            candidate.snapshot.caller().short(),
            elapsed.as_millis(),
            candidate.snapshot.summary()
        );
        Ok(PassOutcome::Published(candidate))
    }

    /// Gate, submit once, then rebuild the snapshot. The refresh is best effort:
    /// the write already went through.
    pub async fn submit_action(
        &self,
        kind: ActionKind,
        id: &RecordId,
    ) -> Result<ActionOutcome, ActionError> {
        let caller = self.caller_context();
        let current = self.snapshot();
        let mut outcome = self
            .gateway
            .submit(kind, id, &caller, current.as_deref(), &self.reconciler)
            .await?;
        if let Err(err) = self.handle(ReconcileTrigger::ActionCompleted(kind)).await {
            warn!("refresh after {kind} failed: {err}");
        }
        if kind == ActionKind::SelectWinner && outcome.winner.is_none() {
            outcome.winner = self
                .snapshot()
                .and_then(|p| p.snapshot.get(id).map(|entry| entry.fields.winner.clone()))
                .filter(Identity::is_set);
        }
        Ok(outcome)
    }

    pub async fn create_record(&self, draft: &RecordDraft) -> Result<CreateOutcome, ActionError> {
        let caller = self.caller_context();
        let outcome = self.gateway.create_record(draft, &caller).await?;
        if let Err(err) = self.handle(ReconcileTrigger::IdentifiersChanged).await {
            warn!("refresh after create_record failed: {err}");
        }
        Ok(outcome)
    }

    fn published_after(&self, generation: u64) -> bool {
        self.published
            .borrow()
            .as_ref()
            .is_some_and(|current| current.generation > generation)
    }

    fn record_status(&self, snapshot: &Snapshot, elapsed: Duration) {
        let summary = snapshot.summary();
        self.status.clear_errors();
        self.status
            .clear_warnings_matching(|w| w.starts_with("excluded"));
        if summary.excluded > 0 {
            self.status.set_overall(OverallStatus::Warn);
            self.status
                .push_warning(format!("excluded {} invalid records", summary.excluded));
        } else {
            self.status.set_overall(OverallStatus::Ok);
        }
        self.status.set_gauges(vec![
            StatusGauge::new("Valid records", summary.valid as f64),
            StatusGauge::new("Excluded records", summary.excluded as f64),
            StatusGauge::new("Open", summary.open as f64),
            StatusGauge::new("Pending winner", summary.closed_pending as f64),
            StatusGauge::new("Unclaimed", summary.completed_unclaimed as f64),
            StatusGauge::new("Claimed", summary.completed_claimed as f64),
            StatusGauge::new("Discarded passes", self.discarded_passes() as f64),
            StatusGauge::new("Last pass", elapsed.as_millis() as f64).with_unit("ms"),
        ]);
    }
}

fn warn_on_regressions(previous: &Snapshot, next: &Snapshot) {
    for entry in next.records() {
        let Some(before) = previous.get(&entry.id) else {
            continue;
        };
        if let (Some(prev), Some(now)) = (before.status, entry.status) {
            if !lifecycle::is_forward(prev, now) {
                warn!(
                    "[{}] status went backwards: {} -> {}",
                    entry.id.short(),
                    prev,
                    now
                );
            }
        }
    }
}
