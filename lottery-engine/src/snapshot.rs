use crate::error::InvalidReason;
use core_types::{EligibilityFlags, Identity, LifecycleStatus, RecordFields, RecordId, RoleFlags};

/// One valid record as seen by one caller at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    pub id: RecordId,
    pub fields: RecordFields,
    pub status: Option<LifecycleStatus>,
    pub roles: RoleFlags,
    pub eligibility: EligibilityFlags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedRecord {
    pub id: RecordId,
    pub reason: InvalidReason,
}

/// Complete result of one reconciliation pass. Built once, never patched.
/// Record order follows the (deduplicated) registry listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    caller: Identity,
    evaluated_at: i64,
    records: Vec<RecordEntry>,
    excluded: Vec<ExcludedRecord>,
}

impl Snapshot {
    pub fn new(
        caller: Identity,
        evaluated_at: i64,
        records: Vec<RecordEntry>,
        excluded: Vec<ExcludedRecord>,
    ) -> Self {
        Self {
            caller,
            evaluated_at,
            records,
            excluded,
        }
    }

    /// Identity the roles and eligibility flags were computed for.
    pub fn caller(&self) -> &Identity {
        &self.caller
    }

    /// Unix time the statuses were derived against.
    pub fn evaluated_at(&self) -> i64 {
        self.evaluated_at
    }

    pub fn records(&self) -> &[RecordEntry] {
        &self.records
    }

    pub fn excluded(&self) -> &[ExcludedRecord] {
        &self.excluded
    }

    pub fn get(&self, id: &RecordId) -> Option<&RecordEntry> {
        self.records.iter().find(|entry| entry.id == *id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn summary(&self) -> SnapshotSummary {
        let mut summary = SnapshotSummary {
            valid: self.records.len(),
            excluded: self.excluded.len(),
            ..SnapshotSummary::default()
        };
        for entry in &self.records {
            match entry.status {
                Some(LifecycleStatus::Open) => summary.open += 1,
                Some(LifecycleStatus::ClosedPendingWinner) => summary.closed_pending += 1,
                Some(LifecycleStatus::CompletedUnclaimed) => summary.completed_unclaimed += 1,
                Some(LifecycleStatus::CompletedClaimed) => summary.completed_claimed += 1,
                None => summary.indeterminate += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotSummary {
    pub valid: usize,
    pub excluded: usize,
    pub open: usize,
    pub closed_pending: usize,
    pub completed_unclaimed: usize,
    pub completed_claimed: usize,
    pub indeterminate: usize,
}

impl std::fmt::Display for SnapshotSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "valid={} excluded={} open={} pending_winner={} unclaimed={} claimed={}",
            self.valid,
            self.excluded,
            self.open,
            self.closed_pending,
            self.completed_unclaimed,
            self.completed_claimed
        )
    }
}
