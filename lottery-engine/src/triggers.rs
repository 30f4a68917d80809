use crate::gateway::ActionKind;
use crate::views::FilterMode;
use core_types::Identity;
use std::fmt;

/// Events that can cause a reconciliation pass or a view refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileTrigger {
    Timer,
    /// The registry listing may have changed (e.g. after a record was created).
    IdentifiersChanged,
    IdentityChanged(Identity),
    FilterChanged(FilterMode),
    ActionCompleted(ActionKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEffect {
    /// Full pass: list, fetch every record, derive, publish.
    RecomputeSnapshot,
    /// Re-filter the current snapshot without touching the ledger.
    RecomputeView,
}

impl ReconcileTrigger {
    pub fn effect(&self) -> TriggerEffect {
        match self {
            ReconcileTrigger::FilterChanged(_) => TriggerEffect::RecomputeView,
            ReconcileTrigger::Timer
            | ReconcileTrigger::IdentifiersChanged
            | ReconcileTrigger::IdentityChanged(_)
            | ReconcileTrigger::ActionCompleted(_) => TriggerEffect::RecomputeSnapshot,
        }
    }
}

impl fmt::Display for ReconcileTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileTrigger::Timer => f.write_str("timer"),
            ReconcileTrigger::IdentifiersChanged => f.write_str("identifiers changed"),
            ReconcileTrigger::IdentityChanged(id) => write!(f, "identity changed to {}", id.short()),
            ReconcileTrigger::FilterChanged(mode) => write!(f, "filter changed to {mode}"),
            ReconcileTrigger::ActionCompleted(kind) => write!(f, "{kind} completed"),
        }
    }
}
