//! Named sub-views derived from a published [`Snapshot`]. None of these touch the ledger.

use crate::snapshot::Snapshot;
use core_types::types::{format_units, NATIVE_DECIMALS};
use core_types::{Amount, Identity, LifecycleStatus, RecordId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    All,
    Open,
    Closed,
}

impl FilterMode {
    fn admits(&self, status: LifecycleStatus) -> bool {
        match self {
            FilterMode::All => true,
            FilterMode::Open => status == LifecycleStatus::Open,
            FilterMode::Closed => status != LifecycleStatus::Open,
        }
    }
}

impl FromStr for FilterMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "all" => Ok(FilterMode::All),
            "open" => Ok(FilterMode::Open),
            "closed" => Ok(FilterMode::Closed),
            other => Err(format!("unknown filter mode '{other}' (expected all|open|closed)")),
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FilterMode::All => "all",
            FilterMode::Open => "open",
            FilterMode::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// Records visible under `mode`, in snapshot order. A record managed by `viewer`
/// is always included; records with an indeterminate status never are.
pub fn filtered_view(snapshot: &Snapshot, mode: FilterMode, viewer: &Identity) -> Vec<RecordId> {
    snapshot
        .records()
        .iter()
        .filter_map(|entry| {
            let status = entry.status?;
            let managed = viewer.is_set() && entry.fields.manager == *viewer;
            (managed || mode.admits(status)).then(|| entry.id.clone())
        })
        .collect()
}

/// Records the viewer manages (the admin panel list).
pub fn managed_records(snapshot: &Snapshot, viewer: &Identity) -> Vec<RecordId> {
    if viewer.is_sentinel() {
        return Vec::new();
    }
    snapshot
        .records()
        .iter()
        .filter(|entry| entry.status.is_some() && entry.fields.manager == *viewer)
        .map(|entry| entry.id.clone())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerEntry {
    pub record: RecordId,
    pub display_name: String,
    pub winner: Identity,
    pub prize_amount: Amount,
    pub claimed: bool,
    pub deadline: i64,
}

impl WinnerEntry {
    pub fn prize_display(&self) -> String {
        format_units(self.prize_amount, NATIVE_DECIMALS)
    }
}

impl fmt::Display for WinnerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} won {} ETH ({})",
            self.display_name,
            self.winner.short(),
            self.prize_display(),
            if self.claimed { "claimed" } else { "unclaimed" }
        )
    }
}

/// Resolved records, most recent first. The ledger exposes no resolution time, so
/// recency is approximated by reverse registry order.
pub fn winners_feed(snapshot: &Snapshot) -> Vec<WinnerEntry> {
    snapshot
        .records()
        .iter()
        .rev()
        .filter(|entry| entry.status.is_some() && entry.fields.has_winner())
        .map(|entry| WinnerEntry {
            record: entry.id.clone(),
            display_name: entry.fields.display_name.clone(),
            winner: entry.fields.winner.clone(),
            prize_amount: entry.fields.prize_amount,
            claimed: entry.fields.claimed,
            deadline: entry.fields.deadline,
        })
        .collect()
}
