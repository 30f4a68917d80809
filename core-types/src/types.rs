// Copyright (c) James Kassemi, SC, US. All rights reserved.

use crate::clock::Clock;
use crate::identity::Identity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Ledger amount in the smallest currency unit (wei).
pub type Amount = u128;

/// Decimals of the native currency.
pub const NATIVE_DECIMALS: u32 = 18;

/// The eight per-record fields read from the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    DisplayName,
    TicketPrice,
    Deadline,
    PrizeAmount,
    Manager,
    Winner,
    Participants,
    Claimed,
}

impl FieldName {
    pub const ALL: [FieldName; 8] = [
        FieldName::DisplayName,
        FieldName::TicketPrice,
        FieldName::Deadline,
        FieldName::PrizeAmount,
        FieldName::Manager,
        FieldName::Winner,
        FieldName::Participants,
        FieldName::Claimed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::DisplayName => "name",
            FieldName::TicketPrice => "ticket_price",
            FieldName::Deadline => "deadline",
            FieldName::PrizeAmount => "prize",
            FieldName::Manager => "manager",
            FieldName::Winner => "winner",
            FieldName::Participants => "participants",
            FieldName::Claimed => "claimed",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized field set for one record. Every field carries its default when the
/// corresponding read failed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordFields {
    pub display_name: String,
    pub ticket_price: Amount,
    /// Unix seconds; zero means "never fetched".
    pub deadline: i64,
    pub prize_amount: Amount,
    pub manager: Identity,
    pub winner: Identity,
    pub participants: Vec<Identity>,
    pub claimed: bool,
}

impl RecordFields {
    pub fn has_winner(&self) -> bool {
        self.winner.is_set()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleStatus {
    Open,
    ClosedPendingWinner,
    CompletedUnclaimed,
    CompletedClaimed,
}

impl LifecycleStatus {
    pub fn label(&self) -> &'static str {
        match self {
            LifecycleStatus::Open => "Open - Accepting Tickets",
            LifecycleStatus::ClosedPendingWinner => "Closed - Pending Winner Selection",
            LifecycleStatus::CompletedUnclaimed => "Completed - Prize Available",
            LifecycleStatus::CompletedClaimed => "Completed - Prize Claimed",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, LifecycleStatus::Open)
    }

    pub fn is_completed(&self) -> bool {
        matches!(
            self,
            LifecycleStatus::CompletedUnclaimed | LifecycleStatus::CompletedClaimed
        )
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoleFlags {
    pub is_manager: bool,
    pub is_participant: bool,
    pub is_winner: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EligibilityFlags {
    pub can_buy_ticket: bool,
    pub can_select_winner: bool,
    pub can_claim_prize: bool,
}

/// Who is looking at the ledger and when. Rebuilt for every reconciliation pass.
#[derive(Clone)]
pub struct CallerContext {
    pub caller: Identity,
    pub is_global_admin: bool,
    clock: Arc<dyn Clock>,
}

impl CallerContext {
    /// `admin` is the configured global admin identity, if any.
    pub fn new(caller: Identity, admin: Option<&Identity>, clock: Arc<dyn Clock>) -> Self {
        let is_global_admin = caller.is_set() && admin.is_some_and(|admin| *admin == caller);
        Self {
            caller,
            is_global_admin,
            clock,
        }
    }

    pub fn now(&self) -> i64 {
        self.clock.now_unix()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }
}

impl fmt::Debug for CallerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallerContext")
            .field("caller", &self.caller)
            .field("is_global_admin", &self.is_global_admin)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("empty amount")]
    Empty,
    #[error("invalid amount '{0}'")]
    Invalid(String),
    #[error("amount '{0}' has more than {1} decimal places")]
    TooPrecise(String, u32),
    #[error("amount '{0}' overflows")]
    Overflow(String),
}

/// Render a smallest-unit amount as a decimal string, trimming trailing zeros.
pub fn format_units(amount: Amount, decimals: u32) -> String {
    let scale = 10u128.pow(decimals);
    let whole = amount / scale;
    let frac = amount % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Parse a decimal string such as `"0.01"` into smallest units.
pub fn parse_units(raw: &str, decimals: u32) -> Result<Amount, AmountError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AmountError::Empty);
    }
    let (whole, frac) = match raw.split_once('.') {
        Some((w, f)) => (w, f),
        None => (raw, ""),
    };
    let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !digits_only(whole) || !digits_only(frac) {
        return Err(AmountError::Invalid(raw.to_string()));
    }
    if frac.len() > decimals as usize {
        return Err(AmountError::TooPrecise(raw.to_string(), decimals));
    }
    let overflow = || AmountError::Overflow(raw.to_string());
    let whole: Amount = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };
    let frac_value: Amount = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = decimals as usize);
        padded.parse().map_err(|_| overflow())?
    };
    whole
        .checked_mul(10u128.pow(decimals))
        .and_then(|w| w.checked_add(frac_value))
        .ok_or_else(overflow)
}
