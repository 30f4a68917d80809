//! Client-side gate in front of ledger writes.
//!
//! Eligibility is re-derived from the freshest record data available right before
//! a write: the published snapshot when it is recent and was built for the same
//! caller, otherwise a single-record fetch. Writes are submitted exactly once.

use crate::engine::PublishedSnapshot;
use crate::error::{ActionError, PreconditionError, SubmissionError};
use crate::lifecycle;
use crate::reconciler::Reconciler;
use crate::snapshot::RecordEntry;
use core_types::types::{parse_units, NATIVE_DECIMALS};
use core_types::{Amount, CallerContext, Identity, RecordFields, RecordId};
use ledger_client::{CreateRecordRequest, LedgerWriter, TxReceipt};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    BuyTicket,
    SelectWinner,
    ClaimPrize,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::BuyTicket => "buy_ticket",
            ActionKind::SelectWinner => "select_winner",
            ActionKind::ClaimPrize => "claim_prize",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub kind: ActionKind,
    pub record: RecordId,
    /// Set for a winner selection, read from the ledger's announcement.
    pub winner: Option<Identity>,
    pub receipt: TxReceipt,
}

/// Admin-panel input for a new record; the deadline is relative to submission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDraft {
    pub name: String,
    pub ticket_price: Amount,
    pub duration_s: i64,
    pub prize: Amount,
}

impl RecordDraft {
    /// Build from form strings: prices in whole-currency decimals, duration in seconds.
    pub fn from_form(
        name: &str,
        ticket_price: &str,
        duration_s: &str,
        prize: &str,
    ) -> Result<Self, PreconditionError> {
        let invalid = |what: &str, err: String| {
            PreconditionError::InvalidRequest(format!("{what}: {err}"))
        };
        Ok(Self {
            name: name.trim().to_string(),
            ticket_price: parse_units(ticket_price, NATIVE_DECIMALS)
                .map_err(|err| invalid("ticket price", err.to_string()))?,
            duration_s: duration_s
                .trim()
                .parse()
                .map_err(|_| invalid("duration", format!("'{}' is not a number", duration_s.trim())))?,
            prize: parse_units(prize, NATIVE_DECIMALS)
                .map_err(|err| invalid("prize", err.to_string()))?,
        })
    }

    fn validate(&self) -> Result<(), PreconditionError> {
        let problem = if self.name.trim().is_empty() {
            Some("name is required")
        } else if self.ticket_price == 0 {
            Some("ticket price must be positive")
        } else if self.duration_s <= 0 {
            Some("duration must be positive")
        } else if self.prize == 0 {
            Some("prize must be positive")
        } else {
            None
        };
        match problem {
            Some(msg) => Err(PreconditionError::InvalidRequest(msg.to_string())),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    /// Taken from the creation event; `None` if the ledger emitted none.
    pub record: Option<RecordId>,
    pub deadline: i64,
    pub receipt: TxReceipt,
}

pub struct ActionGateway {
    writer: Arc<dyn LedgerWriter>,
    max_age: Duration,
}

impl ActionGateway {
    pub fn new(writer: Arc<dyn LedgerWriter>, max_age: Duration) -> Self {
        Self { writer, max_age }
    }

    pub async fn submit(
        &self,
        kind: ActionKind,
        id: &RecordId,
        caller: &CallerContext,
        current: Option<&PublishedSnapshot>,
        reconciler: &Reconciler,
    ) -> Result<ActionOutcome, ActionError> {
        if caller.caller.is_sentinel() {
            return Err(PreconditionError::NoIdentity.into());
        }
        let fields = self.latest_fields(id, caller, current, reconciler).await?;
        let entry = rederive(id, fields, caller);
        check_eligibility(kind, &entry)?;

        let from = &caller.caller;
        let submitted = match kind {
            ActionKind::BuyTicket => {
                self.writer
                    .buy_ticket(from, id, entry.fields.ticket_price)
                    .await
            }
            ActionKind::SelectWinner => self.writer.select_winner(from, id).await,
            ActionKind::ClaimPrize => self.writer.claim_prize(from, id).await,
        };
        match submitted {
            Ok(receipt) => {
                info!("[{}] {} submitted by {}", id.short(), kind, from.short());
                let winner = receipt.selected_winner().cloned();
                if let Some(winner) = &winner {
                    info!("[{}] winner announced: {}", id.short(), winner);
                }
                Ok(ActionOutcome {
                    kind,
                    record: id.clone(),
                    winner,
                    receipt,
                })
            }
            Err(err) => {
                error!("[{}] {} failed: {}", id.short(), kind, err);
                Err(SubmissionError::new(kind.as_str(), err).into())
            }
        }
    }

    pub async fn create_record(
        &self,
        draft: &RecordDraft,
        caller: &CallerContext,
    ) -> Result<CreateOutcome, ActionError> {
        if caller.caller.is_sentinel() {
            return Err(PreconditionError::NoIdentity.into());
        }
        if !caller.is_global_admin {
            return Err(PreconditionError::NotAdmin.into());
        }
        draft.validate()?;
        let deadline = caller.now().saturating_add(draft.duration_s);
        let request = CreateRecordRequest {
            name: draft.name.trim().to_string(),
            ticket_price: draft.ticket_price,
            deadline,
            prize: draft.prize,
        };
        match self
            .writer
            .create_record(&caller.caller, &request, draft.prize)
            .await
        {
            Ok(receipt) => {
                let record = receipt.created_record().cloned();
                match &record {
                    Some(id) => info!("created lottery '{}' at {}", request.name, id),
                    None => info!("created lottery '{}' (no creation event)", request.name),
                }
                Ok(CreateOutcome {
                    record,
                    deadline,
                    receipt,
                })
            }
            Err(err) => {
                error!("create_record '{}' failed: {}", request.name, err);
                Err(SubmissionError::new("create_record", err).into())
            }
        }
    }

    async fn latest_fields(
        &self,
        id: &RecordId,
        caller: &CallerContext,
        current: Option<&PublishedSnapshot>,
        reconciler: &Reconciler,
    ) -> Result<RecordFields, PreconditionError> {
        if let Some(published) = current {
            let fresh = published.published_at.elapsed() <= self.max_age
                && published.snapshot.caller() == &caller.caller;
            if fresh {
                if let Some(entry) = published.snapshot.get(id) {
                    return Ok(entry.fields.clone());
                }
            }
        }
        debug!("[{}] snapshot stale or missing record; refetching", id.short());
        reconciler
            .reconcile_one(id, caller)
            .await
            .map(|entry| entry.fields)
            .map_err(|_| PreconditionError::UnknownRecord(id.clone()))
    }
}

fn rederive(id: &RecordId, fields: RecordFields, caller: &CallerContext) -> RecordEntry {
    let derived = lifecycle::derive(&fields, caller.now(), &caller.caller);
    RecordEntry {
        id: id.clone(),
        fields,
        status: derived.status,
        roles: derived.roles,
        eligibility: derived.eligibility,
    }
}

fn check_eligibility(kind: ActionKind, entry: &RecordEntry) -> Result<(), PreconditionError> {
    use core_types::LifecycleStatus as S;

    let flags = entry.eligibility;
    let allowed = match kind {
        ActionKind::BuyTicket => flags.can_buy_ticket,
        ActionKind::SelectWinner => flags.can_select_winner,
        ActionKind::ClaimPrize => flags.can_claim_prize,
    };
    if allowed {
        return Ok(());
    }
    let reason = match (kind, entry.status) {
        (_, None) => "lottery status is unknown",
        (ActionKind::BuyTicket, Some(S::Open)) => "already holds a ticket",
        (ActionKind::BuyTicket, Some(_)) => "lottery is closed",
        (ActionKind::SelectWinner, _) if !entry.roles.is_manager => {
            "only the manager can select a winner"
        }
        (ActionKind::SelectWinner, Some(S::Open)) => "deadline has not passed",
        (ActionKind::SelectWinner, Some(S::ClosedPendingWinner)) => "no participants",
        (ActionKind::SelectWinner, Some(_)) => "winner already selected",
        (ActionKind::ClaimPrize, Some(S::CompletedClaimed)) => "prize already claimed",
        (ActionKind::ClaimPrize, Some(S::CompletedUnclaimed)) => "only the winner can claim",
        (ActionKind::ClaimPrize, Some(_)) => "no winner selected yet",
    };
    Err(PreconditionError::NotEligible {
        action: kind,
        record: entry.id.clone(),
        reason,
    })
}
