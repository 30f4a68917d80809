//! Lifecycle derivation. Pure and synchronous: fields + time + caller in,
//! status / roles / eligibility out.
//!
//! ```text
//! Open --(deadline passes)--> ClosedPendingWinner --(winner selected)--> CompletedUnclaimed
//!                                                        --(prize claimed)--> CompletedClaimed
//! ```
//! There is no path back to `Open`; `CompletedClaimed` is terminal.

use core_types::{EligibilityFlags, Identity, LifecycleStatus, RecordFields, RoleFlags};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derivation {
    /// `None` when the deadline was never fetched; such records appear in no view.
    pub status: Option<LifecycleStatus>,
    pub roles: RoleFlags,
    pub eligibility: EligibilityFlags,
}

/// Status as a function of (deadline, winner, claimed, now) only.
pub fn derive_status(
    deadline: i64,
    winner: &Identity,
    claimed: bool,
    now: i64,
) -> Option<LifecycleStatus> {
    if deadline == 0 {
        return None;
    }
    let status = if winner.is_set() {
        if claimed {
            LifecycleStatus::CompletedClaimed
        } else {
            LifecycleStatus::CompletedUnclaimed
        }
    } else if now >= deadline {
        LifecycleStatus::ClosedPendingWinner
    } else {
        LifecycleStatus::Open
    };
    Some(status)
}

pub fn derive_roles(fields: &RecordFields, caller: &Identity) -> RoleFlags {
    if caller.is_sentinel() {
        return RoleFlags::default();
    }
    RoleFlags {
        is_manager: fields.manager == *caller,
        is_participant: fields.participants.iter().any(|p| p == caller),
        is_winner: fields.winner.is_set() && fields.winner == *caller,
    }
}

pub fn derive_eligibility(
    fields: &RecordFields,
    status: Option<LifecycleStatus>,
    roles: RoleFlags,
) -> EligibilityFlags {
    let Some(status) = status else {
        return EligibilityFlags::default();
    };
    EligibilityFlags {
        can_buy_ticket: status == LifecycleStatus::Open && !roles.is_participant,
        can_select_winner: roles.is_manager
            && status == LifecycleStatus::ClosedPendingWinner
            && !fields.participants.is_empty(),
        can_claim_prize: roles.is_winner && status == LifecycleStatus::CompletedUnclaimed,
    }
}

pub fn derive(fields: &RecordFields, now: i64, caller: &Identity) -> Derivation {
    let status = derive_status(fields.deadline, &fields.winner, fields.claimed, now);
    let roles = derive_roles(fields, caller);
    Derivation {
        status,
        roles,
        eligibility: derive_eligibility(fields, status, roles),
    }
}

fn rank(status: LifecycleStatus) -> u8 {
    match status {
        LifecycleStatus::Open => 0,
        LifecycleStatus::ClosedPendingWinner => 1,
        LifecycleStatus::CompletedUnclaimed => 2,
        LifecycleStatus::CompletedClaimed => 3,
    }
}

/// Whether `next` can follow `prev` between two observations. Passes may skip
/// intermediate states but never move backwards.
pub fn is_forward(prev: LifecycleStatus, next: LifecycleStatus) -> bool {
    rank(next) >= rank(prev)
}
