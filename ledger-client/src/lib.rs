// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Ledger interfaces consumed by the reconciler.
//!
//! - [`LedgerReader`]: per-record field accessors and the registry listing.
//! - [`LedgerWriter`]: the four state-changing calls, submitted on behalf of a signer.
//! - [`IdentityProvider`]: the wallet's current account plus change notifications.
//!
//! [`MemoryLedger`] and [`MemoryWallet`] implement all three in process with the same
//! acceptance rules as the on-ledger contract, plus fault injection for tests.

mod error;
mod memory;
mod value;
mod wallet;

pub use error::{LedgerError, LedgerResult};
pub use memory::{MemoryLedger, RecordSeed};
pub use value::LedgerUint;
pub use wallet::MemoryWallet;

use core_types::{Amount, Identity, RecordId};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[async_trait::async_trait]
pub trait LedgerReader: Send + Sync {
    /// Every record id the factory registry has issued, in issue order.
    async fn list_records(&self) -> LedgerResult<Vec<RecordId>>;
    async fn name(&self, id: &RecordId) -> LedgerResult<String>;
    async fn ticket_price(&self, id: &RecordId) -> LedgerResult<LedgerUint>;
    async fn deadline(&self, id: &RecordId) -> LedgerResult<LedgerUint>;
    async fn prize(&self, id: &RecordId) -> LedgerResult<LedgerUint>;
    async fn manager(&self, id: &RecordId) -> LedgerResult<Identity>;
    /// The zero address until a winner has been selected.
    async fn winner(&self, id: &RecordId) -> LedgerResult<Identity>;
    async fn participants(&self, id: &RecordId) -> LedgerResult<Vec<Identity>>;
    async fn claimed(&self, id: &RecordId) -> LedgerResult<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRecordRequest {
    pub name: String,
    pub ticket_price: Amount,
    /// Absolute unix deadline.
    pub deadline: i64,
    pub prize: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    RecordCreated { record: RecordId, name: String },
    TicketBought { record: RecordId, buyer: Identity },
    WinnerSelected { record: RecordId, winner: Identity },
    PrizeClaimed { record: RecordId, winner: Identity, amount: Amount },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub events: Vec<LedgerEvent>,
}

impl TxReceipt {
    pub fn created_record(&self) -> Option<&RecordId> {
        self.events.iter().find_map(|event| match event {
            LedgerEvent::RecordCreated { record, .. } => Some(record),
            _ => None,
        })
    }

    pub fn selected_winner(&self) -> Option<&Identity> {
        self.events.iter().find_map(|event| match event {
            LedgerEvent::WinnerSelected { winner, .. } => Some(winner),
            _ => None,
        })
    }
}

/// State-changing calls. Each one is signed by `from` and is irreversible once accepted.
#[async_trait::async_trait]
pub trait LedgerWriter: Send + Sync {
    /// `value` must equal the prize; it is escrowed by the new record.
    async fn create_record(
        &self,
        from: &Identity,
        request: &CreateRecordRequest,
        value: Amount,
    ) -> LedgerResult<TxReceipt>;
    /// `value` must equal the record's ticket price.
    async fn buy_ticket(&self, from: &Identity, id: &RecordId, value: Amount)
        -> LedgerResult<TxReceipt>;
    async fn select_winner(&self, from: &Identity, id: &RecordId) -> LedgerResult<TxReceipt>;
    async fn claim_prize(&self, from: &Identity, id: &RecordId) -> LedgerResult<TxReceipt>;
}

/// Source of the caller's identity. The sentinel identity means "no account connected".
pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Identity;
    /// Receives every account switch.
    fn subscribe(&self) -> watch::Receiver<Identity>;
}
