// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Reconciliation engine for ledger-held lottery records.
//!
//! Data flows one way: registry listing -> [`RecordFetcher`] -> [`lifecycle::derive`]
//! -> [`Snapshot`] -> [`views`]. Actions flow back through the [`ActionGateway`],
//! after which the [`LotteryEngine`] rebuilds the snapshot from scratch.

pub mod error;
pub mod fetcher;
pub mod gateway;
pub mod lifecycle;
pub mod reconciler;
pub mod snapshot;
pub mod triggers;
pub mod views;

mod engine;
mod service;

pub use engine::{EngineSettings, LotteryEngine, PassOutcome, PublishedSnapshot};
pub use error::{
    ActionError, FieldFetchError, InvalidReason, PreconditionError, ReconcileError,
    SubmissionError,
};
pub use fetcher::{FetchedRecord, RecordFetcher};
pub use gateway::{ActionGateway, ActionKind, ActionOutcome, CreateOutcome, RecordDraft};
pub use reconciler::Reconciler;
pub use service::ReconcileService;
pub use snapshot::{ExcludedRecord, RecordEntry, Snapshot, SnapshotSummary};
pub use triggers::{ReconcileTrigger, TriggerEffect};
pub use views::{FilterMode, WinnerEntry};
