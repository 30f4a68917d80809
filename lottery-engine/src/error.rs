use crate::gateway::ActionKind;
use core_types::{FieldName, RecordId};
use ledger_client::LedgerError;
use thiserror::Error;

const GENERIC_SUBMISSION_FAILURE: &str = "transaction submission failed";

/// One field of one record could not be read. The field falls back to its default.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field} read failed: {source}")]
pub struct FieldFetchError {
    pub field: FieldName,
    #[source]
    pub source: LedgerError,
}

/// Why a record was excluded from every view for one pass.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidReason {
    #[error("missing {0}")]
    MissingField(FieldName),
    #[error("unparsable deadline '{0}'")]
    UnparsableTimestamp(String),
}

/// A pass could not start because the registry listing itself failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("registry listing failed: {0}")]
    Registry(#[source] LedgerError),
}

/// Client-side check failed; nothing was sent to the ledger.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("no account connected")]
    NoIdentity,
    #[error("record {0} is not a valid lottery")]
    UnknownRecord(RecordId),
    #[error("{action} not allowed on {record}: {reason}")]
    NotEligible {
        action: ActionKind,
        record: RecordId,
        reason: &'static str,
    },
    #[error("only the configured admin may create lotteries")]
    NotAdmin,
    #[error("invalid lottery parameters: {0}")]
    InvalidRequest(String),
}

/// The ledger (or the signer) refused a write. Never retried automatically.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{operation} failed: {}", .detail.as_deref().unwrap_or(GENERIC_SUBMISSION_FAILURE))]
pub struct SubmissionError {
    pub operation: &'static str,
    pub detail: Option<String>,
    #[source]
    pub source: LedgerError,
}

impl SubmissionError {
    pub fn new(operation: &'static str, source: LedgerError) -> Self {
        Self {
            operation,
            detail: source.detail(),
            source,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}
