use core_types::RecordId;
use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger node unavailable: {0}")]
    Unavailable(String),
    #[error("ledger call timed out")]
    Timeout,
    #[error("transaction reverted{}", .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    Reverted { reason: Option<String> },
    #[error("rejected by signer: {0}")]
    Rejected(String),
    #[error("unknown record {0}")]
    UnknownRecord(RecordId),
    #[error("undecodable ledger value: {0}")]
    Decode(String),
}

impl LedgerError {
    pub fn reverted(reason: impl Into<String>) -> Self {
        LedgerError::Reverted {
            reason: Some(reason.into()),
        }
    }

    /// Worth retrying for a read; writes are never retried regardless.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Unavailable(_) | LedgerError::Timeout)
    }

    /// Ledger- or signer-supplied explanation, when there is one.
    pub fn detail(&self) -> Option<String> {
        match self {
            LedgerError::Reverted { reason } => reason.clone(),
            LedgerError::Rejected(reason) => Some(reason.clone()),
            LedgerError::UnknownRecord(id) => Some(format!("unknown record {id}")),
            LedgerError::Unavailable(_) | LedgerError::Timeout | LedgerError::Decode(_) => None,
        }
    }
}
