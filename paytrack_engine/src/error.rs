//! Error type shared by every ledger operation.

use thiserror::Error;

/// Broad class of a [`LedgerError`], used by callers that only need
/// to decide how to report a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input the caller can correct.
    Validation,
    /// A referenced record does not exist.
    NotFound,
    /// Well formed input that had nothing to act on.
    NoOp,
    /// A bulk import document with the wrong shape.
    Format,
    /// The persistence layer failed.
    Storage,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("payment amount must be a positive number, got {0}")]
    NonPositiveAmount(f64),

    #[error("payment of {amount} exceeds the outstanding balance of {outstanding}")]
    ExceedsOutstanding { amount: f64, outstanding: f64 },

    #[error("required field missing or invalid: {0}")]
    MissingField(&'static str),

    #[error("invalid report period: {0}")]
    InvalidPeriod(String),

    #[error("unknown employer: {0}")]
    UnknownEmployer(String),

    #[error("unknown work entry: {0}")]
    UnknownWorkEntry(String),

    #[error("no outstanding work entries for employer {employer_id}")]
    NoOutstandingWork { employer_id: String },

    #[error("invalid import document: {0}")]
    Format(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::NonPositiveAmount(_)
            | LedgerError::ExceedsOutstanding { .. }
            | LedgerError::MissingField(_)
            | LedgerError::InvalidPeriod(_) => ErrorKind::Validation,
            LedgerError::UnknownEmployer(_) | LedgerError::UnknownWorkEntry(_) => {
                ErrorKind::NotFound
            }
            LedgerError::NoOutstandingWork { .. } => ErrorKind::NoOp,
            LedgerError::Format(_) => ErrorKind::Format,
            LedgerError::Io(_) | LedgerError::Json(_) => ErrorKind::Storage,
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
