// ❗ Error taxonomy
//
// Three families, never mixed:
//   - RejectionReason: the receipt was judged and refused (business/validation)
//   - StoreError: the catalog or transaction store could not answer (infrastructure)
//   - ScanError: the image pipeline around OCR failed before judgement

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// REJECTIONS (returned inside ReconciliationResult, never as Err)
// ============================================================================

/// Why a receipt was refused.
///
/// Messages are safe to show to an agent: they name fields, never the
/// OCR text the fields came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum RejectionReason {
    /// One or more mandatory fields could not be extracted
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    /// Amount is not a non-negative decimal
    #[error("amount is not a valid non-negative decimal")]
    InvalidAmount,

    /// A date was printed but could not be turned into a timestamp
    #[error("transaction date could not be read")]
    InvalidDate,

    /// Reference id + amount not present in the reference catalog
    #[error("no matching transaction found in reference catalog")]
    NoMatch,
}

impl RejectionReason {
    /// Short machine code for logs and audit events
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::MissingFields(_) => "missing_fields",
            RejectionReason::InvalidAmount => "invalid_amount",
            RejectionReason::InvalidDate => "invalid_date",
            RejectionReason::NoMatch => "no_match",
        }
    }

    /// Validation rejections happen before any lookup and mutate nothing
    pub fn is_validation(&self) -> bool {
        !matches!(self, RejectionReason::NoMatch)
    }
}

// ============================================================================
// INFRASTRUCTURE
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    /// Store could not be reached or failed mid-operation; retrying may help
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A write collided with existing state (e.g. duplicate reference id)
    #[error("store conflict: {0}")]
    Conflict(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Conflict(err.to_string())
            }
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        StoreError::Unavailable("lock poisoned by a panicked writer".to_string())
    }
}

// ============================================================================
// IMAGE PIPELINE
// ============================================================================

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("OCR did not finish within {0:?}")]
    OcrTimeout(Duration),

    #[error(transparent)]
    Store(#[from] StoreError),
}
