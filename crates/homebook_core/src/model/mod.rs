//! Bookkeeping domain model.
//!
//! # Responsibility
//! - Define the four record kinds persisted by the record store.
//! - Derive denormalized amounts at construction time.
//!
//! # Invariants
//! - Every record is identified by a stable `RecordId` that is never reused.
//! - `Flat::amount` and `Transaction::total_amount` are derived once at write
//!   time and never silently recomputed afterwards.
//! - Foreign ids are plain values; nothing here checks that they resolve.

pub mod flat;
pub mod party;
pub mod project;
pub mod transaction;

use chrono::Utc;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier shared by all record kinds.
pub type RecordId = Uuid;

/// Returns current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Write-time validation failure for a record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValidationError {
    /// A required text field is empty after trim.
    BlankField(&'static str),
    /// A numeric field holds NaN or infinity.
    NonFiniteNumber { field: &'static str, value: f64 },
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "{field} must not be blank"),
            Self::NonFiniteNumber { field, value } => {
                write!(f, "{field} must be a finite number, got {value}")
            }
        }
    }
}

impl Error for RecordValidationError {}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), RecordValidationError> {
    if value.trim().is_empty() {
        return Err(RecordValidationError::BlankField(field));
    }
    Ok(())
}

pub(crate) fn require_finite(field: &'static str, value: f64) -> Result<(), RecordValidationError> {
    if !value.is_finite() {
        return Err(RecordValidationError::NonFiniteNumber { field, value });
    }
    Ok(())
}
