//! Transaction (receipt / payment) record.
//!
//! # Invariants
//! - `total_amount == bank_amount + cash_amount` when built through
//!   `Transaction::new`.
//! - `transaction_date` is a calendar date independent of `created_at`.

use super::{now_epoch_ms, require_finite, RecordId, RecordValidationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction tag for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionMode {
    Receipt,
    Payment,
}

impl TransactionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Receipt => "receipt",
            Self::Payment => "payment",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "receipt" => Some(Self::Receipt),
            "payment" => Some(Self::Payment),
            _ => None,
        }
    }
}

/// Money received against a project, optionally tied to a party and flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: RecordId,
    pub project_id: RecordId,
    pub party_id: Option<RecordId>,
    pub flat_id: Option<RecordId>,
    pub bank_amount: f64,
    pub cash_amount: f64,
    /// Denormalized `bank_amount + cash_amount` captured at write time.
    pub total_amount: f64,
    pub transaction_date: NaiveDate,
    pub mode: Option<TransactionMode>,
    pub reference: Option<String>,
    pub remarks: Option<String>,
    pub created_at: i64,
    pub modified_at: i64,
}

impl Transaction {
    /// Creates a transaction and derives `total_amount`.
    pub fn new(
        project_id: RecordId,
        bank_amount: f64,
        cash_amount: f64,
        transaction_date: NaiveDate,
    ) -> Self {
        let now = now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            project_id,
            party_id: None,
            flat_id: None,
            bank_amount,
            cash_amount,
            total_amount: bank_amount + cash_amount,
            transaction_date,
            mode: None,
            reference: None,
            remarks: None,
            created_at: now,
            modified_at: now,
        }
    }

    /// Attaches flat and party ids, typically copied from a resolved flat.
    pub fn for_flat(mut self, flat_id: RecordId, party_id: Option<RecordId>) -> Self {
        self.flat_id = Some(flat_id);
        self.party_id = party_id;
        self
    }

    pub fn with_party(mut self, party_id: RecordId) -> Self {
        self.party_id = Some(party_id);
        self
    }

    pub fn with_mode(mut self, mode: TransactionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Re-derives `total_amount` from the current bank and cash amounts.
    pub fn recompute_total(&mut self) {
        self.total_amount = self.bank_amount + self.cash_amount;
    }

    pub fn validate(&self) -> Result<(), RecordValidationError> {
        require_finite("bank_amount", self.bank_amount)?;
        require_finite("cash_amount", self.cash_amount)?;
        require_finite("total_amount", self.total_amount)
    }
}
