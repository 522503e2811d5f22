//! Flat (sellable unit) record.
//!
//! # Invariants
//! - `amount == area_sqft * rate_per_sqft` when built through `Flat::new`.
//!   Later edits that skip `recompute_amount` are tolerated as-is.

use super::{now_epoch_ms, require_finite, require_text, RecordId, RecordValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sellable unit inside one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flat {
    pub id: RecordId,
    pub project_id: RecordId,
    /// Buyer, when the flat has been assigned.
    pub party_id: Option<RecordId>,
    /// Free text, unique only by convention.
    pub flat_no: String,
    pub area_sqft: f64,
    pub rate_per_sqft: f64,
    /// Denormalized `area_sqft * rate_per_sqft` captured at write time.
    pub amount: f64,
    pub notes: Option<String>,
    pub created_at: i64,
    pub modified_at: i64,
}

impl Flat {
    /// Creates an unassigned flat and derives `amount` from area and rate.
    pub fn new(
        project_id: RecordId,
        flat_no: impl Into<String>,
        area_sqft: f64,
        rate_per_sqft: f64,
    ) -> Self {
        let now = now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            project_id,
            party_id: None,
            flat_no: flat_no.into(),
            area_sqft,
            rate_per_sqft,
            amount: area_sqft * rate_per_sqft,
            notes: None,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn assigned_to(mut self, party_id: RecordId) -> Self {
        self.party_id = Some(party_id);
        self
    }

    /// Re-derives `amount` from the current area and rate.
    pub fn recompute_amount(&mut self) {
        self.amount = self.area_sqft * self.rate_per_sqft;
    }

    pub fn validate(&self) -> Result<(), RecordValidationError> {
        require_text("flat number", &self.flat_no)?;
        require_finite("area_sqft", self.area_sqft)?;
        require_finite("rate_per_sqft", self.rate_per_sqft)?;
        require_finite("amount", self.amount)
    }
}
