//! Party (buyer / counter-party) record.

use super::{now_epoch_ms, require_text, RecordId, RecordValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Counter-party that owns flats and pays transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub id: RecordId,
    pub name: String,
    pub contact: Option<String>,
    pub address: Option<String>,
    pub created_at: i64,
    pub modified_at: i64,
}

impl Party {
    pub fn new(name: impl Into<String>) -> Self {
        let now = now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            contact: None,
            address: None,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = Some(contact.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn validate(&self) -> Result<(), RecordValidationError> {
        require_text("party name", &self.name)
    }
}
