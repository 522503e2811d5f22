//! Project record.

use super::{now_epoch_ms, require_text, RecordId, RecordValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Construction site grouping flats and transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: RecordId,
    pub name: String,
    pub notes: Option<String>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds, restamped on every mutation.
    pub modified_at: i64,
}

impl Project {
    /// Creates a project with a fresh id and both timestamps set to now.
    pub fn new(name: impl Into<String>) -> Self {
        let now = now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            notes: None,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn validate(&self) -> Result<(), RecordValidationError> {
        require_text("project name", &self.name)
    }
}
