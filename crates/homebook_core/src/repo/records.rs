//! Row mapping between record types and their SQLite tables.
//!
//! # Invariants
//! - `COLUMNS` lists `id` first; `to_values` binds in the same order.
//! - Ids and dates are stored as text (`uuid` hyphenated, `%Y-%m-%d`).

use super::record_store::{RepoError, RepoResult};
use crate::model::flat::Flat;
use crate::model::party::Party;
use crate::model::project::Project;
use crate::model::transaction::{Transaction, TransactionMode};
use crate::model::{RecordId, RecordValidationError};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::Row;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// The four record collections held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Projects,
    Parties,
    Flats,
    Transactions,
}

impl Collection {
    /// Collections in dependency order (referenced before referencing).
    pub const ALL: [Collection; 4] = [
        Collection::Projects,
        Collection::Parties,
        Collection::Flats,
        Collection::Transactions,
    ];

    pub fn table(self) -> &'static str {
        match self {
            Self::Projects => "projects",
            Self::Parties => "parties",
            Self::Flats => "flats",
            Self::Transactions => "transactions",
        }
    }

    /// Sheet name used by bulk export/import.
    pub fn sheet_name(self) -> &'static str {
        match self {
            Self::Projects => "Projects",
            Self::Parties => "Parties",
            Self::Flats => "Flats",
            Self::Transactions => "Transactions",
        }
    }

    /// Singular noun for messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Projects => "project",
            Self::Parties => "party",
            Self::Flats => "flat",
            Self::Transactions => "transaction",
        }
    }

    /// Whether records of this collection carry the given reference field.
    pub fn supports(self, field: RefField) -> bool {
        match self {
            Self::Projects | Self::Parties => false,
            Self::Flats => matches!(field, RefField::ProjectId | RefField::PartyId),
            Self::Transactions => true,
        }
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

/// Secondary (foreign id) fields that support query and count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefField {
    ProjectId,
    PartyId,
    FlatId,
}

impl RefField {
    pub fn column(self) -> &'static str {
        match self {
            Self::ProjectId => "project_id",
            Self::PartyId => "party_id",
            Self::FlatId => "flat_id",
        }
    }
}

/// Record type persisted in one store collection.
pub trait StoredRecord: Clone {
    const COLLECTION: Collection;
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> RecordId;
    fn set_modified_at(&mut self, epoch_ms: i64);
    fn validate(&self) -> Result<(), RecordValidationError>;
    fn to_values(&self) -> Vec<Value>;
    fn from_row(row: &Row<'_>) -> RepoResult<Self>;
}

impl StoredRecord for Project {
    const COLLECTION: Collection = Collection::Projects;
    const COLUMNS: &'static [&'static str] = &["id", "name", "notes", "created_at", "modified_at"];

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_modified_at(&mut self, epoch_ms: i64) {
        self.modified_at = epoch_ms;
    }

    fn validate(&self) -> Result<(), RecordValidationError> {
        Project::validate(self)
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            id_value(self.id),
            Value::Text(self.name.clone()),
            opt_text(self.notes.as_deref()),
            Value::Integer(self.created_at),
            Value::Integer(self.modified_at),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: parse_id(row, "id")?,
            name: row.get("name")?,
            notes: row.get("notes")?,
            created_at: row.get("created_at")?,
            modified_at: row.get("modified_at")?,
        })
    }
}

impl StoredRecord for Party {
    const COLLECTION: Collection = Collection::Parties;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "contact",
        "address",
        "created_at",
        "modified_at",
    ];

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_modified_at(&mut self, epoch_ms: i64) {
        self.modified_at = epoch_ms;
    }

    fn validate(&self) -> Result<(), RecordValidationError> {
        Party::validate(self)
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            id_value(self.id),
            Value::Text(self.name.clone()),
            opt_text(self.contact.as_deref()),
            opt_text(self.address.as_deref()),
            Value::Integer(self.created_at),
            Value::Integer(self.modified_at),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: parse_id(row, "id")?,
            name: row.get("name")?,
            contact: row.get("contact")?,
            address: row.get("address")?,
            created_at: row.get("created_at")?,
            modified_at: row.get("modified_at")?,
        })
    }
}

impl StoredRecord for Flat {
    const COLLECTION: Collection = Collection::Flats;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "project_id",
        "party_id",
        "flat_no",
        "area_sqft",
        "rate_per_sqft",
        "amount",
        "notes",
        "created_at",
        "modified_at",
    ];

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_modified_at(&mut self, epoch_ms: i64) {
        self.modified_at = epoch_ms;
    }

    fn validate(&self) -> Result<(), RecordValidationError> {
        Flat::validate(self)
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            id_value(self.id),
            id_value(self.project_id),
            opt_id_value(self.party_id),
            Value::Text(self.flat_no.clone()),
            Value::Real(self.area_sqft),
            Value::Real(self.rate_per_sqft),
            Value::Real(self.amount),
            opt_text(self.notes.as_deref()),
            Value::Integer(self.created_at),
            Value::Integer(self.modified_at),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: parse_id(row, "id")?,
            project_id: parse_id(row, "project_id")?,
            party_id: parse_opt_id(row, "party_id")?,
            flat_no: row.get("flat_no")?,
            area_sqft: row.get("area_sqft")?,
            rate_per_sqft: row.get("rate_per_sqft")?,
            amount: row.get("amount")?,
            notes: row.get("notes")?,
            created_at: row.get("created_at")?,
            modified_at: row.get("modified_at")?,
        })
    }
}

impl StoredRecord for Transaction {
    const COLLECTION: Collection = Collection::Transactions;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "project_id",
        "party_id",
        "flat_id",
        "bank_amount",
        "cash_amount",
        "total_amount",
        "transaction_date",
        "mode",
        "reference",
        "remarks",
        "created_at",
        "modified_at",
    ];

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_modified_at(&mut self, epoch_ms: i64) {
        self.modified_at = epoch_ms;
    }

    fn validate(&self) -> Result<(), RecordValidationError> {
        Transaction::validate(self)
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            id_value(self.id),
            id_value(self.project_id),
            opt_id_value(self.party_id),
            opt_id_value(self.flat_id),
            Value::Real(self.bank_amount),
            Value::Real(self.cash_amount),
            Value::Real(self.total_amount),
            Value::Text(self.transaction_date.format(DATE_FORMAT).to_string()),
            opt_text(self.mode.map(TransactionMode::as_str)),
            opt_text(self.reference.as_deref()),
            opt_text(self.remarks.as_deref()),
            Value::Integer(self.created_at),
            Value::Integer(self.modified_at),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let date_text: String = row.get("transaction_date")?;
        let transaction_date = NaiveDate::parse_from_str(&date_text, DATE_FORMAT).map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid date `{date_text}` in transactions.transaction_date"
            ))
        })?;

        let mode = match row.get::<_, Option<String>>("mode")? {
            Some(value) => Some(TransactionMode::parse(&value).ok_or_else(|| {
                RepoError::InvalidData(format!("invalid mode `{value}` in transactions.mode"))
            })?),
            None => None,
        };

        Ok(Self {
            id: parse_id(row, "id")?,
            project_id: parse_id(row, "project_id")?,
            party_id: parse_opt_id(row, "party_id")?,
            flat_id: parse_opt_id(row, "flat_id")?,
            bank_amount: row.get("bank_amount")?,
            cash_amount: row.get("cash_amount")?,
            total_amount: row.get("total_amount")?,
            transaction_date,
            mode,
            reference: row.get("reference")?,
            remarks: row.get("remarks")?,
            created_at: row.get("created_at")?,
            modified_at: row.get("modified_at")?,
        })
    }
}

fn id_value(id: RecordId) -> Value {
    Value::Text(id.to_string())
}

fn opt_id_value(id: Option<RecordId>) -> Value {
    id.map_or(Value::Null, id_value)
}

fn opt_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}

fn parse_id(row: &Row<'_>, column: &str) -> RepoResult<RecordId> {
    let text: String = row.get(column)?;
    Uuid::parse_str(&text)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{text}` in column {column}")))
}

fn parse_opt_id(row: &Row<'_>, column: &str) -> RepoResult<Option<RecordId>> {
    match row.get::<_, Option<String>>(column)? {
        Some(text) if !text.trim().is_empty() => Uuid::parse_str(&text).map(Some).map_err(|_| {
            RepoError::InvalidData(format!("invalid uuid `{text}` in column {column}"))
        }),
        _ => Ok(None),
    }
}
