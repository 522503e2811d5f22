//! Bulk export/import of all four collections.
//!
//! # Responsibility
//! - Dump every collection as a direct tabular sheet.
//! - Load sheets back into records ready for an atomic store upsert.
//!
//! # Invariants
//! - Import keeps supplied ids and `createdAt`, generates missing ids, and
//!   stamps `modifiedAt` with the import time.
//! - Missing derived amounts are recomputed; supplied ones are kept.
//! - A workbook without one of the collection sheets skips it; a missing
//!   workbook file is an error.

use super::workbook::{open_xlsx, read_error, Cell, Sheet, Workbook};
use super::TransferError;
use crate::engine::command::parse_flexible_date;
use crate::model::flat::Flat;
use crate::model::party::Party;
use crate::model::project::Project;
use crate::model::transaction::{Transaction, TransactionMode};
use crate::model::RecordId;
use crate::repo::record_store::RecordSnapshot;
use crate::repo::Collection;
use calamine::{DeError, RangeDeserializerBuilder, Reader, Xlsx};
use chrono::{DateTime, NaiveDate};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectSheetRow {
    id: Option<RecordId>,
    name: String,
    notes: Option<String>,
    created_at: Option<i64>,
    modified_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartySheetRow {
    id: Option<RecordId>,
    name: String,
    contact: Option<String>,
    address: Option<String>,
    created_at: Option<i64>,
    modified_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlatSheetRow {
    id: Option<RecordId>,
    project_id: RecordId,
    party_id: Option<RecordId>,
    flat_no: String,
    area_sqft: f64,
    rate_per_sqft: f64,
    amount: Option<f64>,
    notes: Option<String>,
    created_at: Option<i64>,
    modified_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionSheetRow {
    id: Option<RecordId>,
    project_id: RecordId,
    party_id: Option<RecordId>,
    flat_id: Option<RecordId>,
    bank_amount: Option<f64>,
    cash_amount: Option<f64>,
    total_amount: Option<f64>,
    transaction_date: String,
    mode: Option<String>,
    reference: Option<String>,
    remarks: Option<String>,
    created_at: Option<i64>,
    modified_at: Option<i64>,
}

/// Bulk export file stem for a given day.
pub fn export_file_stem(on: NaiveDate) -> String {
    format!("bookkeeping-export-{}", on.format("%Y-%m-%d"))
}

/// Builds the four-sheet export workbook.
pub fn snapshot_workbook(snapshot: &RecordSnapshot, on: NaiveDate) -> Workbook {
    let projects = snapshot.projects.iter().map(|project| ProjectSheetRow {
        id: Some(project.id),
        name: project.name.clone(),
        notes: project.notes.clone(),
        created_at: Some(project.created_at),
        modified_at: Some(project.modified_at),
    });

    let parties = snapshot.parties.iter().map(|party| PartySheetRow {
        id: Some(party.id),
        name: party.name.clone(),
        contact: party.contact.clone(),
        address: party.address.clone(),
        created_at: Some(party.created_at),
        modified_at: Some(party.modified_at),
    });

    let flats = snapshot.flats.iter().map(|flat| FlatSheetRow {
        id: Some(flat.id),
        project_id: flat.project_id,
        party_id: flat.party_id,
        flat_no: flat.flat_no.clone(),
        area_sqft: flat.area_sqft,
        rate_per_sqft: flat.rate_per_sqft,
        amount: Some(flat.amount),
        notes: flat.notes.clone(),
        created_at: Some(flat.created_at),
        modified_at: Some(flat.modified_at),
    });

    let transactions = snapshot
        .transactions
        .iter()
        .map(|transaction| TransactionSheetRow {
            id: Some(transaction.id),
            project_id: transaction.project_id,
            party_id: transaction.party_id,
            flat_id: transaction.flat_id,
            bank_amount: Some(transaction.bank_amount),
            cash_amount: Some(transaction.cash_amount),
            total_amount: Some(transaction.total_amount),
            transaction_date: transaction.transaction_date.format("%Y-%m-%d").to_string(),
            mode: transaction.mode.map(|mode| mode.as_str().to_string()),
            reference: transaction.reference.clone(),
            remarks: transaction.remarks.clone(),
            created_at: Some(transaction.created_at),
            modified_at: Some(transaction.modified_at),
        });

    Workbook {
        stem: export_file_stem(on),
        sheets: vec![
            record_sheet(Collection::Projects, projects),
            record_sheet(Collection::Parties, parties),
            record_sheet(Collection::Flats, flats),
            record_sheet(Collection::Transactions, transactions),
        ],
    }
}

/// Reads whichever collection sheets exist in the `.xlsx` file at `path`.
///
/// `now_ms` becomes every record's `modified_at` and the `created_at` of
/// rows that do not supply one. A path that is missing or is not a regular
/// file fails with [`TransferError::Io`].
pub fn read_snapshot(path: &Path, now_ms: i64) -> Result<RecordSnapshot, TransferError> {
    let mut book = open_xlsx(path)?;
    let mut snapshot = RecordSnapshot::default();

    if let Some(rows) = read_rows::<ProjectSheetRow>(&mut book, path, Collection::Projects)? {
        snapshot.projects = rows
            .into_iter()
            .map(|row| Project {
                id: row.id.unwrap_or_else(Uuid::new_v4),
                name: row.name,
                notes: row.notes,
                created_at: row.created_at.unwrap_or(now_ms),
                modified_at: now_ms,
            })
            .collect();
    }

    if let Some(rows) = read_rows::<PartySheetRow>(&mut book, path, Collection::Parties)? {
        snapshot.parties = rows
            .into_iter()
            .map(|row| Party {
                id: row.id.unwrap_or_else(Uuid::new_v4),
                name: row.name,
                contact: row.contact,
                address: row.address,
                created_at: row.created_at.unwrap_or(now_ms),
                modified_at: now_ms,
            })
            .collect();
    }

    if let Some(rows) = read_rows::<FlatSheetRow>(&mut book, path, Collection::Flats)? {
        snapshot.flats = rows
            .into_iter()
            .map(|row| Flat {
                id: row.id.unwrap_or_else(Uuid::new_v4),
                project_id: row.project_id,
                party_id: row.party_id,
                flat_no: row.flat_no,
                area_sqft: row.area_sqft,
                rate_per_sqft: row.rate_per_sqft,
                amount: row.amount.unwrap_or(row.area_sqft * row.rate_per_sqft),
                notes: row.notes,
                created_at: row.created_at.unwrap_or(now_ms),
                modified_at: now_ms,
            })
            .collect();
    }

    if let Some(rows) =
        read_rows::<TransactionSheetRow>(&mut book, path, Collection::Transactions)?
    {
        snapshot.transactions = rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| transaction_from_row(row, index + 2, now_ms))
            .collect::<Result<_, _>>()?;
    }

    Ok(snapshot)
}

fn transaction_from_row(
    row: TransactionSheetRow,
    line: usize,
    now_ms: i64,
) -> Result<Transaction, TransferError> {
    let invalid = |message: String| TransferError::InvalidRow {
        sheet: Collection::Transactions.sheet_name(),
        line,
        message,
    };

    let transaction_date = parse_sheet_date(&row.transaction_date).ok_or_else(|| {
        invalid(format!(
            "unrecognized transactionDate `{}`",
            row.transaction_date
        ))
    })?;
    let mode = match row.mode.as_deref() {
        Some(value) => Some(
            TransactionMode::parse(value)
                .ok_or_else(|| invalid(format!("unknown mode `{value}`")))?,
        ),
        None => None,
    };
    let bank_amount = row.bank_amount.unwrap_or(0.0);
    let cash_amount = row.cash_amount.unwrap_or(0.0);

    Ok(Transaction {
        id: row.id.unwrap_or_else(Uuid::new_v4),
        project_id: row.project_id,
        party_id: row.party_id,
        flat_id: row.flat_id,
        bank_amount,
        cash_amount,
        total_amount: row.total_amount.unwrap_or(bank_amount + cash_amount),
        transaction_date,
        mode,
        reference: row.reference,
        remarks: row.remarks,
        created_at: row.created_at.unwrap_or(now_ms),
        modified_at: now_ms,
    })
}

/// Accepts ISO dates, RFC 3339 timestamps and the assistant's `D/M/Y` form.
fn parse_sheet_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|timestamp| timestamp.date_naive())
        })
        .or_else(|| parse_flexible_date(value).ok())
}

/// Column layout of one collection sheet.
trait SheetRow {
    const HEADERS: &'static [&'static str];

    fn cells(self) -> Vec<Cell>;
}

impl SheetRow for ProjectSheetRow {
    const HEADERS: &'static [&'static str] = &["id", "name", "notes", "createdAt", "modifiedAt"];

    fn cells(self) -> Vec<Cell> {
        vec![
            id_cell(self.id),
            Cell::Text(self.name),
            text_cell(self.notes),
            millis_cell(self.created_at),
            millis_cell(self.modified_at),
        ]
    }
}

impl SheetRow for PartySheetRow {
    const HEADERS: &'static [&'static str] =
        &["id", "name", "contact", "address", "createdAt", "modifiedAt"];

    fn cells(self) -> Vec<Cell> {
        vec![
            id_cell(self.id),
            Cell::Text(self.name),
            text_cell(self.contact),
            text_cell(self.address),
            millis_cell(self.created_at),
            millis_cell(self.modified_at),
        ]
    }
}

impl SheetRow for FlatSheetRow {
    const HEADERS: &'static [&'static str] = &[
        "id",
        "projectId",
        "partyId",
        "flatNo",
        "areaSqft",
        "ratePerSqft",
        "amount",
        "notes",
        "createdAt",
        "modifiedAt",
    ];

    fn cells(self) -> Vec<Cell> {
        vec![
            id_cell(self.id),
            id_cell(Some(self.project_id)),
            id_cell(self.party_id),
            Cell::Text(self.flat_no),
            Cell::Number(self.area_sqft),
            Cell::Number(self.rate_per_sqft),
            number_cell(self.amount),
            text_cell(self.notes),
            millis_cell(self.created_at),
            millis_cell(self.modified_at),
        ]
    }
}

impl SheetRow for TransactionSheetRow {
    const HEADERS: &'static [&'static str] = &[
        "id",
        "projectId",
        "partyId",
        "flatId",
        "bankAmount",
        "cashAmount",
        "totalAmount",
        "transactionDate",
        "mode",
        "reference",
        "remarks",
        "createdAt",
        "modifiedAt",
    ];

    fn cells(self) -> Vec<Cell> {
        vec![
            id_cell(self.id),
            id_cell(Some(self.project_id)),
            id_cell(self.party_id),
            id_cell(self.flat_id),
            number_cell(self.bank_amount),
            number_cell(self.cash_amount),
            number_cell(self.total_amount),
            Cell::Text(self.transaction_date),
            text_cell(self.mode),
            text_cell(self.reference),
            text_cell(self.remarks),
            millis_cell(self.created_at),
            millis_cell(self.modified_at),
        ]
    }
}

fn id_cell(id: Option<RecordId>) -> Cell {
    id.map_or(Cell::Empty, |id| Cell::Text(id.to_string()))
}

fn text_cell(value: Option<String>) -> Cell {
    value.map_or(Cell::Empty, Cell::Text)
}

fn number_cell(value: Option<f64>) -> Cell {
    value.map_or(Cell::Empty, Cell::Number)
}

fn millis_cell(value: Option<i64>) -> Cell {
    value.map_or(Cell::Empty, |ms| Cell::Number(ms as f64))
}

fn record_sheet<T, I>(collection: Collection, rows: I) -> Sheet
where
    T: SheetRow,
    I: IntoIterator<Item = T>,
{
    let mut sheet = Sheet::new(collection.sheet_name());
    sheet.push_texts(T::HEADERS);
    sheet.frozen_rows = 1;
    for row in rows {
        sheet.push_row(row.cells());
    }
    sheet
}

/// Deserializes one collection sheet by header name; `None` when the
/// workbook has no sheet for it.
fn read_rows<T>(
    book: &mut Xlsx<BufReader<File>>,
    path: &Path,
    collection: Collection,
) -> Result<Option<Vec<T>>, TransferError>
where
    T: DeserializeOwned,
{
    let sheet = collection.sheet_name();
    if !book.sheet_names().iter().any(|name| name == sheet) {
        return Ok(None);
    }
    let range = book
        .worksheet_range(sheet)
        .map_err(|source| read_error(path, source))?;
    if range.is_empty() {
        return Ok(Some(Vec::new()));
    }

    let invalid = |line: usize, err: DeError| TransferError::InvalidRow {
        sheet,
        line,
        message: err.to_string(),
    };
    RangeDeserializerBuilder::new()
        .from_range::<_, T>(&range)
        .map_err(|err| invalid(1, err))?
        .enumerate()
        .map(|(index, row)| row.map_err(|err| invalid(index + 2, err)))
        .collect::<Result<Vec<T>, _>>()
        .map(Some)
}
