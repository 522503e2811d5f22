//! Owner report: party summary with KPIs plus a transaction listing.
//!
//! # Invariants
//! - Summary rows come straight from `engine::reconcile` and keep its order.
//! - `% Difference` is written as a fraction (`percent_difference / 100`).
//! - Bands: above 0.30 red, above 0.10 yellow, everything else (including
//!   negative over-collection) green. The band is the fill of the
//!   `% Difference` cell.

use super::workbook::{Cell, Sheet, Workbook};
use crate::engine::reconcile::{reconcile, PartyKey, ReconcileScope, ReconcileTotals};
use crate::model::transaction::Transaction;
use crate::model::RecordId;
use crate::repo::record_store::RecordSnapshot;
use chrono::NaiveDate;
use std::collections::HashMap;

pub const SUMMARY_SHEET: &str = "Summary";
pub const TRANSACTIONS_SHEET: &str = "Transactions";
const REPORT_TITLE: &str = "OWNER REPORT";
const REPORT_FOOTER: &str = "For use only by the owner";
const KPI_HEADERS: [&str; 5] = [
    "Total Expected",
    "Total Received",
    "% Expected",
    "% Collected",
    "Outstanding",
];
const SUMMARY_HEADERS: [&str; 5] = [
    "Party",
    "Expected Amount",
    "Received Amount",
    "% Difference",
    "Balance Due",
];
/// Title, blank, KPI header, KPI values, blank and the party table header.
const SUMMARY_FROZEN_ROWS: u32 = 6;
const TRANSACTION_HEADERS: [&str; 7] = [
    "Date",
    "Project",
    "Party",
    "Flat",
    "Bank Amount",
    "Cash Amount",
    "Total Amount",
];
const UNKNOWN: &str = "Unknown";
const NO_FLAT: &str = "-";

/// Colour band for the `% Difference` cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Red,
    Yellow,
    Green,
}

impl Band {
    pub fn for_fraction(fraction: f64) -> Self {
        if fraction > 0.3 {
            Self::Red
        } else if fraction > 0.1 {
            Self::Yellow
        } else {
            Self::Green
        }
    }

    /// RGB fill colour.
    pub fn rgb(self) -> u32 {
        match self {
            Self::Red => 0xFFCDD2,
            Self::Yellow => 0xFFF9C4,
            Self::Green => 0xC8E6C9,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryLine {
    pub party_key: PartyKey,
    pub party: String,
    pub expected: f64,
    pub received: f64,
    pub difference_fraction: f64,
    pub balance_due: f64,
    pub band: Band,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionLine {
    pub date: NaiveDate,
    pub project: String,
    pub party: String,
    pub flat: String,
    pub bank_amount: f64,
    pub cash_amount: f64,
    pub total_amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OwnerReport {
    pub generated_on: NaiveDate,
    pub completion_percent: f64,
    pub totals: ReconcileTotals,
    pub summary: Vec<SummaryLine>,
    pub transactions: Vec<TransactionLine>,
}

impl OwnerReport {
    /// Builds the report for records inside `scope`.
    pub fn build(
        snapshot: &RecordSnapshot,
        scope: ReconcileScope,
        completion_percent: f64,
        generated_on: NaiveDate,
    ) -> Self {
        let flats = scope.flats(&snapshot.flats);
        let transactions = scope.transactions(&snapshot.transactions);

        let rows = reconcile(
            flats.iter().copied(),
            transactions.iter().copied(),
            &snapshot.parties,
            completion_percent,
            None,
        );
        let totals = ReconcileTotals::from_rows(&rows, completion_percent);
        let summary = rows
            .into_iter()
            .map(|row| {
                let difference_fraction = row.percent_difference as f64 / 100.0;
                SummaryLine {
                    party_key: row.party_key,
                    party: row.party_name,
                    expected: row.expected,
                    received: row.received,
                    difference_fraction,
                    balance_due: row.balance_due,
                    band: Band::for_fraction(difference_fraction),
                }
            })
            .collect();

        let project_names = names(snapshot.projects.iter().map(|p| (p.id, p.name.as_str())));
        let party_names = names(snapshot.parties.iter().map(|p| (p.id, p.name.as_str())));
        let flat_numbers = names(snapshot.flats.iter().map(|f| (f.id, f.flat_no.as_str())));
        let transactions = transactions
            .into_iter()
            .map(|transaction| {
                transaction_line(transaction, &project_names, &party_names, &flat_numbers)
            })
            .collect();

        Self {
            generated_on,
            completion_percent,
            totals,
            summary,
            transactions,
        }
    }

    /// `Owner_Report_<YYYY-MM-DD>`.
    pub fn file_stem(&self) -> String {
        format!("Owner_Report_{}", self.generated_on.format("%Y-%m-%d"))
    }

    pub fn to_workbook(&self) -> Workbook {
        let mut summary = Sheet::new(SUMMARY_SHEET);
        summary.push_texts(&[REPORT_TITLE]);
        summary.push_blank();
        summary.push_header(&KPI_HEADERS);
        summary.push_row(vec![
            Cell::Amount(self.totals.total_expected),
            Cell::Amount(self.totals.total_received),
            Cell::Number(self.totals.percent_expected),
            Cell::Number(self.totals.percent_collected),
            Cell::Amount(self.totals.outstanding),
        ]);
        summary.push_blank();
        summary.push_header(&SUMMARY_HEADERS);
        summary.frozen_rows = SUMMARY_FROZEN_ROWS;
        for line in &self.summary {
            summary.push_row(vec![
                Cell::text(line.party.as_str()),
                Cell::Amount(line.expected),
                Cell::Amount(line.received),
                Cell::Percent {
                    value: line.difference_fraction,
                    fill: Some(line.band.rgb()),
                },
                Cell::Amount(line.balance_due),
            ]);
        }
        summary.push_blank();
        summary.push_texts(&[REPORT_FOOTER]);

        let mut detail = Sheet::new(TRANSACTIONS_SHEET);
        detail.push_header(&TRANSACTION_HEADERS);
        detail.frozen_rows = 1;
        for line in &self.transactions {
            detail.push_row(vec![
                Cell::Text(line.date.format("%Y-%m-%d").to_string()),
                Cell::text(line.project.as_str()),
                Cell::text(line.party.as_str()),
                Cell::text(line.flat.as_str()),
                Cell::Amount(line.bank_amount),
                Cell::Amount(line.cash_amount),
                Cell::Amount(line.total_amount),
            ]);
        }

        Workbook {
            stem: self.file_stem(),
            sheets: vec![summary, detail],
        }
    }
}

fn names<'a>(pairs: impl Iterator<Item = (RecordId, &'a str)>) -> HashMap<RecordId, &'a str> {
    pairs.collect()
}

fn lookup(names: &HashMap<RecordId, &str>, id: Option<RecordId>, fallback: &str) -> String {
    id.and_then(|id| names.get(&id).copied())
        .unwrap_or(fallback)
        .to_string()
}

fn transaction_line(
    transaction: &Transaction,
    projects: &HashMap<RecordId, &str>,
    parties: &HashMap<RecordId, &str>,
    flats: &HashMap<RecordId, &str>,
) -> TransactionLine {
    TransactionLine {
        date: transaction.transaction_date,
        project: lookup(projects, Some(transaction.project_id), UNKNOWN),
        party: lookup(parties, transaction.party_id, UNKNOWN),
        flat: lookup(flats, transaction.flat_id, NO_FLAT),
        bank_amount: transaction.bank_amount,
        cash_amount: transaction.cash_amount,
        total_amount: transaction.total_amount,
    }
}
