//! Dashboard and owner report use-cases.
//!
//! # Responsibility
//! - Load the records a view needs and hand them to the reconciliation engine.
//! - Write owner report workbooks to disk.
//!
//! # Invariants
//! - Read-only over the store.

use crate::engine::reconcile::{reconcile, PartyKey, PartyRow, ReconcileScope, ReconcileTotals};
use crate::model::flat::Flat;
use crate::model::party::Party;
use crate::model::transaction::Transaction;
use crate::model::RecordId;
use crate::report::owner_report::OwnerReport;
use crate::report::TransferError;
use crate::repo::record_store::{RecordStore, RepoResult};
use crate::repo::RefField;
use chrono::NaiveDate;
use log::info;
use std::path::{Path, PathBuf};

/// Dashboard grid plus its KPI strip.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub rows: Vec<PartyRow>,
    pub totals: ReconcileTotals,
}

pub struct ReportService<'s, S: RecordStore> {
    store: &'s S,
}

impl<'s, S: RecordStore> ReportService<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Reconciles one project, optionally narrowed to a single party row.
    pub fn dashboard(
        &self,
        project_id: RecordId,
        party: Option<PartyKey>,
        completion_percent: f64,
    ) -> RepoResult<Dashboard> {
        let flats: Vec<Flat> = self.store.query_by_field(RefField::ProjectId, project_id)?;
        let transactions: Vec<Transaction> =
            self.store.query_by_field(RefField::ProjectId, project_id)?;
        let parties: Vec<Party> = self.store.list_all()?;

        let rows = reconcile(&flats, &transactions, &parties, completion_percent, party);
        let totals = ReconcileTotals::from_rows(&rows, completion_percent);
        info!(
            "event=dashboard_build module=service status=ok rows={} flats={} transactions={}",
            rows.len(),
            flats.len(),
            transactions.len()
        );
        Ok(Dashboard { rows, totals })
    }

    pub fn owner_report(
        &self,
        scope: ReconcileScope,
        completion_percent: f64,
        generated_on: NaiveDate,
    ) -> RepoResult<OwnerReport> {
        let snapshot = self.store.snapshot()?;
        Ok(OwnerReport::build(
            &snapshot,
            scope,
            completion_percent,
            generated_on,
        ))
    }

    /// Builds the owner report and writes it under `parent`.
    ///
    /// Returns the path of the `.xlsx` file.
    pub fn write_owner_report(
        &self,
        parent: &Path,
        scope: ReconcileScope,
        completion_percent: f64,
        generated_on: NaiveDate,
    ) -> Result<PathBuf, TransferError> {
        let report = self.owner_report(scope, completion_percent, generated_on)?;
        let path = report.to_workbook().save(parent)?;
        info!(
            "event=owner_report_write module=service status=ok parties={} transactions={}",
            report.summary.len(),
            report.transactions.len()
        );
        Ok(path)
    }
}
