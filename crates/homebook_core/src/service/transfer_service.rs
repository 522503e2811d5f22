//! Bulk export, import and wipe of all collections.
//!
//! # Invariants
//! - Import is all-or-nothing: the snapshot is fully parsed before the store
//!   is touched, and the store applies it in one transaction.

use crate::model::now_epoch_ms;
use crate::report::transfer::{read_snapshot, snapshot_workbook};
use crate::report::TransferError;
use crate::repo::record_store::{ImportSummary, RecordStore, RepoResult};
use chrono::NaiveDate;
use log::{info, warn};
use std::path::{Path, PathBuf};

pub struct TransferService<'s, S: RecordStore> {
    store: &'s S,
}

impl<'s, S: RecordStore> TransferService<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Writes `bookkeeping-export-<date>.xlsx` under `parent` and returns
    /// its path.
    pub fn export_to(&self, parent: &Path, on: NaiveDate) -> Result<PathBuf, TransferError> {
        let snapshot = self.store.snapshot()?;
        let path = snapshot_workbook(&snapshot, on).save(parent)?;
        info!(
            "event=records_export module=service status=ok projects={} parties={} flats={} transactions={}",
            snapshot.projects.len(),
            snapshot.parties.len(),
            snapshot.flats.len(),
            snapshot.transactions.len()
        );
        Ok(path)
    }

    /// Loads an export workbook and upserts it; nothing is written unless
    /// the whole file parses.
    pub fn import_from(&self, path: &Path) -> Result<ImportSummary, TransferError> {
        let snapshot = read_snapshot(path, now_epoch_ms()).map_err(|err| {
            warn!("event=records_import module=service status=rejected stage=parse error={err}");
            err
        })?;
        Ok(self.store.import_snapshot(&snapshot)?)
    }

    pub fn clear_all(&self) -> RepoResult<()> {
        self.store.clear_all()
    }
}
