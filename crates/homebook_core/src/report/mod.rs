//! Spreadsheet-shaped outputs: owner report and bulk transfer.
//!
//! # Responsibility
//! - Build the two-sheet owner report from record snapshots.
//! - Dump and load the four collections as one sheet per collection.
//!
//! # Invariants
//! - A workbook on disk is a single `.xlsx` file, one worksheet per sheet.
//! - Import only reads values; cell styling is ignored.

pub mod owner_report;
pub mod transfer;
pub mod workbook;

use crate::repo::record_store::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Failure while writing or reading workbook files.
#[derive(Debug)]
pub enum TransferError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Write {
        path: PathBuf,
        source: rust_xlsxwriter::XlsxError,
    },
    Read {
        path: PathBuf,
        source: calamine::XlsxError,
    },
    InvalidRow {
        sheet: &'static str,
        line: usize,
        message: String,
    },
    Repo(RepoError),
}

impl Display for TransferError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "i/o error at `{}`: {source}", path.display()),
            Self::Write { path, source } => {
                write!(f, "cannot write workbook `{}`: {source}", path.display())
            }
            Self::Read { path, source } => {
                write!(f, "cannot read workbook `{}`: {source}", path.display())
            }
            Self::InvalidRow {
                sheet,
                line,
                message,
            } => write!(f, "invalid row {line} in sheet `{sheet}`: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TransferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Write { source, .. } => Some(source),
            Self::Read { source, .. } => Some(source),
            Self::InvalidRow { .. } => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for TransferError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}
