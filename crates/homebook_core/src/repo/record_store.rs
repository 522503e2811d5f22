//! Record store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide insert/update/delete/get/list/query/count over the four
//!   record collections through one generic API.
//! - Provide atomic bulk import and clear-all.
//! - Publish change notifications so callers can recompute derived views.
//!
//! # Invariants
//! - `list_all` and `query_by_field` return rows in creation order.
//! - `update` always restamps `modified_at`.
//! - Notifications are sent only after the SQL statement (or transaction)
//!   has committed.

use super::records::{Collection, RefField, StoredRecord};
use crate::db::DbError;
use crate::model::flat::Flat;
use crate::model::party::Party;
use crate::model::project::Project;
use crate::model::transaction::Transaction;
use crate::model::{now_epoch_ms, RecordId, RecordValidationError};
use log::{debug, info};
use rusqlite::{params_from_iter, Connection};
use std::cell::RefCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{channel, Receiver, Sender};

pub type RepoResult<T> = Result<T, RepoError>;

/// Store-level error for record persistence and queries.
#[derive(Debug)]
pub enum RepoError {
    Validation(RecordValidationError),
    Db(DbError),
    NotFound {
        collection: Collection,
        id: RecordId,
    },
    UnsupportedField {
        collection: Collection,
        field: RefField,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { collection, id } => {
                write!(f, "{} record not found: {id}", collection.label())
            }
            Self::UnsupportedField { collection, field } => write!(
                f,
                "{} records cannot be queried by {}",
                collection.label(),
                field.column()
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RecordValidationError> for RepoError {
    fn from(value: RecordValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Kind of mutation announced to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
    Imported,
    Cleared,
}

/// One committed mutation.
///
/// `id` is `None` for bulk operations that touch a whole collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreChange {
    pub collection: Collection,
    pub kind: ChangeKind,
    pub id: Option<RecordId>,
}

/// Full content of the four collections, used for bulk export and import.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSnapshot {
    pub projects: Vec<Project>,
    pub parties: Vec<Party>,
    pub flats: Vec<Flat>,
    pub transactions: Vec<Transaction>,
}

impl RecordSnapshot {
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
            && self.parties.is_empty()
            && self.flats.is_empty()
            && self.transactions.is_empty()
    }
}

/// Row counts written by one bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub projects: usize,
    pub parties: usize,
    pub flats: usize,
    pub transactions: usize,
}

/// Key-indexed record store over the four bookkeeping collections.
pub trait RecordStore {
    fn insert<R: StoredRecord>(&self, record: &R) -> RepoResult<RecordId>;
    /// Replaces a record by id and returns it with a fresh `modified_at`.
    fn update<R: StoredRecord>(&self, record: &R) -> RepoResult<R>;
    fn delete<R: StoredRecord>(&self, id: RecordId) -> RepoResult<()>;
    fn get<R: StoredRecord>(&self, id: RecordId) -> RepoResult<Option<R>>;
    fn list_all<R: StoredRecord>(&self) -> RepoResult<Vec<R>>;
    fn query_by_field<R: StoredRecord>(
        &self,
        field: RefField,
        value: RecordId,
    ) -> RepoResult<Vec<R>>;
    fn count_by_field<R: StoredRecord>(
        &self,
        field: RefField,
        value: RecordId,
    ) -> RepoResult<u64>;
    /// Upserts every record of the snapshot inside one transaction.
    fn import_snapshot(&self, snapshot: &RecordSnapshot) -> RepoResult<ImportSummary>;
    /// Deletes every record of every collection inside one transaction.
    fn clear_all(&self) -> RepoResult<()>;
    /// Registers a new change-notification receiver.
    fn subscribe(&self) -> Receiver<StoreChange>;

    /// Applies `patch` to the current record and persists the result.
    fn update_with<R, F>(&self, id: RecordId, patch: F) -> RepoResult<R>
    where
        R: StoredRecord,
        F: FnOnce(&mut R),
    {
        let mut record = self.get::<R>(id)?.ok_or(RepoError::NotFound {
            collection: R::COLLECTION,
            id,
        })?;
        patch(&mut record);
        self.update(&record)
    }

    /// Reads all four collections.
    fn snapshot(&self) -> RepoResult<RecordSnapshot> {
        Ok(RecordSnapshot {
            projects: self.list_all()?,
            parties: self.list_all()?,
            flats: self.list_all()?,
            transactions: self.list_all()?,
        })
    }
}

/// SQLite-backed record store over a migrated connection.
pub struct SqliteRecordStore<'conn> {
    conn: &'conn Connection,
    observers: RefCell<Vec<Sender<StoreChange>>>,
}

impl<'conn> SqliteRecordStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            observers: RefCell::new(Vec::new()),
        }
    }

    fn notify(&self, collection: Collection, kind: ChangeKind, id: Option<RecordId>) {
        let change = StoreChange {
            collection,
            kind,
            id,
        };
        self.observers
            .borrow_mut()
            .retain(|sender| sender.send(change).is_ok());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Insert,
    Upsert,
}

fn write_record<R: StoredRecord>(conn: &Connection, record: &R, mode: WriteMode) -> RepoResult<()> {
    record.validate()?;

    let verb = match mode {
        WriteMode::Insert => "INSERT",
        WriteMode::Upsert => "INSERT OR REPLACE",
    };
    let placeholders = (1..=R::COLUMNS.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "{verb} INTO {} ({}) VALUES ({placeholders});",
        R::COLLECTION.table(),
        R::COLUMNS.join(", ")
    );
    conn.execute(&sql, params_from_iter(record.to_values()))?;
    Ok(())
}

fn select_sql<R: StoredRecord>() -> String {
    format!("SELECT {} FROM {}", R::COLUMNS.join(", "), R::COLLECTION.table())
}

fn ensure_field<R: StoredRecord>(field: RefField) -> RepoResult<()> {
    if R::COLLECTION.supports(field) {
        return Ok(());
    }
    Err(RepoError::UnsupportedField {
        collection: R::COLLECTION,
        field,
    })
}

fn load_rows<R: StoredRecord>(
    conn: &Connection,
    sql: &str,
    bind: Option<String>,
) -> RepoResult<Vec<R>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(bind))?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(R::from_row(row)?);
    }
    Ok(records)
}

impl RecordStore for SqliteRecordStore<'_> {
    fn insert<R: StoredRecord>(&self, record: &R) -> RepoResult<RecordId> {
        write_record(self.conn, record, WriteMode::Insert)?;
        debug!(
            "event=record_insert module=repo status=ok collection={}",
            R::COLLECTION.table()
        );
        self.notify(R::COLLECTION, ChangeKind::Inserted, Some(record.id()));
        Ok(record.id())
    }

    fn update<R: StoredRecord>(&self, record: &R) -> RepoResult<R> {
        let mut stamped = record.clone();
        stamped.set_modified_at(now_epoch_ms());
        stamped.validate()?;

        let assignments = R::COLUMNS
            .iter()
            .enumerate()
            .skip(1)
            .map(|(index, column)| format!("{column} = ?{}", index + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {assignments} WHERE id = ?1;",
            R::COLLECTION.table()
        );
        let changed = self
            .conn
            .execute(&sql, params_from_iter(stamped.to_values()))?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                collection: R::COLLECTION,
                id: record.id(),
            });
        }

        self.notify(R::COLLECTION, ChangeKind::Updated, Some(stamped.id()));
        Ok(stamped)
    }

    fn delete<R: StoredRecord>(&self, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1;", R::COLLECTION.table()),
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                collection: R::COLLECTION,
                id,
            });
        }

        self.notify(R::COLLECTION, ChangeKind::Deleted, Some(id));
        Ok(())
    }

    fn get<R: StoredRecord>(&self, id: RecordId) -> RepoResult<Option<R>> {
        let sql = format!("{} WHERE id = ?1;", select_sql::<R>());
        Ok(load_rows(self.conn, &sql, Some(id.to_string()))?
            .into_iter()
            .next())
    }

    fn list_all<R: StoredRecord>(&self) -> RepoResult<Vec<R>> {
        let sql = format!("{} ORDER BY created_at ASC, rowid ASC;", select_sql::<R>());
        load_rows(self.conn, &sql, None)
    }

    fn query_by_field<R: StoredRecord>(
        &self,
        field: RefField,
        value: RecordId,
    ) -> RepoResult<Vec<R>> {
        ensure_field::<R>(field)?;
        let sql = format!(
            "{} WHERE {} = ?1 ORDER BY created_at ASC, rowid ASC;",
            select_sql::<R>(),
            field.column()
        );
        load_rows(self.conn, &sql, Some(value.to_string()))
    }

    fn count_by_field<R: StoredRecord>(
        &self,
        field: RefField,
        value: RecordId,
    ) -> RepoResult<u64> {
        ensure_field::<R>(field)?;
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?1;",
            R::COLLECTION.table(),
            field.column()
        );
        let count: i64 = self
            .conn
            .query_row(&sql, [value.to_string()], |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative row count `{count}`")))
    }

    fn import_snapshot(&self, snapshot: &RecordSnapshot) -> RepoResult<ImportSummary> {
        let tx = self.conn.unchecked_transaction()?;
        for project in &snapshot.projects {
            write_record(&tx, project, WriteMode::Upsert)?;
        }
        for party in &snapshot.parties {
            write_record(&tx, party, WriteMode::Upsert)?;
        }
        for flat in &snapshot.flats {
            write_record(&tx, flat, WriteMode::Upsert)?;
        }
        for transaction in &snapshot.transactions {
            write_record(&tx, transaction, WriteMode::Upsert)?;
        }
        tx.commit()?;

        let summary = ImportSummary {
            projects: snapshot.projects.len(),
            parties: snapshot.parties.len(),
            flats: snapshot.flats.len(),
            transactions: snapshot.transactions.len(),
        };
        info!(
            "event=records_import module=repo status=ok projects={} parties={} flats={} transactions={}",
            summary.projects, summary.parties, summary.flats, summary.transactions
        );
        for collection in Collection::ALL {
            self.notify(collection, ChangeKind::Imported, None);
        }
        Ok(summary)
    }

    fn clear_all(&self) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for collection in Collection::ALL {
            tx.execute(&format!("DELETE FROM {};", collection.table()), [])?;
        }
        tx.commit()?;

        info!("event=records_clear module=repo status=ok");
        for collection in Collection::ALL {
            self.notify(collection, ChangeKind::Cleared, None);
        }
        Ok(())
    }

    fn subscribe(&self) -> Receiver<StoreChange> {
        let (sender, receiver) = channel();
        self.observers.borrow_mut().push(sender);
        receiver
    }
}
