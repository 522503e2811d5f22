//! Record lifecycle use-cases.
//!
//! # Responsibility
//! - Create and edit projects, parties, flats and transactions with their
//!   derived amounts computed at write time.
//! - Guard deletes: a record that is still referenced cannot be removed.
//!
//! # Invariants
//! - Referential integrity is checked only when deleting, never on write.
//! - A blocked delete performs no store mutation.

use crate::model::flat::Flat;
use crate::model::party::Party;
use crate::model::project::Project;
use crate::model::transaction::{Transaction, TransactionMode};
use crate::model::{RecordId, RecordValidationError};
use crate::repo::record_store::{RecordStore, RepoError};
use crate::repo::{Collection, RefField, StoredRecord};
use chrono::NaiveDate;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from record lifecycle operations.
#[derive(Debug)]
pub enum RecordServiceError {
    Validation(RecordValidationError),
    NotFound {
        collection: Collection,
        id: RecordId,
    },
    /// Delete blocked because other records still reference the target.
    DependentRecordsExist {
        collection: Collection,
        id: RecordId,
        flats: u64,
        transactions: u64,
    },
    Repo(RepoError),
}

impl Display for RecordServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { collection, id } => {
                write!(f, "{} not found: {id}", collection.label())
            }
            Self::DependentRecordsExist {
                collection,
                flats,
                transactions,
                ..
            } => {
                if *flats > 0 {
                    write!(
                        f,
                        "Cannot delete {}: it has {flats} dependent flats and {transactions} dependent transactions.",
                        collection.label()
                    )
                } else {
                    write!(
                        f,
                        "Cannot delete {}: it has {transactions} dependent transactions.",
                        collection.label()
                    )
                }
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RecordServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for RecordServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { collection, id } => Self::NotFound { collection, id },
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

pub type RecordServiceResult<T> = Result<T, RecordServiceError>;

/// Input for a new flat; `amount` is derived.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFlat {
    pub project_id: RecordId,
    pub party_id: Option<RecordId>,
    pub flat_no: String,
    pub area_sqft: f64,
    pub rate_per_sqft: f64,
    pub notes: Option<String>,
}

/// Input for a new or edited transaction; `total_amount` is derived.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub project_id: RecordId,
    pub party_id: Option<RecordId>,
    pub flat_id: Option<RecordId>,
    pub bank_amount: f64,
    pub cash_amount: f64,
    pub transaction_date: NaiveDate,
    pub reference: Option<String>,
    pub remarks: Option<String>,
}

/// Record lifecycle facade over a record store.
pub struct RecordService<'s, S: RecordStore> {
    store: &'s S,
}

impl<'s, S: RecordStore> RecordService<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    pub fn create_project(
        &self,
        name: &str,
        notes: Option<&str>,
    ) -> RecordServiceResult<Project> {
        let mut project = Project::new(name.trim());
        project.notes = clean_optional(notes);
        self.store.insert(&project)?;
        Ok(project)
    }

    pub fn rename_project(
        &self,
        id: RecordId,
        name: &str,
        notes: Option<&str>,
    ) -> RecordServiceResult<Project> {
        let notes = clean_optional(notes);
        Ok(self.store.update_with(id, |project: &mut Project| {
            project.name = name.trim().to_string();
            project.notes = notes;
        })?)
    }

    pub fn create_party(
        &self,
        name: &str,
        contact: Option<&str>,
        address: Option<&str>,
    ) -> RecordServiceResult<Party> {
        let mut party = Party::new(name.trim());
        party.contact = clean_optional(contact);
        party.address = clean_optional(address);
        self.store.insert(&party)?;
        Ok(party)
    }

    /// Replaces a party's name, contact and address.
    pub fn update_party(
        &self,
        id: RecordId,
        name: &str,
        contact: Option<&str>,
        address: Option<&str>,
    ) -> RecordServiceResult<Party> {
        let contact = clean_optional(contact);
        let address = clean_optional(address);
        let party = self.store.update_with(id, |party: &mut Party| {
            party.name = name.trim().to_string();
            party.contact = contact;
            party.address = address;
        })?;
        info!("event=record_update module=records status=ok collection=parties");
        Ok(party)
    }

    pub fn create_flat(&self, input: NewFlat) -> RecordServiceResult<Flat> {
        let mut flat = Flat::new(
            input.project_id,
            input.flat_no.trim(),
            input.area_sqft,
            input.rate_per_sqft,
        );
        flat.party_id = input.party_id;
        flat.notes = clean_optional(input.notes.as_deref());
        self.store.insert(&flat)?;
        Ok(flat)
    }

    /// Edits a flat's area/rate and re-derives its amount.
    pub fn reprice_flat(
        &self,
        id: RecordId,
        area_sqft: f64,
        rate_per_sqft: f64,
    ) -> RecordServiceResult<Flat> {
        Ok(self.store.update_with(id, |flat: &mut Flat| {
            flat.area_sqft = area_sqft;
            flat.rate_per_sqft = rate_per_sqft;
            flat.recompute_amount();
        })?)
    }

    pub fn assign_flat(
        &self,
        id: RecordId,
        party_id: Option<RecordId>,
    ) -> RecordServiceResult<Flat> {
        Ok(self
            .store
            .update_with(id, |flat: &mut Flat| flat.party_id = party_id)?)
    }

    /// Records a manually entered receipt.
    pub fn record_transaction(&self, input: NewTransaction) -> RecordServiceResult<Transaction> {
        let mut transaction = Transaction::new(
            input.project_id,
            input.bank_amount,
            input.cash_amount,
            input.transaction_date,
        )
        .with_mode(TransactionMode::Receipt);
        transaction.party_id = input.party_id;
        transaction.flat_id = input.flat_id;
        transaction.reference = clean_optional(input.reference.as_deref());
        transaction.remarks = clean_optional(input.remarks.as_deref());
        self.store.insert(&transaction)?;
        Ok(transaction)
    }

    /// Replaces every editable field of a transaction and re-derives its
    /// total. `mode` and `created_at` are kept.
    pub fn edit_transaction(
        &self,
        id: RecordId,
        input: NewTransaction,
    ) -> RecordServiceResult<Transaction> {
        let reference = clean_optional(input.reference.as_deref());
        let remarks = clean_optional(input.remarks.as_deref());
        let transaction = self.store.update_with(id, |transaction: &mut Transaction| {
            transaction.project_id = input.project_id;
            transaction.party_id = input.party_id;
            transaction.flat_id = input.flat_id;
            transaction.bank_amount = input.bank_amount;
            transaction.cash_amount = input.cash_amount;
            transaction.transaction_date = input.transaction_date;
            transaction.reference = reference;
            transaction.remarks = remarks;
            transaction.recompute_total();
        })?;
        info!("event=record_update module=records status=ok collection=transactions");
        Ok(transaction)
    }

    /// Deletes a project unless flats or transactions reference it.
    pub fn delete_project(&self, id: RecordId) -> RecordServiceResult<()> {
        self.ensure_exists::<Project>(id)?;
        let flats = self.store.count_by_field::<Flat>(RefField::ProjectId, id)?;
        let transactions = self
            .store
            .count_by_field::<Transaction>(RefField::ProjectId, id)?;
        self.guarded_delete::<Project>(id, flats, transactions)
    }

    /// Deletes a party unless flats or transactions reference it.
    pub fn delete_party(&self, id: RecordId) -> RecordServiceResult<()> {
        self.ensure_exists::<Party>(id)?;
        let flats = self.store.count_by_field::<Flat>(RefField::PartyId, id)?;
        let transactions = self
            .store
            .count_by_field::<Transaction>(RefField::PartyId, id)?;
        self.guarded_delete::<Party>(id, flats, transactions)
    }

    /// Deletes a flat unless transactions reference it.
    pub fn delete_flat(&self, id: RecordId) -> RecordServiceResult<()> {
        self.ensure_exists::<Flat>(id)?;
        let transactions = self
            .store
            .count_by_field::<Transaction>(RefField::FlatId, id)?;
        self.guarded_delete::<Flat>(id, 0, transactions)
    }

    /// Transactions are leaves and delete unconditionally.
    pub fn delete_transaction(&self, id: RecordId) -> RecordServiceResult<()> {
        self.store.delete::<Transaction>(id)?;
        info!("event=record_delete module=records status=ok collection=transactions");
        Ok(())
    }

    /// Dispatches a delete by collection.
    pub fn delete(&self, collection: Collection, id: RecordId) -> RecordServiceResult<()> {
        match collection {
            Collection::Projects => self.delete_project(id),
            Collection::Parties => self.delete_party(id),
            Collection::Flats => self.delete_flat(id),
            Collection::Transactions => self.delete_transaction(id),
        }
    }

    fn ensure_exists<R: StoredRecord>(&self, id: RecordId) -> RecordServiceResult<()> {
        match self.store.get::<R>(id)? {
            Some(_) => Ok(()),
            None => Err(RecordServiceError::NotFound {
                collection: R::COLLECTION,
                id,
            }),
        }
    }

    fn guarded_delete<R: StoredRecord>(
        &self,
        id: RecordId,
        flats: u64,
        transactions: u64,
    ) -> RecordServiceResult<()> {
        if flats > 0 || transactions > 0 {
            warn!(
                "event=record_delete module=records status=blocked collection={} flats={flats} transactions={transactions}",
                R::COLLECTION.table()
            );
            return Err(RecordServiceError::DependentRecordsExist {
                collection: R::COLLECTION,
                id,
                flats,
                transactions,
            });
        }

        self.store.delete::<R>(id)?;
        info!(
            "event=record_delete module=records status=ok collection={}",
            R::COLLECTION.table()
        );
        Ok(())
    }
}

fn clean_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
