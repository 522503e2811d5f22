use chrono::NaiveDate;
use homebook_core::db::open_db_in_memory;
use homebook_core::{
    Collection, Flat, NewFlat, NewTransaction, Party, Project, RecordService, RecordServiceError,
    RecordStore, SqliteRecordStore, Transaction, TransactionMode,
};
use uuid::Uuid;

fn new_flat(project_id: Uuid, party_id: Option<Uuid>, flat_no: &str) -> NewFlat {
    NewFlat {
        project_id,
        party_id,
        flat_no: flat_no.to_string(),
        area_sqft: 1000.0,
        rate_per_sqft: 1.0,
        notes: None,
    }
}

fn new_transaction(project_id: Uuid, flat_id: Option<Uuid>) -> NewTransaction {
    NewTransaction {
        project_id,
        party_id: None,
        flat_id,
        bank_amount: 100.0,
        cash_amount: 50.0,
        transaction_date: NaiveDate::from_ymd_opt(2024, 11, 1).unwrap(),
        reference: None,
        remarks: Some("  ".to_string()),
    }
}

#[test]
fn created_records_carry_derived_amounts() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::new(&conn);
    let records = RecordService::new(&store);

    let project = records.create_project("  Sunrise  ", Some("")).unwrap();
    assert_eq!(project.name, "Sunrise");
    assert_eq!(project.notes, None);

    let flat = records.create_flat(new_flat(project.id, None, "A1")).unwrap();
    assert_eq!(flat.amount, 1000.0);

    let repriced = records.reprice_flat(flat.id, 500.0, 3.0).unwrap();
    assert_eq!(repriced.amount, 1500.0);

    let transaction = records
        .record_transaction(new_transaction(project.id, Some(flat.id)))
        .unwrap();
    assert_eq!(transaction.total_amount, 150.0);
    assert_eq!(transaction.remarks, None);
    assert_eq!(transaction.mode, Some(TransactionMode::Receipt));
    assert_eq!(
        store.get::<Transaction>(transaction.id).unwrap().unwrap(),
        transaction
    );
}

#[test]
fn assigning_a_flat_links_it_to_the_party() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::new(&conn);
    let records = RecordService::new(&store);
    let project = records.create_project("P", None).unwrap();
    let party = records.create_party("John", Some("555"), None).unwrap();
    let flat = records.create_flat(new_flat(project.id, None, "A1")).unwrap();

    let assigned = records.assign_flat(flat.id, Some(party.id)).unwrap();

    assert_eq!(assigned.party_id, Some(party.id));
    assert_eq!(records.rename_project(project.id, "Q", None).unwrap().name, "Q");
}

#[test]
fn project_delete_is_blocked_by_flats_and_transactions() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::new(&conn);
    let records = RecordService::new(&store);
    let project = records.create_project("P", None).unwrap();
    let flat = records.create_flat(new_flat(project.id, None, "A1")).unwrap();
    records
        .record_transaction(new_transaction(project.id, Some(flat.id)))
        .unwrap();

    let err = records.delete_project(project.id).unwrap_err();
    match err {
        RecordServiceError::DependentRecordsExist {
            collection,
            flats,
            transactions,
            ..
        } => {
            assert_eq!(collection, Collection::Projects);
            assert_eq!(flats, 1);
            assert_eq!(transactions, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(store.get::<Project>(project.id).unwrap().is_some());
}

#[test]
fn flat_delete_is_blocked_only_by_transactions() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::new(&conn);
    let records = RecordService::new(&store);
    let project = records.create_project("P", None).unwrap();
    let flat = records.create_flat(new_flat(project.id, None, "A1")).unwrap();
    let transaction = records
        .record_transaction(new_transaction(project.id, Some(flat.id)))
        .unwrap();

    let err = records.delete(Collection::Flats, flat.id).unwrap_err();
    assert!(err
        .to_string()
        .contains("it has 1 dependent transactions"));

    records.delete_transaction(transaction.id).unwrap();
    records.delete_flat(flat.id).unwrap();
    assert!(store.get::<Flat>(flat.id).unwrap().is_none());
}

#[test]
fn party_delete_counts_assigned_flats() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::new(&conn);
    let records = RecordService::new(&store);
    let project = records.create_project("P", None).unwrap();
    let party = records.create_party("John", None, None).unwrap();
    records
        .create_flat(new_flat(project.id, Some(party.id), "A1"))
        .unwrap();

    assert!(matches!(
        records.delete_party(party.id),
        Err(RecordServiceError::DependentRecordsExist { flats: 1, .. })
    ));

    let loner = records.create_party("Loner", None, None).unwrap();
    records.delete(Collection::Parties, loner.id).unwrap();
    assert!(store.get::<Party>(loner.id).unwrap().is_none());
}

#[test]
fn deleting_missing_records_reports_not_found() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::new(&conn);
    let records = RecordService::new(&store);

    for collection in Collection::ALL {
        let err = records.delete(collection, Uuid::new_v4()).unwrap_err();
        assert!(
            matches!(err, RecordServiceError::NotFound { .. }),
            "{collection}: {err}"
        );
    }
}

#[test]
fn updating_a_party_replaces_its_details() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::new(&conn);
    let records = RecordService::new(&store);
    let party = records
        .create_party("John", Some("555"), Some("Old Street"))
        .unwrap();

    let updated = records
        .update_party(party.id, " John Doe ", Some("777"), Some(" "))
        .unwrap();

    assert_eq!(updated.id, party.id);
    assert_eq!(updated.name, "John Doe");
    assert_eq!(updated.contact.as_deref(), Some("777"));
    assert_eq!(updated.address, None);
    assert_eq!(updated.created_at, party.created_at);
    assert!(updated.modified_at >= party.modified_at);
    assert_eq!(store.get::<Party>(party.id).unwrap().unwrap(), updated);

    let err = records
        .update_party(Uuid::new_v4(), "Nobody", None, None)
        .unwrap_err();
    assert!(matches!(err, RecordServiceError::NotFound { .. }));
}

#[test]
fn editing_a_transaction_recomputes_total_and_keeps_mode() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::new(&conn);
    let records = RecordService::new(&store);
    let project = records.create_project("P", None).unwrap();
    let other = records.create_project("Q", None).unwrap();
    let party = records.create_party("John", None, None).unwrap();
    let flat = records.create_flat(new_flat(other.id, Some(party.id), "B1")).unwrap();
    let original = records
        .record_transaction(new_transaction(project.id, None))
        .unwrap();

    let edited = records
        .edit_transaction(
            original.id,
            NewTransaction {
                project_id: other.id,
                party_id: Some(party.id),
                flat_id: Some(flat.id),
                bank_amount: 300.0,
                cash_amount: 25.5,
                transaction_date: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
                reference: Some(" CHQ-1 ".to_string()),
                remarks: None,
            },
        )
        .unwrap();

    assert_eq!(edited.id, original.id);
    assert_eq!(edited.project_id, other.id);
    assert_eq!(edited.flat_id, Some(flat.id));
    assert_eq!(edited.total_amount, 325.5);
    assert_eq!(edited.reference.as_deref(), Some("CHQ-1"));
    assert_eq!(edited.mode, Some(TransactionMode::Receipt));
    assert_eq!(edited.created_at, original.created_at);
    assert_eq!(store.get::<Transaction>(original.id).unwrap().unwrap(), edited);
    assert_eq!(store.list_all::<Transaction>().unwrap().len(), 1);
}
