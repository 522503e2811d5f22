use chrono::NaiveDate;
use homebook_core::db::open_db_in_memory;
use homebook_core::{
    ChangeKind, Collection, Flat, Party, Project, RecordSnapshot, RecordStore, RefField,
    RepoError, SqliteRecordStore, StoreChange, Transaction,
};
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn insert_get_and_list_in_creation_order() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::new(&conn);

    let first = Project::new("Sunrise Towers").with_notes("phase 1");
    let second = Project::new("Lake View");
    store.insert(&first).unwrap();
    store.insert(&second).unwrap();

    let loaded = store.get::<Project>(first.id).unwrap().unwrap();
    assert_eq!(loaded, first);

    let names: Vec<String> = store
        .list_all::<Project>()
        .unwrap()
        .into_iter()
        .map(|project| project.name)
        .collect();
    assert_eq!(names, vec!["Sunrise Towers", "Lake View"]);
}

#[test]
fn flat_and_transaction_fields_survive_storage() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::new(&conn);
    let project = Project::new("P");
    let party = Party::new("John").with_contact("555-0100");
    let flat = Flat::new(project.id, "A1", 1000.0, 4.5).assigned_to(party.id);
    let transaction = Transaction::new(project.id, 100.0, 50.0, date(2024, 11, 1))
        .for_flat(flat.id, flat.party_id);

    store.insert(&party).unwrap();
    store.insert(&flat).unwrap();
    store.insert(&transaction).unwrap();

    let flat_loaded = store.get::<Flat>(flat.id).unwrap().unwrap();
    assert_eq!(flat_loaded.amount, 4500.0);
    assert_eq!(flat_loaded.party_id, Some(party.id));

    let transaction_loaded = store.get::<Transaction>(transaction.id).unwrap().unwrap();
    assert_eq!(transaction_loaded.total_amount, 150.0);
    assert_eq!(transaction_loaded.transaction_date, date(2024, 11, 1));
    assert_eq!(transaction_loaded.flat_id, Some(flat.id));
}

#[test]
fn blank_names_are_rejected_at_write_time() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::new(&conn);

    let err = store.insert(&Party::new("   ")).unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
    assert!(store.list_all::<Party>().unwrap().is_empty());
}

#[test]
fn update_with_patches_and_restamps() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::new(&conn);
    let mut party = Party::new("John");
    party.modified_at = 0;
    store.insert(&party).unwrap();

    let updated = store
        .update_with(party.id, |party: &mut Party| {
            party.address = Some("12 Hill Road".to_string())
        })
        .unwrap();

    assert_eq!(updated.address.as_deref(), Some("12 Hill Road"));
    assert!(updated.modified_at > 0);
    assert_eq!(store.get::<Party>(party.id).unwrap().unwrap(), updated);
}

#[test]
fn update_and_delete_of_missing_record_report_not_found() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::new(&conn);
    let ghost = Project::new("Ghost");

    assert!(matches!(
        store.update(&ghost).unwrap_err(),
        RepoError::NotFound {
            collection: Collection::Projects,
            ..
        }
    ));
    assert!(matches!(
        store.delete::<Project>(ghost.id).unwrap_err(),
        RepoError::NotFound { .. }
    ));
    assert!(matches!(
        store
            .update_with(ghost.id, |project: &mut Project| project.notes = None)
            .unwrap_err(),
        RepoError::NotFound { .. }
    ));
}

#[test]
fn query_and_count_by_reference_field() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::new(&conn);
    let project = Uuid::new_v4();
    let other_project = Uuid::new_v4();
    let party = Uuid::new_v4();

    store
        .insert(&Flat::new(project, "A1", 10.0, 10.0).assigned_to(party))
        .unwrap();
    store.insert(&Flat::new(project, "A2", 10.0, 10.0)).unwrap();
    store
        .insert(&Flat::new(other_project, "B1", 10.0, 10.0).assigned_to(party))
        .unwrap();

    let in_project: Vec<Flat> = store.query_by_field(RefField::ProjectId, project).unwrap();
    assert_eq!(in_project.len(), 2);
    assert_eq!(
        store
            .count_by_field::<Flat>(RefField::PartyId, party)
            .unwrap(),
        2
    );
    assert_eq!(
        store
            .count_by_field::<Transaction>(RefField::ProjectId, project)
            .unwrap(),
        0
    );
}

#[test]
fn reference_fields_must_exist_on_the_collection() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::new(&conn);

    let err = store
        .query_by_field::<Flat>(RefField::FlatId, Uuid::new_v4())
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::UnsupportedField {
            collection: Collection::Flats,
            field: RefField::FlatId
        }
    ));
    assert!(store
        .count_by_field::<Project>(RefField::ProjectId, Uuid::new_v4())
        .is_err());
}

#[test]
fn subscribers_see_each_committed_mutation() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::new(&conn);
    let changes = store.subscribe();

    let project = Project::new("P");
    store.insert(&project).unwrap();
    store
        .update_with(project.id, |project: &mut Project| {
            project.name = "P2".to_string()
        })
        .unwrap();
    store.delete::<Project>(project.id).unwrap();
    let _ = store.insert(&Project::new(""));

    let seen: Vec<StoreChange> = changes.try_iter().collect();
    assert_eq!(
        seen.iter().map(|change| change.kind).collect::<Vec<_>>(),
        vec![ChangeKind::Inserted, ChangeKind::Updated, ChangeKind::Deleted]
    );
    assert!(seen.iter().all(|change| change.id == Some(project.id)));
}

#[test]
fn dropped_subscribers_do_not_break_notification() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::new(&conn);
    drop(store.subscribe());
    let live = store.subscribe();

    store.insert(&Project::new("P")).unwrap();

    assert_eq!(live.try_iter().count(), 1);
}

#[test]
fn import_upserts_all_collections_atomically() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::new(&conn);
    let mut project = Project::new("Old name");
    store.insert(&project).unwrap();
    project.name = "New name".to_string();

    let snapshot = RecordSnapshot {
        projects: vec![project.clone()],
        parties: vec![Party::new("John")],
        flats: vec![Flat::new(project.id, "A1", 10.0, 10.0)],
        transactions: vec![Transaction::new(project.id, 5.0, 0.0, date(2024, 1, 1))],
    };
    let summary = store.import_snapshot(&snapshot).unwrap();

    assert_eq!(summary.projects, 1);
    assert_eq!(summary.transactions, 1);
    let projects = store.list_all::<Project>().unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].name, "New name");
    assert_eq!(store.snapshot().unwrap(), snapshot);
}

#[test]
fn failing_import_leaves_store_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::new(&conn);
    let existing = Party::new("Existing");
    store.insert(&existing).unwrap();
    let before = store.snapshot().unwrap();

    let snapshot = RecordSnapshot {
        projects: vec![Project::new("Fine")],
        parties: vec![Party::new("")],
        ..RecordSnapshot::default()
    };
    assert!(store.import_snapshot(&snapshot).is_err());

    assert_eq!(store.snapshot().unwrap(), before);
}

#[test]
fn clear_all_empties_every_collection() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::new(&conn);
    let project = Project::new("P");
    store.insert(&project).unwrap();
    store.insert(&Party::new("John")).unwrap();
    store
        .insert(&Flat::new(project.id, "A1", 1.0, 1.0))
        .unwrap();
    let changes = store.subscribe();

    store.clear_all().unwrap();

    assert!(store.snapshot().unwrap().is_empty());
    let cleared: Vec<Collection> = changes
        .try_iter()
        .filter(|change| change.kind == ChangeKind::Cleared)
        .map(|change| change.collection)
        .collect();
    assert_eq!(cleared.len(), 4);
}
