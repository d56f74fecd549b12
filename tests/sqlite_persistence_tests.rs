#![cfg(feature = "sqlite")]

use chrono::NaiveDate;
use contract_progress::schedule::entries;
use contract_progress::{
    Addendum, Contract, MonthKey, PersistenceError, ScheduleError, ScheduleService, ScheduleStore,
    ServiceError, SqliteScheduleStore, WeekKey, WeekUpdate, generate_schedule,
};
use std::sync::Arc;
use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn key(y: i32, m: u32, week: u32) -> WeekKey {
    WeekKey::new(MonthKey::new(y, m).unwrap(), week)
}

fn contract() -> Contract {
    let mut contract = Contract::new(3, "Irigasi Tersier", d(2024, 12, 16), 40, 750_000.0);
    contract
        .add_addendum(Addendum::new(1, d(2025, 1, 2), 0, 50_000.0))
        .unwrap();
    contract
}

#[test]
fn sqlite_store_round_trip_contract_and_schedule() {
    let file = NamedTempFile::new().unwrap();
    let store = SqliteScheduleStore::new(file.path()).unwrap();
    let contract = contract();
    let groups = generate_schedule(contract.start_date, 40).unwrap();

    store.save_contract(&contract).unwrap();
    store.upsert_weeks(contract.id, &groups).unwrap();
    drop(store);

    let reopened = SqliteScheduleStore::new(file.path()).unwrap();
    assert_eq!(reopened.load_contract(3).unwrap(), Some(contract));
    let loaded = reopened.load_weeks(3).unwrap();
    assert_eq!(loaded, groups);

    let months: Vec<String> = loaded.iter().map(|g| g.month.to_string()).collect();
    assert_eq!(months, vec!["2024-12", "2025-01"]);
}

#[test]
fn update_week_touches_updated_at_and_recomputes_deviation() {
    let store = SqliteScheduleStore::in_memory().unwrap();
    let contract = contract();
    store.save_contract(&contract).unwrap();
    store
        .upsert_weeks(contract.id, &generate_schedule(contract.start_date, 40).unwrap())
        .unwrap();

    let before = store.find_week(3, key(2025, 1, 1)).unwrap().unwrap();
    let updated = store
        .update_week(3, key(2025, 1, 1), &WeekUpdate::both(6.0, 7.5))
        .unwrap();
    assert_eq!(updated.deviasi(), 1.5);

    let after = store.find_week(3, key(2025, 1, 1)).unwrap().unwrap();
    assert_eq!(after.entry, updated);
    assert!(after.updated_at >= before.updated_at);
}

#[test]
fn update_of_unknown_week_is_not_found() {
    let store = SqliteScheduleStore::in_memory().unwrap();
    let contract = contract();
    store.save_contract(&contract).unwrap();

    let err = store
        .update_week(3, key(2025, 1, 1), &WeekUpdate::rencana(1.0))
        .unwrap_err();
    assert!(matches!(
        err,
        PersistenceError::Schedule(ScheduleError::NotFound(k)) if k == key(2025, 1, 1)
    ));
}

#[test]
fn writes_for_unknown_contract_are_rejected() {
    let store = SqliteScheduleStore::in_memory().unwrap();
    let groups = generate_schedule(d(2024, 1, 1), 10).unwrap();
    let err = store.upsert_weeks(42, &groups).unwrap_err();
    assert!(matches!(err, PersistenceError::ContractNotFound(42)));
    assert!(store.load_weeks(42).unwrap().is_empty());
}

#[test]
fn replace_weeks_drops_stale_rows() {
    let store = SqliteScheduleStore::in_memory().unwrap();
    let contract = contract();
    store.save_contract(&contract).unwrap();
    store
        .upsert_weeks(3, &generate_schedule(contract.start_date, 40).unwrap())
        .unwrap();

    let shorter = generate_schedule(contract.start_date, 10).unwrap();
    store.replace_weeks(3, &shorter).unwrap();
    let loaded = store.load_weeks(3).unwrap();
    assert_eq!(loaded, shorter);
    assert_eq!(entries(&loaded).last().unwrap().end_date, d(2024, 12, 25));
}

#[test]
fn delete_contract_removes_weeks() {
    let store = SqliteScheduleStore::in_memory().unwrap();
    let contract = contract();
    store.save_contract(&contract).unwrap();
    store
        .upsert_weeks(3, &generate_schedule(contract.start_date, 40).unwrap())
        .unwrap();

    assert!(store.delete_contract(3).unwrap());
    assert!(store.load_contract(3).unwrap().is_none());
    assert!(store.load_weeks(3).unwrap().is_empty());
    assert!(store.list_contracts().unwrap().is_empty());
}

/// Make SQLite abort any insert of a week of January 2025.
fn reject_january_weeks(file: &NamedTempFile) {
    let conn = rusqlite::Connection::open(file.path()).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_january BEFORE INSERT ON contract_weeks
         WHEN NEW.month = '2025-01'
         BEGIN SELECT RAISE(ABORT, 'january is closed'); END;",
    )
    .unwrap();
}

#[test]
fn failing_row_rolls_back_the_whole_insert() {
    let file = NamedTempFile::new().unwrap();
    let store = SqliteScheduleStore::new(file.path()).unwrap();
    reject_january_weeks(&file);

    let contract = contract();
    let groups = generate_schedule(contract.start_date, 40).unwrap();
    let err = store.insert_contract(&contract, &groups).unwrap_err();
    assert!(matches!(err, PersistenceError::Sqlite(_)));
    assert!(store.load_contract(3).unwrap().is_none());
    assert!(store.load_weeks(3).unwrap().is_empty());

    store.save_contract(&contract).unwrap();
    assert!(store.upsert_weeks(3, &groups).is_err());
    assert!(store.load_weeks(3).unwrap().is_empty());
}

#[test]
fn failing_row_keeps_contract_before_addendum() {
    let file = NamedTempFile::new().unwrap();
    let store = Arc::new(SqliteScheduleStore::new(file.path()).unwrap());
    let service = ScheduleService::new(store.clone());
    let contract = Contract::new(3, "Irigasi Tersier", d(2024, 12, 16), 10, 750_000.0);
    service.create_contract(contract.clone()).unwrap();
    service
        .update_week(3, key(2024, 12, 1), &WeekUpdate::both(20.0, 15.0))
        .unwrap();
    let before = service.schedule(3).unwrap();
    reject_january_weeks(&file);

    let err = service
        .apply_addendum(3, Addendum::new(1, d(2024, 12, 20), 30, 0.0))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Persistence(PersistenceError::Sqlite(_))));
    assert_eq!(service.contract(3).unwrap(), contract);
    assert_eq!(service.schedule(3).unwrap(), before);
}

#[test]
fn duplicate_insert_reports_existing_contract() {
    let store = SqliteScheduleStore::in_memory().unwrap();
    let contract = contract();
    let groups = generate_schedule(contract.start_date, 40).unwrap();
    store.insert_contract(&contract, &groups).unwrap();

    let err = store.insert_contract(&contract, &[]).unwrap_err();
    assert!(matches!(err, PersistenceError::ContractExists(3)));
    assert_eq!(store.load_weeks(3).unwrap(), groups);
}

#[test]
fn rewriting_unchanged_weeks_keeps_updated_at() {
    let store = SqliteScheduleStore::in_memory().unwrap();
    let contract = contract();
    let groups = generate_schedule(contract.start_date, 40).unwrap();
    store.insert_contract(&contract, &groups).unwrap();
    store
        .update_week(3, key(2025, 1, 2), &WeekUpdate::rencana(12.0))
        .unwrap();
    let edited = store.find_week(3, key(2025, 1, 2)).unwrap().unwrap();
    let first = store.find_week(3, key(2024, 12, 1)).unwrap().unwrap();

    std::thread::sleep(std::time::Duration::from_millis(5));
    let (_, regenerated) = store
        .modify_contract(3, &mut |_: &mut Contract, existing: &[contract_progress::MonthGroup]| {
            Ok(Some(existing.to_vec()))
        })
        .unwrap();
    assert_eq!(regenerated, store.load_weeks(3).unwrap());
    assert_eq!(store.find_week(3, key(2025, 1, 2)).unwrap().unwrap(), edited);
    assert_eq!(store.find_week(3, key(2024, 12, 1)).unwrap().unwrap(), first);

    let mut changed = generate_schedule(contract.start_date, 40).unwrap();
    contract_progress::schedule::update_in_groups(
        &mut changed,
        key(2024, 12, 1),
        &WeekUpdate::realisasi(3.0),
    )
    .unwrap();
    store.replace_weeks(3, &changed).unwrap();
    let touched = store.find_week(3, key(2024, 12, 1)).unwrap().unwrap();
    assert!(touched.updated_at > first.updated_at);
}
