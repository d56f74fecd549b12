use crate::contract::{Contract, ContractError, ContractId};
use crate::schedule::{self, MonthGroup, ScheduleError, WeekEntry, WeekKey, WeekUpdate};
use crate::validation::{self, ValidationError};
use chrono::{DateTime, Utc};
use serde_json::Error as SerdeJsonError;
use std::collections::BTreeMap;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] SerdeJsonError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("contract {0} not found")]
    ContractNotFound(ContractId),
    #[error("contract {0} already exists")]
    ContractExists(ContractId),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Contract(#[from] ContractError),
    /// A contract change refused by boundary validation.
    #[error(transparent)]
    Rejected(ValidationError),
    #[error("regenerating the schedule would discard recorded progress in week {0}")]
    ProgressWouldBeDiscarded(WeekKey),
}

impl From<ValidationError> for PersistenceError {
    fn from(value: ValidationError) -> Self {
        Self::InvalidData(value.to_string())
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// A persisted week together with its last modification time.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredWeek {
    pub entry: WeekEntry,
    pub updated_at: DateTime<Utc>,
}

/// Read-modify-write step run by [`ScheduleStore::modify_contract`].
///
/// Receives the stored contract (to edit in place) and its current schedule.
/// Returns the schedule to store instead, or `None` to keep the weeks.
pub type ContractChange<'a> =
    dyn FnMut(&mut Contract, &[MonthGroup]) -> PersistenceResult<Option<Vec<MonthGroup>>> + 'a;

/// Persistence handle for contracts and their weekly schedules.
///
/// Weeks are keyed by `(contract, month, week)`. Every method writing weeks
/// applies the whole batch or nothing. Rewriting a week with identical
/// values keeps its `updated_at`.
pub trait ScheduleStore: Send + Sync {
    /// Store a new contract together with its schedule. Fails with
    /// [`PersistenceError::ContractExists`] when the id is taken.
    fn insert_contract(&self, contract: &Contract, groups: &[MonthGroup])
    -> PersistenceResult<()>;
    /// Create or overwrite a contract and its whole schedule at once.
    fn put_contract(&self, contract: &Contract, groups: &[MonthGroup]) -> PersistenceResult<()>;
    /// Apply `change` to the stored contract and schedule while holding the
    /// store's write lock or transaction. Nothing is written when `change`
    /// fails. `change` must not call back into the store.
    fn modify_contract(
        &self,
        id: ContractId,
        change: &mut ContractChange<'_>,
    ) -> PersistenceResult<(Contract, Vec<MonthGroup>)>;

    fn save_contract(&self, contract: &Contract) -> PersistenceResult<()>;
    fn load_contract(&self, id: ContractId) -> PersistenceResult<Option<Contract>>;
    fn list_contracts(&self) -> PersistenceResult<Vec<Contract>>;
    /// Removes the contract and its weeks. Returns whether it existed.
    fn delete_contract(&self, id: ContractId) -> PersistenceResult<bool>;

    fn upsert_weeks(&self, contract_id: ContractId, groups: &[MonthGroup]) -> PersistenceResult<()>;
    fn replace_weeks(&self, contract_id: ContractId, groups: &[MonthGroup])
    -> PersistenceResult<()>;
    /// Weeks ordered by month, then week number.
    fn load_weeks(&self, contract_id: ContractId) -> PersistenceResult<Vec<MonthGroup>>;
    fn find_week(&self, contract_id: ContractId, key: WeekKey)
    -> PersistenceResult<Option<StoredWeek>>;
    /// Fails with [`ScheduleError::NotFound`] when the week was never stored.
    fn update_week(
        &self,
        contract_id: ContractId,
        key: WeekKey,
        update: &WeekUpdate,
    ) -> PersistenceResult<WeekEntry>;
}

/// Reject a loaded schedule that does not cover the contract's span.
pub fn validate_contract_schedule(
    contract: &Contract,
    groups: &[MonthGroup],
) -> PersistenceResult<()> {
    validation::validate_schedule_groups(
        contract.start_date,
        contract.effective_duration_days(),
        groups,
    )?;
    Ok(())
}

/// Index `groups` for storage, keeping the timestamp of every week whose
/// values did not change since `previous`.
pub(crate) fn restamp_weeks(
    groups: &[MonthGroup],
    previous: &BTreeMap<WeekKey, StoredWeek>,
) -> BTreeMap<WeekKey, StoredWeek> {
    let now = Utc::now();
    schedule::entries(groups)
        .map(|entry| {
            let updated_at = match previous.get(&entry.key()) {
                Some(stored) if stored.entry == *entry => stored.updated_at,
                _ => now,
            };
            (
                entry.key(),
                StoredWeek {
                    entry: entry.clone(),
                    updated_at,
                },
            )
        })
        .collect()
}

pub mod file;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{
    load_contract_from_json, load_schedule_from_csv, save_contract_to_json, save_schedule_to_csv,
};
pub use memory::MemoryScheduleStore;
