use super::{
    ContractChange, PersistenceError, PersistenceResult, ScheduleStore, StoredWeek, restamp_weeks,
};
use crate::contract::{Contract, ContractId};
use crate::schedule::{self, MonthGroup, ScheduleError, WeekEntry, WeekKey, WeekUpdate};
use chrono::Utc;
use log::debug;
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Default)]
struct Tables {
    contracts: BTreeMap<ContractId, Contract>,
    weeks: BTreeMap<ContractId, BTreeMap<WeekKey, StoredWeek>>,
}

/// Process-local store; all state sits behind one lock so every batch write
/// is applied in a single critical section.
#[derive(Default)]
pub struct MemoryScheduleStore {
    tables: RwLock<Tables>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tables {
    fn schedule(&self, contract_id: ContractId) -> Vec<MonthGroup> {
        let entries: Vec<WeekEntry> = self
            .weeks
            .get(&contract_id)
            .map(|weeks| weeks.values().map(|stored| stored.entry.clone()).collect())
            .unwrap_or_default();
        schedule::group_entries(entries)
    }

    fn replace(&mut self, contract_id: ContractId, groups: &[MonthGroup]) {
        let previous = self.weeks.remove(&contract_id).unwrap_or_default();
        self.weeks
            .insert(contract_id, restamp_weeks(groups, &previous));
    }
}

impl ScheduleStore for MemoryScheduleStore {
    fn insert_contract(
        &self,
        contract: &Contract,
        groups: &[MonthGroup],
    ) -> PersistenceResult<()> {
        let mut tables = self.tables.write();
        if tables.contracts.contains_key(&contract.id) {
            return Err(PersistenceError::ContractExists(contract.id));
        }
        tables.contracts.insert(contract.id, contract.clone());
        tables.replace(contract.id, groups);
        debug!("inserted contract {}", contract.id);
        Ok(())
    }

    fn put_contract(&self, contract: &Contract, groups: &[MonthGroup]) -> PersistenceResult<()> {
        let mut tables = self.tables.write();
        tables.contracts.insert(contract.id, contract.clone());
        tables.replace(contract.id, groups);
        debug!("stored contract {} with its schedule", contract.id);
        Ok(())
    }

    fn modify_contract(
        &self,
        id: ContractId,
        change: &mut ContractChange<'_>,
    ) -> PersistenceResult<(Contract, Vec<MonthGroup>)> {
        let mut tables = self.tables.write();
        let mut contract = tables
            .contracts
            .get(&id)
            .cloned()
            .ok_or(PersistenceError::ContractNotFound(id))?;
        let existing = tables.schedule(id);
        let groups = match change(&mut contract, &existing)? {
            Some(groups) => {
                tables.replace(id, &groups);
                groups
            }
            None => existing,
        };
        tables.contracts.insert(id, contract.clone());
        debug!("modified contract {id}");
        Ok((contract, groups))
    }

    fn save_contract(&self, contract: &Contract) -> PersistenceResult<()> {
        self.tables
            .write()
            .contracts
            .insert(contract.id, contract.clone());
        Ok(())
    }

    fn load_contract(&self, id: ContractId) -> PersistenceResult<Option<Contract>> {
        Ok(self.tables.read().contracts.get(&id).cloned())
    }

    fn list_contracts(&self) -> PersistenceResult<Vec<Contract>> {
        Ok(self.tables.read().contracts.values().cloned().collect())
    }

    fn delete_contract(&self, id: ContractId) -> PersistenceResult<bool> {
        let mut tables = self.tables.write();
        let existed = tables.contracts.remove(&id).is_some();
        tables.weeks.remove(&id);
        Ok(existed)
    }

    fn upsert_weeks(&self, contract_id: ContractId, groups: &[MonthGroup]) -> PersistenceResult<()> {
        let mut tables = self.tables.write();
        if !tables.contracts.contains_key(&contract_id) {
            return Err(PersistenceError::ContractNotFound(contract_id));
        }
        let weeks = tables.weeks.entry(contract_id).or_default();
        let incoming = restamp_weeks(groups, weeks);
        debug!(
            "upserting {} weeks for contract {contract_id}",
            incoming.len()
        );
        weeks.extend(incoming);
        Ok(())
    }

    fn replace_weeks(
        &self,
        contract_id: ContractId,
        groups: &[MonthGroup],
    ) -> PersistenceResult<()> {
        let mut tables = self.tables.write();
        if !tables.contracts.contains_key(&contract_id) {
            return Err(PersistenceError::ContractNotFound(contract_id));
        }
        tables.replace(contract_id, groups);
        debug!("replaced schedule of contract {contract_id}");
        Ok(())
    }

    fn load_weeks(&self, contract_id: ContractId) -> PersistenceResult<Vec<MonthGroup>> {
        Ok(self.tables.read().schedule(contract_id))
    }

    fn find_week(
        &self,
        contract_id: ContractId,
        key: WeekKey,
    ) -> PersistenceResult<Option<StoredWeek>> {
        Ok(self
            .tables
            .read()
            .weeks
            .get(&contract_id)
            .and_then(|weeks| weeks.get(&key))
            .cloned())
    }

    fn update_week(
        &self,
        contract_id: ContractId,
        key: WeekKey,
        update: &WeekUpdate,
    ) -> PersistenceResult<WeekEntry> {
        let mut tables = self.tables.write();
        let stored = tables
            .weeks
            .get_mut(&contract_id)
            .and_then(|weeks| weeks.get_mut(&key))
            .ok_or(ScheduleError::NotFound(key))?;
        let updated = schedule::update_week_entry(&stored.entry, update)?;
        stored.entry = updated.clone();
        stored.updated_at = Utc::now();
        debug!("updated week {key} of contract {contract_id}");
        Ok(updated)
    }
}
