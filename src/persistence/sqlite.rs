use super::{
    ContractChange, PersistenceError, PersistenceResult, ScheduleStore, StoredWeek, restamp_weeks,
};
use crate::calendar::MonthKey;
use crate::contract::{Contract, ContractId};
use crate::schedule::{self, MonthGroup, ScheduleError, WeekEntry, WeekKey, WeekUpdate};
use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use std::collections::BTreeMap;

pub struct SqliteScheduleStore {
    connection: Mutex<Connection>,
}

const WEEK_COLUMNS: &str =
    "month, week, start_date, end_date, rencana, realisasi, updated_at";

impl SqliteScheduleStore {
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        let connection = Connection::open_in_memory()?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS contracts (
                id INTEGER PRIMARY KEY,
                contract_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS contract_weeks (
                contract_id INTEGER NOT NULL REFERENCES contracts(id) ON DELETE CASCADE,
                month TEXT NOT NULL,
                week INTEGER NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                rencana REAL NOT NULL DEFAULT 0,
                realisasi REAL NOT NULL DEFAULT 0,
                deviasi REAL NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (contract_id, month, week)
            );
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn ensure_contract(tx: &Transaction, contract_id: ContractId) -> PersistenceResult<()> {
        let exists: Option<i64> = tx
            .query_row(
                "SELECT id FROM contracts WHERE id = ?1",
                params![contract_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(PersistenceError::ContractNotFound(contract_id));
        }
        Ok(())
    }

    fn read_contract(conn: &Connection, id: ContractId) -> PersistenceResult<Option<Contract>> {
        let json: Option<String> = conn
            .query_row(
                "SELECT contract_json FROM contracts WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn write_contract(conn: &Connection, contract: &Contract) -> PersistenceResult<()> {
        let json = serde_json::to_string(contract)?;
        conn.execute(
            "INSERT INTO contracts (id, contract_json) VALUES (?1, ?2)
             ON CONFLICT (id) DO UPDATE SET contract_json = excluded.contract_json",
            params![contract.id, json],
        )?;
        Ok(())
    }

    fn read_weeks(
        conn: &Connection,
        contract_id: ContractId,
    ) -> PersistenceResult<BTreeMap<WeekKey, StoredWeek>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {WEEK_COLUMNS} FROM contract_weeks WHERE contract_id = ?1"
        ))?;
        let rows = stmt.query_map(params![contract_id], Self::read_week)?;

        let mut weeks = BTreeMap::new();
        for raw in rows {
            let stored = raw?.into_stored()?;
            weeks.insert(stored.entry.key(), stored);
        }
        Ok(weeks)
    }

    /// Drop the contract's weeks and write `groups` in their place.
    fn rewrite_weeks(
        tx: &Transaction,
        contract_id: ContractId,
        groups: &[MonthGroup],
    ) -> PersistenceResult<usize> {
        let previous = Self::read_weeks(tx, contract_id)?;
        tx.execute(
            "DELETE FROM contract_weeks WHERE contract_id = ?1",
            params![contract_id],
        )?;
        Self::write_weeks(tx, contract_id, groups, &previous)
    }

    fn write_weeks(
        tx: &Transaction,
        contract_id: ContractId,
        groups: &[MonthGroup],
        previous: &BTreeMap<WeekKey, StoredWeek>,
    ) -> PersistenceResult<usize> {
        let mut stmt = tx.prepare(
            "INSERT INTO contract_weeks
                (contract_id, month, week, start_date, end_date, rencana, realisasi, deviasi, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (contract_id, month, week) DO UPDATE SET
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                rencana = excluded.rencana,
                realisasi = excluded.realisasi,
                deviasi = excluded.deviasi,
                updated_at = excluded.updated_at",
        )?;
        let weeks = restamp_weeks(groups, previous);
        for stored in weeks.values() {
            let entry = &stored.entry;
            stmt.execute(params![
                contract_id,
                entry.month.to_string(),
                entry.week,
                entry.start_date.to_string(),
                entry.end_date.to_string(),
                entry.rencana(),
                entry.realisasi(),
                entry.deviasi(),
                stored.updated_at.to_rfc3339(),
            ])?;
        }
        Ok(weeks.len())
    }

    fn read_week(row: &Row) -> rusqlite::Result<RawWeek> {
        Ok(RawWeek {
            month: row.get(0)?,
            week: row.get(1)?,
            start_date: row.get(2)?,
            end_date: row.get(3)?,
            rencana: row.get(4)?,
            realisasi: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

struct RawWeek {
    month: String,
    week: u32,
    start_date: String,
    end_date: String,
    rencana: f64,
    realisasi: f64,
    updated_at: String,
}

impl RawWeek {
    fn into_stored(self) -> PersistenceResult<StoredWeek> {
        let month: MonthKey = self
            .month
            .parse()
            .map_err(|err| PersistenceError::InvalidData(format!("{err}")))?;
        let entry = WeekEntry::with_progress(
            month,
            self.week,
            parse_stored_date(&self.start_date)?,
            parse_stored_date(&self.end_date)?,
            self.rencana,
            self.realisasi,
        );
        let updated_at = DateTime::parse_from_rfc3339(&self.updated_at)
            .map_err(|err| {
                PersistenceError::InvalidData(format!(
                    "invalid updated_at '{}': {err}",
                    self.updated_at
                ))
            })?
            .with_timezone(&Utc);
        Ok(StoredWeek { entry, updated_at })
    }
}

fn parse_stored_date(value: &str) -> PersistenceResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|err| PersistenceError::InvalidData(format!("invalid date '{value}': {err}")))
}

impl ScheduleStore for SqliteScheduleStore {
    fn insert_contract(
        &self,
        contract: &Contract,
        groups: &[MonthGroup],
    ) -> PersistenceResult<()> {
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        if Self::read_contract(&tx, contract.id)?.is_some() {
            return Err(PersistenceError::ContractExists(contract.id));
        }
        Self::write_contract(&tx, contract)?;
        let written = Self::rewrite_weeks(&tx, contract.id, groups)?;
        tx.commit()?;
        debug!("inserted contract {} with {written} weeks", contract.id);
        Ok(())
    }

    fn put_contract(&self, contract: &Contract, groups: &[MonthGroup]) -> PersistenceResult<()> {
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        Self::write_contract(&tx, contract)?;
        let written = Self::rewrite_weeks(&tx, contract.id, groups)?;
        tx.commit()?;
        debug!("stored contract {} with {written} weeks", contract.id);
        Ok(())
    }

    fn modify_contract(
        &self,
        id: ContractId,
        change: &mut ContractChange<'_>,
    ) -> PersistenceResult<(Contract, Vec<MonthGroup>)> {
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        let mut contract =
            Self::read_contract(&tx, id)?.ok_or(PersistenceError::ContractNotFound(id))?;
        let existing = schedule::group_entries(
            Self::read_weeks(&tx, id)?
                .into_values()
                .map(|stored| stored.entry)
                .collect(),
        );
        let replacement = change(&mut contract, &existing)?;
        Self::write_contract(&tx, &contract)?;
        let groups = match replacement {
            Some(groups) => {
                Self::rewrite_weeks(&tx, id, &groups)?;
                groups
            }
            None => existing,
        };
        tx.commit()?;
        debug!("modified contract {id}");
        Ok((contract, groups))
    }

    fn save_contract(&self, contract: &Contract) -> PersistenceResult<()> {
        let conn = self.connection.lock();
        Self::write_contract(&conn, contract)
    }

    fn load_contract(&self, id: ContractId) -> PersistenceResult<Option<Contract>> {
        let conn = self.connection.lock();
        Self::read_contract(&conn, id)
    }

    fn list_contracts(&self) -> PersistenceResult<Vec<Contract>> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare("SELECT contract_json FROM contracts ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut contracts = Vec::new();
        for json in rows {
            let json = json?;
            contracts.push(serde_json::from_str(&json)?);
        }
        Ok(contracts)
    }

    fn delete_contract(&self, id: ContractId) -> PersistenceResult<bool> {
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM contract_weeks WHERE contract_id = ?1",
            params![id],
        )?;
        let removed = tx.execute("DELETE FROM contracts WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    fn upsert_weeks(&self, contract_id: ContractId, groups: &[MonthGroup]) -> PersistenceResult<()> {
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        Self::ensure_contract(&tx, contract_id)?;
        let previous = Self::read_weeks(&tx, contract_id)?;
        let written = Self::write_weeks(&tx, contract_id, groups, &previous)?;
        tx.commit()?;
        debug!("upserted {written} weeks for contract {contract_id}");
        Ok(())
    }

    fn replace_weeks(
        &self,
        contract_id: ContractId,
        groups: &[MonthGroup],
    ) -> PersistenceResult<()> {
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        Self::ensure_contract(&tx, contract_id)?;
        let written = Self::rewrite_weeks(&tx, contract_id, groups)?;
        tx.commit()?;
        debug!("replaced schedule of contract {contract_id} ({written} weeks)");
        Ok(())
    }

    fn load_weeks(&self, contract_id: ContractId) -> PersistenceResult<Vec<MonthGroup>> {
        let conn = self.connection.lock();
        // Ordered on the parsed keys, not on the stored month text.
        let weeks = Self::read_weeks(&conn, contract_id)?;
        Ok(schedule::group_entries(
            weeks.into_values().map(|stored| stored.entry).collect(),
        ))
    }

    fn find_week(
        &self,
        contract_id: ContractId,
        key: WeekKey,
    ) -> PersistenceResult<Option<StoredWeek>> {
        let conn = self.connection.lock();
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {WEEK_COLUMNS} FROM contract_weeks
                     WHERE contract_id = ?1 AND month = ?2 AND week = ?3"
                ),
                params![contract_id, key.month.to_string(), key.week],
                Self::read_week,
            )
            .optional()?;
        raw.map(RawWeek::into_stored).transpose()
    }

    fn update_week(
        &self,
        contract_id: ContractId,
        key: WeekKey,
        update: &WeekUpdate,
    ) -> PersistenceResult<WeekEntry> {
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        let raw = tx
            .query_row(
                &format!(
                    "SELECT {WEEK_COLUMNS} FROM contract_weeks
                     WHERE contract_id = ?1 AND month = ?2 AND week = ?3"
                ),
                params![contract_id, key.month.to_string(), key.week],
                Self::read_week,
            )
            .optional()?
            .ok_or(ScheduleError::NotFound(key))?;
        let existing = raw.into_stored()?.entry;
        let updated = schedule::update_week_entry(&existing, update)?;
        tx.execute(
            "UPDATE contract_weeks
             SET rencana = ?1, realisasi = ?2, deviasi = ?3, updated_at = ?4
             WHERE contract_id = ?5 AND month = ?6 AND week = ?7",
            params![
                updated.rencana(),
                updated.realisasi(),
                updated.deviasi(),
                Utc::now().to_rfc3339(),
                contract_id,
                key.month.to_string(),
                key.week,
            ],
        )?;
        tx.commit()?;
        debug!("updated week {key} of contract {contract_id}");
        Ok(updated)
    }
}
