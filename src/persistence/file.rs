use super::{PersistenceError, PersistenceResult};
use crate::calendar::MonthKey;
use crate::contract::Contract;
use crate::schedule::{self, MonthGroup, WeekEntry};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// A contract together with its weekly schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractSnapshot {
    pub contract: Contract,
    #[serde(default)]
    pub schedule: Vec<MonthGroup>,
}

impl ContractSnapshot {
    pub fn new(contract: Contract, schedule: Vec<MonthGroup>) -> Self {
        Self { contract, schedule }
    }

    fn validate(&self) -> PersistenceResult<()> {
        super::validate_contract_schedule(&self.contract, &self.schedule)
    }
}

pub fn save_contract_to_json<P: AsRef<Path>>(
    snapshot: &ContractSnapshot,
    path: P,
) -> PersistenceResult<()> {
    snapshot.validate()?;
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, snapshot)?;
    Ok(())
}

pub fn load_contract_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<ContractSnapshot> {
    let file = File::open(path)?;
    let snapshot: ContractSnapshot = serde_json::from_reader(file)?;
    snapshot.validate()?;
    Ok(snapshot)
}

#[derive(Debug, Serialize, Deserialize)]
struct WeekCsvRecord {
    month: String,
    week: u32,
    start_date: String,
    end_date: String,
    rencana: f64,
    realisasi: f64,
    #[serde(default)]
    deviasi: f64,
}

impl From<&WeekEntry> for WeekCsvRecord {
    fn from(entry: &WeekEntry) -> Self {
        Self {
            month: entry.month.to_string(),
            week: entry.week,
            start_date: entry.start_date.to_string(),
            end_date: entry.end_date.to_string(),
            rencana: entry.rencana(),
            realisasi: entry.realisasi(),
            deviasi: entry.deviasi(),
        }
    }
}

impl TryFrom<WeekCsvRecord> for WeekEntry {
    type Error = PersistenceError;

    fn try_from(record: WeekCsvRecord) -> Result<Self, Self::Error> {
        let month: MonthKey = record
            .month
            .parse()
            .map_err(|err| PersistenceError::InvalidData(format!("{err}")))?;
        if !record.rencana.is_finite() || !record.realisasi.is_finite() {
            return Err(PersistenceError::InvalidData(format!(
                "week {month}#{} has non-finite progress values",
                record.week
            )));
        }
        // deviasi in the file is informational; it is always recomputed.
        Ok(WeekEntry::with_progress(
            month,
            record.week,
            parse_date_field("start_date", &record.start_date)?,
            parse_date_field("end_date", &record.end_date)?,
            record.rencana,
            record.realisasi,
        ))
    }
}

fn parse_date_field(field: &str, value: &str) -> PersistenceResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|err| {
        PersistenceError::InvalidData(format!("invalid {field} '{value}': {err}"))
    })
}

/// Write one row per week entry.
pub fn save_schedule_to_csv<P: AsRef<Path>>(
    groups: &[MonthGroup],
    path: P,
) -> PersistenceResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for entry in schedule::entries(groups) {
        writer.serialize(WeekCsvRecord::from(entry))?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a schedule written by [`save_schedule_to_csv`] and check it against
/// `contract`.
pub fn load_schedule_from_csv<P: AsRef<Path>>(
    contract: &Contract,
    path: P,
) -> PersistenceResult<Vec<MonthGroup>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut entries = Vec::new();
    for record in reader.deserialize::<WeekCsvRecord>() {
        entries.push(WeekEntry::try_from(record?)?);
    }
    let groups = schedule::group_entries(entries);
    super::validate_contract_schedule(contract, &groups)?;
    Ok(groups)
}
