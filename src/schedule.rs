use crate::calendar::{self, MonthKey, MonthLabelLocale};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("week {0} not found")]
    NotFound(WeekKey),
}

impl ScheduleError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ScheduleError::InvalidArgument(message.into())
    }
}

/// Persistence key of a week within one contract's schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WeekKey {
    pub month: MonthKey,
    pub week: u32,
}

impl WeekKey {
    pub fn new(month: MonthKey, week: u32) -> Self {
        Self { month, week }
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.month, self.week)
    }
}

/// One week's plan/realization record.
///
/// `deviasi` is derived: it is recomputed on every mutation and on
/// deserialization, so it cannot drift from `realisasi - rencana`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WeekEntryRecord")]
pub struct WeekEntry {
    pub month: MonthKey,
    pub week: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    rencana: f64,
    realisasi: f64,
    deviasi: f64,
}

#[derive(Deserialize)]
struct WeekEntryRecord {
    month: MonthKey,
    week: u32,
    start_date: NaiveDate,
    end_date: NaiveDate,
    #[serde(default)]
    rencana: f64,
    #[serde(default)]
    realisasi: f64,
}

impl From<WeekEntryRecord> for WeekEntry {
    fn from(record: WeekEntryRecord) -> Self {
        WeekEntry::with_progress(
            record.month,
            record.week,
            record.start_date,
            record.end_date,
            record.rencana,
            record.realisasi,
        )
    }
}

impl WeekEntry {
    pub fn new(month: MonthKey, week: u32, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self::with_progress(month, week, start_date, end_date, 0.0, 0.0)
    }

    pub fn with_progress(
        month: MonthKey,
        week: u32,
        start_date: NaiveDate,
        end_date: NaiveDate,
        rencana: f64,
        realisasi: f64,
    ) -> Self {
        Self {
            month,
            week,
            start_date,
            end_date,
            rencana,
            realisasi,
            deviasi: realisasi - rencana,
        }
    }

    pub fn key(&self) -> WeekKey {
        WeekKey::new(self.month, self.week)
    }

    pub fn rencana(&self) -> f64 {
        self.rencana
    }

    pub fn realisasi(&self) -> f64 {
        self.realisasi
    }

    pub fn deviasi(&self) -> f64 {
        self.deviasi
    }

    pub fn days(&self) -> i64 {
        calendar::days_inclusive(self.start_date, self.end_date)
    }

    pub fn has_recorded_progress(&self) -> bool {
        self.rencana != 0.0 || self.realisasi != 0.0
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthGroup {
    pub month: MonthKey,
    pub items: Vec<WeekEntry>,
}

impl MonthGroup {
    pub fn new(month: MonthKey) -> Self {
        Self {
            month,
            items: Vec::new(),
        }
    }

    pub fn label(&self, locale: MonthLabelLocale) -> String {
        self.month.label(locale)
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.items.first().map(|entry| entry.start_date)
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.items.last().map(|entry| entry.end_date)
    }
}

/// Partial progress update; absent fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeekUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rencana: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realisasi: Option<f64>,
}

impl WeekUpdate {
    pub fn rencana(value: f64) -> Self {
        Self {
            rencana: Some(value),
            realisasi: None,
        }
    }

    pub fn realisasi(value: f64) -> Self {
        Self {
            rencana: None,
            realisasi: Some(value),
        }
    }

    pub fn both(rencana: f64, realisasi: f64) -> Self {
        Self {
            rencana: Some(rencana),
            realisasi: Some(realisasi),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rencana.is_none() && self.realisasi.is_none()
    }
}

/// Split `duration_days` calendar days starting at `start_date` into weeks
/// grouped by calendar month.
///
/// Weeks are at most seven days and are cut at month ends and at the
/// inclusive contract end `start_date + duration_days - 1`. Week numbers
/// restart at 1 in every month. A zero duration yields no groups.
pub fn generate_schedule(
    start_date: NaiveDate,
    duration_days: i64,
) -> Result<Vec<MonthGroup>, ScheduleError> {
    if duration_days < 0 {
        return Err(ScheduleError::invalid(format!(
            "duration_days must be non-negative (got {duration_days})"
        )));
    }
    if duration_days == 0 {
        return Ok(Vec::new());
    }
    let last_day = calendar::inclusive_end(start_date, duration_days).ok_or_else(|| {
        ScheduleError::invalid(format!(
            "{duration_days} days from {start_date} runs past the supported calendar"
        ))
    })?;

    let mut groups: Vec<MonthGroup> = Vec::new();
    let mut cursor = start_date;
    loop {
        let month = MonthKey::of(cursor);
        let week_end = cursor
            .checked_add_days(Days::new(6))
            .unwrap_or(NaiveDate::MAX)
            .min(month.last_day())
            .min(last_day);

        if groups.last().is_none_or(|group| group.month != month) {
            groups.push(MonthGroup::new(month));
        }
        if let Some(group) = groups.last_mut() {
            let week = group.items.len() as u32 + 1;
            group.items.push(WeekEntry::new(month, week, cursor, week_end));
        }

        if week_end >= last_day {
            break;
        }
        match week_end.succ_opt() {
            Some(next) => cursor = next,
            None => break,
        }
    }

    Ok(groups)
}

/// Apply `update` to a copy of `existing`, recomputing `deviasi`.
pub fn update_week_entry(
    existing: &WeekEntry,
    update: &WeekUpdate,
) -> Result<WeekEntry, ScheduleError> {
    let rencana = update.rencana.unwrap_or(existing.rencana);
    let realisasi = update.realisasi.unwrap_or(existing.realisasi);
    if !rencana.is_finite() {
        return Err(ScheduleError::invalid(format!(
            "rencana must be a finite number (got {rencana})"
        )));
    }
    if !realisasi.is_finite() {
        return Err(ScheduleError::invalid(format!(
            "realisasi must be a finite number (got {realisasi})"
        )));
    }
    Ok(WeekEntry::with_progress(
        existing.month,
        existing.week,
        existing.start_date,
        existing.end_date,
        rencana,
        realisasi,
    ))
}

pub fn parse_start_date(input: &str) -> Result<NaiveDate, ScheduleError> {
    calendar::parse_date(input).ok_or_else(|| {
        ScheduleError::invalid(format!("start date '{input}' is not a valid YYYY-MM-DD date"))
    })
}

/// All entries of a schedule in chronological order.
pub fn entries(groups: &[MonthGroup]) -> impl Iterator<Item = &WeekEntry> {
    groups.iter().flat_map(|group| group.items.iter())
}

pub fn find_entry(groups: &[MonthGroup], key: WeekKey) -> Result<&WeekEntry, ScheduleError> {
    groups
        .iter()
        .find(|group| group.month == key.month)
        .and_then(|group| group.items.iter().find(|entry| entry.week == key.week))
        .ok_or(ScheduleError::NotFound(key))
}

/// Update the entry at `key` in place and return the new value.
pub fn update_in_groups(
    groups: &mut [MonthGroup],
    key: WeekKey,
    update: &WeekUpdate,
) -> Result<WeekEntry, ScheduleError> {
    let slot = groups
        .iter_mut()
        .find(|group| group.month == key.month)
        .and_then(|group| group.items.iter_mut().find(|entry| entry.week == key.week))
        .ok_or(ScheduleError::NotFound(key))?;
    let updated = update_week_entry(slot, update)?;
    *slot = updated.clone();
    Ok(updated)
}

/// Rebuild month groups from loose entries, ordered by month then week.
pub fn group_entries(mut entries: Vec<WeekEntry>) -> Vec<MonthGroup> {
    entries.sort_by_key(WeekEntry::key);
    let mut groups: Vec<MonthGroup> = Vec::new();
    for entry in entries {
        match groups.last_mut() {
            Some(group) if group.month == entry.month => group.items.push(entry),
            _ => {
                let mut group = MonthGroup::new(entry.month);
                group.items.push(entry);
                groups.push(group);
            }
        }
    }
    groups
}
