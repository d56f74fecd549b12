use crate::calendar;
use crate::contract::PaymentStage;
use crate::schedule::{MonthGroup, WeekUpdate};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

const EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Percentage accepted from forms: finite and within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Percentage(f64);

impl Percentage {
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() || value < -EPSILON || value > 100.0 + EPSILON {
            return Err(ValidationError::new(format!(
                "percentage {value} must be between 0 and 100"
            )));
        }
        Ok(Self(value.clamp(0.0, 100.0)))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Percentage {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Percentage> for f64 {
    fn from(value: Percentage) -> Self {
        value.0
    }
}

/// Contract execution length in calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct DurationDays(i64);

impl DurationDays {
    pub fn new(days: i64) -> Result<Self, ValidationError> {
        if days < 0 {
            return Err(ValidationError::new(format!(
                "duration_days must be non-negative (got {days})"
            )));
        }
        Ok(Self(days))
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for DurationDays {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DurationDays> for i64 {
    fn from(value: DurationDays) -> Self {
        value.0
    }
}

pub fn validate_week_update(update: &WeekUpdate) -> Result<(), ValidationError> {
    if update.is_empty() {
        return Err(ValidationError::new(
            "week update requires rencana or realisasi",
        ));
    }
    if let Some(rencana) = update.rencana {
        Percentage::new(rencana)
            .map_err(|err| ValidationError::new(format!("rencana: {err}")))?;
    }
    if let Some(realisasi) = update.realisasi {
        Percentage::new(realisasi)
            .map_err(|err| ValidationError::new(format!("realisasi: {err}")))?;
    }
    Ok(())
}

pub fn validate_payment_stages(stages: &[PaymentStage]) -> Result<(), ValidationError> {
    let mut labels = HashSet::with_capacity(stages.len());
    let mut total = 0.0;
    for stage in stages {
        let label = stage.label.trim();
        if label.is_empty() {
            return Err(ValidationError::new("payment stage requires a non-empty label"));
        }
        if !labels.insert(label) {
            return Err(ValidationError::new(format!(
                "duplicate payment stage '{label}'"
            )));
        }
        Percentage::new(stage.percent)
            .map_err(|err| ValidationError::new(format!("payment stage '{label}': {err}")))?;
        total += stage.percent;
    }
    if total > 100.0 + EPSILON {
        return Err(ValidationError::new(format!(
            "payment stages total {total:.2}% exceeds 100%"
        )));
    }
    Ok(())
}

/// Check that `groups` is a well-formed schedule for the given span.
pub fn validate_schedule_groups(
    start_date: NaiveDate,
    duration_days: i64,
    groups: &[MonthGroup],
) -> Result<(), ValidationError> {
    let Some(last_day) = calendar::inclusive_end(start_date, duration_days) else {
        if groups.is_empty() {
            return Ok(());
        }
        return Err(ValidationError::new(format!(
            "a {duration_days}-day contract cannot have scheduled weeks"
        )));
    };

    let mut expected_start = start_date;
    let mut previous_month = None;
    for group in groups {
        if previous_month.is_some_and(|prev| prev >= group.month) {
            return Err(ValidationError::new(format!(
                "month {} is out of order or repeated",
                group.month
            )));
        }
        previous_month = Some(group.month);
        if group.items.is_empty() {
            return Err(ValidationError::new(format!("month {} has no weeks", group.month)));
        }

        for (idx, entry) in group.items.iter().enumerate() {
            let key = entry.key();
            if entry.month != group.month {
                return Err(ValidationError::new(format!(
                    "week {key} is filed under month {}",
                    group.month
                )));
            }
            if entry.week as usize != idx + 1 {
                return Err(ValidationError::new(format!(
                    "week {key} should be numbered {}",
                    idx + 1
                )));
            }
            if entry.start_date != expected_start {
                return Err(ValidationError::new(format!(
                    "week {key} starts {} but {} was expected",
                    entry.start_date, expected_start
                )));
            }
            if entry.end_date < entry.start_date || entry.days() > 7 {
                return Err(ValidationError::new(format!(
                    "week {key} has invalid bounds {}..{}",
                    entry.start_date, entry.end_date
                )));
            }
            if !group.month.contains(entry.start_date) || !group.month.contains(entry.end_date) {
                return Err(ValidationError::new(format!(
                    "week {key} crosses its month boundary"
                )));
            }
            if entry.end_date > last_day {
                return Err(ValidationError::new(format!(
                    "week {key} ends after the contract end {last_day}"
                )));
            }
            if (entry.deviasi() - (entry.realisasi() - entry.rencana())).abs() > EPSILON {
                return Err(ValidationError::new(format!(
                    "week {key} deviasi does not match realisasi - rencana"
                )));
            }
            expected_start = match entry.end_date.succ_opt() {
                Some(next) => next,
                None => entry.end_date,
            };
        }
    }

    let covered_until = groups
        .last()
        .and_then(|group| group.end_date())
        .unwrap_or(start_date);
    if groups.is_empty() || covered_until != last_day {
        return Err(ValidationError::new(format!(
            "schedule ends {covered_until} but the contract ends {last_day}"
        )));
    }
    Ok(())
}
