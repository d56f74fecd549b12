use crate::schedule::{self, MonthGroup, WeekKey};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const FULL: f64 = 100.0;

/// Sum of a contract's progress fields and what that sum is worth.
///
/// The raw total is kept unclamped so callers can detect over-allocation;
/// rejecting it is left to boundary validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressTotals {
    pub total_progress: f64,
    pub total_payment: f64,
}

impl ProgressTotals {
    pub fn aggregate<I>(fields: I, contract_value: f64) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let total_progress: f64 = fields.into_iter().sum();
        Self {
            total_progress,
            total_payment: contract_value * total_progress / FULL,
        }
    }

    pub fn display_progress(&self) -> f64 {
        self.total_progress.min(FULL)
    }

    pub fn is_over_allocated(&self) -> bool {
        self.total_progress > FULL
    }

    pub fn remaining(&self) -> f64 {
        (FULL - self.total_progress).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalProgress {
    pub week_count: usize,
    pub total_rencana: f64,
    pub total_realisasi: f64,
    pub deviasi: f64,
}

impl PhysicalProgress {
    pub fn from_groups(groups: &[MonthGroup]) -> Self {
        Self::collect(groups, |_| true)
    }

    /// Progress counted over the weeks that ended on or before `date`.
    pub fn as_of(groups: &[MonthGroup], date: NaiveDate) -> Self {
        Self::collect(groups, |end| end <= date)
    }

    fn collect<F>(groups: &[MonthGroup], include: F) -> Self
    where
        F: Fn(NaiveDate) -> bool,
    {
        let mut summary = Self {
            week_count: 0,
            total_rencana: 0.0,
            total_realisasi: 0.0,
            deviasi: 0.0,
        };
        for entry in schedule::entries(groups).filter(|e| include(e.end_date)) {
            summary.week_count += 1;
            summary.total_rencana += entry.rencana();
            summary.total_realisasi += entry.realisasi();
        }
        summary.deviasi = summary.total_realisasi - summary.total_rencana;
        summary
    }

    pub fn is_behind_schedule(&self) -> bool {
        self.deviasi < 0.0
    }
}

/// One point of the cumulative plan/realization curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub key: WeekKey,
    pub end_date: NaiveDate,
    pub cumulative_rencana: f64,
    pub cumulative_realisasi: f64,
}

impl CurvePoint {
    pub fn cumulative_deviasi(&self) -> f64 {
        self.cumulative_realisasi - self.cumulative_rencana
    }
}

pub fn cumulative_curve(groups: &[MonthGroup]) -> Vec<CurvePoint> {
    let mut rencana = 0.0;
    let mut realisasi = 0.0;
    schedule::entries(groups)
        .map(|entry| {
            rencana += entry.rencana();
            realisasi += entry.realisasi();
            CurvePoint {
                key: entry.key(),
                end_date: entry.end_date,
                cumulative_rencana: rencana,
                cumulative_realisasi: realisasi,
            }
        })
        .collect()
}
