use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Locale-independent identity of a calendar month.
///
/// Internally the first day of the month, so ordering is chronological and
/// every key maps to exactly one month. On the wire it is `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey(NaiveDate);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid month key '{0}' (expected YYYY-MM)")]
pub struct MonthKeyParseError(String);

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    /// The month containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        // day 1 always exists when `date` does
        Self(date - Days::new(u64::from(date.day0())))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn last_day(&self) -> NaiveDate {
        // December of the last representable year has no successor month.
        self.0
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::of(date) == *self
    }

    pub fn label(&self, locale: MonthLabelLocale) -> String {
        let names = match locale {
            MonthLabelLocale::English => &ENGLISH_MONTHS,
            MonthLabelLocale::Indonesian => &INDONESIAN_MONTHS,
        };
        format!("{} {}", names[self.0.month0() as usize], self.year())
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for MonthKey {
    type Err = MonthKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (year, month) = trimmed
            .rsplit_once('-')
            .ok_or_else(|| MonthKeyParseError(s.to_string()))?;
        let year: i32 = year.parse().map_err(|_| MonthKeyParseError(s.to_string()))?;
        let month: u32 = month.parse().map_err(|_| MonthKeyParseError(s.to_string()))?;
        Self::new(year, month).ok_or_else(|| MonthKeyParseError(s.to_string()))
    }
}

impl TryFrom<String> for MonthKey {
    type Error = MonthKeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthKey> for String {
    fn from(value: MonthKey) -> Self {
        value.to_string()
    }
}

const ENGLISH_MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const INDONESIAN_MONTHS: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

/// Display language for month labels. Labels are presentation only; grouping
/// always uses [`MonthKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthLabelLocale {
    #[default]
    #[serde(alias = "en")]
    English,
    #[serde(alias = "id")]
    Indonesian,
}

impl MonthLabelLocale {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonthLabelLocale::English => "en",
            MonthLabelLocale::Indonesian => "id",
        }
    }
}

impl FromStr for MonthLabelLocale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(MonthLabelLocale::English),
            "id" | "indonesian" => Ok(MonthLabelLocale::Indonesian),
            other => Err(format!("unknown locale '{other}' (expected en|id)")),
        }
    }
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").ok()
}

/// Inclusive last day of a span of `days` calendar days starting at `start`.
/// `None` when the span is empty or runs past the representable calendar.
pub fn inclusive_end(start: NaiveDate, days: i64) -> Option<NaiveDate> {
    if days <= 0 {
        return None;
    }
    start.checked_add_days(Days::new(days as u64 - 1))
}

/// Number of calendar days in `[start, end]`, or 0 when `end < start`.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> i64 {
    ((end - start).num_days() + 1).max(0)
}
