use crate::calendar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type ContractId = i64;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractError {
    #[error("addendum {0} already recorded")]
    DuplicateAddendum(u32),
    #[error("addendum {number} would shrink the contract to {effective_days} days")]
    NegativeDuration { number: u32, effective_days: i64 },
    #[error("addendum {number} has a non-finite value change")]
    InvalidValue { number: u32 },
    #[error("addendum {number} pushes the contract duration out of range")]
    DurationOverflow { number: u32 },
}

/// Signed amendment that extends (or shortens) the contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Addendum {
    pub number: u32,
    pub signed_on: NaiveDate,
    #[serde(default)]
    pub extra_days: i64,
    #[serde(default)]
    pub extra_value: f64,
    #[serde(default)]
    pub note: String,
}

impl Addendum {
    pub fn new(number: u32, signed_on: NaiveDate, extra_days: i64, extra_value: f64) -> Self {
        Self {
            number,
            signed_on,
            extra_days,
            extra_value,
            note: String::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }
}

/// Financial progress field, e.g. the advance payment or a termin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentStage {
    pub label: String,
    pub percent: f64,
}

impl PaymentStage {
    pub fn new(label: impl Into<String>, percent: f64) -> Self {
        Self {
            label: label.into(),
            percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub name: String,
    pub start_date: NaiveDate,
    pub duration_days: i64,
    pub contract_value: f64,
    #[serde(default)]
    pub addenda: Vec<Addendum>,
    #[serde(default)]
    pub payment_stages: Vec<PaymentStage>,
}

impl Contract {
    pub fn new(
        id: ContractId,
        name: impl Into<String>,
        start_date: NaiveDate,
        duration_days: i64,
        contract_value: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            start_date,
            duration_days,
            contract_value,
            addenda: Vec::new(),
            payment_stages: Vec::new(),
        }
    }

    /// Base duration adjusted by every addendum, saturating at the `i64`
    /// bounds. Use [`Contract::checked_duration_days`] to detect overflow.
    pub fn effective_duration_days(&self) -> i64 {
        self.addenda
            .iter()
            .fold(self.duration_days, |days, a| days.saturating_add(a.extra_days))
    }

    /// `None` when the addenda push the duration past the `i64` range.
    pub fn checked_duration_days(&self) -> Option<i64> {
        self.addenda
            .iter()
            .try_fold(self.duration_days, |days, a| days.checked_add(a.extra_days))
    }

    pub fn effective_value(&self) -> f64 {
        self.contract_value + self.addenda.iter().map(|a| a.extra_value).sum::<f64>()
    }

    /// Inclusive last day of execution.
    pub fn end_date(&self) -> Option<NaiveDate> {
        calendar::inclusive_end(self.start_date, self.effective_duration_days())
    }

    pub fn add_addendum(&mut self, addendum: Addendum) -> Result<(), ContractError> {
        if self.addenda.iter().any(|a| a.number == addendum.number) {
            return Err(ContractError::DuplicateAddendum(addendum.number));
        }
        if !addendum.extra_value.is_finite() {
            return Err(ContractError::InvalidValue {
                number: addendum.number,
            });
        }
        let effective_days = self
            .checked_duration_days()
            .and_then(|days| days.checked_add(addendum.extra_days))
            .ok_or(ContractError::DurationOverflow {
                number: addendum.number,
            })?;
        if effective_days < 0 {
            return Err(ContractError::NegativeDuration {
                number: addendum.number,
                effective_days,
            });
        }
        self.addenda.push(addendum);
        self.addenda.sort_by_key(|a| a.number);
        Ok(())
    }

    /// Insert or replace the payment stage with the same label.
    pub fn upsert_payment_stage(&mut self, stage: PaymentStage) {
        match self
            .payment_stages
            .iter_mut()
            .find(|existing| existing.label == stage.label)
        {
            Some(existing) => existing.percent = stage.percent,
            None => self.payment_stages.push(stage),
        }
    }

    pub fn payment_percentages(&self) -> Vec<f64> {
        self.payment_stages.iter().map(|s| s.percent).collect()
    }
}
