use crate::contract::{Addendum, Contract, ContractError, ContractId, PaymentStage};
use crate::persistence::file::ContractSnapshot;
use crate::persistence::{PersistenceError, PersistenceResult, ScheduleStore};
use crate::progress::{self, CurvePoint, PhysicalProgress, ProgressTotals};
use crate::schedule::{
    self, MonthGroup, ScheduleError, WeekEntry, WeekKey, WeekUpdate, generate_schedule,
};
use crate::validation::{self, DurationDays, ValidationError};
use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error(transparent)]
    Persistence(PersistenceError),
    #[error("contract {0} already exists")]
    ContractExists(ContractId),
    #[error("contract {0} not found")]
    ContractNotFound(ContractId),
    #[error("regenerating the schedule would discard recorded progress in week {0}")]
    ProgressWouldBeDiscarded(WeekKey),
}

impl From<PersistenceError> for ServiceError {
    fn from(value: PersistenceError) -> Self {
        match value {
            PersistenceError::Schedule(err) => ServiceError::Schedule(err),
            PersistenceError::Contract(err) => ServiceError::Contract(err),
            PersistenceError::Rejected(err) => ServiceError::Validation(err),
            PersistenceError::ContractNotFound(id) => ServiceError::ContractNotFound(id),
            PersistenceError::ContractExists(id) => ServiceError::ContractExists(id),
            PersistenceError::ProgressWouldBeDiscarded(key) => {
                ServiceError::ProgressWouldBeDiscarded(key)
            }
            other => ServiceError::Persistence(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub contract_id: ContractId,
    pub effective_duration_days: i64,
    pub end_date: Option<NaiveDate>,
    pub financial: ProgressTotals,
    pub physical: PhysicalProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_as_of: Option<PhysicalProgress>,
    pub curve: Vec<CurvePoint>,
}

/// Contract schedule operations on top of an injected store.
#[derive(Clone)]
pub struct ScheduleService {
    store: Arc<dyn ScheduleStore>,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn ScheduleStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ScheduleStore> {
        &self.store
    }

    fn validate_contract(contract: &Contract) -> Result<(), ValidationError> {
        if contract.name.trim().is_empty() {
            return Err(ValidationError::new("contract name must not be empty"));
        }
        DurationDays::new(contract.duration_days)?;
        let effective = contract.checked_duration_days().ok_or_else(|| {
            ValidationError::new("addenda push the contract duration out of range")
        })?;
        DurationDays::new(effective)?;
        if !contract.contract_value.is_finite() || contract.contract_value < 0.0 {
            return Err(ValidationError::new(format!(
                "contract value {} must be a non-negative number",
                contract.contract_value
            )));
        }
        validation::validate_payment_stages(&contract.payment_stages)
    }

    fn require_contract(&self, id: ContractId) -> ServiceResult<Contract> {
        self.store
            .load_contract(id)?
            .ok_or(ServiceError::ContractNotFound(id))
    }

    /// Store a new contract and its freshly generated schedule.
    pub fn create_contract(&self, contract: Contract) -> ServiceResult<Vec<MonthGroup>> {
        Self::validate_contract(&contract)?;
        let groups = generate_schedule(contract.start_date, contract.effective_duration_days())?;
        self.store.insert_contract(&contract, &groups)?;
        info!(
            "generated {} weeks over {} months for contract {}",
            schedule::entries(&groups).count(),
            groups.len(),
            contract.id
        );
        Ok(groups)
    }

    pub fn contract(&self, id: ContractId) -> ServiceResult<Contract> {
        self.require_contract(id)
    }

    pub fn contracts(&self) -> ServiceResult<Vec<Contract>> {
        Ok(self.store.list_contracts()?)
    }

    pub fn delete_contract(&self, id: ContractId) -> ServiceResult<bool> {
        Ok(self.store.delete_contract(id)?)
    }

    pub fn schedule(&self, id: ContractId) -> ServiceResult<Vec<MonthGroup>> {
        self.require_contract(id)?;
        Ok(self.store.load_weeks(id)?)
    }

    pub fn update_week(
        &self,
        id: ContractId,
        key: WeekKey,
        update: &WeekUpdate,
    ) -> ServiceResult<WeekEntry> {
        validation::validate_week_update(update)?;
        self.require_contract(id)?;
        Ok(self.store.update_week(id, key, update)?)
    }

    /// Regenerate from the contract's current effective duration, keeping
    /// recorded progress.
    pub fn regenerate(&self, id: ContractId) -> ServiceResult<Vec<MonthGroup>> {
        let (_, groups) = self
            .store
            .modify_contract(id, &mut |contract: &mut Contract, existing: &[MonthGroup]| {
                reconciled_schedule(contract, existing).map(Some)
            })?;
        info!(
            "regenerated schedule of contract {id}: {} weeks",
            schedule::entries(&groups).count()
        );
        Ok(groups)
    }

    pub fn apply_addendum(&self, id: ContractId, addendum: Addendum) -> ServiceResult<Contract> {
        let number = addendum.number;
        let mut previous_days = 0;
        let (contract, _) = self
            .store
            .modify_contract(id, &mut |contract: &mut Contract, existing: &[MonthGroup]| {
                previous_days = contract.effective_duration_days();
                contract.add_addendum(addendum.clone())?;
                reconciled_schedule(contract, existing).map(Some)
            })?;
        info!(
            "addendum {number} applied to contract {id}: {previous_days} -> {} days",
            contract.effective_duration_days()
        );
        Ok(contract)
    }

    pub fn record_payment_stage(
        &self,
        id: ContractId,
        stage: PaymentStage,
    ) -> ServiceResult<ProgressTotals> {
        let (contract, _) = self
            .store
            .modify_contract(id, &mut |contract: &mut Contract, _: &[MonthGroup]| {
                contract.upsert_payment_stage(stage.clone());
                validation::validate_payment_stages(&contract.payment_stages)
                    .map_err(PersistenceError::Rejected)?;
                Ok(None)
            })?;
        Ok(Self::financial_totals(&contract))
    }

    pub fn financial_progress(&self, id: ContractId) -> ServiceResult<ProgressTotals> {
        let contract = self.require_contract(id)?;
        Ok(Self::financial_totals(&contract))
    }

    pub fn physical_progress(&self, id: ContractId) -> ServiceResult<PhysicalProgress> {
        Ok(PhysicalProgress::from_groups(&self.schedule(id)?))
    }

    pub fn progress_report(
        &self,
        id: ContractId,
        as_of: Option<NaiveDate>,
    ) -> ServiceResult<ProgressReport> {
        let contract = self.require_contract(id)?;
        let groups = self.store.load_weeks(id)?;
        Ok(ProgressReport {
            contract_id: id,
            effective_duration_days: contract.effective_duration_days(),
            end_date: contract.end_date(),
            financial: Self::financial_totals(&contract),
            physical: PhysicalProgress::from_groups(&groups),
            physical_as_of: as_of.map(|date| PhysicalProgress::as_of(&groups, date)),
            curve: progress::cumulative_curve(&groups),
        })
    }

    pub fn snapshot(&self, id: ContractId) -> ServiceResult<ContractSnapshot> {
        let contract = self.require_contract(id)?;
        let groups = self.store.load_weeks(id)?;
        Ok(ContractSnapshot::new(contract, groups))
    }

    /// Store a previously exported contract, replacing any existing copy.
    pub fn import_snapshot(&self, snapshot: &ContractSnapshot) -> ServiceResult<()> {
        Self::validate_contract(&snapshot.contract)?;
        validation::validate_schedule_groups(
            snapshot.contract.start_date,
            snapshot.contract.effective_duration_days(),
            &snapshot.schedule,
        )?;
        self.store
            .put_contract(&snapshot.contract, &snapshot.schedule)?;
        Ok(())
    }

    fn financial_totals(contract: &Contract) -> ProgressTotals {
        ProgressTotals::aggregate(contract.payment_percentages(), contract.effective_value())
    }
}

/// Fresh schedule for the contract's effective duration with the progress
/// recorded in `existing` carried over.
fn reconciled_schedule(
    contract: &Contract,
    existing: &[MonthGroup],
) -> PersistenceResult<Vec<MonthGroup>> {
    let regenerated = generate_schedule(contract.start_date, contract.effective_duration_days())?;
    carry_over_progress(existing, regenerated)
}

/// Copy recorded values from `existing` into `regenerated` by week key.
/// Refuses when a week holding recorded progress has no counterpart.
fn carry_over_progress(
    existing: &[MonthGroup],
    mut regenerated: Vec<MonthGroup>,
) -> PersistenceResult<Vec<MonthGroup>> {
    for entry in schedule::entries(existing).filter(|e| e.has_recorded_progress()) {
        let update = WeekUpdate::both(entry.rencana(), entry.realisasi());
        match schedule::update_in_groups(&mut regenerated, entry.key(), &update) {
            Ok(_) => {}
            Err(ScheduleError::NotFound(key)) => {
                warn!("refusing to regenerate: week {key} holds recorded progress");
                return Err(PersistenceError::ProgressWouldBeDiscarded(key));
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(regenerated)
}
