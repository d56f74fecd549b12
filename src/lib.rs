pub mod calendar;
pub mod config;
pub mod contract;
pub mod frame;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod persistence;
pub mod progress;
pub mod schedule;
pub mod service;
pub mod validation;

pub use calendar::{MonthKey, MonthLabelLocale};
pub use config::AppConfig;
pub use contract::{Addendum, Contract, ContractError, ContractId, PaymentStage};
pub use frame::{render_text_table, schedule_frame};
pub use persistence::file::ContractSnapshot;
#[cfg(feature = "sqlite")]
pub use persistence::sqlite::SqliteScheduleStore;
pub use persistence::{
    MemoryScheduleStore, PersistenceError, ScheduleStore, StoredWeek, load_contract_from_json,
    load_schedule_from_csv, save_contract_to_json, save_schedule_to_csv,
};
pub use progress::{CurvePoint, PhysicalProgress, ProgressTotals, cumulative_curve};
pub use schedule::{
    MonthGroup, ScheduleError, WeekEntry, WeekKey, WeekUpdate, generate_schedule,
    update_week_entry,
};
pub use service::{ProgressReport, ScheduleService, ServiceError};
pub use validation::{DurationDays, Percentage, ValidationError};
