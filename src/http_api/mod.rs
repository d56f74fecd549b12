use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    Addendum, Contract, ContractError, ContractId, MonthGroup, MonthKey, MonthLabelLocale,
    PaymentStage, ProgressReport, ProgressTotals, ScheduleError, ScheduleService, ScheduleStore,
    ServiceError, WeekEntry, WeekKey, WeekUpdate,
};

#[derive(Clone)]
pub struct AppState {
    service: ScheduleService,
    locale: MonthLabelLocale,
}

impl AppState {
    pub fn new(store: Arc<dyn ScheduleStore>, locale: MonthLabelLocale) -> Self {
        Self::with_service(ScheduleService::new(store), locale)
    }

    pub fn with_service(service: ScheduleService, locale: MonthLabelLocale) -> Self {
        Self { service, locale }
    }

    fn service(&self) -> &ScheduleService {
        &self.service
    }
}

/// Month group as rendered for clients, with its display label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthGroupView {
    pub month: MonthKey,
    pub label: String,
    pub items: Vec<WeekEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleView {
    pub contract: Contract,
    pub schedule: Vec<MonthGroupView>,
}

impl ScheduleView {
    fn new(contract: Contract, groups: Vec<MonthGroup>, locale: MonthLabelLocale) -> Self {
        let schedule = groups
            .into_iter()
            .map(|group| MonthGroupView {
                month: group.month,
                label: group.label(locale),
                items: group.items,
            })
            .collect();
        Self { contract, schedule }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ProgressQuery {
    #[serde(default)]
    as_of: Option<NaiveDate>,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Conflict(String),
    Invalid(String),
    Internal(String),
}

impl ApiError {
    fn invalid(message: impl Into<String>) -> Self {
        ApiError::Invalid(message.into())
    }
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        let message = value.to_string();
        match value {
            ServiceError::Schedule(ScheduleError::NotFound(_))
            | ServiceError::ContractNotFound(_) => ApiError::NotFound(message),
            ServiceError::Schedule(ScheduleError::InvalidArgument(_))
            | ServiceError::Validation(_) => ApiError::Invalid(message),
            ServiceError::Contract(ContractError::DuplicateAddendum(_))
            | ServiceError::ContractExists(_)
            | ServiceError::ProgressWouldBeDiscarded(_) => ApiError::Conflict(message),
            ServiceError::Contract(_) => ApiError::Invalid(message),
            ServiceError::Persistence(_) => ApiError::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "conflict", message),
            ApiError::Invalid(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
            ApiError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        };
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/contracts", get(list_contracts).post(create_contract))
        .route("/contracts/:id", get(get_contract).delete(delete_contract))
        .route("/contracts/:id/schedule", get(get_schedule))
        .route("/contracts/:id/schedule/:month/:week", put(update_week))
        .route("/contracts/:id/regenerate", post(regenerate_schedule))
        .route("/contracts/:id/addenda", post(apply_addendum))
        .route("/contracts/:id/payments", put(record_payment))
        .route("/contracts/:id/progress", get(get_progress))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("contract-progress HTTP API listening on http://{addr}");
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn list_contracts(State(state): State<AppState>) -> Result<Json<Vec<Contract>>, ApiError> {
    Ok(Json(state.service().contracts()?))
}

async fn create_contract(
    State(state): State<AppState>,
    Json(contract): Json<Contract>,
) -> Result<(StatusCode, Json<ScheduleView>), ApiError> {
    let groups = state.service().create_contract(contract.clone())?;
    Ok((
        StatusCode::CREATED,
        Json(ScheduleView::new(contract, groups, state.locale)),
    ))
}

async fn get_contract(
    State(state): State<AppState>,
    Path(id): Path<ContractId>,
) -> Result<Json<Contract>, ApiError> {
    Ok(Json(state.service().contract(id)?))
}

async fn delete_contract(
    State(state): State<AppState>,
    Path(id): Path<ContractId>,
) -> Result<StatusCode, ApiError> {
    if !state.service().delete_contract(id)? {
        return Err(ApiError::NotFound(format!("contract {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn get_schedule(
    State(state): State<AppState>,
    Path(id): Path<ContractId>,
) -> Result<Json<ScheduleView>, ApiError> {
    let service = state.service();
    let contract = service.contract(id)?;
    let groups = service.schedule(id)?;
    Ok(Json(ScheduleView::new(contract, groups, state.locale)))
}

async fn update_week(
    State(state): State<AppState>,
    Path((id, month, week)): Path<(ContractId, String, u32)>,
    Json(update): Json<WeekUpdate>,
) -> Result<Json<WeekEntry>, ApiError> {
    let month: MonthKey = month
        .parse()
        .map_err(|err| ApiError::invalid(format!("{err}")))?;
    let key = WeekKey::new(month, week);
    Ok(Json(state.service().update_week(id, key, &update)?))
}

async fn regenerate_schedule(
    State(state): State<AppState>,
    Path(id): Path<ContractId>,
) -> Result<Json<ScheduleView>, ApiError> {
    let service = state.service();
    let groups = service.regenerate(id)?;
    let contract = service.contract(id)?;
    Ok(Json(ScheduleView::new(contract, groups, state.locale)))
}

async fn apply_addendum(
    State(state): State<AppState>,
    Path(id): Path<ContractId>,
    Json(addendum): Json<Addendum>,
) -> Result<(StatusCode, Json<Contract>), ApiError> {
    let contract = state.service().apply_addendum(id, addendum)?;
    Ok((StatusCode::CREATED, Json(contract)))
}

async fn record_payment(
    State(state): State<AppState>,
    Path(id): Path<ContractId>,
    Json(stage): Json<PaymentStage>,
) -> Result<Json<ProgressTotals>, ApiError> {
    Ok(Json(state.service().record_payment_stage(id, stage)?))
}

async fn get_progress(
    State(state): State<AppState>,
    Path(id): Path<ContractId>,
    Query(query): Query<ProgressQuery>,
) -> Result<Json<ProgressReport>, ApiError> {
    Ok(Json(state.service().progress_report(id, query.as_of)?))
}
