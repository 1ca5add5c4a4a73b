use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, Time, UtcOffset};

use energy_core::domain::{Appliance, ApplianceStatus, CostBreakdown};

use crate::assistant::{self, Assistant};
use crate::engine::{BillResult, DashboardAggregate, ForecastResult, Window};
use crate::service::{MonitorService, ServiceError};
use crate::store::PgStorage;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MonitorService<PgStorage>>,
    pub assistant: Arc<dyn Assistant>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/", get(root))
        .route("/api/dashboard/:user_id", get(dashboard))
        .route("/api/bill/:user_id", get(bill))
        .route("/api/predict/:user_id", get(predict))
        .route("/api/tariff/evaluate", get(evaluate_tariff))
        .route("/api/appliances", post(create_appliance))
        .route("/api/users/:user_id/appliances", get(list_appliances))
        .route("/api/appliances/:id/control", patch(control_appliance))
        .route("/api/appliances/:id", delete(remove_appliance))
        .route("/api/chatbot", post(chatbot))
        .with_state(state)
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Storage(e) => {
                tracing::error!(error = %e, "storage collaborator failed");
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Round to 2 decimals. Applied to monetary and energy values at this
/// boundary only; everything upstream computes at full precision.
fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round2_map(map: BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    map.into_iter().map(|(k, v)| (k, round2(v))).collect()
}

#[derive(Debug, Serialize)]
struct DashboardResponse {
    total_consumption: f64,
    appliance_breakdown: BTreeMap<String, f64>,
    hourly_data: BTreeMap<String, f64>,
}

impl From<DashboardAggregate> for DashboardResponse {
    fn from(agg: DashboardAggregate) -> Self {
        Self {
            total_consumption: round2(agg.total_consumption),
            appliance_breakdown: round2_map(agg.appliance_breakdown),
            hourly_data: round2_map(agg.hourly_data),
        }
    }
}

#[derive(Debug, Serialize)]
struct BillResponse {
    total_units: f64,
    fixed_charge: f64,
    variable_charge: f64,
    total_payable: f64,
    tariff_name: String,
}

impl From<BillResult> for BillResponse {
    fn from(bill: BillResult) -> Self {
        Self {
            total_units: round2(bill.total_units),
            fixed_charge: round2(bill.fixed_charge),
            variable_charge: round2(bill.variable_charge),
            total_payable: round2(bill.total_payable),
            tariff_name: bill.tariff_name,
        }
    }
}

#[derive(Debug, Serialize)]
struct ForecastResponse {
    avg_daily_usage: f64,
    predicted_units: f64,
    predicted_cost: f64,
}

impl From<ForecastResult> for ForecastResponse {
    fn from(f: ForecastResult) -> Self {
        Self {
            avg_daily_usage: round2(f.avg_daily_usage),
            predicted_units: round2(f.predicted_units),
            predicted_cost: round2(f.predicted_cost),
        }
    }
}

#[derive(Debug, Serialize)]
struct CostResponse {
    variable_charge: f64,
    fixed_charge: f64,
    total: f64,
    marginal_rate: f64,
}

impl From<CostBreakdown> for CostResponse {
    fn from(cost: CostBreakdown) -> Self {
        Self {
            variable_charge: round2(cost.variable_charge),
            fixed_charge: round2(cost.fixed_charge),
            total: round2(cost.total),
            marginal_rate: cost.marginal_rate,
        }
    }
}

#[derive(Debug, Serialize)]
struct ApplianceResponse {
    id: String,
    user_id: String,
    name: String,
    power_rating: f64,
    location: String,
    status: ApplianceStatus,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl From<Appliance> for ApplianceResponse {
    fn from(a: Appliance) -> Self {
        Self {
            id: a.id,
            user_id: a.user_id,
            name: a.name,
            power_rating: a.power_rating,
            location: a.location,
            status: a.status,
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DashboardQuery {
    start: Option<String>,
    end: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TariffQuery {
    units: f64,
}

#[derive(Debug, Deserialize)]
struct CreateApplianceRequest {
    user_id: String,
    name: String,
    power_rating: f64,
    location: String,
}

#[derive(Debug, Deserialize)]
struct ControlRequest {
    status: ApplianceStatus,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    response: String,
}

fn parse_ts(field: &str, value: &str) -> Result<OffsetDateTime, ServiceError> {
    OffsetDateTime::parse(value, &Rfc3339)
        .map_err(|e| ServiceError::InvalidInput(format!("bad {field} timestamp '{value}': {e}")))
}

/// Resolve the requested window; defaults to today-so-far in UTC.
fn resolve_window(query: &DashboardQuery, now: OffsetDateTime) -> Result<Window, ServiceError> {
    let now = now.to_offset(UtcOffset::UTC);
    let start = match &query.start {
        Some(s) => parse_ts("start", s)?,
        None => now.replace_time(Time::MIDNIGHT),
    };
    let end = match &query.end {
        Some(s) => parse_ts("end", s)?,
        None => now,
    };
    Ok(Window::new(start, end)?)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "electricity monitor API is running" }))
}

async fn dashboard(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardResponse>, ServiceError> {
    let window = resolve_window(&query, OffsetDateTime::now_utc())?;
    let agg = state.service.dashboard(&user_id, window).await?;
    Ok(Json(agg.into()))
}

async fn bill(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<BillResponse>, ServiceError> {
    let bill = state.service.bill(&user_id, OffsetDateTime::now_utc()).await?;
    Ok(Json(bill.into()))
}

async fn predict(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ForecastResponse>, ServiceError> {
    let forecast = state
        .service
        .forecast(&user_id, OffsetDateTime::now_utc())
        .await?;
    Ok(Json(forecast.into()))
}

async fn evaluate_tariff(
    State(state): State<AppState>,
    Query(query): Query<TariffQuery>,
) -> Result<Json<CostResponse>, ServiceError> {
    let cost = state.service.evaluate_tariff(query.units)?;
    Ok(Json(cost.into()))
}

async fn create_appliance(
    State(state): State<AppState>,
    Json(req): Json<CreateApplianceRequest>,
) -> Result<(StatusCode, Json<ApplianceResponse>), ServiceError> {
    let appliance = state
        .service
        .register_appliance(
            &req.user_id,
            &req.name,
            req.power_rating,
            &req.location,
            OffsetDateTime::now_utc(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(appliance.into())))
}

async fn list_appliances(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<ApplianceResponse>>, ServiceError> {
    let appliances = state.service.appliances(&user_id).await?;
    Ok(Json(appliances.into_iter().map(Into::into).collect()))
}

async fn control_appliance(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ControlRequest>,
) -> Result<Json<ApplianceResponse>, ServiceError> {
    let appliance = state
        .service
        .toggle_appliance(&id, req.status, OffsetDateTime::now_utc())
        .await?;
    Ok(Json(appliance.into()))
}

async fn remove_appliance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    state.service.remove_appliance(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn chatbot(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let response = state
        .assistant
        .generate(assistant::SYSTEM_PROMPT, &req.message)
        .await;
    Json(ChatResponse { response })
}
