//! Request handlers for the device API.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::info;

use kasa_core::{DeviceCounts, DeviceRecord, parse_address};

use super::error::ApiError;
use super::state::ApiState;

type ApiResult<T> = Result<Json<T>, ApiError>;
type Body<T> = Result<Json<T>, JsonRejection>;

// ── Responses ───────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
pub struct DeviceListResponse {
    success: bool,
    count: usize,
    devices: Vec<DeviceRecord>,
}

impl DeviceListResponse {
    fn new(devices: Vec<DeviceRecord>) -> Self {
        Self {
            success: true,
            count: devices.len(),
            devices,
        }
    }
}

#[derive(Serialize)]
pub struct DeviceResponse {
    success: bool,
    device: DeviceRecord,
}

impl From<DeviceRecord> for DeviceResponse {
    fn from(device: DeviceRecord) -> Self {
        Self {
            success: true,
            device,
        }
    }
}

/// Control result: the attempted values next to the resulting record.
#[derive(Serialize)]
pub struct ControlResponse<T> {
    success: bool,
    #[serde(flatten)]
    applied: T,
    device: DeviceRecord,
}

fn applied<T>(applied: T, device: DeviceRecord) -> Json<ControlResponse<T>> {
    Json(ControlResponse {
        success: true,
        applied,
        device,
    })
}

#[derive(Serialize)]
pub struct StatsResponse {
    success: bool,
    #[serde(flatten)]
    counts: DeviceCounts,
}

// ── Requests ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    Online,
    Offline,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    status: Option<StatusFilter>,
}

#[derive(Debug, Deserialize)]
pub struct AddRequest {
    ip: String,
    port: Option<u16>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PowerRequest {
    on: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BrightnessRequest {
    brightness: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ColorRequest {
    hue: i64,
    saturation: i64,
    value: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorTempRequest {
    color_temp: i64,
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn discover(State(state): State<ApiState>) -> ApiResult<DeviceListResponse> {
    let outcomes = state.ctx.discover_all(&state.candidates).await?;
    let devices: Vec<DeviceRecord> = outcomes
        .iter()
        .filter_map(|o| o.record().cloned())
        .collect();
    info!(probed = outcomes.len(), found = devices.len(), "discovery requested");
    Ok(Json(DeviceListResponse::new(devices)))
}

pub async fn list_devices(
    State(state): State<ApiState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<DeviceListResponse> {
    let Query(query) = query?;
    let online = query.status.map(|s| matches!(s, StatusFilter::Online));
    Ok(Json(DeviceListResponse::new(state.ctx.list(online).await?)))
}

pub async fn get_device(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<DeviceResponse> {
    Ok(Json(state.ctx.get(&id).await?.into()))
}

pub async fn add_device(
    State(state): State<ApiState>,
    body: Body<AddRequest>,
) -> Result<(StatusCode, Json<DeviceResponse>), ApiError> {
    let Json(body) = body?;
    let addr = parse_address(&body.ip, body.port.unwrap_or(state.default_port()))?;
    let record = state.ctx.add_device(addr).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

pub async fn delete_device(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<DeviceResponse> {
    Ok(Json(state.ctx.remove_device(&id).await?.into()))
}

pub async fn set_power(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Body<PowerRequest>,
) -> ApiResult<ControlResponse<PowerRequest>> {
    let Json(body) = body?;
    let record = state.ctx.set_power(&id, body.on).await?;
    Ok(applied(body, record))
}

pub async fn toggle_power(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<ControlResponse<PowerRequest>> {
    let record = state.ctx.toggle_power(&id).await?;
    Ok(applied(PowerRequest { on: record.is_on }, record))
}

pub async fn set_brightness(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Body<BrightnessRequest>,
) -> ApiResult<ControlResponse<BrightnessRequest>> {
    let Json(body) = body?;
    let record = state.ctx.set_brightness(&id, body.brightness).await?;
    Ok(applied(body, record))
}

pub async fn set_color(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Body<ColorRequest>,
) -> ApiResult<ControlResponse<ColorRequest>> {
    let Json(body) = body?;
    let record = state
        .ctx
        .set_color(&id, body.hue, body.saturation, body.value)
        .await?;
    Ok(applied(body, record))
}

pub async fn set_color_temp(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Body<ColorTempRequest>,
) -> ApiResult<ControlResponse<ColorTempRequest>> {
    let Json(body) = body?;
    let record = state.ctx.set_color_temp(&id, body.color_temp).await?;
    Ok(applied(body, record))
}

pub async fn stats(State(state): State<ApiState>) -> ApiResult<StatsResponse> {
    Ok(Json(StatsResponse {
        success: true,
        counts: state.ctx.counts().await?,
    }))
}
