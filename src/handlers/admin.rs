use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use tracing::info;

use crate::handlers::error::{check_admin_auth, json_body, ApiError};
use crate::models::api::{
    ApiResponse, DepositDetail, ListDepositsQuery, MonitoringStatus, RejectRequest, StatsData,
};
use crate::models::deposit_intent::DepositIntent;
use crate::AppState;

pub async fn list_deposits(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListDepositsQuery>,
) -> Result<Json<ApiResponse<Vec<DepositIntent>>>, ApiError> {
    check_admin_auth(&state, &headers)?;
    let deposits = state.controller.list(query.status, query.limit).await?;
    Ok(Json(ApiResponse::ok(deposits)))
}

pub async fn get_deposit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(intent_id): Path<String>,
) -> Result<Json<ApiResponse<DepositDetail>>, ApiError> {
    check_admin_auth(&state, &headers)?;
    let detail = state.controller.detail(&intent_id).await?;
    Ok(Json(ApiResponse::ok(detail)))
}

pub async fn approve_deposit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(intent_id): Path<String>,
) -> Result<Json<ApiResponse<DepositIntent>>, ApiError> {
    check_admin_auth(&state, &headers)?;
    let intent = state.controller.approve(&intent_id).await?;

    info!(intent_id = %intent_id, "Admin approved deposit");
    Ok(Json(ApiResponse::ok(intent).with_message("Deposit approved successfully")))
}

pub async fn reject_deposit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(intent_id): Path<String>,
    payload: Result<Json<RejectRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<DepositIntent>>, ApiError> {
    check_admin_auth(&state, &headers)?;
    let request = json_body(payload)?;
    let intent = state.controller.reject(&intent_id, request.reason).await?;

    info!(intent_id = %intent_id, "Admin rejected deposit");
    Ok(Json(ApiResponse::ok(intent).with_message("Deposit rejected successfully")))
}

pub async fn stop_monitoring(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(intent_id): Path<String>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    check_admin_auth(&state, &headers)?;
    let stopped = state.controller.stop_monitoring(&intent_id).await?;
    Ok(Json(ApiResponse::ok(json!({ "intentId": intent_id, "stopped": stopped }))))
}

pub async fn get_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<StatsData>>, ApiError> {
    check_admin_auth(&state, &headers)?;
    let deposits = state.controller.stats().await?;
    Ok(Json(ApiResponse::ok(StatsData { deposits })))
}

pub async fn get_monitoring(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<MonitoringStatus>>, ApiError> {
    check_admin_auth(&state, &headers)?;
    Ok(Json(ApiResponse::ok(state.controller.monitoring_status())))
}
