use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use tracing::info;

use crate::handlers::error::{json_body, ApiError};
use crate::models::api::{
    ApiResponse, DepositAddressData, DepositAddressRequest, DepositStatusData,
    DepositStatusResponse,
};
use crate::AppState;

pub async fn request_deposit_address(
    State(state): State<AppState>,
    payload: Result<Json<DepositAddressRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<DepositAddressData>>, ApiError> {
    let request = json_body(payload)?;
    let data = state.controller.request_deposit_address(request).await?;

    info!(intent_id = %data.intent_id, "Deposit address issued");

    let message = if state.controller.auto_approve() {
        "Deposit address generated successfully. Automatic processing enabled."
    } else {
        "Deposit address generated successfully. Awaiting admin approval."
    };
    Ok(Json(ApiResponse::ok(data).with_message(message)))
}

pub async fn get_deposit_status(
    State(state): State<AppState>,
    Path(intent_id): Path<String>,
) -> Result<Json<DepositStatusResponse>, ApiError> {
    let intent = state.controller.deposit_status(&intent_id).await?;
    let data = DepositStatusData::from(&intent);

    Ok(Json(DepositStatusResponse {
        success: true,
        status: data.status,
        data,
    }))
}
