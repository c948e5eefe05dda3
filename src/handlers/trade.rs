use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::handlers::error::{json_body, ApiError};
use crate::models::api::{ApiResponse, QuoteRequest, TradeRequest, WithdrawRequest};
use crate::models::gateway::{Quote, TradeExecution, Withdrawal};
use crate::AppState;

pub async fn create_quote(
    State(state): State<AppState>,
    payload: Result<Json<QuoteRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Quote>>, ApiError> {
    let request = json_body(payload)?;
    let quote = state.controller.create_quote(request).await?;
    Ok(Json(ApiResponse::ok(quote)))
}

/// Requires the intent to be APPROVED at the moment of the call
pub async fn execute_trade(
    State(state): State<AppState>,
    payload: Result<Json<TradeRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<TradeExecution>>, ApiError> {
    let request = json_body(payload)?;
    let trade = state.controller.execute_trade(request).await?;
    Ok(Json(ApiResponse::ok(trade).with_message("Trade executed successfully")))
}

/// Requires the intent to be APPROVED at the moment of the call
pub async fn process_withdrawal(
    State(state): State<AppState>,
    payload: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Withdrawal>>, ApiError> {
    let request = json_body(payload)?;
    let withdrawal = state.controller.process_withdrawal(request).await?;
    Ok(Json(
        ApiResponse::ok(withdrawal).with_message("Withdrawal processed successfully"),
    ))
}
