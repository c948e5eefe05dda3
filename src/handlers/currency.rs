use axum::Json;

use crate::models::api::ApiResponse;
use crate::models::currency::{supported_currencies, CurrencyInfo};

pub async fn list_currencies() -> Json<ApiResponse<Vec<CurrencyInfo>>> {
    Json(ApiResponse::ok(supported_currencies()))
}
