use axum::{extract::State, Json};

use crate::models::api::HealthData;
use crate::AppState;

pub async fn health(State(state): State<AppState>) -> Json<HealthData> {
    Json(HealthData {
        status: "ok",
        gateway: state.controller.gateway_mode(),
        auto_approve: state.controller.auto_approve(),
        monitoring: state.controller.monitoring_status(),
        timestamp: chrono::Utc::now(),
    })
}
