use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::handlers::error::{verify_webhook_signature, ApiError};
use crate::models::api::WebhookEvent;
use crate::models::error::ErrorResponse;
use crate::services::lifecycle::{LifecycleError, WebhookOutcome};
use crate::AppState;

const SIGNATURE_HEADER: &str = "x-obiex-signature";

/// Gateway notifications, signed with HMAC-SHA512 over the raw body
pub async fn obiex_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let Some(secret) = state.webhook_secret.as_deref() else {
        warn!("Webhook received but OBIEX_WEBHOOK_SECRET is not configured");
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new("CONFIG_ERROR", "Webhook verification is not configured")),
        ));
    };

    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        warn!("Missing {} header in webhook request", SIGNATURE_HEADER);
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("UNAUTHORIZED", "Missing signature")),
        ));
    };

    if !verify_webhook_signature(secret, &body, signature) {
        warn!(body_len = body.len(), "Webhook signature verification failed");
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("UNAUTHORIZED", "Invalid signature")),
        ));
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| LifecycleError::validation(format!("Invalid webhook payload: {}", e)))?;

    info!(
        event_type = %event.event_type,
        tx_hash = event.hash.as_deref().unwrap_or(""),
        reference = event.reference.as_deref().unwrap_or(""),
        "Received Obiex webhook"
    );

    let outcome = state.controller.handle_webhook_deposit(event).await?;
    let outcome = match outcome {
        WebhookOutcome::Processed => "processed",
        WebhookOutcome::AlreadyRecorded => "already_recorded",
        WebhookOutcome::Ignored => "ignored",
    };

    Ok(Json(json!({ "received": true, "outcome": outcome })))
}
