//! Shared handler plumbing: error envelope, body extraction, admin auth

use axum::{extract::rejection::JsonRejection, http::HeaderMap, http::StatusCode, Json};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use tracing::{error, warn};

use crate::models::error::ErrorResponse;
use crate::services::lifecycle::LifecycleError;
use crate::AppState;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

impl From<LifecycleError> for (StatusCode, Json<ErrorResponse>) {
    fn from(err: LifecycleError) -> Self {
        let status = err.status_code();

        // Internal detail is logged, never returned
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", err);
            "An unexpected error occurred".to_string()
        } else {
            err.to_string()
        };

        let mut body = ErrorResponse::new(err.code(), message);
        if let Some(details) = err.details() {
            body = body.with_details(details);
        }
        (status, Json(body))
    }
}

/// Unwrap a JSON body, reporting malformed input as `VALIDATION_ERROR`
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        LifecycleError::validation(format!("Invalid request body: {}", rejection.body_text())).into()
    })
}

pub fn check_admin_auth(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(admin_key) = state.admin_api_key.as_deref() else {
        error!("ADMIN_API_KEY not configured");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("CONFIG_ERROR", "Server configuration error")),
        ));
    };

    let provided_key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if provided_key.is_empty() {
        warn!("Missing admin API key");
        return Err(LifecycleError::Unauthorized.into());
    }

    if provided_key != admin_key {
        warn!("Invalid admin API key");
        return Err(LifecycleError::Forbidden.into());
    }

    Ok(())
}

/// Check a hex HMAC-SHA512 signature over the raw webhook body
pub fn verify_webhook_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha512>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}
