// src/lib.rs

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use services::lifecycle::LifecycleController;

#[derive(Clone)]
pub struct AppState {
    pub controller: LifecycleController,
    pub admin_api_key: Option<String>,
    pub webhook_secret: Option<String>,
}

pub mod config;

pub mod entities {
    pub mod prelude;
    pub mod deposit_intents;
    pub mod deposit_transactions;
}

pub mod models {
    pub mod api;
    pub mod currency;
    pub mod deposit_intent;
    pub mod error;
    pub mod gateway;
}

pub mod services {
    pub mod chain_observer;
    pub mod chain_source;
    pub mod detector;
    pub mod gateway;
    pub mod intent_store;
    pub mod lifecycle;
}

pub mod handlers {
    pub mod admin;
    pub mod currency;
    pub mod deposit;
    pub mod error;
    pub mod health;
    pub mod trade;
    pub mod webhook;
}

pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/deposits", get(handlers::admin::list_deposits))
        .route("/deposits/{intent_id}", get(handlers::admin::get_deposit))
        .route("/deposits/{intent_id}/approve", post(handlers::admin::approve_deposit))
        .route("/deposits/{intent_id}/reject", post(handlers::admin::reject_deposit))
        .route("/deposits/{intent_id}/monitor", delete(handlers::admin::stop_monitoring))
        .route("/stats", get(handlers::admin::get_stats))
        .route("/monitoring", get(handlers::admin::get_monitoring));

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/currencies", get(handlers::currency::list_currencies))
        .route("/deposit-address", post(handlers::deposit::request_deposit_address))
        .route("/deposit-status/{intent_id}", get(handlers::deposit::get_deposit_status))
        .route("/quote", post(handlers::trade::create_quote))
        .route("/trade", post(handlers::trade::execute_trade))
        .route("/withdraw", post(handlers::trade::process_withdrawal))
        .route("/webhooks/obiex", post(handlers::webhook::obiex_webhook))
        .nest("/admin", admin)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
