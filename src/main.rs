use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use swap_desk::config::{AppConfig, DetectorKind};
use swap_desk::services::chain_observer::ChainObserver;
use swap_desk::services::chain_source::ExplorerRegistry;
use swap_desk::services::detector::{ChainDetector, DepositDetector, SimulatedDetector};
use swap_desk::services::gateway::{ExchangeGateway, ObiexClient};
use swap_desk::services::intent_store::{DbIntentStore, IntentStore};
use swap_desk::services::lifecycle::LifecycleController;
use swap_desk::{router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,swap_desk=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    // Connect to database
    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url).await?;

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None).await?;

    let store: Arc<dyn IntentStore> = Arc::new(DbIntentStore::new(db));
    let gateway: Arc<dyn ExchangeGateway> = Arc::new(ObiexClient::new(&config.gateway)?);

    let detector: Arc<dyn DepositDetector> = match config.detector {
        DetectorKind::Chain => {
            let source = Arc::new(ExplorerRegistry::new(&config.explorers)?);
            let observer = ChainObserver::new(source, config.poll_interval, config.min_confirmations);
            Arc::new(ChainDetector::new(observer))
        }
        DetectorKind::Simulated => Arc::new(SimulatedDetector::new(
            config.simulated_detection_delay.clone(),
            config.simulated_processing_delay.clone(),
        )),
    };

    tracing::info!(
        auto_approve = config.auto_approve,
        detector = detector.name(),
        gateway = ?gateway.mode(),
        "Services configured"
    );

    let controller = LifecycleController::new(store, gateway, detector, config.auto_approve);

    // Re-arm detection for intents approved before the restart
    controller.resume_monitoring().await?;

    let state = AppState {
        controller: controller.clone(),
        admin_api_key: config.admin_api_key.clone(),
        webhook_secret: config.webhook_secret.clone(),
    };

    if state.admin_api_key.is_none() {
        tracing::warn!("ADMIN_API_KEY not set; admin routes will refuse every request");
    }

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    controller.shutdown();
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
