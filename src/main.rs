use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dualbot::application::services::TradingEngine;
use dualbot::config::AppConfig;
use dualbot::domain::entities::position::TradingMode;
use dualbot::domain::repositories::order_venue::OrderVenue;
use dualbot::domain::repositories::store::TradingStore;
use dualbot::infrastructure::{HttpMarketData, HttpOrderVenue};
use dualbot::persistence::{init_database_with, repository::SqliteStore};

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C signal"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received SIGTERM signal");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dualbot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    config.validate()?;
    info!(
        "Starting dualbot: spot {:?} every {:?}, leverage {:?} every {:?}",
        config.spot.symbols,
        config.spot.tick_interval,
        config.leverage.symbols,
        config.leverage.tick_interval
    );

    let pool = init_database_with(&config.database).await?;
    let store: Arc<dyn TradingStore> = Arc::new(SqliteStore::new(pool));

    let market_data = Arc::new(HttpMarketData::new(
        &config.market_data_url,
        config.http_timeout,
    )?);
    let venue: Option<Arc<dyn OrderVenue>> = match &config.execution_venue_url {
        Some(url) => {
            info!("Live execution venue: {}", url);
            Some(Arc::new(HttpOrderVenue::new(url, config.http_timeout)?))
        }
        None => None,
    };

    let engine = TradingEngine::new(
        store,
        market_data,
        venue,
        config.bot_config(TradingMode::Spot),
        config.bot_config(TradingMode::Leverage),
    )?;

    for mode in TradingMode::ALL {
        if config.mode(mode).autostart {
            match engine.start(mode).await {
                Ok(status) => info!("{}", status.message),
                Err(e) => warn!("Failed to autostart {} bot: {}", mode, e),
            }
        }
    }

    info!("dualbot running. Press Ctrl+C to stop.");
    shutdown_signal().await;

    info!("Shutting down, waiting for in-flight ticks...");
    engine.shutdown().await?;

    info!("Shutdown complete");
    Ok(())
}
