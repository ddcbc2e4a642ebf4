//! Trading Engine
//!
//! Facade over the two bot controllers, the log bus and the store. This is the
//! surface transports and the binary talk to.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::application::actors::bot_controller::{
    BotConfig, BotController, BotControllerHandle, BotDependencies, BotStatus,
};
use crate::application::log_bus::{BusEvent, LogBus};
use crate::domain::entities::bot_log::{BotLog, SystemError};
use crate::domain::entities::position::{Position, PositionStatus, TradingMode};
use crate::domain::entities::trade::Trade;
use crate::domain::errors::EngineError;
use crate::domain::repositories::market_data::MarketDataProvider;
use crate::domain::repositories::order_venue::OrderVenue;
use crate::domain::repositories::store::TradingStore;
use crate::domain::services::position_manager::CloseOutcome;

pub struct TradingEngine {
    store: Arc<dyn TradingStore>,
    log_bus: Arc<LogBus>,
    spot: BotControllerHandle,
    leverage: BotControllerHandle,
}

impl TradingEngine {
    /// Spawn both controllers. Must be called inside a Tokio runtime.
    pub fn new(
        store: Arc<dyn TradingStore>,
        market_data: Arc<dyn MarketDataProvider>,
        venue: Option<Arc<dyn OrderVenue>>,
        spot: BotConfig,
        leverage: BotConfig,
    ) -> Result<Self, EngineError> {
        for (expected, config) in [(TradingMode::Spot, &spot), (TradingMode::Leverage, &leverage)] {
            if config.mode != expected {
                return Err(EngineError::InvalidSettings(format!(
                    "{} controller configured with mode {}",
                    expected, config.mode
                )));
            }
        }
        if venue.is_none() {
            warn!("No execution venue configured, live trading is unavailable");
        }

        let log_bus = Arc::new(LogBus::new(store.clone()));
        let deps = BotDependencies {
            store: store.clone(),
            market_data,
            venue,
            log_bus: log_bus.clone(),
        };

        let engine = Self {
            store,
            log_bus,
            spot: BotController::spawn(spot, deps.clone()),
            leverage: BotController::spawn(leverage, deps),
        };
        info!("Trading engine ready");
        Ok(engine)
    }

    fn controller(&self, mode: TradingMode) -> &BotControllerHandle {
        match mode {
            TradingMode::Spot => &self.spot,
            TradingMode::Leverage => &self.leverage,
        }
    }

    pub async fn start(&self, mode: TradingMode) -> Result<BotStatus, EngineError> {
        self.controller(mode).start().await
    }

    pub async fn stop(&self, mode: TradingMode) -> Result<BotStatus, EngineError> {
        self.controller(mode).stop().await
    }

    pub async fn status(&self, mode: TradingMode) -> Result<BotStatus, EngineError> {
        self.controller(mode).status().await
    }

    /// Close one position at the latest quote. Closing twice is a no-op.
    pub async fn close_position(
        &self,
        mode: TradingMode,
        position_id: &str,
    ) -> Result<CloseOutcome, EngineError> {
        self.controller(mode).close_position(position_id).await
    }

    /// Durable log history, newest first.
    pub async fn list_logs(&self, limit: usize) -> Result<Vec<BotLog>, EngineError> {
        Ok(self.log_bus.list(limit).await?)
    }

    /// Live mirror, oldest first, at most 100 entries.
    pub fn recent_logs(&self) -> Vec<BotLog> {
        self.log_bus.recent()
    }

    pub async fn clear_logs(&self) -> Result<u64, EngineError> {
        Ok(self.log_bus.clear().await?)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.log_bus.subscribe()
    }

    pub async fn list_positions(
        &self,
        mode: Option<TradingMode>,
        status: Option<PositionStatus>,
    ) -> Result<Vec<Position>, EngineError> {
        Ok(self.store.list_positions(mode, status).await?)
    }

    pub async fn list_trades(&self, mode: Option<TradingMode>) -> Result<Vec<Trade>, EngineError> {
        Ok(self.store.list_trades(mode).await?)
    }

    pub async fn list_errors(&self, resolved: Option<bool>) -> Result<Vec<SystemError>, EngineError> {
        Ok(self.store.list_errors(resolved).await?)
    }

    pub async fn resolve_error(&self, id: i64) -> Result<bool, EngineError> {
        Ok(self.store.resolve_error(id).await?)
    }

    /// Stop both controllers, letting in-flight ticks finish, and end their actors.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        let (spot, leverage) = tokio::join!(self.spot.shutdown(), self.leverage.shutdown());
        spot?;
        leverage?;
        info!("Trading engine shut down");
        Ok(())
    }
}
