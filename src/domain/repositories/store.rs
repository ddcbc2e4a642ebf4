//! Durable store used by the engine.
//!
//! The store is the single source of truth for whether a position is still
//! open. `close_position` must flip the status and record the trade atomically,
//! and report whether this call was the one that closed it.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::bot_log::{BotLog, SystemError};
use crate::domain::entities::position::{Position, PositionStatus, TradingMode};
use crate::domain::entities::settings::TradingSettings;
use crate::domain::entities::trade::Trade;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait TradingStore: Send + Sync {
    async fn get_settings(&self, user_id: &str) -> Result<Option<TradingSettings>, StoreError>;

    async fn save_settings(&self, settings: &TradingSettings) -> Result<(), StoreError>;

    async fn insert_position(&self, position: &Position) -> Result<(), StoreError>;

    /// Persist a mark-to-market refresh. Returns false if the position is no
    /// longer open.
    async fn update_position_mark(&self, position: &Position) -> Result<bool, StoreError>;

    /// Close `closed` and insert `trade` in one transaction. Returns false,
    /// writing nothing, when the position was already closed.
    async fn close_position(&self, closed: &Position, trade: &Trade) -> Result<bool, StoreError>;

    async fn get_position(&self, id: &str) -> Result<Option<Position>, StoreError>;

    async fn list_positions(
        &self,
        mode: Option<TradingMode>,
        status: Option<PositionStatus>,
    ) -> Result<Vec<Position>, StoreError>;

    async fn count_open_positions(&self, mode: TradingMode) -> Result<usize, StoreError>;

    async fn list_trades(&self, mode: Option<TradingMode>) -> Result<Vec<Trade>, StoreError>;

    async fn insert_log(&self, log: &BotLog) -> Result<i64, StoreError>;

    /// Newest first.
    async fn list_logs(&self, limit: usize) -> Result<Vec<BotLog>, StoreError>;

    async fn clear_logs(&self) -> Result<u64, StoreError>;

    async fn insert_error(&self, error: &SystemError) -> Result<i64, StoreError>;

    async fn list_errors(&self, resolved: Option<bool>) -> Result<Vec<SystemError>, StoreError>;

    /// Returns false when no unresolved error has this id.
    async fn resolve_error(&self, id: i64) -> Result<bool, StoreError>;
}
