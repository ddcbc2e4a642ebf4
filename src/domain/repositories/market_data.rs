use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::market::{Candle, Quote};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MarketDataError {
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid market data: {0}")]
    InvalidData(String),
}

/// Source of quotes and price history.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn latest_quote(&self, symbol: &str) -> Result<Quote, MarketDataError>;

    /// Most recent `window` bars, oldest first.
    async fn price_history(
        &self,
        symbol: &str,
        timeframe: &str,
        window: usize,
    ) -> Result<Vec<Candle>, MarketDataError>;
}
