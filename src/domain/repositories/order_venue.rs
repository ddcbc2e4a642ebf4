//! Order Venue Trait
//!
//! `OrderVenue` is the seam between the live execution adapter and whatever
//! actually routes orders. The engine makes a single submission per opportunity
//! and per tick; retries, if any, belong to the venue.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::entities::position::{Direction, TradingMode};
use crate::domain::entities::settings::ExchangeCredentials;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VenueError {
    #[error("Order rejected: {0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Acknowledgment carried no fill price for order {0}")]
    MissingFill(String),

    #[error("Invalid venue response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Side of the order that opens a position in `direction`.
    pub fn opening(direction: Direction) -> Self {
        if direction.is_long_side() {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Market order as sent to the venue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub direction: Direction,
    pub quantity: Decimal,
    /// Quote the sizing was computed from.
    pub reference_price: Decimal,
    pub trading_mode: TradingMode,
    /// Signing material for venues that need it. Never serialized.
    #[serde(skip)]
    pub credentials: ExchangeCredentials,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    pub order_id: String,
    pub fill_price: Option<Decimal>,
    pub filled_quantity: Option<Decimal>,
}

#[async_trait]
pub trait OrderVenue: Send + Sync {
    /// Venue name used in logs
    fn name(&self) -> &str;

    /// Submit one order and wait for its acknowledgment.
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck, VenueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opening_side() {
        assert_eq!(OrderSide::opening(Direction::Up), OrderSide::Buy);
        assert_eq!(OrderSide::opening(Direction::Long), OrderSide::Buy);
        assert_eq!(OrderSide::opening(Direction::Short), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.to_string(), "SELL");
    }

    #[test]
    fn test_ack_deserializes_decimal_strings() {
        let ack: OrderAck =
            serde_json::from_str(r#"{"orderId":"abc","fillPrice":"30012.5","filledQuantity":"0.01"}"#)
                .unwrap();
        assert_eq!(ack.order_id, "abc");
        assert_eq!(ack.fill_price, Some(Decimal::new(300125, 1)));
    }

    #[test]
    fn test_venue_error_display() {
        let error = VenueError::Rejected("insufficient margin".to_string());
        assert_eq!(error.to_string(), "Order rejected: insufficient margin");
    }
}
