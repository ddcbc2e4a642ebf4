use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::position::{CloseReason, Direction, Position, TradingMode};

/// Closed-position projection. Written once per close, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    pub position_id: String,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub quantity: Decimal,
    pub pnl: Decimal,
    pub duration_seconds: i64,
    pub strategy: Option<String>,
    pub trading_mode: TradingMode,
    pub is_paper_trade: bool,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub close_reason: CloseReason,
}

impl Trade {
    pub(crate) fn from_closed_position(
        position: &Position,
        exit_time: DateTime<Utc>,
        close_reason: CloseReason,
    ) -> Self {
        Trade {
            id: Uuid::new_v4().to_string(),
            position_id: position.id.clone(),
            symbol: position.symbol.clone(),
            direction: position.direction,
            entry_price: position.entry_price,
            exit_price: position.current_price,
            quantity: position.quantity,
            pnl: position.pnl,
            duration_seconds: (exit_time - position.created_at).num_seconds().max(0),
            strategy: position.strategy.clone(),
            trading_mode: position.trading_mode,
            is_paper_trade: position.is_paper_trade,
            entry_time: position.created_at,
            exit_time,
            close_reason,
        }
    }

    pub fn is_win(&self) -> bool {
        self.pnl > Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::position::NewPosition;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[test]
    fn test_trade_duration_and_pnl() {
        let opened_at = Utc::now() - Duration::seconds(90);
        let mut position = Position::open(
            NewPosition {
                symbol: "ETHUSDT".to_string(),
                direction: Direction::Short,
                fill_price: dec!(2000),
                stop_loss: dec!(2100),
                take_profit: dec!(1800),
                quantity: dec!(0.5),
                trading_mode: TradingMode::Leverage,
                strategy: Some("breakout".to_string()),
                is_paper_trade: false,
            },
            opened_at,
        )
        .unwrap();

        let trade = position
            .close(dec!(2100), CloseReason::StopLoss, Utc::now())
            .unwrap();

        assert_eq!(trade.pnl, dec!(-50.0));
        assert!(!trade.is_win());
        assert!(trade.duration_seconds >= 90);
        assert_eq!(trade.entry_time, opened_at);
        assert_eq!(trade.close_reason, CloseReason::StopLoss);
        assert!(!trade.is_paper_trade);
    }
}
