use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::entities::trade::Trade;
use crate::domain::errors::ValidationError;

/// The two independently governed trading contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Spot,
    Leverage,
}

impl TradingMode {
    pub const ALL: [TradingMode; 2] = [TradingMode::Spot, TradingMode::Leverage];

    pub fn as_str(&self) -> &'static str {
        match self {
            TradingMode::Spot => "spot",
            TradingMode::Leverage => "leverage",
        }
    }
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradingMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spot" => Ok(TradingMode::Spot),
            "leverage" => Ok(TradingMode::Leverage),
            other => Err(ValidationError::UnknownVariant {
                field: "trading_mode",
                value: other.to_string(),
            }),
        }
    }
}

/// `UP` is a spot buy; `LONG`/`SHORT` are leveraged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Long,
    Short,
}

impl Direction {
    /// True for directions that profit when price rises.
    pub fn is_long_side(&self) -> bool {
        matches!(self, Direction::Up | Direction::Long)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UP" => Ok(Direction::Up),
            "LONG" => Ok(Direction::Long),
            "SHORT" => Ok(Direction::Short),
            other => Err(ValidationError::UnknownVariant {
                field: "direction",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Open => "open",
            PositionStatus::Closed => "closed",
        }
    }
}

impl FromStr for PositionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(PositionStatus::Open),
            "closed" => Ok(PositionStatus::Closed),
            other => Err(ValidationError::UnknownVariant {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    StopLoss,
    TakeProfit,
    Manual,
    BotStop,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::StopLoss => "stop_loss",
            CloseReason::TakeProfit => "take_profit",
            CloseReason::Manual => "manual",
            CloseReason::BotStop => "bot_stop",
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloseReason {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop_loss" => Ok(CloseReason::StopLoss),
            "take_profit" => Ok(CloseReason::TakeProfit),
            "manual" => Ok(CloseReason::Manual),
            "bot_stop" => Ok(CloseReason::BotStop),
            other => Err(ValidationError::UnknownVariant {
                field: "close_reason",
                value: other.to_string(),
            }),
        }
    }
}

/// Signed profit of a position at `current`.
///
/// Long-side directions gain when price rises, `SHORT` gains when it falls.
/// Used for both mark-to-market and realized PnL.
pub fn compute_pnl(
    direction: Direction,
    entry_price: Decimal,
    current_price: Decimal,
    quantity: Decimal,
) -> Decimal {
    if direction.is_long_side() {
        (current_price - entry_price) * quantity
    } else {
        (entry_price - current_price) * quantity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: String,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub current_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub quantity: Decimal,
    pub pnl: Decimal,
    pub status: PositionStatus,
    pub trading_mode: TradingMode,
    pub strategy: Option<String>,
    pub is_paper_trade: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub close_reason: Option<CloseReason>,
}

/// Everything needed to materialize a filled position.
#[derive(Debug, Clone)]
pub struct NewPosition {
    pub symbol: String,
    pub direction: Direction,
    pub fill_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub quantity: Decimal,
    pub trading_mode: TradingMode,
    pub strategy: Option<String>,
    pub is_paper_trade: bool,
}

impl Position {
    pub fn open(new: NewPosition, at: DateTime<Utc>) -> Result<Self, ValidationError> {
        if new.fill_price <= Decimal::ZERO {
            return Err(ValidationError::InvalidPrice(format!(
                "fill price must be positive, got {}",
                new.fill_price
            )));
        }
        if new.quantity <= Decimal::ZERO {
            return Err(ValidationError::InvalidQuantity(format!(
                "quantity must be positive, got {}",
                new.quantity
            )));
        }

        Ok(Position {
            id: Uuid::new_v4().to_string(),
            symbol: new.symbol,
            direction: new.direction,
            entry_price: new.fill_price,
            current_price: new.fill_price,
            stop_loss: new.stop_loss,
            take_profit: new.take_profit,
            quantity: new.quantity,
            pnl: Decimal::ZERO,
            status: PositionStatus::Open,
            trading_mode: new.trading_mode,
            strategy: new.strategy,
            is_paper_trade: new.is_paper_trade,
            created_at: at,
            updated_at: at,
            closed_at: None,
            close_reason: None,
        })
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Refresh the current price and recompute PnL.
    pub fn mark(&mut self, price: Decimal, at: DateTime<Utc>) -> Result<(), ValidationError> {
        if !self.is_open() {
            return Err(ValidationError::PositionClosed(self.id.clone()));
        }
        self.current_price = price;
        self.pnl = compute_pnl(self.direction, self.entry_price, price, self.quantity);
        self.updated_at = at;
        Ok(())
    }

    pub fn should_stop_loss(&self) -> bool {
        if self.direction.is_long_side() {
            self.current_price <= self.stop_loss
        } else {
            self.current_price >= self.stop_loss
        }
    }

    pub fn should_take_profit(&self) -> bool {
        if self.direction.is_long_side() {
            self.current_price >= self.take_profit
        } else {
            self.current_price <= self.take_profit
        }
    }

    /// Exit reason at the current price. Stop-loss wins over take-profit.
    pub fn exit_trigger(&self) -> Option<CloseReason> {
        if !self.is_open() {
            None
        } else if self.should_stop_loss() {
            Some(CloseReason::StopLoss)
        } else if self.should_take_profit() {
            Some(CloseReason::TakeProfit)
        } else {
            None
        }
    }

    /// Transition to `closed` at `exit_price` and build the matching trade.
    pub fn close(
        &mut self,
        exit_price: Decimal,
        reason: CloseReason,
        at: DateTime<Utc>,
    ) -> Result<Trade, ValidationError> {
        self.mark(exit_price, at)?;
        self.status = PositionStatus::Closed;
        self.closed_at = Some(at);
        self.close_reason = Some(reason);
        Ok(Trade::from_closed_position(self, at, reason))
    }
}
