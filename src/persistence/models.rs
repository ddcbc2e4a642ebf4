//! Database Models
//!
//! Row shapes for positions, trades, logs, errors and settings. Money is
//! stored as decimal strings and timestamps as RFC 3339 strings; conversion to
//! domain types happens here.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use std::str::FromStr;

use crate::domain::entities::bot_log::{BotLog, ErrorLevel, SystemError};
use crate::domain::entities::position::{
    CloseReason, Direction, Position, PositionStatus, TradingMode,
};
use crate::domain::entities::trade::Trade;
use crate::domain::repositories::store::StoreError;

/// Fixed-width RFC 3339 so lexical order matches time order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str, field: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("{} '{}': {}", field, raw, e)))
}

fn parse_optional_timestamp(
    raw: Option<&str>,
    field: &str,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    raw.map(|r| parse_timestamp(r, field)).transpose()
}

fn parse_decimal(raw: &str, field: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(raw).map_err(|e| StoreError::Corrupt(format!("{} '{}': {}", field, raw, e)))
}

fn parse_enum<T: FromStr>(raw: &str, field: &str) -> Result<T, StoreError>
where
    T::Err: std::fmt::Display,
{
    T::from_str(raw).map_err(|e| StoreError::Corrupt(format!("{}: {}", field, e)))
}

/// Position record in database
#[derive(Debug, Clone, FromRow)]
pub struct PositionRecord {
    pub id: String,
    pub symbol: String,
    pub direction: String,
    pub entry_price: String,
    pub current_price: String,
    pub stop_loss: String,
    pub take_profit: String,
    pub quantity: String,
    pub pnl: String,
    pub status: String,
    pub trading_mode: String,
    pub strategy: Option<String>,
    pub is_paper_trade: bool,
    pub created_at: String,
    pub updated_at: String,
    pub closed_at: Option<String>,
    pub close_reason: Option<String>,
}

impl TryFrom<PositionRecord> for Position {
    type Error = StoreError;

    fn try_from(r: PositionRecord) -> Result<Self, Self::Error> {
        Ok(Position {
            direction: parse_enum::<Direction>(&r.direction, "direction")?,
            entry_price: parse_decimal(&r.entry_price, "entry_price")?,
            current_price: parse_decimal(&r.current_price, "current_price")?,
            stop_loss: parse_decimal(&r.stop_loss, "stop_loss")?,
            take_profit: parse_decimal(&r.take_profit, "take_profit")?,
            quantity: parse_decimal(&r.quantity, "quantity")?,
            pnl: parse_decimal(&r.pnl, "pnl")?,
            status: parse_enum::<PositionStatus>(&r.status, "status")?,
            trading_mode: parse_enum::<TradingMode>(&r.trading_mode, "trading_mode")?,
            created_at: parse_timestamp(&r.created_at, "created_at")?,
            updated_at: parse_timestamp(&r.updated_at, "updated_at")?,
            closed_at: parse_optional_timestamp(r.closed_at.as_deref(), "closed_at")?,
            close_reason: r
                .close_reason
                .as_deref()
                .map(|c| parse_enum::<CloseReason>(c, "close_reason"))
                .transpose()?,
            id: r.id,
            symbol: r.symbol,
            strategy: r.strategy,
            is_paper_trade: r.is_paper_trade,
        })
    }
}

/// Trade record in database
#[derive(Debug, Clone, FromRow)]
pub struct TradeRecord {
    pub id: String,
    pub position_id: String,
    pub symbol: String,
    pub direction: String,
    pub entry_price: String,
    pub exit_price: String,
    pub quantity: String,
    pub pnl: String,
    pub duration_seconds: i64,
    pub strategy: Option<String>,
    pub trading_mode: String,
    pub is_paper_trade: bool,
    pub entry_time: String,
    pub exit_time: String,
    pub close_reason: String,
}

impl TryFrom<TradeRecord> for Trade {
    type Error = StoreError;

    fn try_from(r: TradeRecord) -> Result<Self, Self::Error> {
        Ok(Trade {
            direction: parse_enum::<Direction>(&r.direction, "direction")?,
            entry_price: parse_decimal(&r.entry_price, "entry_price")?,
            exit_price: parse_decimal(&r.exit_price, "exit_price")?,
            quantity: parse_decimal(&r.quantity, "quantity")?,
            pnl: parse_decimal(&r.pnl, "pnl")?,
            trading_mode: parse_enum::<TradingMode>(&r.trading_mode, "trading_mode")?,
            entry_time: parse_timestamp(&r.entry_time, "entry_time")?,
            exit_time: parse_timestamp(&r.exit_time, "exit_time")?,
            close_reason: parse_enum::<CloseReason>(&r.close_reason, "close_reason")?,
            id: r.id,
            position_id: r.position_id,
            symbol: r.symbol,
            duration_seconds: r.duration_seconds,
            strategy: r.strategy,
            is_paper_trade: r.is_paper_trade,
        })
    }
}

/// Bot log record in database
#[derive(Debug, Clone, FromRow)]
pub struct BotLogRecord {
    pub id: i64,
    pub level: String,
    pub message: String,
    pub symbol: Option<String>,
    pub data: Option<String>,
    pub timestamp: String,
}

impl TryFrom<BotLogRecord> for BotLog {
    type Error = StoreError;

    fn try_from(r: BotLogRecord) -> Result<Self, Self::Error> {
        let data = r
            .data
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| StoreError::Corrupt(format!("bot_logs.data: {}", e)))?;
        Ok(BotLog {
            id: Some(r.id),
            timestamp: parse_timestamp(&r.timestamp, "timestamp")?,
            level: r.level,
            message: r.message,
            symbol: r.symbol,
            data,
        })
    }
}

/// System error record in database
#[derive(Debug, Clone, FromRow)]
pub struct SystemErrorRecord {
    pub id: i64,
    pub level: String,
    pub title: String,
    pub message: String,
    pub source: String,
    pub error_code: Option<String>,
    pub resolved: bool,
    pub created_at: String,
    pub updated_at: String,
    pub resolved_at: Option<String>,
}

impl TryFrom<SystemErrorRecord> for SystemError {
    type Error = StoreError;

    fn try_from(r: SystemErrorRecord) -> Result<Self, Self::Error> {
        Ok(SystemError {
            id: Some(r.id),
            level: parse_enum::<ErrorLevel>(&r.level, "level")?,
            created_at: parse_timestamp(&r.created_at, "created_at")?,
            updated_at: parse_timestamp(&r.updated_at, "updated_at")?,
            resolved_at: parse_optional_timestamp(r.resolved_at.as_deref(), "resolved_at")?,
            title: r.title,
            message: r.message,
            source: r.source,
            error_code: r.error_code,
            resolved: r.resolved,
        })
    }
}

/// Settings record in database. The settings body is JSON.
#[derive(Debug, Clone, FromRow)]
pub struct SettingsRecord {
    pub user_id: String,
    pub settings: String,
    pub updated_at: String,
}
