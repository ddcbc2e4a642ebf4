use thiserror::Error;

use crate::domain::entities::bot_log::ErrorLevel;
use crate::domain::entities::position::TradingMode;
use crate::domain::repositories::store::StoreError;

/// Errors raised while evaluating one tick of a bot.
///
/// Every variant maps onto a handling policy: some skip a symbol, some skip the
/// whole tick, none of them stop the controller.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Insufficient history for {symbol}: need {required} bars, have {available}")]
    InsufficientHistory {
        symbol: String,
        required: usize,
        available: usize,
    },

    #[error("Max positions reached for {mode}: {open} open, limit {max}")]
    MaxPositionsReached {
        mode: TradingMode,
        open: usize,
        max: u32,
    },

    #[error("Order submission failed for {symbol}: {reason}")]
    OrderSubmissionFailed { symbol: String, reason: String },

    #[error("Quote unavailable for {symbol}: {reason}")]
    QuoteUnavailable { symbol: String, reason: String },

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Position not found: {0}")]
    PositionNotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0} controller is not running")]
    ControllerUnavailable(TradingMode),

    #[error("{mode} tick aborted: {reason}")]
    TickAborted { mode: TradingMode, reason: String },
}

impl EngineError {
    /// Level used when this error is persisted as a `SystemError`.
    pub fn severity(&self) -> ErrorLevel {
        match self {
            EngineError::InsufficientHistory { .. } => ErrorLevel::Info,
            EngineError::MaxPositionsReached { .. } => ErrorLevel::Info,
            EngineError::OrderSubmissionFailed { .. } => ErrorLevel::Warning,
            EngineError::QuoteUnavailable { .. } => ErrorLevel::Warning,
            EngineError::PositionNotFound(_) => ErrorLevel::Warning,
            EngineError::InvalidSettings(_) => ErrorLevel::Error,
            EngineError::Store(_) => ErrorLevel::Error,
            EngineError::ControllerUnavailable(_) => ErrorLevel::Error,
            EngineError::TickAborted { .. } => ErrorLevel::Error,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InsufficientHistory { .. } => "INSUFFICIENT_HISTORY",
            EngineError::MaxPositionsReached { .. } => "MAX_POSITIONS_REACHED",
            EngineError::OrderSubmissionFailed { .. } => "ORDER_SUBMISSION_FAILED",
            EngineError::QuoteUnavailable { .. } => "QUOTE_UNAVAILABLE",
            EngineError::InvalidSettings(_) => "INVALID_SETTINGS",
            EngineError::PositionNotFound(_) => "POSITION_NOT_FOUND",
            EngineError::Store(_) => "STORE_ERROR",
            EngineError::ControllerUnavailable(_) => "CONTROLLER_UNAVAILABLE",
            EngineError::TickAborted { .. } => "TICK_ABORTED",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            EngineError::InsufficientHistory { .. } => "Insufficient price history",
            EngineError::MaxPositionsReached { .. } => "Maximum positions reached",
            EngineError::OrderSubmissionFailed { .. } => "Order submission failed",
            EngineError::QuoteUnavailable { .. } => "Quote unavailable",
            EngineError::InvalidSettings(_) => "Invalid trading settings",
            EngineError::PositionNotFound(_) => "Position not found",
            EngineError::Store(_) => "Persistence failure",
            EngineError::ControllerUnavailable(_) => "Controller unavailable",
            EngineError::TickAborted { .. } => "Tick aborted",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Position {0} is already closed")]
    PositionClosed(String),

    #[error("Unknown value for {field}: {value}")]
    UnknownVariant { field: &'static str, value: String },
}
