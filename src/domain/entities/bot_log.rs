use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::errors::{EngineError, ValidationError};

/// Well-known `BotLog` level tags. The level is free-form; these are the ones
/// the engine emits.
pub mod tags {
    pub const SCAN: &str = "SCAN";
    pub const SIGNAL: &str = "SIGNAL";
    pub const TRADE: &str = "TRADE";
    pub const ORDER: &str = "ORDER";
    pub const INFO: &str = "INFO";
    pub const WARNING: &str = "WARNING";
    pub const ERROR: &str = "ERROR";
    pub const SYSTEM: &str = "SYSTEM";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotLog {
    pub id: Option<i64>,
    pub level: String,
    pub message: String,
    pub symbol: Option<String>,
    pub data: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl BotLog {
    pub fn new(level: impl Into<String>, message: impl Into<String>) -> Self {
        BotLog {
            id: None,
            level: level.into(),
            message: message.into(),
            symbol: None,
            data: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorLevel {
    Info,
    Warning,
    Error,
}

impl ErrorLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorLevel::Info => "INFO",
            ErrorLevel::Warning => "WARNING",
            ErrorLevel::Error => "ERROR",
        }
    }
}

impl FromStr for ErrorLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(ErrorLevel::Info),
            "WARNING" => Ok(ErrorLevel::Warning),
            "ERROR" => Ok(ErrorLevel::Error),
            other => Err(ValidationError::UnknownVariant {
                field: "level",
                value: other.to_string(),
            }),
        }
    }
}

/// Persisted error record. Only `resolved`/`resolved_at` ever change, and only
/// through an explicit resolve call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemError {
    pub id: Option<i64>,
    pub level: ErrorLevel,
    pub title: String,
    pub message: String,
    pub source: String,
    pub error_code: Option<String>,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl SystemError {
    pub fn new(
        level: ErrorLevel,
        title: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        SystemError {
            id: None,
            level,
            title: title.into(),
            message: message.into(),
            source: source.into(),
            error_code: None,
            resolved: false,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn from_engine_error(error: &EngineError, source: impl Into<String>) -> Self {
        SystemError::new(error.severity(), error.title(), error.to_string(), source)
            .with_code(error.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bot_log_builder() {
        let log = BotLog::new(tags::SIGNAL, "Trend following bullish")
            .with_symbol("BTCUSDT")
            .with_data(json!({"confidence": 82.5}));

        assert_eq!(log.level, "SIGNAL");
        assert_eq!(log.symbol.as_deref(), Some("BTCUSDT"));
        assert_eq!(log.data.unwrap()["confidence"], 82.5);
        assert!(log.id.is_none());
    }

    #[test]
    fn test_system_error_from_engine_error() {
        let err = EngineError::QuoteUnavailable {
            symbol: "SOLUSDT".to_string(),
            reason: "timeout".to_string(),
        };
        let record = SystemError::from_engine_error(&err, "spot-bot");

        assert_eq!(record.level, ErrorLevel::Warning);
        assert_eq!(record.error_code.as_deref(), Some("QUOTE_UNAVAILABLE"));
        assert_eq!(record.source, "spot-bot");
        assert!(!record.resolved);
        assert!(record.resolved_at.is_none());
    }
}
