use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Latest traded price for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// One OHLCV bar. Indicator math runs on floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Result<Self, String> {
        for (name, value) in [("open", open), ("high", high), ("low", low), ("close", close)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("{} must be a positive finite price, got {}", name, value));
            }
        }
        if high < low {
            return Err(format!("high {} is below low {}", high, low));
        }
        if !volume.is_finite() || volume < 0.0 {
            return Err(format!("volume must be non-negative, got {}", volume));
        }
        Ok(Candle {
            open,
            high,
            low,
            close,
            volume,
        })
    }
}
