use serde::{Deserialize, Serialize};

use crate::domain::entities::position::{Direction, TradingMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    TrendFollowing,
    MeanReversion,
    Breakout,
    Pullback,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::TrendFollowing,
        StrategyKind::Breakout,
        StrategyKind::Pullback,
        StrategyKind::MeanReversion,
    ];

    /// Tie-break rank, higher wins.
    pub fn priority(&self) -> u8 {
        match self {
            StrategyKind::TrendFollowing => 4,
            StrategyKind::Breakout => 3,
            StrategyKind::Pullback => 2,
            StrategyKind::MeanReversion => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::TrendFollowing => "trend_following",
            StrategyKind::MeanReversion => "mean_reversion",
            StrategyKind::Breakout => "breakout",
            StrategyKind::Pullback => "pullback",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bias {
    Bullish,
    Bearish,
}

impl Bias {
    /// Direction a mode would take on this bias. Spot cannot short.
    pub fn direction_for(&self, mode: TradingMode) -> Option<Direction> {
        match (mode, self) {
            (TradingMode::Spot, Bias::Bullish) => Some(Direction::Up),
            (TradingMode::Spot, Bias::Bearish) => None,
            (TradingMode::Leverage, Bias::Bullish) => Some(Direction::Long),
            (TradingMode::Leverage, Bias::Bearish) => Some(Direction::Short),
        }
    }
}

/// Latest values of every indicator for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSnapshot {
    pub rsi: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub adx: f64,
    pub last_close: f64,
    pub last_volume: f64,
    pub average_volume: f64,
    pub range_high: f64,
    pub range_low: f64,
}

/// Candidate produced by a strategy. Lives for one tick only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingOpportunity {
    pub symbol: String,
    pub strategy: StrategyKind,
    pub bias: Bias,
    pub confidence: f64,
    pub description: String,
    pub indicators: IndicatorSnapshot,
}
