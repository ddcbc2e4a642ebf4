use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::entities::opportunity::StrategyKind;
use crate::domain::entities::position::TradingMode;
use crate::domain::errors::EngineError;

/// Longest lookback any indicator may use.
pub const MAX_INDICATOR_PERIOD: usize = 10_000;

/// Upper bound on the quote amount committed to one trade.
pub const MAX_USDT_PER_TRADE: u64 = 1_000_000_000_000;

/// Parameters shared by the indicator engine and the strategy evaluators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub rsi_low: f64,
    pub rsi_high: f64,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub macd_signal: usize,
    pub adx_period: usize,
    pub adx_trend_floor: f64,
    pub breakout_lookback: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        IndicatorParams {
            rsi_period: 14,
            rsi_low: 30.0,
            rsi_high: 70.0,
            ema_fast: 12,
            ema_slow: 26,
            macd_signal: 9,
            adx_period: 14,
            adx_trend_floor: 25.0,
            breakout_lookback: 20,
        }
    }
}

impl IndicatorParams {
    /// Bars needed before every indicator has a value.
    pub fn required_history(&self) -> usize {
        self.rsi_period
            .saturating_add(1)
            .max(self.ema_slow.saturating_add(self.macd_signal).saturating_sub(1))
            .max(self.adx_period.saturating_mul(2).saturating_add(1))
            .max(self.breakout_lookback.saturating_add(1))
    }

    fn validate(&self) -> Result<(), EngineError> {
        let periods = [
            ("rsiPeriod", self.rsi_period),
            ("emaFast", self.ema_fast),
            ("emaSlow", self.ema_slow),
            ("macdSignal", self.macd_signal),
            ("adxPeriod", self.adx_period),
            ("breakoutLookback", self.breakout_lookback),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, p)| *p == 0) {
            return Err(EngineError::InvalidSettings(format!(
                "{} must be greater than 0",
                name
            )));
        }
        if let Some((name, period)) = periods.iter().find(|(_, p)| *p > MAX_INDICATOR_PERIOD) {
            return Err(EngineError::InvalidSettings(format!(
                "{} must be at most {}, got {}",
                name, MAX_INDICATOR_PERIOD, period
            )));
        }
        if self.ema_fast >= self.ema_slow {
            return Err(EngineError::InvalidSettings(format!(
                "emaFast ({}) must be lower than emaSlow ({})",
                self.ema_fast, self.ema_slow
            )));
        }
        if !(0.0..=100.0).contains(&self.rsi_low)
            || !(0.0..=100.0).contains(&self.rsi_high)
            || self.rsi_low >= self.rsi_high
        {
            return Err(EngineError::InvalidSettings(format!(
                "RSI bounds must satisfy 0 <= rsiLow < rsiHigh <= 100, got [{}, {}]",
                self.rsi_low, self.rsi_high
            )));
        }
        if !self.adx_trend_floor.is_finite() || self.adx_trend_floor < 0.0 {
            return Err(EngineError::InvalidSettings(format!(
                "adxTrendFloor must be non-negative, got {}",
                self.adx_trend_floor
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrategyToggles {
    pub trend_following: bool,
    pub mean_reversion: bool,
    pub breakout: bool,
    pub pullback: bool,
}

impl Default for StrategyToggles {
    fn default() -> Self {
        StrategyToggles {
            trend_following: true,
            mean_reversion: true,
            breakout: true,
            pullback: true,
        }
    }
}

impl StrategyToggles {
    pub fn is_enabled(&self, kind: StrategyKind) -> bool {
        match kind {
            StrategyKind::TrendFollowing => self.trend_following,
            StrategyKind::MeanReversion => self.mean_reversion,
            StrategyKind::Breakout => self.breakout,
            StrategyKind::Pullback => self.pullback,
        }
    }

    pub fn enabled(&self) -> Vec<StrategyKind> {
        StrategyKind::ALL
            .into_iter()
            .filter(|kind| self.is_enabled(*kind))
            .collect()
    }
}

/// Flags owned by exactly one mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModeSettings {
    pub paper_trading: bool,
    pub ai_trading_enabled: bool,
    pub close_on_stop: bool,
    pub strategies: StrategyToggles,
}

impl Default for ModeSettings {
    fn default() -> Self {
        ModeSettings {
            paper_trading: true,
            ai_trading_enabled: false,
            close_on_stop: false,
            strategies: StrategyToggles::default(),
        }
    }
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExchangeCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl ExchangeCredentials {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

impl std::fmt::Debug for ExchangeCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Per-user trading configuration as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TradingSettings {
    pub user_id: String,
    pub usdt_per_trade: Decimal,
    pub max_positions: u32,
    /// Percent of `usdt_per_trade` a stop-out may lose.
    pub risk_per_trade: Decimal,
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
    pub credentials: ExchangeCredentials,
    pub indicators: IndicatorParams,
    pub timeframe: String,
    pub min_confidence: f64,
    pub spot: ModeSettings,
    pub leverage: ModeSettings,
}

impl Default for TradingSettings {
    fn default() -> Self {
        TradingSettings {
            user_id: "default".to_string(),
            usdt_per_trade: Decimal::from(100),
            max_positions: 3,
            risk_per_trade: Decimal::from(2),
            stop_loss_pct: Decimal::from(2),
            take_profit_pct: Decimal::from(4),
            credentials: ExchangeCredentials::default(),
            indicators: IndicatorParams::default(),
            timeframe: "1h".to_string(),
            min_confidence: 60.0,
            spot: ModeSettings::default(),
            leverage: ModeSettings::default(),
        }
    }
}

impl TradingSettings {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.usdt_per_trade <= Decimal::ZERO
            || self.usdt_per_trade > Decimal::from(MAX_USDT_PER_TRADE)
        {
            return Err(EngineError::InvalidSettings(format!(
                "usdtPerTrade must be in (0, {}], got {}",
                MAX_USDT_PER_TRADE, self.usdt_per_trade
            )));
        }
        if self.max_positions == 0 {
            return Err(EngineError::InvalidSettings(
                "maxPositions must be at least 1".to_string(),
            ));
        }
        if self.risk_per_trade <= Decimal::ZERO || self.risk_per_trade > Decimal::ONE_HUNDRED {
            return Err(EngineError::InvalidSettings(format!(
                "riskPerTrade must be in (0, 100], got {}",
                self.risk_per_trade
            )));
        }
        if self.stop_loss_pct <= Decimal::ZERO || self.stop_loss_pct >= Decimal::ONE_HUNDRED {
            return Err(EngineError::InvalidSettings(format!(
                "stopLossPct must be in (0, 100), got {}",
                self.stop_loss_pct
            )));
        }
        if self.take_profit_pct <= Decimal::ZERO {
            return Err(EngineError::InvalidSettings(format!(
                "takeProfitPct must be positive, got {}",
                self.take_profit_pct
            )));
        }
        if !(0.0..=100.0).contains(&self.min_confidence) {
            return Err(EngineError::InvalidSettings(format!(
                "minConfidence must be in [0, 100], got {}",
                self.min_confidence
            )));
        }
        if self.timeframe.trim().is_empty() {
            return Err(EngineError::InvalidSettings(
                "timeframe must not be empty".to_string(),
            ));
        }
        self.indicators.validate()
    }

    /// Project the settings a single mode is allowed to see.
    ///
    /// The other mode's flags are not carried, so a controller cannot read them.
    pub fn for_mode(&self, mode: TradingMode) -> EffectiveSettings {
        let mode_settings = match mode {
            TradingMode::Spot => &self.spot,
            TradingMode::Leverage => &self.leverage,
        };
        EffectiveSettings {
            mode,
            usdt_per_trade: self.usdt_per_trade,
            max_positions: self.max_positions,
            risk_per_trade: self.risk_per_trade,
            stop_loss_pct: self.stop_loss_pct,
            take_profit_pct: self.take_profit_pct,
            credentials: self.credentials.clone(),
            indicators: self.indicators.clone(),
            timeframe: self.timeframe.clone(),
            min_confidence: self.min_confidence,
            mode_settings: mode_settings.clone(),
        }
    }
}

/// Read-only view used for one tick of one mode.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveSettings {
    pub mode: TradingMode,
    pub usdt_per_trade: Decimal,
    pub max_positions: u32,
    pub risk_per_trade: Decimal,
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
    pub credentials: ExchangeCredentials,
    pub indicators: IndicatorParams,
    pub timeframe: String,
    pub min_confidence: f64,
    pub mode_settings: ModeSettings,
}

impl EffectiveSettings {
    pub fn is_paper(&self) -> bool {
        self.mode_settings.paper_trading
    }

    pub fn toggles(&self) -> &StrategyToggles {
        &self.mode_settings.strategies
    }
}
