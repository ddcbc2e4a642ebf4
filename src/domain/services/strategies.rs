use crate::domain::entities::opportunity::{
    Bias, IndicatorSnapshot, StrategyKind, TradingOpportunity,
};
use crate::domain::entities::settings::IndicatorParams;

/// Volume must reach this multiple of the lookback average to confirm a breakout.
pub const BREAKOUT_VOLUME_RATIO: f64 = 1.5;
/// Distance from EMA-fast, as a fraction of price, that counts as a pullback.
pub const PULLBACK_TOLERANCE: f64 = 0.01;

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

pub trait Strategy {
    fn kind(&self) -> StrategyKind;

    /// At most one opportunity from the latest indicator values.
    fn evaluate(
        &self,
        symbol: &str,
        snapshot: &IndicatorSnapshot,
        params: &IndicatorParams,
    ) -> Option<TradingOpportunity>;
}

fn opportunity(
    kind: StrategyKind,
    symbol: &str,
    bias: Bias,
    confidence: f64,
    description: String,
    snapshot: &IndicatorSnapshot,
) -> TradingOpportunity {
    TradingOpportunity {
        symbol: symbol.to_string(),
        strategy: kind,
        bias,
        confidence: clamp_confidence(confidence),
        description,
        indicators: snapshot.clone(),
    }
}

fn trend_bias(snapshot: &IndicatorSnapshot) -> Option<Bias> {
    if snapshot.ema_fast > snapshot.ema_slow {
        Some(Bias::Bullish)
    } else if snapshot.ema_fast < snapshot.ema_slow {
        Some(Bias::Bearish)
    } else {
        None
    }
}

/// EMA-fast/EMA-slow ordering confirmed by ADX above the trend floor.
pub struct TrendFollowing;

impl Strategy for TrendFollowing {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TrendFollowing
    }

    fn evaluate(
        &self,
        symbol: &str,
        snapshot: &IndicatorSnapshot,
        params: &IndicatorParams,
    ) -> Option<TradingOpportunity> {
        let bias = trend_bias(snapshot)?;
        if snapshot.adx < params.adx_trend_floor {
            return None;
        }

        let mut confidence = 60.0 + (snapshot.adx - params.adx_trend_floor).min(25.0);
        let macd_agrees = match bias {
            Bias::Bullish => snapshot.macd_histogram > 0.0,
            Bias::Bearish => snapshot.macd_histogram < 0.0,
        };
        if macd_agrees {
            confidence += 10.0;
        }

        let description = format!(
            "EMA{} {} EMA{} with ADX {:.1}{}",
            params.ema_fast,
            if bias == Bias::Bullish { "above" } else { "below" },
            params.ema_slow,
            snapshot.adx,
            if macd_agrees { ", MACD confirms" } else { "" }
        );
        Some(opportunity(
            self.kind(),
            symbol,
            bias,
            confidence,
            description,
            snapshot,
        ))
    }
}

/// RSI outside `[rsi_low, rsi_high]`, betting on a return inside the band.
pub struct MeanReversion;

impl Strategy for MeanReversion {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MeanReversion
    }

    fn evaluate(
        &self,
        symbol: &str,
        snapshot: &IndicatorSnapshot,
        params: &IndicatorParams,
    ) -> Option<TradingOpportunity> {
        let (bias, distance) = if snapshot.rsi < params.rsi_low {
            (Bias::Bullish, params.rsi_low - snapshot.rsi)
        } else if snapshot.rsi > params.rsi_high {
            (Bias::Bearish, snapshot.rsi - params.rsi_high)
        } else {
            return None;
        };

        let confidence = (55.0 + 2.0 * distance).min(95.0);
        let description = format!(
            "RSI {:.1} {} ({}), expecting reversion",
            snapshot.rsi,
            if bias == Bias::Bullish { "oversold" } else { "overbought" },
            if bias == Bias::Bullish { params.rsi_low } else { params.rsi_high }
        );
        Some(opportunity(
            self.kind(),
            symbol,
            bias,
            confidence,
            description,
            snapshot,
        ))
    }
}

/// Close beyond the lookback range with volume confirmation.
pub struct Breakout;

impl Strategy for Breakout {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Breakout
    }

    fn evaluate(
        &self,
        symbol: &str,
        snapshot: &IndicatorSnapshot,
        params: &IndicatorParams,
    ) -> Option<TradingOpportunity> {
        if snapshot.average_volume <= 0.0 {
            return None;
        }
        let volume_ratio = snapshot.last_volume / snapshot.average_volume;
        if volume_ratio < BREAKOUT_VOLUME_RATIO {
            return None;
        }

        let (bias, extension_pct) = if snapshot.last_close > snapshot.range_high {
            (
                Bias::Bullish,
                (snapshot.last_close - snapshot.range_high) / snapshot.range_high * 100.0,
            )
        } else if snapshot.last_close < snapshot.range_low {
            (
                Bias::Bearish,
                (snapshot.range_low - snapshot.last_close) / snapshot.range_low * 100.0,
            )
        } else {
            return None;
        };

        let confidence = 60.0
            + (extension_pct * 5.0).min(20.0)
            + ((volume_ratio - BREAKOUT_VOLUME_RATIO) * 10.0).min(15.0);
        let description = format!(
            "Close {:.4} broke the {}-bar {} {:.4} on {:.1}x volume",
            snapshot.last_close,
            params.breakout_lookback,
            if bias == Bias::Bullish { "high" } else { "low" },
            if bias == Bias::Bullish {
                snapshot.range_high
            } else {
                snapshot.range_low
            },
            volume_ratio
        );
        Some(opportunity(
            self.kind(),
            symbol,
            bias,
            confidence,
            description,
            snapshot,
        ))
    }
}

/// Retracement to EMA-fast inside an established trend.
pub struct Pullback;

impl Strategy for Pullback {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Pullback
    }

    fn evaluate(
        &self,
        symbol: &str,
        snapshot: &IndicatorSnapshot,
        params: &IndicatorParams,
    ) -> Option<TradingOpportunity> {
        let bias = trend_bias(snapshot)?;
        let close = snapshot.last_close;
        if close <= 0.0 {
            return None;
        }

        // The trend is intact only while price holds the slow EMA.
        let on_trend_side = match bias {
            Bias::Bullish => close > snapshot.ema_slow,
            Bias::Bearish => close < snapshot.ema_slow,
        };
        if !on_trend_side {
            return None;
        }

        let distance = (close - snapshot.ema_fast).abs() / close;
        if distance > PULLBACK_TOLERANCE {
            return None;
        }

        let mut confidence = 55.0 + (1.0 - distance / PULLBACK_TOLERANCE) * 20.0;
        if snapshot.adx >= params.adx_trend_floor {
            confidence += 10.0;
        }
        let description = format!(
            "{} trend pullback to EMA{} ({:.2}% away)",
            if bias == Bias::Bullish { "Up" } else { "Down" },
            params.ema_fast,
            distance * 100.0
        );
        Some(opportunity(
            self.kind(),
            symbol,
            bias,
            confidence,
            description,
            snapshot,
        ))
    }
}

pub fn strategy_for(kind: StrategyKind) -> Box<dyn Strategy + Send + Sync> {
    match kind {
        StrategyKind::TrendFollowing => Box::new(TrendFollowing),
        StrategyKind::MeanReversion => Box::new(MeanReversion),
        StrategyKind::Breakout => Box::new(Breakout),
        StrategyKind::Pullback => Box::new(Pullback),
    }
}
