use crate::domain::entities::market::Candle;
use crate::domain::entities::opportunity::IndicatorSnapshot;
use crate::domain::entities::settings::IndicatorParams;
use crate::domain::errors::EngineError;

pub trait Indicator {
    fn calculate(&self, candles: &[Candle]) -> Vec<f64>;
}

fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

pub struct EMA {
    pub period: usize,
}

impl EMA {
    pub fn new(period: usize) -> Self {
        EMA { period }
    }

    /// EMA seeded with the SMA of the first `period` values.
    ///
    /// Output index 0 corresponds to input index `period - 1`.
    pub fn calculate_on_values(&self, values: &[f64]) -> Vec<f64> {
        if self.period == 0 || values.len() < self.period {
            return vec![];
        }
        let mut ema_values = Vec::with_capacity(values.len() - self.period + 1);
        let multiplier = 2.0 / (self.period as f64 + 1.0);

        // First EMA is SMA
        let mut ema = values[..self.period].iter().sum::<f64>() / self.period as f64;
        ema_values.push(ema);

        for &val in values.iter().skip(self.period) {
            ema = (val - ema) * multiplier + ema;
            ema_values.push(ema);
        }

        ema_values
    }
}

impl Indicator for EMA {
    fn calculate(&self, candles: &[Candle]) -> Vec<f64> {
        self.calculate_on_values(&closes(candles))
    }
}

/// RSI with Wilder smoothing.
pub struct RSI {
    pub period: usize,
}

impl RSI {
    pub fn new(period: usize) -> Self {
        RSI { period }
    }

    fn value(avg_gain: f64, avg_loss: f64) -> f64 {
        if avg_loss == 0.0 {
            return 100.0;
        }
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }
}

impl Indicator for RSI {
    fn calculate(&self, candles: &[Candle]) -> Vec<f64> {
        if self.period == 0 || candles.len() < self.period + 1 {
            return vec![];
        }
        let (gains, losses): (Vec<f64>, Vec<f64>) = candles
            .windows(2)
            .map(|w| {
                let change = w[1].close - w[0].close;
                (change.max(0.0), (-change).max(0.0))
            })
            .unzip();

        let period = self.period as f64;
        let mut avg_gain = gains[..self.period].iter().sum::<f64>() / period;
        let mut avg_loss = losses[..self.period].iter().sum::<f64>() / period;

        let mut rsi_values = Vec::with_capacity(gains.len() - self.period + 1);
        rsi_values.push(Self::value(avg_gain, avg_loss));

        for i in self.period..gains.len() {
            avg_gain = (avg_gain * (period - 1.0) + gains[i]) / period;
            avg_loss = (avg_loss * (period - 1.0) + losses[i]) / period;
            rsi_values.push(Self::value(avg_gain, avg_loss));
        }

        rsi_values
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacdValues {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub struct MACD {
    pub fast_period: usize,
    pub slow_period: usize,
    pub signal_period: usize,
}

impl MACD {
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Self {
        MACD {
            fast_period,
            slow_period,
            signal_period,
        }
    }

    /// MACD line, signal and histogram, all ending on the last candle.
    ///
    /// `line` is trimmed to the bars where the signal EMA is defined so the
    /// three series share indices.
    pub fn calculate_detailed(&self, candles: &[Candle]) -> MacdValues {
        let empty = MacdValues {
            line: vec![],
            signal: vec![],
            histogram: vec![],
        };
        if self.fast_period == 0 || self.fast_period >= self.slow_period {
            return empty;
        }
        let fast_values = EMA::new(self.fast_period).calculate(candles);
        let slow_values = EMA::new(self.slow_period).calculate(candles);
        if slow_values.is_empty() {
            return empty;
        }

        // fast starts at bar fast-1, slow at bar slow-1
        let offset = self.slow_period - self.fast_period;
        let macd_line: Vec<f64> = fast_values[offset..]
            .iter()
            .zip(slow_values.iter())
            .map(|(f, s)| f - s)
            .collect();

        let signal = EMA::new(self.signal_period).calculate_on_values(&macd_line);
        if signal.is_empty() {
            return empty;
        }
        let line = macd_line[macd_line.len() - signal.len()..].to_vec();
        let histogram = line.iter().zip(signal.iter()).map(|(l, s)| l - s).collect();

        MacdValues {
            line,
            signal,
            histogram,
        }
    }
}

impl Indicator for MACD {
    /// Signal line values
    fn calculate(&self, candles: &[Candle]) -> Vec<f64> {
        self.calculate_detailed(candles).signal
    }
}

/// Average Directional Index (Wilder).
pub struct ADX {
    pub period: usize,
}

impl ADX {
    pub fn new(period: usize) -> Self {
        ADX { period }
    }

    fn wilder_sum(values: &[f64], period: usize) -> Vec<f64> {
        if values.len() < period {
            return vec![];
        }
        let mut smoothed = Vec::with_capacity(values.len() - period + 1);
        let mut acc = values[..period].iter().sum::<f64>();
        smoothed.push(acc);
        for &v in &values[period..] {
            acc = acc - acc / period as f64 + v;
            smoothed.push(acc);
        }
        smoothed
    }
}

impl Indicator for ADX {
    fn calculate(&self, candles: &[Candle]) -> Vec<f64> {
        let period = self.period;
        if period == 0 || candles.len() < 2 * period + 1 {
            return vec![];
        }

        let mut true_ranges = Vec::with_capacity(candles.len() - 1);
        let mut plus_dm = Vec::with_capacity(candles.len() - 1);
        let mut minus_dm = Vec::with_capacity(candles.len() - 1);
        for w in candles.windows(2) {
            let (prev, cur) = (&w[0], &w[1]);
            let up_move = cur.high - prev.high;
            let down_move = prev.low - cur.low;
            plus_dm.push(if up_move > down_move && up_move > 0.0 {
                up_move
            } else {
                0.0
            });
            minus_dm.push(if down_move > up_move && down_move > 0.0 {
                down_move
            } else {
                0.0
            });
            true_ranges.push(
                (cur.high - cur.low)
                    .max((cur.high - prev.close).abs())
                    .max((cur.low - prev.close).abs()),
            );
        }

        let tr_smoothed = Self::wilder_sum(&true_ranges, period);
        let plus_smoothed = Self::wilder_sum(&plus_dm, period);
        let minus_smoothed = Self::wilder_sum(&minus_dm, period);

        let dx: Vec<f64> = tr_smoothed
            .iter()
            .zip(plus_smoothed.iter().zip(minus_smoothed.iter()))
            .map(|(tr, (plus, minus))| {
                if *tr <= f64::EPSILON {
                    return 0.0;
                }
                let plus_di = 100.0 * plus / tr;
                let minus_di = 100.0 * minus / tr;
                let sum = plus_di + minus_di;
                if sum <= f64::EPSILON {
                    0.0
                } else {
                    100.0 * (plus_di - minus_di).abs() / sum
                }
            })
            .collect();

        if dx.len() < period {
            return vec![];
        }
        let p = period as f64;
        let mut adx = dx[..period].iter().sum::<f64>() / p;
        let mut adx_values = vec![adx];
        for &value in &dx[period..] {
            adx = (adx * (p - 1.0) + value) / p;
            adx_values.push(adx);
        }
        adx_values
    }
}

/// Compute every indicator the strategies read, at the last candle.
pub fn compute_snapshot(
    symbol: &str,
    candles: &[Candle],
    params: &IndicatorParams,
) -> Result<IndicatorSnapshot, EngineError> {
    let required = params.required_history();
    let insufficient = || EngineError::InsufficientHistory {
        symbol: symbol.to_string(),
        required,
        available: candles.len(),
    };
    if candles.len() < required {
        return Err(insufficient());
    }

    let rsi = RSI::new(params.rsi_period).calculate(candles);
    let ema_fast = EMA::new(params.ema_fast).calculate(candles);
    let ema_slow = EMA::new(params.ema_slow).calculate(candles);
    let macd = MACD::new(params.ema_fast, params.ema_slow, params.macd_signal)
        .calculate_detailed(candles);
    let adx = ADX::new(params.adx_period).calculate(candles);

    let last = candles.last().ok_or_else(insufficient)?;
    let window = &candles[candles.len() - 1 - params.breakout_lookback..candles.len() - 1];
    let range_high = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let range_low = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let average_volume = window.iter().map(|c| c.volume).sum::<f64>() / window.len() as f64;

    Ok(IndicatorSnapshot {
        rsi: *rsi.last().ok_or_else(insufficient)?,
        ema_fast: *ema_fast.last().ok_or_else(insufficient)?,
        ema_slow: *ema_slow.last().ok_or_else(insufficient)?,
        macd: *macd.line.last().ok_or_else(insufficient)?,
        macd_signal: *macd.signal.last().ok_or_else(insufficient)?,
        macd_histogram: *macd.histogram.last().ok_or_else(insufficient)?,
        adx: *adx.last().ok_or_else(insufficient)?,
        last_close: last.close,
        last_volume: last.volume,
        average_volume,
        range_high,
        range_low,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(close: f64) -> Candle {
        Candle::new(close, close + 1.0, close - 1.0, close, 100.0).unwrap()
    }

    fn trending(n: usize, start: f64, step: f64) -> Vec<Candle> {
        (0..n).map(|i| candle(start + step * i as f64)).collect()
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let ema = EMA::new(3).calculate_on_values(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(ema.len(), 2);
        assert!((ema[0] - 2.0).abs() < 1e-12);
        // 2 + (4 - 2) * 0.5
        assert!((ema[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_ema_short_input_is_empty() {
        assert!(EMA::new(5).calculate_on_values(&[1.0, 2.0]).is_empty());
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        let rsi = RSI::new(14).calculate(&trending(20, 100.0, 1.0));
        assert_eq!(rsi.len(), 6);
        assert!(rsi.iter().all(|v| (*v - 100.0).abs() < 1e-9));
    }

    #[test]
    fn test_rsi_all_losses_is_0() {
        let rsi = RSI::new(14).calculate(&trending(20, 100.0, -1.0));
        assert!(rsi.iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn test_rsi_wilder_smoothing() {
        // +2, -1 alternating: first average over 2 changes is 1 gain / 0.5 loss
        let prices = [10.0, 12.0, 11.0, 13.0];
        let candles: Vec<Candle> = prices.iter().map(|p| candle(*p)).collect();
        let rsi = RSI::new(2).calculate(&candles);

        assert_eq!(rsi.len(), 2);
        assert!((rsi[0] - (100.0 - 100.0 / 3.0)).abs() < 1e-9);
        // avg_gain = (1*1 + 2)/2 = 1.5, avg_loss = (0.5*1 + 0)/2 = 0.25, rs = 6
        assert!((rsi[1] - (100.0 - 100.0 / 7.0)).abs() < 1e-9);
    }

    #[test]
    fn test_macd_aligned_on_flat_series() {
        let candles: Vec<Candle> = (0..40).map(|_| candle(50.0)).collect();
        let macd = MACD::new(12, 26, 9).calculate_detailed(&candles);

        // 40 - 26 + 1 line values, 9 - 1 consumed by the signal seed
        assert_eq!(macd.signal.len(), 40 - 26 - 9 + 2);
        assert_eq!(macd.line.len(), macd.signal.len());
        assert!(macd.histogram.iter().all(|h| h.abs() < 1e-9));
    }

    #[test]
    fn test_macd_positive_in_uptrend() {
        let macd = MACD::new(12, 26, 9).calculate_detailed(&trending(60, 100.0, 1.0));
        assert!(*macd.line.last().unwrap() > 0.0);
    }

    #[test]
    fn test_adx_strong_trend() {
        let adx = ADX::new(14).calculate(&trending(60, 100.0, 2.0));
        assert!(!adx.is_empty());
        assert!(*adx.last().unwrap() > 50.0);
    }

    #[test]
    fn test_adx_needs_two_periods() {
        assert!(ADX::new(14).calculate(&trending(28, 100.0, 1.0)).is_empty());
        // 28 changes give 15 DX values: one seed average plus one smoothed step
        assert_eq!(ADX::new(14).calculate(&trending(29, 100.0, 1.0)).len(), 2);
    }

    #[test]
    fn test_snapshot_insufficient_history() {
        let params = IndicatorParams::default();
        let result = compute_snapshot("BTCUSDT", &trending(20, 100.0, 1.0), &params);
        match result {
            Err(EngineError::InsufficientHistory {
                required,
                available,
                ..
            }) => {
                assert_eq!(required, 34);
                assert_eq!(available, 20);
            }
            other => panic!("expected InsufficientHistory, got {:?}", other),
        }
    }

    #[test]
    fn test_snapshot_range_excludes_last_bar() {
        let params = IndicatorParams::default();
        let mut candles: Vec<Candle> = (0..40).map(|_| candle(100.0)).collect();
        candles.push(Candle::new(100.0, 130.0, 99.0, 125.0, 400.0).unwrap());

        let snapshot = compute_snapshot("BTCUSDT", &candles, &params).unwrap();

        assert_eq!(snapshot.range_high, 101.0);
        assert_eq!(snapshot.range_low, 99.0);
        assert_eq!(snapshot.last_close, 125.0);
        assert_eq!(snapshot.last_volume, 400.0);
        assert_eq!(snapshot.average_volume, 100.0);
    }

    #[test]
    fn test_snapshot_is_deterministic() {
        let params = IndicatorParams::default();
        let candles = trending(50, 100.0, 0.5);
        assert_eq!(
            compute_snapshot("X", &candles, &params).unwrap(),
            compute_snapshot("X", &candles, &params).unwrap()
        );
    }
}
