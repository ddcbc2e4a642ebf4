use std::cmp::Ordering;

use crate::domain::entities::opportunity::{IndicatorSnapshot, StrategyKind, TradingOpportunity};
use crate::domain::entities::settings::{IndicatorParams, StrategyToggles};
use crate::domain::services::strategies::{strategy_for, Strategy};

/// Result of evaluating one symbol.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub best: Option<TradingOpportunity>,
    /// Every opportunity produced by an enabled strategy, before filtering.
    pub candidates: Vec<TradingOpportunity>,
}

impl Aggregation {
    pub fn highest_confidence(&self) -> Option<f64> {
        self.candidates
            .iter()
            .map(|c| c.confidence)
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
    }
}

pub struct SignalAggregator {
    strategies: Vec<Box<dyn Strategy + Send + Sync>>,
}

impl Default for SignalAggregator {
    fn default() -> Self {
        SignalAggregator::new(StrategyKind::ALL.into_iter().map(strategy_for).collect())
    }
}

impl SignalAggregator {
    pub fn new(strategies: Vec<Box<dyn Strategy + Send + Sync>>) -> Self {
        SignalAggregator { strategies }
    }

    /// Run the enabled strategies and keep the best survivor of `min_confidence`.
    ///
    /// Disabled strategies are never invoked.
    pub fn aggregate(
        &self,
        symbol: &str,
        snapshot: &IndicatorSnapshot,
        params: &IndicatorParams,
        toggles: &StrategyToggles,
        min_confidence: f64,
    ) -> Aggregation {
        let candidates: Vec<TradingOpportunity> = self
            .strategies
            .iter()
            .filter(|s| toggles.is_enabled(s.kind()))
            .filter_map(|s| s.evaluate(symbol, snapshot, params))
            .collect();

        let best = select_best(&candidates, min_confidence);
        Aggregation { best, candidates }
    }
}

/// Highest confidence at or above `min_confidence`; ties go to the strategy
/// with the higher priority.
pub fn select_best(
    candidates: &[TradingOpportunity],
    min_confidence: f64,
) -> Option<TradingOpportunity> {
    candidates
        .iter()
        .filter(|c| c.confidence >= min_confidence)
        .max_by(|a, b| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.strategy.priority().cmp(&b.strategy.priority()))
        })
        .cloned()
}
