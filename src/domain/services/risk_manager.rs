//! Position sizing and limits.
//!
//! A candidate passes only if the mode still has room under `max_positions`.
//! The notional starts at `usdt_per_trade` and shrinks when a stop-out would
//! lose more than `risk_per_trade` percent of it.

use rust_decimal::prelude::*;

use crate::domain::entities::position::Direction;
use crate::domain::entities::settings::EffectiveSettings;
use crate::domain::errors::EngineError;

/// Quantity precision accepted by venues.
pub const QUANTITY_DECIMALS: u32 = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct SizedOrder {
    pub direction: Direction,
    pub quantity: Decimal,
    pub notional: Decimal,
    pub reference_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct RiskManager;

impl RiskManager {
    pub fn new() -> Self {
        Self
    }

    pub fn check_capacity(
        &self,
        open_positions: usize,
        settings: &EffectiveSettings,
    ) -> Result<(), EngineError> {
        if open_positions >= settings.max_positions as usize {
            return Err(EngineError::MaxPositionsReached {
                mode: settings.mode,
                open: open_positions,
                max: settings.max_positions,
            });
        }
        Ok(())
    }

    /// Notional after the risk-per-trade cap.
    pub fn notional(&self, settings: &EffectiveSettings) -> Result<Decimal, EngineError> {
        if settings.stop_loss_pct <= settings.risk_per_trade {
            return Ok(settings.usdt_per_trade);
        }
        settings
            .usdt_per_trade
            .checked_mul(settings.risk_per_trade)
            .and_then(|budget| budget.checked_div(settings.stop_loss_pct))
            .ok_or_else(|| {
                EngineError::InvalidSettings(format!(
                    "usdtPerTrade {} x riskPerTrade {} is out of range",
                    settings.usdt_per_trade, settings.risk_per_trade
                ))
            })
    }

    /// Absolute stop-loss and take-profit prices around `entry`.
    pub fn protective_levels(
        &self,
        direction: Direction,
        entry: Decimal,
        settings: &EffectiveSettings,
    ) -> Result<(Decimal, Decimal), EngineError> {
        let stop_fraction = settings.stop_loss_pct / Decimal::ONE_HUNDRED;
        let target_fraction = settings.take_profit_pct / Decimal::ONE_HUNDRED;
        let (stop_factor, target_factor) = if direction.is_long_side() {
            (
                Decimal::ONE - stop_fraction,
                Decimal::ONE.checked_add(target_fraction),
            )
        } else {
            (
                Decimal::ONE + stop_fraction,
                Some(Decimal::ONE - target_fraction),
            )
        };
        let levels = target_factor
            .and_then(|factor| entry.checked_mul(factor))
            .and_then(|take_profit| Some((entry.checked_mul(stop_factor)?, take_profit)));
        levels.ok_or_else(|| {
            EngineError::InvalidSettings(format!(
                "protective levels around {} are out of range (takeProfitPct {})",
                entry, settings.take_profit_pct
            ))
        })
    }

    /// Capacity check, then sizing at `price`.
    pub fn approve(
        &self,
        symbol: &str,
        direction: Direction,
        price: Decimal,
        open_positions: usize,
        settings: &EffectiveSettings,
    ) -> Result<SizedOrder, EngineError> {
        self.check_capacity(open_positions, settings)?;

        if price <= Decimal::ZERO {
            return Err(EngineError::QuoteUnavailable {
                symbol: symbol.to_string(),
                reason: format!("non-positive price {}", price),
            });
        }

        let notional = self.notional(settings)?;
        let quantity = notional
            .checked_div(price)
            .ok_or_else(|| {
                EngineError::InvalidSettings(format!(
                    "notional {} at {} overflows the quantity",
                    notional, price
                ))
            })?
            .round_dp_with_strategy(QUANTITY_DECIMALS, RoundingStrategy::ToZero);
        if quantity.is_zero() {
            return Err(EngineError::InvalidSettings(format!(
                "usdtPerTrade {} buys zero {} at {}",
                settings.usdt_per_trade, symbol, price
            )));
        }

        let (stop_loss, take_profit) = self.protective_levels(direction, price, settings)?;
        Ok(SizedOrder {
            direction,
            quantity,
            notional,
            reference_price: price,
            stop_loss,
            take_profit,
        })
    }
}
