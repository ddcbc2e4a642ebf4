//! PositionManager service - owns the open/closed lifecycle of one mode's
//! positions.
//!
//! Every write to a position runs under that position's async lock, and the
//! store is re-read inside the lock before anything changes. A close that
//! finds the position already closed is a no-op, so a stop-loss trigger and a
//! manual close can race without producing two trades.

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::domain::entities::position::{CloseReason, Position, PositionStatus, TradingMode};
use crate::domain::entities::trade::Trade;
use crate::domain::errors::EngineError;
use crate::domain::repositories::store::TradingStore;

#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    Closed { position: Position, trade: Trade },
    AlreadyClosed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Marked(Position),
    Closed { position: Position, trade: Trade },
    AlreadyClosed,
}

pub struct PositionManager {
    mode: TradingMode,
    store: Arc<dyn TradingStore>,
    locks: std::sync::Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl PositionManager {
    pub fn new(mode: TradingMode, store: Arc<dyn TradingStore>) -> Self {
        Self {
            mode,
            store,
            locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn mode(&self) -> TradingMode {
        self.mode
    }

    fn lock_for(&self, position_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(position_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn release(&self, position_id: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.remove(position_id);
    }

    /// Record a freshly filled position.
    pub async fn open(&self, position: Position) -> Result<Position, EngineError> {
        if position.trading_mode != self.mode {
            return Err(EngineError::InvalidSettings(format!(
                "{} position routed to the {} manager",
                position.trading_mode, self.mode
            )));
        }
        self.store.insert_position(&position).await?;
        info!(
            "Opened {} {} {} @ {} (qty {}, SL {}, TP {})",
            self.mode,
            position.direction,
            position.symbol,
            position.entry_price,
            position.quantity,
            position.stop_loss,
            position.take_profit
        );
        Ok(position)
    }

    pub async fn open_positions(&self) -> Result<Vec<Position>, EngineError> {
        Ok(self
            .store
            .list_positions(Some(self.mode), Some(PositionStatus::Open))
            .await?)
    }

    pub async fn open_count(&self) -> Result<usize, EngineError> {
        Ok(self.store.count_open_positions(self.mode).await?)
    }

    /// Current stored state of one of this mode's positions.
    async fn load(&self, position_id: &str) -> Result<Position, EngineError> {
        match self.store.get_position(position_id).await? {
            Some(position) if position.trading_mode == self.mode => Ok(position),
            _ => Err(EngineError::PositionNotFound(position_id.to_string())),
        }
    }

    async fn close_loaded(
        &self,
        mut position: Position,
        price: Decimal,
        reason: CloseReason,
    ) -> Result<CloseOutcome, EngineError> {
        let trade = match position.close(price, reason, Utc::now()) {
            Ok(trade) => trade,
            Err(_) => return Ok(CloseOutcome::AlreadyClosed),
        };
        if !self.store.close_position(&position, &trade).await? {
            debug!("Position {} was closed concurrently", position.id);
            return Ok(CloseOutcome::AlreadyClosed);
        }
        info!(
            "Closed {} {} {} @ {} ({}), PnL {}",
            self.mode, position.direction, position.symbol, price, reason, trade.pnl
        );
        Ok(CloseOutcome::Closed { position, trade })
    }

    /// Drop the lock entry once the position can no longer change.
    fn release_if_settled<T>(
        &self,
        position_id: &str,
        result: &Result<T, EngineError>,
        settled: bool,
    ) {
        if settled || matches!(result, Err(EngineError::PositionNotFound(_))) {
            self.release(position_id);
        }
    }

    /// Mark a position at `price`, closing it if a protective level is crossed.
    pub async fn refresh(
        &self,
        position_id: &str,
        price: Decimal,
    ) -> Result<RefreshOutcome, EngineError> {
        let lock = self.lock_for(position_id);
        let result = {
            let _guard = lock.lock().await;
            self.refresh_locked(position_id, price).await
        };
        let settled = matches!(
            result,
            Ok(RefreshOutcome::Closed { .. }) | Ok(RefreshOutcome::AlreadyClosed)
        );
        self.release_if_settled(position_id, &result, settled);
        result
    }

    async fn refresh_locked(
        &self,
        position_id: &str,
        price: Decimal,
    ) -> Result<RefreshOutcome, EngineError> {
        let mut position = self.load(position_id).await?;
        if !position.is_open() {
            return Ok(RefreshOutcome::AlreadyClosed);
        }

        if position.mark(price, Utc::now()).is_err() {
            return Ok(RefreshOutcome::AlreadyClosed);
        }
        if let Some(reason) = position.exit_trigger() {
            return Ok(match self.close_loaded(position, price, reason).await? {
                CloseOutcome::Closed { position, trade } => {
                    RefreshOutcome::Closed { position, trade }
                }
                CloseOutcome::AlreadyClosed => RefreshOutcome::AlreadyClosed,
            });
        }

        if self.store.update_position_mark(&position).await? {
            Ok(RefreshOutcome::Marked(position))
        } else {
            Ok(RefreshOutcome::AlreadyClosed)
        }
    }

    /// Close on request (manual or bot stop). Idempotent.
    pub async fn close(
        &self,
        position_id: &str,
        price: Decimal,
        reason: CloseReason,
    ) -> Result<CloseOutcome, EngineError> {
        let lock = self.lock_for(position_id);
        let result = {
            let _guard = lock.lock().await;
            match self.load(position_id).await {
                Ok(position) if !position.is_open() => Ok(CloseOutcome::AlreadyClosed),
                Ok(position) => self.close_loaded(position, price, reason).await,
                Err(e) => Err(e),
            }
        };
        let settled = result.is_ok();
        self.release_if_settled(position_id, &result, settled);
        result
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::position::{Direction, NewPosition};
    use crate::persistence::{init_database, repository::SqliteStore};
    use rust_decimal_macros::dec;

    async fn store() -> Arc<dyn TradingStore> {
        let pool = init_database("sqlite::memory:").await.unwrap();
        Arc::new(SqliteStore::new(pool))
    }

    fn new_position(mode: TradingMode, direction: Direction) -> Position {
        Position::open(
            NewPosition {
                symbol: "BTCUSDT".to_string(),
                direction,
                fill_price: dec!(30000),
                stop_loss: if direction.is_long_side() { dec!(29000) } else { dec!(31000) },
                take_profit: if direction.is_long_side() { dec!(32000) } else { dec!(28000) },
                quantity: dec!(0.01),
                trading_mode: mode,
                strategy: Some("trend_following".to_string()),
                is_paper_trade: true,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_refresh_marks_pnl() {
        let store = store().await;
        let manager = PositionManager::new(TradingMode::Leverage, store.clone());
        let position = manager
            .open(new_position(TradingMode::Leverage, Direction::Long))
            .await
            .unwrap();

        let outcome = manager.refresh(&position.id, dec!(30900)).await.unwrap();
        match outcome {
            RefreshOutcome::Marked(p) => assert_eq!(p.pnl, dec!(9.00)),
            other => panic!("expected Marked, got {:?}", other),
        }

        let stored = store.get_position(&position.id).await.unwrap().unwrap();
        assert_eq!(stored.current_price, dec!(30900));
        assert_eq!(stored.pnl, dec!(9.00));
    }

    #[tokio::test]
    async fn test_refresh_triggers_stop_loss_for_short() {
        let store = store().await;
        let manager = PositionManager::new(TradingMode::Leverage, store.clone());
        let position = manager
            .open(new_position(TradingMode::Leverage, Direction::Short))
            .await
            .unwrap();

        let outcome = manager.refresh(&position.id, dec!(31500)).await.unwrap();
        match outcome {
            RefreshOutcome::Closed { trade, position } => {
                assert_eq!(trade.close_reason, CloseReason::StopLoss);
                assert_eq!(trade.pnl, dec!(-15.00));
                assert_eq!(position.status, PositionStatus::Closed);
            }
            other => panic!("expected Closed, got {:?}", other),
        }
        assert_eq!(manager.open_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_double_close_creates_one_trade() {
        let store = store().await;
        let manager = PositionManager::new(TradingMode::Spot, store.clone());
        let position = manager
            .open(new_position(TradingMode::Spot, Direction::Up))
            .await
            .unwrap();

        let first = manager
            .close(&position.id, dec!(30500), CloseReason::Manual)
            .await
            .unwrap();
        let second = manager
            .close(&position.id, dec!(30600), CloseReason::Manual)
            .await
            .unwrap();

        assert!(matches!(first, CloseOutcome::Closed { .. }));
        assert_eq!(second, CloseOutcome::AlreadyClosed);
        assert_eq!(store.list_trades(Some(TradingMode::Spot)).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_closes_race_safely() {
        let store = store().await;
        let manager = Arc::new(PositionManager::new(TradingMode::Leverage, store.clone()));
        let position = manager
            .open(new_position(TradingMode::Leverage, Direction::Long))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let manager = manager.clone();
            let id = position.id.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    manager.close(&id, dec!(30100), CloseReason::Manual).await
                } else {
                    manager
                        .refresh(&id, dec!(28000))
                        .await
                        .map(|outcome| match outcome {
                            RefreshOutcome::Closed { position, trade } => {
                                CloseOutcome::Closed { position, trade }
                            }
                            _ => CloseOutcome::AlreadyClosed,
                        })
                }
            }));
        }

        let mut closed = 0;
        for handle in handles {
            if let CloseOutcome::Closed { .. } = handle.await.unwrap().unwrap() {
                closed += 1;
            }
        }

        assert_eq!(closed, 1);
        assert_eq!(store.list_trades(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_other_mode_positions_are_invisible() {
        let store = store().await;
        let spot = PositionManager::new(TradingMode::Spot, store.clone());
        let leverage = PositionManager::new(TradingMode::Leverage, store.clone());
        let position = leverage
            .open(new_position(TradingMode::Leverage, Direction::Long))
            .await
            .unwrap();

        assert_eq!(spot.open_count().await.unwrap(), 0);
        assert!(matches!(
            spot.close(&position.id, dec!(30000), CloseReason::Manual).await,
            Err(EngineError::PositionNotFound(_))
        ));
        assert!(spot
            .open(new_position(TradingMode::Leverage, Direction::Long))
            .await
            .is_err());
        assert_eq!(leverage.open_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_locks_released_for_settled_positions() {
        let store = store().await;
        let manager = PositionManager::new(TradingMode::Spot, store.clone());
        let position = manager
            .open(new_position(TradingMode::Spot, Direction::Up))
            .await
            .unwrap();

        manager.refresh(&position.id, dec!(30100)).await.unwrap();
        assert_eq!(manager.tracked_locks(), 1);

        manager
            .close(&position.id, dec!(30200), CloseReason::Manual)
            .await
            .unwrap();
        assert_eq!(manager.tracked_locks(), 0);

        // Late callers on a closed or unknown id leave nothing behind
        assert_eq!(
            manager.refresh(&position.id, dec!(30300)).await.unwrap(),
            RefreshOutcome::AlreadyClosed
        );
        assert_eq!(
            manager
                .close(&position.id, dec!(30300), CloseReason::Manual)
                .await
                .unwrap(),
            CloseOutcome::AlreadyClosed
        );
        assert!(manager.refresh("missing", dec!(1)).await.is_err());
        assert_eq!(manager.tracked_locks(), 0);
    }
}
