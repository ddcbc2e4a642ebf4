//! Trading engine end-to-end tests
//!
//! Drive the public `TradingEngine` against an in-memory SQLite store, a
//! scripted market and a fake order venue.
//!
//! Test Categories:
//! 1. Controller lifecycle - idempotent start/stop, mode isolation
//! 2. Risk limits - max positions
//! 3. Position lifecycle - manual close, stop-loss, close on stop
//! 4. Live execution - fills and rejections through the venue seam
//! 5. Log bus - subscription

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use dualbot::application::actors::bot_controller::BotConfig;
use dualbot::application::log_bus::BusEvent;
use dualbot::application::services::TradingEngine;
use dualbot::domain::entities::bot_log::ErrorLevel;
use dualbot::domain::entities::market::{Candle, Quote};
use dualbot::domain::entities::position::{
    CloseReason, Direction, NewPosition, Position, PositionStatus, TradingMode,
};
use dualbot::domain::entities::settings::{StrategyToggles, TradingSettings};
use dualbot::domain::errors::EngineError;
use dualbot::domain::repositories::market_data::{MarketDataError, MarketDataProvider};
use dualbot::domain::repositories::order_venue::{OrderAck, OrderRequest, OrderVenue, VenueError};
use dualbot::domain::repositories::store::TradingStore;
use dualbot::domain::services::position_manager::CloseOutcome;
use dualbot::persistence::{init_database, repository::SqliteStore};

const USER: &str = "e2e";

/// Linear candle history plus a quote price the test can move.
struct ScriptedMarket {
    step: f64,
    price: Mutex<Decimal>,
}

impl ScriptedMarket {
    fn new(step: f64) -> Arc<Self> {
        Arc::new(Self {
            step,
            price: Mutex::new(dec!(100)),
        })
    }

    fn set_price(&self, price: Decimal) {
        *self.price.lock().unwrap() = price;
    }
}

#[async_trait]
impl MarketDataProvider for ScriptedMarket {
    async fn latest_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        Ok(Quote {
            symbol: symbol.to_string(),
            price: *self.price.lock().unwrap(),
            volume: dec!(1000),
            timestamp: Utc::now(),
        })
    }

    async fn price_history(
        &self,
        _symbol: &str,
        _timeframe: &str,
        window: usize,
    ) -> Result<Vec<Candle>, MarketDataError> {
        Ok((0..window)
            .map(|i| {
                let close = 100.0 + self.step * i as f64;
                Candle::new(close, close + 0.5, close - 0.5, close, 100.0).unwrap()
            })
            .collect())
    }
}

struct FakeVenue {
    response: Result<OrderAck, VenueError>,
    submitted: Mutex<Vec<OrderRequest>>,
}

impl FakeVenue {
    fn filling_at(price: Decimal) -> Arc<Self> {
        Arc::new(Self {
            response: Ok(OrderAck {
                order_id: "venue-1".to_string(),
                fill_price: Some(price),
                filled_quantity: None,
            }),
            submitted: Mutex::new(Vec::new()),
        })
    }

    fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            response: Err(VenueError::Rejected("insufficient margin".to_string())),
            submitted: Mutex::new(Vec::new()),
        })
    }

    fn submissions(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }
}

#[async_trait]
impl OrderVenue for FakeVenue {
    fn name(&self) -> &str {
        "fake"
    }

    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck, VenueError> {
        self.submitted.lock().unwrap().push(order.clone());
        self.response.clone()
    }
}

fn trend_only() -> StrategyToggles {
    StrategyToggles {
        trend_following: true,
        mean_reversion: false,
        breakout: false,
        pullback: false,
    }
}

fn base_settings() -> TradingSettings {
    let mut settings = TradingSettings {
        user_id: USER.to_string(),
        ..TradingSettings::default()
    };
    settings.spot.strategies = trend_only();
    settings.leverage.strategies = trend_only();
    settings
}

fn bot(mode: TradingMode, tick: Duration) -> BotConfig {
    BotConfig {
        mode,
        user_id: USER.to_string(),
        symbols: vec!["BTCUSDT".to_string()],
        tick_interval: tick,
        history_window: 60,
    }
}

struct Harness {
    engine: TradingEngine,
    store: Arc<dyn TradingStore>,
}

async fn harness(
    settings: TradingSettings,
    market: Arc<ScriptedMarket>,
    venue: Option<Arc<dyn OrderVenue>>,
    tick: Duration,
) -> Harness {
    let pool = init_database("sqlite::memory:").await.unwrap();
    let store: Arc<dyn TradingStore> = Arc::new(SqliteStore::new(pool));
    store.save_settings(&settings).await.unwrap();

    let engine = TradingEngine::new(
        store.clone(),
        market,
        venue,
        bot(TradingMode::Spot, tick),
        bot(TradingMode::Leverage, tick),
    )
    .unwrap();
    Harness { engine, store }
}

/// Poll `check` for up to five seconds.
async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

async fn open_positions(engine: &TradingEngine, mode: TradingMode) -> Vec<Position> {
    engine
        .list_positions(Some(mode), Some(PositionStatus::Open))
        .await
        .unwrap()
}

const ONE_HOUR: Duration = Duration::from_secs(3600);

// ============================================================================
// 1. Controller lifecycle
// ============================================================================

#[tokio::test]
async fn test_start_twice_keeps_started_at() {
    let h = harness(base_settings(), ScriptedMarket::new(1.0), None, ONE_HOUR).await;

    let first = h.engine.start(TradingMode::Spot).await.unwrap();
    let second = h.engine.start(TradingMode::Spot).await.unwrap();

    assert!(first.is_running);
    assert!(second.is_running);
    assert_eq!(first.started_at, second.started_at);
    assert!(second.message.contains("already running"));

    h.engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stop_on_stopped_controller_is_noop() {
    let h = harness(base_settings(), ScriptedMarket::new(1.0), None, ONE_HOUR).await;

    let status = h.engine.stop(TradingMode::Leverage).await.unwrap();
    assert!(!status.is_running);
    assert!(status.started_at.is_none());

    h.engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stop_preserves_last_activity() {
    let h = harness(base_settings(), ScriptedMarket::new(1.0), None, ONE_HOUR).await;
    h.engine.start(TradingMode::Spot).await.unwrap();

    let engine = &h.engine;
    assert!(
        eventually(|| async move {
            engine
                .status(TradingMode::Spot)
                .await
                .unwrap()
                .last_activity
                .is_some()
        })
        .await
    );

    let running = h.engine.status(TradingMode::Spot).await.unwrap();
    let stopped = h.engine.stop(TradingMode::Spot).await.unwrap();
    assert!(!stopped.is_running);
    assert_eq!(stopped.last_activity, running.last_activity);

    h.engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_modes_are_isolated() {
    let h = harness(base_settings(), ScriptedMarket::new(1.0), None, ONE_HOUR).await;
    let spot_before = h.engine.status(TradingMode::Spot).await.unwrap();

    h.engine.start(TradingMode::Leverage).await.unwrap();
    let engine = &h.engine;
    assert!(
        eventually(|| async move { open_positions(engine, TradingMode::Leverage).await.len() == 1 })
            .await
    );

    let spot_after = h.engine.status(TradingMode::Spot).await.unwrap();
    assert!(!spot_after.is_running);
    assert_eq!(spot_before.started_at, spot_after.started_at);
    assert!(open_positions(&h.engine, TradingMode::Spot).await.is_empty());

    let leverage = open_positions(&h.engine, TradingMode::Leverage).await;
    assert_eq!(leverage[0].direction, Direction::Long);
    assert!(leverage[0].is_paper_trade);

    h.engine.shutdown().await.unwrap();
}

// ============================================================================
// 2. Risk limits
// ============================================================================

#[tokio::test]
async fn test_max_positions_blocks_new_entry_with_info_log() {
    let mut settings = base_settings();
    settings.max_positions = 1;
    let h = harness(settings, ScriptedMarket::new(1.0), None, ONE_HOUR).await;

    let existing = Position::open(
        NewPosition {
            symbol: "ETHUSDT".to_string(),
            direction: Direction::Up,
            fill_price: dec!(100),
            stop_loss: dec!(90),
            take_profit: dec!(120),
            quantity: dec!(1),
            trading_mode: TradingMode::Spot,
            strategy: None,
            is_paper_trade: true,
        },
        Utc::now(),
    )
    .unwrap();
    h.store.insert_position(&existing).await.unwrap();

    h.engine.start(TradingMode::Spot).await.unwrap();
    let engine = &h.engine;
    assert!(
        eventually(|| async move {
            engine
                .recent_logs()
                .iter()
                .any(|l| l.level == "INFO" && l.message.contains("Max positions"))
        })
        .await
    );

    let open = open_positions(&h.engine, TradingMode::Spot).await;
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, existing.id);

    h.engine.shutdown().await.unwrap();
}

// ============================================================================
// 3. Position lifecycle
// ============================================================================

#[tokio::test]
async fn test_manual_close_is_idempotent() {
    let market = ScriptedMarket::new(1.0);
    let h = harness(base_settings(), market.clone(), None, ONE_HOUR).await;

    h.engine.start(TradingMode::Spot).await.unwrap();
    let engine = &h.engine;
    assert!(
        eventually(|| async move { open_positions(engine, TradingMode::Spot).await.len() == 1 }).await
    );
    h.engine.stop(TradingMode::Spot).await.unwrap();

    let position = open_positions(&h.engine, TradingMode::Spot).await.remove(0);
    market.set_price(dec!(101));

    // Wrong mode cannot see it
    assert!(matches!(
        h.engine.close_position(TradingMode::Leverage, &position.id).await,
        Err(EngineError::PositionNotFound(_))
    ));

    let first = h
        .engine
        .close_position(TradingMode::Spot, &position.id)
        .await
        .unwrap();
    let second = h
        .engine
        .close_position(TradingMode::Spot, &position.id)
        .await
        .unwrap();

    match first {
        CloseOutcome::Closed { trade, .. } => {
            assert_eq!(trade.close_reason, CloseReason::Manual);
            assert_eq!(trade.exit_price, dec!(101));
            assert_eq!(trade.pnl, (dec!(101) - position.entry_price) * position.quantity);
        }
        other => panic!("expected Closed, got {:?}", other),
    }
    assert_eq!(second, CloseOutcome::AlreadyClosed);
    assert_eq!(h.engine.list_trades(Some(TradingMode::Spot)).await.unwrap().len(), 1);

    h.engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stop_loss_closes_on_later_tick() {
    let market = ScriptedMarket::new(1.0);
    let h = harness(
        base_settings(),
        market.clone(),
        None,
        Duration::from_millis(100),
    )
    .await;

    h.engine.start(TradingMode::Leverage).await.unwrap();
    let engine = &h.engine;
    assert!(
        eventually(|| async move { open_positions(engine, TradingMode::Leverage).await.len() == 1 })
            .await
    );

    // Default stop is 2% below a 100 entry
    market.set_price(dec!(95));
    assert!(
        eventually(|| async move {
            engine
                .list_trades(Some(TradingMode::Leverage))
                .await
                .unwrap()
                .iter()
                .any(|t| t.close_reason == CloseReason::StopLoss)
        })
        .await
    );

    h.engine.stop(TradingMode::Leverage).await.unwrap();
    let trades = h.engine.list_trades(Some(TradingMode::Leverage)).await.unwrap();
    let stopped = trades
        .iter()
        .find(|t| t.close_reason == CloseReason::StopLoss)
        .unwrap();
    assert!(stopped.pnl < Decimal::ZERO);

    h.engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_close_on_stop_closes_open_positions() {
    let mut settings = base_settings();
    settings.leverage.close_on_stop = true;
    let h = harness(settings, ScriptedMarket::new(-1.0), None, ONE_HOUR).await;

    h.engine.start(TradingMode::Leverage).await.unwrap();
    let engine = &h.engine;
    assert!(
        eventually(|| async move { open_positions(engine, TradingMode::Leverage).await.len() == 1 })
            .await
    );

    h.engine.stop(TradingMode::Leverage).await.unwrap();

    assert!(open_positions(&h.engine, TradingMode::Leverage).await.is_empty());
    let trades = h.engine.list_trades(Some(TradingMode::Leverage)).await.unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].close_reason, CloseReason::BotStop);
    assert_eq!(trades[0].direction, Direction::Short);

    h.engine.shutdown().await.unwrap();
}

// ============================================================================
// 4. Live execution
// ============================================================================

#[tokio::test]
async fn test_live_fill_uses_venue_price() {
    let mut settings = base_settings();
    settings.leverage.paper_trading = false;
    let venue = FakeVenue::filling_at(dec!(101));
    let h = harness(
        settings,
        ScriptedMarket::new(1.0),
        Some(venue.clone() as Arc<dyn OrderVenue>),
        ONE_HOUR,
    )
    .await;

    h.engine.start(TradingMode::Leverage).await.unwrap();
    let engine = &h.engine;
    assert!(
        eventually(|| async move { open_positions(engine, TradingMode::Leverage).await.len() == 1 })
            .await
    );

    let position = open_positions(&h.engine, TradingMode::Leverage).await.remove(0);
    assert_eq!(position.entry_price, dec!(101));
    assert_eq!(position.stop_loss, dec!(98.98));
    assert!(!position.is_paper_trade);
    assert_eq!(venue.submissions(), 1);
    assert!(h.engine.recent_logs().iter().any(|l| l.level == "ORDER"));

    h.engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_rejected_order_records_warning() {
    let mut settings = base_settings();
    settings.spot.paper_trading = false;
    let venue = FakeVenue::rejecting();
    let h = harness(
        settings,
        ScriptedMarket::new(1.0),
        Some(venue.clone() as Arc<dyn OrderVenue>),
        ONE_HOUR,
    )
    .await;

    h.engine.start(TradingMode::Spot).await.unwrap();
    let engine = &h.engine;
    assert!(
        eventually(|| async move { !engine.list_errors(Some(false)).await.unwrap().is_empty() })
            .await
    );

    let errors = h.engine.list_errors(Some(false)).await.unwrap();
    assert_eq!(errors[0].level, ErrorLevel::Warning);
    assert_eq!(errors[0].error_code.as_deref(), Some("ORDER_SUBMISSION_FAILED"));
    assert!(open_positions(&h.engine, TradingMode::Spot).await.is_empty());
    assert_eq!(venue.submissions(), 1);

    let id = errors[0].id.unwrap();
    assert!(h.engine.resolve_error(id).await.unwrap());
    assert!(h.engine.list_errors(Some(false)).await.unwrap().is_empty());

    h.engine.shutdown().await.unwrap();
}

// ============================================================================
// 5. Log bus
// ============================================================================

#[tokio::test]
async fn test_subscriber_sees_trade_log() {
    let h = harness(base_settings(), ScriptedMarket::new(1.0), None, ONE_HOUR).await;
    let mut rx = h.engine.subscribe();

    h.engine.start(TradingMode::Spot).await.unwrap();

    let found = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(BusEvent::Log(log)) if log.level == "TRADE" => return log,
                Ok(_) => continue,
                Err(e) => panic!("subscription failed: {}", e),
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(found.symbol.as_deref(), Some("BTCUSDT"));

    h.engine.shutdown().await.unwrap();
    assert!(!h.engine.list_logs(500).await.unwrap().is_empty());
    assert!(h.engine.clear_logs().await.unwrap() > 0);
    assert!(h.engine.recent_logs().is_empty());
}
