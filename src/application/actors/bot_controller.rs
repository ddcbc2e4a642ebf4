//! Bot Controller Actor
//!
//! One controller per trading mode. The actor owns the Stopped/Running state
//! and serializes start/stop/status requests; while running, a spawned task
//! drives the tick loop:
//! - refresh this mode's open positions (closing on stop-loss/take-profit)
//! - evaluate each configured symbol: indicators, strategies, risk, execution
//! - log one outcome per symbol on the bus
//!
//! Stop is cooperative: the loop checks the watch signal between ticks and at
//! the top of each symbol, so an in-flight tick finishes its closes but opens
//! nothing once stop is observed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::application::log_bus::LogBus;
use crate::domain::entities::bot_log::{tags, BotLog, ErrorLevel, SystemError};
use crate::domain::entities::market::Quote;
use crate::domain::entities::position::{CloseReason, Position, TradingMode};
use crate::domain::entities::settings::{EffectiveSettings, TradingSettings};
use crate::domain::entities::trade::Trade;
use crate::domain::errors::EngineError;
use crate::domain::repositories::market_data::MarketDataProvider;
use crate::domain::repositories::order_venue::OrderVenue;
use crate::domain::repositories::store::TradingStore;
use crate::domain::services::execution::{
    ExecutionAdapter, LiveExecution, PaperExecution, VenueOrderRef,
};
use crate::domain::services::indicators::compute_snapshot;
use crate::domain::services::position_manager::{CloseOutcome, PositionManager, RefreshOutcome};
use crate::domain::services::risk_manager::RiskManager;
use crate::domain::services::signal_aggregator::SignalAggregator;

/// Status reported by start, stop and status requests
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotStatus {
    pub mode: TradingMode,
    pub is_running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
    pub message: String,
}

/// Static wiring for one controller
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub mode: TradingMode,
    pub user_id: String,
    pub symbols: Vec<String>,
    pub tick_interval: Duration,
    /// Bars requested per symbol; raised to the indicator minimum when short.
    pub history_window: usize,
}

/// Collaborators shared by both controllers
#[derive(Clone)]
pub struct BotDependencies {
    pub store: Arc<dyn TradingStore>,
    pub market_data: Arc<dyn MarketDataProvider>,
    pub venue: Option<Arc<dyn OrderVenue>>,
    pub log_bus: Arc<LogBus>,
}

/// Messages that can be sent to the controller actor
#[derive(Debug)]
pub enum BotMessage {
    Start { reply: mpsc::Sender<BotStatus> },
    Stop { reply: mpsc::Sender<BotStatus> },
    GetStatus { reply: mpsc::Sender<BotStatus> },
    /// Stop if running, then exit the actor
    Shutdown { reply: mpsc::Sender<BotStatus> },
}

/// Tick logic for one mode. Shared between the actor, its loop task and
/// manual close requests.
pub struct BotWorker {
    mode: TradingMode,
    user_id: String,
    symbols: Vec<String>,
    history_window: usize,
    store: Arc<dyn TradingStore>,
    market_data: Arc<dyn MarketDataProvider>,
    log_bus: Arc<LogBus>,
    positions: PositionManager,
    aggregator: SignalAggregator,
    risk: RiskManager,
    paper: PaperExecution,
    live: Option<LiveExecution>,
    last_activity: Mutex<Option<DateTime<Utc>>>,
}

fn stop_requested(stop_rx: &watch::Receiver<bool>) -> bool {
    *stop_rx.borrow()
}

fn abort_reason(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}

impl BotWorker {
    pub fn new(config: &BotConfig, deps: &BotDependencies) -> Self {
        Self {
            mode: config.mode,
            user_id: config.user_id.clone(),
            symbols: config.symbols.clone(),
            history_window: config.history_window,
            store: deps.store.clone(),
            market_data: deps.market_data.clone(),
            log_bus: deps.log_bus.clone(),
            positions: PositionManager::new(config.mode, deps.store.clone()),
            aggregator: SignalAggregator::default(),
            risk: RiskManager::new(),
            paper: PaperExecution,
            live: deps.venue.clone().map(LiveExecution::new),
            last_activity: Mutex::new(None),
        }
    }

    pub fn mode(&self) -> TradingMode {
        self.mode
    }

    fn source(&self) -> &'static str {
        match self.mode {
            TradingMode::Spot => "spot-bot",
            TradingMode::Leverage => "leverage-bot",
        }
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        *self.last_activity.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn touch(&self) {
        *self.last_activity.lock().unwrap_or_else(|e| e.into_inner()) = Some(Utc::now());
    }

    async fn log(&self, entry: BotLog) {
        self.log_bus.log(entry).await;
    }

    /// Settings for this mode, read fresh from the store.
    pub async fn load_settings(&self) -> Result<EffectiveSettings, EngineError> {
        let settings = match self.store.get_settings(&self.user_id).await? {
            Some(settings) => settings,
            None => {
                debug!("No stored settings for {}, using defaults", self.user_id);
                TradingSettings {
                    user_id: self.user_id.clone(),
                    ..TradingSettings::default()
                }
            }
        };
        settings.validate()?;

        let effective = settings.for_mode(self.mode);
        if !effective.is_paper() && self.live.is_none() {
            return Err(EngineError::InvalidSettings(format!(
                "{} live trading is enabled but no execution venue is configured",
                self.mode
            )));
        }
        Ok(effective)
    }

    async fn quote(&self, symbol: &str) -> Result<Quote, EngineError> {
        self.market_data
            .latest_quote(symbol)
            .await
            .map_err(|e| EngineError::QuoteUnavailable {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            })
    }

    /// Route an error to the bus at the level its kind calls for.
    async fn report(&self, symbol: Option<&str>, err: &EngineError) {
        let entry = match err {
            EngineError::InsufficientHistory {
                required,
                available,
                ..
            } => BotLog::new(
                tags::SCAN,
                format!("Waiting for history: {}/{} bars", available, required),
            ),
            EngineError::MaxPositionsReached { open, max, .. } => BotLog::new(
                tags::INFO,
                format!("Max positions reached ({}/{}), opportunity skipped", open, max),
            ),
            _ => {
                self.log_bus.engine_error(err, self.source()).await;
                let level = match err.severity() {
                    ErrorLevel::Error => tags::ERROR,
                    ErrorLevel::Warning => tags::WARNING,
                    ErrorLevel::Info => tags::INFO,
                };
                BotLog::new(level, err.to_string())
            }
        };
        let entry = match symbol {
            Some(symbol) => entry.with_symbol(symbol),
            None => entry,
        };
        self.log(entry.with_data(json!({ "mode": self.mode, "code": err.code() })))
            .await;
    }

    async fn log_close(&self, position: &Position, trade: &Trade) {
        self.log(
            BotLog::new(
                tags::TRADE,
                format!(
                    "Closed {} {} @ {} ({}), PnL {}",
                    position.direction,
                    position.symbol,
                    trade.exit_price,
                    trade.close_reason,
                    trade.pnl
                ),
            )
            .with_symbol(position.symbol.clone())
            .with_data(json!({
                "mode": self.mode,
                "positionId": position.id,
                "tradeId": trade.id,
                "pnl": trade.pnl.to_string(),
                "durationSeconds": trade.duration_seconds,
            })),
        )
        .await;
    }

    async fn log_already_closed(&self, position_id: &str) {
        self.log(
            BotLog::new(tags::INFO, format!("Position {} already closed", position_id))
                .with_data(json!({ "mode": self.mode, "positionId": position_id })),
        )
        .await;
    }

    /// A venue fill exists but could not be recorded; keep enough to reconcile it.
    async fn log_untracked_fill(
        &self,
        position: &Position,
        venue_order: &VenueOrderRef,
        err: &EngineError,
    ) {
        self.log_bus
            .error(
                SystemError::new(
                    ErrorLevel::Error,
                    "Untracked venue fill",
                    format!(
                        "{} {} {} filled (client id {}, venue id {}) but not recorded: {}",
                        self.mode,
                        position.quantity,
                        position.symbol,
                        venue_order.client_order_id,
                        venue_order.venue_order_id,
                        err
                    ),
                    self.source(),
                )
                .with_code("UNTRACKED_FILL"),
            )
            .await;
        self.log(
            BotLog::new(
                tags::ORDER,
                format!(
                    "Untracked fill: {} {} {} @ {} needs reconciliation",
                    position.direction, position.quantity, position.symbol, position.entry_price
                ),
            )
            .with_symbol(position.symbol.clone())
            .with_data(json!({
                "mode": self.mode,
                "clientOrderId": venue_order.client_order_id,
                "venueOrderId": venue_order.venue_order_id,
                "positionId": position.id,
                "error": err.to_string(),
            })),
        )
        .await;
    }

    /// Mark every open position of this mode, closing those past a level.
    async fn refresh_positions(&self) -> Result<(), EngineError> {
        let open = self.positions.open_positions().await?;
        let mut quotes: HashMap<String, Option<Decimal>> = HashMap::new();

        for position in open {
            let price = match quotes.get(&position.symbol) {
                Some(price) => *price,
                None => {
                    let price = match self.quote(&position.symbol).await {
                        Ok(quote) => Some(quote.price),
                        Err(e) => {
                            self.report(Some(&position.symbol), &e).await;
                            None
                        }
                    };
                    quotes.insert(position.symbol.clone(), price);
                    price
                }
            };
            let Some(price) = price else { continue };

            match self.positions.refresh(&position.id, price).await {
                Ok(RefreshOutcome::Marked(marked)) => {
                    debug!("{} {} marked at {}, PnL {}", self.mode, marked.symbol, price, marked.pnl);
                }
                Ok(RefreshOutcome::Closed { position, trade }) => {
                    self.log_close(&position, &trade).await;
                }
                Ok(RefreshOutcome::AlreadyClosed) => self.log_already_closed(&position.id).await,
                Err(EngineError::PositionNotFound(id)) => {
                    debug!("Position {} vanished during refresh", id);
                }
                Err(e) => self.report(Some(&position.symbol), &e).await,
            }
        }
        Ok(())
    }

    /// Evaluate one symbol and open at most one position for it.
    async fn evaluate_symbol(
        &self,
        symbol: &str,
        settings: &EffectiveSettings,
        stop_rx: &watch::Receiver<bool>,
    ) -> Result<(), EngineError> {
        let window = self
            .history_window
            .max(settings.indicators.required_history());
        let history = self
            .market_data
            .price_history(symbol, &settings.timeframe, window)
            .await
            .map_err(|e| EngineError::QuoteUnavailable {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            })?;
        let snapshot = compute_snapshot(symbol, &history, &settings.indicators)?;

        let aggregation = self.aggregator.aggregate(
            symbol,
            &snapshot,
            &settings.indicators,
            settings.toggles(),
            settings.min_confidence,
        );
        let Some(best) = aggregation.best else {
            let message = match aggregation.highest_confidence() {
                Some(top) => format!(
                    "No opportunity: best confidence {:.1} below {:.1}",
                    top, settings.min_confidence
                ),
                None => "No opportunity".to_string(),
            };
            self.log(
                BotLog::new(tags::SCAN, message)
                    .with_symbol(symbol)
                    .with_data(json!({ "mode": self.mode, "rsi": snapshot.rsi, "adx": snapshot.adx })),
            )
            .await;
            return Ok(());
        };

        self.log(
            BotLog::new(
                tags::SIGNAL,
                format!(
                    "{} {:?} ({:.1}): {}",
                    best.strategy, best.bias, best.confidence, best.description
                ),
            )
            .with_symbol(symbol)
            .with_data(json!({
                "mode": self.mode,
                "strategy": best.strategy,
                "bias": best.bias,
                "confidence": best.confidence,
                "aiTradingEnabled": settings.mode_settings.ai_trading_enabled,
                "indicators": best.indicators,
            })),
        )
        .await;

        let Some(direction) = best.bias.direction_for(self.mode) else {
            self.log(
                BotLog::new(tags::SCAN, "Bearish signal ignored: spot cannot short")
                    .with_symbol(symbol)
                    .with_data(json!({ "mode": self.mode })),
            )
            .await;
            return Ok(());
        };

        let open = self.positions.open_positions().await?;
        if open.iter().any(|p| p.symbol == symbol) {
            self.log(
                BotLog::new(tags::SCAN, "Position already open, skipping")
                    .with_symbol(symbol)
                    .with_data(json!({ "mode": self.mode })),
            )
            .await;
            return Ok(());
        }

        let quote = self.quote(symbol).await?;
        let order = self
            .risk
            .approve(symbol, direction, quote.price, open.len(), settings)?;

        if stop_requested(stop_rx) {
            debug!("{} stop observed before executing {}", self.mode, symbol);
            return Ok(());
        }

        let executor: &dyn ExecutionAdapter = if settings.is_paper() {
            &self.paper
        } else {
            match &self.live {
                Some(live) => live,
                None => {
                    return Err(EngineError::InvalidSettings(
                        "live execution requested without a venue".to_string(),
                    ))
                }
            }
        };

        let fill = executor.execute(&best, &order, settings).await?;
        let position = fill.position;
        if let Some(venue_order) = &fill.order {
            self.log(
                BotLog::new(
                    tags::ORDER,
                    format!(
                        "Filled {} {} @ {}",
                        position.quantity, symbol, position.entry_price
                    ),
                )
                .with_symbol(symbol)
                .with_data(json!({
                    "mode": self.mode,
                    "positionId": position.id,
                    "clientOrderId": venue_order.client_order_id,
                    "venueOrderId": venue_order.venue_order_id,
                })),
            )
            .await;
        }

        let position = match self.positions.open(position.clone()).await {
            Ok(position) => position,
            Err(e) => {
                if let Some(venue_order) = &fill.order {
                    self.log_untracked_fill(&position, venue_order, &e).await;
                }
                return Err(e);
            }
        };
        self.log(
            BotLog::new(
                tags::TRADE,
                format!(
                    "Opened {} {} @ {} qty {} (SL {}, TP {}){}",
                    position.direction,
                    symbol,
                    position.entry_price,
                    position.quantity,
                    position.stop_loss,
                    position.take_profit,
                    if position.is_paper_trade { " [paper]" } else { "" }
                ),
            )
            .with_symbol(symbol)
            .with_data(json!({
                "mode": self.mode,
                "positionId": position.id,
                "strategy": position.strategy,
                "notional": order.notional.to_string(),
            })),
        )
        .await;
        Ok(())
    }

    /// One pass over this mode's positions and symbol universe.
    pub async fn tick(&self, stop_rx: &watch::Receiver<bool>) {
        let settings = match self.load_settings().await {
            Ok(settings) => settings,
            Err(e) => {
                self.report(None, &e).await;
                return;
            }
        };

        if let Err(e) = self.refresh_positions().await {
            self.report(None, &e).await;
        }

        for symbol in &self.symbols {
            if stop_requested(stop_rx) {
                info!("{} stop requested, ending tick early", self.mode);
                break;
            }
            match self.evaluate_symbol(symbol, &settings, stop_rx).await {
                Ok(()) => {}
                Err(e @ EngineError::InvalidSettings(_)) => {
                    self.report(Some(symbol), &e).await;
                    break;
                }
                Err(e) => self.report(Some(symbol), &e).await,
            }
        }

        self.touch();
    }

    /// Tick on a fixed interval until the stop signal flips.
    async fn run(self: Arc<Self>, mut stop_rx: watch::Receiver<bool>, period: Duration) {
        let mut ticker = interval(period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("{} tick loop started ({:?})", self.mode, period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = stop_rx.changed() => {
                    if changed.is_err() || stop_requested(&stop_rx) {
                        break;
                    }
                    continue;
                }
            }
            if stop_requested(&stop_rx) {
                break;
            }

            // A panicking tick is reported and the loop keeps its schedule
            let worker = self.clone();
            let tick_rx = stop_rx.clone();
            let tick = tokio::spawn(async move { worker.tick(&tick_rx).await });
            if let Err(e) = tick.await {
                let err = EngineError::TickAborted {
                    mode: self.mode,
                    reason: abort_reason(e),
                };
                error!("{}", err);
                self.report(None, &err).await;
            }
        }

        info!("{} tick loop exited", self.mode);
    }

    /// Close one of this mode's positions at the latest quote. Idempotent.
    pub async fn close_manually(&self, position_id: &str) -> Result<CloseOutcome, EngineError> {
        let position = match self.store.get_position(position_id).await? {
            Some(position) if position.trading_mode == self.mode => position,
            _ => return Err(EngineError::PositionNotFound(position_id.to_string())),
        };
        if !position.is_open() {
            self.log_already_closed(position_id).await;
            return Ok(CloseOutcome::AlreadyClosed);
        }

        let quote = self.quote(&position.symbol).await?;
        let outcome = self
            .positions
            .close(position_id, quote.price, CloseReason::Manual)
            .await?;
        match &outcome {
            CloseOutcome::Closed { position, trade } => self.log_close(position, trade).await,
            CloseOutcome::AlreadyClosed => self.log_already_closed(position_id).await,
        }
        Ok(outcome)
    }

    /// Close every open position of this mode with `reason`.
    async fn close_all(&self, reason: CloseReason) -> Result<usize, EngineError> {
        let mut closed = 0;
        for position in self.positions.open_positions().await? {
            let quote = match self.quote(&position.symbol).await {
                Ok(quote) => quote,
                Err(e) => {
                    self.report(Some(&position.symbol), &e).await;
                    continue;
                }
            };
            match self.positions.close(&position.id, quote.price, reason).await? {
                CloseOutcome::Closed { position, trade } => {
                    self.log_close(&position, &trade).await;
                    closed += 1;
                }
                CloseOutcome::AlreadyClosed => self.log_already_closed(&position.id).await,
            }
        }
        Ok(closed)
    }

    /// Apply `closeOnStop` after the loop has exited.
    async fn close_on_stop(&self) {
        let settings = match self.load_settings().await {
            Ok(settings) => settings,
            Err(e) => {
                warn!("{} could not read settings on stop: {}", self.mode, e);
                return;
            }
        };
        if !settings.mode_settings.close_on_stop {
            return;
        }
        match self.close_all(CloseReason::BotStop).await {
            Ok(count) => info!("{} closed {} position(s) on stop", self.mode, count),
            Err(e) => self.report(None, &e).await,
        }
    }
}

struct RunningLoop {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Bot Controller Actor - owns the Stopped/Running state of one mode
pub struct BotController {
    worker: Arc<BotWorker>,
    tick_interval: Duration,
    started_at: Option<DateTime<Utc>>,
    running: Option<RunningLoop>,
}

impl BotController {
    /// Spawn the controller actor and return a handle to it
    pub fn spawn(config: BotConfig, deps: BotDependencies) -> BotControllerHandle {
        let (tx, rx) = mpsc::channel(100);
        let worker = Arc::new(BotWorker::new(&config, &deps));

        let actor = Self {
            worker: worker.clone(),
            tick_interval: config.tick_interval,
            started_at: None,
            running: None,
        };

        tokio::spawn(async move {
            actor.run(rx).await;
        });

        info!("BotController spawned for {} mode", config.mode);
        BotControllerHandle {
            mode: config.mode,
            tx,
            worker,
        }
    }

    fn loop_alive(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    fn status(&self, message: impl Into<String>) -> BotStatus {
        BotStatus {
            mode: self.worker.mode(),
            is_running: self.loop_alive(),
            started_at: self.started_at,
            last_activity: self.worker.last_activity(),
            message: message.into(),
        }
    }

    /// Fall back to Stopped if the tick loop task ended on its own.
    async fn reap_finished_loop(&mut self) {
        if self.loop_alive() {
            return;
        }
        let Some(running) = self.running.take() else {
            return;
        };
        let reason = match running.handle.await {
            Ok(()) => "tick loop exited".to_string(),
            Err(e) => abort_reason(e),
        };
        let err = EngineError::TickAborted {
            mode: self.worker.mode(),
            reason,
        };
        error!("{}", err);
        self.worker.report(None, &err).await;
        self.started_at = None;
    }

    fn current_status(&self) -> BotStatus {
        if self.loop_alive() {
            self.status(format!("{} bot running", self.worker.mode()))
        } else {
            self.status(format!("{} bot stopped", self.worker.mode()))
        }
    }

    async fn start(&mut self) -> BotStatus {
        if self.running.is_some() {
            return self.status(format!("{} bot already running", self.worker.mode()));
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let worker = self.worker.clone();
        let period = self.tick_interval;
        let handle = tokio::spawn(async move {
            worker.run(stop_rx, period).await;
        });

        self.running = Some(RunningLoop { stop_tx, handle });
        self.started_at = Some(Utc::now());
        self.worker
            .log(
                BotLog::new(tags::SYSTEM, format!("{} bot started", self.worker.mode()))
                    .with_data(json!({ "mode": self.worker.mode() })),
            )
            .await;
        self.status(format!("{} bot started", self.worker.mode()))
    }

    async fn stop(&mut self) -> BotStatus {
        let Some(running) = self.running.take() else {
            return self.status(format!("{} bot already stopped", self.worker.mode()));
        };

        // Receiver may already be gone if the loop task died
        let _ = running.stop_tx.send(true);
        if let Err(e) = running.handle.await {
            error!("{} tick loop ended abnormally: {}", self.worker.mode(), e);
        }

        self.worker.close_on_stop().await;
        self.started_at = None;
        self.worker
            .log(
                BotLog::new(tags::SYSTEM, format!("{} bot stopped", self.worker.mode()))
                    .with_data(json!({ "mode": self.worker.mode() })),
            )
            .await;
        self.status(format!("{} bot stopped", self.worker.mode()))
    }

    /// Main actor loop
    async fn run(mut self, mut rx: mpsc::Receiver<BotMessage>) {
        info!("BotController {} started", self.worker.mode());

        while let Some(msg) = rx.recv().await {
            self.reap_finished_loop().await;
            match msg {
                BotMessage::Start { reply } => {
                    let status = self.start().await;
                    let _ = reply.send(status).await;
                }
                BotMessage::Stop { reply } => {
                    let status = self.stop().await;
                    let _ = reply.send(status).await;
                }
                BotMessage::GetStatus { reply } => {
                    let _ = reply.send(self.current_status()).await;
                }
                BotMessage::Shutdown { reply } => {
                    info!("BotController {} shutting down", self.worker.mode());
                    let status = self.stop().await;
                    let _ = reply.send(status).await;
                    break;
                }
            }
        }

        // Handle dropped without a shutdown
        if let Some(running) = self.running.take() {
            let _ = running.stop_tx.send(true);
            let _ = running.handle.await;
        }
        info!("BotController {} stopped", self.worker.mode());
    }
}

/// Cloneable handle to a running controller actor
#[derive(Clone)]
pub struct BotControllerHandle {
    mode: TradingMode,
    tx: mpsc::Sender<BotMessage>,
    worker: Arc<BotWorker>,
}

impl BotControllerHandle {
    pub fn mode(&self) -> TradingMode {
        self.mode
    }

    async fn request(
        &self,
        build: impl FnOnce(mpsc::Sender<BotStatus>) -> BotMessage,
    ) -> Result<BotStatus, EngineError> {
        let (reply_tx, mut reply_rx) = mpsc::channel(1);
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| EngineError::ControllerUnavailable(self.mode))?;
        reply_rx
            .recv()
            .await
            .ok_or(EngineError::ControllerUnavailable(self.mode))
    }

    pub async fn start(&self) -> Result<BotStatus, EngineError> {
        self.request(|reply| BotMessage::Start { reply }).await
    }

    pub async fn stop(&self) -> Result<BotStatus, EngineError> {
        self.request(|reply| BotMessage::Stop { reply }).await
    }

    pub async fn status(&self) -> Result<BotStatus, EngineError> {
        self.request(|reply| BotMessage::GetStatus { reply }).await
    }

    pub async fn shutdown(&self) -> Result<BotStatus, EngineError> {
        self.request(|reply| BotMessage::Shutdown { reply }).await
    }

    /// Runs beside the tick loop; per-position locking orders it against
    /// refresh closes.
    pub async fn close_position(&self, position_id: &str) -> Result<CloseOutcome, EngineError> {
        self.worker.close_manually(position_id).await
    }
}
