//! Log Bus
//!
//! Every `BotLog` and `SystemError` goes through here: it is persisted, mirrored
//! to tracing, kept in a 100-entry in-memory ring for live viewers, and fanned
//! out on a broadcast channel. Sends never wait on subscribers; a lagging
//! receiver loses its oldest events.

use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::domain::entities::bot_log::{tags, BotLog, ErrorLevel, SystemError};
use crate::domain::errors::EngineError;
use crate::domain::repositories::store::{StoreError, TradingStore};

/// Entries retained by the live mirror
pub const LOG_MIRROR_CAPACITY: usize = 100;
/// Per-subscriber queue bound
pub const SUBSCRIBER_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum BusEvent {
    Log(BotLog),
    Error(SystemError),
}

/// Fixed-capacity ring: a `Vec` arena plus the index of the oldest entry.
#[derive(Debug)]
pub struct LogRing {
    entries: Vec<BotLog>,
    head: usize,
    capacity: usize,
}

impl LogRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    pub fn push(&mut self, entry: BotLog) {
        if self.entries.len() < self.capacity {
            self.entries.push(entry);
        } else {
            self.entries[self.head] = entry;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<BotLog> {
        let mut out = Vec::with_capacity(self.entries.len());
        out.extend_from_slice(&self.entries[self.head..]);
        out.extend_from_slice(&self.entries[..self.head]);
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.head = 0;
    }
}

pub struct LogBus {
    store: Arc<dyn TradingStore>,
    mirror: Mutex<LogRing>,
    tx: broadcast::Sender<BusEvent>,
}

impl LogBus {
    pub fn new(store: Arc<dyn TradingStore>) -> Self {
        let (tx, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        Self {
            store,
            mirror: Mutex::new(LogRing::new(LOG_MIRROR_CAPACITY)),
            tx,
        }
    }

    fn trace(entry: &BotLog) {
        let symbol = entry.symbol.as_deref().unwrap_or("-");
        match entry.level.as_str() {
            tags::ERROR => error!("[{}] {} {}", entry.level, symbol, entry.message),
            tags::WARNING => warn!("[{}] {} {}", entry.level, symbol, entry.message),
            _ => info!("[{}] {} {}", entry.level, symbol, entry.message),
        }
    }

    /// Persist, mirror and publish one log entry.
    pub async fn log(&self, mut entry: BotLog) {
        match self.store.insert_log(&entry).await {
            Ok(id) => entry.id = Some(id),
            Err(e) => warn!("Failed to persist bot log: {}", e),
        }
        Self::trace(&entry);

        self.mirror
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry.clone());

        // No receivers is fine
        let _ = self.tx.send(BusEvent::Log(entry));
    }

    /// Persist and publish a system error.
    pub async fn error(&self, mut record: SystemError) {
        match self.store.insert_error(&record).await {
            Ok(id) => record.id = Some(id),
            Err(e) => warn!("Failed to persist system error: {}", e),
        }
        match record.level {
            ErrorLevel::Error => error!("{} ({}): {}", record.title, record.source, record.message),
            ErrorLevel::Warning => warn!("{} ({}): {}", record.title, record.source, record.message),
            ErrorLevel::Info => info!("{} ({}): {}", record.title, record.source, record.message),
        }
        let _ = self.tx.send(BusEvent::Error(record));
    }

    pub async fn engine_error(&self, err: &EngineError, source: &str) {
        self.error(SystemError::from_engine_error(err, source)).await;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }

    /// Live mirror contents, oldest first.
    pub fn recent(&self) -> Vec<BotLog> {
        self.mirror
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .snapshot()
    }

    /// Durable history, newest first.
    pub async fn list(&self, limit: usize) -> Result<Vec<BotLog>, StoreError> {
        self.store.list_logs(limit).await
    }

    pub async fn clear(&self) -> Result<u64, StoreError> {
        let removed = self.store.clear_logs().await?;
        self.mirror.lock().unwrap_or_else(|e| e.into_inner()).clear();
        Ok(removed)
    }
}
