//! Database Repository
//!
//! `SqliteStore` is the sqlx-backed `TradingStore`.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error};

use super::models::*;
use super::{DatabaseError, DbPool};
use crate::domain::entities::bot_log::{BotLog, SystemError};
use crate::domain::entities::position::{Position, PositionStatus, TradingMode};
use crate::domain::entities::settings::TradingSettings;
use crate::domain::entities::trade::Trade;
use crate::domain::repositories::store::{StoreError, TradingStore};

fn query_error(context: &str, e: sqlx::Error) -> StoreError {
    error!("{}: {}", context, e);
    DatabaseError::QueryError(format!("{}: {}", context, e)).into()
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl TradingStore for SqliteStore {
    async fn get_settings(&self, user_id: &str) -> Result<Option<TradingSettings>, StoreError> {
        let record = sqlx::query_as::<_, SettingsRecord>(
            "SELECT * FROM trading_settings WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_error("Failed to get settings", e))?;

        record
            .map(|r| {
                serde_json::from_str::<TradingSettings>(&r.settings)
                    .map(|mut settings| {
                        settings.user_id = r.user_id;
                        settings
                    })
                    .map_err(|e| StoreError::Corrupt(format!("trading_settings: {}", e)))
            })
            .transpose()
    }

    async fn save_settings(&self, settings: &TradingSettings) -> Result<(), StoreError> {
        let body = serde_json::to_string(settings)
            .map_err(|e| StoreError::Query(format!("Failed to encode settings: {}", e)))?;
        sqlx::query(
            r#"
            INSERT INTO trading_settings (user_id, settings, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id) DO UPDATE SET settings = excluded.settings,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&settings.user_id)
        .bind(body)
        .bind(format_timestamp(&Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to save settings", e))?;

        debug!("Saved settings for {}", settings.user_id);
        Ok(())
    }

    async fn insert_position(&self, position: &Position) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO positions (
                id, symbol, direction, entry_price, current_price, stop_loss,
                take_profit, quantity, pnl, status, trading_mode, strategy,
                is_paper_trade, created_at, updated_at, closed_at, close_reason
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&position.id)
        .bind(&position.symbol)
        .bind(position.direction.as_str())
        .bind(position.entry_price.to_string())
        .bind(position.current_price.to_string())
        .bind(position.stop_loss.to_string())
        .bind(position.take_profit.to_string())
        .bind(position.quantity.to_string())
        .bind(position.pnl.to_string())
        .bind(position.status.as_str())
        .bind(position.trading_mode.as_str())
        .bind(&position.strategy)
        .bind(position.is_paper_trade)
        .bind(format_timestamp(&position.created_at))
        .bind(format_timestamp(&position.updated_at))
        .bind(position.closed_at.as_ref().map(format_timestamp))
        .bind(position.close_reason.map(|r| r.as_str()))
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to create position", e))?;

        debug!("Created position: {} for {}", position.id, position.symbol);
        Ok(())
    }

    async fn update_position_mark(&self, position: &Position) -> Result<bool, StoreError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE positions
            SET current_price = ?1, pnl = ?2, updated_at = ?3
            WHERE id = ?4 AND status = 'open'
            "#,
        )
        .bind(position.current_price.to_string())
        .bind(position.pnl.to_string())
        .bind(format_timestamp(&position.updated_at))
        .bind(&position.id)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to update position", e))?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn close_position(&self, closed: &Position, trade: &Trade) -> Result<bool, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| query_error("Failed to begin close transaction", e))?;

        let closed_at = closed.closed_at.unwrap_or(trade.exit_time);
        let rows_affected = sqlx::query(
            r#"
            UPDATE positions
            SET status = 'closed', current_price = ?1, pnl = ?2,
                closed_at = ?3, updated_at = ?3, close_reason = ?4
            WHERE id = ?5 AND status = 'open'
            "#,
        )
        .bind(closed.current_price.to_string())
        .bind(closed.pnl.to_string())
        .bind(format_timestamp(&closed_at))
        .bind(trade.close_reason.as_str())
        .bind(&closed.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| query_error("Failed to close position", e))?
        .rows_affected();

        if rows_affected == 0 {
            tx.rollback()
                .await
                .map_err(|e| query_error("Failed to roll back close", e))?;
            debug!("Position {} already closed", closed.id);
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO trades (
                id, position_id, symbol, direction, entry_price, exit_price,
                quantity, pnl, duration_seconds, strategy, trading_mode,
                is_paper_trade, entry_time, exit_time, close_reason
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&trade.id)
        .bind(&trade.position_id)
        .bind(&trade.symbol)
        .bind(trade.direction.as_str())
        .bind(trade.entry_price.to_string())
        .bind(trade.exit_price.to_string())
        .bind(trade.quantity.to_string())
        .bind(trade.pnl.to_string())
        .bind(trade.duration_seconds)
        .bind(&trade.strategy)
        .bind(trade.trading_mode.as_str())
        .bind(trade.is_paper_trade)
        .bind(format_timestamp(&trade.entry_time))
        .bind(format_timestamp(&trade.exit_time))
        .bind(trade.close_reason.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| query_error("Failed to create trade", e))?;

        tx.commit()
            .await
            .map_err(|e| query_error("Failed to commit close", e))?;

        debug!("Closed position {} with trade {}", closed.id, trade.id);
        Ok(true)
    }

    async fn get_position(&self, id: &str) -> Result<Option<Position>, StoreError> {
        sqlx::query_as::<_, PositionRecord>("SELECT * FROM positions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error("Failed to get position", e))?
            .map(Position::try_from)
            .transpose()
    }

    async fn list_positions(
        &self,
        mode: Option<TradingMode>,
        status: Option<PositionStatus>,
    ) -> Result<Vec<Position>, StoreError> {
        let records = sqlx::query_as::<_, PositionRecord>(
            r#"
            SELECT * FROM positions
            WHERE (?1 IS NULL OR trading_mode = ?1)
              AND (?2 IS NULL OR status = ?2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(mode.map(|m| m.as_str()))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error("Failed to list positions", e))?;

        records.into_iter().map(Position::try_from).collect()
    }

    async fn count_open_positions(&self, mode: TradingMode) -> Result<usize, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM positions WHERE trading_mode = ?1 AND status = 'open'",
        )
        .bind(mode.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| query_error("Failed to count open positions", e))?;

        Ok(count.max(0) as usize)
    }

    async fn list_trades(&self, mode: Option<TradingMode>) -> Result<Vec<Trade>, StoreError> {
        let records = sqlx::query_as::<_, TradeRecord>(
            r#"
            SELECT * FROM trades
            WHERE (?1 IS NULL OR trading_mode = ?1)
            ORDER BY exit_time DESC
            "#,
        )
        .bind(mode.map(|m| m.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error("Failed to list trades", e))?;

        records.into_iter().map(Trade::try_from).collect()
    }

    async fn insert_log(&self, log: &BotLog) -> Result<i64, StoreError> {
        let data = log.data.as_ref().map(|d| d.to_string());
        let id = sqlx::query(
            r#"
            INSERT INTO bot_logs (level, message, symbol, data, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&log.level)
        .bind(&log.message)
        .bind(&log.symbol)
        .bind(data)
        .bind(format_timestamp(&log.timestamp))
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to insert log", e))?
        .last_insert_rowid();

        Ok(id)
    }

    async fn list_logs(&self, limit: usize) -> Result<Vec<BotLog>, StoreError> {
        let records = sqlx::query_as::<_, BotLogRecord>(
            "SELECT * FROM bot_logs ORDER BY id DESC LIMIT ?1",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error("Failed to list logs", e))?;

        records.into_iter().map(BotLog::try_from).collect()
    }

    async fn clear_logs(&self) -> Result<u64, StoreError> {
        let rows = sqlx::query("DELETE FROM bot_logs")
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("Failed to clear logs", e))?
            .rows_affected();

        debug!("Cleared {} log rows", rows);
        Ok(rows)
    }

    async fn insert_error(&self, error: &SystemError) -> Result<i64, StoreError> {
        let id = sqlx::query(
            r#"
            INSERT INTO system_errors (
                level, title, message, source, error_code, resolved,
                created_at, updated_at, resolved_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(error.level.as_str())
        .bind(&error.title)
        .bind(&error.message)
        .bind(&error.source)
        .bind(&error.error_code)
        .bind(error.resolved)
        .bind(format_timestamp(&error.created_at))
        .bind(format_timestamp(&error.updated_at))
        .bind(error.resolved_at.as_ref().map(format_timestamp))
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to insert system error", e))?
        .last_insert_rowid();

        Ok(id)
    }

    async fn list_errors(&self, resolved: Option<bool>) -> Result<Vec<SystemError>, StoreError> {
        let records = sqlx::query_as::<_, SystemErrorRecord>(
            r#"
            SELECT * FROM system_errors
            WHERE (?1 IS NULL OR resolved = ?1)
            ORDER BY id DESC
            "#,
        )
        .bind(resolved)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error("Failed to list system errors", e))?;

        records.into_iter().map(SystemError::try_from).collect()
    }

    async fn resolve_error(&self, id: i64) -> Result<bool, StoreError> {
        let now = format_timestamp(&Utc::now());
        let rows_affected = sqlx::query(
            r#"
            UPDATE system_errors
            SET resolved = 1, resolved_at = ?1, updated_at = ?1
            WHERE id = ?2 AND resolved = 0
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to resolve system error", e))?
        .rows_affected();

        Ok(rows_affected == 1)
    }
}
