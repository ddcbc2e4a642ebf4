//! Persistence Layer
//!
//! SQLite storage for positions, trades, bot logs, system errors and per-user
//! trading settings, via sqlx.
//!
//! # Database Schema
//!
//! ## positions
//! - id, symbol, direction (`UP`/`LONG`/`SHORT`), trading_mode (`spot`/`leverage`)
//! - entry_price, current_price, stop_loss, take_profit, quantity, pnl: decimal TEXT
//! - status (`open`/`closed`), close_reason, is_paper_trade, strategy
//! - created_at, updated_at, closed_at: RFC 3339 TEXT
//!
//! ## trades
//! - One row per closed position (`UNIQUE(position_id)`), never updated
//!
//! ## bot_logs
//! - Append-only activity log, cleared only on request
//!
//! ## system_errors
//! - Errors with a `resolved` flag flipped by an explicit resolve call
//!
//! ## trading_settings
//! - One JSON document per user

pub mod models;
pub mod repository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use crate::domain::repositories::store::StoreError;

/// Database connection pool
pub type DbPool = SqlitePool;

/// Database initialization error
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Query error: {0}")]
    QueryError(String),
}

impl From<DatabaseError> for StoreError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::ConnectionError(e) => StoreError::Connection(e.to_string()),
            DatabaseError::MigrationError(msg) => StoreError::Connection(msg),
            DatabaseError::QueryError(msg) => StoreError::Query(msg),
        }
    }
}

/// Initialize the database connection pool with default settings
pub async fn init_database(database_url: &str) -> Result<DbPool, DatabaseError> {
    init_database_with(&DatabaseConfig {
        url: database_url.to_string(),
        ..DatabaseConfig::default()
    })
    .await
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Initialize the database connection pool
///
/// In-memory databases get a single connection: each SQLite connection to
/// `:memory:` would otherwise open its own empty database.
pub async fn init_database_with(config: &DatabaseConfig) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", config.url);

    // Ensure data directory exists
    if let Some(db_path) = config.url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
                })?;
            }
        }
    }

    let mut options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
    options = if config.log_queries {
        options.log_statements(tracing::log::LevelFilter::Debug)
    } else {
        options.disable_statement_logging()
    };

    let pool_options = if is_memory_url(&config.url) {
        if config.max_connections != 1 {
            warn!("In-memory database: using a single connection");
        }
        // The database lives only as long as its connection
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(config.max_connections.max(1))
    };

    let pool = pool_options.connect_with(options).await?;

    run_migrations(&pool).await?;

    info!("✓ Database initialized successfully");

    Ok(pool)
}

/// Run database migrations
async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    info!("Running database migrations...");

    let tables: [(&str, &str); 5] = [
        (
            "positions",
            r#"
            CREATE TABLE IF NOT EXISTS positions (
                id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                direction TEXT NOT NULL CHECK(direction IN ('UP', 'LONG', 'SHORT')),
                entry_price TEXT NOT NULL,
                current_price TEXT NOT NULL,
                stop_loss TEXT NOT NULL,
                take_profit TEXT NOT NULL,
                quantity TEXT NOT NULL,
                pnl TEXT NOT NULL,
                status TEXT NOT NULL CHECK(status IN ('open', 'closed')),
                trading_mode TEXT NOT NULL CHECK(trading_mode IN ('spot', 'leverage')),
                strategy TEXT,
                is_paper_trade BOOLEAN NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                closed_at TEXT,
                close_reason TEXT
            )
            "#,
        ),
        (
            "trades",
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id TEXT PRIMARY KEY,
                position_id TEXT NOT NULL UNIQUE,
                symbol TEXT NOT NULL,
                direction TEXT NOT NULL,
                entry_price TEXT NOT NULL,
                exit_price TEXT NOT NULL,
                quantity TEXT NOT NULL,
                pnl TEXT NOT NULL,
                duration_seconds INTEGER NOT NULL,
                strategy TEXT,
                trading_mode TEXT NOT NULL,
                is_paper_trade BOOLEAN NOT NULL,
                entry_time TEXT NOT NULL,
                exit_time TEXT NOT NULL,
                close_reason TEXT NOT NULL,
                FOREIGN KEY (position_id) REFERENCES positions(id)
            )
            "#,
        ),
        (
            "bot_logs",
            r#"
            CREATE TABLE IF NOT EXISTS bot_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                level TEXT NOT NULL,
                message TEXT NOT NULL,
                symbol TEXT,
                data TEXT,
                timestamp TEXT NOT NULL
            )
            "#,
        ),
        (
            "system_errors",
            r#"
            CREATE TABLE IF NOT EXISTS system_errors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                level TEXT NOT NULL CHECK(level IN ('INFO', 'WARNING', 'ERROR')),
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                source TEXT NOT NULL,
                error_code TEXT,
                resolved BOOLEAN NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                resolved_at TEXT
            )
            "#,
        ),
        (
            "trading_settings",
            r#"
            CREATE TABLE IF NOT EXISTS trading_settings (
                user_id TEXT PRIMARY KEY,
                settings TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        ),
    ];

    for (name, ddl) in tables {
        sqlx::query(ddl).execute(pool).await.map_err(|e| {
            DatabaseError::MigrationError(format!("Failed to create {} table: {}", name, e))
        })?;
    }

    // Create indexes for better query performance
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_positions_mode_status ON positions(trading_mode, status)",
        "CREATE INDEX IF NOT EXISTS idx_positions_symbol ON positions(symbol)",
        "CREATE INDEX IF NOT EXISTS idx_trades_mode ON trades(trading_mode)",
        "CREATE INDEX IF NOT EXISTS idx_trades_exit_time ON trades(exit_time)",
        "CREATE INDEX IF NOT EXISTS idx_system_errors_resolved ON system_errors(resolved)",
    ];
    for ddl in indexes {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;
    }

    info!("✓ Database migrations completed successfully");

    Ok(())
}

/// Database configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://data/dualbot.db")
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Enable query logging
    pub log_queries: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/dualbot.db".to_string(),
            max_connections: 5,
            log_queries: cfg!(debug_assertions),
        }
    }
}

impl DatabaseConfig {
    /// Load from `DATABASE_*` variables supplied by `lookup`
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let url = lookup("DATABASE_URL").unwrap_or(defaults.url);

        let max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .and_then(|s| s.parse().ok())
            .filter(|n: &u32| *n > 0)
            .unwrap_or(defaults.max_connections);

        let log_queries = lookup("DATABASE_LOG_QUERIES")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.log_queries);

        Self {
            url,
            max_connections,
            log_queries,
        }
    }
}
