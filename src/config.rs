use std::time::Duration;
use thiserror::Error;

use crate::application::actors::bot_controller::BotConfig;
use crate::domain::entities::position::TradingMode;
use crate::persistence::DatabaseConfig;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Per-mode scheduling
#[derive(Debug, Clone, PartialEq)]
pub struct ModeConfig {
    pub symbols: Vec<String>,
    pub tick_interval: Duration,
    pub autostart: bool,
}

impl ModeConfig {
    fn with_defaults() -> Self {
        ModeConfig {
            symbols: ["BTCUSDT", "ETHUSDT", "SOLUSDT", "BNBUSDT"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            tick_interval: Duration::from_secs(60),
            autostart: false,
        }
    }
}

/// Process-level configuration. Trading settings are per user and live in
/// the store, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub user_id: String,
    pub spot: ModeConfig,
    pub leverage: ModeConfig,
    /// Bars requested per symbol each tick
    pub history_window: usize,
    pub market_data_url: String,
    /// Absent means live execution is unavailable
    pub execution_venue_url: Option<String>,
    pub http_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database: DatabaseConfig::default(),
            user_id: "default".to_string(),
            spot: ModeConfig::with_defaults(),
            leverage: ModeConfig::with_defaults(),
            history_window: 100,
            market_data_url: "http://127.0.0.1:8080".to_string(),
            execution_venue_url: None,
            http_timeout: Duration::from_secs(10),
        }
    }
}

fn parse_bool(raw: &str) -> bool {
    raw.eq_ignore_ascii_case("true") || raw == "1"
}

fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Positive integer from `var`, or `None` with a warning when present but invalid.
fn positive<F>(lookup: &F, var: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(var)?;
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Some(value),
        Ok(value) => {
            tracing::warn!("Invalid {} value: {} (must be positive), using default", var, value);
            None
        }
        Err(e) => {
            tracing::warn!("Failed to parse {} '{}': {}, using default", var, raw, e);
            None
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; unset or invalid values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig {
            database: DatabaseConfig::from_lookup(&lookup),
            ..AppConfig::default()
        };

        if let Some(user_id) = lookup("DUALBOT_USER_ID").filter(|u| !u.trim().is_empty()) {
            config.user_id = user_id.trim().to_string();
        }

        if let Some(seconds) = positive(&lookup, "TICK_INTERVAL_SECONDS") {
            config.spot.tick_interval = Duration::from_secs(seconds);
            config.leverage.tick_interval = Duration::from_secs(seconds);
        }
        if let Some(seconds) = positive(&lookup, "SPOT_TICK_INTERVAL_SECONDS") {
            config.spot.tick_interval = Duration::from_secs(seconds);
        }
        if let Some(seconds) = positive(&lookup, "LEVERAGE_TICK_INTERVAL_SECONDS") {
            config.leverage.tick_interval = Duration::from_secs(seconds);
        }

        if let Some(raw) = lookup("SPOT_SYMBOLS") {
            config.spot.symbols = parse_symbols(&raw);
        }
        if let Some(raw) = lookup("LEVERAGE_SYMBOLS") {
            config.leverage.symbols = parse_symbols(&raw);
        }

        if let Some(window) = positive(&lookup, "HISTORY_WINDOW") {
            config.history_window = window as usize;
        }
        if let Some(seconds) = positive(&lookup, "HTTP_TIMEOUT_SECONDS") {
            config.http_timeout = Duration::from_secs(seconds);
        }

        if let Some(url) = lookup("MARKET_DATA_URL") {
            config.market_data_url = url.trim().to_string();
        }
        config.execution_venue_url = lookup("EXECUTION_VENUE_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        if let Some(raw) = lookup("AUTOSTART_SPOT") {
            config.spot.autostart = parse_bool(&raw);
        }
        if let Some(raw) = lookup("AUTOSTART_LEVERAGE") {
            config.leverage.autostart = parse_bool(&raw);
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let is_http = |url: &str| url.starts_with("http://") || url.starts_with("https://");
        if !is_http(&self.market_data_url) {
            return Err(ConfigError::Invalid {
                var: "MARKET_DATA_URL",
                reason: format!("'{}' is not an http(s) URL", self.market_data_url),
            });
        }
        if let Some(url) = &self.execution_venue_url {
            if !is_http(url) {
                return Err(ConfigError::Invalid {
                    var: "EXECUTION_VENUE_URL",
                    reason: format!("'{}' is not an http(s) URL", url),
                });
            }
        }
        if self.spot.symbols.is_empty() && self.leverage.symbols.is_empty() {
            return Err(ConfigError::Invalid {
                var: "SPOT_SYMBOLS/LEVERAGE_SYMBOLS",
                reason: "no symbols configured for either mode".to_string(),
            });
        }
        Ok(())
    }

    pub fn mode(&self, mode: TradingMode) -> &ModeConfig {
        match mode {
            TradingMode::Spot => &self.spot,
            TradingMode::Leverage => &self.leverage,
        }
    }

    pub fn bot_config(&self, mode: TradingMode) -> BotConfig {
        let mode_config = self.mode(mode);
        BotConfig {
            mode,
            user_id: self.user_id.clone(),
            symbols: mode_config.symbols.clone(),
            tick_interval: mode_config.tick_interval,
            history_window: self.history_window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::from_lookup(lookup(&[]));
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.spot.tick_interval, Duration::from_secs(60));
        assert!(config.execution_venue_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mode_overrides_take_precedence() {
        let config = AppConfig::from_lookup(lookup(&[
            ("TICK_INTERVAL_SECONDS", "30"),
            ("LEVERAGE_TICK_INTERVAL_SECONDS", "5"),
            ("SPOT_SYMBOLS", " btcusdt, ethusdt ,,"),
            ("AUTOSTART_LEVERAGE", "TRUE"),
        ]));

        assert_eq!(config.spot.tick_interval, Duration::from_secs(30));
        assert_eq!(config.leverage.tick_interval, Duration::from_secs(5));
        assert_eq!(config.spot.symbols, vec!["BTCUSDT", "ETHUSDT"]);
        assert!(config.leverage.autostart);
        assert!(!config.spot.autostart);
    }

    #[test]
    fn test_invalid_numbers_keep_defaults() {
        let config = AppConfig::from_lookup(lookup(&[
            ("TICK_INTERVAL_SECONDS", "0"),
            ("HISTORY_WINDOW", "lots"),
            ("DATABASE_MAX_CONNECTIONS", "-3"),
        ]));

        assert_eq!(config.spot.tick_interval, Duration::from_secs(60));
        assert_eq!(config.history_window, 100);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_validation() {
        let config = AppConfig::from_lookup(lookup(&[("EXECUTION_VENUE_URL", "ftp://venue")]));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { var: "EXECUTION_VENUE_URL", .. })
        ));

        let config = AppConfig::from_lookup(lookup(&[("SPOT_SYMBOLS", ""), ("LEVERAGE_SYMBOLS", " ")]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bot_config_per_mode() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DUALBOT_USER_ID", "alice"),
            ("LEVERAGE_SYMBOLS", "SOLUSDT"),
        ]));
        let bot = config.bot_config(TradingMode::Leverage);
        assert_eq!(bot.mode, TradingMode::Leverage);
        assert_eq!(bot.user_id, "alice");
        assert_eq!(bot.symbols, vec!["SOLUSDT"]);
    }
}
