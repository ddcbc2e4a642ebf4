//! HTTP market data client
//!
//! `GET {base}/quotes/{symbol}` returns the latest quote and
//! `GET {base}/candles/{symbol}?timeframe=..&limit=..` the most recent bars,
//! oldest first. Prices arrive as decimal strings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::prelude::*;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::domain::entities::market::{Candle, Quote};
use crate::domain::repositories::market_data::{MarketDataError, MarketDataProvider};

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    symbol: String,
    price: Decimal,
    #[serde(default)]
    volume: Decimal,
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct CandleResponse {
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    #[serde(default)]
    volume: Decimal,
}

impl TryFrom<CandleResponse> for Candle {
    type Error = MarketDataError;

    fn try_from(c: CandleResponse) -> Result<Self, Self::Error> {
        let float = |value: Decimal, field: &str| {
            value
                .to_f64()
                .ok_or_else(|| MarketDataError::InvalidData(format!("{} {} out of range", field, value)))
        };
        Candle::new(
            float(c.open, "open")?,
            float(c.high, "high")?,
            float(c.low, "low")?,
            float(c.close, "close")?,
            float(c.volume, "volume")?,
        )
        .map_err(MarketDataError::InvalidData)
    }
}

pub struct HttpMarketData {
    client: Client,
    base_url: String,
}

impl HttpMarketData {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, MarketDataError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MarketDataError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, resource: &str, symbol: &str) -> String {
        format!("{}/{}/{}", self.base_url, resource, symbol)
    }

    async fn get(
        &self,
        symbol: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, MarketDataError> {
        let response = request
            .send()
            .await
            .map_err(|e| MarketDataError::Network(e.to_string()))?;

        match response.status() {
            s if s.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(MarketDataError::UnknownSymbol(symbol.to_string())),
            s => {
                let error_text = response.text().await.unwrap_or_default();
                Err(MarketDataError::Network(format!("{} - {}", s, error_text)))
            }
        }
    }
}

#[async_trait]
impl MarketDataProvider for HttpMarketData {
    async fn latest_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let url = self.url("quotes", symbol);
        debug!("GET {}", url);
        let body: QuoteResponse = self
            .get(symbol, self.client.get(&url))
            .await?
            .json()
            .await
            .map_err(|e| MarketDataError::InvalidData(format!("quote for {}: {}", symbol, e)))?;

        if body.price <= Decimal::ZERO {
            return Err(MarketDataError::InvalidData(format!(
                "non-positive price {} for {}",
                body.price, symbol
            )));
        }
        Ok(Quote {
            symbol: body.symbol,
            price: body.price,
            volume: body.volume,
            timestamp: body.timestamp.unwrap_or_else(Utc::now),
        })
    }

    async fn price_history(
        &self,
        symbol: &str,
        timeframe: &str,
        window: usize,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let url = self.url("candles", symbol);
        debug!("GET {} ({} x {})", url, window, timeframe);
        let bars: Vec<CandleResponse> = self
            .get(
                symbol,
                self.client
                    .get(&url)
                    .query(&[("timeframe", timeframe.to_string()), ("limit", window.to_string())]),
            )
            .await?
            .json()
            .await
            .map_err(|e| MarketDataError::InvalidData(format!("candles for {}: {}", symbol, e)))?;

        bars.into_iter().map(Candle::try_from).collect()
    }
}
