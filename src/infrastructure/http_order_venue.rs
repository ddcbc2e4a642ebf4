//! HTTP order venue
//!
//! Posts market orders as JSON to `{base}/orders`. Each request is signed with
//! HMAC-SHA256 over `timestamp + method + path + body` using the user's API
//! secret, base64 encoded, and sent in the `X-DUALBOT-*` headers.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::domain::repositories::order_venue::{OrderAck, OrderRequest, OrderVenue, VenueError};

type HmacSha256 = Hmac<Sha256>;

const ORDERS_PATH: &str = "/orders";
const USER_AGENT: &str = "dualbot/0.1.0";

/// Base64 HMAC-SHA256 of `timestamp + method + path + body`.
pub fn sign_request(
    secret: &str,
    timestamp: i64,
    method: &str,
    path: &str,
    body: &str,
) -> Result<String, VenueError> {
    let message = format!("{}{}{}{}", timestamp, method, path, body);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| VenueError::Authentication(format!("HMAC error: {}", e)))?;
    mac.update(message.as_bytes());
    Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

pub struct HttpOrderVenue {
    client: Client,
    base_url: String,
}

impl std::fmt::Debug for HttpOrderVenue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpOrderVenue")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HttpOrderVenue {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, VenueError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| VenueError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn orders_url(&self) -> String {
        format!("{}{}", self.base_url, ORDERS_PATH)
    }
}

fn classify_status(status: StatusCode, body: String) -> VenueError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            VenueError::Authentication(format!("{} - {}", status, body))
        }
        s if s.is_client_error() => VenueError::Rejected(format!("{} - {}", status, body)),
        _ => VenueError::Network(format!("{} - {}", status, body)),
    }
}

#[async_trait]
impl OrderVenue for HttpOrderVenue {
    fn name(&self) -> &str {
        "http"
    }

    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck, VenueError> {
        if !order.credentials.is_configured() {
            return Err(VenueError::Authentication(
                "exchange credentials are not configured".to_string(),
            ));
        }

        let body = serde_json::to_string(order)
            .map_err(|e| VenueError::InvalidResponse(format!("Failed to encode order: {}", e)))?;
        let timestamp = Utc::now().timestamp();
        let secret = Zeroizing::new(order.credentials.api_secret.clone());
        let signature = sign_request(&secret, timestamp, "POST", ORDERS_PATH, &body)?;

        debug!("POST {} ({})", self.orders_url(), order.client_order_id);
        let response = self
            .client
            .post(self.orders_url())
            .header("Content-Type", "application/json")
            .header("X-DUALBOT-KEY", &order.credentials.api_key)
            .header("X-DUALBOT-SIGN", signature)
            .header("X-DUALBOT-TIMESTAMP", timestamp.to_string())
            .body(body)
            .send()
            .await
            .map_err(|e| VenueError::Network(format!("Failed to submit order: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("Order {} refused: {} - {}", order.client_order_id, status, error_text);
            return Err(classify_status(status, error_text));
        }

        let ack: OrderAck = response
            .json()
            .await
            .map_err(|e| VenueError::InvalidResponse(format!("Failed to parse order ack: {}", e)))?;
        if ack.fill_price.is_none() {
            return Err(VenueError::MissingFill(ack.order_id));
        }

        info!("Order {} acknowledged as {}", order.client_order_id, ack.order_id);
        Ok(ack)
    }
}
