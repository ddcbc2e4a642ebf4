//! Turns an approved, sized opportunity into a filled position.
//!
//! `PaperExecution` fills immediately at the quoted price and never touches a
//! venue. `LiveExecution` makes exactly one submission and only builds a
//! position from an acknowledgment that carries a fill price.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::entities::opportunity::TradingOpportunity;
use crate::domain::entities::position::{NewPosition, Position};
use crate::domain::entities::settings::EffectiveSettings;
use crate::domain::errors::EngineError;
use crate::domain::repositories::order_venue::{OrderRequest, OrderSide, OrderVenue, VenueError};
use crate::domain::services::risk_manager::{RiskManager, SizedOrder};

/// Identifiers of an order the venue acknowledged.
#[derive(Debug, Clone, PartialEq)]
pub struct VenueOrderRef {
    pub client_order_id: String,
    pub venue_order_id: String,
}

/// A filled position, plus the venue order behind it for live fills.
#[derive(Debug, Clone)]
pub struct Fill {
    pub position: Position,
    pub order: Option<VenueOrderRef>,
}

#[async_trait]
pub trait ExecutionAdapter: Send + Sync {
    fn is_paper(&self) -> bool;

    async fn execute(
        &self,
        opportunity: &TradingOpportunity,
        order: &SizedOrder,
        settings: &EffectiveSettings,
    ) -> Result<Fill, EngineError>;
}

fn open_position(
    opportunity: &TradingOpportunity,
    order: &SizedOrder,
    settings: &EffectiveSettings,
    fill_price: Decimal,
    quantity: Decimal,
    is_paper_trade: bool,
) -> Result<Position, EngineError> {
    let (stop_loss, take_profit) =
        RiskManager::new().protective_levels(order.direction, fill_price, settings)?;
    Position::open(
        NewPosition {
            symbol: opportunity.symbol.clone(),
            direction: order.direction,
            fill_price,
            stop_loss,
            take_profit,
            quantity,
            trading_mode: settings.mode,
            strategy: Some(opportunity.strategy.as_str().to_string()),
            is_paper_trade,
        },
        Utc::now(),
    )
    .map_err(|e| EngineError::OrderSubmissionFailed {
        symbol: opportunity.symbol.clone(),
        reason: e.to_string(),
    })
}

#[derive(Debug, Clone, Default)]
pub struct PaperExecution;

#[async_trait]
impl ExecutionAdapter for PaperExecution {
    fn is_paper(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        opportunity: &TradingOpportunity,
        order: &SizedOrder,
        settings: &EffectiveSettings,
    ) -> Result<Fill, EngineError> {
        let position = open_position(
            opportunity,
            order,
            settings,
            order.reference_price,
            order.quantity,
            true,
        )?;
        Ok(Fill {
            position,
            order: None,
        })
    }
}

pub struct LiveExecution {
    venue: Arc<dyn OrderVenue>,
}

impl LiveExecution {
    pub fn new(venue: Arc<dyn OrderVenue>) -> Self {
        Self { venue }
    }
}

#[async_trait]
impl ExecutionAdapter for LiveExecution {
    fn is_paper(&self) -> bool {
        false
    }

    async fn execute(
        &self,
        opportunity: &TradingOpportunity,
        order: &SizedOrder,
        settings: &EffectiveSettings,
    ) -> Result<Fill, EngineError> {
        let request = OrderRequest {
            client_order_id: Uuid::new_v4().to_string(),
            symbol: opportunity.symbol.clone(),
            side: OrderSide::opening(order.direction),
            direction: order.direction,
            quantity: order.quantity,
            reference_price: order.reference_price,
            trading_mode: settings.mode,
            credentials: settings.credentials.clone(),
        };

        info!(
            "Submitting {} {} {} to {} (client id {})",
            request.side,
            request.quantity,
            request.symbol,
            self.venue.name(),
            request.client_order_id
        );

        let failed = |e: VenueError| {
            warn!("Order for {} failed: {}", opportunity.symbol, e);
            EngineError::OrderSubmissionFailed {
                symbol: opportunity.symbol.clone(),
                reason: e.to_string(),
            }
        };

        let ack = self.venue.submit_order(&request).await.map_err(failed)?;
        let fill_price = ack
            .fill_price
            .ok_or_else(|| failed(VenueError::MissingFill(ack.order_id.clone())))?;
        let quantity = ack
            .filled_quantity
            .filter(|q| *q > Decimal::ZERO)
            .unwrap_or(order.quantity);

        let position = open_position(opportunity, order, settings, fill_price, quantity, false)?;
        Ok(Fill {
            position,
            order: Some(VenueOrderRef {
                client_order_id: request.client_order_id,
                venue_order_id: ack.order_id,
            }),
        })
    }
}
