use chrono::{DateTime, Utc};
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use resellsync_core::{DomainError, EntityType, ProductId};
use resellsync_events::{ReplayFrom, StatusEvent};
use resellsync_infra::TransitionOutcome;
use resellsync_inventory::{StockChange, StockKey, StockLocation};

use crate::app::errors::ApiError;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub expected_version: u64,
}

#[derive(Debug, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: u64,
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub reseller_id: String,
    pub lines: Vec<OrderLineRequest>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateShipmentRequest {
    pub carrier: String,
    pub tracking_number: Option<String>,
    pub shipping_method: String,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CarrierStatusRequest {
    pub status_text: String,
}

#[derive(Debug, Deserialize)]
pub struct FileReturnRequest {
    pub order_id: String,
    pub product_id: String,
    pub reseller_id: String,
    pub quantity: u32,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    /// `"warehouse"` or `"reseller"`.
    pub location: String,
    pub reseller_id: Option<String>,
    pub quantity: u64,
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub connection_id: Option<String>,
    pub replay_since: Option<DateTime<Utc>>,
    /// Replay the whole buffer; ignored when `replay_since` is set.
    #[serde(default)]
    pub replay_buffered: bool,
}

impl StreamQuery {
    pub fn replay_from(&self) -> Option<ReplayFrom> {
        match (self.replay_since, self.replay_buffered) {
            (Some(since), _) => Some(ReplayFrom::Since(since)),
            (None, true) => Some(ReplayFrom::Buffered),
            (None, false) => None,
        }
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub new_state: &'static str,
    pub committed_version: u64,
    pub side_effects_applied: Vec<StockChange>,
    pub event: StatusEvent,
}

impl From<TransitionOutcome> for TransitionResponse {
    fn from(outcome: TransitionOutcome) -> Self {
        let key = outcome.entity.key();
        Self {
            entity_type: key.entity_type,
            entity_id: key.entity_id.to_string(),
            new_state: outcome.new_state,
            committed_version: outcome.committed_version,
            side_effects_applied: outcome.side_effects_applied,
            event: outcome.event,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StockLevelResponse {
    pub location: StockLocation,
    pub quantity: u64,
}

#[derive(Debug, Serialize)]
pub struct StockResponse {
    pub product_id: ProductId,
    pub levels: Vec<StockLevelResponse>,
}

impl StockResponse {
    pub fn new(product_id: ProductId, cells: Vec<(StockKey, u64)>) -> Self {
        Self {
            product_id,
            levels: cells
                .into_iter()
                .map(|(key, quantity)| StockLevelResponse {
                    location: key.location,
                    quantity,
                })
                .collect(),
        }
    }
}

// -------------------------
// Parsing helpers
// -------------------------

/// Parse a typed identifier, reporting the offending field as a 400.
pub fn parse_id<T>(raw: &str, field: &'static str) -> Result<T, ApiError>
where
    T: FromStr<Err = DomainError>,
{
    raw.trim()
        .parse()
        .map_err(|e: DomainError| ApiError::BadRequest(format!("invalid {field}: {e}")))
}

pub fn parse_entity_type(raw: &str) -> Result<EntityType, ApiError> {
    raw.trim()
        .parse()
        .map_err(|e: DomainError| ApiError::BadRequest(e.to_string()))
}

pub fn parse_location(body: &SetStockRequest) -> Result<StockLocation, ApiError> {
    match body.location.trim().to_lowercase().as_str() {
        "warehouse" => Ok(StockLocation::Warehouse),
        "reseller" => {
            let raw = body.reseller_id.as_deref().ok_or_else(|| {
                ApiError::BadRequest("reseller_id is required for reseller stock".to_string())
            })?;
            Ok(StockLocation::Reseller(parse_id(raw, "reseller_id")?))
        }
        other => Err(ApiError::BadRequest(format!(
            "unknown stock location '{other}' (expected warehouse or reseller)"
        ))),
    }
}
