use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use resellsync_core::{
    AggregateRoot, Decision, DomainError, DomainResult, Entity, EntityKey, EntityType, OrderId,
    ProductId, ResellerId, ReturnId, StateMachine,
};
use resellsync_inventory::{StockDelta, StockLocation};
use resellsync_orders::Order;

/// Return request status lifecycle. Both exits from `Pending` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReturnStatus {
    pub const ALL: [ReturnStatus; 3] = [
        ReturnStatus::Pending,
        ReturnStatus::Approved,
        ReturnStatus::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReturnStatus::Pending => "pending",
            ReturnStatus::Approved => "approved",
            ReturnStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ReturnStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnAction {
    Approve,
    Reject,
}

impl ReturnAction {
    pub fn target(self) -> ReturnStatus {
        match self {
            ReturnAction::Approve => ReturnStatus::Approved,
            ReturnAction::Reject => ReturnStatus::Rejected,
        }
    }
}

impl FromStr for ReturnAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" | "approved" => Ok(ReturnAction::Approve),
            "reject" | "rejected" => Ok(ReturnAction::Reject),
            other => Err(DomainError::validation(format!("unknown return action '{other}'"))),
        }
    }
}

/// Versioned return request snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReturnRequest {
    id: ReturnId,
    order_id: OrderId,
    product_id: ProductId,
    reseller_id: ResellerId,
    quantity: u32,
    reason: String,
    status: ReturnStatus,
    requested_at: DateTime<Utc>,
    processed_date: Option<DateTime<Utc>>,
    version: u64,
}

impl ReturnRequest {
    /// File a new `pending` return against an approved order.
    ///
    /// The quantity may not exceed what was ordered for that product on that
    /// order.
    pub fn file(
        id: ReturnId,
        order: &Order,
        product_id: ProductId,
        quantity: u32,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let reason = reason.into();
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if reason.trim().is_empty() {
            return Err(DomainError::validation("reason cannot be empty"));
        }
        if !order.is_shippable() {
            return Err(DomainError::invariant(format!(
                "order {} is not approved; nothing to return",
                order.id_typed()
            )));
        }

        let ordered = order.ordered_quantity(product_id);
        if ordered == 0 {
            return Err(DomainError::validation(format!(
                "product {product_id} is not part of order {}",
                order.id_typed()
            )));
        }
        if u64::from(quantity) > ordered {
            return Err(DomainError::validation(format!(
                "return quantity {quantity} exceeds ordered quantity {ordered}"
            )));
        }

        Ok(Self {
            id,
            order_id: order.id_typed(),
            product_id,
            reseller_id: order.reseller_id(),
            quantity,
            reason,
            status: ReturnStatus::Pending,
            requested_at: at,
            processed_date: None,
            version: 0,
        })
    }

    pub fn id_typed(&self) -> ReturnId {
        self.id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn reseller_id(&self) -> ResellerId {
        self.reseller_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    pub fn processed_date(&self) -> Option<DateTime<Utc>> {
        self.processed_date
    }

    /// Warehouse gains, reseller loses: one atomic delta pair.
    fn restock_deltas(&self) -> Vec<StockDelta> {
        let qty = i64::from(self.quantity);
        vec![
            StockDelta {
                product_id: self.product_id,
                location: StockLocation::Warehouse,
                quantity: qty,
            },
            StockDelta {
                product_id: self.product_id,
                location: StockLocation::Reseller(self.reseller_id),
                quantity: -qty,
            },
        ]
    }
}

impl Entity for ReturnRequest {
    type Id = ReturnId;

    const ENTITY_TYPE: EntityType = EntityType::ReturnRequest;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn key(&self) -> EntityKey {
        EntityKey::new(EntityType::ReturnRequest, self.id)
    }
}

impl AggregateRoot for ReturnRequest {
    fn version(&self) -> u64 {
        self.version
    }
}

impl StateMachine for ReturnRequest {
    type Status = ReturnStatus;
    type Action = ReturnAction;
    type Effect = StockDelta;

    fn status(&self) -> ReturnStatus {
        self.status
    }

    fn status_name(&self) -> &'static str {
        self.status.as_str()
    }

    fn decide(
        &self,
        action: &ReturnAction,
        at: DateTime<Utc>,
    ) -> DomainResult<Decision<Self, StockDelta>> {
        if self.status != ReturnStatus::Pending {
            return Err(DomainError::illegal_transition(
                EntityType::ReturnRequest,
                self.status.as_str(),
                action.target().as_str(),
            ));
        }

        let mut next = self.clone();
        next.status = action.target();
        next.processed_date = Some(at);
        next.version += 1;

        let effects = match action {
            ReturnAction::Approve => self.restock_deltas(),
            ReturnAction::Reject => Vec::new(),
        };

        Ok(Decision { next, effects })
    }
}
