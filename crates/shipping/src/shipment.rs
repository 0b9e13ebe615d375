use core::convert::Infallible;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use resellsync_core::{
    AggregateRoot, Decision, DomainError, DomainResult, Entity, EntityKey, EntityType, OrderId,
    ResellerId, ShipmentId, StateMachine,
};
use resellsync_orders::Order;

/// Carrier lifecycle of a shipment.
///
/// Progression is strictly linear (no skipping stages); `FailedDelivery` is
/// reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Processing,
    Shipped,
    InTransit,
    OutForDelivery,
    Delivered,
    FailedDelivery,
}

impl ShipmentStatus {
    pub const ALL: [ShipmentStatus; 6] = [
        ShipmentStatus::Processing,
        ShipmentStatus::Shipped,
        ShipmentStatus::InTransit,
        ShipmentStatus::OutForDelivery,
        ShipmentStatus::Delivered,
        ShipmentStatus::FailedDelivery,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ShipmentStatus::Processing => "processing",
            ShipmentStatus::Shipped => "shipped",
            ShipmentStatus::InTransit => "in_transit",
            ShipmentStatus::OutForDelivery => "out_for_delivery",
            ShipmentStatus::Delivered => "delivered",
            ShipmentStatus::FailedDelivery => "failed_delivery",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ShipmentStatus::Delivered | ShipmentStatus::FailedDelivery)
    }

    /// The immediate successor on the happy path, if any.
    pub fn successor(self) -> Option<ShipmentStatus> {
        match self {
            ShipmentStatus::Processing => Some(ShipmentStatus::Shipped),
            ShipmentStatus::Shipped => Some(ShipmentStatus::InTransit),
            ShipmentStatus::InTransit => Some(ShipmentStatus::OutForDelivery),
            ShipmentStatus::OutForDelivery => Some(ShipmentStatus::Delivered),
            ShipmentStatus::Delivered | ShipmentStatus::FailedDelivery => None,
        }
    }

    pub fn can_move_to(self, target: ShipmentStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        target == ShipmentStatus::FailedDelivery || self.successor() == Some(target)
    }
}

impl FromStr for ShipmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShipmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown shipment status '{s}'")))
    }
}

/// Admin-entered shipping details captured when the shipment is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentDetails {
    pub carrier: String,
    pub tracking_number: Option<String>,
    pub shipping_method: String,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

/// Raw status string reported by a carrier. Informational only; never drives
/// the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierReport {
    pub status_text: String,
    pub reported_at: DateTime<Utc>,
}

/// Versioned shipment snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shipment {
    id: ShipmentId,
    order_id: OrderId,
    reseller_id: ResellerId,
    carrier: String,
    tracking_number: Option<String>,
    shipping_method: String,
    status: ShipmentStatus,
    shipping_date: Option<DateTime<Utc>>,
    estimated_delivery: Option<DateTime<Utc>>,
    actual_delivery: Option<DateTime<Utc>>,
    version: u64,
    created_at: DateTime<Utc>,
}

impl Shipment {
    /// Create a shipment in `processing` for an approved order.
    pub fn create(
        id: ShipmentId,
        order: &Order,
        details: ShipmentDetails,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if !order.is_shippable() {
            return Err(DomainError::invariant(format!(
                "order {} is not approved; shipments require an approved order",
                order.id_typed()
            )));
        }
        if details.carrier.trim().is_empty() {
            return Err(DomainError::validation("carrier cannot be empty"));
        }
        if details.shipping_method.trim().is_empty() {
            return Err(DomainError::validation("shipping_method cannot be empty"));
        }

        Ok(Self {
            id,
            order_id: order.id_typed(),
            reseller_id: order.reseller_id(),
            carrier: details.carrier,
            tracking_number: details.tracking_number.filter(|t| !t.trim().is_empty()),
            shipping_method: details.shipping_method,
            status: ShipmentStatus::Processing,
            shipping_date: None,
            estimated_delivery: details.estimated_delivery,
            actual_delivery: None,
            version: 0,
            created_at: at,
        })
    }

    pub fn id_typed(&self) -> ShipmentId {
        self.id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn reseller_id(&self) -> ResellerId {
        self.reseller_id
    }

    pub fn carrier(&self) -> &str {
        &self.carrier
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn shipping_method(&self) -> &str {
        &self.shipping_method
    }

    pub fn shipping_date(&self) -> Option<DateTime<Utc>> {
        self.shipping_date
    }

    pub fn estimated_delivery(&self) -> Option<DateTime<Utc>> {
        self.estimated_delivery
    }

    pub fn actual_delivery(&self) -> Option<DateTime<Utc>> {
        self.actual_delivery
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for Shipment {
    type Id = ShipmentId;

    const ENTITY_TYPE: EntityType = EntityType::Shipment;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn key(&self) -> EntityKey {
        EntityKey::new(EntityType::Shipment, self.id)
    }
}

impl AggregateRoot for Shipment {
    fn version(&self) -> u64 {
        self.version
    }
}

impl StateMachine for Shipment {
    type Status = ShipmentStatus;
    /// Shipment actions are named by their target status.
    type Action = ShipmentStatus;
    type Effect = Infallible;

    fn status(&self) -> ShipmentStatus {
        self.status
    }

    fn status_name(&self) -> &'static str {
        self.status.as_str()
    }

    fn decide(
        &self,
        target: &ShipmentStatus,
        at: DateTime<Utc>,
    ) -> DomainResult<Decision<Self, Infallible>> {
        if !self.status.can_move_to(*target) {
            return Err(DomainError::illegal_transition(
                EntityType::Shipment,
                self.status.as_str(),
                target.as_str(),
            ));
        }

        let mut next = self.clone();
        next.status = *target;
        match target {
            ShipmentStatus::Shipped if next.shipping_date.is_none() => {
                next.shipping_date = Some(at);
            }
            ShipmentStatus::Delivered => {
                next.actual_delivery = Some(at);
            }
            _ => {}
        }
        next.version += 1;
        Ok(Decision::without_effects(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use resellsync_core::{OrderId, ProductId};
    use resellsync_orders::{NewOrderLine, OrderAction};

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn details() -> ShipmentDetails {
        ShipmentDetails {
            carrier: "JNE".to_string(),
            tracking_number: Some("JNE-0001".to_string()),
            shipping_method: "regular".to_string(),
            estimated_delivery: None,
        }
    }

    fn pending_order() -> Order {
        Order::place(
            OrderId::new(),
            ResellerId::new(),
            vec![NewOrderLine {
                product_id: ProductId::new(),
                quantity: 3,
                unit_price: 500,
            }],
            None,
            test_time(),
        )
        .unwrap()
    }

    fn approved_order() -> Order {
        pending_order()
            .decide(&OrderAction::Approve, test_time())
            .unwrap()
            .next
    }

    fn processing_shipment() -> Shipment {
        Shipment::create(ShipmentId::new(), &approved_order(), details(), test_time()).unwrap()
    }

    #[test]
    fn create_requires_approved_order() {
        let err = Shipment::create(ShipmentId::new(), &pending_order(), details(), test_time())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        let order = approved_order();
        let shipment = Shipment::create(ShipmentId::new(), &order, details(), test_time()).unwrap();
        assert_eq!(shipment.status(), ShipmentStatus::Processing);
        assert_eq!(shipment.order_id(), order.id_typed());
        assert_eq!(shipment.reseller_id(), order.reseller_id());
        assert_eq!(shipment.version(), 0);
        assert!(shipment.actual_delivery().is_none());
    }

    #[test]
    fn jumping_straight_to_delivered_is_illegal() {
        let shipment = processing_shipment();

        let err = shipment.decide(&ShipmentStatus::Delivered, test_time()).unwrap_err();
        assert!(matches!(err, DomainError::IllegalTransition { .. }));

        let decision = shipment.decide(&ShipmentStatus::Shipped, test_time()).unwrap();
        assert_eq!(decision.next.status(), ShipmentStatus::Shipped);
        assert_eq!(decision.next.version(), 1);
        assert!(decision.next.shipping_date().is_some());
    }

    #[test]
    fn full_progression_sets_actual_delivery_once() {
        let mut shipment = processing_shipment();
        for target in [
            ShipmentStatus::Shipped,
            ShipmentStatus::InTransit,
            ShipmentStatus::OutForDelivery,
        ] {
            shipment = shipment.decide(&target, test_time()).unwrap().next;
            assert!(shipment.actual_delivery().is_none());
        }

        let delivered_at = test_time();
        shipment = shipment
            .decide(&ShipmentStatus::Delivered, delivered_at)
            .unwrap()
            .next;
        assert_eq!(shipment.actual_delivery(), Some(delivered_at));
        assert_eq!(shipment.version(), 4);

        for target in ShipmentStatus::ALL {
            assert!(shipment.decide(&target, test_time()).is_err());
        }
        assert_eq!(shipment.actual_delivery(), Some(delivered_at));
    }

    #[test]
    fn failure_branch_is_reachable_from_any_non_terminal_state() {
        let mut shipment = processing_shipment();
        loop {
            let failed = shipment
                .decide(&ShipmentStatus::FailedDelivery, test_time())
                .unwrap()
                .next;
            assert_eq!(failed.status(), ShipmentStatus::FailedDelivery);
            assert!(failed.actual_delivery().is_none());

            match shipment.status().successor() {
                Some(ShipmentStatus::Delivered) | None => break,
                Some(next) => shipment = shipment.decide(&next, test_time()).unwrap().next,
            }
        }
    }

    #[test]
    fn status_names_parse() {
        for status in ShipmentStatus::ALL {
            assert_eq!(status.as_str().parse::<ShipmentStatus>().unwrap(), status);
        }
        assert!("preparing".parse::<ShipmentStatus>().is_err());
    }

    const LEGAL_STEPS: [(&str, &str); 8] = [
        ("processing", "shipped"),
        ("shipped", "in_transit"),
        ("in_transit", "out_for_delivery"),
        ("out_for_delivery", "delivered"),
        ("processing", "failed_delivery"),
        ("shipped", "failed_delivery"),
        ("in_transit", "failed_delivery"),
        ("out_for_delivery", "failed_delivery"),
    ];

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever sequence of targets is requested, a transition is
        /// accepted exactly when it is one of `LEGAL_STEPS`, and
        /// `actual_delivery` is set iff the shipment is delivered.
        #[test]
        fn requested_targets_only_follow_listed_successors(
            targets in prop::collection::vec(0usize..6, 1..12)
        ) {
            let mut shipment = processing_shipment();
            let mut accepted = 0u64;

            for idx in targets {
                let target = ShipmentStatus::ALL[idx];
                let prior = shipment.status();
                let listed = LEGAL_STEPS.contains(&(prior.as_str(), target.as_str()));
                match shipment.decide(&target, test_time()) {
                    Ok(decision) => {
                        prop_assert!(listed, "accepted {} -> {}", prior.as_str(), target.as_str());
                        shipment = decision.next;
                        accepted += 1;
                    }
                    Err(_) => {
                        prop_assert!(!listed, "refused {} -> {}", prior.as_str(), target.as_str());
                        prop_assert_eq!(shipment.status(), prior);
                    }
                }
                prop_assert_eq!(
                    shipment.actual_delivery().is_some(),
                    shipment.status() == ShipmentStatus::Delivered
                );
            }

            prop_assert_eq!(shipment.version(), accepted);
        }
    }
}
