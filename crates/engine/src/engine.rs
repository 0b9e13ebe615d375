use core::convert::Infallible;

use chrono::{DateTime, Utc};

use resellsync_core::{Decision, DomainError, DomainResult, EntityType, StateMachine};
use resellsync_inventory::StockDelta;
use resellsync_orders::OrderAction;
use resellsync_returns::ReturnAction;
use resellsync_shipping::ShipmentStatus;

use crate::snapshot::EntitySnapshot;

/// A requested status change, typed per entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionAction {
    Order(OrderAction),
    Shipment(ShipmentStatus),
    Return(ReturnAction),
}

impl TransitionAction {
    /// Parse a wire action name (`"approve"`, `"in_transit"`, ...) for an
    /// entity kind.
    pub fn parse(entity_type: EntityType, raw: &str) -> DomainResult<Self> {
        match entity_type {
            EntityType::Order => raw.parse().map(TransitionAction::Order),
            EntityType::Shipment => raw.parse().map(TransitionAction::Shipment),
            EntityType::ReturnRequest => raw.parse().map(TransitionAction::Return),
        }
    }

    pub fn entity_type(&self) -> EntityType {
        match self {
            TransitionAction::Order(_) => EntityType::Order,
            TransitionAction::Shipment(_) => EntityType::Shipment,
            TransitionAction::Return(_) => EntityType::ReturnRequest,
        }
    }

    /// Wire name of the status this action targets.
    pub fn target_name(&self) -> &'static str {
        match self {
            TransitionAction::Order(a) => a.target().as_str(),
            TransitionAction::Shipment(s) => s.as_str(),
            TransitionAction::Return(a) => a.target().as_str(),
        }
    }
}

/// Result of a legal transition, ready to be committed atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: EntitySnapshot,
    pub from_state: &'static str,
    pub to_state: &'static str,
    pub effects: Vec<StockDelta>,
}

/// Decide a transition from a raw wire action name.
///
/// Action names the entity kind does not know are reported as
/// `IllegalTransition`, the same as a known but unreachable target.
pub fn decide(current: &EntitySnapshot, raw_action: &str, at: DateTime<Utc>) -> DomainResult<Transition> {
    let action = TransitionAction::parse(current.entity_type(), raw_action).map_err(|_| {
        DomainError::illegal_transition(current.entity_type(), current.status_name(), raw_action)
    })?;
    decide_action(current, &action, at)
}

/// Decide a transition from a typed action.
pub fn decide_action(
    current: &EntitySnapshot,
    action: &TransitionAction,
    at: DateTime<Utc>,
) -> DomainResult<Transition> {
    match (current, action) {
        (EntitySnapshot::Order(order), TransitionAction::Order(a)) => {
            Ok(finish(current, no_effects(order.decide(a, at)?)))
        }
        (EntitySnapshot::Shipment(shipment), TransitionAction::Shipment(target)) => {
            Ok(finish(current, no_effects(shipment.decide(target, at)?)))
        }
        (EntitySnapshot::Return(request), TransitionAction::Return(a)) => {
            let decision = request.decide(a, at)?;
            Ok(finish(
                current,
                Decision {
                    next: decision.next.into(),
                    effects: decision.effects,
                },
            ))
        }
        (_, other) => Err(DomainError::illegal_transition(
            current.entity_type(),
            current.status_name(),
            other.target_name(),
        )),
    }
}

fn no_effects<S>(decision: Decision<S, Infallible>) -> Decision<EntitySnapshot, StockDelta>
where
    S: Into<EntitySnapshot>,
{
    Decision {
        next: decision.next.into(),
        effects: decision.effects.into_iter().map(|never| match never {}).collect(),
    }
}

fn finish(current: &EntitySnapshot, decision: Decision<EntitySnapshot, StockDelta>) -> Transition {
    Transition {
        from_state: current.status_name(),
        to_state: decision.next.status_name(),
        next: decision.next,
        effects: decision.effects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use resellsync_core::{OrderId, ProductId, ResellerId, ReturnId, ShipmentId};
    use resellsync_inventory::StockLocation;
    use resellsync_orders::{NewOrderLine, Order};
    use resellsync_returns::ReturnRequest;
    use resellsync_shipping::{Shipment, ShipmentDetails};

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn pending_order(product_id: ProductId) -> Order {
        Order::place(
            OrderId::new(),
            ResellerId::new(),
            vec![NewOrderLine {
                product_id,
                quantity: 4,
                unit_price: 1_000,
            }],
            None,
            test_time(),
        )
        .unwrap()
    }

    fn approved(order: &Order) -> Order {
        match decide(&order.clone().into(), "approve", test_time()).unwrap().next {
            EntitySnapshot::Order(o) => o,
            other => panic!("expected order, got {other:?}"),
        }
    }

    fn all_snapshots() -> Vec<EntitySnapshot> {
        let product = ProductId::new();
        let order = approved(&pending_order(product));
        let shipment = Shipment::create(
            ShipmentId::new(),
            &order,
            ShipmentDetails {
                carrier: "SiCepat".to_string(),
                tracking_number: None,
                shipping_method: "express".to_string(),
                estimated_delivery: None,
            },
            test_time(),
        )
        .unwrap();
        let request =
            ReturnRequest::file(ReturnId::new(), &order, product, 2, "wrong colour", test_time())
                .unwrap();
        vec![
            pending_order(product).into(),
            shipment.into(),
            request.into(),
        ]
    }

    #[test]
    fn order_approval_reports_from_and_to_states() {
        let snapshot: EntitySnapshot = pending_order(ProductId::new()).into();
        let t = decide(&snapshot, "approve", test_time()).unwrap();
        assert_eq!(t.from_state, "pending");
        assert_eq!(t.to_state, "approved");
        assert_eq!(t.next.version(), 1);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn shipment_cannot_skip_stages() {
        let snapshot = all_snapshots().remove(1);
        let err = decide(&snapshot, "delivered", test_time()).unwrap_err();
        assert!(matches!(err, DomainError::IllegalTransition { .. }));

        let t = decide(&snapshot, "shipped", test_time()).unwrap();
        assert_eq!((t.from_state, t.to_state), ("processing", "shipped"));
    }

    #[test]
    fn only_return_approval_carries_effects() {
        let snapshot = all_snapshots().remove(2);
        let request = snapshot.as_return().unwrap().clone();

        let approve = decide(&snapshot, "approved", test_time()).unwrap();
        assert_eq!(approve.effects.len(), 2);
        assert_eq!(approve.effects[0].location, StockLocation::Warehouse);
        assert_eq!(approve.effects[0].quantity, 2);
        assert_eq!(
            approve.effects[1].location,
            StockLocation::Reseller(request.reseller_id())
        );
        assert_eq!(approve.effects[1].quantity, -2);

        let reject = decide(&snapshot, "reject", test_time()).unwrap();
        assert!(reject.effects.is_empty());
    }

    #[test]
    fn unknown_or_foreign_actions_are_illegal_transitions() {
        for snapshot in all_snapshots() {
            let err = decide(&snapshot, "teleport", test_time()).unwrap_err();
            match err {
                DomainError::IllegalTransition { entity_type, requested, .. } => {
                    assert_eq!(entity_type, snapshot.entity_type());
                    assert_eq!(requested, "teleport");
                }
                other => panic!("expected IllegalTransition, got {other:?}"),
            }
        }

        let order: EntitySnapshot = pending_order(ProductId::new()).into();
        let foreign = TransitionAction::Shipment(ShipmentStatus::Shipped);
        assert!(matches!(
            decide_action(&order, &foreign, test_time()),
            Err(DomainError::IllegalTransition { .. })
        ));
    }

    const ACTIONS: [&str; 10] = [
        "approve",
        "reject",
        "approved",
        "rejected",
        "shipped",
        "in_transit",
        "out_for_delivery",
        "delivered",
        "failed_delivery",
        "processing",
    ];

    const SHIPMENT_STEPS: [(&str, &str); 8] = [
        ("processing", "shipped"),
        ("shipped", "in_transit"),
        ("in_transit", "out_for_delivery"),
        ("out_for_delivery", "delivered"),
        ("processing", "failed_delivery"),
        ("shipped", "failed_delivery"),
        ("in_transit", "failed_delivery"),
        ("out_for_delivery", "failed_delivery"),
    ];

    fn target_of(action: &str) -> &str {
        match action {
            "approve" => "approved",
            "reject" => "rejected",
            other => other,
        }
    }

    fn is_legal_step(entity_type: EntityType, from: &str, to: &str) -> bool {
        match entity_type {
            EntityType::Order | EntityType::ReturnRequest => {
                from == "pending" && (to == "approved" || to == "rejected")
            }
            EntityType::Shipment => SHIPMENT_STEPS.contains(&(from, to)),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: for every entity kind, an action is accepted exactly when
        /// it is a listed step from the current state, and the version counts
        /// the accepted steps.
        #[test]
        fn any_action_sequence_is_a_chain_of_legal_steps(
            picks in prop::collection::vec(0usize..ACTIONS.len(), 1..16)
        ) {
            for mut snapshot in all_snapshots() {
                let start = snapshot.version();
                let mut accepted = 0u64;
                for &idx in &picks {
                    let before = snapshot.status_name();
                    let target = target_of(ACTIONS[idx]);
                    let legal = is_legal_step(snapshot.entity_type(), before, target);
                    if let Ok(t) = decide(&snapshot, ACTIONS[idx], test_time()) {
                        prop_assert!(legal, "accepted {} -> {}", before, target);
                        prop_assert_eq!(t.from_state, before);
                        prop_assert_eq!(t.to_state, target);
                        prop_assert_eq!(t.next.version(), snapshot.version() + 1);
                        snapshot = t.next;
                        accepted += 1;
                    } else {
                        prop_assert!(!legal, "refused {} -> {}", before, target);
                        prop_assert_eq!(snapshot.status_name(), before);
                    }
                }
                prop_assert_eq!(snapshot.version(), start + accepted);
            }
        }
    }
}
