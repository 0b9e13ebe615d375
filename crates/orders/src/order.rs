use core::convert::Infallible;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use resellsync_core::{
    AggregateRoot, Decision, DomainError, DomainResult, Entity, EntityKey, EntityType, OrderId,
    ProductId, ResellerId, StateMachine,
};

/// Order status lifecycle. Both exits from `Pending` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Approved,
    Rejected,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 3] = [
        OrderStatus::Pending,
        OrderStatus::Approved,
        OrderStatus::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Approved => "approved",
            OrderStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

/// Admin decision on a pending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    Approve,
    Reject,
}

impl OrderAction {
    pub fn target(self) -> OrderStatus {
        match self {
            OrderAction::Approve => OrderStatus::Approved,
            OrderAction::Reject => OrderStatus::Rejected,
        }
    }
}

impl FromStr for OrderAction {
    type Err = DomainError;

    /// Accepts both the verb and the target status name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" | "approved" => Ok(OrderAction::Approve),
            "reject" | "rejected" => Ok(OrderAction::Reject),
            other => Err(DomainError::validation(format!("unknown order action '{other}'"))),
        }
    }
}

/// Requested line when placing an order (subtotal not yet computed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
}

/// Priced order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: u64,
    pub subtotal: u64,
}

/// Versioned order snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    id: OrderId,
    reseller_id: ResellerId,
    lines: Vec<OrderLine>,
    total_amount: u64,
    status: OrderStatus,
    notes: Option<String>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Price the requested lines and build a new `pending` order at version 0.
    pub fn place(
        id: OrderId,
        reseller_id: ResellerId,
        lines: Vec<NewOrderLine>,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if lines.is_empty() {
            return Err(DomainError::validation("order must contain at least one line"));
        }

        let mut priced = Vec::with_capacity(lines.len());
        let mut total: u64 = 0;
        for line in lines {
            if line.quantity == 0 {
                return Err(DomainError::validation("quantity must be positive"));
            }
            if line.unit_price == 0 {
                return Err(DomainError::validation("unit_price must be positive"));
            }
            let subtotal = line
                .unit_price
                .checked_mul(u64::from(line.quantity))
                .ok_or_else(|| DomainError::validation("line subtotal overflows"))?;
            total = total
                .checked_add(subtotal)
                .ok_or_else(|| DomainError::validation("order total overflows"))?;
            priced.push(OrderLine {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
                subtotal,
            });
        }

        Ok(Self {
            id,
            reseller_id,
            lines: priced,
            total_amount: total,
            status: OrderStatus::Pending,
            notes: notes.filter(|n| !n.trim().is_empty()),
            version: 0,
            created_at: at,
            updated_at: at,
        })
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn reseller_id(&self) -> ResellerId {
        self.reseller_id
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total_amount(&self) -> u64 {
        self.total_amount
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Total quantity ordered for a product across all lines.
    pub fn ordered_quantity(&self, product_id: ProductId) -> u64 {
        self.lines
            .iter()
            .filter(|l| l.product_id == product_id)
            .map(|l| u64::from(l.quantity))
            .sum()
    }

    /// Shipments may only be created for approved orders.
    pub fn is_shippable(&self) -> bool {
        matches!(self.status, OrderStatus::Approved)
    }

    fn total_matches_lines(&self) -> bool {
        self.lines.iter().map(|l| l.subtotal).sum::<u64>() == self.total_amount
    }
}

impl Entity for Order {
    type Id = OrderId;

    const ENTITY_TYPE: EntityType = EntityType::Order;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn key(&self) -> EntityKey {
        EntityKey::new(EntityType::Order, self.id)
    }
}

impl AggregateRoot for Order {
    fn version(&self) -> u64 {
        self.version
    }
}

impl StateMachine for Order {
    type Status = OrderStatus;
    type Action = OrderAction;
    type Effect = Infallible;

    fn status(&self) -> OrderStatus {
        self.status
    }

    fn status_name(&self) -> &'static str {
        self.status.as_str()
    }

    fn decide(
        &self,
        action: &OrderAction,
        at: DateTime<Utc>,
    ) -> DomainResult<Decision<Self, Infallible>> {
        if self.status != OrderStatus::Pending {
            return Err(DomainError::illegal_transition(
                EntityType::Order,
                self.status.as_str(),
                action.target().as_str(),
            ));
        }
        if !self.total_matches_lines() {
            return Err(DomainError::invariant("order total does not match its lines"));
        }

        let mut next = self.clone();
        next.status = action.target();
        next.updated_at = at;
        next.version += 1;
        Ok(Decision::without_effects(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn line(quantity: u32, unit_price: u64) -> NewOrderLine {
        NewOrderLine {
            product_id: ProductId::new(),
            quantity,
            unit_price,
        }
    }

    fn pending_order() -> Order {
        Order::place(
            OrderId::new(),
            ResellerId::new(),
            vec![line(2, 150), line(1, 1_000)],
            None,
            test_time(),
        )
        .unwrap()
    }

    #[test]
    fn place_computes_subtotals_and_total() {
        let order = pending_order();
        assert_eq!(order.lines()[0].subtotal, 300);
        assert_eq!(order.lines()[1].subtotal, 1_000);
        assert_eq!(order.total_amount(), 1_300);
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.version(), 0);
    }

    #[test]
    fn place_rejects_empty_and_zero_lines() {
        let empty = Order::place(OrderId::new(), ResellerId::new(), vec![], None, test_time());
        assert!(matches!(empty, Err(DomainError::Validation(_))));

        let zero_qty =
            Order::place(OrderId::new(), ResellerId::new(), vec![line(0, 10)], None, test_time());
        assert!(matches!(zero_qty, Err(DomainError::Validation(_))));

        let zero_price =
            Order::place(OrderId::new(), ResellerId::new(), vec![line(1, 0)], None, test_time());
        assert!(matches!(zero_price, Err(DomainError::Validation(_))));
    }

    #[test]
    fn approve_moves_pending_to_approved_and_bumps_version() {
        let order = pending_order();
        let at = test_time();

        let decision = order.decide(&OrderAction::Approve, at).unwrap();

        assert_eq!(decision.next.status(), OrderStatus::Approved);
        assert_eq!(decision.next.version(), 1);
        assert_eq!(decision.next.updated_at(), at);
        assert!(decision.effects.is_empty());
        assert!(decision.next.is_shippable());
    }

    #[test]
    fn terminal_orders_reject_every_action() {
        let order = pending_order();
        let rejected = order.decide(&OrderAction::Reject, test_time()).unwrap().next;

        for action in [OrderAction::Approve, OrderAction::Reject] {
            let err = rejected.decide(&action, test_time()).unwrap_err();
            match err {
                DomainError::IllegalTransition { entity_type, from, .. } => {
                    assert_eq!(entity_type, EntityType::Order);
                    assert_eq!(from, "rejected");
                }
                other => panic!("expected IllegalTransition, got {other:?}"),
            }
        }
    }

    #[test]
    fn decide_does_not_mutate_state() {
        let order = pending_order();
        let before = order.clone();
        let first = order.decide(&OrderAction::Approve, before.created_at()).unwrap();
        let second = order.decide(&OrderAction::Approve, before.created_at()).unwrap();
        assert_eq!(order, before);
        assert_eq!(first, second);
    }

    #[test]
    fn action_parses_verbs_and_status_names() {
        assert_eq!("approve".parse::<OrderAction>().unwrap(), OrderAction::Approve);
        assert_eq!("rejected".parse::<OrderAction>().unwrap(), OrderAction::Reject);
        assert!("shipped".parse::<OrderAction>().is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: for any sequence of actions, the status stays within the
        /// defined set, only the first action from `pending` can succeed, and the
        /// version equals the number of successful transitions.
        #[test]
        fn action_sequences_stay_within_the_state_machine(
            actions in prop::collection::vec(prop::bool::ANY, 1..8)
        ) {
            let mut order = pending_order();
            let mut successes = 0u64;

            for approve in actions {
                let action = if approve { OrderAction::Approve } else { OrderAction::Reject };
                let prior = order.status();
                match order.decide(&action, test_time()) {
                    Ok(decision) => {
                        prop_assert_eq!(prior, OrderStatus::Pending);
                        prop_assert!(decision.next.status().is_terminal());
                        order = decision.next;
                        successes += 1;
                    }
                    Err(DomainError::IllegalTransition { .. }) => {
                        prop_assert!(prior.is_terminal());
                    }
                    Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                }
                prop_assert!(OrderStatus::ALL.contains(&order.status()));
            }

            prop_assert_eq!(order.version(), successes);
            prop_assert!(successes <= 1);
        }
    }
}
