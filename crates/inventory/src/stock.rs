use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use resellsync_core::{DomainError, DomainResult, ProductId, ResellerId};

/// Where a stock quantity is held.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reseller_id", rename_all = "snake_case")]
pub enum StockLocation {
    Warehouse,
    Reseller(ResellerId),
}

impl core::fmt::Display for StockLocation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StockLocation::Warehouse => f.write_str("warehouse"),
            StockLocation::Reseller(id) => write!(f, "reseller:{id}"),
        }
    }
}

/// Address of one stock cell: a product at a location.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: ProductId,
    pub location: StockLocation,
}

impl StockKey {
    pub fn warehouse(product_id: ProductId) -> Self {
        Self {
            product_id,
            location: StockLocation::Warehouse,
        }
    }

    pub fn reseller(product_id: ProductId, reseller_id: ResellerId) -> Self {
        Self {
            product_id,
            location: StockLocation::Reseller(reseller_id),
        }
    }
}

/// Signed quantity change for one stock cell (a transition side effect).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDelta {
    pub product_id: ProductId,
    pub location: StockLocation,
    pub quantity: i64,
}

impl StockDelta {
    pub fn key(&self) -> StockKey {
        StockKey {
            product_id: self.product_id,
            location: self.location,
        }
    }
}

/// Before/after record of one cell touched by an applied delta batch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChange {
    pub key: StockKey,
    pub before: u64,
    pub after: u64,
}

/// Stock quantities keyed by product + location.
///
/// Quantities are unsigned: a cell can never hold a negative amount. Missing
/// cells read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockLevels {
    cells: HashMap<StockKey, u64>,
}

impl StockLevels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &StockKey) -> u64 {
        self.cells.get(key).copied().unwrap_or(0)
    }

    pub fn set(&mut self, key: StockKey, quantity: u64) {
        self.cells.insert(key, quantity);
    }

    /// All non-empty cells for a product, in no particular order.
    pub fn for_product(&self, product_id: ProductId) -> Vec<(StockKey, u64)> {
        self.cells
            .iter()
            .filter(|(k, _)| k.product_id == product_id)
            .map(|(k, q)| (*k, *q))
            .collect()
    }

    /// Compute the result of applying `deltas` without touching `self`.
    ///
    /// Deltas on the same cell accumulate in order. Fails with
    /// `StockUnderflow` if any cell would end (or pass through) below zero.
    pub fn stage(&self, deltas: &[StockDelta]) -> DomainResult<Vec<StockChange>> {
        let mut staged: Vec<StockChange> = Vec::with_capacity(deltas.len());

        for delta in deltas {
            let key = delta.key();
            let current = match staged.iter().find(|c| c.key == key) {
                Some(c) => c.after,
                None => self.get(&key),
            };

            let next = i128::from(current) + i128::from(delta.quantity);
            if next < 0 {
                return Err(DomainError::stock_underflow(format!(
                    "product {} at {} holds {current}, cannot apply {}",
                    delta.product_id, delta.location, delta.quantity
                )));
            }
            let next = u64::try_from(next)
                .map_err(|_| DomainError::invariant("stock quantity overflow"))?;

            match staged.iter_mut().find(|c| c.key == key) {
                Some(c) => c.after = next,
                None => staged.push(StockChange {
                    key,
                    before: current,
                    after: next,
                }),
            }
        }

        Ok(staged)
    }

    /// Write previously staged changes.
    pub fn commit(&mut self, changes: &[StockChange]) {
        for change in changes {
            self.cells.insert(change.key, change.after);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn apply(levels: &mut StockLevels, deltas: &[StockDelta]) -> DomainResult<Vec<StockChange>> {
        let changes = levels.stage(deltas)?;
        levels.commit(&changes);
        Ok(changes)
    }

    fn return_pair(product_id: ProductId, reseller_id: ResellerId, qty: i64) -> Vec<StockDelta> {
        vec![
            StockDelta {
                product_id,
                location: StockLocation::Warehouse,
                quantity: qty,
            },
            StockDelta {
                product_id,
                location: StockLocation::Reseller(reseller_id),
                quantity: -qty,
            },
        ]
    }

    #[test]
    fn missing_cells_read_as_zero() {
        let levels = StockLevels::new();
        assert_eq!(levels.get(&StockKey::warehouse(ProductId::new())), 0);
    }

    #[test]
    fn return_pair_moves_stock_from_reseller_to_warehouse() {
        let product = ProductId::new();
        let reseller = ResellerId::new();
        let mut levels = StockLevels::new();
        levels.set(StockKey::warehouse(product), 10);
        levels.set(StockKey::reseller(product, reseller), 50);

        let changes = apply(&mut levels, &return_pair(product, reseller, 2)).unwrap();

        assert_eq!(changes.len(), 2);
        assert_eq!(levels.get(&StockKey::warehouse(product)), 12);
        assert_eq!(levels.get(&StockKey::reseller(product, reseller)), 48);
    }

    #[test]
    fn underflow_leaves_every_cell_untouched() {
        let product = ProductId::new();
        let reseller = ResellerId::new();
        let mut levels = StockLevels::new();
        levels.set(StockKey::warehouse(product), 10);
        levels.set(StockKey::reseller(product, reseller), 1);
        let before = levels.clone();

        let err = apply(&mut levels, &return_pair(product, reseller, 2)).unwrap_err();

        assert!(matches!(err, DomainError::StockUnderflow(_)));
        assert_eq!(levels, before);
    }

    #[test]
    fn deltas_on_the_same_cell_accumulate() {
        let product = ProductId::new();
        let key = StockKey::warehouse(product);
        let mut levels = StockLevels::new();
        levels.set(key, 1);

        let deltas = vec![
            StockDelta { product_id: product, location: StockLocation::Warehouse, quantity: 3 },
            StockDelta { product_id: product, location: StockLocation::Warehouse, quantity: -4 },
        ];
        let changes = apply(&mut levels, &deltas).unwrap();

        assert_eq!(changes, vec![StockChange { key, before: 1, after: 0 }]);
        assert_eq!(levels.get(&key), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: applying a delta batch either fails and changes nothing, or
        /// succeeds and every touched cell stays non-negative with the net delta
        /// reflected exactly.
        #[test]
        fn delta_batches_never_produce_negative_stock(
            warehouse in 0u64..100,
            reseller_qty in 0u64..100,
            qty in 1i64..150,
        ) {
            let product = ProductId::new();
            let reseller = ResellerId::new();
            let mut levels = StockLevels::new();
            levels.set(StockKey::warehouse(product), warehouse);
            levels.set(StockKey::reseller(product, reseller), reseller_qty);
            let before = levels.clone();

            match apply(&mut levels, &return_pair(product, reseller, qty)) {
                Ok(_) => {
                    prop_assert!(qty as u64 <= reseller_qty);
                    prop_assert_eq!(levels.get(&StockKey::warehouse(product)), warehouse + qty as u64);
                    prop_assert_eq!(
                        levels.get(&StockKey::reseller(product, reseller)),
                        reseller_qty - qty as u64
                    );
                }
                Err(_) => {
                    prop_assert!(qty as u64 > reseller_qty);
                    prop_assert_eq!(levels, before);
                }
            }
        }
    }
}
