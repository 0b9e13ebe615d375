//! Stock domain module.
//!
//! Warehouse and reseller stock cells plus the all-or-nothing delta arithmetic
//! used when a transition carries stock side effects. Pure logic, no IO.

pub mod stock;

pub use stock::{StockChange, StockDelta, StockKey, StockLevels, StockLocation};
