//! Shipments domain module.
//!
//! Strict linear carrier progression with a failure branch. Deterministic
//! domain logic only.

pub mod shipment;

pub use shipment::{CarrierReport, Shipment, ShipmentDetails, ShipmentStatus};
