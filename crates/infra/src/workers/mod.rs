//! Background workers.

pub mod broadcast_pump;

pub use broadcast_pump::{BroadcastPump, WorkerHandle};
