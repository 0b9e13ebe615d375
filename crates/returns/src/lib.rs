//! Return requests domain module.
//!
//! Adjudication of reseller returns. Approving a return is the only
//! transition in the system that carries stock side effects.

pub mod request;

pub use request::{ReturnAction, ReturnRequest, ReturnStatus};
