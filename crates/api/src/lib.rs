//! HTTP command gateway and SSE push channel for the reseller console.

pub mod app;
pub mod context;
pub mod middleware;
pub mod transport;
