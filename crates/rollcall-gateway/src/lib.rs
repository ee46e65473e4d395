//! # Rollcall Gateway
//! HTTP surface: health check, chain status, and the write flows that start,
//! stop or exempt escalation chains.

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
