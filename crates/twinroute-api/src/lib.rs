//! twinroute-api: HTTP API layer for twinroute
//!
//! Exposes quoting, balances and transaction flows to a local frontend.

pub mod dto;
pub mod routes;
pub mod server;
pub mod state;

pub use server::*;
pub use state::{AppState, FlowRecord, StateError, FLOW_CLEANUP_INTERVAL};
