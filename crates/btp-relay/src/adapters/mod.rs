//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements the outbound port traits against a live source chain node.

mod block_monitor;
mod icon_client;

pub use block_monitor::WsBlockMonitor;
pub use icon_client::{IconRpcClient, JsonRpcError};
