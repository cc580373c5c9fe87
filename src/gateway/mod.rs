//! Chain-data gateway integration
//!
//! This module provides the client and types for reading chain state from the upstream
//! REST and Cosmos LCD services, and the poller that keeps the current chain head fresh
//! for the rest of the engine.

/// HTTP client and the `ChainGateway` trait
mod client;
/// Scripted in-memory gateway for tests
#[cfg(test)]
pub mod mock;
/// Background loop publishing the latest chain head
mod poller;
/// Type definitions for gateway data structures
mod types;

pub use client::{ChainGateway, ChainGatewayClient};
pub use poller::HeightPoller;
pub use types::*;
