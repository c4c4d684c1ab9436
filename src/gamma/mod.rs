//! Polymarket Gamma API integration
//!
//! Market listing for candidate discovery and per-market price lookups
//! for closing paper positions.

pub mod discovery;
pub mod rest;
pub mod types;

pub use discovery::{DiscoveryConfig, MarketDiscovery};
pub use rest::{GammaClient, GammaPriceLookup};
pub use types::MarketResponse;
