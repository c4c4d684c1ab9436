//! PolyPaper Library
//!
//! Paper-trading engine for Polymarket: heuristic strategy selection,
//! simulated trade lifecycle and durable account state.

pub mod config;
pub mod error;
pub mod gamma;
pub mod paper_trading;
pub mod persistence;
pub mod risk;
pub mod strategy;
pub mod traits;
pub mod types;
