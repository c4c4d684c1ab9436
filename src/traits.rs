//! Collaborator seams for the trading engine
//!
//! The engine never talks HTTP itself: candidates and current prices come
//! through these traits so tests can inject fixed data.

use anyhow::Result;
use async_trait::async_trait;

use crate::error::CandidateError;
use crate::types::MarketCandidate;

/// One candidate slot from the market source. Records that passed the
/// source's topical filter but carry unusable numbers arrive as `Err` so the
/// engine can report them.
pub type CandidateResult = std::result::Result<MarketCandidate, CandidateError>;

/// Supplies a bounded, pre-filtered list of candidate markets per cycle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn fetch_candidates(&self) -> Result<Vec<CandidateResult>>;
}

/// Current price of a market's tracked outcome, in [0, 1].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceLookup: Send + Sync {
    async fn current_price(&self, market_id: &str) -> Result<f64>;
}
