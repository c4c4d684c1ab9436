//! Typed per-item errors collected during a trading cycle
//!
//! Application plumbing (config, HTTP, filesystem) uses `anyhow`; these enums
//! cover the failures the engine records against a single candidate or trade
//! while the rest of the cycle carries on.

use thiserror::Error;
use uuid::Uuid;

/// Why a market record could not become a [`crate::types::MarketCandidate`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CandidateError {
    #[error("market {market_id}: missing field `{field}`")]
    MissingField {
        market_id: String,
        field: &'static str,
    },

    #[error("market {market_id}: field `{field}` is not numeric ({value})")]
    NonNumeric {
        market_id: String,
        field: &'static str,
        value: String,
    },

    #[error("market {market_id}: field `{field}` out of range ({value})")]
    OutOfRange {
        market_id: String,
        field: &'static str,
        value: f64,
    },
}

impl CandidateError {
    pub fn market_id(&self) -> &str {
        match self {
            CandidateError::MissingField { market_id, .. }
            | CandidateError::NonNumeric { market_id, .. }
            | CandidateError::OutOfRange { market_id, .. } => market_id,
        }
    }
}

/// A candidate or trade skipped for this cycle.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TradeError {
    #[error("malformed candidate: {0}")]
    Malformed(#[from] CandidateError),

    #[error("price lookup failed for trade {trade_id} (market {market_id}): {reason}")]
    PriceLookup {
        trade_id: Uuid,
        market_id: String,
        reason: String,
    },

    #[error("trade {trade_id} is already closed")]
    AlreadyClosed { trade_id: Uuid },

    #[error("trade {trade_id} not found in history")]
    UnknownTrade { trade_id: Uuid },

    #[error("trade {trade_id} has unusable entry price {entry_price}")]
    InvalidEntryPrice { trade_id: Uuid, entry_price: f64 },

    #[error("market {market_id} already has an open position")]
    DuplicatePosition { market_id: String },

    #[error("balance ${balance:.2} cannot cover a stake on market {market_id}")]
    InsufficientBalance { market_id: String, balance: f64 },
}
