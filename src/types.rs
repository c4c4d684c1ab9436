//! Core types used throughout PolyPaper
//!
//! Strategies, trades, the account aggregate and market candidates.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{CandidateError, TradeError};

/// Heuristic entry strategies, listed in evaluation order.
///
/// Serialized with their display names ("Mean Reversion", ...) so the
/// stats and history documents stay human readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StrategyKind {
    #[serde(rename = "Mean Reversion")]
    MeanReversion,
    #[serde(rename = "Contrarian")]
    Contrarian,
    #[serde(rename = "Momentum")]
    Momentum,
    #[serde(rename = "Smart Money")]
    SmartMoney,
}

impl StrategyKind {
    /// Declaration order; earlier entries win confidence ties.
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::MeanReversion,
        StrategyKind::Contrarian,
        StrategyKind::Momentum,
        StrategyKind::SmartMoney,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::MeanReversion => "Mean Reversion",
            StrategyKind::Contrarian => "Contrarian",
            StrategyKind::Momentum => "Momentum",
            StrategyKind::SmartMoney => "Smart Money",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle state of a paper trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeOutcome {
    Open,
    Closed,
}

/// What closed a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Market price crossed the favorable threshold; binary payout.
    PriceTarget,
    /// Held past the maximum duration; full loss.
    TimeExpiry,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::PriceTarget => write!(f, "PRICE_TARGET"),
            ExitReason::TimeExpiry => write!(f, "TIME_EXPIRY"),
        }
    }
}

/// Result of closing a trade
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settlement {
    pub trade_id: Uuid,
    pub strategy: StrategyKind,
    pub exit_price: f64,
    pub payout: f64,
    pub profit: f64,
    pub reason: ExitReason,
    pub closed_at: DateTime<Utc>,
}

/// One simulated position.
///
/// Entry fields are fixed at creation. Exit fields stay `None` while the
/// trade is open and are written once, by [`Trade::close`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub strategy: StrategyKind,
    /// Contract question text
    #[serde(rename = "contract")]
    pub question: String,
    pub stake: f64,
    pub outcome: TradeOutcome,
    pub entry_price: f64,
    pub market_id: String,
    pub payout: Option<f64>,
    pub exit_price: Option<f64>,
    pub profit: Option<f64>,
    pub fees: f64,
    #[serde(default)]
    pub exit_reason: Option<ExitReason>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

impl Trade {
    /// Create an open trade. The fee is withheld from profit at close, not from balance.
    pub fn open(
        strategy: StrategyKind,
        candidate: &MarketCandidate,
        stake: f64,
        fee_rate: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: now,
            strategy,
            question: candidate.question.clone(),
            stake,
            outcome: TradeOutcome::Open,
            entry_price: candidate.price,
            market_id: candidate.market_id.clone(),
            payout: None,
            exit_price: None,
            profit: None,
            fees: stake * fee_rate,
            exit_reason: None,
            closed_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.outcome == TradeOutcome::Open
    }

    pub fn is_closed(&self) -> bool {
        self.outcome == TradeOutcome::Closed
    }

    pub fn hold_duration(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.timestamp)
    }

    /// Settle the trade.
    ///
    /// A price-target exit pays `stake / entry_price` (the entry price is the
    /// cost basis of a binary share); a time expiry pays nothing. Profit is
    /// payout minus stake minus fee. Closing a closed trade changes nothing
    /// and returns [`TradeError::AlreadyClosed`].
    pub fn close(
        &mut self,
        exit_price: f64,
        reason: ExitReason,
        now: DateTime<Utc>,
    ) -> Result<Settlement, TradeError> {
        if self.is_closed() {
            return Err(TradeError::AlreadyClosed { trade_id: self.id });
        }

        let payout = match reason {
            ExitReason::PriceTarget => {
                if !(self.entry_price.is_finite() && self.entry_price > 0.0) {
                    return Err(TradeError::InvalidEntryPrice {
                        trade_id: self.id,
                        entry_price: self.entry_price,
                    });
                }
                self.stake / self.entry_price
            }
            ExitReason::TimeExpiry => 0.0,
        };
        let profit = payout - self.stake - self.fees;

        self.outcome = TradeOutcome::Closed;
        self.exit_price = Some(exit_price);
        self.payout = Some(payout);
        self.profit = Some(profit);
        self.exit_reason = Some(reason);
        self.closed_at = Some(now);

        Ok(Settlement {
            trade_id: self.id,
            strategy: self.strategy,
            exit_price,
            payout,
            profit,
            reason,
            closed_at: now,
        })
    }
}

/// Balance plus the append-only trade history.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountState {
    pub balance: f64,
    /// Insertion order is chronological
    pub history: Vec<Trade>,
}

impl AccountState {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            balance: initial_balance,
            history: Vec::new(),
        }
    }

    pub fn open_trades(&self) -> impl Iterator<Item = &Trade> {
        self.history.iter().filter(|t| t.is_open())
    }

    pub fn closed_trades(&self) -> impl Iterator<Item = &Trade> {
        self.history.iter().filter(|t| t.is_closed())
    }

    pub fn has_open_position(&self, market_id: &str) -> bool {
        self.open_trades().any(|t| t.market_id == market_id)
    }

    /// Stake locked in open trades
    pub fn locked_balance(&self) -> f64 {
        self.open_trades().map(|t| t.stake).sum()
    }

    /// Balance implied by history: initial − Σ stakes + Σ payouts.
    pub fn reconciled_balance(&self, initial_balance: f64) -> f64 {
        let staked: f64 = self.history.iter().map(|t| t.stake).sum();
        let paid_out: f64 = self.closed_trades().filter_map(|t| t.payout).sum();
        initial_balance - staked + paid_out
    }
}

/// A market under consideration for a new trade this cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketCandidate {
    pub market_id: String,
    pub question: String,
    /// Probability of the tracked (first) outcome
    pub price: f64,
    pub liquidity: f64,
    pub volume: f64,
}

impl MarketCandidate {
    /// Validate numeric fields. Price must lie in (0, 1] since it becomes
    /// the cost basis of the payout; liquidity and volume must be finite
    /// and non-negative.
    pub fn new(
        market_id: impl Into<String>,
        question: impl Into<String>,
        price: f64,
        liquidity: f64,
        volume: f64,
    ) -> Result<Self, CandidateError> {
        let market_id = market_id.into();
        if !(price.is_finite() && price > 0.0 && price <= 1.0) {
            return Err(CandidateError::OutOfRange {
                market_id,
                field: "outcomePrices",
                value: price,
            });
        }
        for (field, value) in [("liquidityNum", liquidity), ("volumeNum", volume)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(CandidateError::OutOfRange {
                    market_id,
                    field,
                    value,
                });
            }
        }
        Ok(Self {
            market_id,
            question: question.into(),
            price,
            liquidity,
            volume,
        })
    }
}

/// Accept RFC 3339 timestamps and offset-less ISO timestamps (read as UTC).
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(serde::de::Error::custom)
}
