//! Strategy Ledger
//!
//! Per-strategy win/loss counters. The ledger is a pure fold over closed
//! trades: `record_outcome` is its only mutation, so replaying the trade
//! history rebuilds it exactly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{StrategyKind, Trade};

/// Win rate assumed for a strategy with no closed trades.
pub const DEFAULT_WIN_RATE: f64 = 0.5;

/// Counters for a single strategy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "StrategyRecordDoc", into = "StrategyRecordDoc")]
pub struct StrategyRecord {
    pub wins: u32,
    pub losses: u32,
    /// Sum of realized profit, may be negative
    pub total_profit: f64,
}

impl StrategyRecord {
    pub fn trades(&self) -> u32 {
        self.wins + self.losses
    }

    /// wins / (wins + losses), or [`DEFAULT_WIN_RATE`] with no trades.
    pub fn win_rate(&self) -> f64 {
        match self.trades() {
            0 => DEFAULT_WIN_RATE,
            total => self.wins as f64 / total as f64,
        }
    }

    /// Zero profit counts as a loss; there is no breakeven bucket.
    fn record(&mut self, profit: f64) {
        if profit > 0.0 {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
        self.total_profit += profit;
    }
}

/// On-disk shape. `win_rate` is written for readers of the file and
/// ignored when loading, since it is derived from wins and losses.
#[derive(Serialize, Deserialize)]
struct StrategyRecordDoc {
    #[serde(default)]
    wins: u32,
    #[serde(default)]
    losses: u32,
    #[serde(default)]
    total_profit: f64,
    #[serde(default)]
    win_rate: Option<f64>,
}

impl From<StrategyRecordDoc> for StrategyRecord {
    fn from(doc: StrategyRecordDoc) -> Self {
        Self {
            wins: doc.wins,
            losses: doc.losses,
            total_profit: doc.total_profit,
        }
    }
}

impl From<StrategyRecord> for StrategyRecordDoc {
    fn from(record: StrategyRecord) -> Self {
        Self {
            win_rate: Some(record.win_rate()),
            wins: record.wins,
            losses: record.losses,
            total_profit: record.total_profit,
        }
    }
}

/// Aggregate view across strategies, for the cycle summary
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LedgerSummary {
    pub total_closed: u32,
    pub wins: u32,
    pub losses: u32,
    pub total_profit: f64,
}

impl LedgerSummary {
    pub fn win_rate(&self) -> f64 {
        if self.total_closed == 0 {
            DEFAULT_WIN_RATE
        } else {
            self.wins as f64 / self.total_closed as f64
        }
    }
}

/// Statistics ledger keyed by strategy, ordered by declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyLedger {
    records: BTreeMap<StrategyKind, StrategyRecord>,
}

impl StrategyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the ledger from closed trades in history order.
    pub fn replay(history: &[Trade]) -> Self {
        let mut ledger = Self::new();
        for trade in history.iter().filter(|t| t.is_closed()) {
            if let Some(profit) = trade.profit {
                ledger.record_outcome(trade.strategy, profit);
            }
        }
        ledger
    }

    /// Record a closed trade's realized profit against its strategy.
    pub fn record_outcome(&mut self, strategy: StrategyKind, profit: f64) {
        self.records.entry(strategy).or_default().record(profit);
    }

    pub fn win_rate(&self, strategy: StrategyKind) -> f64 {
        self.records
            .get(&strategy)
            .map(StrategyRecord::win_rate)
            .unwrap_or(DEFAULT_WIN_RATE)
    }

    pub fn get(&self, strategy: StrategyKind) -> Option<&StrategyRecord> {
        self.records.get(&strategy)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in strategy declaration order
    pub fn iter(&self) -> impl Iterator<Item = (StrategyKind, &StrategyRecord)> {
        self.records.iter().map(|(kind, record)| (*kind, record))
    }

    pub fn summary(&self) -> LedgerSummary {
        self.records
            .values()
            .fold(LedgerSummary::default(), |mut acc, r| {
                acc.total_closed += r.trades();
                acc.wins += r.wins;
                acc.losses += r.losses;
                acc.total_profit += r.total_profit;
                acc
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExitReason, MarketCandidate};
    use chrono::Utc;

    #[test]
    fn test_unknown_strategy_defaults_to_neutral_prior() {
        let ledger = StrategyLedger::new();
        assert_eq!(ledger.win_rate(StrategyKind::Momentum), 0.5);
        assert!(ledger.get(StrategyKind::Momentum).is_none());
    }

    #[test]
    fn test_record_outcomes() {
        let mut ledger = StrategyLedger::new();
        ledger.record_outcome(StrategyKind::MeanReversion, 19.9);
        ledger.record_outcome(StrategyKind::MeanReversion, -5.1);
        ledger.record_outcome(StrategyKind::MeanReversion, 3.0);

        let record = ledger.get(StrategyKind::MeanReversion).unwrap();
        assert_eq!(record.wins, 2);
        assert_eq!(record.losses, 1);
        assert!((record.total_profit - 17.8).abs() < 1e-9);
        assert!((ledger.win_rate(StrategyKind::MeanReversion) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_profit_counts_as_loss() {
        let mut ledger = StrategyLedger::new();
        ledger.record_outcome(StrategyKind::Contrarian, 0.0);
        let record = ledger.get(StrategyKind::Contrarian).unwrap();
        assert_eq!(record.wins, 0);
        assert_eq!(record.losses, 1);
        assert_eq!(ledger.win_rate(StrategyKind::Contrarian), 0.0);
    }

    #[test]
    fn test_replay_matches_incremental_updates() {
        let candidate =
            MarketCandidate::new("m-1", "Will Ethereum go higher?", 0.25, 50_000.0, 0.0).unwrap();
        let mut history = Vec::new();
        let mut incremental = StrategyLedger::new();

        for (i, reason) in [
            ExitReason::PriceTarget,
            ExitReason::TimeExpiry,
            ExitReason::TimeExpiry,
        ]
        .into_iter()
        .enumerate()
        {
            let strategy = StrategyKind::ALL[i % 2];
            let mut trade = Trade::open(strategy, &candidate, 5.0, 0.02, Utc::now());
            let settlement = trade.close(0.65, reason, Utc::now()).unwrap();
            incremental.record_outcome(settlement.strategy, settlement.profit);
            history.push(trade);
        }
        history.push(Trade::open(
            StrategyKind::SmartMoney,
            &candidate,
            10.0,
            0.02,
            Utc::now(),
        ));

        assert_eq!(StrategyLedger::replay(&history), incremental);
        assert!(incremental.get(StrategyKind::SmartMoney).is_none());
    }

    #[test]
    fn test_document_shape_carries_derived_win_rate() {
        let mut ledger = StrategyLedger::new();
        ledger.record_outcome(StrategyKind::SmartMoney, 4.0);
        ledger.record_outcome(StrategyKind::SmartMoney, -10.2);

        let value = serde_json::to_value(&ledger).unwrap();
        let doc = &value["Smart Money"];
        assert_eq!(doc["wins"], 1);
        assert_eq!(doc["losses"], 1);
        assert_eq!(doc["win_rate"], 0.5);

        // A stale stored win_rate is ignored in favour of the counters.
        let stale = r#"{"Momentum": {"wins": 3, "losses": 1, "total_profit": 12, "win_rate": 0.1}}"#;
        let loaded: StrategyLedger = serde_json::from_str(stale).unwrap();
        assert_eq!(loaded.win_rate(StrategyKind::Momentum), 0.75);
    }

    #[test]
    fn test_summary_totals() {
        let mut ledger = StrategyLedger::new();
        ledger.record_outcome(StrategyKind::MeanReversion, 10.0);
        ledger.record_outcome(StrategyKind::Contrarian, -5.0);
        ledger.record_outcome(StrategyKind::Contrarian, -5.0);

        let summary = ledger.summary();
        assert_eq!(summary.total_closed, 3);
        assert_eq!(summary.wins, 1);
        assert!((summary.total_profit - 0.0).abs() < 1e-12);
        assert!((summary.win_rate() - 1.0 / 3.0).abs() < 1e-12);

        let order: Vec<_> = ledger.iter().map(|(k, _)| k).collect();
        assert_eq!(order, vec![StrategyKind::MeanReversion, StrategyKind::Contrarian]);
    }

    #[test]
    fn test_stats_document_key_order_is_stable() {
        let mut ledger = StrategyLedger::new();
        ledger.record_outcome(StrategyKind::SmartMoney, -1.0);
        ledger.record_outcome(StrategyKind::Momentum, 2.0);
        ledger.record_outcome(StrategyKind::MeanReversion, 3.0);

        let json = serde_json::to_string(&ledger).unwrap();
        let positions: Vec<usize> = ["Mean Reversion", "Momentum", "Smart Money"]
            .iter()
            .map(|name| json.find(name).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "unordered: {json}");

        let reloaded: StrategyLedger = serde_json::from_str(&json).unwrap();
        assert_eq!(serde_json::to_string(&reloaded).unwrap(), json);
    }
}
