//! Strategy Catalog
//!
//! Four price/volume heuristics for binary prediction markets. Each eligible
//! strategy gets a confidence of `base score × historical win rate`, so a
//! strategy that keeps losing is deprioritized without being switched off.
//!
//! | Strategy       | Eligible when                    | Base score          |
//! |----------------|----------------------------------|---------------------|
//! | Mean Reversion | price < 0.40                     | 10 / 7 / 5          |
//! | Contrarian     | price > 0.70                     | 10 / 7 / 5          |
//! | Momentum       | price < 0.45 and volume > 50k    | 6                   |
//! | Smart Money    | volume > 500k and price < 0.50   | 8                   |

pub mod ledger;
pub use ledger::{LedgerSummary, StrategyLedger, StrategyRecord, DEFAULT_WIN_RATE};

use crate::types::StrategyKind;

/// Minimum volume for Momentum
const MOMENTUM_MIN_VOLUME: f64 = 50_000.0;
/// Minimum volume for Smart Money
const SMART_MONEY_MIN_VOLUME: f64 = 500_000.0;

/// Scored strategy for one candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyScore {
    pub strategy: StrategyKind,
    pub base_score: f64,
    pub win_rate: f64,
    /// base_score × win_rate
    pub confidence: f64,
}

/// Heuristic weight of `strategy` for this market, or `None` if ineligible.
pub fn base_score(strategy: StrategyKind, price: f64, volume: f64) -> Option<f64> {
    match strategy {
        StrategyKind::MeanReversion if price < 0.40 => Some(if price < 0.30 {
            10.0
        } else if price < 0.35 {
            7.0
        } else {
            5.0
        }),
        StrategyKind::Contrarian if price > 0.70 => Some(if price > 0.80 {
            10.0
        } else if price > 0.75 {
            7.0
        } else {
            5.0
        }),
        StrategyKind::Momentum if price < 0.45 && volume > MOMENTUM_MIN_VOLUME => Some(6.0),
        StrategyKind::SmartMoney if volume > SMART_MONEY_MIN_VOLUME && price < 0.50 => Some(8.0),
        _ => None,
    }
}

/// Every eligible strategy, in declaration order.
pub fn score_all(price: f64, volume: f64, ledger: &StrategyLedger) -> Vec<StrategyScore> {
    StrategyKind::ALL
        .into_iter()
        .filter_map(|strategy| {
            let base_score = base_score(strategy, price, volume)?;
            let win_rate = ledger.win_rate(strategy);
            Some(StrategyScore {
                strategy,
                base_score,
                win_rate,
                confidence: base_score * win_rate,
            })
        })
        .collect()
}

/// Pick the strategy with the strictly highest confidence.
///
/// Ties go to the strategy declared first in [`StrategyKind::ALL`].
pub fn select_strategy(price: f64, volume: f64, ledger: &StrategyLedger) -> Option<StrategyScore> {
    score_all(price, volume, ledger)
        .into_iter()
        .fold(None, |best: Option<StrategyScore>, score| match best {
            Some(b) if score.confidence <= b.confidence => Some(b),
            _ => Some(score),
        })
}
