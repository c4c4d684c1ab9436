//! Risk Manager - stake sizing and the losing-streak circuit breaker
//!
//! Implements:
//! - Volume-tiered stake caps, bounded by available balance
//! - Circuit breaker over a bounded window of recent history

use crate::types::Trade;

/// Risk configuration
#[derive(Debug, Clone)]
pub struct RiskConfig {
    /// Stake cap for markets below `volume_threshold` (USDC)
    pub low_volume_stake: f64,
    /// Stake cap for markets at or above `volume_threshold` (USDC)
    pub high_volume_stake: f64,
    /// Volume separating the two caps
    pub volume_threshold: f64,
    /// How many of the most recent history entries the breaker inspects
    pub breaker_lookback: usize,
    /// Consecutive closed losses (within the lookback) that halt entries
    pub breaker_streak: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            low_volume_stake: 5.0,
            high_volume_stake: 10.0,
            volume_threshold: 100_000.0,
            breaker_lookback: 10,
            breaker_streak: 3,
        }
    }
}

/// Halts new entries after a losing streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreaker {
    lookback: usize,
    streak: usize,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self {
            lookback: 10,
            streak: 3,
        }
    }
}

impl CircuitBreaker {
    pub fn new(lookback: usize, streak: usize) -> Self {
        Self { lookback, streak }
    }

    /// True when the last `streak` closed trades among the most recent
    /// `lookback` history entries all lost money. Open trades in the
    /// window are ignored; fewer than `streak` closed trades never halts.
    pub fn should_halt(&self, history: &[Trade]) -> bool {
        if self.streak == 0 {
            return false;
        }
        let window = &history[history.len().saturating_sub(self.lookback)..];
        let closed: Vec<&Trade> = window.iter().filter(|t| t.is_closed()).collect();
        if closed.len() < self.streak {
            return false;
        }
        closed[closed.len() - self.streak..]
            .iter()
            .all(|t| t.profit.unwrap_or(0.0) < 0.0)
    }
}

/// Circuit breaker with the default 10-entry window and 3-loss streak.
pub fn check_circuit_breaker(history: &[Trade]) -> bool {
    CircuitBreaker::default().should_halt(history)
}

/// Risk manager for stake sizing and entry gating
#[derive(Debug, Clone)]
pub struct RiskManager {
    config: RiskConfig,
    breaker: CircuitBreaker,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        let breaker = CircuitBreaker::new(config.breaker_lookback, config.breaker_streak);
        Self { config, breaker }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Fixed stake cap for a market's volume tier
    pub fn stake_cap(&self, volume: f64) -> f64 {
        if volume < self.config.volume_threshold {
            self.config.low_volume_stake
        } else {
            self.config.high_volume_stake
        }
    }

    /// Stake for a new position: the cap, bounded by balance.
    ///
    /// Returns `None` when the balance cannot fund a positive stake.
    /// There are no partial stakes below what `min(cap, balance)` yields.
    pub fn calculate_stake(&self, volume: f64, balance: f64) -> Option<f64> {
        let stake = self.stake_cap(volume).min(balance);
        if stake > 0.0 && balance >= stake {
            Some(stake)
        } else {
            None
        }
    }

    /// Whether the losing-streak breaker blocks new entries
    pub fn is_halted(&self, history: &[Trade]) -> bool {
        self.breaker.should_halt(history)
    }
}

impl Default for RiskManager {
    fn default() -> Self {
        Self::new(RiskConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExitReason, MarketCandidate, StrategyKind};
    use chrono::Utc;

    fn open_trade() -> Trade {
        let candidate =
            MarketCandidate::new("m-1", "Will Solana go up?", 0.25, 20_000.0, 0.0).unwrap();
        Trade::open(StrategyKind::MeanReversion, &candidate, 5.0, 0.02, Utc::now())
    }

    fn loss() -> Trade {
        let mut trade = open_trade();
        trade.close(0.3, ExitReason::TimeExpiry, Utc::now()).unwrap();
        trade
    }

    fn win() -> Trade {
        let mut trade = open_trade();
        trade.close(0.7, ExitReason::PriceTarget, Utc::now()).unwrap();
        trade
    }

    #[test]
    fn test_stake_sizing() {
        let risk = RiskManager::default();
        assert_eq!(risk.stake_cap(40_000.0), 5.0);
        assert_eq!(risk.stake_cap(100_000.0), 10.0);
        assert_eq!(risk.stake_cap(150_000.0), 10.0);

        assert_eq!(risk.calculate_stake(40_000.0, 100.0), Some(5.0));
        assert_eq!(risk.calculate_stake(150_000.0, 100.0), Some(10.0));
        assert_eq!(risk.calculate_stake(150_000.0, 3.0), Some(3.0));
        assert_eq!(risk.calculate_stake(40_000.0, 3.0), Some(3.0));
        assert_eq!(risk.calculate_stake(40_000.0, 0.0), None);
    }

    #[test]
    fn test_breaker_halts_after_three_closed_losses() {
        let history = vec![win(), loss(), loss(), loss()];
        assert!(check_circuit_breaker(&history));
    }

    #[test]
    fn test_breaker_ignores_open_trades_in_window() {
        let history = vec![loss(), open_trade(), loss(), open_trade(), loss(), open_trade()];
        assert!(check_circuit_breaker(&history));
    }

    #[test]
    fn test_breaker_allows_with_recent_win() {
        let history = vec![loss(), loss(), win(), loss(), loss()];
        assert!(!check_circuit_breaker(&history));
    }

    #[test]
    fn test_breaker_needs_three_closed_trades() {
        assert!(!check_circuit_breaker(&[]));
        assert!(!check_circuit_breaker(&[loss(), loss()]));
        let mostly_open = vec![loss(), loss(), open_trade(), open_trade()];
        assert!(!check_circuit_breaker(&mostly_open));
    }

    #[test]
    fn test_breaker_window_is_bounded() {
        // Three losses pushed out of the 10-entry window by open trades.
        let mut history = vec![loss(), loss(), loss()];
        history.extend((0..8).map(|_| open_trade()));
        assert!(!check_circuit_breaker(&history));

        // Only two of the losses remain in the window.
        let mut history = vec![loss(), loss(), loss()];
        history.extend((0..8).map(|_| open_trade()));
        history.truncate(10);
        history.remove(0);
        history.push(open_trade());
        assert!(!check_circuit_breaker(&history));

        // Exactly at the window edge.
        let mut history = vec![loss(), loss(), loss()];
        history.extend((0..7).map(|_| open_trade()));
        assert!(check_circuit_breaker(&history));
    }

    #[test]
    fn test_zero_profit_does_not_extend_streak() {
        let mut breakeven = open_trade();
        breakeven.close(0.3, ExitReason::TimeExpiry, Utc::now()).unwrap();
        breakeven.profit = Some(0.0);
        let history = vec![loss(), loss(), breakeven];
        assert!(!check_circuit_breaker(&history));
    }

    #[test]
    fn test_configurable_streak() {
        let risk = RiskManager::new(RiskConfig {
            breaker_streak: 2,
            ..Default::default()
        });
        assert!(risk.is_halted(&[win(), loss(), loss()]));
        assert!(!risk.is_halted(&[loss(), win()]));
    }
}
