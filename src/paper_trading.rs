//! Paper Trading Engine
//!
//! Simulated trade lifecycle over a persisted account:
//! - **Close path**: open trades settle on a favorable price or after the max hold
//! - **Circuit breaker**: a losing streak blocks new entries
//! - **Open path**: candidates are scored, sized and opened
//!
//! Per-item failures (bad candidate, failed price lookup) are collected in the
//! [`CycleReport`] and never abort the rest of the cycle.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::TradeError;
use crate::persistence::{CsvTradeJournal, PersistedState, TradeEventRecord};
use crate::risk::{RiskConfig, RiskManager};
use crate::strategy::{select_strategy, StrategyLedger};
use crate::traits::{CandidateResult, MarketSource, PriceLookup};
use crate::types::{AccountState, ExitReason, MarketCandidate, Settlement, Trade};

/// Drift tolerated between stored and reconciled balance before warning
const RECONCILE_TOLERANCE: f64 = 1e-6;

/// Paper trading configuration
#[derive(Debug, Clone)]
pub struct PaperTradingConfig {
    /// Starting balance for a fresh account (USDC)
    pub initial_balance: f64,
    /// Fee as a fraction of stake, withheld from profit at close
    pub fee_rate: f64,
    /// Close with a payout once the current price is strictly above this
    pub exit_price_threshold: f64,
    /// Close with zero payout once held strictly longer than this
    pub max_hold_secs: i64,
    /// Skip candidates whose market already has an open trade
    pub skip_open_markets: bool,
}

impl Default for PaperTradingConfig {
    fn default() -> Self {
        Self {
            initial_balance: 100.0,
            fee_rate: 0.02,
            exit_price_threshold: 0.60,
            max_hold_secs: 3600,
            skip_open_markets: false,
        }
    }
}

/// What one cycle did
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub opened: Vec<Uuid>,
    pub closed: Vec<Settlement>,
    pub skipped: Vec<TradeError>,
    /// Circuit breaker blocked new entries
    pub halted: bool,
    /// Balance at the end of the cycle
    pub balance: f64,
}

impl CycleReport {
    fn skip(&mut self, err: TradeError) {
        warn!(error = %err, "⚠️ [PAPER] Skipped");
        self.skipped.push(err);
    }
}

/// Paper trading engine
///
/// Owns the account and ledger for one cycle. All mutation goes through
/// `&mut self`, sequentially.
pub struct PaperTradingEngine {
    config: PaperTradingConfig,
    risk: RiskManager,
    account: AccountState,
    ledger: StrategyLedger,
    journal: Option<CsvTradeJournal>,
}

impl PaperTradingEngine {
    /// Fresh account at the configured initial balance
    pub fn new(config: PaperTradingConfig, risk: RiskConfig) -> Self {
        let state = PersistedState::fresh(config.initial_balance);
        Self::from_state(config, risk, state)
    }

    /// Resume from loaded state. A stored balance that disagrees with the
    /// history is kept as-is and logged.
    pub fn from_state(config: PaperTradingConfig, risk: RiskConfig, state: PersistedState) -> Self {
        let PersistedState { account, ledger } = state;

        let reconciled = account.reconciled_balance(config.initial_balance);
        if (account.balance - reconciled).abs() > RECONCILE_TOLERANCE {
            warn!(
                stored = account.balance,
                reconciled,
                "⚠️ [PAPER] Stored balance does not match trade history"
            );
        }

        Self {
            config,
            risk: RiskManager::new(risk),
            account,
            ledger,
            journal: None,
        }
    }

    pub fn with_journal(mut self, journal: CsvTradeJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn config(&self) -> &PaperTradingConfig {
        &self.config
    }

    pub fn balance(&self) -> f64 {
        self.account.balance
    }

    pub fn account(&self) -> &AccountState {
        &self.account
    }

    pub fn ledger(&self) -> &StrategyLedger {
        &self.ledger
    }

    pub fn is_halted(&self) -> bool {
        self.risk.is_halted(&self.account.history)
    }

    /// State to hand to the persistence gateway
    pub fn snapshot(&self) -> PersistedState {
        PersistedState {
            account: self.account.clone(),
            ledger: self.ledger.clone(),
        }
    }

    /// One cycle: settle open trades, check the breaker, then open new ones.
    ///
    /// Exits run first so a streak completed this cycle already blocks this
    /// cycle's entries, and a trade opened now is first evaluated next cycle.
    pub async fn run_cycle(
        &mut self,
        source: &dyn MarketSource,
        prices: &dyn PriceLookup,
        now: DateTime<Utc>,
    ) -> CycleReport {
        let mut report = CycleReport::default();

        self.process_exits(prices, now, &mut report).await;

        if self.is_halted() {
            warn!(
                streak = self.risk.config().breaker_streak,
                "🛑 [PAPER] Circuit breaker active: losing streak, no new entries this cycle"
            );
            report.halted = true;
        } else {
            match source.fetch_candidates().await {
                Ok(candidates) if candidates.is_empty() => {
                    info!("📭 [PAPER] No candidate markets this cycle");
                }
                Ok(candidates) => self.open_positions(candidates, now, &mut report),
                Err(e) => {
                    warn!(error = %format!("{e:#}"), "⚠️ [PAPER] Market fetch failed, no entries this cycle");
                }
            }
        }

        report.balance = self.account.balance;
        report
    }

    /// Open path over this cycle's candidates
    pub fn open_positions(
        &mut self,
        candidates: Vec<CandidateResult>,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) {
        for candidate in candidates {
            let result = candidate
                .map_err(TradeError::from)
                .and_then(|c| self.try_open(&c, now));
            match result {
                Ok(Some(trade_id)) => report.opened.push(trade_id),
                Ok(None) => {}
                Err(e) => report.skip(e),
            }
        }
    }

    /// Open a trade on `candidate` if a strategy qualifies and the balance
    /// covers the stake. `Ok(None)` means no strategy wanted it.
    pub fn try_open(
        &mut self,
        candidate: &MarketCandidate,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, TradeError> {
        let Some(score) = select_strategy(candidate.price, candidate.volume, &self.ledger) else {
            debug!(
                market_id = %candidate.market_id,
                price = candidate.price,
                volume = candidate.volume,
                "No strategy qualifies"
            );
            return Ok(None);
        };

        if self.config.skip_open_markets && self.account.has_open_position(&candidate.market_id) {
            return Err(TradeError::DuplicatePosition {
                market_id: candidate.market_id.clone(),
            });
        }

        let balance = self.account.balance;
        let stake = self
            .risk
            .calculate_stake(candidate.volume, balance)
            .ok_or_else(|| TradeError::InsufficientBalance {
                market_id: candidate.market_id.clone(),
                balance,
            })?;

        let trade = Trade::open(score.strategy, candidate, stake, self.config.fee_rate, now);
        let trade_id = trade.id;
        self.account.balance -= stake;

        info!(
            trade_id = %trade_id,
            market_id = %trade.market_id,
            strategy = %trade.strategy,
            confidence = score.confidence,
            "📝 [PAPER] OPEN ${:.2} @ {:.3} | {} | bal ${:.2}",
            stake,
            trade.entry_price,
            trade.question,
            self.account.balance
        );

        write_journal(
            &mut self.journal,
            &TradeEventRecord::opened(&trade, self.account.balance),
        );
        self.account.history.push(trade);
        Ok(Some(trade_id))
    }

    /// Close path: price every open trade and settle those that hit an exit.
    pub async fn process_exits(
        &mut self,
        prices: &dyn PriceLookup,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) {
        let open: Vec<(Uuid, String)> = self
            .account
            .open_trades()
            .map(|t| (t.id, t.market_id.clone()))
            .collect();

        for (trade_id, market_id) in open {
            let current = match prices.current_price(&market_id).await {
                Ok(price) if price.is_finite() && (0.0..=1.0).contains(&price) => price,
                Ok(price) => {
                    report.skip(TradeError::PriceLookup {
                        trade_id,
                        market_id,
                        reason: format!("price {price} outside [0, 1]"),
                    });
                    continue;
                }
                Err(e) => {
                    report.skip(TradeError::PriceLookup {
                        trade_id,
                        market_id,
                        reason: format!("{e:#}"),
                    });
                    continue;
                }
            };

            match self.evaluate_exit(trade_id, current, now) {
                Ok(Some(settlement)) => report.closed.push(settlement),
                Ok(None) => {}
                Err(e) => report.skip(e),
            }
        }
    }

    /// Check one trade's exit triggers, price before time.
    ///
    /// Returns `Ok(None)` when neither fires or the trade is already closed,
    /// so evaluating twice settles at most once.
    pub fn evaluate_exit(
        &mut self,
        trade_id: Uuid,
        current_price: f64,
        now: DateTime<Utc>,
    ) -> Result<Option<Settlement>, TradeError> {
        let trade = self
            .account
            .history
            .iter()
            .find(|t| t.id == trade_id)
            .ok_or(TradeError::UnknownTrade { trade_id })?;
        if trade.is_closed() {
            return Ok(None);
        }

        let reason = if current_price > self.config.exit_price_threshold {
            ExitReason::PriceTarget
        } else if trade.hold_duration(now) > Duration::seconds(self.config.max_hold_secs) {
            ExitReason::TimeExpiry
        } else {
            return Ok(None);
        };

        self.close_trade(trade_id, current_price, reason, now).map(Some)
    }

    /// Settle a trade: credit the payout and record the outcome.
    pub fn close_trade(
        &mut self,
        trade_id: Uuid,
        exit_price: f64,
        reason: ExitReason,
        now: DateTime<Utc>,
    ) -> Result<Settlement, TradeError> {
        let trade = self
            .account
            .history
            .iter_mut()
            .find(|t| t.id == trade_id)
            .ok_or(TradeError::UnknownTrade { trade_id })?;
        let settlement = trade.close(exit_price, reason, now)?;

        self.account.balance += settlement.payout;
        self.ledger
            .record_outcome(settlement.strategy, settlement.profit);

        let emoji = if settlement.profit > 0.0 { "✅" } else { "❌" };
        info!(
            trade_id = %trade_id,
            market_id = %trade.market_id,
            strategy = %settlement.strategy,
            reason = %settlement.reason,
            "{} [PAPER] CLOSE @ {:.3} | payout ${:.2} | P&L ${:+.2} | bal ${:.2}",
            emoji,
            settlement.exit_price,
            settlement.payout,
            settlement.profit,
            self.account.balance
        );

        write_journal(
            &mut self.journal,
            &TradeEventRecord::closed(trade, &settlement, self.account.balance),
        );
        Ok(settlement)
    }

    pub fn summary_string(&self) -> String {
        let summary = self.ledger.summary();
        let open = self.account.open_trades().count();
        format!(
            "📋 Paper: ${:.2} bal | {}/{} ({:.0}% WR) | P&L: ${:+.2} | {} open (${:.2} locked)",
            self.account.balance,
            summary.wins,
            summary.total_closed,
            summary.win_rate() * 100.0,
            summary.total_profit,
            open,
            self.account.locked_balance()
        )
    }

    /// Log the summary line plus one line per strategy with history
    pub fn log_summary(&self, report: &CycleReport) {
        info!(
            opened = report.opened.len(),
            closed = report.closed.len(),
            skipped = report.skipped.len(),
            halted = report.halted,
            "{}",
            self.summary_string()
        );
        for (strategy, record) in self.ledger.iter() {
            info!(
                "   {:>14}: {:.1}% WR ({}/{}) P&L: ${:+.2}",
                strategy.name(),
                record.win_rate() * 100.0,
                record.wins,
                record.trades(),
                record.total_profit
            );
        }
    }
}

fn write_journal(journal: &mut Option<CsvTradeJournal>, record: &TradeEventRecord) {
    if let Some(journal) = journal.as_mut() {
        if let Err(e) = journal.append(record) {
            error!(
                path = %journal.path().display(),
                error = %format!("{e:#}"),
                "Failed to append trade journal"
            );
        }
    }
}
