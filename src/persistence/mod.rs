//! Persistence Module
//!
//! Durable state between cycles: three JSON documents (balance, trade
//! history, strategy stats) replaced atomically, plus an append-only CSV
//! journal of trade events for analysis.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::strategy::StrategyLedger;
use crate::types::{AccountState, Settlement, Trade};

pub const BALANCE_FILE: &str = "paper_balance.json";
pub const HISTORY_FILE: &str = "trade_history.json";
pub const STATS_FILE: &str = "strategy_stats.json";
pub const JOURNAL_FILE: &str = "trades.csv";

/// Account state and ledger as loaded at the start of a cycle
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedState {
    pub account: AccountState,
    pub ledger: StrategyLedger,
}

impl PersistedState {
    pub fn fresh(initial_balance: f64) -> Self {
        Self {
            account: AccountState::new(initial_balance),
            ledger: StrategyLedger::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct BalanceDoc {
    balance: f64,
}

/// JSON state store rooted at a data directory
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    data_dir: PathBuf,
    initial_balance: f64,
}

impl JsonStateStore {
    pub fn new(data_dir: impl Into<PathBuf>, initial_balance: f64) -> Self {
        Self {
            data_dir: data_dir.into(),
            initial_balance,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Load all three documents. Each one falls back to its default
    /// (initial balance, empty history, empty stats) independently when
    /// missing or unreadable. Unreadable trade records are dropped one by
    /// one; any document that lost data is first copied to a `.corrupt`
    /// sibling so the next save cannot destroy it.
    pub fn load(&self) -> PersistedState {
        let balance = self
            .read_document::<BalanceDoc>(BALANCE_FILE)
            .map(|doc| doc.balance)
            .filter(|b| b.is_finite())
            .unwrap_or(self.initial_balance);
        let history = self.read_history();
        let ledger = self
            .read_document::<StrategyLedger>(STATS_FILE)
            .unwrap_or_default();

        info!(
            path = %self.data_dir.display(),
            balance = %format!("${:.2}", balance),
            trades = history.len(),
            "💾 [PAPER] State loaded"
        );

        PersistedState {
            account: AccountState { balance, history },
            ledger,
        }
    }

    /// Write every document to a `.tmp` sibling, then rename each over its
    /// canonical path. A crash leaves either the old or the new file, never
    /// a partial one.
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        fs::create_dir_all(&self.data_dir).with_context(|| {
            format!("Failed to create data directory {}", self.data_dir.display())
        })?;

        let balance = BalanceDoc {
            balance: state.account.balance,
        };
        let staged = [
            self.stage(BALANCE_FILE, &balance)?,
            self.stage(HISTORY_FILE, &state.account.history)?,
            self.stage(STATS_FILE, &state.ledger)?,
        ];

        for (tmp, target) in &staged {
            fs::rename(tmp, target).with_context(|| {
                format!("Failed to replace {} with {}", target.display(), tmp.display())
            })?;
        }

        info!(
            path = %self.data_dir.display(),
            balance = %format!("${:.2}", state.account.balance),
            trades = state.account.history.len(),
            "💾 [PAPER] State saved"
        );
        Ok(())
    }

    fn stage<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(PathBuf, PathBuf)> {
        let target = self.data_dir.join(name);
        let tmp = self.data_dir.join(format!("{name}.tmp"));
        let json = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize {name}"))?;
        fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        Ok((tmp, target))
    }

    fn read_history(&self) -> Vec<Trade> {
        let Some(entries) = self.read_document::<Vec<serde_json::Value>>(HISTORY_FILE) else {
            return Vec::new();
        };
        let total = entries.len();
        let history: Vec<Trade> = entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match serde_json::from_value(entry) {
                Ok(trade) => Some(trade),
                Err(e) => {
                    warn!(index, error = %e, "Skipping unreadable trade record");
                    None
                }
            })
            .collect();

        if history.len() < total {
            warn!(
                kept = history.len(),
                dropped = total - history.len(),
                "⚠️ [PAPER] Trade history partially unreadable"
            );
            self.preserve_corrupt(HISTORY_FILE);
        }
        history
    }

    /// Copy a document to `<name>.corrupt` before its data is replaced.
    fn preserve_corrupt(&self, name: &str) {
        let path = self.data_dir.join(name);
        let backup = self.data_dir.join(format!("{name}.corrupt"));
        match fs::copy(&path, &backup) {
            Ok(_) => warn!(backup = %backup.display(), "Kept copy of unreadable state file"),
            Err(e) => error!(
                path = %path.display(),
                error = %e,
                "Failed to back up unreadable state file"
            ),
        }
    }

    fn read_document<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.data_dir.join(name);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No state file found, using default");
                return None;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable state file, using default");
                return None;
            }
        };
        match serde_json::from_str(&json) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt state file, using default");
                self.preserve_corrupt(name);
                None
            }
        }
    }
}

/// One row of the trade journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEventRecord {
    pub timestamp: DateTime<Utc>,
    /// OPEN or CLOSE
    pub event: String,
    pub trade_id: String,
    pub market_id: String,
    pub strategy: String,
    pub entry_price: f64,
    pub stake: f64,
    pub fees: f64,
    pub exit_price: Option<f64>,
    pub payout: Option<f64>,
    pub profit: Option<f64>,
    pub exit_reason: Option<String>,
    pub result: Option<String>,
    pub balance_after: f64,
}

impl TradeEventRecord {
    pub fn opened(trade: &Trade, balance_after: f64) -> Self {
        Self {
            timestamp: trade.timestamp,
            event: "OPEN".to_string(),
            trade_id: trade.id.to_string(),
            market_id: trade.market_id.clone(),
            strategy: trade.strategy.to_string(),
            entry_price: trade.entry_price,
            stake: trade.stake,
            fees: trade.fees,
            exit_price: None,
            payout: None,
            profit: None,
            exit_reason: None,
            result: None,
            balance_after,
        }
    }

    pub fn closed(trade: &Trade, settlement: &Settlement, balance_after: f64) -> Self {
        Self {
            timestamp: settlement.closed_at,
            event: "CLOSE".to_string(),
            trade_id: trade.id.to_string(),
            market_id: trade.market_id.clone(),
            strategy: trade.strategy.to_string(),
            entry_price: trade.entry_price,
            stake: trade.stake,
            fees: trade.fees,
            exit_price: Some(settlement.exit_price),
            payout: Some(settlement.payout),
            profit: Some(settlement.profit),
            exit_reason: Some(settlement.reason.to_string()),
            result: Some(classify_trade_result(settlement.profit).to_string()),
            balance_after,
        }
    }
}

/// Append-only CSV journal of trade events
pub struct CsvTradeJournal {
    path: PathBuf,
    writer: csv::Writer<fs::File>,
}

impl CsvTradeJournal {
    /// Open `trades.csv` in `data_dir`, writing headers only if the file is new or empty.
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir).context("Failed to create data directory")?;
        let path = data_dir.join(JOURNAL_FILE);
        let file_has_data =
            path.exists() && fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context("Failed to open CSV file")?;

        let writer = WriterBuilder::new()
            .has_headers(!file_has_data)
            .from_writer(file);

        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, record: &TradeEventRecord) -> Result<()> {
        self.writer
            .serialize(record)
            .context("Failed to write trade record")?;
        self.writer
            .flush()
            .context("Failed to flush trade writer")?;
        Ok(())
    }
}

/// WIN for positive profit, LOSS otherwise (matching the ledger)
pub fn classify_trade_result(profit: f64) -> &'static str {
    if profit > 0.0 {
        "WIN"
    } else {
        "LOSS"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExitReason, MarketCandidate, StrategyKind};

    fn temp_data_dir(test_name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "polypaper_persistence_{}_{}",
            test_name,
            uuid::Uuid::new_v4()
        ))
    }

    fn sample_state() -> PersistedState {
        let candidate =
            MarketCandidate::new("512", "Will Bitcoin go above $90k?", 0.20, 15_000.0, 40_000.0)
                .unwrap();
        let mut state = PersistedState::fresh(100.0);
        let mut closed =
            Trade::open(StrategyKind::MeanReversion, &candidate, 5.0, 0.02, Utc::now());
        let settlement = closed.close(0.65, ExitReason::PriceTarget, Utc::now()).unwrap();
        state.ledger.record_outcome(settlement.strategy, settlement.profit);
        let open = Trade::open(StrategyKind::Momentum, &candidate, 5.0, 0.02, Utc::now());
        state.account.history = vec![closed, open];
        state.account.balance = 100.0 - 10.0 + settlement.payout;
        state
    }

    #[test]
    fn load_missing_directory_returns_defaults() {
        let data_dir = temp_data_dir("missing");
        let store = JsonStateStore::new(&data_dir, 100.0);
        let state = store.load();
        assert_eq!(state, PersistedState::fresh(100.0));
    }

    #[test]
    fn save_then_load_restores_state() {
        let data_dir = temp_data_dir("restore");
        let store = JsonStateStore::new(&data_dir, 100.0);
        let state = sample_state();

        store.save(&state).unwrap();
        let loaded = store.load();
        assert_eq!(loaded, state);

        for name in [BALANCE_FILE, HISTORY_FILE, STATS_FILE] {
            assert!(data_dir.join(name).exists(), "missing {name}");
            assert!(!data_dir.join(format!("{name}.tmp")).exists(), "leftover tmp for {name}");
        }

        let _ = fs::remove_dir_all(&data_dir);
    }

    #[test]
    fn corrupt_document_falls_back_independently() {
        let data_dir = temp_data_dir("corrupt");
        let store = JsonStateStore::new(&data_dir, 100.0);
        let state = sample_state();
        store.save(&state).unwrap();

        fs::write(data_dir.join(HISTORY_FILE), "[{\"timestamp\": ").unwrap();
        let loaded = store.load();

        assert_eq!(loaded.account.balance, state.account.balance);
        assert!(loaded.account.history.is_empty());
        assert_eq!(loaded.ledger, state.ledger);

        store.save(&loaded).unwrap();
        let backup = fs::read_to_string(data_dir.join(format!("{HISTORY_FILE}.corrupt"))).unwrap();
        assert_eq!(backup, "[{\"timestamp\": ");

        let _ = fs::remove_dir_all(&data_dir);
    }

    #[test]
    fn unreadable_trade_record_skips_only_that_record() {
        let data_dir = temp_data_dir("bad_record");
        let store = JsonStateStore::new(&data_dir, 100.0);
        let state = sample_state();
        store.save(&state).unwrap();

        let mut unknown = serde_json::to_value(&state.account.history[0]).unwrap();
        unknown["strategy"] = serde_json::json!("Arbitrage");
        let mut entries: Vec<serde_json::Value> = state
            .account
            .history
            .iter()
            .map(|t| serde_json::to_value(t).unwrap())
            .collect();
        entries.insert(1, unknown);
        let original = serde_json::to_string_pretty(&entries).unwrap();
        fs::write(data_dir.join(HISTORY_FILE), &original).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.account.history, state.account.history);

        // the save that follows keeps valid trades and never loses the bad one
        store.save(&loaded).unwrap();
        let saved: Vec<serde_json::Value> =
            serde_json::from_str(&fs::read_to_string(data_dir.join(HISTORY_FILE)).unwrap())
                .unwrap();
        assert_eq!(saved.len(), 2);
        let backup = fs::read_to_string(data_dir.join(format!("{HISTORY_FILE}.corrupt"))).unwrap();
        assert_eq!(backup, original);

        let _ = fs::remove_dir_all(&data_dir);
    }

    #[test]
    fn stray_tmp_file_is_not_read() {
        let data_dir = temp_data_dir("stray_tmp");
        fs::create_dir_all(&data_dir).unwrap();
        fs::write(data_dir.join(format!("{BALANCE_FILE}.tmp")), "{\"bal").unwrap();
        fs::write(data_dir.join(BALANCE_FILE), "{\"balance\": 42.5}").unwrap();

        let state = JsonStateStore::new(&data_dir, 100.0).load();
        assert_eq!(state.account.balance, 42.5);

        let _ = fs::remove_dir_all(&data_dir);
    }

    #[test]
    fn journal_writes_header_once() {
        let data_dir = temp_data_dir("journal");
        let state = sample_state();
        let trade = &state.account.history[1];

        {
            let mut journal = CsvTradeJournal::open(&data_dir).unwrap();
            journal
                .append(&TradeEventRecord::opened(trade, 90.0))
                .unwrap();
        }
        {
            let mut journal = CsvTradeJournal::open(&data_dir).unwrap();
            journal
                .append(&TradeEventRecord::opened(trade, 85.0))
                .unwrap();
        }

        let content = fs::read_to_string(data_dir.join(JOURNAL_FILE)).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3, "unexpected journal: {content}");
        assert!(lines[0].starts_with("timestamp,event,trade_id,market_id,strategy"));
        assert_eq!(lines.iter().filter(|l| l.starts_with("timestamp")).count(), 1);

        let _ = fs::remove_dir_all(&data_dir);
    }

    #[test]
    fn classify_zero_profit_as_loss() {
        assert_eq!(classify_trade_result(0.0), "LOSS");
        assert_eq!(classify_trade_result(0.01), "WIN");
        assert_eq!(classify_trade_result(-3.0), "LOSS");
    }
}
