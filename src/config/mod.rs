//! Configuration management for PolyPaper
//!
//! Defaults, then optional `config/default` and `config/local` files, then
//! `POLYPAPER__*` environment variables. The binary loads `.env` before
//! calling [`AppConfig::load`].

use anyhow::{bail, Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::gamma::DiscoveryConfig;
use crate::paper_trading::PaperTradingConfig;
use crate::risk::RiskConfig;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub market_source: MarketSourceConfig,
    pub paper_trading: PaperTradingCfg,
    pub risk: RiskCfg,
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Version tag for logging
    pub tag: String,
    /// Always true: trades are simulated
    pub dry_run: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketSourceConfig {
    /// Gamma API endpoint
    pub gamma_url: String,
    /// Markets requested per fetch
    pub fetch_limit: usize,
    /// Candidates kept per cycle
    pub max_candidates: usize,
    /// Liquidity floor (exclusive)
    pub min_liquidity: f64,
    pub topic_keywords: Vec<String>,
    pub direction_keywords: Vec<String>,
    /// HTTP timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaperTradingCfg {
    /// Starting virtual balance in USDC
    pub initial_balance: f64,
    /// Fee as a fraction of stake
    pub fee_rate: f64,
    /// Price above which an open trade pays out
    pub exit_price_threshold: f64,
    /// Max hold before a trade expires worthless
    pub max_hold_secs: i64,
    /// Skip markets that already have an open trade
    pub skip_open_markets: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskCfg {
    pub low_volume_stake: f64,
    pub high_volume_stake: f64,
    pub volume_threshold: f64,
    pub breaker_lookback: usize,
    pub breaker_streak: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Data directory
    pub data_dir: String,
    /// Enable CSV trade journal
    pub csv_enabled: bool,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        let config = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (POLYPAPER__*)
            .add_source(
                Environment::with_prefix("POLYPAPER")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("market_source.topic_keywords")
                    .with_list_parse_key("market_source.direction_keywords"),
            )
            .build()
            .context("Failed to build configuration")?;

        Self::from_config(config)
    }

    /// Built-in defaults only, no files or environment
    pub fn from_defaults() -> Result<Self> {
        let config = Self::defaults()?
            .build()
            .context("Failed to build configuration")?;
        Self::from_config(config)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        let builder = Config::builder()
            .set_default("bot.tag", env!("CARGO_PKG_VERSION"))?
            .set_default("bot.dry_run", true)?
            // Market source defaults
            .set_default("market_source.gamma_url", "https://gamma-api.polymarket.com")?
            .set_default("market_source.fetch_limit", 200)?
            .set_default("market_source.max_candidates", 3)?
            .set_default("market_source.min_liquidity", 10_000.0)?
            .set_default(
                "market_source.topic_keywords",
                vec!["bitcoin", "ethereum", "solana"],
            )?
            .set_default(
                "market_source.direction_keywords",
                vec!["above", "up", "increase", "higher"],
            )?
            .set_default("market_source.timeout_secs", 10)?
            // Paper trading defaults
            .set_default("paper_trading.initial_balance", 100.0)?
            .set_default("paper_trading.fee_rate", 0.02)?
            .set_default("paper_trading.exit_price_threshold", 0.60)?
            .set_default("paper_trading.max_hold_secs", 3600)?
            .set_default("paper_trading.skip_open_markets", false)?
            // Risk defaults
            .set_default("risk.low_volume_stake", 5.0)?
            .set_default("risk.high_volume_stake", 10.0)?
            .set_default("risk.volume_threshold", 100_000.0)?
            .set_default("risk.breaker_lookback", 10)?
            .set_default("risk.breaker_streak", 3)?
            // Persistence defaults
            .set_default("persistence.data_dir", "./data")?
            .set_default("persistence.csv_enabled", true)?;
        Ok(builder)
    }

    fn from_config(config: Config) -> Result<Self> {
        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if !self.bot.dry_run {
            bail!("bot.dry_run must be true: only paper trading is supported");
        }
        let pt = &self.paper_trading;
        if !(pt.initial_balance.is_finite() && pt.initial_balance >= 0.0) {
            bail!("paper_trading.initial_balance must be >= 0");
        }
        if !(0.0..1.0).contains(&pt.fee_rate) {
            bail!("paper_trading.fee_rate must be in [0, 1)");
        }
        if !(0.0..1.0).contains(&pt.exit_price_threshold) {
            bail!("paper_trading.exit_price_threshold must be in [0, 1)");
        }
        if pt.max_hold_secs < 0 {
            bail!("paper_trading.max_hold_secs must be >= 0");
        }
        if self.risk.low_volume_stake <= 0.0 || self.risk.high_volume_stake <= 0.0 {
            bail!("risk stakes must be positive");
        }
        if self.market_source.timeout_secs == 0 {
            bail!("market_source.timeout_secs must be positive");
        }
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.persistence.data_dir)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.market_source.timeout_secs)
    }

    /// Generate a digest of the config (without secrets) for logging
    pub fn digest(&self) -> String {
        format!(
            "bot={} dry_run={} gamma={} candidates={} balance0={:.2} fee={:.3} exit>{:.2} hold={}s stakes={:.2}/{:.2} breaker={}/{} data_dir={}",
            self.bot.tag,
            self.bot.dry_run,
            self.market_source.gamma_url,
            self.market_source.max_candidates,
            self.paper_trading.initial_balance,
            self.paper_trading.fee_rate,
            self.paper_trading.exit_price_threshold,
            self.paper_trading.max_hold_secs,
            self.risk.low_volume_stake,
            self.risk.high_volume_stake,
            self.risk.breaker_streak,
            self.risk.breaker_lookback,
            self.persistence.data_dir
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}

impl From<&AppConfig> for PaperTradingConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            initial_balance: cfg.paper_trading.initial_balance,
            fee_rate: cfg.paper_trading.fee_rate,
            exit_price_threshold: cfg.paper_trading.exit_price_threshold,
            max_hold_secs: cfg.paper_trading.max_hold_secs,
            skip_open_markets: cfg.paper_trading.skip_open_markets,
        }
    }
}

impl From<&AppConfig> for RiskConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            low_volume_stake: cfg.risk.low_volume_stake,
            high_volume_stake: cfg.risk.high_volume_stake,
            volume_threshold: cfg.risk.volume_threshold,
            breaker_lookback: cfg.risk.breaker_lookback,
            breaker_streak: cfg.risk.breaker_streak,
        }
    }
}

impl From<&AppConfig> for DiscoveryConfig {
    fn from(cfg: &AppConfig) -> Self {
        let lower = |words: &[String]| -> Vec<String> {
            words.iter().map(|w| w.trim().to_lowercase()).collect()
        };
        Self {
            fetch_limit: cfg.market_source.fetch_limit,
            max_candidates: cfg.market_source.max_candidates,
            min_liquidity: cfg.market_source.min_liquidity,
            topic_keywords: lower(&cfg.market_source.topic_keywords),
            direction_keywords: lower(&cfg.market_source.direction_keywords),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_defaults() {
        let cfg = AppConfig::from_defaults().unwrap();
        assert!(cfg.bot.dry_run);
        assert_eq!(cfg.persistence.data_dir, "./data");
        assert!(cfg.persistence.csv_enabled);
        assert_eq!(cfg.http_timeout(), Duration::from_secs(10));

        let paper = PaperTradingConfig::from(&cfg);
        let default_paper = PaperTradingConfig::default();
        assert_eq!(paper.initial_balance, default_paper.initial_balance);
        assert_eq!(paper.fee_rate, default_paper.fee_rate);
        assert_eq!(paper.exit_price_threshold, default_paper.exit_price_threshold);
        assert_eq!(paper.max_hold_secs, default_paper.max_hold_secs);
        assert_eq!(paper.skip_open_markets, default_paper.skip_open_markets);
        assert!(!paper.skip_open_markets);

        let risk = RiskConfig::from(&cfg);
        let default_risk = RiskConfig::default();
        assert_eq!(risk.low_volume_stake, default_risk.low_volume_stake);
        assert_eq!(risk.high_volume_stake, default_risk.high_volume_stake);
        assert_eq!(risk.volume_threshold, default_risk.volume_threshold);
        assert_eq!(risk.breaker_lookback, default_risk.breaker_lookback);
        assert_eq!(risk.breaker_streak, default_risk.breaker_streak);

        let discovery = DiscoveryConfig::from(&cfg);
        let default_discovery = DiscoveryConfig::default();
        assert_eq!(discovery.fetch_limit, default_discovery.fetch_limit);
        assert_eq!(discovery.max_candidates, default_discovery.max_candidates);
        assert_eq!(discovery.topic_keywords, default_discovery.topic_keywords);
        assert_eq!(discovery.direction_keywords, default_discovery.direction_keywords);
    }

    #[test]
    fn digest_has_key_settings() {
        let cfg = AppConfig::from_defaults().unwrap();
        let digest = cfg.to_string();
        assert!(digest.contains("dry_run=true"));
        assert!(digest.contains("breaker=3/10"));
        assert!(digest.contains("data_dir=./data"));
    }

    #[test]
    fn rejects_live_trading_and_bad_fees() {
        let mut cfg = AppConfig::from_defaults().unwrap();
        cfg.bot.dry_run = false;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::from_defaults().unwrap();
        cfg.paper_trading.fee_rate = 1.5;
        assert!(cfg.validate().is_err());
    }
}
