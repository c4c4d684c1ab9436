//! PolyPaper - one paper-trading cycle per invocation
//!
//! Load state, settle open trades, open new ones, save. Scheduling between
//! runs is left to cron or a similar external trigger.

use anyhow::Result;
use chrono::Utc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use polypaper::config::AppConfig;
use polypaper::gamma::{DiscoveryConfig, GammaClient, GammaPriceLookup, MarketDiscovery};
use polypaper::paper_trading::{PaperTradingConfig, PaperTradingEngine};
use polypaper::persistence::{CsvTradeJournal, JsonStateStore};
use polypaper::risk::RiskConfig;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("POLYPAPER_LOG_JSON")
        .map(|v| v == "1")
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // .env must be read before the log filter is built
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::load()?;
    info!("🚀 PolyPaper starting: {}", config);

    let paper_config = PaperTradingConfig::from(&config);
    let risk_config = RiskConfig::from(&config);

    let store = JsonStateStore::new(config.data_dir(), paper_config.initial_balance);
    let state = store.load();

    let mut engine = PaperTradingEngine::from_state(paper_config, risk_config, state);
    if config.persistence.csv_enabled {
        match CsvTradeJournal::open(store.data_dir()) {
            Ok(journal) => engine = engine.with_journal(journal),
            Err(e) => warn!(error = %format!("{e:#}"), "Trade journal disabled"),
        }
    }

    let client = GammaClient::new(&config.market_source.gamma_url, config.http_timeout())?;
    let source = MarketDiscovery::new(client.clone(), DiscoveryConfig::from(&config));
    let prices = GammaPriceLookup::new(client);

    let report = engine.run_cycle(&source, &prices, Utc::now()).await;

    if let Err(e) = store.save(&engine.snapshot()) {
        error!(error = %format!("{e:#}"), "❌ Failed to save paper state");
    }
    engine.log_summary(&report);

    Ok(())
}
