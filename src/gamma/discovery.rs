//! Market Discovery - candidate selection for the paper trader
//!
//! Pulls one page of open markets from Gamma and keeps the liquid crypto
//! markets whose question is worded in the "up" direction, capped at a
//! handful per cycle.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use super::rest::GammaClient;
use super::types::MarketResponse;
use crate::traits::{CandidateResult, MarketSource};
use crate::types::MarketCandidate;

/// Candidate filter settings
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Page size requested from Gamma
    pub fetch_limit: usize,
    /// Candidates handed to the engine per cycle
    pub max_candidates: usize,
    /// Liquidity must be strictly above this
    pub min_liquidity: f64,
    /// Question must mention one of these (lower-case substring match)
    pub topic_keywords: Vec<String>,
    /// Question must contain one of these (lower-case substring match)
    pub direction_keywords: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            fetch_limit: 200,
            max_candidates: 3,
            min_liquidity: 10_000.0,
            topic_keywords: ["bitcoin", "ethereum", "solana"]
                .map(String::from)
                .to_vec(),
            direction_keywords: ["above", "up", "increase", "higher"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl DiscoveryConfig {
    /// Topical, liquid and directionally worded. Records missing any field
    /// the engine needs, or with unreadable liquidity or volume, do not
    /// qualify and never take a candidate slot.
    fn is_relevant(&self, market: &MarketResponse) -> bool {
        let has_fields = market.market_id().is_some()
            && market.question.is_some()
            && market.outcome_prices.is_some()
            && market.liquidity_num.is_some()
            && market.volume_num.is_some();
        if !has_fields || market.closed == Some(true) {
            return false;
        }

        let question = market.question.as_deref().unwrap_or_default().to_lowercase();
        let on_topic = self
            .topic_keywords
            .iter()
            .any(|k| question.contains(k.as_str()));
        let directional = self
            .direction_keywords
            .iter()
            .any(|k| question.contains(k.as_str()));
        let liquid = market
            .liquidity()
            .map(|liq| liq > self.min_liquidity)
            .unwrap_or(false);
        let has_volume = market.volume().is_ok();

        on_topic && liquid && directional && has_volume
    }

    /// Apply the filter and cap, converting survivors to candidates.
    pub fn select(&self, markets: Vec<MarketResponse>) -> Vec<CandidateResult> {
        markets
            .into_iter()
            .filter(|m| {
                let keep = self.is_relevant(m);
                if !keep {
                    debug!(
                        market_id = %m.market_id().unwrap_or_default(),
                        "⏭️ Skipping market outside candidate filter"
                    );
                }
                keep
            })
            .take(self.max_candidates)
            .map(MarketCandidate::try_from)
            .collect()
    }
}

/// Market source backed by the Gamma API
pub struct MarketDiscovery {
    client: GammaClient,
    config: DiscoveryConfig,
}

impl MarketDiscovery {
    pub fn new(client: GammaClient, config: DiscoveryConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl MarketSource for MarketDiscovery {
    async fn fetch_candidates(&self) -> Result<Vec<CandidateResult>> {
        let markets = self
            .client
            .get_markets_page(self.config.fetch_limit, 0)
            .await?;
        let fetched = markets.len();
        let candidates = self.config.select(markets);
        info!(
            fetched,
            candidates = candidates.len(),
            "🎯 Candidate markets selected"
        );
        Ok(candidates)
    }
}
