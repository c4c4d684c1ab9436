//! Gamma REST API Client
//!
//! Read-only market listing and single-market lookup against
//! https://gamma-api.polymarket.com

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::types::MarketResponse;
use crate::traits::PriceLookup;

/// HTTP client for the Gamma markets API
#[derive(Debug, Clone)]
pub struct GammaClient {
    client: Client,
    gamma_url: String,
}

impl GammaClient {
    pub fn new(gamma_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            gamma_url: gamma_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get a single page of open markets.
    ///
    /// Records that do not deserialize are dropped individually.
    pub async fn get_markets_page(&self, limit: usize, offset: usize) -> Result<Vec<MarketResponse>> {
        let url = format!(
            "{}/markets?closed=false&limit={}&offset={}",
            self.gamma_url,
            limit.max(1),
            offset
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch markets")?;

        if !response.status().is_success() {
            bail!("Failed to get markets: {}", response.status());
        }

        let raw: Vec<Value> = response
            .json()
            .await
            .context("Failed to parse markets response")?;

        let total = raw.len();
        let markets: Vec<MarketResponse> = raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(market) => Some(market),
                Err(e) => {
                    debug!(error = %e, "Skipping undecodable market record");
                    None
                }
            })
            .collect();
        debug!(total, decoded = markets.len(), "Fetched markets page");
        Ok(markets)
    }

    /// Get market by id
    pub async fn get_market(&self, market_id: &str) -> Result<MarketResponse> {
        let url = format!("{}/markets/{}", self.gamma_url, market_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch market")?;

        if !response.status().is_success() {
            bail!("Failed to get market {}: {}", market_id, response.status());
        }

        response
            .json()
            .await
            .context("Failed to parse market response")
    }
}

/// Current prices straight from Gamma, one request per market
#[derive(Debug, Clone)]
pub struct GammaPriceLookup {
    client: GammaClient,
}

impl GammaPriceLookup {
    pub fn new(client: GammaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PriceLookup for GammaPriceLookup {
    async fn current_price(&self, market_id: &str) -> Result<f64> {
        let market = self.client.get_market(market_id).await?;
        let price = market.first_outcome_price()?;
        if !(0.0..=1.0).contains(&price) {
            bail!("Price {} for market {} outside [0, 1]", price, market_id);
        }
        Ok(price)
    }
}
