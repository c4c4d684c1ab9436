//! Gamma API response types
//!
//! Every field is optional: a record with missing or oddly-typed data must
//! be skippable on its own, not fail the whole page.

use serde::Deserialize;
use serde_json::Value;

use crate::error::CandidateError;
use crate::types::MarketCandidate;

/// Market record from `GET /markets`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketResponse {
    /// String in practice; numbers are tolerated
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub question: Option<String>,
    /// JSON string like "[\"0.12\", \"0.88\"]", or a plain array
    #[serde(default)]
    pub outcome_prices: Option<Value>,
    #[serde(default)]
    pub liquidity_num: Option<Value>,
    #[serde(default)]
    pub volume_num: Option<Value>,
    #[serde(default)]
    pub closed: Option<bool>,
}

impl MarketResponse {
    /// Market id as a string, if present
    pub fn market_id(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn liquidity(&self) -> Result<f64, CandidateError> {
        let id = self.market_id().unwrap_or_default();
        numeric_field(&id, "liquidityNum", self.liquidity_num.as_ref())
    }

    pub fn volume(&self) -> Result<f64, CandidateError> {
        let id = self.market_id().unwrap_or_default();
        numeric_field(&id, "volumeNum", self.volume_num.as_ref())
    }

    /// First outcome price (the tracked outcome)
    pub fn first_outcome_price(&self) -> Result<f64, CandidateError> {
        let id = self.market_id().unwrap_or_default();
        let raw = self
            .outcome_prices
            .as_ref()
            .ok_or_else(|| missing(&id, "outcomePrices"))?;

        let prices = match raw {
            Value::Array(items) => items.clone(),
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(Value::Array(items)) => items,
                _ => return Err(non_numeric(&id, "outcomePrices", raw)),
            },
            other => return Err(non_numeric(&id, "outcomePrices", other)),
        };

        let first = prices
            .first()
            .ok_or_else(|| missing(&id, "outcomePrices"))?;
        numeric_field(&id, "outcomePrices", Some(first))
    }
}

impl TryFrom<MarketResponse> for MarketCandidate {
    type Error = CandidateError;

    fn try_from(market: MarketResponse) -> Result<Self, Self::Error> {
        let id = market
            .market_id()
            .ok_or_else(|| missing("<unknown>", "id"))?;
        let question = market
            .question
            .clone()
            .ok_or_else(|| missing(&id, "question"))?;
        let price = market.first_outcome_price()?;
        let liquidity = market.liquidity()?;
        let volume = market.volume()?;
        MarketCandidate::new(id, question, price, liquidity, volume)
    }
}

/// Number or numeric string
fn numeric_field(
    market_id: &str,
    field: &'static str,
    value: Option<&Value>,
) -> Result<f64, CandidateError> {
    let value = value.ok_or_else(|| missing(market_id, field))?;
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null => return Err(missing(market_id, field)),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(non_numeric(market_id, field, value)),
    }
}

fn missing(market_id: &str, field: &'static str) -> CandidateError {
    CandidateError::MissingField {
        market_id: market_id.to_string(),
        field,
    }
}

fn non_numeric(market_id: &str, field: &'static str, value: &Value) -> CandidateError {
    CandidateError::NonNumeric {
        market_id: market_id.to_string(),
        field,
        value: value.to_string(),
    }
}
