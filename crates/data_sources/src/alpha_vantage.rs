//! Alpha Vantage equity quote (25 calls/day on the free tier).

use async_trait::async_trait;
use common::{Category, Error, MarketMetrics, RawMetrics};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{read_json, QuotaLimiter, SourceFetcher};

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Daily percent change of one symbol, used as the market volatility input.
#[derive(Debug, Clone)]
pub struct AlphaVantageFetcher {
    client: reqwest::Client,
    api_key: String,
    symbol: String,
    limiter: QuotaLimiter,
}

impl AlphaVantageFetcher {
    pub fn new(client: reqwest::Client, api_key: String, symbol: String, limiter: QuotaLimiter) -> Self {
        Self {
            client,
            api_key,
            symbol,
            limiter,
        }
    }
}

#[async_trait]
impl SourceFetcher for AlphaVantageFetcher {
    fn category(&self) -> Category {
        Category::Market
    }

    fn provider(&self) -> &'static str {
        "alpha_vantage"
    }

    fn source_key(&self) -> String {
        format!("alpha_vantage:{}", self.symbol)
    }

    async fn fetch(&self) -> Result<RawMetrics, Error> {
        let key = self.source_key();
        if self.api_key.trim().is_empty() {
            return Err(Error::unavailable(key, "ALPHA_VANTAGE_API_KEY not set"));
        }
        if !self.limiter.try_acquire() {
            return Err(Error::RateLimited { source_key: key });
        }

        debug!("Fetching Alpha Vantage quote for {}", self.symbol);

        let resp = self
            .client
            .get(BASE_URL)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", self.symbol.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::unavailable(&key, format!("HTTP error: {e}")))?;

        let body = read_json(resp, &key).await?;
        let metrics = parse_global_quote(&body, &key)?;
        Ok(RawMetrics::Market(metrics))
    }
}

/// Extract `stock_change` from a `GLOBAL_QUOTE` body.
///
/// Alpha Vantage answers quota exhaustion with HTTP 200 and a `Note` or
/// `Information` field, so those are mapped to `RateLimited` here.
pub fn parse_global_quote(body: &Value, source_key: &str) -> Result<MarketMetrics, Error> {
    if let Some(note) = body.get("Note").or_else(|| body.get("Information")) {
        warn!("Alpha Vantage throttled {}: {}", source_key, note);
        return Err(Error::RateLimited {
            source_key: source_key.to_string(),
        });
    }
    if let Some(msg) = body.get("Error Message").and_then(Value::as_str) {
        return Err(Error::unavailable(source_key, msg));
    }

    let quote = body
        .get("Global Quote")
        .and_then(Value::as_object)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| Error::malformed(source_key, "missing Global Quote"))?;

    let raw = quote
        .get("10. change percent")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::malformed(source_key, "missing change percent"))?;

    let change = raw
        .trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .map_err(|_| Error::malformed(source_key, format!("bad change percent {raw:?}")))?;

    debug!("{}: change={:.2}%", source_key, change);

    Ok(MarketMetrics {
        stock_change: Some(change),
        ..Default::default()
    })
}
