//! FRED economic indicators (St. Louis Fed).

use async_trait::async_trait;
use common::{Category, Error, MarketMetrics, RawMetrics};
use serde_json::Value;
use tracing::debug;

use crate::{numeric, read_json, QuotaLimiter, SourceFetcher};

const BASE_URL: &str = "https://api.stlouisfed.org/fred/series/observations";

/// Which market input a FRED series feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FredSeriesKind {
    /// Level series (real GDP); reported as percent change between the two latest observations.
    GdpGrowth,
    /// Rate series; the latest observation is reported as-is.
    Unemployment,
}

#[derive(Debug, Clone)]
pub struct FredFetcher {
    client: reqwest::Client,
    api_key: String,
    series_id: String,
    kind: FredSeriesKind,
    limit: u32,
    limiter: QuotaLimiter,
}

impl FredFetcher {
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        series_id: String,
        kind: FredSeriesKind,
        limit: u32,
        limiter: QuotaLimiter,
    ) -> Self {
        Self {
            client,
            api_key,
            series_id,
            kind,
            limit,
            limiter,
        }
    }
}

#[async_trait]
impl SourceFetcher for FredFetcher {
    fn category(&self) -> Category {
        Category::Market
    }

    fn provider(&self) -> &'static str {
        "fred"
    }

    fn source_key(&self) -> String {
        format!("fred:{}", self.series_id)
    }

    async fn fetch(&self) -> Result<RawMetrics, Error> {
        let key = self.source_key();
        if self.api_key.trim().is_empty() {
            return Err(Error::unavailable(key, "FRED_API_KEY not set"));
        }
        if !self.limiter.try_acquire() {
            return Err(Error::RateLimited { source_key: key });
        }

        debug!("Fetching FRED series {}", self.series_id);

        let limit = self.limit.to_string();
        let resp = self
            .client
            .get(BASE_URL)
            .query(&[
                ("series_id", self.series_id.as_str()),
                ("api_key", self.api_key.as_str()),
                ("file_type", "json"),
                ("limit", limit.as_str()),
                ("sort_order", "desc"),
            ])
            .send()
            .await
            .map_err(|e| Error::unavailable(&key, format!("HTTP error: {e}")))?;

        let body = read_json(resp, &key).await?;
        let values = observation_values(&body, &key)?;
        let metrics = match self.kind {
            FredSeriesKind::GdpGrowth => MarketMetrics {
                gdp_growth: Some(
                    growth_percent(&values)
                        .ok_or_else(|| Error::malformed(&key, "need two positive observations"))?,
                ),
                ..Default::default()
            },
            FredSeriesKind::Unemployment => MarketMetrics {
                unemployment: Some(
                    *values
                        .first()
                        .ok_or_else(|| Error::malformed(&key, "no observations"))?,
                ),
                ..Default::default()
            },
        };

        debug!("{}: {:?}", key, metrics);
        Ok(RawMetrics::Market(metrics))
    }
}

/// Numeric observation values, newest first. FRED marks gaps with `"."`.
pub fn observation_values(body: &Value, source_key: &str) -> Result<Vec<f64>, Error> {
    let observations = body
        .get("observations")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::malformed(source_key, "missing observations"))?;

    Ok(observations
        .iter()
        .filter_map(|o| o.get("value").and_then(numeric))
        .collect())
}

/// Percent change from the second-newest to the newest value.
pub fn growth_percent(values: &[f64]) -> Option<f64> {
    match values {
        [recent, previous, ..] if *previous > 0.0 => Some((recent - previous) / previous * 100.0),
        _ => None,
    }
}
