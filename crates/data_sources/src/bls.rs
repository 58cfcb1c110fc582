//! Bureau of Labor Statistics timeseries (500 queries/day, no key needed).

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use common::{Category, Error, HrMetrics, RawMetrics};
use serde_json::{json, Value};
use tracing::debug;

use crate::{numeric, read_json, QuotaLimiter, SourceFetcher};

const BASE_URL: &str = "https://api.bls.gov/publicAPI/v2/timeseries/data/";
/// Years of history requested, ending with the current year.
const YEAR_WINDOW: i32 = 5;

#[derive(Debug, Clone)]
pub struct BlsFetcher {
    client: reqwest::Client,
    series_id: String,
    limiter: QuotaLimiter,
}

impl BlsFetcher {
    pub fn new(client: reqwest::Client, series_id: String, limiter: QuotaLimiter) -> Self {
        Self {
            client,
            series_id,
            limiter,
        }
    }
}

#[async_trait]
impl SourceFetcher for BlsFetcher {
    fn category(&self) -> Category {
        Category::Hr
    }

    fn provider(&self) -> &'static str {
        "bls"
    }

    fn source_key(&self) -> String {
        format!("bls:{}", self.series_id)
    }

    async fn fetch(&self) -> Result<RawMetrics, Error> {
        let key = self.source_key();
        if !self.limiter.try_acquire() {
            return Err(Error::RateLimited { source_key: key });
        }

        let end_year = Utc::now().year();
        let payload = json!({
            "seriesid": [self.series_id],
            "startyear": (end_year - YEAR_WINDOW + 1).to_string(),
            "endyear": end_year.to_string(),
        });

        debug!("Fetching BLS series {}", self.series_id);

        let resp = self
            .client
            .post(BASE_URL)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::unavailable(&key, format!("HTTP error: {e}")))?;

        let body = read_json(resp, &key).await?;
        Ok(RawMetrics::Hr(parse_timeseries(&body, &key)?))
    }
}

/// Latest unemployment rate and its change from the previous period.
/// BLS lists data points newest first.
pub fn parse_timeseries(body: &Value, source_key: &str) -> Result<HrMetrics, Error> {
    let status = body.get("status").and_then(Value::as_str).unwrap_or_default();
    if status != "REQUEST_SUCCEEDED" {
        let message = body
            .get("message")
            .map(|m| m.to_string())
            .unwrap_or_else(|| status.to_string());
        if message.to_ascii_lowercase().contains("threshold") {
            return Err(Error::RateLimited {
                source_key: source_key.to_string(),
            });
        }
        return Err(Error::unavailable(source_key, message));
    }

    let data = body
        .pointer("/Results/series/0/data")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::malformed(source_key, "missing Results.series[0].data"))?;

    let values: Vec<f64> = data
        .iter()
        .filter_map(|d| d.get("value").and_then(numeric))
        .collect();

    let metrics = HrMetrics {
        unemployment_rate: values.first().copied(),
        rate_change: match values.as_slice() {
            [recent, previous, ..] => Some(recent - previous),
            _ => None,
        },
    };

    debug!("{}: {:?}", source_key, metrics);
    Ok(metrics)
}
