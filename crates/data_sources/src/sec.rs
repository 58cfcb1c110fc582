//! SEC EDGAR company-concept filings. No API key, but SEC requires a
//! descriptive User-Agent and caps clients at 10 requests/second.

use async_trait::async_trait;
use common::{Category, Error, RawMetrics, RegulatoryMetrics};
use serde_json::Value;
use tracing::debug;

use crate::{numeric, read_json, QuotaLimiter, SourceFetcher};

const BASE_URL: &str = "https://data.sec.gov/api/xbrl/companyconcept";
const TAXONOMY: &str = "us-gaap";
/// Reported values considered for revenue volatility.
const VOLATILITY_WINDOW: usize = 4;

#[derive(Debug, Clone)]
pub struct SecFetcher {
    client: reqwest::Client,
    cik: String,
    concept: String,
    limiter: QuotaLimiter,
}

impl SecFetcher {
    pub fn new(client: reqwest::Client, cik: String, concept: String, limiter: QuotaLimiter) -> Self {
        Self {
            client,
            cik,
            concept,
            limiter,
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/CIK{:0>10}/{}/{}.json",
            BASE_URL,
            self.cik.trim(),
            TAXONOMY,
            self.concept
        )
    }
}

#[async_trait]
impl SourceFetcher for SecFetcher {
    fn category(&self) -> Category {
        Category::Regulatory
    }

    fn provider(&self) -> &'static str {
        "sec"
    }

    fn source_key(&self) -> String {
        format!("sec:{}_{}", self.cik, self.concept)
    }

    async fn fetch(&self) -> Result<RawMetrics, Error> {
        let key = self.source_key();
        if !self.limiter.try_acquire() {
            return Err(Error::RateLimited { source_key: key });
        }

        let url = self.url();
        debug!("Fetching SEC company concept: {}", url);

        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::unavailable(&key, format!("HTTP error: {e}")))?;

        let body = read_json(resp, &key).await?;
        Ok(RawMetrics::Regulatory(parse_company_concept(&body, &key)?))
    }
}

/// Filing count and revenue volatility from a company-concept body.
pub fn parse_company_concept(body: &Value, source_key: &str) -> Result<RegulatoryMetrics, Error> {
    let units = body
        .get("units")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::malformed(source_key, "missing units"))?;

    let Some(facts) = units.get("USD").and_then(Value::as_array) else {
        debug!("{}: no USD facts", source_key);
        return Ok(RegulatoryMetrics::default());
    };

    let values: Vec<f64> = facts
        .iter()
        .filter_map(|f| f.get("val").and_then(numeric))
        .collect();

    let recent = &values[values.len().saturating_sub(VOLATILITY_WINDOW)..];
    let revenue_volatility = (recent.len() >= 2).then(|| coefficient_of_variation(recent));

    debug!(
        "{}: filings={} revenue_volatility={:?}",
        source_key,
        facts.len(),
        revenue_volatility
    );

    Ok(RegulatoryMetrics {
        filing_count: Some(u32::try_from(facts.len()).unwrap_or(u32::MAX)),
        revenue_volatility,
    })
}

/// Population std divided by mean; 0 when the mean is not positive.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() / mean
}
