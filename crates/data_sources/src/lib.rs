//! External data providers.
//!
//! One fetcher per provider, each turning a provider response into the
//! partial raw metrics of a single risk category. Fetchers never cache;
//! the caller's source cache decides when a fetch is needed at all.

pub mod alpha_vantage;
pub mod bls;
pub mod fred;
pub mod news;
pub mod rate_limit;
pub mod sec;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{Category, Error, RadarConfig, RawMetrics};
use tracing::debug;

pub use alpha_vantage::AlphaVantageFetcher;
pub use bls::BlsFetcher;
pub use fred::{FredFetcher, FredSeriesKind};
pub use news::NewsFetcher;
pub use rate_limit::QuotaLimiter;
pub use sec::SecFetcher;

const USER_AGENT: &str = "risk-radar/0.1 (enterprise risk dashboard; contact@example.com)";

/// A pluggable source of raw metrics for one (category, source key) pair.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Category whose metrics this source produces.
    fn category(&self) -> Category;

    /// Provider name, used for TTL overrides (e.g. `"fred"`).
    fn provider(&self) -> &'static str;

    /// Cache key, unique within the category (e.g. `"fred:UNRATE"`).
    fn source_key(&self) -> String;

    /// Fetch fresh metrics or fail.
    async fn fetch(&self) -> Result<RawMetrics, Error>;
}

/// Shared HTTP client with connection pooling, User-Agent, and timeout.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .pool_max_idle_per_host(4)
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))
}

/// Check the status and decode a JSON body.
pub(crate) async fn read_json(
    resp: reqwest::Response,
    source_key: &str,
) -> Result<serde_json::Value, Error> {
    let status = resp.status().as_u16();
    if status == 429 {
        return Err(Error::RateLimited {
            source_key: source_key.to_string(),
        });
    }
    if status != 200 {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::unavailable(
            source_key,
            format!(
                "returned {}: {}",
                status,
                body.chars().take(500).collect::<String>()
            ),
        ));
    }

    resp.json()
        .await
        .map_err(|e| Error::malformed(source_key, format!("JSON parse error: {e}")))
}

/// Build every configured fetcher. FRED fetchers share one quota.
pub fn build_fetchers(cfg: &RadarConfig) -> Result<Vec<Arc<dyn SourceFetcher>>, Error> {
    let client = http_client(cfg.cache.fetch_timeout())?;
    let sources = &cfg.sources;
    let quotas = &sources.quotas;

    let fred_limiter = QuotaLimiter::per_minute(quotas.fred_per_minute);

    let fetchers: Vec<Arc<dyn SourceFetcher>> = vec![
        Arc::new(AlphaVantageFetcher::new(
            client.clone(),
            cfg.api_keys.alpha_vantage.clone(),
            sources.stock_symbol.clone(),
            QuotaLimiter::per_day(quotas.alpha_vantage_per_day),
        )),
        Arc::new(FredFetcher::new(
            client.clone(),
            cfg.api_keys.fred.clone(),
            sources.gdp_series.clone(),
            FredSeriesKind::GdpGrowth,
            sources.fred_observation_limit,
            fred_limiter.clone(),
        )),
        Arc::new(FredFetcher::new(
            client.clone(),
            cfg.api_keys.fred.clone(),
            sources.unemployment_series.clone(),
            FredSeriesKind::Unemployment,
            sources.fred_observation_limit,
            fred_limiter,
        )),
        Arc::new(NewsFetcher::new(
            client.clone(),
            cfg.api_keys.news_api.clone(),
            sources.news_query.clone(),
            sources.news_page_size,
            QuotaLimiter::per_day(quotas.news_api_per_day),
        )),
        Arc::new(SecFetcher::new(
            client.clone(),
            sources.sec_cik.clone(),
            sources.sec_concept.clone(),
            QuotaLimiter::per_second(quotas.sec_per_second),
        )),
        Arc::new(BlsFetcher::new(
            client,
            sources.bls_series.clone(),
            QuotaLimiter::per_day(quotas.bls_per_day),
        )),
    ];

    for f in &fetchers {
        debug!("Registered source {} for {}", f.source_key(), f.category());
    }

    Ok(fetchers)
}

/// Parse a numeric field that providers send either as a number or a string.
pub(crate) fn numeric(value: &serde_json::Value) -> Option<f64> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}
