//! NewsAPI coverage of supply-chain disruption (100 requests/day free).

use async_trait::async_trait;
use common::{Category, Error, Headline, RawMetrics, SupplyChainMetrics};
use serde_json::Value;
use tracing::debug;

use crate::{read_json, QuotaLimiter, SourceFetcher};

const BASE_URL: &str = "https://newsapi.org/v2/everything";
const HEADLINES_KEPT: usize = 5;

const NEGATIVE_TERMS: &[&str] = &[
    "disruption",
    "disrupted",
    "delay",
    "shortage",
    "strike",
    "congestion",
    "bottleneck",
    "halt",
    "crisis",
    "closure",
    "backlog",
    "shutdown",
    "tariff",
    "sanction",
    "collapse",
    "blockade",
];

const POSITIVE_TERMS: &[&str] = &[
    "recovery",
    "recover",
    "easing",
    "eases",
    "improve",
    "resolved",
    "reopen",
    "stabilize",
    "rebound",
    "boost",
];

#[derive(Debug, Clone)]
pub struct NewsFetcher {
    client: reqwest::Client,
    api_key: String,
    query: String,
    page_size: u32,
    limiter: QuotaLimiter,
}

impl NewsFetcher {
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        query: String,
        page_size: u32,
        limiter: QuotaLimiter,
    ) -> Self {
        Self {
            client,
            api_key,
            query,
            page_size,
            limiter,
        }
    }
}

#[async_trait]
impl SourceFetcher for NewsFetcher {
    fn category(&self) -> Category {
        Category::SupplyChain
    }

    fn provider(&self) -> &'static str {
        "newsapi"
    }

    fn source_key(&self) -> String {
        format!("newsapi:{}", self.query)
    }

    async fn fetch(&self) -> Result<RawMetrics, Error> {
        let key = self.source_key();
        if self.api_key.trim().is_empty() {
            return Err(Error::unavailable(key, "NEWS_API_KEY not set"));
        }
        if !self.limiter.try_acquire() {
            return Err(Error::RateLimited { source_key: key });
        }

        debug!("Fetching NewsAPI articles for {:?}", self.query);

        let page_size = self.page_size.to_string();
        let resp = self
            .client
            .get(BASE_URL)
            .query(&[
                ("q", self.query.as_str()),
                ("apiKey", self.api_key.as_str()),
                ("pageSize", page_size.as_str()),
                ("sortBy", "publishedAt"),
                ("language", "en"),
            ])
            .send()
            .await
            .map_err(|e| Error::unavailable(&key, format!("HTTP error: {e}")))?;

        let body = read_json(resp, &key).await?;
        Ok(RawMetrics::SupplyChain(parse_articles(&body, &key)?))
    }
}

/// Article count, headline sentiment, and the newest headlines.
pub fn parse_articles(body: &Value, source_key: &str) -> Result<SupplyChainMetrics, Error> {
    match body.get("status").and_then(Value::as_str) {
        Some("ok") => {}
        Some(_) => {
            let code = body.get("code").and_then(Value::as_str).unwrap_or_default();
            if code == "rateLimited" || code == "maximumResultsReached" {
                return Err(Error::RateLimited {
                    source_key: source_key.to_string(),
                });
            }
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(Error::unavailable(source_key, message));
        }
        None => return Err(Error::malformed(source_key, "missing status")),
    }

    let articles = body
        .get("articles")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::malformed(source_key, "missing articles"))?;

    let texts: Vec<String> = articles
        .iter()
        .map(|a| {
            let title = a.get("title").and_then(Value::as_str).unwrap_or_default();
            let description = a.get("description").and_then(Value::as_str).unwrap_or_default();
            format!("{title} {description}")
        })
        .collect();

    let headlines = articles
        .iter()
        .take(HEADLINES_KEPT)
        .map(|a| Headline {
            title: a.get("title").and_then(Value::as_str).unwrap_or_default().to_string(),
            published: a
                .get("publishedAt")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
        .collect();

    let sentiment = headline_sentiment(&texts);
    debug!(
        "{}: {} articles, sentiment={:.2}",
        source_key,
        articles.len(),
        sentiment
    );

    Ok(SupplyChainMetrics {
        article_count: Some(u32::try_from(articles.len()).unwrap_or(u32::MAX)),
        sentiment: Some(sentiment),
        headlines,
    })
}

/// Lexicon sentiment in [-1, 1]: (positive − negative) / matched terms.
/// Text with no lexicon hits scores 0.
pub fn headline_sentiment<S: AsRef<str>>(texts: &[S]) -> f64 {
    let mut positive = 0usize;
    let mut negative = 0usize;

    for text in texts {
        let lowered = text.as_ref().to_ascii_lowercase();
        negative += NEGATIVE_TERMS.iter().filter(|t| lowered.contains(*t)).count();
        positive += POSITIVE_TERMS.iter().filter(|t| lowered.contains(*t)).count();
    }

    let matched = positive + negative;
    if matched == 0 {
        return 0.0;
    }
    (positive as f64 - negative as f64) / matched as f64
}
