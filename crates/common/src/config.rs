//! risk-radar configuration types.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{Category, Scenario};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RadarConfig {
    /// Provider API keys. An empty key disables that provider.
    #[serde(default)]
    pub api_keys: ApiKeys,

    /// Source cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Background refresh settings.
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Category weights for the overall blend.
    #[serde(default)]
    pub weights: CategoryWeights,

    /// Score used for a category with no data at all.
    #[serde(default)]
    pub default_scores: DefaultScores,

    /// Monte Carlo parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Scenario anchors.
    #[serde(default)]
    pub scenarios: ScenarioConfig,

    /// What each provider is asked for, and how often it may be asked.
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiKeys {
    #[serde(default)]
    pub alpha_vantage: String,
    #[serde(default)]
    pub fred: String,
    #[serde(default)]
    pub news_api: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL applied to every source without an override.
    #[serde(default = "default_ttl")]
    pub default_ttl_secs: u64,

    /// Provider name (e.g. "alpha_vantage") → TTL seconds.
    #[serde(default)]
    pub ttl_overrides: HashMap<String, u64>,

    /// A fetch running longer than this counts as failed.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

impl CacheConfig {
    pub fn ttl_for(&self, provider: &str) -> Duration {
        let secs = self
            .ttl_overrides
            .get(provider)
            .copied()
            .unwrap_or(self.default_ttl_secs);
        Duration::from_secs(secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Background sweep interval.
    #[serde(default = "default_refresh_interval")]
    pub interval_secs: u64,

    /// Cache-status heartbeat interval in `serve` mode.
    #[serde(default = "default_heartbeat")]
    pub heartbeat_secs: u64,
}

/// Overall-risk weights. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeights {
    #[serde(default = "default_market_weight")]
    pub market: f64,
    #[serde(default = "default_supply_chain_weight")]
    pub supply_chain: f64,
    #[serde(default = "default_regulatory_weight")]
    pub regulatory: f64,
    #[serde(default = "default_hr_weight")]
    pub hr: f64,
}

impl CategoryWeights {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Market => self.market,
            Category::SupplyChain => self.supply_chain,
            Category::Regulatory => self.regulatory,
            Category::Hr => self.hr,
        }
    }

    pub fn total(&self) -> f64 {
        Category::ALL.iter().map(|c| self.get(*c)).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DefaultScores {
    #[serde(default = "default_score")]
    pub market: f64,
    #[serde(default = "default_score")]
    pub supply_chain: f64,
    #[serde(default = "default_score")]
    pub regulatory: f64,
    #[serde(default = "default_score")]
    pub hr: f64,
}

impl DefaultScores {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Market => self.market,
            Category::SupplyChain => self.supply_chain,
            Category::Regulatory => self.regulatory,
            Category::Hr => self.hr,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Iterations when the caller does not specify any.
    #[serde(default = "default_iterations")]
    pub default_iterations: usize,

    /// Center used when there is neither history nor a point estimate.
    #[serde(default = "default_center")]
    pub default_center: f64,

    /// Spread used when only a single score is available.
    #[serde(default = "default_spread")]
    pub default_spread: f64,

    /// A historical std below this is treated as degenerate...
    #[serde(default = "default_min_spread")]
    pub min_spread: f64,

    /// ...and replaced by this spread.
    #[serde(default = "default_degenerate_spread")]
    pub degenerate_spread: f64,

    /// Scores retained per category for center/spread estimation.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

/// Center and spread of one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioAnchor {
    pub center: f64,
    pub spread: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default = "default_optimistic")]
    pub optimistic: ScenarioAnchor,
    #[serde(default = "default_baseline")]
    pub baseline: ScenarioAnchor,
    #[serde(default = "default_pessimistic")]
    pub pessimistic: ScenarioAnchor,
    #[serde(default = "default_iterations")]
    pub iterations: usize,
}

impl ScenarioConfig {
    pub fn anchor(&self, scenario: Scenario) -> ScenarioAnchor {
        match scenario {
            Scenario::Optimistic => self.optimistic,
            Scenario::Baseline => self.baseline,
            Scenario::Pessimistic => self.pessimistic,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Equity symbol quoted for market volatility.
    #[serde(default = "default_stock_symbol")]
    pub stock_symbol: String,
    /// FRED real-GDP series.
    #[serde(default = "default_gdp_series")]
    pub gdp_series: String,
    /// FRED unemployment series.
    #[serde(default = "default_unemployment_series")]
    pub unemployment_series: String,
    /// Observations requested per FRED call.
    #[serde(default = "default_fred_limit")]
    pub fred_observation_limit: u32,
    /// SEC Central Index Key of the tracked company.
    #[serde(default = "default_sec_cik")]
    pub sec_cik: String,
    /// XBRL concept read from the company's filings.
    #[serde(default = "default_sec_concept")]
    pub sec_concept: String,
    /// NewsAPI query for disruption coverage.
    #[serde(default = "default_news_query")]
    pub news_query: String,
    #[serde(default = "default_news_page_size")]
    pub news_page_size: u32,
    /// BLS unemployment-rate series.
    #[serde(default = "default_bls_series")]
    pub bls_series: String,
    /// Per-provider request quotas.
    #[serde(default)]
    pub quotas: QuotaConfig,
}

/// Free-tier request allowances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "default_alpha_vantage_per_day")]
    pub alpha_vantage_per_day: u32,
    #[serde(default = "default_news_api_per_day")]
    pub news_api_per_day: u32,
    #[serde(default = "default_bls_per_day")]
    pub bls_per_day: u32,
    #[serde(default = "default_fred_per_minute")]
    pub fred_per_minute: u32,
    #[serde(default = "default_sec_per_second")]
    pub sec_per_second: u32,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_ttl() -> u64 {
    24 * 3600
}
fn default_fetch_timeout() -> u64 {
    10
}
fn default_refresh_interval() -> u64 {
    24 * 3600
}
fn default_heartbeat() -> u64 {
    300
}

fn default_market_weight() -> f64 {
    0.30
}
fn default_supply_chain_weight() -> f64 {
    0.25
}
fn default_regulatory_weight() -> f64 {
    0.25
}
fn default_hr_weight() -> f64 {
    0.20
}
fn default_score() -> f64 {
    50.0
}

fn default_iterations() -> usize {
    5000
}
fn default_center() -> f64 {
    50.0
}
fn default_spread() -> f64 {
    15.0
}
fn default_min_spread() -> f64 {
    1.0
}
fn default_degenerate_spread() -> f64 {
    10.0
}
fn default_history_limit() -> usize {
    30
}

fn default_optimistic() -> ScenarioAnchor {
    ScenarioAnchor {
        center: 30.0,
        spread: 5.0,
    }
}
fn default_baseline() -> ScenarioAnchor {
    ScenarioAnchor {
        center: 50.0,
        spread: 10.0,
    }
}
fn default_pessimistic() -> ScenarioAnchor {
    ScenarioAnchor {
        center: 70.0,
        spread: 15.0,
    }
}

fn default_stock_symbol() -> String {
    "SPY".into()
}
fn default_gdp_series() -> String {
    "GDPC1".into()
}
fn default_unemployment_series() -> String {
    "UNRATE".into()
}
fn default_fred_limit() -> u32 {
    20
}
fn default_sec_cik() -> String {
    "0000789019".into()
}
fn default_sec_concept() -> String {
    "Revenues".into()
}
fn default_news_query() -> String {
    "supply chain disruption OR logistics OR shipping delay".into()
}
fn default_news_page_size() -> u32 {
    20
}
fn default_bls_series() -> String {
    "LNS14000000".into()
}

fn default_alpha_vantage_per_day() -> u32 {
    25
}
fn default_news_api_per_day() -> u32 {
    100
}
fn default_bls_per_day() -> u32 {
    500
}
fn default_fred_per_minute() -> u32 {
    120
}
fn default_sec_per_second() -> u32 {
    10
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl(),
            ttl_overrides: HashMap::new(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_refresh_interval(),
            heartbeat_secs: default_heartbeat(),
        }
    }
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            market: default_market_weight(),
            supply_chain: default_supply_chain_weight(),
            regulatory: default_regulatory_weight(),
            hr: default_hr_weight(),
        }
    }
}

impl Default for DefaultScores {
    fn default() -> Self {
        Self {
            market: default_score(),
            supply_chain: default_score(),
            regulatory: default_score(),
            hr: default_score(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            default_iterations: default_iterations(),
            default_center: default_center(),
            default_spread: default_spread(),
            min_spread: default_min_spread(),
            degenerate_spread: default_degenerate_spread(),
            history_limit: default_history_limit(),
        }
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            optimistic: default_optimistic(),
            baseline: default_baseline(),
            pessimistic: default_pessimistic(),
            iterations: default_iterations(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            stock_symbol: default_stock_symbol(),
            gdp_series: default_gdp_series(),
            unemployment_series: default_unemployment_series(),
            fred_observation_limit: default_fred_limit(),
            sec_cik: default_sec_cik(),
            sec_concept: default_sec_concept(),
            news_query: default_news_query(),
            news_page_size: default_news_page_size(),
            bls_series: default_bls_series(),
            quotas: QuotaConfig::default(),
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            alpha_vantage_per_day: default_alpha_vantage_per_day(),
            news_api_per_day: default_news_api_per_day(),
            bls_per_day: default_bls_per_day(),
            fred_per_minute: default_fred_per_minute(),
            sec_per_second: default_sec_per_second(),
        }
    }
}
