//! Domain types shared across risk-radar.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

// ── Categories ────────────────────────────────────────────────────────

/// One of the four fixed risk domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Market,
    SupplyChain,
    Regulatory,
    Hr,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Market,
        Category::SupplyChain,
        Category::Regulatory,
        Category::Hr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Market => "market",
            Category::SupplyChain => "supply_chain",
            Category::Regulatory => "regulatory",
            Category::Hr => "hr",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "market" => Ok(Category::Market),
            "supply_chain" => Ok(Category::SupplyChain),
            "regulatory" => Ok(Category::Regulatory),
            "hr" => Ok(Category::Hr),
            _ => Err(Error::UnknownCategory(s.to_string())),
        }
    }
}

// ── Raw metrics ───────────────────────────────────────────────────────
//
// Every field is optional: providers fail independently and a missing field
// is replaced by the scorer's documented neutral default.

/// Market inputs: equity move, GDP growth, unemployment (all percent).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketMetrics {
    #[serde(default)]
    pub stock_change: Option<f64>,
    #[serde(default)]
    pub gdp_growth: Option<f64>,
    #[serde(default)]
    pub unemployment: Option<f64>,
}

/// A news headline kept for traceability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    #[serde(default)]
    pub published: String,
}

/// Supply-chain inputs derived from disruption news.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplyChainMetrics {
    #[serde(default)]
    pub article_count: Option<u32>,
    /// Aggregate headline sentiment in [-1, 1]; negative means bad news.
    #[serde(default)]
    pub sentiment: Option<f64>,
    #[serde(default)]
    pub headlines: Vec<Headline>,
}

/// Regulatory inputs derived from SEC filings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegulatoryMetrics {
    #[serde(default)]
    pub filing_count: Option<u32>,
    /// Coefficient of variation of recent reported revenue.
    #[serde(default)]
    pub revenue_volatility: Option<f64>,
}

/// HR inputs derived from labor statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HrMetrics {
    #[serde(default)]
    pub unemployment_rate: Option<f64>,
    /// Latest minus previous unemployment rate (percentage points).
    #[serde(default)]
    pub rate_change: Option<f64>,
}

/// Raw metrics for one category, as returned by a fetcher and held in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum RawMetrics {
    Market(MarketMetrics),
    SupplyChain(SupplyChainMetrics),
    Regulatory(RegulatoryMetrics),
    Hr(HrMetrics),
}

impl RawMetrics {
    /// The category default payload: every field absent.
    pub fn empty(category: Category) -> Self {
        match category {
            Category::Market => RawMetrics::Market(MarketMetrics::default()),
            Category::SupplyChain => RawMetrics::SupplyChain(SupplyChainMetrics::default()),
            Category::Regulatory => RawMetrics::Regulatory(RegulatoryMetrics::default()),
            Category::Hr => RawMetrics::Hr(HrMetrics::default()),
        }
    }

    pub fn category(&self) -> Category {
        match self {
            RawMetrics::Market(_) => Category::Market,
            RawMetrics::SupplyChain(_) => Category::SupplyChain,
            RawMetrics::Regulatory(_) => Category::Regulatory,
            RawMetrics::Hr(_) => Category::Hr,
        }
    }

    /// True when no scoring field is present.
    pub fn is_empty(&self) -> bool {
        match self {
            RawMetrics::Market(m) => {
                m.stock_change.is_none() && m.gdp_growth.is_none() && m.unemployment.is_none()
            }
            RawMetrics::SupplyChain(m) => m.article_count.is_none() && m.sentiment.is_none(),
            RawMetrics::Regulatory(m) => m.filing_count.is_none() && m.revenue_volatility.is_none(),
            RawMetrics::Hr(m) => m.unemployment_rate.is_none() && m.rate_change.is_none(),
        }
    }

    /// Fill fields that are absent here from `other`.
    ///
    /// A category holds several sources (e.g. one quote feed and two FRED
    /// series for market); each contributes a partial payload. Fields
    /// already present win. Payloads of a different category are ignored.
    pub fn absorb(&mut self, other: &RawMetrics) {
        match (self, other) {
            (RawMetrics::Market(a), RawMetrics::Market(b)) => {
                a.stock_change = a.stock_change.or(b.stock_change);
                a.gdp_growth = a.gdp_growth.or(b.gdp_growth);
                a.unemployment = a.unemployment.or(b.unemployment);
            }
            (RawMetrics::SupplyChain(a), RawMetrics::SupplyChain(b)) => {
                a.article_count = a.article_count.or(b.article_count);
                a.sentiment = a.sentiment.or(b.sentiment);
                if a.headlines.is_empty() {
                    a.headlines = b.headlines.clone();
                }
            }
            (RawMetrics::Regulatory(a), RawMetrics::Regulatory(b)) => {
                a.filing_count = a.filing_count.or(b.filing_count);
                a.revenue_volatility = a.revenue_volatility.or(b.revenue_volatility);
            }
            (RawMetrics::Hr(a), RawMetrics::Hr(b)) => {
                a.unemployment_rate = a.unemployment_rate.or(b.unemployment_rate);
                a.rate_change = a.rate_change.or(b.rate_change);
            }
            _ => {}
        }
    }
}

// ── Scores ────────────────────────────────────────────────────────────

/// A 0–100 risk score for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub category: Category,
    pub value: f64,
    /// Inputs (after default substitution) and intermediate terms.
    pub contributing_metrics: BTreeMap<String, f64>,
    /// Share of formula inputs that came from data rather than defaults.
    pub confidence: f64,
    /// At least one source was served from an expired entry or a default.
    pub is_stale: bool,
    /// No data at all was available; `value` is the configured default.
    pub defaulted: bool,
    /// Up to five headlines behind a supply-chain score.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headlines: Vec<Headline>,
    pub computed_at: DateTime<Utc>,
}

/// Weighted blend of the four category scores. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallRisk {
    pub value: f64,
    pub is_stale: bool,
    pub computed_at: DateTime<Utc>,
}

/// Overall risk together with the per-category scores it was built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub overall: OverallRisk,
    pub scores: Vec<RiskScore>,
}

impl RiskSnapshot {
    pub fn score(&self, category: Category) -> Option<&RiskScore> {
        self.scores.iter().find(|s| s.category == category)
    }
}

// ── Simulation ────────────────────────────────────────────────────────

/// Percentile ranks reported for every simulation.
pub const PERCENTILE_RANKS: [u8; 3] = [5, 50, 95];

/// Summary of one Monte Carlo run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub category: Category,
    pub mean: f64,
    pub std: f64,
    /// Percentile rank (5, 50, 95) → value.
    pub percentiles: BTreeMap<u8, f64>,
    pub iteration_count: usize,
    /// Distribution parameters the samples were drawn from.
    pub center: f64,
    pub spread: f64,
    pub sampled_at: DateTime<Utc>,
}

impl SimulationResult {
    pub fn percentile(&self, rank: u8) -> Option<f64> {
        self.percentiles.get(&rank).copied()
    }
}

/// Named scenario anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Optimistic,
    Baseline,
    Pessimistic,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Optimistic, Scenario::Baseline, Scenario::Pessimistic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Optimistic => "optimistic",
            Scenario::Baseline => "baseline",
            Scenario::Pessimistic => "pessimistic",
        }
    }
}

/// Three independent simulations, one per scenario anchor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSet {
    pub category: Category,
    pub optimistic: SimulationResult,
    pub baseline: SimulationResult,
    pub pessimistic: SimulationResult,
    pub computed_at: DateTime<Utc>,
}

impl ScenarioSet {
    pub fn get(&self, scenario: Scenario) -> &SimulationResult {
        match scenario {
            Scenario::Optimistic => &self.optimistic,
            Scenario::Baseline => &self.baseline,
            Scenario::Pessimistic => &self.pessimistic,
        }
    }
}

// ── Operational views ─────────────────────────────────────────────────

/// Read-only freshness snapshot of the cache for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatus {
    pub category: Category,
    pub source_count: usize,
    pub fresh_count: usize,
    pub expired_count: usize,
    pub sources: Vec<String>,
}

/// Outcome of a forced refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshReport {
    pub categories: Vec<Category>,
    pub refreshed: Vec<String>,
    pub failed: Vec<String>,
    pub refreshed_at: DateTime<Utc>,
}

impl RefreshReport {
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trips_through_str() {
        for c in Category::ALL {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
        }
        assert_eq!("Supply-Chain".parse::<Category>().unwrap(), Category::SupplyChain);
    }

    #[test]
    fn test_unknown_category_rejected() {
        let err = "weather".parse::<Category>().unwrap_err();
        assert!(matches!(err, Error::UnknownCategory(ref s) if s == "weather"));
    }

    #[test]
    fn test_empty_payload_matches_category() {
        for c in Category::ALL {
            let p = RawMetrics::empty(c);
            assert_eq!(p.category(), c);
            assert!(p.is_empty());
        }
    }

    #[test]
    fn test_absorb_fills_only_missing_fields() {
        let mut a = RawMetrics::Market(MarketMetrics {
            stock_change: Some(-1.0),
            ..Default::default()
        });
        let b = RawMetrics::Market(MarketMetrics {
            stock_change: Some(5.0),
            gdp_growth: Some(2.0),
            unemployment: None,
        });
        a.absorb(&b);
        assert_eq!(
            a,
            RawMetrics::Market(MarketMetrics {
                stock_change: Some(-1.0),
                gdp_growth: Some(2.0),
                unemployment: None,
            })
        );
        assert!(!a.is_empty());
    }

    #[test]
    fn test_absorb_ignores_other_category() {
        let mut a = RawMetrics::empty(Category::Hr);
        a.absorb(&RawMetrics::Market(MarketMetrics {
            stock_change: Some(1.0),
            ..Default::default()
        }));
        assert!(a.is_empty());
    }

    #[test]
    fn test_raw_metrics_serialize_tagged() {
        let p = RawMetrics::Hr(HrMetrics {
            unemployment_rate: Some(3.7),
            rate_change: None,
        });
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["category"], "hr");
        assert_eq!(v["unemployment_rate"], 3.7);
    }
}
