//! Category scoring.
//!
//! Each term maps one raw metric onto a bounded range with a monotonic,
//! saturating curve, so every real input yields a score in [0, 100].
//! Missing inputs are replaced by the neutral defaults below before weighting.

use std::collections::BTreeMap;

use chrono::Utc;
use common::config::{CategoryWeights, DefaultScores};
use common::{
    Category, Error, HrMetrics, MarketMetrics, OverallRisk, RawMetrics, RegulatoryMetrics,
    RiskScore, SupplyChainMetrics,
};

// ── Market ────────────────────────────────────────────────────────────

pub const MARKET_VOLATILITY_WEIGHT: f64 = 0.40;
pub const MARKET_GDP_WEIGHT: f64 = 0.30;
pub const MARKET_UNEMPLOYMENT_WEIGHT: f64 = 0.30;

/// Neutral market inputs: flat equities, trend growth, full employment.
pub const DEFAULT_STOCK_CHANGE: f64 = 0.0;
pub const DEFAULT_GDP_GROWTH: f64 = 2.0;
pub const DEFAULT_UNEMPLOYMENT: f64 = 4.0;

// ── Supply chain ──────────────────────────────────────────────────────

pub const SUPPLY_CHAIN_BASE: f64 = 50.0;
/// Points per article at neutral sentiment.
pub const NEWS_IMPACT_PER_ARTICLE: f64 = 1.5;
pub const NEWS_IMPACT_CAP: f64 = 30.0;

pub const DEFAULT_ARTICLE_COUNT: u32 = 0;
pub const DEFAULT_SENTIMENT: f64 = 0.0;

// ── Regulatory ────────────────────────────────────────────────────────

pub const DEFAULT_FILING_COUNT: u32 = 20;
pub const DEFAULT_REVENUE_VOLATILITY: f64 = 0.0;

// ── HR ────────────────────────────────────────────────────────────────

pub const DEFAULT_UNEMPLOYMENT_RATE: f64 = 4.0;
pub const DEFAULT_RATE_CHANGE: f64 = 0.0;

pub fn clamp_score(x: f64) -> f64 {
    x.clamp(0.0, 100.0)
}

/// Larger equity moves in either direction mean more risk.
pub fn volatility_term(stock_change: f64) -> f64 {
    clamp_score(50.0 + 7.5 * stock_change.abs())
}

/// Contraction raises risk; strong growth lowers it.
pub fn gdp_term(gdp_growth: f64) -> f64 {
    clamp_score(50.0 - 7.5 * gdp_growth)
}

pub fn unemployment_term(unemployment: f64) -> f64 {
    clamp_score(7.5 * unemployment)
}

/// Adjustment in [0, NEWS_IMPACT_CAP] growing with negative-sentiment volume.
pub fn news_impact(article_count: u32, sentiment: f64) -> f64 {
    let negativity = (1.0 - sentiment.clamp(-1.0, 1.0)) / 2.0;
    (2.0 * NEWS_IMPACT_PER_ARTICLE * f64::from(article_count) * negativity).min(NEWS_IMPACT_CAP)
}

/// 40 with no filings, rising to 60 at 40 filings and flat beyond.
pub fn filing_frequency_term(filing_count: u32) -> f64 {
    40.0 + 0.5 * f64::from(filing_count.min(40))
}

pub fn revenue_volatility_term(revenue_volatility: f64) -> f64 {
    (20.0 * revenue_volatility).clamp(0.0, 40.0)
}

pub fn unemployment_rate_term(rate: f64) -> f64 {
    clamp_score(50.0 + 5.0 * (rate - DEFAULT_UNEMPLOYMENT_RATE))
}

/// Rising unemployment adds risk, falling unemployment removes a little.
pub fn trend_term(rate_change: f64) -> f64 {
    (10.0 * rate_change).clamp(-20.0, 30.0)
}

/// Score of one payload with the inputs and terms behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub value: f64,
    pub contributing_metrics: BTreeMap<String, f64>,
    /// Share of formula inputs that were present.
    pub confidence: f64,
}

#[derive(Default)]
struct Inputs {
    metrics: BTreeMap<String, f64>,
    present: usize,
    total: usize,
}

impl Inputs {
    fn take(&mut self, name: &str, value: Option<f64>, default: f64) -> f64 {
        let value = value.filter(|v| !v.is_nan());
        self.total += 1;
        if value.is_some() {
            self.present += 1;
        }
        let v = value.unwrap_or(default);
        self.metrics.insert(name.to_string(), v);
        v
    }

    fn take_count(&mut self, name: &str, value: Option<u32>, default: u32) -> u32 {
        self.total += 1;
        if value.is_some() {
            self.present += 1;
        }
        let v = value.unwrap_or(default);
        self.metrics.insert(name.to_string(), f64::from(v));
        v
    }

    fn term(&mut self, name: &str, value: f64) -> f64 {
        self.metrics.insert(name.to_string(), value);
        value
    }

    fn finish(self, value: f64) -> ScoreBreakdown {
        let confidence = if self.total == 0 {
            0.0
        } else {
            self.present as f64 / self.total as f64
        };
        ScoreBreakdown {
            value: clamp_score(value),
            contributing_metrics: self.metrics,
            confidence,
        }
    }
}

pub fn market_score(m: &MarketMetrics) -> ScoreBreakdown {
    let mut inputs = Inputs::default();
    let change = inputs.take("stock_change", m.stock_change, DEFAULT_STOCK_CHANGE);
    let growth = inputs.take("gdp_growth", m.gdp_growth, DEFAULT_GDP_GROWTH);
    let unemployment = inputs.take("unemployment", m.unemployment, DEFAULT_UNEMPLOYMENT);

    let v = inputs.term("volatility_term", volatility_term(change));
    let g = inputs.term("gdp_term", gdp_term(growth));
    let u = inputs.term("unemployment_term", unemployment_term(unemployment));

    inputs.finish(
        MARKET_VOLATILITY_WEIGHT * v + MARKET_GDP_WEIGHT * g + MARKET_UNEMPLOYMENT_WEIGHT * u,
    )
}

pub fn supply_chain_score(m: &SupplyChainMetrics) -> ScoreBreakdown {
    let mut inputs = Inputs::default();
    let count = inputs.take_count("article_count", m.article_count, DEFAULT_ARTICLE_COUNT);
    let sentiment = inputs.take("sentiment", m.sentiment, DEFAULT_SENTIMENT);

    let impact = inputs.term("news_impact", news_impact(count, sentiment));
    inputs.finish(SUPPLY_CHAIN_BASE + impact)
}

pub fn regulatory_score(m: &RegulatoryMetrics) -> ScoreBreakdown {
    let mut inputs = Inputs::default();
    let filings = inputs.take_count("filing_count", m.filing_count, DEFAULT_FILING_COUNT);
    let volatility = inputs.take(
        "revenue_volatility",
        m.revenue_volatility,
        DEFAULT_REVENUE_VOLATILITY,
    );

    let f = inputs.term("filing_frequency_term", filing_frequency_term(filings));
    let v = inputs.term("revenue_volatility_term", revenue_volatility_term(volatility));
    inputs.finish(f + v)
}

pub fn hr_score(m: &HrMetrics) -> ScoreBreakdown {
    let mut inputs = Inputs::default();
    let rate = inputs.take("unemployment_rate", m.unemployment_rate, DEFAULT_UNEMPLOYMENT_RATE);
    let change = inputs.take("rate_change", m.rate_change, DEFAULT_RATE_CHANGE);

    let r = inputs.term("unemployment_rate_term", unemployment_rate_term(rate));
    let t = inputs.term("trend_term", trend_term(change));
    inputs.finish(r + t)
}

pub fn score_metrics(metrics: &RawMetrics) -> ScoreBreakdown {
    match metrics {
        RawMetrics::Market(m) => market_score(m),
        RawMetrics::SupplyChain(m) => supply_chain_score(m),
        RawMetrics::Regulatory(m) => regulatory_score(m),
        RawMetrics::Hr(m) => hr_score(m),
    }
}

/// `Σ weight[c] · score[c]` over all four categories.
pub fn overall_value(
    scores: &BTreeMap<Category, f64>,
    weights: &CategoryWeights,
) -> Result<f64, Error> {
    let missing: Vec<&str> = Category::ALL
        .iter()
        .filter(|c| !scores.contains_key(c))
        .map(|c| c.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(Error::InvalidCategorySet(format!(
            "missing {}",
            missing.join(", ")
        )));
    }

    Ok(Category::ALL
        .iter()
        .map(|c| weights.get(*c) * scores[c])
        .sum())
}

/// Turns payloads into `RiskScore`s and blends them.
#[derive(Debug, Clone)]
pub struct RiskScorer {
    weights: CategoryWeights,
    defaults: DefaultScores,
}

impl RiskScorer {
    pub fn new(weights: CategoryWeights, defaults: DefaultScores) -> Self {
        Self { weights, defaults }
    }

    pub fn weights(&self) -> &CategoryWeights {
        &self.weights
    }

    /// Score a (possibly merged) payload. A payload with no field at all gets
    /// the category's configured default score.
    pub fn score(&self, metrics: &RawMetrics, is_stale: bool) -> RiskScore {
        let category = metrics.category();
        if metrics.is_empty() {
            return self.default_score(category, is_stale);
        }

        let breakdown = score_metrics(metrics);
        let headlines = match metrics {
            RawMetrics::SupplyChain(m) => m.headlines.clone(),
            _ => Vec::new(),
        };

        RiskScore {
            category,
            value: breakdown.value,
            contributing_metrics: breakdown.contributing_metrics,
            confidence: breakdown.confidence,
            is_stale,
            defaulted: false,
            headlines,
            computed_at: Utc::now(),
        }
    }

    pub fn default_score(&self, category: Category, is_stale: bool) -> RiskScore {
        RiskScore {
            category,
            value: clamp_score(self.defaults.get(category)),
            contributing_metrics: BTreeMap::new(),
            confidence: 0.0,
            is_stale,
            defaulted: true,
            headlines: Vec::new(),
            computed_at: Utc::now(),
        }
    }

    /// Blend exactly one score per category. Callers substitute the default
    /// score for a category whose data was unavailable.
    pub fn overall(&self, scores: &[RiskScore]) -> Result<OverallRisk, Error> {
        let mut by_category = BTreeMap::new();
        for s in scores {
            if by_category.insert(s.category, s.value).is_some() {
                return Err(Error::InvalidCategorySet(format!(
                    "duplicate {}",
                    s.category
                )));
            }
        }

        Ok(OverallRisk {
            value: overall_value(&by_category, &self.weights)?,
            is_stale: scores.iter().any(|s| s.is_stale),
            computed_at: Utc::now(),
        })
    }
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self::new(CategoryWeights::default(), DefaultScores::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTREMES: &[f64] = &[
        f64::NEG_INFINITY,
        -1e308,
        -1e6,
        -100.0,
        -2.3,
        0.0,
        2.1,
        100.0,
        1e6,
        1e308,
        f64::INFINITY,
        f64::NAN,
    ];

    fn in_range(v: f64) -> bool {
        (0.0..=100.0).contains(&v)
    }

    #[test]
    fn test_reference_market_example() {
        let b = market_score(&MarketMetrics {
            stock_change: Some(-2.3),
            gdp_growth: Some(2.1),
            unemployment: Some(3.7),
        });
        assert!((b.value - 45.5).abs() < 1e-9, "got {}", b.value);
        assert_eq!(b.confidence, 1.0);
        assert!((b.contributing_metrics["volatility_term"] - 67.25).abs() < 1e-9);
        assert_eq!(b.contributing_metrics["stock_change"], -2.3);
    }

    #[test]
    fn test_scores_bounded_for_extreme_inputs() {
        for &x in EXTREMES {
            for &y in EXTREMES {
                let market = market_score(&MarketMetrics {
                    stock_change: Some(x),
                    gdp_growth: Some(y),
                    unemployment: Some(x),
                });
                assert!(in_range(market.value), "market({x},{y}) = {}", market.value);

                let supply = supply_chain_score(&SupplyChainMetrics {
                    article_count: Some(u32::MAX),
                    sentiment: Some(x),
                    headlines: Vec::new(),
                });
                assert!(in_range(supply.value), "supply({x}) = {}", supply.value);

                let reg = regulatory_score(&RegulatoryMetrics {
                    filing_count: Some(u32::MAX),
                    revenue_volatility: Some(y),
                });
                assert!(in_range(reg.value), "regulatory({y}) = {}", reg.value);

                let hr = hr_score(&HrMetrics {
                    unemployment_rate: Some(x),
                    rate_change: Some(y),
                });
                assert!(in_range(hr.value), "hr({x},{y}) = {}", hr.value);
            }
        }
    }

    #[test]
    fn test_terms_are_monotonic() {
        let grid: Vec<f64> = (-40..=40).map(|i| i as f64 * 0.5).collect();
        for w in grid.windows(2) {
            let (a, b) = (w[0], w[1]);
            assert!(gdp_term(a) >= gdp_term(b));
            assert!(unemployment_term(a) <= unemployment_term(b));
            assert!(unemployment_rate_term(a) <= unemployment_rate_term(b));
            assert!(trend_term(a) <= trend_term(b));
            assert!(revenue_volatility_term(a) <= revenue_volatility_term(b));
        }
        for w in grid.iter().filter(|v| **v >= 0.0).collect::<Vec<_>>().windows(2) {
            assert!(volatility_term(*w[0]) <= volatility_term(*w[1]));
            assert_eq!(volatility_term(*w[0]), volatility_term(-*w[0]));
        }
        for n in 0..60u32 {
            assert!(filing_frequency_term(n) <= filing_frequency_term(n + 1));
            assert!(news_impact(n, -0.5) <= news_impact(n + 1, -0.5));
        }
    }

    #[test]
    fn test_news_impact_bounded_and_sentiment_sensitive() {
        assert_eq!(news_impact(10, 0.0), 15.0);
        assert_eq!(news_impact(10, 1.0), 0.0);
        assert_eq!(news_impact(10, -1.0), 30.0);
        assert_eq!(news_impact(1_000, -1.0), NEWS_IMPACT_CAP);
        assert!(news_impact(5, -0.8) > news_impact(5, 0.4));
    }

    #[test]
    fn test_missing_fields_use_neutral_defaults() {
        let b = market_score(&MarketMetrics::default());
        assert_eq!(b.confidence, 0.0);
        assert_eq!(b.contributing_metrics["gdp_growth"], DEFAULT_GDP_GROWTH);
        // 0.4·50 + 0.3·35 + 0.3·30
        assert!((b.value - 39.5).abs() < 1e-9);

        let partial = hr_score(&HrMetrics {
            unemployment_rate: Some(6.0),
            rate_change: None,
        });
        assert_eq!(partial.confidence, 0.5);
        assert_eq!(partial.value, 60.0);
    }

    #[test]
    fn test_nan_counts_as_missing() {
        let b = regulatory_score(&RegulatoryMetrics {
            filing_count: Some(20),
            revenue_volatility: Some(f64::NAN),
        });
        assert_eq!(b.confidence, 0.5);
        assert_eq!(b.value, 50.0);
    }

    #[test]
    fn test_overall_is_exact_weighted_sum() {
        let scores: BTreeMap<Category, f64> = [
            (Category::Market, 10.0),
            (Category::SupplyChain, 20.0),
            (Category::Regulatory, 30.0),
            (Category::Hr, 40.0),
        ]
        .into_iter()
        .collect();
        let v = overall_value(&scores, &CategoryWeights::default()).unwrap();
        assert!((v - 23.5).abs() < 1e-12);
    }

    #[test]
    fn test_overall_requires_all_categories() {
        let scores: BTreeMap<Category, f64> =
            [(Category::Market, 10.0), (Category::Hr, 40.0)].into_iter().collect();
        let err = overall_value(&scores, &CategoryWeights::default()).unwrap_err();
        match err {
            Error::InvalidCategorySet(msg) => {
                assert!(msg.contains("supply_chain") && msg.contains("regulatory"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_scorer_defaults_empty_payload() {
        let scorer = RiskScorer::default();
        let s = scorer.score(&RawMetrics::empty(Category::Regulatory), true);
        assert!(s.defaulted);
        assert!(s.is_stale);
        assert_eq!(s.value, 50.0);
        assert!(s.contributing_metrics.is_empty());
    }

    #[test]
    fn test_scorer_overall_rejects_duplicates() {
        let scorer = RiskScorer::default();
        let a = scorer.default_score(Category::Market, false);
        let err = scorer.overall(&[a.clone(), a]).unwrap_err();
        assert!(matches!(err, Error::InvalidCategorySet(_)));
    }

    #[test]
    fn test_scorer_overall_of_defaults() {
        let scorer = RiskScorer::default();
        let scores: Vec<RiskScore> = Category::ALL
            .iter()
            .map(|c| scorer.default_score(*c, *c == Category::Hr))
            .collect();
        let overall = scorer.overall(&scores).unwrap();
        assert!((overall.value - 50.0).abs() < 1e-9);
        assert!(overall.is_stale);
    }
}
