//! `RiskEngine`: the query surface over sources, cache, scorer and simulator.
//!
//! The engine is a cheap clonable handle; clones share one cache and one
//! score history, so a background refresh loop and foreground queries see
//! the same data.

use std::sync::Arc;

use chrono::Utc;
use common::{
    CacheStatus, Category, Error, RadarConfig, RawMetrics, RefreshReport, RiskScore,
    RiskSnapshot, Scenario, ScenarioSet, SimulationResult,
};
use data_sources::SourceFetcher;
use futures::future::join_all;
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

use crate::cache::{LookupOrigin, RefreshMode, SourceCache};
use crate::history::ScoreHistory;
use crate::scorer::RiskScorer;
use crate::simulation::{self, DistributionParams};

/// Per-source outcome of one evaluation: `(source_key, origin)`.
type SourceOutcomes = Vec<(String, LookupOrigin)>;

#[derive(Clone)]
pub struct RiskEngine {
    config: Arc<RadarConfig>,
    cache: SourceCache,
    fetchers: Arc<Vec<Arc<dyn SourceFetcher>>>,
    scorer: RiskScorer,
    history: ScoreHistory,
}

impl RiskEngine {
    pub fn new(config: RadarConfig, fetchers: Vec<Arc<dyn SourceFetcher>>) -> Self {
        let cache = SourceCache::new().with_fetch_timeout(config.cache.fetch_timeout());
        let scorer = RiskScorer::new(config.weights, config.default_scores);
        let history = ScoreHistory::new(config.simulation.history_limit);
        Self {
            config: Arc::new(config),
            cache,
            fetchers: Arc::new(fetchers),
            scorer,
            history,
        }
    }

    /// Engine over the live provider fetchers.
    pub fn from_config(config: RadarConfig) -> Result<Self, Error> {
        let fetchers = data_sources::build_fetchers(&config)?;
        info!("Registered {} data sources", fetchers.len());
        Ok(Self::new(config, fetchers))
    }

    pub fn config(&self) -> &RadarConfig {
        &self.config
    }

    pub fn cache(&self) -> &SourceCache {
        &self.cache
    }

    pub fn history(&self) -> &ScoreHistory {
        &self.history
    }

    /// Current score for one category, refreshing expired sources first.
    /// Unavailable data degrades the score; it never fails the call.
    pub async fn get_risk(&self, category: Category) -> RiskScore {
        self.evaluate(category, RefreshMode::IfStale).await.0
    }

    /// All four category scores and their weighted blend.
    pub async fn get_overall_risk(&self) -> Result<RiskSnapshot, Error> {
        let scores = join_all(Category::ALL.iter().map(|c| self.get_risk(*c))).await;
        let overall = self.scorer.overall(&scores)?;
        info!(
            "Overall risk {:.1}{}",
            overall.value,
            if overall.is_stale { " (stale inputs)" } else { "" }
        );
        Ok(RiskSnapshot { overall, scores })
    }

    /// Monte Carlo simulation for one category.
    ///
    /// With `use_cached`, center and spread come from the recorded score
    /// history; otherwise (or when there is no history yet) the current
    /// score is the single point estimate.
    pub async fn simulate(
        &self,
        category: Category,
        iterations: Option<usize>,
        use_cached: bool,
    ) -> Result<SimulationResult, Error> {
        let iterations = iterations.unwrap_or(self.config.simulation.default_iterations);
        simulation::validate_iterations(iterations)?;

        let history = if use_cached {
            self.history.recent(category)
        } else {
            Vec::new()
        };
        let points = if history.is_empty() {
            vec![self.get_risk(category).await.value]
        } else {
            history
        };
        let params = simulation::params_from_history(&points, &self.config.simulation);

        let result = joined(
            tokio::task::spawn_blocking(move || {
                simulation::simulate(category, params, iterations)
            })
            .await,
        )?;
        info!(
            "Simulated {} x{}: mean {:.1}, p5 {:.1}, p95 {:.1}",
            category,
            iterations,
            result.mean,
            result.percentile(5).unwrap_or(f64::NAN),
            result.percentile(95).unwrap_or(f64::NAN),
        );
        Ok(result)
    }

    /// Optimistic, baseline and pessimistic runs from the configured anchors.
    pub async fn scenarios(&self, category: Category) -> Result<ScenarioSet, Error> {
        let cfg = &self.config.scenarios;
        let iterations = cfg.iterations;
        simulation::validate_iterations(iterations)?;

        let run = |scenario: Scenario| {
            let anchor = cfg.anchor(scenario);
            let params = DistributionParams {
                center: anchor.center,
                spread: anchor.spread,
            };
            tokio::task::spawn_blocking(move || simulation::simulate(category, params, iterations))
        };

        let (optimistic, baseline, pessimistic) = tokio::join!(
            run(Scenario::Optimistic),
            run(Scenario::Baseline),
            run(Scenario::Pessimistic)
        );

        Ok(ScenarioSet {
            category,
            optimistic: joined(optimistic)?,
            baseline: joined(baseline)?,
            pessimistic: joined(pessimistic)?,
            computed_at: Utc::now(),
        })
    }

    pub fn cache_status(&self) -> Vec<CacheStatus> {
        Category::ALL.iter().map(|c| self.cache.status(*c)).collect()
    }

    /// Force-refresh every source of the given categories (all when `None`).
    pub async fn refresh(&self, categories: Option<&[Category]>) -> RefreshReport {
        self.refresh_with_mode(categories, RefreshMode::Force).await
    }

    /// Refresh only expired sources of every category.
    pub async fn sweep(&self) -> RefreshReport {
        self.refresh_with_mode(None, RefreshMode::IfStale).await
    }

    /// Run a forced refresh in the background.
    pub fn trigger_refresh(&self, categories: Option<Vec<Category>>) -> JoinHandle<RefreshReport> {
        let engine = self.clone();
        tokio::spawn(async move { engine.refresh(categories.as_deref()).await })
    }

    async fn refresh_with_mode(
        &self,
        categories: Option<&[Category]>,
        mode: RefreshMode,
    ) -> RefreshReport {
        let mut categories = categories
            .map(<[Category]>::to_vec)
            .unwrap_or_else(|| Category::ALL.to_vec());
        categories.sort();
        categories.dedup();

        let outcomes = join_all(categories.iter().map(|c| self.evaluate(*c, mode))).await;

        let mut refreshed = Vec::new();
        let mut failed = Vec::new();
        for (score, sources) in outcomes {
            for (key, origin) in sources {
                let name = format!("{}/{}", score.category, key);
                if origin.is_current() {
                    refreshed.push(name);
                } else {
                    failed.push(name);
                }
            }
        }

        if failed.is_empty() {
            info!("Refresh complete: {} sources current", refreshed.len());
        } else {
            warn!(
                "Refresh complete: {} current, {} failed ({})",
                refreshed.len(),
                failed.len(),
                failed.join(", ")
            );
        }

        RefreshReport {
            categories,
            refreshed,
            failed,
            refreshed_at: Utc::now(),
        }
    }

    /// Fetch (as `mode` allows), merge and score one category.
    async fn evaluate(&self, category: Category, mode: RefreshMode) -> (RiskScore, SourceOutcomes) {
        let lookups = join_all(
            self.fetchers
                .iter()
                .filter(|f| f.category() == category)
                .map(|f| {
                    let fetcher = Arc::clone(f);
                    let key = fetcher.source_key();
                    let ttl = self.config.cache.ttl_for(fetcher.provider());
                    async move {
                        let lookup = self
                            .cache
                            .lookup(category, &key, ttl, mode, || async move {
                                fetcher.fetch().await
                            })
                            .await;
                        (key, lookup)
                    }
                }),
        )
        .await;

        let mut merged = RawMetrics::empty(category);
        let mut is_stale = lookups.is_empty();
        let mut any_refreshed = false;
        for (_, lookup) in &lookups {
            merged.absorb(&lookup.payload);
            is_stale |= lookup.is_stale;
            any_refreshed |= lookup.origin == LookupOrigin::Refreshed;
        }

        let score = self.scorer.score(&merged, is_stale);
        if score.defaulted {
            warn!(
                "{}: no data from any source, using default score {:.1}",
                category, score.value
            );
        } else if any_refreshed {
            self.history.record(category, score.value);
        }

        let outcomes = lookups
            .into_iter()
            .map(|(key, lookup)| (key, lookup.origin))
            .collect();
        (score, outcomes)
    }
}

fn joined<T>(result: Result<Result<T, Error>, JoinError>) -> Result<T, Error> {
    result.map_err(|e| Error::Other(format!("simulation task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::{HrMetrics, MarketMetrics, RegulatoryMetrics, SupplyChainMetrics};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeSource {
        category: Category,
        key: &'static str,
        payload: Option<RawMetrics>,
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    #[async_trait]
    impl SourceFetcher for FakeSource {
        fn category(&self) -> Category {
            self.category
        }

        fn provider(&self) -> &'static str {
            "fake"
        }

        fn source_key(&self) -> String {
            self.key.to_string()
        }

        async fn fetch(&self) -> Result<RawMetrics, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.payload
                .clone()
                .ok_or_else(|| Error::unavailable(self.key, "provider down"))
        }
    }

    fn source(
        key: &'static str,
        payload: Option<RawMetrics>,
        calls: &Arc<AtomicUsize>,
        category: Category,
    ) -> Arc<dyn SourceFetcher> {
        Arc::new(FakeSource {
            category,
            key,
            payload,
            calls: calls.clone(),
            delay: Duration::ZERO,
        })
    }

    fn hr_source(calls: &Arc<AtomicUsize>, delay: Duration) -> Arc<dyn SourceFetcher> {
        Arc::new(FakeSource {
            category: Category::Hr,
            key: "bls:LNS14000000",
            payload: Some(RawMetrics::Hr(HrMetrics {
                unemployment_rate: Some(5.0),
                rate_change: Some(0.2),
            })),
            calls: calls.clone(),
            delay,
        })
    }

    fn market_sources(calls: &Arc<AtomicUsize>) -> Vec<Arc<dyn SourceFetcher>> {
        let part = |m: MarketMetrics| Some(RawMetrics::Market(m));
        vec![
            source(
                "alpha_vantage:SPY",
                part(MarketMetrics {
                    stock_change: Some(-2.3),
                    ..Default::default()
                }),
                calls,
                Category::Market,
            ),
            source(
                "fred:GDPC1",
                part(MarketMetrics {
                    gdp_growth: Some(2.1),
                    ..Default::default()
                }),
                calls,
                Category::Market,
            ),
            source(
                "fred:UNRATE",
                part(MarketMetrics {
                    unemployment: Some(3.7),
                    ..Default::default()
                }),
                calls,
                Category::Market,
            ),
        ]
    }

    fn all_sources(calls: &Arc<AtomicUsize>) -> Vec<Arc<dyn SourceFetcher>> {
        let mut sources = market_sources(calls);
        sources.push(source(
            "newsapi:supply chain",
            Some(RawMetrics::SupplyChain(SupplyChainMetrics {
                article_count: Some(10),
                sentiment: Some(0.0),
                headlines: Vec::new(),
            })),
            calls,
            Category::SupplyChain,
        ));
        sources.push(source(
            "sec:0000789019_Revenues",
            Some(RawMetrics::Regulatory(RegulatoryMetrics {
                filing_count: Some(20),
                revenue_volatility: Some(0.5),
            })),
            calls,
            Category::Regulatory,
        ));
        sources.push(source(
            "bls:LNS14000000",
            Some(RawMetrics::Hr(HrMetrics {
                unemployment_rate: Some(5.0),
                rate_change: Some(0.2),
            })),
            calls,
            Category::Hr,
        ));
        sources
    }

    fn engine(sources: Vec<Arc<dyn SourceFetcher>>) -> RiskEngine {
        RiskEngine::new(RadarConfig::default(), sources)
    }

    #[tokio::test]
    async fn test_get_risk_merges_sources() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine(market_sources(&calls));

        let score = engine.get_risk(Category::Market).await;

        assert!((score.value - 45.5).abs() < 1e-9, "got {}", score.value);
        assert_eq!(score.confidence, 1.0);
        assert!(!score.is_stale);
        assert!(!score.defaulted);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(engine.history().recent(Category::Market).len(), 1);
    }

    #[tokio::test]
    async fn test_get_risk_uses_cache_within_ttl() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine(market_sources(&calls));

        let first = engine.get_risk(Category::Market).await;
        let second = engine.get_risk(Category::Market).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(first.value, second.value);
        // Cache hits add no history points.
        assert_eq!(engine.history().len(Category::Market), 1);
    }

    #[tokio::test]
    async fn test_get_risk_defaults_when_all_sources_fail() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine(vec![source("bls:LNS14000000", None, &calls, Category::Hr)]);

        let score = engine.get_risk(Category::Hr).await;

        assert!(score.defaulted);
        assert!(score.is_stale);
        assert_eq!(score.value, 50.0);
        assert_eq!(engine.history().len(Category::Hr), 0);
    }

    #[tokio::test]
    async fn test_partial_failure_is_stale_but_scored() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut sources = market_sources(&calls);
        sources.push(source("broken", None, &calls, Category::Market));
        let engine = engine(sources);

        let score = engine.get_risk(Category::Market).await;

        assert!(score.is_stale);
        assert!(!score.defaulted);
        assert!((score.value - 45.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_overall_is_weighted_blend() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine(all_sources(&calls));

        let snapshot = engine.get_overall_risk().await.unwrap();

        let weights = engine.config().weights;
        let expected: f64 = snapshot
            .scores
            .iter()
            .map(|s| weights.get(s.category) * s.value)
            .sum();
        assert_eq!(snapshot.scores.len(), 4);
        assert!((snapshot.overall.value - expected).abs() < 1e-9);
        assert!(!snapshot.overall.is_stale);
        assert!(snapshot.score(Category::Hr).is_some());
    }

    #[tokio::test]
    async fn test_overall_with_missing_category_uses_default() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine(market_sources(&calls));

        let snapshot = engine.get_overall_risk().await.unwrap();

        let hr = snapshot.score(Category::Hr).unwrap();
        assert!(hr.defaulted);
        assert!(snapshot.overall.is_stale);
    }

    #[tokio::test]
    async fn test_simulate_rejects_iterations_before_fetching() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine(market_sources(&calls));

        for bad in [50, 200_000] {
            let err = engine
                .simulate(Category::Market, Some(bad), false)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidIterationCount { .. }));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_simulate_centers_on_current_score() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine(market_sources(&calls));

        let result = engine
            .simulate(Category::Market, Some(10_000), false)
            .await
            .unwrap();

        assert_eq!(result.iteration_count, 10_000);
        assert!((result.center - 45.5).abs() < 1e-9);
        assert_eq!(result.spread, engine.config().simulation.default_spread);
        assert!((result.mean - 45.5).abs() < 1.5);
        let p5 = result.percentile(5).unwrap();
        let p95 = result.percentile(95).unwrap();
        assert!(p5 <= result.percentile(50).unwrap() && result.percentile(50).unwrap() <= p95);
    }

    #[tokio::test]
    async fn test_simulate_uses_history() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine(market_sources(&calls));
        engine.history().record(Category::Market, 40.0);
        engine.history().record(Category::Market, 60.0);

        let result = engine
            .simulate(Category::Market, Some(1_000), true)
            .await
            .unwrap();

        assert_eq!(result.center, 50.0);
        assert_eq!(result.spread, 10.0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_scenarios_are_ordered() {
        let engine = engine(Vec::new());

        for category in Category::ALL {
            let set = engine.scenarios(category).await.unwrap();

            assert!(set.optimistic.mean < set.baseline.mean, "{category}");
            assert!(set.baseline.mean < set.pessimistic.mean, "{category}");
            assert_eq!(set.get(Scenario::Baseline).center, 50.0);
            assert_eq!(set.category, category);
        }
    }

    #[tokio::test]
    async fn test_concurrent_queries_record_history_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine(vec![hr_source(&calls, Duration::from_millis(50))]);

        let (a, b, c) = tokio::join!(
            engine.get_risk(Category::Hr),
            engine.get_risk(Category::Hr),
            engine.get_risk(Category::Hr),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.value, b.value);
        assert_eq!(b.value, c.value);
        assert_eq!(engine.history().recent(Category::Hr).len(), 1);
    }

    #[tokio::test]
    async fn test_shared_refresh_counts_as_current() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine(vec![hr_source(&calls, Duration::from_millis(50))]);

        let (score, report) = tokio::join!(
            engine.get_risk(Category::Hr),
            engine.sweep(),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!score.is_stale);
        assert!(report.success());
        assert_eq!(report.refreshed, vec!["hr/bls:LNS14000000"]);
        assert_eq!(engine.history().recent(Category::Hr).len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_forces_fetch_and_reports() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut sources = market_sources(&calls);
        sources.push(source("broken", None, &calls, Category::Market));
        let engine = engine(sources);

        engine.get_risk(Category::Market).await;
        let report = engine.refresh(Some(&[Category::Market])).await;

        assert_eq!(calls.load(Ordering::SeqCst), 8);
        assert_eq!(report.categories, vec![Category::Market]);
        assert_eq!(report.refreshed.len(), 3);
        assert_eq!(report.failed, vec!["market/broken".to_string()]);
        assert!(!report.success());
    }

    #[tokio::test]
    async fn test_sweep_skips_fresh_sources() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine(all_sources(&calls));

        engine.get_overall_risk().await.unwrap();
        let report = engine.sweep().await;

        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert!(report.success());
        assert_eq!(report.categories, Category::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_trigger_refresh_runs_in_background() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine(all_sources(&calls));

        let report = engine.trigger_refresh(None).await.unwrap();

        assert_eq!(report.refreshed.len(), 6);
        let status = engine.cache_status();
        assert_eq!(status.len(), 4);
        assert_eq!(status.iter().map(|s| s.fresh_count).sum::<usize>(), 6);
    }
}
