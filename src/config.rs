//! Configuration loader: merges .env, defaults, an optional TOML file, and
//! environment overrides, then validates the result.

use common::config::RadarConfig;
use common::{Category, Error, Scenario};
use risk_engine::{MAX_ITERATIONS, MIN_ITERATIONS};
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const WEIGHT_TOLERANCE: f64 = 1e-9;

fn parse_positive_f64(raw: &str, env_name: &str) -> Result<f64, Error> {
    let parsed = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::Config(format!("{env_name} must be a number > 0")))?;
    if !parsed.is_finite() || parsed <= 0.0 {
        return Err(Error::Config(format!("{env_name} must be a number > 0")));
    }
    Ok(parsed)
}

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn hours_to_secs(hours: f64) -> u64 {
    (hours * 3600.0).round().max(1.0) as u64
}

fn validate_iterations(name: &str, n: usize, issues: &mut Vec<String>) {
    if !(MIN_ITERATIONS..=MAX_ITERATIONS).contains(&n) {
        issues.push(format!(
            "{name} must be within [{MIN_ITERATIONS}, {MAX_ITERATIONS}]"
        ));
    }
}

fn is_valid_spread(spread: f64) -> bool {
    spread.is_finite() && spread >= 0.0
}

pub fn validate_config(config: &RadarConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    for category in Category::ALL {
        let w = config.weights.get(category);
        if !(0.0..=1.0).contains(&w) {
            issues.push(format!("weights.{category} must be in [0,1]"));
        }
        let d = config.default_scores.get(category);
        if !(0.0..=100.0).contains(&d) {
            issues.push(format!("default_scores.{category} must be in [0,100]"));
        }
    }
    if (config.weights.total() - 1.0).abs() > WEIGHT_TOLERANCE {
        issues.push(format!(
            "weights must sum to 1.0 (got {})",
            config.weights.total()
        ));
    }

    if config.cache.default_ttl_secs == 0 {
        issues.push("cache.default_ttl_secs must be > 0".into());
    }
    for (provider, ttl) in &config.cache.ttl_overrides {
        if *ttl == 0 {
            issues.push(format!("cache.ttl_overrides.{provider} must be > 0"));
        }
    }
    if config.cache.fetch_timeout_secs == 0 {
        issues.push("cache.fetch_timeout_secs must be > 0".into());
    }
    if config.refresh.interval_secs == 0 {
        issues.push("refresh.interval_secs must be > 0".into());
    }
    if config.refresh.heartbeat_secs == 0 {
        issues.push("refresh.heartbeat_secs must be > 0".into());
    }

    let sim = &config.simulation;
    validate_iterations("simulation.default_iterations", sim.default_iterations, &mut issues);
    if !(0.0..=100.0).contains(&sim.default_center) {
        issues.push("simulation.default_center must be in [0,100]".into());
    }
    if !is_valid_spread(sim.default_spread) {
        issues.push("simulation.default_spread must be finite and >= 0".into());
    }
    if !is_valid_spread(sim.min_spread) {
        issues.push("simulation.min_spread must be finite and >= 0".into());
    }
    if !is_valid_spread(sim.degenerate_spread) {
        issues.push("simulation.degenerate_spread must be finite and >= 0".into());
    }
    if sim.history_limit == 0 {
        issues.push("simulation.history_limit must be > 0".into());
    }

    let scenarios = &config.scenarios;
    validate_iterations("scenarios.iterations", scenarios.iterations, &mut issues);
    for scenario in Scenario::ALL {
        let anchor = scenarios.anchor(scenario);
        if !(0.0..=100.0).contains(&anchor.center) {
            issues.push(format!("scenarios.{}.center must be in [0,100]", scenario.as_str()));
        }
        if !is_valid_spread(anchor.spread) {
            issues.push(format!(
                "scenarios.{}.spread must be finite and >= 0",
                scenario.as_str()
            ));
        }
    }
    if !(scenarios.optimistic.center < scenarios.baseline.center
        && scenarios.baseline.center < scenarios.pessimistic.center)
    {
        issues.push(
            "scenario centers must be ordered optimistic < baseline < pessimistic".into(),
        );
    }

    if config.sources.stock_symbol.trim().is_empty() {
        issues.push("sources.stock_symbol must not be empty".into());
    }
    if config.sources.news_query.trim().is_empty() {
        issues.push("sources.news_query must not be empty".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Apply environment overrides (highest priority) to `config`.
fn apply_env_overrides(
    config: &mut RadarConfig,
    var: impl Fn(&str) -> Option<String>,
) -> Result<(), Error> {
    if let Some(key) = var("ALPHA_VANTAGE_API_KEY") {
        config.api_keys.alpha_vantage = key;
    }
    if let Some(key) = var("FRED_API_KEY") {
        config.api_keys.fred = key;
    }
    if let Some(key) = var("NEWS_API_KEY") {
        config.api_keys.news_api = key;
    }
    if let Some(raw) = var("CACHE_EXPIRY_HOURS") {
        config.cache.default_ttl_secs =
            hours_to_secs(parse_positive_f64(&raw, "CACHE_EXPIRY_HOURS")?);
    }
    if let Some(raw) = var("DATA_REFRESH_INTERVAL_HOURS") {
        config.refresh.interval_secs =
            hours_to_secs(parse_positive_f64(&raw, "DATA_REFRESH_INTERVAL_HOURS")?);
    }
    if let Some(raw) = var("FETCH_TIMEOUT_SECS") {
        config.cache.fetch_timeout_secs = parse_positive_u64(&raw, "FETCH_TIMEOUT_SECS")?;
    }
    Ok(())
}

/// Load configuration from `.env`, an optional TOML file, and the environment.
///
/// An explicit `path` must exist; otherwise `config.toml` is read when present.
pub fn load_config(path: Option<&Path>) -> Result<RadarConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = RadarConfig::default();

    // 3. Layer the TOML file on top.
    let config_path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    if path.is_some() || config_path.exists() {
        let contents = std::fs::read_to_string(config_path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", config_path.display(), e))
        })?;
        config = toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", config_path.display(), e))
        })?;
    }

    // 4. Override with environment variables.
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    // 5. Missing API keys only disable their provider.
    for (name, key) in [
        ("ALPHA_VANTAGE_API_KEY", &config.api_keys.alpha_vantage),
        ("FRED_API_KEY", &config.api_keys.fred),
        ("NEWS_API_KEY", &config.api_keys.news_api),
    ] {
        if key.trim().is_empty() {
            tracing::warn!("{} not set; that provider will report unavailable", name);
        }
    }

    validate_config(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        validate_config(&RadarConfig::default()).unwrap();
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RadarConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("FRED_API_KEY", "abc"),
                ("CACHE_EXPIRY_HOURS", "6"),
                ("DATA_REFRESH_INTERVAL_HOURS", "0.5"),
                ("FETCH_TIMEOUT_SECS", "3"),
            ]),
        )
        .unwrap();

        assert_eq!(config.api_keys.fred, "abc");
        assert_eq!(config.cache.default_ttl_secs, 6 * 3600);
        assert_eq!(config.refresh.interval_secs, 1800);
        assert_eq!(config.cache.fetch_timeout_secs, 3);
    }

    #[test]
    fn test_bad_env_override_is_rejected() {
        let mut config = RadarConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("CACHE_EXPIRY_HOURS", "-1")]))
            .unwrap_err();
        assert!(err.to_string().contains("CACHE_EXPIRY_HOURS"));

        let err = apply_env_overrides(&mut config, env(&[("FETCH_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("FETCH_TIMEOUT_SECS"));
    }

    #[test]
    fn test_validation_collects_all_issues() {
        let mut config = RadarConfig::default();
        config.weights.market = 0.9;
        config.simulation.default_iterations = 10;
        config.scenarios.optimistic.center = 80.0;
        config.cache.default_ttl_secs = 0;

        let msg = validate_config(&config).unwrap_err().to_string();
        assert!(msg.contains("weights must sum to 1.0"));
        assert!(msg.contains("simulation.default_iterations"));
        assert!(msg.contains("optimistic < baseline < pessimistic"));
        assert!(msg.contains("cache.default_ttl_secs"));
    }

    #[test]
    fn test_infinite_spreads_rejected() {
        let mut config = RadarConfig::default();
        config.simulation.default_spread = f64::INFINITY;
        config.simulation.min_spread = f64::NAN;
        config.scenarios.pessimistic.spread = f64::INFINITY;

        let msg = validate_config(&config).unwrap_err().to_string();
        assert!(msg.contains("simulation.default_spread must be finite"));
        assert!(msg.contains("simulation.min_spread must be finite"));
        assert!(msg.contains("scenarios.pessimistic.spread must be finite"));
        assert!(!msg.contains("degenerate_spread"));
    }

    #[test]
    fn test_example_config_is_valid() {
        let config: RadarConfig =
            toml::from_str(include_str!("../config.example.toml")).unwrap();
        validate_config(&config).unwrap();
        assert_eq!(config.scenarios.pessimistic.spread, 15.0);
        assert_eq!(config.sources.quotas.sec_per_second, 10);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: RadarConfig = toml::from_str(
            r#"
            [weights]
            market = 0.4
            supply_chain = 0.2
            regulatory = 0.2
            hr = 0.2

            [cache.ttl_overrides]
            newsapi = 3600
            "#,
        )
        .unwrap();

        validate_config(&config).unwrap();
        assert_eq!(config.weights.market, 0.4);
        assert_eq!(config.simulation.default_iterations, 5000);
        assert_eq!(
            config.cache.ttl_for("newsapi"),
            std::time::Duration::from_secs(3600)
        );
    }
}
