//! risk-radar: enterprise risk aggregation and simulation.
//!
//! One-shot commands print a JSON result and exit; `serve` keeps the source
//! cache warm with a background sweep until Ctrl+C.

mod config;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use common::{Category, Error};
use risk_engine::{spawn_refresh_loop, RiskEngine};

/// Enterprise risk radar
#[derive(Parser)]
#[command(name = "risk-radar", about = "Enterprise risk aggregation and simulation")]
struct Cli {
    /// TOML config file (defaults to ./config.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Current score for one category (market, supply_chain, regulatory, hr).
    Risk { category: String },
    /// All category scores and the weighted overall score.
    Overall,
    /// Monte Carlo simulation for one category.
    Simulate {
        category: String,
        #[arg(long)]
        iterations: Option<usize>,
        /// Ignore score history; center on the current score.
        #[arg(long)]
        no_cache: bool,
    },
    /// Optimistic, baseline and pessimistic simulations.
    Scenarios { category: String },
    /// Cache freshness per category.
    Status,
    /// Force-refresh sources (all categories unless given).
    Refresh {
        #[arg(long = "category")]
        categories: Vec<String>,
    },
    /// Run the background refresh loop until Ctrl+C.
    Serve,
}

fn parse_category(raw: &str) -> Result<Category, Error> {
    raw.parse()
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(command: Command, engine: RiskEngine) -> Result<(), Error> {
    match command {
        Command::Risk { category } => {
            let score = engine.get_risk(parse_category(&category)?).await;
            print_json(&score)
        }
        Command::Overall => print_json(&engine.get_overall_risk().await?),
        Command::Simulate {
            category,
            iterations,
            no_cache,
        } => {
            let category = parse_category(&category)?;
            print_json(&engine.simulate(category, iterations, !no_cache).await?)
        }
        Command::Scenarios { category } => {
            print_json(&engine.scenarios(parse_category(&category)?).await?)
        }
        Command::Status => print_json(&engine.cache_status()),
        Command::Refresh { categories } => {
            let categories = categories
                .iter()
                .map(|c| parse_category(c))
                .collect::<Result<Vec<_>, _>>()?;
            let selected = (!categories.is_empty()).then_some(categories.as_slice());
            let report = engine.refresh(selected).await;
            if !report.success() {
                warn!("{} sources failed to refresh", report.failed.len());
            }
            print_json(&report)
        }
        Command::Serve => {
            serve(engine).await;
            Ok(())
        }
    }
}

async fn serve(engine: RiskEngine) {
    let cfg = engine.config();
    let cancel = CancellationToken::new();

    let mut refresh_handle = spawn_refresh_loop(
        engine.clone(),
        Duration::from_secs(cfg.refresh.interval_secs),
        cancel.clone(),
    );

    let hb_engine = engine.clone();
    let hb_cancel = cancel.clone();
    let heartbeat = Duration::from_secs(cfg.refresh.heartbeat_secs);
    let heartbeat_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(heartbeat);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = hb_cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            let status = hb_engine.cache_status();
            let per_category: Vec<String> = status
                .iter()
                .map(|s| format!("{}={}/{}", s.category, s.fresh_count, s.source_count))
                .collect();
            info!(
                "HEARTBEAT: sources={} fresh={} expired={} [{}]",
                status.iter().map(|s| s.source_count).sum::<usize>(),
                status.iter().map(|s| s.fresh_count).sum::<usize>(),
                status.iter().map(|s| s.expired_count).sum::<usize>(),
                per_category.join(" ")
            );
        }
    });

    info!("Serving. Press Ctrl+C to stop.");

    let refresh_exited = tokio::select! {
        r = tokio::signal::ctrl_c() => {
            if let Err(e) = r {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
            info!("Shutdown signal received");
            false
        }
        r = &mut refresh_handle => {
            error!("Refresh loop exited: {:?}", r);
            true
        }
    };

    cancel.cancel();
    if !refresh_exited {
        if let Err(e) = refresh_handle.await {
            warn!("Refresh loop join failed: {}", e);
        }
    }
    if let Err(e) = heartbeat_handle.await {
        warn!("Heartbeat join failed: {}", e);
    }
    info!("risk-radar stopped");
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout stays pure JSON.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "risk_radar=info,risk_engine=info,data_sources=info".into()
            }),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let cli = Cli::parse();

    let cfg = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Weights: market={:.2} supply_chain={:.2} regulatory={:.2} hr={:.2}",
        cfg.weights.market, cfg.weights.supply_chain, cfg.weights.regulatory, cfg.weights.hr,
    );
    info!(
        "Cache TTL {}s, fetch timeout {}s, refresh every {}s",
        cfg.cache.default_ttl_secs, cfg.cache.fetch_timeout_secs, cfg.refresh.interval_secs,
    );

    let engine = match RiskEngine::from_config(cfg) {
        Ok(e) => e,
        Err(e) => {
            error!("Failed to initialize data sources: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli.command, engine).await {
        if e.is_caller_error() {
            error!("Invalid request: {}", e);
        } else {
            error!("{}", e);
        }
        std::process::exit(1);
    }
}
