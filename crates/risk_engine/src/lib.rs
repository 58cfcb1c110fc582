//! Risk scoring and simulation over cached provider data.
//!
//! Flow: source fetchers → source cache → scorer → (history →) simulator,
//! fronted by [`RiskEngine`].

pub mod cache;
pub mod engine;
pub mod history;
pub mod refresh;
pub mod scorer;
pub mod simulation;

pub use cache::{CacheEntry, CacheLookup, LookupOrigin, RefreshMode, SourceCache};
pub use engine::RiskEngine;
pub use history::ScoreHistory;
pub use refresh::spawn_refresh_loop;
pub use scorer::RiskScorer;
pub use simulation::{DistributionParams, MAX_ITERATIONS, MIN_ITERATIONS};
