//! Shared types, config, and error definitions for risk-radar.

pub mod config;
pub mod error;
pub mod types;

pub use config::RadarConfig;
pub use error::Error;
pub use types::*;

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
