//! Volatility engine and its building blocks
//!
//! - `returns`: daily returns, mean, sample variance
//! - `trend`: direction and change over the window
//! - `risk`: risk level thresholds
//! - `vol`: the engine that assembles a `VolatilityReport`

pub mod returns;
pub mod risk;
pub mod trend;
pub mod vol;

pub use vol::VolatilityEngine;
