//! Bar consolidation engine
//!
//! Folds a stream of `(time, sample)` pairs into discrete bars that close on
//! a fixed time period, a fixed sample count, or whichever of the two is hit
//! first.
//!
//! ## Features
//!
//! - Exact left-closed bucket boundaries: a sample on the boundary opens the
//!   next bar, it never lands in the one being closed
//! - Count and mixed modes fold the closing sample into its bar
//! - Clock-driven `scan` closes aged bars between samples
//! - Pluggable aggregation: pass-through, tick-to-OHLCV, OHLCV re-bucketing

pub mod aggregate;
pub mod config;
pub mod consolidator;
pub mod period;

// Re-export commonly used types
pub use aggregate::{
    BarAggregator, OhlcvBarAggregator, OhlcvRecord, PassThroughAggregator, TickBarAggregator,
};
pub use config::{ConfigError, ConsolidatorConfig};
pub use consolidator::{Consolidator, UpdateError};
pub use period::BarPeriod;
