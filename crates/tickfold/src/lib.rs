//! Numeric time-series toolkit
//!
//! Umbrella crate re-exporting the array core and the consolidation engine.
//!
//! ## Quick start
//!
//! ```
//! use tickfold::{Consolidator, ConsolidatorConfig, NumericArray, TickBarAggregator};
//!
//! let mut minute_bars =
//!     Consolidator::new(&ConsolidatorConfig::period(60_000), TickBarAggregator)?;
//! minute_bars.on_bar(|time, bar| {
//!     println!("bar @ {time}: close {}", bar.get(0, 3));
//! });
//!
//! let tick = NumericArray::from_slice(&[50_000.0, 0.5], 2)?;
//! minute_bars.update(1_640_995_200_000, &tick);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use tickfold_core as core;
pub use tickfold_engine as engine;

// Flat re-exports of the common surface
pub use tickfold_core::{ArrayError, ArrayView, DoubleRecord, NumericArray, Reclaim, Reclaimer};
pub use tickfold_engine::{
    BarAggregator, BarPeriod, ConfigError, Consolidator, ConsolidatorConfig, OhlcvBarAggregator,
    OhlcvRecord, PassThroughAggregator, TickBarAggregator, UpdateError,
};
