//! Bar aggregation hooks
//!
//! [`BarAggregator`] is the consolidator's only point of extension: it
//! decides how a raw sample folds into the working window. Every hook here
//! is total over well-formed samples; a sample with the wrong property count
//! is a caller contract violation, checked by `debug_assert!` like the
//! unchecked array accessors.

use serde::{Deserialize, Serialize};
use tickfold_core::{DoubleRecord, NumericArray};

/// OHLCV property columns used by the concrete aggregators.
pub const OPEN: usize = 0;
pub const HIGH: usize = 1;
pub const LOW: usize = 2;
pub const CLOSE: usize = 3;
pub const VOLUME: usize = 4;

/// Folds raw samples into the working window.
///
/// When `window` is `None` the hook opens a new one; otherwise it mutates
/// the existing window in place (or replaces it).
pub trait BarAggregator {
    fn aggregate(&mut self, window: &mut Option<NumericArray>, sample: &NumericArray);
}

/// Replaces the window with a copy of each incoming sample. The emitted bar
/// is simply the last sample of the window.
#[derive(Debug, Default)]
pub struct PassThroughAggregator;

impl BarAggregator for PassThroughAggregator {
    fn aggregate(&mut self, window: &mut Option<NumericArray>, sample: &NumericArray) {
        *window = Some(sample.clone());
    }
}

/// Folds one-item `[price, volume]` tick samples into a one-item
/// `[open, high, low, close, volume]` window.
#[derive(Debug, Default)]
pub struct TickBarAggregator;

impl BarAggregator for TickBarAggregator {
    fn aggregate(&mut self, window: &mut Option<NumericArray>, sample: &NumericArray) {
        debug_assert!(
            sample.count() == 1 && sample.properties() >= 2,
            "tick sample must be one [price, volume] item"
        );
        let price = sample.get(0, 0);
        let volume = sample.get(0, 1);
        match window {
            None => {
                // Bar shape is static; allocation cannot fail.
                let mut bar = NumericArray::allocate(1, 5).expect("1x5 bar shape");
                bar.set(0, OPEN, price);
                bar.set(0, HIGH, price);
                bar.set(0, LOW, price);
                bar.set(0, CLOSE, price);
                bar.set(0, VOLUME, volume);
                *window = Some(bar);
            }
            Some(bar) => {
                if price > bar.get(0, HIGH) {
                    bar.set(0, HIGH, price);
                }
                if price < bar.get(0, LOW) {
                    bar.set(0, LOW, price);
                }
                bar.set(0, CLOSE, price);
                bar.set(0, VOLUME, bar.get(0, VOLUME) + volume);
            }
        }
    }
}

/// Re-buckets one-item OHLCV samples into a coarser one-item OHLCV window:
/// first open, max high, min low, last close, summed volume.
#[derive(Debug, Default)]
pub struct OhlcvBarAggregator;

impl BarAggregator for OhlcvBarAggregator {
    fn aggregate(&mut self, window: &mut Option<NumericArray>, sample: &NumericArray) {
        debug_assert!(
            sample.count() == 1 && sample.properties() >= 5,
            "OHLCV sample must be one [open, high, low, close, volume] item"
        );
        match window {
            None => {
                let mut bar = NumericArray::allocate(1, 5).expect("1x5 bar shape");
                for prop in OPEN..=VOLUME {
                    bar.set(0, prop, sample.get(0, prop));
                }
                *window = Some(bar);
            }
            Some(bar) => {
                if sample.get(0, HIGH) > bar.get(0, HIGH) {
                    bar.set(0, HIGH, sample.get(0, HIGH));
                }
                if sample.get(0, LOW) < bar.get(0, LOW) {
                    bar.set(0, LOW, sample.get(0, LOW));
                }
                bar.set(0, CLOSE, sample.get(0, CLOSE));
                bar.set(0, VOLUME, bar.get(0, VOLUME) + sample.get(0, VOLUME));
            }
        }
    }
}

/// Fixed-layout OHLCV record; bridges record-backed arrays and the
/// aggregators above.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcvRecord {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

// SAFETY: #[repr(C)], all fields f64, no padding.
unsafe impl DoubleRecord for OhlcvRecord {}

impl OhlcvRecord {
    /// Record for a single traded price, all four prices equal.
    pub fn from_tick(price: f64, volume: f64) -> Self {
        Self {
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(price: f64, volume: f64) -> NumericArray {
        NumericArray::from_slice(&[price, volume], 2).unwrap()
    }

    #[test]
    fn test_pass_through_replaces_window() {
        let mut aggregator = PassThroughAggregator;
        let mut window = None;

        aggregator.aggregate(&mut window, &tick(10.0, 1.0));
        aggregator.aggregate(&mut window, &tick(11.0, 2.0));

        let window = window.unwrap();
        assert_eq!(window.get(0, 0), 11.0);
        assert_eq!(window.get(0, 1), 2.0);
    }

    #[test]
    fn test_tick_aggregator_opens_bar_from_first_tick() {
        let mut aggregator = TickBarAggregator;
        let mut window = None;

        aggregator.aggregate(&mut window, &tick(100.0, 3.0));

        let bar = window.unwrap();
        assert_eq!(bar.get(0, OPEN), 100.0);
        assert_eq!(bar.get(0, HIGH), 100.0);
        assert_eq!(bar.get(0, LOW), 100.0);
        assert_eq!(bar.get(0, CLOSE), 100.0);
        assert_eq!(bar.get(0, VOLUME), 3.0);
    }

    #[test]
    fn test_tick_aggregator_tracks_extremes_and_volume() {
        let mut aggregator = TickBarAggregator;
        let mut window = None;

        aggregator.aggregate(&mut window, &tick(100.0, 1.0));
        aggregator.aggregate(&mut window, &tick(104.0, 2.0));
        aggregator.aggregate(&mut window, &tick(98.0, 1.5));
        aggregator.aggregate(&mut window, &tick(101.0, 0.5));

        let bar = window.unwrap();
        assert_eq!(bar.get(0, OPEN), 100.0);
        assert_eq!(bar.get(0, HIGH), 104.0);
        assert_eq!(bar.get(0, LOW), 98.0);
        assert_eq!(bar.get(0, CLOSE), 101.0);
        assert_eq!(bar.get(0, VOLUME), 5.0);
    }

    #[test]
    fn test_ohlcv_aggregator_rebuckets() {
        let mut aggregator = OhlcvBarAggregator;
        let mut window = None;

        let first =
            NumericArray::from_records(vec![OhlcvRecord::from_tick(100.0, 1.0)], false).unwrap();
        let second = NumericArray::from_records(
            vec![OhlcvRecord {
                open: 101.0,
                high: 105.0,
                low: 99.0,
                close: 104.0,
                volume: 2.0,
            }],
            false,
        )
        .unwrap();

        aggregator.aggregate(&mut window, &first);
        aggregator.aggregate(&mut window, &second);

        let bar = window.unwrap();
        assert_eq!(bar.get(0, OPEN), 100.0);
        assert_eq!(bar.get(0, HIGH), 105.0);
        assert_eq!(bar.get(0, LOW), 99.0);
        assert_eq!(bar.get(0, CLOSE), 104.0);
        assert_eq!(bar.get(0, VOLUME), 3.0);
    }

    #[test]
    fn test_ohlcv_record_layout() {
        assert_eq!(OhlcvRecord::DOUBLES, 5);
        let record = OhlcvRecord::from_tick(10.0, 2.0);
        assert_eq!(record.as_doubles(), &[10.0, 10.0, 10.0, 10.0, 2.0]);
    }
}
