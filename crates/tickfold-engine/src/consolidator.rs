//! Consolidation state machine
//!
//! Ingests `(time, sample)` pairs, folds them into a working window through a
//! [`BarAggregator`], and decides per update (and on a clock-driven
//! [`scan`](Consolidator::scan)) when to publish the window and start a new
//! one.
//!
//! The aggregation/emission ordering is load-bearing: count-triggered modes
//! (and the zero-length period) fold the closing sample into its bar before
//! the emission check, so a window that closes on a sample includes it; pure
//! time mode folds after, so a sample on the bucket boundary opens the next
//! window instead of landing in the one being closed.

use smallvec::SmallVec;
use thiserror::Error;
use tickfold_core::NumericArray;

use crate::aggregate::BarAggregator;
use crate::config::{ConfigError, ConsolidatorConfig};
use crate::period::BarPeriod;

type BarHandler = Box<dyn FnMut(i64, &NumericArray) + Send>;
type ResetHandler = Box<dyn FnMut(&str) + Send>;

/// Bar consolidator: one logical writer feeds samples in arrival order;
/// subscribers observe bars synchronously, in call order, before `update`
/// returns.
///
/// The working window is mutated in place between emissions and dropped
/// (routing its buffer to the reclaimer) after publication, so a subscriber
/// that retains a bar past the callback must clone it.
pub struct Consolidator<A: BarAggregator> {
    name: String,
    period: BarPeriod,
    aggregator: A,
    working: Option<NumericArray>,
    working_start: i64,
    samples_since_emit: u32,
    total_samples: u64,
    bars_emitted: u64,
    last_emit: Option<i64>,
    bar_handlers: SmallVec<[BarHandler; 2]>,
    reset_handlers: SmallVec<[ResetHandler; 1]>,
}

impl<A: BarAggregator> Consolidator<A> {
    /// Build a consolidator from construction options. Fails fast on a
    /// configuration that could never emit.
    pub fn new(config: &ConsolidatorConfig, aggregator: A) -> Result<Self, ConfigError> {
        let period = config.build()?;
        tracing::debug!(?period, "consolidator created");
        Ok(Self {
            name: "consolidator".to_string(),
            period,
            aggregator,
            working: None,
            working_start: 0,
            samples_since_emit: 0,
            total_samples: 0,
            bars_emitted: 0,
            last_emit: None,
            bar_handlers: SmallVec::new(),
            reset_handlers: SmallVec::new(),
        })
    }

    /// Name reported as the source of reset events.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Subscribe to emitted bars: `(window_start_time, window)`.
    pub fn on_bar<F>(&mut self, handler: F)
    where
        F: FnMut(i64, &NumericArray) + Send + 'static,
    {
        self.bar_handlers.push(Box::new(handler));
    }

    /// Subscribe to resets; the argument is the consolidator's name.
    pub fn on_reset<F>(&mut self, handler: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.reset_handlers.push(Box::new(handler));
    }

    /// The bar currently being built, if a window is open. Read this before
    /// `reset` if the partial window is needed.
    pub fn working_data(&self) -> Option<&NumericArray> {
        self.working.as_ref()
    }

    /// The active window policy.
    pub fn period(&self) -> &BarPeriod {
        &self.period
    }

    /// Samples ingested since construction or the last reset.
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    /// Bars published since construction or the last reset.
    pub fn bars_emitted(&self) -> u64 {
        self.bars_emitted
    }

    /// Ingest one sample. Returns whether a bar was emitted by this call;
    /// the event (if any) has already been delivered when this returns.
    pub fn update(&mut self, time: i64, sample: &NumericArray) -> bool {
        self.total_samples += 1;

        let mut should_emit = false;
        if let Some(max_count) = self.period.max_count() {
            self.samples_since_emit += 1;
            if self.samples_since_emit >= max_count {
                self.samples_since_emit = 0;
                should_emit = true;
            }
        }

        if self.last_emit.is_none() {
            // Time-driven bookkeeping measures against bucket boundaries from
            // the epoch; count mode measures from the first sample.
            self.last_emit = Some(if self.period.is_time_based() { 0 } else { time });
        }

        let mut aggregate_before_emit = self.period.aggregates_before_emit();
        if let Some(period_ms) = self.period.period_ms() {
            if period_ms == 0 {
                // Degenerate window: every sample closes its own bar, and the
                // closing sample is always part of it.
                should_emit = true;
                aggregate_before_emit = true;
            } else if self.working.is_some()
                && time - self.working_start >= period_ms
                && self.period.rounded_bar_time(time) > self.last_emit.unwrap_or(0)
            {
                should_emit = true;
            }
        }

        if aggregate_before_emit {
            self.aggregate(time, sample);
        }

        let mut emitted = false;
        if should_emit {
            emitted = self.emit(time);
        }

        if !aggregate_before_emit {
            // Deferred fold: a sample belonging to the next bucket lands in
            // the fresh window, never in the bar just closed.
            self.aggregate(time, sample);
        }

        emitted
    }

    /// Ingest a pre-sorted batch. Validates `(time)` ordering up front and
    /// returns the number of bars emitted; identical bar boundaries to
    /// feeding the same samples through `update` one at a time.
    pub fn update_many(&mut self, samples: &[(i64, NumericArray)]) -> Result<usize, UpdateError> {
        for index in 1..samples.len() {
            let prev_time = samples[index - 1].0;
            let curr_time = samples[index].0;
            if curr_time < prev_time {
                return Err(UpdateError::UnsortedSamples {
                    index,
                    prev_time,
                    curr_time,
                });
            }
        }

        let mut emitted = 0;
        for (time, sample) in samples {
            if self.update(*time, sample) {
                emitted += 1;
            }
        }
        Ok(emitted)
    }

    /// Clock-driven nudge with no new sample: closes an open window whose
    /// period has elapsed by `time`. Repeating the same call is a no-op once
    /// the window has been emitted.
    pub fn scan(&mut self, time: i64) {
        let Some(period_ms) = self.period.period_ms() else {
            return;
        };
        if period_ms == 0 || self.working.is_none() {
            return;
        }
        let rounded = self.period.rounded_bar_time(time);
        if rounded - self.working_start >= period_ms && rounded > self.last_emit.unwrap_or(0) {
            if let Some(window) = self.working.take() {
                self.last_emit = Some(self.working_start + period_ms);
                self.publish(self.working_start, &window);
            }
        }
    }

    /// Drop the open window without emitting it and clear every counter,
    /// returning the machine to its initial state. Fires the reset event.
    pub fn reset(&mut self) {
        self.working = None;
        self.working_start = 0;
        self.samples_since_emit = 0;
        self.total_samples = 0;
        self.bars_emitted = 0;
        self.last_emit = None;
        tracing::debug!(name = %self.name, "consolidator reset");
        for handler in &mut self.reset_handlers {
            handler(&self.name);
        }
    }

    /// Fold `sample` into the working window unless it predates the last
    /// emission, opening a new window at the rounded bar time if needed.
    fn aggregate(&mut self, time: i64, sample: &NumericArray) {
        if time < self.last_emit.unwrap_or(0) {
            return;
        }
        let opening = self.working.is_none();
        self.aggregator.aggregate(&mut self.working, sample);
        if opening && self.working.is_some() {
            self.working_start = self.period.rounded_bar_time(time);
        }
    }

    /// Close the working window. `last_emit` advances to the next bucket
    /// boundary in pure time mode and to the sample time otherwise.
    fn emit(&mut self, time: i64) -> bool {
        let window = self.working.take();
        let start = self.working_start;
        self.last_emit = Some(match (&window, self.period.period_ms()) {
            (Some(_), Some(period_ms)) if self.period.is_time_based() => start + period_ms,
            _ => time,
        });
        match window {
            Some(window) => {
                self.publish(start, &window);
                true
            }
            None => false,
        }
    }

    fn publish(&mut self, start: i64, window: &NumericArray) {
        self.bars_emitted += 1;
        for handler in &mut self.bar_handlers {
            handler(start, window);
        }
        // Dropping the window after delivery routes its buffer to the
        // reclaimer; subscribers that kept data cloned it during the call.
    }
}

impl<A: BarAggregator> std::fmt::Debug for Consolidator<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consolidator")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("window_open", &self.working.is_some())
            .field("total_samples", &self.total_samples)
            .field("bars_emitted", &self.bars_emitted)
            .finish()
    }
}

/// Batch ingestion errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    #[error("samples not sorted at index {index}: prev={prev_time}, curr={curr_time}")]
    UnsortedSamples {
        index: usize,
        prev_time: i64,
        curr_time: i64,
    },
}
