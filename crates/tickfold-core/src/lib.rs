//! Numeric array core for streaming time-series aggregation
//!
//! Provides the two-dimensional (items x properties) `f64` buffer abstraction
//! that every value in the toolkit flows through, together with the deferred
//! reclaimer that releases backing stores off the dropping thread.
//!
//! ## Features
//!
//! - Four backing-store variants behind one indexed read/write contract
//! - Zero-copy views for slicing and reshaping
//! - Fixed-layout record reinterpretation and casting
//! - Background reclamation: dropping an array never frees on the caller's thread

pub mod array;
pub mod error;
pub mod reclaim;
pub mod record;
pub mod reduce;

// Re-export commonly used types
pub use array::{ArrayView, NumericArray};
pub use error::ArrayError;
pub use reclaim::{Reclaim, Reclaimer};
pub use record::DoubleRecord;
