//! Property-based testing for array invariants
//!
//! Proves the shape-preserving contracts hold for all inputs.
//!
//! Invariants proven:
//! 1. Reshape round-trip: reshaping there and back is the identity
//! 2. Slice containment: `slice(start, stop).get(i, j) == get(start + i, j)`
//! 3. Clone independence: mutating a clone never touches the original
//! 4. Record cast/reinterpret agreement for whole-record widths

use proptest::prelude::*;
use tickfold::{DoubleRecord, NumericArray, OhlcvRecord};

fn shaped_array() -> impl Strategy<Value = NumericArray> {
    (1usize..16, 1usize..8).prop_flat_map(|(count, properties)| {
        prop::collection::vec(-1e6f64..1e6, count * properties)
            .prop_map(move |data| NumericArray::from_slice(&data, properties).unwrap())
    })
}

proptest! {
    /// Reshaping to any compatible shape and back yields identical contents.
    #[test]
    fn reshape_round_trip_is_identity(array in shaped_array()) {
        let len = array.len();
        for (new_count, new_properties) in [(len, 1), (1, len)] {
            let there = array.reshape(new_count, new_properties).unwrap();
            let back = there.reshape(array.count(), array.properties()).unwrap();
            prop_assert_eq!(back.as_slice(), array.as_slice());
        }
    }

    /// Every element of a slice maps to the parent at `start + i`.
    #[test]
    fn slice_containment(array in shaped_array()) {
        let count = array.count();
        for start in 0..count {
            for stop in (start + 1)..=count {
                let view = array.slice(start, stop).unwrap();
                prop_assert_eq!(view.count(), stop - start);
                for item in 0..view.count() {
                    for prop in 0..view.properties() {
                        prop_assert_eq!(view.get(item, prop), array.get(start + item, prop));
                    }
                }
            }
        }
    }

    /// A clone is value-identical but storage-independent.
    #[test]
    fn clone_is_independent(array in shaped_array()) {
        let mut clone = array.clone();
        prop_assert_eq!(clone.as_slice(), array.as_slice());
        prop_assert_ne!(&clone, &array);

        clone.fill(f64::MAX);
        for value in array.as_slice() {
            prop_assert!(*value < f64::MAX);
        }
    }

    /// A materialized sub-view equals the viewed region.
    #[test]
    fn view_to_array_copies_region(array in shaped_array()) {
        let count = array.count();
        let start = count / 3;
        let stop = count - count / 4;
        if start < stop {
            let owned = array.slice(start, stop).unwrap().to_array();
            let view = array.slice(start, stop).unwrap();
            prop_assert_eq!(owned.as_slice(), view.as_slice());
        }
    }

    /// For five-column arrays, casting to OHLCV records and viewing the raw
    /// buffer as records agree element for element.
    #[test]
    fn cast_and_reinterpret_agree(
        rows in prop::collection::vec((1.0f64..1e6, 0.0f64..1e6), 1..32)
    ) {
        let mut flat = Vec::with_capacity(rows.len() * OhlcvRecord::DOUBLES);
        for (price, volume) in &rows {
            flat.extend_from_slice(OhlcvRecord::from_tick(*price, *volume).as_doubles());
        }
        let array = NumericArray::from_slice(&flat, OhlcvRecord::DOUBLES).unwrap();

        let cast: Vec<OhlcvRecord> = array.cast(None);
        let viewed: &[OhlcvRecord] = array.reinterpret().unwrap();
        prop_assert_eq!(cast.as_slice(), viewed);
    }
}
