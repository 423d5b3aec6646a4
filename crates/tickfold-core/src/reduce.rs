//! Shared reduction helpers over flat `f64` buffers
//!
//! Arrays and views both delegate here; a property column is the strided
//! subsequence `data[prop], data[prop + properties], ...`.

/// Sum of every element. Empty input sums to zero.
pub fn sum(data: &[f64]) -> f64 {
    data.iter().sum()
}

/// Arithmetic mean. NaN for empty input.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    sum(data) / data.len() as f64
}

/// Median by total order (NaN sorts last). NaN for empty input; the mean of
/// the two middle elements for even lengths.
pub fn median(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    let mut sorted = data.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

/// Iterator over one property column of an item-major buffer.
pub fn column(data: &[f64], properties: usize, prop: usize) -> impl Iterator<Item = f64> + '_ {
    debug_assert!(prop < properties, "property {prop} out of {properties}");
    data.get(prop..)
        .unwrap_or(&[])
        .iter()
        .step_by(properties.max(1))
        .copied()
}

/// Sum of one property column.
pub fn column_sum(data: &[f64], properties: usize, prop: usize) -> f64 {
    column(data, properties, prop).sum()
}

/// Mean of one property column. NaN when the buffer holds no items.
pub fn column_mean(data: &[f64], properties: usize, prop: usize) -> f64 {
    let count = data.len() / properties.max(1);
    if count == 0 {
        return f64::NAN;
    }
    column_sum(data, properties, prop) / count as f64
}

/// Median of one property column. NaN when the buffer holds no items.
pub fn column_median(data: &[f64], properties: usize, prop: usize) -> f64 {
    let values: Vec<f64> = column(data, properties, prop).collect();
    median(&values)
}
