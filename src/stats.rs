//! Small descriptive statistics shared by the calculators.
//!
//! All functions treat their input as a full population (divide by `n`).

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation, `None` for an empty slice.
///
/// A single value has zero spread.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let variance =
        values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Coefficient of variation (`std_dev / mean`).
///
/// Returns `Some(0.0)` when every value is zero, since there is no spread to
/// report. `None` for an empty slice or a non-positive mean with spread.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let sd = std_dev(values)?;
    if sd == 0.0 {
        return Some(0.0);
    }
    if mean <= 0.0 {
        return None;
    }
    Some(sd / mean)
}

/// Euclidean distance between two points.
pub fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (b.0 - a.0).hypot(b.1 - a.1)
}
