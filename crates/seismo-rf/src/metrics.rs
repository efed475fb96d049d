//! Regression metrics.

use crate::error::RfError;

fn check_pair(actual: &[f64], predicted: &[f64]) -> Result<(), RfError> {
    if actual.is_empty() {
        return Err(RfError::EmptyDataset);
    }
    if actual.len() != predicted.len() {
        return Err(RfError::LengthMismatch {
            expected: actual.len(),
            got: predicted.len(),
        });
    }
    Ok(())
}

/// Mean absolute error: `Σ|y_i − ŷ_i| / n`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`RfError::EmptyDataset`] | `actual` is empty |
/// | [`RfError::LengthMismatch`] | `predicted` has a different length |
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> Result<f64, RfError> {
    check_pair(actual, predicted)?;
    let total: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(y, p)| (y - p).abs())
        .sum();
    Ok(total / actual.len() as f64)
}

/// Mean squared error: `Σ(y_i − ŷ_i)² / n`.
///
/// # Errors
///
/// Same conditions as [`mean_absolute_error`].
pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> Result<f64, RfError> {
    check_pair(actual, predicted)?;
    let total: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(y, p)| (y - p).powi(2))
        .sum();
    Ok(total / actual.len() as f64)
}

/// Coefficient of determination: `1 − SS_res / SS_tot`.
///
/// When the actual values are constant (`SS_tot == 0`) the score is 1.0 for
/// a perfect prediction and 0.0 otherwise, rather than NaN/−∞.
///
/// # Errors
///
/// Same conditions as [`mean_absolute_error`].
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> Result<f64, RfError> {
    check_pair(actual, predicted)?;
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|y| (y - mean).powi(2)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(y, p)| (y - p).powi(2))
        .sum();
    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

/// Mean and population standard deviation of `values`.
///
/// Returns `(NaN, NaN)` for an empty slice.
#[must_use]
pub fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
