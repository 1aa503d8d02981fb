//! Rounding, averaging and summary helpers shared by the metric calculations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Round to one decimal place.
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Signed hours from `from` to `to`.
#[must_use]
#[expect(clippy::cast_precision_loss, reason = "second precision is plenty for hour-scale durations")]
pub fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / SECONDS_PER_HOUR
}

/// Arithmetic mean, rounded to one decimal. `None` for an empty input.
#[must_use]
#[expect(clippy::cast_precision_loss, reason = "acceptable for statistics")]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    Some(round1(values.iter().sum::<f64>() / values.len() as f64))
}

/// `part / whole * 100`, rounded to one decimal. `None` when `whole` is zero.
#[must_use]
#[expect(clippy::cast_precision_loss, reason = "acceptable for statistics")]
pub fn percentage(part: usize, whole: usize) -> Option<f64> {
    (whole > 0).then(|| round1(part as f64 / whole as f64 * 100.0))
}

/// Mean, median, minimum and maximum of a sample, each rounded to one decimal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

impl Summary {
    /// Summarize the finite values of a sample. `None` when nothing is left.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "acceptable for statistics")]
    pub fn of(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut values: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        if values.is_empty() {
            return None;
        }

        values.sort_by(f64::total_cmp);

        let count = values.len();
        let mid = count / 2;
        let median = if count % 2 == 0 {
            (values[mid - 1] + values[mid]) / 2.0
        } else {
            values[mid]
        };

        Some(Self {
            count,
            mean: round1(values.iter().sum::<f64>() / count as f64),
            median: round1(median),
            min: round1(values[0]),
            max: round1(values[count - 1]),
        })
    }
}
