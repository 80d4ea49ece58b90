//! Summary Statistics
//!
//! A case summary is a small tree: nested groupings with `Stats` leaves at
//! the bottom. The leaf is an explicit variant rather than a duck-typed
//! object so the eval engine never has to guess whether a map that happens
//! to contain a `mean` key is a statistic or a grouping.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Descriptive statistics over one numeric series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// Arithmetic mean
    pub mean: f64,
    /// Median (midpoint average for even-sized series)
    pub median: f64,
    /// Sample standard deviation (n-1 denominator, 0.0 below two samples)
    pub dev: f64,
    /// Coefficient of variation, `dev / mean` (0.0 when the mean is 0)
    pub cv: f64,
    /// Number of samples the statistics were computed from
    pub runs: usize,
}

/// One value in a case summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SummaryValue {
    /// A plain number (averages, counters); not baseline material.
    Scalar {
        /// The numeric value
        value: f64,
    },
    /// A statistic leaf, expanded by the baseline engine.
    Stats(Stats),
    /// A nested grouping of further summary values.
    Group {
        /// Child entries, keyed by name
        entries: Summary,
    },
}

/// A case summary: ordered mapping from key to summary value.
pub type Summary = BTreeMap<String, SummaryValue>;

impl SummaryValue {
    /// Convenience constructor for a scalar entry.
    pub fn scalar(value: f64) -> Self {
        SummaryValue::Scalar { value }
    }

    /// Convenience constructor for a grouping entry.
    pub fn group(entries: Summary) -> Self {
        SummaryValue::Group { entries }
    }
}

/// Compute descriptive statistics over a series.
///
/// An empty series yields all-zero statistics with `runs == 0`.
pub fn descriptive_stats(samples: &[f64]) -> Stats {
    if samples.is_empty() {
        return Stats {
            mean: 0.0,
            median: 0.0,
            dev: 0.0,
            cv: 0.0,
            runs: 0,
        };
    }

    let n = samples.len();
    let mean = samples.iter().sum::<f64>() / n as f64;

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };

    let dev = if n < 2 {
        0.0
    } else {
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        variance.sqrt()
    };

    let cv = if mean == 0.0 { 0.0 } else { dev / mean };

    Stats {
        mean,
        median,
        dev,
        cv,
        runs: n,
    }
}
