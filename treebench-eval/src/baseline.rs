//! Baseline Data Extraction
//!
//! A case summary is flattened into per-statistic entries. Every `Stats`
//! leaf expands to five entries (`mean`, `median`, `dev`, `cv`, `runs`),
//! named by the dotted path down through the summary groupings. Scalar
//! entries are informational only and never become baseline material.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use treebench_stats::{Stats, Summary, SummaryValue};

use crate::eval::EvalState;

/// One comparable statistic extracted from a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineEntry {
    /// Statistic name, `<dataPath>.<stat>` (e.g. `runtime.mean`)
    pub stat: String,
    /// Recorded baseline value
    pub base: f64,
    /// Ratio bounds applied during eval; `None` means the statistic is skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<[f64; 2]>,
    /// Value observed in the eval run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Percent delta `(value - base) / base * 100` (absent when base is 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
    /// Eval classification, populated by `evaluate`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval: Option<EvalState>,
}

/// Baseline entries of one case, keyed by data path within the summary.
pub type CaseBaseline = BTreeMap<String, Vec<BaselineEntry>>;

/// Baseline entries of a whole run, keyed by case path string (`a|b|c`).
pub type BaselineData = BTreeMap<String, CaseBaseline>;

/// Flatten a case summary into baseline entries keyed by data path.
pub fn create_baseline_data(summary: &Summary) -> CaseBaseline {
    let mut data = CaseBaseline::new();
    descend(summary, "", &mut data);
    data
}

fn descend(summary: &Summary, prefix: &str, out: &mut CaseBaseline) {
    for (key, value) in summary {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            SummaryValue::Stats(stats) => {
                out.insert(path.clone(), expand_stats(&path, stats));
            }
            SummaryValue::Group { entries } => descend(entries, &path, out),
            SummaryValue::Scalar { .. } => {}
        }
    }
}

fn expand_stats(data_path: &str, stats: &Stats) -> Vec<BaselineEntry> {
    [
        ("mean", stats.mean),
        ("median", stats.median),
        ("dev", stats.dev),
        ("cv", stats.cv),
        ("runs", stats.runs as f64),
    ]
    .into_iter()
    .map(|(name, base)| BaselineEntry {
        stat: format!("{data_path}.{name}"),
        base,
        tolerance: None,
        value: None,
        change: None,
        eval: None,
    })
    .collect()
}
