//! Eval Classification
//!
//! Annotates baseline entries with the values observed in an eval run and
//! classifies every statistic. Entries are aligned by statistic key, never
//! by position; a baseline statistic the eval run does not expose is an
//! anomaly worth logging, not a silent misalignment.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::baseline::{BaselineData, CaseBaseline};
use crate::tolerance::EvalConfig;

/// Outcome of one statistic comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalState {
    /// Within tolerance (or both sides exactly zero)
    Success,
    /// No corresponding eval value exists
    Missing,
    /// Skip pattern matched; not compared
    Skipped,
    /// Ratio outside the tolerance bounds
    Failed,
}

/// Aggregate counts over one eval run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalSummary {
    /// Statistics within tolerance
    pub success: usize,
    /// Baseline statistics with no eval counterpart
    pub missing: usize,
    /// Statistics excluded by skip patterns
    pub skipped: usize,
    /// Statistics outside tolerance
    pub failed: usize,
}

impl EvalSummary {
    /// Whether the run warrants a failure exit.
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Whether the run warrants a failure exit under strict missing handling.
    pub fn has_missing(&self) -> bool {
        self.missing > 0
    }

    fn count(&mut self, state: EvalState) {
        match state {
            EvalState::Success => self.success += 1,
            EvalState::Missing => self.missing += 1,
            EvalState::Skipped => self.skipped += 1,
            EvalState::Failed => self.failed += 1,
        }
    }
}

/// Evaluate a whole run against its baseline.
///
/// Baseline entries are annotated in place with tolerance, observed value,
/// percent change and classification. Eval-run cases with no baseline
/// counterpart are ignored; baseline cases absent from the eval run count
/// every statistic as missing.
pub fn evaluate(
    config: &EvalConfig,
    baseline: &mut BaselineData,
    current: &BaselineData,
) -> EvalSummary {
    let mut summary = EvalSummary::default();
    for (tree_path, case) in baseline.iter_mut() {
        let observed = current.get(tree_path);
        evaluate_case(config, tree_path, case, observed, &mut summary);
    }
    summary
}

/// Evaluate one case's entries against the observed eval-run entries.
pub fn evaluate_case(
    config: &EvalConfig,
    tree_path: &str,
    case: &mut CaseBaseline,
    observed: Option<&CaseBaseline>,
    summary: &mut EvalSummary,
) {
    for (data_path, entries) in case.iter_mut() {
        let observed_entries = observed.and_then(|c| c.get(data_path));
        for entry in entries.iter_mut() {
            entry.tolerance = config.tolerance_for(tree_path, &entry.stat);

            let observed_value = observed_entries
                .and_then(|list| list.iter().find(|e| e.stat == entry.stat))
                .map(|e| e.base);

            if observed_value.is_none() && observed_entries.is_some() {
                warn!(
                    tree_path,
                    stat = entry.stat.as_str(),
                    "statistic present in baseline but absent from eval data"
                );
            }

            let state = match (observed_value, entry.tolerance) {
                (None, _) => EvalState::Missing,
                (Some(value), tolerance) => {
                    entry.value = Some(value);
                    if entry.base != 0.0 {
                        entry.change = Some((value - entry.base) / entry.base * 100.0);
                    }
                    match tolerance {
                        None => EvalState::Skipped,
                        Some([low, high]) => {
                            if classify_ratio(entry.base, value, low, high) {
                                EvalState::Success
                            } else {
                                EvalState::Failed
                            }
                        }
                    }
                }
            };
            entry.eval = Some(state);
            summary.count(state);
        }
    }
}

/// A statistic passes when base and value are both exactly zero, or when
/// `value / base` lies within the inclusive bounds.
fn classify_ratio(base: f64, value: f64, low: f64, high: f64) -> bool {
    if base == 0.0 && value == 0.0 {
        return true;
    }
    if base == 0.0 {
        return false;
    }
    let ratio = value / base;
    ratio >= low && ratio <= high
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::BaselineEntry;
    use crate::tolerance::ToleranceRule;
    use std::collections::BTreeMap;

    fn entry(stat: &str, base: f64) -> BaselineEntry {
        BaselineEntry {
            stat: stat.to_string(),
            base,
            tolerance: None,
            value: None,
            change: None,
            eval: None,
        }
    }

    fn case_data(tree_path: &str, data_path: &str, entries: Vec<BaselineEntry>) -> BaselineData {
        let mut case = CaseBaseline::new();
        case.insert(data_path.to_string(), entries);
        let mut data = BaselineData::new();
        data.insert(tree_path.to_string(), case);
        data
    }

    fn config() -> EvalConfig {
        EvalConfig {
            tolerance: vec![ToleranceRule {
                pattern: "*".to_string(),
                low: 0.5,
                high: 2.0,
            }],
            skip: vec!["root|noisyCase#*".to_string()],
        }
    }

    #[test]
    fn test_ratio_within_bounds_succeeds() {
        let mut baseline = case_data("root|caseA", "runtime", vec![entry("runtime.mean", 10.0)]);
        let current = case_data("root|caseA", "runtime", vec![entry("runtime.mean", 19.0)]);

        let summary = evaluate(&config(), &mut baseline, &current);
        assert_eq!(summary.success, 1);
        let e = &baseline["root|caseA"]["runtime"][0];
        assert_eq!(e.eval, Some(EvalState::Success));
        assert!((e.change.unwrap() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_ratio_outside_bounds_fails() {
        let mut baseline = case_data("root|caseA", "runtime", vec![entry("runtime.mean", 10.0)]);
        let current = case_data("root|caseA", "runtime", vec![entry("runtime.mean", 25.0)]);

        let summary = evaluate(&config(), &mut baseline, &current);
        assert_eq!(summary.failed, 1);
        assert!(summary.has_failures());
    }

    #[test]
    fn test_skip_pattern_overrides_deviation() {
        let mut baseline = case_data(
            "root|noisyCase#1",
            "runtime",
            vec![entry("runtime.mean", 10.0)],
        );
        let current = case_data(
            "root|noisyCase#1",
            "runtime",
            vec![entry("runtime.mean", 500.0)],
        );

        let summary = evaluate(&config(), &mut baseline, &current);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(
            baseline["root|noisyCase#1"]["runtime"][0].eval,
            Some(EvalState::Skipped)
        );
    }

    #[test]
    fn test_missing_path_increments_missing() {
        let mut baseline = case_data("root|caseA", "runtime", vec![entry("runtime.mean", 10.0)]);
        let current = BaselineData::new();

        let summary = evaluate(&config(), &mut baseline, &current);
        assert_eq!(summary.missing, 1);
        assert_eq!(
            baseline["root|caseA"]["runtime"][0].eval,
            Some(EvalState::Missing)
        );
    }

    #[test]
    fn test_stat_name_mismatch_counts_missing() {
        let mut baseline = case_data("root|caseA", "runtime", vec![entry("runtime.mean", 10.0)]);
        let current = case_data("root|caseA", "runtime", vec![entry("runtime.median", 10.0)]);

        let summary = evaluate(&config(), &mut baseline, &current);
        assert_eq!(summary.missing, 1);
    }

    #[test]
    fn test_both_zero_succeeds() {
        let mut baseline = case_data("root|caseA", "runtime", vec![entry("runtime.dev", 0.0)]);
        let current = case_data("root|caseA", "runtime", vec![entry("runtime.dev", 0.0)]);

        let summary = evaluate(&config(), &mut baseline, &current);
        assert_eq!(summary.success, 1);
        // base == 0 leaves change unset
        assert!(baseline["root|caseA"]["runtime"][0].change.is_none());
    }

    #[test]
    fn test_zero_base_nonzero_value_fails() {
        let mut baseline = case_data("root|caseA", "runtime", vec![entry("runtime.dev", 0.0)]);
        let current = case_data("root|caseA", "runtime", vec![entry("runtime.dev", 1.0)]);

        let summary = evaluate(&config(), &mut baseline, &current);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_inclusive_bounds() {
        let mut baseline = case_data("root|caseA", "runtime", vec![entry("runtime.mean", 10.0)]);
        let current = case_data("root|caseA", "runtime", vec![entry("runtime.mean", 20.0)]);

        // ratio 2.0 is exactly the upper bound
        let summary = evaluate(&config(), &mut baseline, &current);
        assert_eq!(summary.success, 1);
    }
}
