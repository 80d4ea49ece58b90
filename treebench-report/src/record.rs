//! Report Record Types

use serde::{Deserialize, Serialize};
use treebench_eval::{BaselineData, EvalSummary};
use treebench_ipc::{CaseOptions, CaseResult};
use treebench_stats::Summary;

/// One line of a report log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReportRecord {
    /// A finished perf case
    PerfCase(CaseRecord),
    /// Baseline data extracted from a report log
    Base(BaseRecord),
    /// Result of an eval run against a baseline
    Eval(EvalRecord),
    /// A fatal engine error; aborts any later baseline/eval load of this log
    Error(ErrorRecord),
}

/// Report record for one finished case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    /// Case name (dedup suffix included)
    pub name: String,
    /// Resolved tree path
    pub path: Vec<String>,
    /// Tree path in `a|b|c` form, the baseline key
    pub path_string: String,
    /// Effective options the case ran with
    pub options: CaseOptions,
    /// Finalized summary produced by the post-all pipeline
    pub summary: Summary,
    /// Raw per-run results, present only under full-results reporting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<CaseResult>>,
}

/// Report record for a baseline extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseRecord {
    /// Flattened statistic entries per case
    pub data: BaselineData,
}

/// Report record for an eval run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    /// Annotated statistic entries per case
    pub data: BaselineData,
    /// Aggregate classification counts
    pub summary: EvalSummary,
}

/// Report record for a fatal error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Human-readable error description
    pub error: String,
}

impl ReportRecord {
    /// Build a case record from the pieces the runner has at hand.
    pub fn perf_case(
        name: String,
        path: Vec<String>,
        options: CaseOptions,
        summary: Summary,
        results: Option<Vec<CaseResult>>,
    ) -> Self {
        let path_string = path.join("|");
        ReportRecord::PerfCase(CaseRecord {
            name,
            path,
            path_string,
            options,
            summary,
            results,
        })
    }

    /// Build an error record.
    pub fn error(message: impl Into<String>) -> Self {
        ReportRecord::Error(ErrorRecord {
            error: message.into(),
        })
    }
}
