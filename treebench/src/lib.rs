#![warn(missing_docs)]
//! # Treebench
//!
//! Declarative perf-test harness: describe nested contexts and measured
//! cases with a registration API, run them with clean-process isolation,
//! and check the resulting statistics against stored baselines.
//!
//! - **Declarative trees**: `before`/`before_each`/`after`/`after_each`
//!   hooks plus nested contexts, materialized lazily from registration
//!   order
//! - **Process isolation**: a case marked `fork` measures inside a fresh
//!   child replica of the harness, one repetition result streamed back per
//!   run
//! - **Post-processing pipelines**: per-result and final transforms build
//!   summaries (runtime and throughput statistics ship built in)
//! - **Baseline evals**: summaries flatten to dotted statistic paths and
//!   compare against a stored report log within glob-configured ratio
//!   tolerances
//!
//! ## Quick Start
//!
//! ```ignore
//! use treebench::prelude::*;
//!
//! fn parser_suite(s: &Scope) {
//!     s.before(|| println!("warming up"));
//!     s.time_it("small input", || parse(SMALL))
//!         .show_runtime()
//!         .show_average_runtime();
//!     s.context("large inputs", |s| {
//!         s.throughput("4 MB", || serde_json::json!({"payloadSize": PAYLOAD.len()}));
//!     });
//! }
//! treebench::suite!("parser", parser_suite);
//!
//! fn main() -> anyhow::Result<()> {
//!     treebench::run()
//! }
//! ```

// Re-export core types
pub use treebench_core::{
    child_main, find_suite, suites, CaseError, CaseHandle, CaseOptions, CaseResult,
    CmdlineOverrides, CoreError, DefinitionStack, HookKind, HrTime, NodeKind, PerfCase,
    PerfContext, Scope, Session, SuiteDef, TraceDriver, TreeNode, Verdict,
};

// Re-export statistics
pub use treebench_stats::{descriptive_stats, Stats, Summary, SummaryValue};

// Re-export eval engine
pub use treebench_eval::{
    create_baseline_data, evaluate, BaselineData, BaselineEntry, EvalConfig, EvalState,
    EvalSummary, ToleranceRule, DEFAULT_TOLERANCE,
};

// Re-export report layer
pub use treebench_report::{
    eval_run, get_data_for_baseline, load_records, CaseRecord, ReportError, ReportRecord,
    ReportSink,
};

// Re-export CLI entry points
pub use treebench_cli::{run, run_with_cli, Cli, Commands, HarnessConfig};

#[doc(hidden)]
pub use treebench_core::inventory;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        CaseOptions, CaseResult, Scope, Session, Stats, Summary, SummaryValue, Verdict,
    };
}

/// Register a suite with the harness.
#[macro_export]
macro_rules! suite {
    ($name:literal, $register:path) => {
        $crate::inventory::submit! {
            $crate::SuiteDef {
                name: $name,
                register: $register,
            }
        }
    };
}
