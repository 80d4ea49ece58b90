//! Treebench Baseline/Eval Engine
//!
//! Turns case summaries into flat, comparable statistic entries and checks
//! them against a stored baseline:
//! - `create_baseline_data` flattens `Stats` leaves into dotted statistic paths
//! - `EvalConfig` attaches `[low, high]` ratio bounds via glob patterns
//! - `evaluate` classifies every statistic as success/missing/skipped/failed

mod baseline;
mod eval;
mod tolerance;

pub use baseline::{BaselineData, BaselineEntry, CaseBaseline, create_baseline_data};
pub use eval::{EvalState, EvalSummary, evaluate, evaluate_case};
pub use tolerance::{DEFAULT_TOLERANCE, EvalConfig, ToleranceRule};
