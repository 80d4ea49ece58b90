//! Treebench Report Layer
//!
//! One JSON object per line, one line per finished case (and per
//! baseline/eval run), appended to every configured log destination.
//! The same records are read back to drive baseline and eval runs.

mod record;
mod sink;

pub use record::{BaseRecord, CaseRecord, ErrorRecord, EvalRecord, ReportRecord};
pub use sink::{ReportError, ReportSink, eval_run, get_data_for_baseline, load_records};
