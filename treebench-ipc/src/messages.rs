//! IPC Message Types
//!
//! Everything that crosses the parent/child boundary, plus the option types
//! both sides interpret identically. All JSON-serializable so report logs
//! and the wire protocol share one representation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// High-resolution duration as a (seconds, nanoseconds) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HrTime {
    /// Whole seconds
    pub secs: u64,
    /// Subsecond nanoseconds (0..1_000_000_000)
    pub nanos: u32,
}

impl HrTime {
    /// Duration in fractional milliseconds, the unit all built-in
    /// reporting stages work in.
    pub fn as_millis_f64(&self) -> f64 {
        self.secs as f64 * 1_000.0 + self.nanos as f64 / 1_000_000.0
    }
}

impl From<Duration> for HrTime {
    fn from(d: Duration) -> Self {
        Self {
            secs: d.as_secs(),
            nanos: d.subsec_nanos(),
        }
    }
}

/// Options attached to one perf case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaseOptions {
    /// Run the case in an isolated child process
    pub fork: bool,
    /// Extra argv appended to the spawned child
    pub fork_args: Vec<String>,
    /// Extra environment variables set on the spawned child
    pub fork_env: Vec<(String, String)>,
    /// Number of measured repetitions
    pub repeat: u32,
    /// Per-case timeout in milliseconds. Accepted and transmitted but not
    /// enforced by the measurement loop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Include raw per-run results in the case's report record
    pub report_full_results: bool,
}

impl Default for CaseOptions {
    fn default() -> Self {
        Self {
            fork: false,
            fork_args: Vec::new(),
            fork_env: Vec::new(),
            repeat: 1,
            timeout: None,
            report_full_results: false,
        }
    }
}

impl CaseOptions {
    /// Apply command-line overrides on top of these options.
    pub fn with_overrides(&self, overrides: &CmdlineOverrides) -> CaseOptions {
        let mut effective = self.clone();
        if let Some(repeat) = overrides.repeat {
            effective.repeat = repeat;
        }
        if let Some(timeout) = overrides.timeout {
            effective.timeout = Some(timeout);
        }
        if let Some(full) = overrides.report_full_results {
            effective.report_full_results = full;
        }
        effective
    }
}

/// Command-line overrides applied to every case of a run. The parent
/// forwards them verbatim to isolated children so both sides resolve the
/// same effective options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CmdlineOverrides {
    /// Override the repeat count of every case
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat: Option<u32>,
    /// Override the (reserved) timeout of every case, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Override full-result reporting of every case
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_full_results: Option<bool>,
}

/// Raw result of a single run of a perf case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseResult {
    /// Case name (dedup suffix included)
    pub name: String,
    /// Resolved tree path from the root context down to the case
    pub path: Vec<String>,
    /// Wall-clock cost of this run
    pub runtime: HrTime,
    /// Whatever the measured callback returned
    pub return_value: serde_json::Value,
    /// 1-based run index
    pub run: u32,
    /// Total planned repetitions
    pub repeat: u32,
    /// Captured failure, if the run errored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Derived per-run values attached by post-processing stages
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
}

impl CaseResult {
    /// Path string in `a|b|c` form.
    pub fn path_string(&self) -> String {
        self.path.join("|")
    }
}

/// Parent → child: the single request sent after spawning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRequest {
    /// Protocol version of the parent image
    pub protocol_version: u32,
    /// Tree path from the suite name down to the target case
    pub case: Vec<String>,
    /// Active overrides, forwarded verbatim
    pub cmdline_overrides: CmdlineOverrides,
}

/// Child → parent: one message per repetition, then stream end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChildMessage {
    /// A finished repetition
    Result(CaseResult),
    /// The child hit an error and will exit without further results
    Failure {
        /// Human-readable error description
        message: String,
    },
}
