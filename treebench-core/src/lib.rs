//! Treebench Core - Definition Tree and Execution Engine
//!
//! This crate provides the measurement runtime:
//! - the definition stack fed by registration calls
//! - lazy materialization of context/case trees
//! - the case runner with its per-result and final pipelines
//! - single-host process isolation for contamination-free measurements
//!
//! Definition bodies are re-invoked whenever the engine needs to look
//! inside a context (listing and execution both do this), so registration
//! callbacks must be idempotent with respect to anything but registration.

mod case;
mod context;
mod fork;
mod pipeline;
mod scope;
mod stack;
mod suite;
mod trace;
mod tree;

pub use case::{CaseError, PerfCase, Verdict};
pub use context::PerfContext;
pub use fork::{child_main, CHILD_FLAG};
pub use pipeline::CaseHandle;
pub use scope::Scope;
pub use stack::{DefinitionStack, HookKind};
pub use suite::{Session, SuiteDef, find_suite, suites};
pub use trace::TraceDriver;
pub use tree::{NodeKind, TreeNode};

// Wire types shared with isolated children
pub use treebench_ipc::{CaseOptions, CaseResult, CmdlineOverrides, HrTime};

#[doc(hidden)]
pub use inventory;

use thiserror::Error;

/// Errors raised by the execution engine.
#[derive(Debug, Error)]
pub enum CoreError {
    /// `run` was called with an empty tree path
    #[error("no tree path given")]
    EmptyPath,

    /// The first path element names no registered suite
    #[error("suite not found: \"{0}\"")]
    SuiteNotFound(String),

    /// A path element matched no child during single-path traversal
    #[error("path not found: \"{0}\"")]
    PathNotFound(String),

    /// A measured callback failed; remaining repetitions were aborted
    #[error("case \"{path}\" failed on run {run}: {message}")]
    Case {
        /// Full tree path of the case
        path: String,
        /// 1-based repetition the failure occurred on
        run: u32,
        /// Callback error message
        message: String,
    },

    /// The isolated child exited without transmitting a single result
    #[error("isolated child for \"{path}\" exited without sending any result")]
    ChildNoData {
        /// Full tree path of the case
        path: String,
    },

    /// The isolated child reported a failure
    #[error("isolated child for \"{path}\" failed: {message}")]
    ChildFailure {
        /// Full tree path of the case
        path: String,
        /// Failure message transmitted by the child
        message: String,
    },

    /// The child process could not be spawned
    #[error("failed to spawn isolated child: {0}")]
    Spawn(std::io::Error),

    /// Parent and child harness images disagree on the wire protocol
    #[error("isolation protocol mismatch: parent speaks {parent}, child speaks {child}")]
    ProtocolMismatch {
        /// Version sent by the parent
        parent: u32,
        /// Version compiled into the child
        child: u32,
    },

    /// Framing failure on the isolation channel
    #[error("ipc failure: {0}")]
    Ipc(#[from] treebench_ipc::FrameError),

    /// Report sink failure
    #[error(transparent)]
    Report(#[from] treebench_report::ReportError),

    /// Other I/O failure
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Register a suite with the harness.
///
/// ```ignore
/// fn parser_suite(s: &Scope) {
///     s.time_it("small input", || parse(SMALL));
/// }
/// treebench_core::suite!("parser", parser_suite);
/// ```
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
