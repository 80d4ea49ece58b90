//! Tracing Driver Boundary
//!
//! External profiling runners (a browser tracing session, a system
//! profiler) plug in through this narrow contract: the harness calls
//! `start`, hands the measured callback to `run`, calls `end`, and
//! forwards whatever structured summary the driver returned.

use serde_json::Value;

use crate::case::CaseError;

/// Contract for an external tracing/profiling runner.
pub trait TraceDriver {
    /// Begin a trace session.
    fn start(&mut self);

    /// Execute the measured callback under tracing and return the
    /// collected trace summary. This replaces plain wall-clock timing for
    /// the case's return value.
    fn run(
        &mut self,
        callback: &mut dyn FnMut() -> Result<Value, CaseError>,
    ) -> Result<Value, CaseError>;

    /// End the trace session.
    fn end(&mut self);
}
