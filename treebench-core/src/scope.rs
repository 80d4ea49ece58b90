//! Registration Scope
//!
//! The handle passed to every definition callback. Each method appends one
//! token to the session's definition stack and does nothing else; the tree
//! is assembled later, when a context is materialized.
//!
//! Hooks can be registered anywhere in a context body (top level included).
//! Only one hook of each kind is retained per context: a later registration
//! at the same nesting level replaces an earlier one.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;

use crate::case::{CaseCallback, CaseError, PerfCase};
use crate::pipeline::{self, CaseHandle};
use crate::stack::{DefinitionStack, HookKind};
use crate::trace::TraceDriver;
use treebench_ipc::CaseOptions;

/// Registration handle over one definition stack.
pub struct Scope<'a> {
    stack: &'a DefinitionStack,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(stack: &'a DefinitionStack) -> Self {
        Self { stack }
    }

    /// Called once after entering the enclosing context.
    pub fn before(&self, f: impl FnMut() + 'static) {
        self.stack.push_hook(HookKind::Before, Rc::new(RefCell::new(f)));
    }

    /// Called before every child of the enclosing context.
    pub fn before_each(&self, f: impl FnMut() + 'static) {
        self.stack
            .push_hook(HookKind::BeforeEach, Rc::new(RefCell::new(f)));
    }

    /// Called once before leaving the enclosing context.
    pub fn after(&self, f: impl FnMut() + 'static) {
        self.stack.push_hook(HookKind::After, Rc::new(RefCell::new(f)));
    }

    /// Called after every child of the enclosing context.
    pub fn after_each(&self, f: impl FnMut() + 'static) {
        self.stack
            .push_hook(HookKind::AfterEach, Rc::new(RefCell::new(f)));
    }

    /// Declare a nested context. The body is invoked lazily — and more
    /// than once — whenever the engine descends into or lists the context.
    pub fn context(&self, name: &str, body: impl Fn(&Scope) + 'static) {
        self.stack.push_context(name, Rc::new(body));
    }

    fn register(&self, case: PerfCase) -> CaseHandle {
        let case = Rc::new(RefCell::new(case));
        self.stack.push_case(case.clone());
        CaseHandle::new(case)
    }

    /// Declare a bare case with no pre-installed reporting stages.
    pub fn case<R, F>(&self, name: &str, f: F) -> CaseHandle
    where
        R: Serialize,
        F: FnMut() -> R + 'static,
    {
        self.case_with(name, CaseOptions::default(), f)
    }

    /// Declare a bare case with explicit options.
    pub fn case_with<R, F>(&self, name: &str, options: CaseOptions, f: F) -> CaseHandle
    where
        R: Serialize,
        F: FnMut() -> R + 'static,
    {
        self.register(PerfCase::from_fn(name, options, f))
    }

    /// Declare a case whose callback may fail; a failure aborts the
    /// remaining repetitions and propagates through the traversal.
    pub fn try_case<R, F>(&self, name: &str, options: CaseOptions, mut f: F) -> CaseHandle
    where
        R: Serialize,
        F: FnMut() -> Result<R, CaseError> + 'static,
    {
        let callback = CaseCallback::Sync(Box::new(move || {
            f().map(|v| serde_json::to_value(v).unwrap_or(Value::Null))
        }));
        self.register(PerfCase::new(name, options, callback))
    }

    /// Declare an asynchronous case. The runner awaits each invocation to
    /// completion before the next timer starts.
    pub fn case_async<R, F, Fut>(&self, name: &str, options: CaseOptions, mut f: F) -> CaseHandle
    where
        R: Serialize,
        F: FnMut() -> Fut + 'static,
        Fut: Future<Output = R> + 'static,
    {
        let callback = CaseCallback::Async(Box::new(move || {
            let future = f();
            Box::pin(async move { Ok(serde_json::to_value(future.await).unwrap_or(Value::Null)) })
                as Pin<Box<dyn Future<Output = Result<Value, CaseError>>>>
        }));
        self.register(PerfCase::new(name, options, callback))
    }

    /// Simple runtime-measuring case: summarizes wall-clock cost as a
    /// `runtime` statistic leaf.
    pub fn time_it<R, F>(&self, name: &str, f: F) -> CaseHandle
    where
        R: Serialize,
        F: FnMut() -> R + 'static,
    {
        self.time_it_with(name, CaseOptions::default(), f)
    }

    /// Runtime-measuring case with explicit options.
    pub fn time_it_with<R, F>(&self, name: &str, options: CaseOptions, f: F) -> CaseHandle
    where
        R: Serialize,
        F: FnMut() -> R + 'static,
    {
        let mut case = PerfCase::from_fn(name, options, f);
        pipeline::install_runtime_stats(&mut case);
        self.register(case)
    }

    /// Throughput-measuring case. Expects the payload size in bytes as
    /// `{"payloadSize": n}` in the callback's return value; derives MB/s
    /// per run plus a `throughput` statistic leaf, on top of the runtime
    /// statistics.
    pub fn throughput<R, F>(&self, name: &str, f: F) -> CaseHandle
    where
        R: Serialize,
        F: FnMut() -> R + 'static,
    {
        self.throughput_with(name, CaseOptions::default(), f)
    }

    /// Throughput-measuring case with explicit options.
    pub fn throughput_with<R, F>(&self, name: &str, options: CaseOptions, f: F) -> CaseHandle
    where
        R: Serialize,
        F: FnMut() -> R + 'static,
    {
        let mut case = PerfCase::from_fn(name, options, f);
        pipeline::install_runtime_stats(&mut case);
        pipeline::install_throughput(&mut case);
        self.register(case)
    }

    /// Case measured through an external tracing/profiling driver instead
    /// of plain wall-clock timing. The driver's structured output becomes
    /// the case's return value.
    pub fn trace_it<D, F>(&self, name: &str, options: CaseOptions, driver: D, f: F) -> CaseHandle
    where
        D: TraceDriver + 'static,
        F: FnMut() -> Result<Value, CaseError> + 'static,
    {
        let mut driver = driver;
        let mut f: Box<dyn FnMut() -> Result<Value, CaseError>> = Box::new(f);
        let callback = CaseCallback::Sync(Box::new(move || {
            driver.start();
            let outcome = driver.run(&mut f);
            driver.end();
            outcome
        }));
        self.register(PerfCase::new(name, options, callback))
    }
}
