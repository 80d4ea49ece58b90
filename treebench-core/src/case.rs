//! Case Runner
//!
//! A `PerfCase` owns one measured callback, its options and the results it
//! accumulates. Each raw result passes through the per-result pipeline as
//! it arrives; the final pipeline runs once after all repetitions and
//! populates the summary. When the case asks for isolation the runner
//! delegates to the fork channel instead of measuring locally.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::fork;
use crate::suite::Session;
use crate::CoreError;
use treebench_ipc::{CaseOptions, CaseResult, HrTime};
use treebench_report::ReportRecord;
use treebench_stats::Summary;

/// Error type measured callbacks may fail with.
pub type CaseError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Decision of a per-result pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Keep the (possibly mutated) result
    Retain,
    /// Drop the result and skip the remaining stages for it
    Discard,
}

type SyncCallback = Box<dyn FnMut() -> Result<Value, CaseError>>;
type AsyncCallback = Box<dyn FnMut() -> Pin<Box<dyn Future<Output = Result<Value, CaseError>>>>>;

pub(crate) enum CaseCallback {
    Sync(SyncCallback),
    Async(AsyncCallback),
}

type PostEachFn = Box<dyn FnMut(&mut CaseResult) -> Verdict>;
type PostAllFn = Box<dyn FnMut(&mut Vec<CaseResult>, &mut Summary)>;

/// One measured unit of work.
pub struct PerfCase {
    name: String,
    callback: CaseCallback,
    options: CaseOptions,
    path: Option<Vec<String>>,
    results: Vec<CaseResult>,
    summary: Summary,
    post_each: Vec<PostEachFn>,
    post_all: Vec<PostAllFn>,
    // Lazily built runtime for awaiting async callbacks; kept across
    // repetitions so runtime construction never lands inside a timer.
    runtime: Option<tokio::runtime::Runtime>,
}

impl PerfCase {
    pub(crate) fn new(name: &str, options: CaseOptions, callback: CaseCallback) -> Self {
        Self {
            name: name.to_string(),
            callback,
            options,
            path: None,
            results: Vec::new(),
            summary: Summary::new(),
            post_each: Vec::new(),
            post_all: Vec::new(),
            runtime: None,
        }
    }

    /// Wrap an infallible closure returning any serializable value.
    pub(crate) fn from_fn<R, F>(name: &str, options: CaseOptions, mut f: F) -> Self
    where
        R: Serialize,
        F: FnMut() -> R + 'static,
    {
        let callback = CaseCallback::Sync(Box::new(move || {
            Ok(serde_json::to_value(f()).unwrap_or(Value::Null))
        }));
        Self::new(name, options, callback)
    }

    #[cfg(test)]
    pub(crate) fn from_value(name: &str, options: CaseOptions, value: Value) -> Self {
        Self::new(
            name,
            options,
            CaseCallback::Sync(Box::new(move || Ok(value.clone()))),
        )
    }

    /// Case name, dedup suffix included.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    /// Options the case was registered with (overrides not yet applied).
    pub fn options(&self) -> &CaseOptions {
        &self.options
    }

    /// Resolved tree path; `None` until the case has run.
    pub fn path(&self) -> Option<&[String]> {
        self.path.as_deref()
    }

    /// Accepted results accumulated so far.
    pub fn results(&self) -> &[CaseResult] {
        &self.results
    }

    /// Finalized summary; empty until the final pipeline has run.
    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub(crate) fn push_post_each(&mut self, stage: PostEachFn) {
        self.post_each.push(stage);
    }

    pub(crate) fn push_post_all(&mut self, stage: PostAllFn) {
        self.post_all.push(stage);
    }

    /// Execute the case below `parent_path`.
    ///
    /// Outside the isolated-child role results are piped and summarized
    /// here; inside it every raw result is transmitted to the parent
    /// instead and the pipelines stay untouched.
    pub(crate) fn run(&mut self, session: &Session, parent_path: &[String]) -> Result<(), CoreError> {
        let options = self.options.with_overrides(session.overrides());
        let mut path = parent_path.to_vec();
        path.push(self.name.clone());
        self.path = Some(path.clone());

        if options.fork && !session.is_child() {
            debug!(path = path.join("|"), "delegating case to isolated child");
            let received = fork::run_isolated(&path, &options, session.overrides())?;
            for result in received {
                self.process_single(result);
            }
        } else {
            for run in 0..options.repeat {
                let start = Instant::now();
                let outcome = self.invoke();
                let runtime = HrTime::from(start.elapsed());
                match outcome {
                    Ok(return_value) => {
                        let result = CaseResult {
                            name: self.name.clone(),
                            path: path.clone(),
                            runtime,
                            return_value,
                            run: run + 1,
                            repeat: options.repeat,
                            error: None,
                            metrics: BTreeMap::new(),
                        };
                        if session.is_child() {
                            session.send_result(result)?;
                        } else {
                            self.process_single(result);
                        }
                    }
                    Err(e) => {
                        return Err(CoreError::Case {
                            path: path.join("|"),
                            run: run + 1,
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        if !session.is_child() {
            self.finish(session, &options)?;
        }
        Ok(())
    }

    /// Run the callback once, awaiting async callbacks to completion so
    /// the caller's timer brackets the whole invocation.
    fn invoke(&mut self) -> Result<Value, CaseError> {
        match &mut self.callback {
            CaseCallback::Sync(f) => f(),
            CaseCallback::Async(f) => {
                let future = f();
                if self.runtime.is_none() {
                    let built = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                        .map_err(|e| Box::new(e) as CaseError)?;
                    self.runtime = Some(built);
                }
                match &self.runtime {
                    Some(rt) => rt.block_on(future),
                    None => unreachable!("runtime installed above"),
                }
            }
        }
    }

    /// Feed one raw result through the per-result pipeline.
    pub(crate) fn process_single(&mut self, mut result: CaseResult) {
        let mut stages = std::mem::take(&mut self.post_each);
        let mut keep = true;
        for stage in &mut stages {
            match stage(&mut result) {
                Verdict::Retain => {}
                Verdict::Discard => {
                    keep = false;
                    break;
                }
            }
        }
        self.post_each = stages;
        if keep {
            self.results.push(result);
        }
    }

    /// Run the final pipeline and emit the case's report record.
    fn finish(&mut self, session: &Session, options: &CaseOptions) -> Result<(), CoreError> {
        let mut stages = std::mem::take(&mut self.post_all);
        for stage in &mut stages {
            stage(&mut self.results, &mut self.summary);
        }
        self.post_all = stages;

        let results = options.report_full_results.then(|| self.results.clone());
        let record = ReportRecord::perf_case(
            self.name.clone(),
            self.path.clone().unwrap_or_default(),
            options.clone(),
            self.summary.clone(),
            results,
        );
        session.append_report(&record)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use treebench_report::ReportSink;
    use treebench_stats::{descriptive_stats, SummaryValue};

    fn local_session() -> Session {
        Session::new(Default::default(), ReportSink::none())
    }

    fn counting_case(name: &str, repeat: u32) -> PerfCase {
        let counter = Rc::new(RefCell::new(0u64));
        PerfCase::from_fn(
            name,
            CaseOptions {
                repeat,
                ..Default::default()
            },
            move || {
                *counter.borrow_mut() += 1;
                std::hint::black_box((0..2_000u64).sum::<u64>());
                *counter.borrow()
            },
        )
    }

    #[test]
    fn test_repeat_produces_one_result_per_run() {
        let session = local_session();
        let mut case = counting_case("count", 3);
        case.run(&session, &["root".to_string()]).unwrap();

        assert_eq!(case.results().len(), 3);
        for (i, result) in case.results().iter().enumerate() {
            assert_eq!(result.run as usize, i + 1);
            assert_eq!(result.repeat, 3);
            assert_eq!(result.return_value, serde_json::json!(i as u64 + 1));
            assert_eq!(result.path, vec!["root".to_string(), "count".to_string()]);
        }
        assert_eq!(case.path(), Some(&["root".to_string(), "count".to_string()][..]));
    }

    #[test]
    fn test_repeat_zero_produces_nothing() {
        let session = local_session();
        let mut case = counting_case("idle", 0);
        case.run(&session, &[]).unwrap();
        assert!(case.results().is_empty());
    }

    #[test]
    fn test_post_each_can_mutate_and_discard() {
        let session = local_session();
        let mut case = counting_case("filter", 4);
        case.push_post_each(Box::new(|result| {
            result.metrics.insert("seen".to_string(), result.run as f64);
            if result.run % 2 == 0 {
                Verdict::Discard
            } else {
                Verdict::Retain
            }
        }));
        // A later stage must not see discarded results.
        let later = Rc::new(RefCell::new(0usize));
        let later_probe = later.clone();
        case.push_post_each(Box::new(move |_| {
            *later_probe.borrow_mut() += 1;
            Verdict::Retain
        }));

        case.run(&session, &[]).unwrap();
        assert_eq!(case.results().len(), 2);
        assert_eq!(*later.borrow(), 2);
        assert!(case.results().iter().all(|r| r.run % 2 == 1));
        assert!((case.results()[0].metrics["seen"] - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_post_all_populates_summary_once() {
        let session = local_session();
        let calls = Rc::new(RefCell::new(0usize));
        let probe = calls.clone();
        let mut case = counting_case("summarized", 3);
        case.push_post_all(Box::new(move |results, summary| {
            *probe.borrow_mut() += 1;
            let ms: Vec<f64> = results.iter().map(|r| r.runtime.as_millis_f64()).collect();
            summary.insert(
                "runtime".to_string(),
                SummaryValue::Stats(descriptive_stats(&ms)),
            );
        }));

        case.run(&session, &[]).unwrap();
        assert_eq!(*calls.borrow(), 1);
        match &case.summary()["runtime"] {
            SummaryValue::Stats(stats) => assert_eq!(stats.runs, 3),
            other => panic!("unexpected summary value: {other:?}"),
        }
    }

    #[test]
    fn test_post_all_can_replace_results_wholesale() {
        let session = local_session();
        let mut case = counting_case("truncated", 5);
        case.push_post_all(Box::new(|results, _| {
            results.truncate(1);
        }));
        case.run(&session, &[]).unwrap();
        assert_eq!(case.results().len(), 1);
    }

    #[test]
    fn test_callback_error_aborts_remaining_runs() {
        let session = local_session();
        let attempts = Rc::new(RefCell::new(0u32));
        let probe = attempts.clone();
        let callback = CaseCallback::Sync(Box::new(move || {
            *probe.borrow_mut() += 1;
            if *probe.borrow() == 2 {
                Err("boom".into())
            } else {
                Ok(Value::Null)
            }
        }));
        let mut case = PerfCase::new(
            "failing",
            CaseOptions {
                repeat: 5,
                ..Default::default()
            },
            callback,
        );

        let err = case.run(&session, &[]).unwrap_err();
        match err {
            CoreError::Case { run, .. } => assert_eq!(run, 2),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(*attempts.borrow(), 2);
        assert_eq!(case.results().len(), 1);
    }

    #[test]
    fn test_async_callback_is_awaited_per_run() {
        let session = local_session();
        let callback = CaseCallback::Async(Box::new(|| {
            Box::pin(async {
                tokio::task::yield_now().await;
                Ok(serde_json::json!("done"))
            })
        }));
        let mut case = PerfCase::new(
            "async",
            CaseOptions {
                repeat: 2,
                ..Default::default()
            },
            callback,
        );

        case.run(&session, &[]).unwrap();
        assert_eq!(case.results().len(), 2);
        assert!(case.results().iter().all(|r| r.return_value == serde_json::json!("done")));
    }
}
