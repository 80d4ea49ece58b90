//! Case Pipelines
//!
//! `CaseHandle` is the chainable builder returned by case registration.
//! The optional reporting behaviors the original design layered on via
//! inheritance are plain pipeline stages here: anything a wrapper class
//! could do, a `post_each`/`post_all` registration does.

use std::cell::RefCell;
use std::rc::Rc;

use crate::case::{PerfCase, Verdict};
use treebench_ipc::CaseResult;
use treebench_stats::{descriptive_stats, Summary, SummaryValue};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Chainable handle to a registered case.
#[derive(Clone)]
pub struct CaseHandle {
    case: Rc<RefCell<PerfCase>>,
}

impl CaseHandle {
    pub(crate) fn new(case: Rc<RefCell<PerfCase>>) -> Self {
        Self { case }
    }

    /// Case name, dedup suffix included.
    pub fn name(&self) -> String {
        self.case.borrow().name().to_string()
    }

    /// Snapshot of the accepted results so far.
    pub fn results(&self) -> Vec<CaseResult> {
        self.case.borrow().results().to_vec()
    }

    /// Snapshot of the case summary (empty until the case has run).
    pub fn summary(&self) -> Summary {
        self.case.borrow().summary().clone()
    }

    /// Register a per-result transform. Stages run in registration order;
    /// a `Discard` verdict drops the result and short-circuits the rest.
    pub fn post_each(self, f: impl FnMut(&mut CaseResult) -> Verdict + 'static) -> Self {
        self.case.borrow_mut().push_post_each(Box::new(f));
        self
    }

    /// Register a final transform over the accumulated result list and the
    /// case summary. Runs once, after all repetitions.
    pub fn post_all(self, f: impl FnMut(&mut Vec<CaseResult>, &mut Summary) + 'static) -> Self {
        self.case.borrow_mut().push_post_all(Box::new(f));
        self
    }

    /// Print every run's wall-clock cost.
    pub fn show_runtime(self) -> Self {
        self.post_each(|result| {
            println!(
                "{}Case \"{}\" : {} - runtime: {:.2} ms",
                indent(&result.path),
                result.name,
                result.run,
                result.runtime.as_millis_f64()
            );
            Verdict::Retain
        })
    }

    /// Print the average wall-clock cost over all accepted runs.
    pub fn show_average_runtime(self) -> Self {
        self.post_all(|results, _| {
            if results.is_empty() {
                return;
            }
            let total: f64 = results.iter().map(|r| r.runtime.as_millis_f64()).sum();
            println!(
                "{}Case \"{}\" : {} runs - average runtime: {:.2} ms",
                indent(&results[0].path),
                results[0].name,
                results.len(),
                total / results.len() as f64
            );
        })
    }

    /// Print every run's throughput (requires a throughput case).
    pub fn show_throughput(self) -> Self {
        self.post_each(|result| {
            let mb_per_s = result.metrics.get("throughput").copied().unwrap_or(0.0);
            println!(
                "{}Case \"{}\" : {} - throughput: {:.2} MB/s",
                indent(&result.path),
                result.name,
                result.run,
                mb_per_s
            );
            Verdict::Retain
        })
    }

    /// Print the average throughput over all accepted runs.
    pub fn show_average_throughput(self) -> Self {
        self.post_all(|results, _| {
            if results.is_empty() {
                return;
            }
            let total: f64 = results
                .iter()
                .filter_map(|r| r.metrics.get("throughput"))
                .sum();
            println!(
                "{}Case \"{}\" : {} runs - average throughput: {:.2} MB/s",
                indent(&results[0].path),
                results[0].name,
                results.len(),
                total / results.len() as f64
            );
        })
    }
}

fn indent(path: &[String]) -> String {
    "  ".repeat(path.len().saturating_sub(2))
}

/// Summarize wall-clock cost: a `runtime` statistic leaf (milliseconds)
/// plus the plain `averageRuntime` scalar.
pub(crate) fn install_runtime_stats(case: &mut PerfCase) {
    case.push_post_all(Box::new(|results, summary| {
        if results.is_empty() {
            return;
        }
        let ms: Vec<f64> = results.iter().map(|r| r.runtime.as_millis_f64()).collect();
        let stats = descriptive_stats(&ms);
        summary.insert("averageRuntime".to_string(), SummaryValue::scalar(stats.mean));
        summary.insert("runtime".to_string(), SummaryValue::Stats(stats));
    }));
}

/// Derive MB/s per run from `returnValue.payloadSize` and summarize it as
/// a `throughput` statistic leaf plus an `averageThroughput` scalar.
pub(crate) fn install_throughput(case: &mut PerfCase) {
    case.push_post_each(Box::new(|result| {
        let payload = result
            .return_value
            .get("payloadSize")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(0.0);
        let msec = result.runtime.as_millis_f64();
        let mb_per_s = if msec > 0.0 {
            1000.0 / msec * payload / BYTES_PER_MB
        } else {
            0.0
        };
        result.metrics.insert("throughput".to_string(), mb_per_s);
        Verdict::Retain
    }));
    case.push_post_all(Box::new(|results, summary| {
        let series: Vec<f64> = results
            .iter()
            .filter_map(|r| r.metrics.get("throughput").copied())
            .collect();
        if series.is_empty() {
            return;
        }
        let stats = descriptive_stats(&series);
        summary.insert(
            "averageThroughput".to_string(),
            SummaryValue::scalar(stats.mean),
        );
        summary.insert("throughput".to_string(), SummaryValue::Stats(stats));
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::Session;
    use treebench_ipc::CaseOptions;
    use treebench_report::ReportSink;

    fn local_session() -> Session {
        Session::new(Default::default(), ReportSink::none())
    }

    #[test]
    fn test_runtime_stats_summary() {
        let session = local_session();
        let mut case = PerfCase::from_fn(
            "timed",
            CaseOptions {
                repeat: 3,
                ..Default::default()
            },
            || std::hint::black_box((0..10_000u64).sum::<u64>()),
        );
        install_runtime_stats(&mut case);
        case.run(&session, &["root".to_string()]).unwrap();

        let summary = case.summary();
        match &summary["runtime"] {
            SummaryValue::Stats(stats) => {
                assert_eq!(stats.runs, 3);
                assert!(stats.mean >= 0.0);
                assert!(stats.median >= 0.0);
                assert!(stats.dev >= 0.0);
                assert!(stats.cv >= 0.0);
            }
            other => panic!("unexpected summary value: {other:?}"),
        }
        assert!(matches!(
            summary["averageRuntime"],
            SummaryValue::Scalar { .. }
        ));
    }

    #[test]
    fn test_throughput_metric_from_payload_size() {
        let session = local_session();
        let mut case = PerfCase::from_fn(
            "bytes",
            CaseOptions {
                repeat: 2,
                ..Default::default()
            },
            || serde_json::json!({"payloadSize": 1024 * 1024}),
        );
        install_runtime_stats(&mut case);
        install_throughput(&mut case);
        case.run(&session, &["root".to_string()]).unwrap();

        for result in case.results() {
            assert!(result.metrics.contains_key("throughput"));
        }
        assert!(case.summary().contains_key("throughput"));
        assert!(case.summary().contains_key("averageThroughput"));
    }

    #[test]
    fn test_missing_payload_size_yields_zero_throughput() {
        let session = local_session();
        let mut case = PerfCase::from_fn(
            "no-payload",
            CaseOptions::default(),
            || serde_json::json!(42),
        );
        install_throughput(&mut case);
        case.run(&session, &[]).unwrap();
        assert!((case.results()[0].metrics["throughput"] - 0.0).abs() < f64::EPSILON);
    }
}
