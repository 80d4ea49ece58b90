//! Integration tests for treebench
//!
//! These drive the whole pipeline in-process: registration, tree
//! materialization, execution, report logging and baseline evals. Fork
//! isolation is exercised via the demo binary, not here — a test harness
//! binary has no child mode to spawn.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use treebench::{
    get_data_for_baseline, load_records, CaseOptions, CmdlineOverrides, EvalConfig, ReportRecord,
    ReportSink, Scope, Session, SummaryValue, ToleranceRule, Verdict,
};

fn repeat_suite(s: &Scope) {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    s.time_it_with(
        "three runs",
        CaseOptions {
            repeat: 3,
            ..Default::default()
        },
        || {
            std::hint::black_box((0..50_000u64).sum::<u64>());
            COUNTER.fetch_add(1, Ordering::Relaxed) as u64
        },
    );
}
treebench::suite!("repeat-suite", repeat_suite);

static SIBLING_X: AtomicUsize = AtomicUsize::new(0);
static SIBLING_Z: AtomicUsize = AtomicUsize::new(0);

fn sibling_suite(s: &Scope) {
    s.context("ctxX", |s| {
        SIBLING_X.fetch_add(1, Ordering::Relaxed);
        s.case("caseY", || 1u8);
    });
    s.context("ctxZ", |s| {
        SIBLING_Z.fetch_add(1, Ordering::Relaxed);
        s.case("caseW", || 2u8);
    });
}
treebench::suite!("sibling-suite", sibling_suite);

fn duplicate_suite(s: &Scope) {
    s.case("dup", || 1u8);
    s.case("dup", || 2u8);
    s.context("dup", |_| {});
}
treebench::suite!("duplicate-suite", duplicate_suite);

fn dropping_suite(s: &Scope) {
    s.case_with(
        "filtered",
        CaseOptions {
            repeat: 4,
            report_full_results: true,
            ..Default::default()
        },
        || 0u8,
    )
    .post_each(|result| {
        if result.run > 2 {
            Verdict::Discard
        } else {
            Verdict::Retain
        }
    });
}
treebench::suite!("dropping-suite", dropping_suite);

fn log_session(path: &PathBuf) -> Session {
    let sink = ReportSink::open(std::slice::from_ref(path)).unwrap();
    Session::new(CmdlineOverrides::default(), sink)
}

#[test]
fn test_repeat_case_reports_runtime_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("run.log");

    log_session(&log)
        .run(&["repeat-suite".to_string()])
        .unwrap();

    let records = load_records(&log).unwrap();
    assert_eq!(records.len(), 1);
    let ReportRecord::PerfCase(case) = &records[0] else {
        panic!("expected a PerfCase record");
    };
    assert_eq!(case.name, "three runs");
    assert_eq!(case.path_string, "repeat-suite|three runs");
    match &case.summary["runtime"] {
        SummaryValue::Stats(stats) => {
            assert_eq!(stats.runs, 3);
            assert!(stats.mean >= 0.0);
            assert!(stats.dev >= 0.0);
        }
        other => panic!("unexpected summary value: {other:?}"),
    }
    // full results were not requested
    assert!(case.results.is_none());
}

#[test]
fn test_single_path_run_never_evaluates_siblings() {
    let session = Session::new(CmdlineOverrides::default(), ReportSink::none());
    let x_before = SIBLING_X.load(Ordering::Relaxed);
    let z_before = SIBLING_Z.load(Ordering::Relaxed);

    session
        .run(&[
            "sibling-suite".to_string(),
            "ctxX".to_string(),
            "caseY".to_string(),
        ])
        .unwrap();

    assert!(SIBLING_X.load(Ordering::Relaxed) > x_before);
    assert_eq!(SIBLING_Z.load(Ordering::Relaxed), z_before);
}

#[test]
fn test_duplicate_names_are_deterministic_across_passes() {
    let session = Session::new(CmdlineOverrides::default(), ReportSink::none());
    let first = session.show_tree("duplicate-suite").unwrap();
    let second = session.show_tree("duplicate-suite").unwrap();
    assert_eq!(first, second);

    let names: Vec<&str> = first.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["dup", "dup#1", "dup#2"]);
}

#[test]
fn test_post_each_drop_limits_full_results() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("run.log");

    log_session(&log)
        .run(&["dropping-suite".to_string()])
        .unwrap();

    let records = load_records(&log).unwrap();
    let ReportRecord::PerfCase(case) = &records[0] else {
        panic!("expected a PerfCase record");
    };
    let results = case.results.as_ref().expect("full results requested");
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.run <= 2));
}

#[test]
fn test_override_repeat_applies_to_every_case() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("run.log");

    let sink = ReportSink::open(std::slice::from_ref(&log)).unwrap();
    let session = Session::new(
        CmdlineOverrides {
            repeat: Some(5),
            report_full_results: Some(true),
            ..Default::default()
        },
        sink,
    );
    session.run(&["repeat-suite".to_string()]).unwrap();

    let records = load_records(&log).unwrap();
    let ReportRecord::PerfCase(case) = &records[0] else {
        panic!("expected a PerfCase record");
    };
    assert_eq!(case.options.repeat, 5);
    assert_eq!(case.results.as_ref().unwrap().len(), 5);
}

#[test]
fn test_path_not_found_is_fatal_and_logged_as_error() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("run.log");

    let session = log_session(&log);
    let err = session
        .run(&["repeat-suite".to_string(), "missing".to_string()])
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("repeat-suite|missing"), "got: {message}");

    // the CLI writes the error record on this path; emulate it
    session.report_error(&message);
    let result = load_records(&log);
    assert!(matches!(
        result,
        Err(treebench::ReportError::ErrorRecord { .. })
    ));
}

#[test]
fn test_baseline_eval_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let base_log = dir.path().join("base.log");
    let eval_log = dir.path().join("eval.log");

    log_session(&base_log)
        .run(&["repeat-suite".to_string()])
        .unwrap();
    log_session(&eval_log)
        .run(&["repeat-suite".to_string()])
        .unwrap();

    let data = get_data_for_baseline(&base_log).unwrap();
    let entries = &data["repeat-suite|three runs"]["runtime"];
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[0].stat, "runtime.mean");

    // A wide-open tolerance classifies every comparable statistic.
    let config = EvalConfig {
        tolerance: vec![ToleranceRule {
            pattern: "*".to_string(),
            low: 0.0001,
            high: 10_000.0,
        }],
        skip: vec![],
    };
    let record = treebench::eval_run(&config, &base_log, &eval_log).unwrap();
    assert_eq!(record.summary.missing, 0);
    assert_eq!(record.summary.failed + record.summary.success, 5);
}
