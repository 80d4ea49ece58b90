//! Suites and Sessions
//!
//! A suite is the loadable definition unit: a named registration function
//! collected through `inventory`, re-invokable by contract (the engine
//! calls it once per listing pass and once per execution pass, and the
//! isolated child calls it again in its own process).
//!
//! A `Session` owns everything one run needs — the definition stack, the
//! active overrides and the report sink — so two runs never share hidden
//! state.

use std::cell::RefCell;
use std::io::Write;

use crate::context::PerfContext;
use crate::scope::Scope;
use crate::stack::DefinitionStack;
use crate::tree::TreeNode;
use crate::CoreError;
use treebench_ipc::{CaseResult, ChildMessage, CmdlineOverrides, FrameWriter};
use treebench_report::{ReportRecord, ReportSink};

/// A registered benchmark suite.
pub struct SuiteDef {
    /// Suite name; doubles as the root context name and the first tree
    /// path element.
    pub name: &'static str,
    /// Registration function, invoked with a fresh scope per pass.
    pub register: fn(&Scope),
}

inventory::collect!(SuiteDef);

/// Look up a registered suite by name.
pub fn find_suite(name: &str) -> Option<&'static SuiteDef> {
    inventory::iter::<SuiteDef>
        .into_iter()
        .find(|suite| suite.name == name)
}

/// Iterate over every registered suite.
pub fn suites() -> impl Iterator<Item = &'static SuiteDef> {
    inventory::iter::<SuiteDef>.into_iter()
}

/// One run of the harness: definition stack, overrides and report sink.
pub struct Session {
    stack: DefinitionStack,
    overrides: CmdlineOverrides,
    sink: RefCell<ReportSink>,
    child_writer: Option<RefCell<FrameWriter<Box<dyn Write>>>>,
}

impl Session {
    /// A regular (parent-role) session.
    pub fn new(overrides: CmdlineOverrides, sink: ReportSink) -> Self {
        Self {
            stack: DefinitionStack::new(),
            overrides,
            sink: RefCell::new(sink),
            child_writer: None,
        }
    }

    /// The isolated-child role: results go to the parent, not to sinks.
    pub(crate) fn child(
        overrides: CmdlineOverrides,
        writer: FrameWriter<Box<dyn Write>>,
    ) -> Self {
        Self {
            stack: DefinitionStack::new(),
            overrides,
            sink: RefCell::new(ReportSink::none()),
            child_writer: Some(RefCell::new(writer)),
        }
    }

    /// The active command-line overrides.
    pub fn overrides(&self) -> &CmdlineOverrides {
        &self.overrides
    }

    pub(crate) fn stack(&self) -> &DefinitionStack {
        &self.stack
    }

    /// Whether this session is the isolated-child role.
    pub fn is_child(&self) -> bool {
        self.child_writer.is_some()
    }

    pub(crate) fn send_result(&self, result: CaseResult) -> Result<(), CoreError> {
        if let Some(writer) = &self.child_writer {
            writer.borrow_mut().write(&ChildMessage::Result(result))?;
        }
        Ok(())
    }

    pub(crate) fn send_failure(&self, message: &str) -> Result<(), CoreError> {
        if let Some(writer) = &self.child_writer {
            writer.borrow_mut().write(&ChildMessage::Failure {
                message: message.to_string(),
            })?;
        }
        Ok(())
    }

    pub(crate) fn append_report(&self, record: &ReportRecord) -> Result<(), CoreError> {
        self.sink.borrow_mut().append(record)?;
        Ok(())
    }

    /// Append an `Error` record to every sink destination; used on the
    /// fatal path, so sink failures are swallowed.
    pub fn report_error(&self, message: &str) {
        self.sink.borrow_mut().append_error(message);
    }

    /// Run along a tree path. The first element names the suite; an empty
    /// remainder runs the whole suite.
    pub fn run(&self, tree_path: &[String]) -> Result<(), CoreError> {
        let Some(suite_name) = tree_path.first() else {
            return Err(CoreError::EmptyPath);
        };
        let suite = find_suite(suite_name)
            .ok_or_else(|| CoreError::SuiteNotFound(suite_name.clone()))?;
        self.run_suite(suite, &tree_path[1..])
    }

    /// Run one suite, fully or along a path below its root.
    pub fn run_suite(&self, suite: &SuiteDef, rest: &[String]) -> Result<(), CoreError> {
        let mut root = self.materialize_suite(suite);
        root.run_single(rest, self)
    }

    /// Run every registered suite in registration order.
    pub fn run_all(&self) -> Result<(), CoreError> {
        for suite in suites() {
            self.run_suite(suite, &[])?;
        }
        Ok(())
    }

    /// Describe a suite's tree without running anything.
    pub fn show_tree(&self, suite_name: &str) -> Result<TreeNode, CoreError> {
        let suite = find_suite(suite_name)
            .ok_or_else(|| CoreError::SuiteNotFound(suite_name.to_string()))?;
        let root = self.materialize_suite(suite);
        Ok(root.tree(&self.stack))
    }

    fn materialize_suite(&self, suite: &SuiteDef) -> PerfContext {
        self.stack.clear();
        (suite.register)(&Scope::new(&self.stack));
        PerfContext::materialize(suite.name, &[], &self.stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeKind;

    fn sample_suite(s: &Scope) {
        s.case("alpha", || 1u8);
        s.context("group", |s| {
            s.case("beta", || 2u8);
        });
    }

    inventory::submit! {
        SuiteDef {
            name: "session-test-suite",
            register: sample_suite,
        }
    }

    #[test]
    fn test_find_suite() {
        assert!(find_suite("session-test-suite").is_some());
        assert!(find_suite("no-such-suite").is_none());
    }

    #[test]
    fn test_run_unknown_suite_fails() {
        let session = Session::new(Default::default(), ReportSink::none());
        let err = session.run(&["missing".to_string()]).unwrap_err();
        assert!(matches!(err, CoreError::SuiteNotFound(_)));
    }

    #[test]
    fn test_run_empty_path_fails() {
        let session = Session::new(Default::default(), ReportSink::none());
        assert!(matches!(session.run(&[]), Err(CoreError::EmptyPath)));
    }

    #[test]
    fn test_run_whole_suite_by_name() {
        let session = Session::new(Default::default(), ReportSink::none());
        session.run(&["session-test-suite".to_string()]).unwrap();
    }

    #[test]
    fn test_run_single_case_path() {
        let session = Session::new(Default::default(), ReportSink::none());
        session
            .run(&[
                "session-test-suite".to_string(),
                "group".to_string(),
                "beta".to_string(),
            ])
            .unwrap();
    }

    #[test]
    fn test_show_tree_is_pure_description() {
        let session = Session::new(Default::default(), ReportSink::none());
        let tree = session.show_tree("session-test-suite").unwrap();
        assert_eq!(tree.name, "session-test-suite");
        assert_eq!(tree.kind, NodeKind::Context);
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].name, "alpha");
        assert_eq!(tree.children[1].children[0].path, "session-test-suite|group|beta");
    }

    #[test]
    fn test_listing_and_running_are_repeatable() {
        // Registration callbacks are re-invoked across passes; both passes
        // must observe identical names.
        let session = Session::new(Default::default(), ReportSink::none());
        let first = session.show_tree("session-test-suite").unwrap();
        let second = session.show_tree("session-test-suite").unwrap();
        assert_eq!(first, second);
        session.run(&["session-test-suite".to_string()]).unwrap();
    }
}
