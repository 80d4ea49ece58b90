//! Context Materializer and Traversal
//!
//! Runtime representation of one context enclosure with `before`,
//! `before_each`, `after` and `after_each` support. A suite automatically
//! gets a top-level context carrying the suite name.
//!
//! Invocation logic for one level:
//! ```text
//! materialize
//!   before
//!   before_each
//!     case.run | sub_context.materialize+run
//!   after_each
//!   after
//! ```
//!
//! Sub-contexts materialize lazily during the run: the stack is cleared,
//! the child's body re-invoked to repopulate it, and a fresh context built
//! from the drained tokens. Running a single path triggers every
//! preparation method on the way down and every cleanup method on the way
//! up, but never evaluates sibling bodies — do not rely on state changes
//! from neighbors.

use std::cell::RefCell;
use std::rc::Rc;

use crate::case::PerfCase;
use crate::scope::Scope;
use crate::stack::{ContextBody, DefinitionStack, HookFn, HookKind, Token};
use crate::suite::Session;
use crate::tree::{NodeKind, TreeNode};
use crate::CoreError;

enum Child {
    Context { name: String, body: ContextBody },
    Case(Rc<RefCell<PerfCase>>),
}

impl Child {
    fn name(&self) -> String {
        match self {
            Child::Context { name, .. } => name.clone(),
            Child::Case(case) => case.borrow().name().to_string(),
        }
    }
}

/// One materialized level of the execution tree.
pub struct PerfContext {
    name: String,
    path: Vec<String>,
    before: Option<HookFn>,
    before_each: Option<HookFn>,
    after: Option<HookFn>,
    after_each: Option<HookFn>,
    children: Vec<Child>,
}

impl PerfContext {
    /// Build one context level by draining the definition stack.
    ///
    /// Hook slots keep the last registration of each kind; contexts and
    /// cases keep their relative registration order in one children list.
    pub(crate) fn materialize(
        name: &str,
        parent_path: &[String],
        stack: &DefinitionStack,
    ) -> Self {
        let mut path = parent_path.to_vec();
        path.push(name.to_string());
        let mut ctx = Self {
            name: name.to_string(),
            path,
            before: None,
            before_each: None,
            after: None,
            after_each: None,
            children: Vec::new(),
        };
        for token in stack.drain() {
            match token {
                Token::Hook { kind, callback } => match kind {
                    HookKind::Before => ctx.before = Some(callback),
                    HookKind::BeforeEach => ctx.before_each = Some(callback),
                    HookKind::After => ctx.after = Some(callback),
                    HookKind::AfterEach => ctx.after_each = Some(callback),
                },
                Token::Context { name, body } => ctx.children.push(Child::Context { name, body }),
                Token::Case(case) => ctx.children.push(Child::Case(case)),
            }
        }
        ctx
    }

    /// Context name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tree path from the root down to this context.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Tree path in `a|b|c` form.
    pub fn path_string(&self) -> String {
        self.path.join("|")
    }

    fn call(hook: &Option<HookFn>) {
        if let Some(hook) = hook {
            (&mut *hook.borrow_mut())();
        }
    }

    fn run_child(
        child: &mut Child,
        parent_path: &[String],
        session: &Session,
        rest: Option<&[String]>,
    ) -> Result<(), CoreError> {
        match child {
            Child::Context { name, body } => {
                // Repopulate the stack with the child's own tokens before
                // materializing; anything left over would leak into it.
                session.stack().clear();
                body(&Scope::new(session.stack()));
                let mut ctx = PerfContext::materialize(name, parent_path, session.stack());
                match rest {
                    None => ctx.run_full(session),
                    Some(rest) => ctx.run_single(rest, session),
                }
            }
            Child::Case(case) => case.borrow_mut().run(session, parent_path),
        }
    }

    /// Run every child in registration order.
    pub(crate) fn run_full(&mut self, session: &Session) -> Result<(), CoreError> {
        if !session.is_child() {
            println!("\nRunning {}:", self.name);
        }
        Self::call(&self.before);
        let mut outcome = Ok(());
        for child in &mut self.children {
            Self::call(&self.before_each);
            let result = Self::run_child(child, &self.path, session, None);
            Self::call(&self.after_each);
            if result.is_err() {
                outcome = result;
                break;
            }
        }
        Self::call(&self.after);
        outcome
    }

    /// Run only the named path below this context. The level's `before`
    /// and `after` still run (setup/teardown stay symmetric), siblings of
    /// the matched child are never evaluated, and an empty remaining path
    /// degenerates into a full run of this subtree.
    pub(crate) fn run_single(
        &mut self,
        tree_path: &[String],
        session: &Session,
    ) -> Result<(), CoreError> {
        let Some(needle) = tree_path.first() else {
            return self.run_full(session);
        };

        Self::call(&self.before);
        let mut outcome = None;
        for child in &mut self.children {
            if child.name() == *needle {
                Self::call(&self.before_each);
                let result = Self::run_child(child, &self.path, session, Some(&tree_path[1..]));
                Self::call(&self.after_each);
                outcome = Some(result);
                break;
            }
        }
        Self::call(&self.after);

        match outcome {
            Some(result) => result,
            None => {
                let mut full = self.path.clone();
                full.push(needle.clone());
                Err(CoreError::PathNotFound(full.join("|")))
            }
        }
    }

    /// Render this context and everything below it as pure data.
    ///
    /// Sub-context bodies are re-invoked to list their children; no hooks
    /// and no cases run.
    pub(crate) fn tree(&self, stack: &DefinitionStack) -> TreeNode {
        let path = self.path_string();
        let children = self
            .children
            .iter()
            .map(|child| match child {
                Child::Context { name, body } => {
                    stack.clear();
                    body(&Scope::new(stack));
                    let ctx = PerfContext::materialize(name, &self.path, stack);
                    ctx.tree(stack)
                }
                Child::Case(case) => {
                    let name = case.borrow().name().to_string();
                    TreeNode {
                        path: format!("{path}|{name}"),
                        name,
                        kind: NodeKind::Case,
                        children: Vec::new(),
                    }
                }
            })
            .collect();
        TreeNode {
            name: self.name.clone(),
            kind: NodeKind::Context,
            path,
            children,
        }
    }
}
