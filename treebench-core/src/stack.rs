//! Definition Stack
//!
//! Registration calls append tokens here in call order; materializing a
//! context drains them all. The stack is owned by the running session and
//! threaded through construction calls, so there is exactly one producer
//! and one drainer at any time.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::case::PerfCase;
use crate::scope::Scope;

/// The four preparation/cleanup hook kinds of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Once after entering the context
    Before,
    /// Before every child
    BeforeEach,
    /// Once before leaving the context
    After,
    /// After every child
    AfterEach,
}

pub(crate) type HookFn = Rc<RefCell<dyn FnMut()>>;
pub(crate) type ContextBody = Rc<dyn Fn(&Scope)>;

pub(crate) enum Token {
    Hook { kind: HookKind, callback: HookFn },
    Context { name: String, body: ContextBody },
    Case(Rc<RefCell<PerfCase>>),
}

impl Token {
    fn name(&self) -> Option<String> {
        match self {
            Token::Hook { .. } => None,
            Token::Context { name, .. } => Some(name.clone()),
            Token::Case(case) => Some(case.borrow().name().to_string()),
        }
    }
}

/// Ordered buffer of definition tokens for one run.
#[derive(Default)]
pub struct DefinitionStack {
    tokens: RefCell<VecDeque<Token>>,
}

impl DefinitionStack {
    /// A fresh, empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_hook(&self, kind: HookKind, callback: HookFn) {
        self.tokens.borrow_mut().push_back(Token::Hook { kind, callback });
    }

    pub(crate) fn push_context(&self, name: &str, body: ContextBody) {
        let name = self.unique_name(name);
        self.tokens.borrow_mut().push_back(Token::Context { name, body });
    }

    /// Push a case token, fixing up its name if a sibling already claimed it.
    pub(crate) fn push_case(&self, case: Rc<RefCell<PerfCase>>) {
        let unique = self.unique_name(case.borrow().name());
        case.borrow_mut().set_name(unique);
        self.tokens.borrow_mut().push_back(Token::Case(case));
    }

    /// Sibling names are not required to be unique, but the tree needs
    /// identity: the k-th duplicate gets a deterministic `#k` suffix.
    fn unique_name(&self, name: &str) -> String {
        let taken: Vec<String> = self
            .tokens
            .borrow()
            .iter()
            .filter_map(Token::name)
            .collect();
        if !taken.iter().any(|n| n == name) {
            return name.to_string();
        }
        let mut num = 0usize;
        loop {
            num += 1;
            let candidate = format!("{name}#{num}");
            if !taken.iter().any(|n| n == &candidate) {
                return candidate;
            }
        }
    }

    /// Drop every pending token (done before re-invoking a context body).
    pub fn clear(&self) {
        self.tokens.borrow_mut().clear();
    }

    /// Consume all pending tokens in registration order.
    pub(crate) fn drain(&self) -> Vec<Token> {
        self.tokens.borrow_mut().drain(..).collect()
    }

    /// Number of pending tokens.
    pub fn len(&self) -> usize {
        self.tokens.borrow().len()
    }

    /// Whether no tokens are pending.
    pub fn is_empty(&self) -> bool {
        self.tokens.borrow().is_empty()
    }
}
