//! A `Transition` is a directed edge between `Node`s of an `Icfg`.
//!
//! Every transition carries a statement of the client's choosing, which the
//! abstract domain interprets, and a `TransitionKind` which tells the fixpoint
//! engine how the transition moves between scopes.

use crate::graph;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum TransitionKind {
    /// A transition within one procedure.
    Internal,
    /// Enters the callee's entry node from a call site.
    Call,
    /// Leaves a callee's exit node for the return site of `call_site`.
    Return { call_site: usize },
    /// Steps over a call from the call site to the return site.
    /// `has_implementation` is false for callees without a body, in which
    /// case the summary is the only way past the call.
    Summary { has_implementation: bool },
}

/// Edge between `Node`s of an `Icfg`
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Transition<T> {
    head: usize,
    tail: usize,
    kind: TransitionKind,
    statement: T,
}

impl<T> Transition<T> {
    pub(crate) fn new(head: usize, tail: usize, kind: TransitionKind, statement: T) -> Self {
        Transition {
            head,
            tail,
            kind,
            statement,
        }
    }

    /// Retrieve the index of the `Node` this `Transition` starts at.
    pub fn head(&self) -> usize {
        self.head
    }

    /// Retrieve the index of the `Node` this `Transition` leads to.
    pub fn tail(&self) -> usize {
        self.tail
    }

    pub fn kind(&self) -> &TransitionKind {
        &self.kind
    }

    pub fn statement(&self) -> &T {
        &self.statement
    }

    pub fn is_call(&self) -> bool {
        self.kind == TransitionKind::Call
    }

    /// Returns true if this is the return belonging to `call`.
    pub fn returns_from(&self, call: &Transition<T>) -> bool {
        match self.kind {
            TransitionKind::Return { call_site } => call.is_call() && call.head == call_site,
            _ => false,
        }
    }

    /// Returns true if this transition stays inside its procedure.
    pub fn is_intraprocedural(&self) -> bool {
        matches!(
            self.kind,
            TransitionKind::Internal | TransitionKind::Summary { .. }
        )
    }
}

impl<T: Clone> graph::Edge for Transition<T> {
    fn head(&self) -> usize {
        self.head
    }

    fn tail(&self) -> usize {
        self.tail
    }
}

impl<T: fmt::Debug> fmt::Display for Transition<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            TransitionKind::Internal => String::new(),
            TransitionKind::Call => "call ".to_string(),
            TransitionKind::Return { call_site } => format!("return@0x{:X} ", call_site),
            TransitionKind::Summary { .. } => "summary ".to_string(),
        };
        write!(
            f,
            "(0x{:X}->0x{:X}) {}{:?}",
            self.head, self.tail, kind, self.statement
        )
    }
}
