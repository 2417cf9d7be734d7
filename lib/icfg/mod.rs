//! An interprocedural control-flow graph.
//!
//! An `Icfg` is a directed `Graph` of `Node` and `Transition`. Nodes belong to
//! named procedures, each with one entry and one exit node. A call site is
//! connected to its callee through three transitions:
//!
//! * a `Call` from the call site to the callee's entry,
//! * a `Return` from the callee's exit to the return site,
//! * a `Summary` from the call site straight to the return site.
//!
//! `Icfg` implements `TransitionProvider`, and `IcfgLoopDetector` implements
//! `LoopDetector`, so an `Icfg` can be handed to the fixpoint engine as is.

use crate::analysis::TransitionProvider;
use crate::graph::Graph;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

mod loop_detector;
mod node;
mod transition;

pub use self::loop_detector::IcfgLoopDetector;
pub use self::node::Node;
pub use self::transition::{Transition, TransitionKind};

/// The entry and exit of a procedure.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Procedure {
    name: String,
    entry: usize,
    exit: usize,
}

impl Procedure {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> usize {
        self.entry
    }

    pub fn exit(&self) -> usize {
        self.exit
    }
}

/// An interprocedural control-flow graph whose transitions carry statements
/// of type `T`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Icfg<T: Clone> {
    // The internal graph used to store our nodes.
    graph: Graph<Node, Transition<T>>,
    procedures: BTreeMap<String, Procedure>,
    // The next index to use when creating a node.
    next_index: usize,
}

impl<T: Clone> Default for Icfg<T> {
    fn default() -> Self {
        Icfg::new()
    }
}

impl<T: Clone> Icfg<T> {
    pub fn new() -> Icfg<T> {
        Icfg {
            graph: Graph::new(),
            procedures: BTreeMap::new(),
            next_index: 0,
        }
    }

    /// Returns the underlying graph
    pub fn graph(&self) -> &Graph<Node, Transition<T>> {
        &self.graph
    }

    /// Creates a procedure with fresh entry and exit nodes.
    pub fn add_procedure(&mut self, name: &str) -> Result<&Procedure, Error> {
        if self.procedures.contains_key(name) {
            return Err(format!("duplicate procedure {}", name).into());
        }
        let entry = self.insert_node(name)?;
        let exit = self.insert_node(name)?;
        self.procedures.insert(
            name.to_string(),
            Procedure {
                name: name.to_string(),
                entry,
                exit,
            },
        );
        self.procedure(name)
    }

    /// Get a `Procedure` by name.
    pub fn procedure(&self, name: &str) -> Result<&Procedure, Error> {
        self.procedures
            .get(name)
            .ok_or_else(|| format!("unknown procedure {}", name).into())
    }

    /// Get every `Procedure` in this `Icfg`.
    pub fn procedures(&self) -> Vec<&Procedure> {
        self.procedures.values().collect()
    }

    /// Creates a new node in `procedure`, and returns its index
    pub fn new_node(&mut self, procedure: &str) -> Result<usize, Error> {
        self.procedure(procedure)?;
        self.insert_node(procedure)
    }

    /// Creates a new error node in `procedure`, and returns its index
    pub fn new_error_node(&mut self, procedure: &str) -> Result<usize, Error> {
        let index = self.new_node(procedure)?;
        self.set_error(index, true)?;
        Ok(index)
    }

    /// Mark or unmark a node as an error location.
    pub fn set_error(&mut self, index: usize, error: bool) -> Result<(), Error> {
        self.graph.vertex_mut(index)?.set_error(error);
        Ok(())
    }

    /// Get a `Node` by index.
    pub fn node(&self, index: usize) -> Result<&Node, Error> {
        self.graph.vertex(index)
    }

    /// Get a mutable reference to a `Node` by index.
    pub fn node_mut(&mut self, index: usize) -> Result<&mut Node, Error> {
        self.graph.vertex_mut(index)
    }

    /// Get every `Node` in this `Icfg`.
    pub fn nodes(&self) -> Vec<&Node> {
        self.graph.vertices()
    }

    /// Get every `Transition` in this `Icfg`.
    pub fn transitions(&self) -> Vec<&Transition<T>> {
        self.graph.edges()
    }

    /// Get a `Transition` by its head and tail `Node` indices.
    pub fn transition(&self, head: usize, tail: usize) -> Result<&Transition<T>, Error> {
        self.graph.edge(head, tail)
    }

    /// Get every outgoing transition from a node
    pub fn transitions_out(&self, index: usize) -> Result<Vec<&Transition<T>>, Error> {
        self.graph.edges_out(index)
    }

    /// Creates a transition inside one procedure.
    pub fn internal_transition(
        &mut self,
        head: usize,
        tail: usize,
        statement: T,
    ) -> Result<(), Error> {
        self.same_procedure(head, tail)?;
        self.graph
            .insert_edge(Transition::new(head, tail, TransitionKind::Internal, statement))
    }

    /// Connects `call_site` and `return_site` through a call of `callee`.
    ///
    /// Inserts the call, return and summary transitions, each carrying a
    /// clone of `statement`.
    pub fn call(
        &mut self,
        call_site: usize,
        return_site: usize,
        callee: &str,
        statement: T,
    ) -> Result<(), Error> {
        self.same_procedure(call_site, return_site)?;
        let (entry, exit) = {
            let procedure = self.procedure(callee)?;
            (procedure.entry(), procedure.exit())
        };
        self.graph.insert_edge(Transition::new(
            call_site,
            entry,
            TransitionKind::Call,
            statement.clone(),
        ))?;
        self.graph.insert_edge(Transition::new(
            exit,
            return_site,
            TransitionKind::Return { call_site },
            statement.clone(),
        ))?;
        self.graph.insert_edge(Transition::new(
            call_site,
            return_site,
            TransitionKind::Summary {
                has_implementation: true,
            },
            statement,
        ))
    }

    /// Steps over a call of a procedure without a body.
    pub fn external_call(
        &mut self,
        call_site: usize,
        return_site: usize,
        statement: T,
    ) -> Result<(), Error> {
        self.same_procedure(call_site, return_site)?;
        self.graph.insert_edge(Transition::new(
            call_site,
            return_site,
            TransitionKind::Summary {
                has_implementation: false,
            },
            statement,
        ))
    }

    fn insert_node(&mut self, procedure: &str) -> Result<usize, Error> {
        let index = self.next_index;
        self.next_index += 1;
        self.graph
            .insert_vertex(Node::new(index, procedure.to_string()))?;
        Ok(index)
    }

    fn same_procedure(&self, head: usize, tail: usize) -> Result<(), Error> {
        if self.node(head)?.procedure() != self.node(tail)?.procedure() {
            return Err(format!(
                "0x{:X} and 0x{:X} belong to different procedures",
                head, tail
            )
            .into());
        }
        Ok(())
    }

    fn out(&self, index: usize) -> Vec<Transition<T>> {
        self.graph
            .edges_out(index)
            .map(|transitions| transitions.into_iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl<T: Clone> TransitionProvider<usize, Transition<T>> for Icfg<T> {
    fn successor_actions(&self, location: &usize) -> Vec<Transition<T>> {
        self.out(*location)
    }

    fn source(&self, action: &Transition<T>) -> usize {
        action.head()
    }

    fn target(&self, action: &Transition<T>) -> usize {
        action.tail()
    }

    fn successors(
        &self,
        action: &Transition<T>,
        current_scope: Option<&Transition<T>>,
    ) -> Vec<Transition<T>> {
        self.out(action.tail())
            .into_iter()
            .filter(|successor| match successor.kind() {
                TransitionKind::Return { .. } => current_scope
                    .map(|scope| successor.returns_from(scope))
                    .unwrap_or(false),
                _ => true,
            })
            .collect()
    }

    fn is_entering_scope(&self, action: &Transition<T>) -> bool {
        action.is_call()
    }

    fn is_leaving_scope(
        &self,
        action: &Transition<T>,
        current_scope: Option<&Transition<T>>,
    ) -> bool {
        current_scope
            .map(|scope| action.returns_from(scope))
            .unwrap_or(false)
    }

    fn is_error_location(&self, location: &usize) -> bool {
        self.node(*location)
            .map(|node| node.is_error())
            .unwrap_or(false)
    }

    fn is_summary_with_implementation(&self, action: &Transition<T>) -> bool {
        *action.kind()
            == TransitionKind::Summary {
                has_implementation: true,
            }
    }

    fn summary_for_call(&self, action: &Transition<T>) -> Option<Transition<T>> {
        if !action.is_call() {
            return None;
        }
        self.out(action.head())
            .into_iter()
            .find(|transition| self.is_summary_with_implementation(transition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::LoopDetector;

    // main: 0 -> 4 -call f-> 5 -> 1
    // f:    2 -> 6 -> 3, with a self loop on 6
    fn create_test_icfg() -> Icfg<&'static str> {
        let mut icfg = Icfg::new();
        icfg.add_procedure("main").unwrap();
        icfg.add_procedure("f").unwrap();

        let call_site = icfg.new_node("main").unwrap();
        let return_site = icfg.new_node("main").unwrap();
        let body = icfg.new_node("f").unwrap();

        icfg.internal_transition(0, call_site, "enter").unwrap();
        icfg.call(call_site, return_site, "f", "f()").unwrap();
        icfg.internal_transition(return_site, 1, "leave").unwrap();
        icfg.internal_transition(2, body, "body").unwrap();
        icfg.internal_transition(body, body, "loop").unwrap();
        icfg.internal_transition(body, 3, "done").unwrap();

        icfg
    }

    #[test]
    fn call_transitions() {
        let icfg = create_test_icfg();

        let call = icfg.transition(4, 2).unwrap().clone();
        assert!(icfg.is_entering_scope(&call));

        let summary = icfg.summary_for_call(&call).unwrap();
        assert_eq!((summary.head(), summary.tail()), (4, 5));
        assert!(icfg.is_summary_with_implementation(&summary));
        assert!(icfg.summary_for_call(&summary).is_none());

        let ret = icfg.transition(3, 5).unwrap().clone();
        assert!(icfg.is_leaving_scope(&ret, Some(&call)));
        assert!(!icfg.is_leaving_scope(&ret, None));
    }

    #[test]
    fn returns_follow_the_scope() {
        let icfg = create_test_icfg();

        let call = icfg.transition(4, 2).unwrap().clone();
        let done = icfg.transition(6, 3).unwrap().clone();

        assert!(icfg.successors(&done, None).is_empty());
        assert_eq!(icfg.successors(&done, Some(&call)).len(), 1);
    }

    #[test]
    fn cross_procedure_transitions_are_rejected() {
        let mut icfg = create_test_icfg();
        assert!(icfg.internal_transition(0, 2, "jump").is_err());
        assert!(icfg.call(0, 7, "f", "f()").is_err());
        assert!(icfg.call(0, 1, "g", "g()").is_err());
    }

    #[test]
    fn loop_detection() {
        let icfg = create_test_icfg();
        let loops = IcfgLoopDetector::new(&icfg).unwrap();

        assert!(loops.is_loop_head(6));
        assert!(!loops.is_loop_head(0));
        assert!(loops.is_entering_loop(icfg.transition(6, 6).unwrap()));
        assert!(!loops.is_entering_loop(icfg.transition(6, 3).unwrap()));
        assert!(!loops.is_entering_loop(icfg.transition(2, 6).unwrap()));
    }

    #[test]
    fn error_nodes() {
        let mut icfg = create_test_icfg();
        let error = icfg.new_error_node("main").unwrap();
        assert!(icfg.is_error_location(&error));
        assert!(!icfg.is_error_location(&0));
        assert!(!icfg.is_error_location(&100));
    }
}
