//! Natural-loop detection over the procedures of an `Icfg`.

use crate::analysis::LoopDetector;
use crate::graph::{Graph, Loop, NullEdge, NullVertex};
use crate::icfg::{Icfg, Transition};
use crate::Error;
use log::trace;
use rustc_hash::FxHashMap;

/// Knows the natural loops of every procedure in an `Icfg`.
///
/// Loops are computed over the intraprocedural graph, where calls are stepped
/// over through their summary transitions. A transition enters a loop when it
/// leaves a loop header for a node inside that loop.
#[derive(Clone, Debug, Default)]
pub struct IcfgLoopDetector {
    loops: FxHashMap<usize, Loop>,
}

impl IcfgLoopDetector {
    pub fn new<T: Clone>(icfg: &Icfg<T>) -> Result<IcfgLoopDetector, Error> {
        let mut graph: Graph<NullVertex, NullEdge> = Graph::new();
        for node in icfg.nodes() {
            graph.insert_vertex(NullVertex::new(node.index()))?;
        }
        for transition in icfg.transitions() {
            if transition.is_intraprocedural() {
                graph.insert_edge(NullEdge::new(transition.head(), transition.tail()))?;
            }
        }

        let mut loops = FxHashMap::default();
        for procedure in icfg.procedures() {
            for l in graph.compute_loops(procedure.entry())? {
                trace!("{} has {}", procedure.name(), l);
                loops.insert(l.header(), l);
            }
        }

        Ok(IcfgLoopDetector { loops })
    }

    /// Returns true if `index` is the header of a loop.
    pub fn is_loop_head(&self, index: usize) -> bool {
        self.loops.contains_key(&index)
    }
}

impl<T> LoopDetector<Transition<T>> for IcfgLoopDetector {
    fn is_entering_loop(&self, action: &Transition<T>) -> bool {
        action.is_intraprocedural()
            && self
                .loops
                .get(&action.head())
                .map(|l| l.contains(action.tail()))
                .unwrap_or(false)
    }
}
