//! The outcome of a fixpoint computation.

use crate::analysis::domain::{AbstractState, Action, Location, TransitionProvider};
use crate::analysis::multi_state::MultiState;
use crate::analysis::storage::{StateStorage, StorageId};
use crate::analysis::summary::SummaryMap;
use crate::analysis::worklist::{ItemId, WorklistItems};
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Counters collected while computing a fixpoint.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Statistics {
    pub(crate) iterations: usize,
    pub(crate) merges: usize,
    pub(crate) widenings: usize,
    pub(crate) fixpoints: usize,
    pub(crate) max_tracked_variables: usize,
    pub(crate) scope_entries: usize,
    pub(crate) summaries_applied: usize,
}

impl Statistics {
    /// The number of items taken from the worklist.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// The number of times a post-state changed an already stored state.
    pub fn merges(&self) -> usize {
        self.merges
    }

    pub fn widenings(&self) -> usize {
        self.widenings
    }

    /// The number of widenings which did not change the state widened
    /// against.
    pub fn fixpoints(&self) -> usize {
        self.fixpoints
    }

    pub fn max_tracked_variables(&self) -> usize {
        self.max_tracked_variables
    }

    pub fn scope_entries(&self) -> usize {
        self.scope_entries
    }

    /// The number of calls stepped over with a summary.
    pub fn summaries_applied(&self) -> usize {
        self.summaries_applied
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "iterations={} merges={} widenings={} fixpoints={} max_tracked_variables={}",
            self.iterations, self.merges, self.widenings, self.fixpoints, self.max_tracked_variables
        )
    }
}

/// One step of a counterexample: `action` led to `target`, where `state`
/// held.
#[derive(Clone, Debug)]
pub struct TraceStep<L, A, S> {
    action: A,
    target: L,
    state: MultiState<S>,
}

impl<L, A, S> TraceStep<L, A, S> {
    pub fn action(&self) -> &A {
        &self.action
    }

    pub fn target(&self) -> &L {
        &self.target
    }

    pub fn state(&self) -> &MultiState<S> {
        &self.state
    }
}

/// An abstract execution from a start location to an error location.
///
/// The trace may be spurious, since every state on it over-approximates the
/// concrete states.
#[derive(Clone, Debug)]
pub struct Counterexample<L, A, S> {
    start_location: L,
    initial_state: MultiState<S>,
    trace: Vec<TraceStep<L, A, S>>,
    error_action: A,
    error_source: L,
    error_state: MultiState<S>,
}

impl<L: Location, A: Action, S: AbstractState> Counterexample<L, A, S> {
    /// Trace `item`, whose action reached an error location with
    /// `error_state`, back to its start location.
    pub(crate) fn build<T>(
        items: &WorklistItems<L, A, S>,
        item: ItemId,
        error_state: MultiState<S>,
        transition_provider: &T,
    ) -> Result<Counterexample<L, A, S>, Error>
    where
        T: TransitionProvider<L, A> + ?Sized,
    {
        let error_item = items.get(item)?;
        let error_action = error_item.action().clone();
        let error_source = transition_provider.source(&error_action);

        let mut trace = Vec::new();
        let mut current = error_item;
        while let Some(predecessor) = current.predecessor() {
            let predecessor = items.get(predecessor)?;
            trace.push(TraceStep {
                action: predecessor.action().clone(),
                target: transition_provider.target(predecessor.action()),
                state: current.pre_state().clone(),
            });
            current = predecessor;
        }
        trace.reverse();

        Ok(Counterexample {
            start_location: transition_provider.source(current.action()),
            initial_state: current.pre_state().clone(),
            trace,
            error_action,
            error_source,
            error_state,
        })
    }

    pub fn start_location(&self) -> &L {
        &self.start_location
    }

    pub fn initial_state(&self) -> &MultiState<S> {
        &self.initial_state
    }

    /// The steps from the start location up to the source of the error
    /// action, in execution order.
    pub fn trace(&self) -> &[TraceStep<L, A, S>] {
        &self.trace
    }

    /// Every action of the trace, ending with the error action.
    pub fn actions(&self) -> Vec<&A> {
        self.trace
            .iter()
            .map(|step| &step.action)
            .chain(std::iter::once(&self.error_action))
            .collect()
    }

    pub fn error_action(&self) -> &A {
        &self.error_action
    }

    pub fn error_source(&self) -> &L {
        &self.error_source
    }

    /// The state at the error location.
    pub fn error_state(&self) -> &MultiState<S> {
        &self.error_state
    }
}

impl<L, A, S> fmt::Display for Counterexample<L, A, S>
where
    L: fmt::Debug,
    A: fmt::Debug,
    S: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{:?}: {}", self.start_location, self.initial_state)?;
        for step in &self.trace {
            writeln!(f, "  {:?}", step.action)?;
            writeln!(f, "{:?}: {}", step.target, step.state)?;
        }
        writeln!(f, "  {:?}", self.error_action)?;
        write!(f, "error: {}", self.error_state)
    }
}

/// The states computed by a fixpoint computation, and the counterexamples
/// found along the way.
#[derive(Clone, Debug)]
pub struct AnalysisResult<L, A, S> {
    storage: StateStorage<L, A, S>,
    summaries: SummaryMap<A, S>,
    counterexamples: Vec<Counterexample<L, A, S>>,
    statistics: Statistics,
}

impl<L: Location, A: Action, S: AbstractState> AnalysisResult<L, A, S> {
    pub(crate) fn new(
        storage: StateStorage<L, A, S>,
        summaries: SummaryMap<A, S>,
        counterexamples: Vec<Counterexample<L, A, S>>,
        statistics: Statistics,
    ) -> AnalysisResult<L, A, S> {
        AnalysisResult {
            storage,
            summaries,
            counterexamples,
            statistics,
        }
    }

    /// Every storage layer, the root layer first.
    pub fn storage(&self) -> &StateStorage<L, A, S> {
        &self.storage
    }

    pub fn summaries(&self) -> &SummaryMap<A, S> {
        &self.summaries
    }

    /// One counterexample per action that reached an error location.
    pub fn counterexamples(&self) -> &[Counterexample<L, A, S>] {
        &self.counterexamples
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn has_reached_error(&self) -> bool {
        !self.counterexamples.is_empty()
    }

    /// The state at `location` in the root layer.
    pub fn root_state(&self, location: &L) -> Option<&MultiState<S>> {
        self.storage
            .layers()
            .first()
            .and_then(|layer| layer.abstract_state(location))
    }

    /// The states at `location` in every layer that has one.
    pub fn states_at(&self, location: &L) -> Vec<(StorageId, &MultiState<S>)> {
        self.storage
            .layers()
            .iter()
            .filter_map(|layer| {
                layer
                    .abstract_state(location)
                    .map(|state| (layer.id(), state))
            })
            .collect()
    }

    /// The join of every state at `location`, over all layers. `None` if
    /// `location` was never reached.
    pub fn joined_state_at(&self, location: &L) -> Option<S> {
        self.states_at(location)
            .into_iter()
            .filter_map(|(_, state)| state.collapse())
            .reduce(|joined, state| joined.join(&state))
    }
}
