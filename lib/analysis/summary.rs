//! Memoized effects of calls.
//!
//! Whenever a scope is left, the state before the call and the state after
//! the return are recorded for the call action. With summaries enabled, the
//! engine steps over a call whose state is covered by a recorded pre-state
//! instead of entering it again. The items which did so are remembered, and
//! handed back when the post-state they used grows.

use crate::analysis::domain::{AbstractState, Action};
use crate::analysis::multi_state::MultiState;
use crate::analysis::worklist::ItemId;
use rustc_hash::FxHashMap;

/// Refers to one recorded summary of a call.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SummaryRef<A> {
    call: A,
    index: usize,
}

impl<A> SummaryRef<A> {
    pub fn call(&self) -> &A {
        &self.call
    }
}

#[derive(Clone, Debug)]
struct Summary<S> {
    pre_state: MultiState<S>,
    post_state: MultiState<S>,
    uses: Vec<ItemId>,
}

/// Recorded `(pre-state, post-state)` pairs, per call action.
#[derive(Clone, Debug)]
pub struct SummaryMap<A, S> {
    summaries: FxHashMap<A, Vec<Summary<S>>>,
}

impl<A: Action, S: AbstractState> SummaryMap<A, S> {
    pub fn new() -> SummaryMap<A, S> {
        SummaryMap {
            summaries: FxHashMap::default(),
        }
    }

    /// Record that `call`, entered with `pre_state`, returned with
    /// `post_state`.
    ///
    /// Posts recorded for an equal pre-state are joined. If that changes the
    /// recorded post, the items which used the old one are returned, and
    /// forgotten.
    pub fn record(
        &mut self,
        call: &A,
        pre_state: &MultiState<S>,
        post_state: &MultiState<S>,
        max_parallel_states: usize,
    ) -> Vec<ItemId> {
        let summaries = self.summaries.entry(call.clone()).or_default();
        let position = summaries
            .iter()
            .position(|summary| summary.pre_state.is_equal_to(pre_state));
        match position {
            Some(index) => {
                let summary = &mut summaries[index];
                if post_state.is_subset_of(&summary.post_state) {
                    return Vec::new();
                }
                summary.post_state = summary.post_state.merge(post_state, max_parallel_states);
                std::mem::take(&mut summary.uses)
            }
            None => {
                summaries.push(Summary {
                    pre_state: pre_state.clone(),
                    post_state: post_state.clone(),
                    uses: Vec::new(),
                });
                Vec::new()
            }
        }
    }

    /// Find a summary of `call` whose pre-state covers `state`.
    pub fn lookup(&self, call: &A, state: &MultiState<S>) -> Option<SummaryRef<A>> {
        self.summaries
            .get(call)?
            .iter()
            .position(|summary| state.is_subset_of(&summary.pre_state))
            .map(|index| SummaryRef {
                call: call.clone(),
                index,
            })
    }

    pub fn post_state(&self, summary: &SummaryRef<A>) -> Option<&MultiState<S>> {
        self.summaries
            .get(&summary.call)
            .and_then(|summaries| summaries.get(summary.index))
            .map(|summary| &summary.post_state)
    }

    /// Remember that `item` stepped over a call with `summary`.
    pub fn add_use(&mut self, summary: &SummaryRef<A>, item: ItemId) {
        if let Some(summary) = self
            .summaries
            .get_mut(&summary.call)
            .and_then(|summaries| summaries.get_mut(summary.index))
        {
            summary.uses.push(item);
        }
    }

    /// Every recorded `(pre-state, post-state)` pair of `call`.
    pub fn summaries(&self, call: &A) -> Vec<(&MultiState<S>, &MultiState<S>)> {
        self.summaries
            .get(call)
            .map(|summaries| {
                summaries
                    .iter()
                    .map(|summary| (&summary.pre_state, &summary.post_state))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The number of recorded pairs.
    pub fn len(&self) -> usize {
        self.summaries.values().map(|summaries| summaries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<A: Action, S: AbstractState> Default for SummaryMap<A, S> {
    fn default() -> Self {
        SummaryMap::new()
    }
}
