//! States scope activations were left with.
//!
//! A call whose entry state is covered by an activation further up its scope
//! stack is not entered. It subscribes to the storage layer of that
//! activation instead, and every state the activation leaves its scope with is
//! returned to the call as well. Those returns can reach the activation's exit
//! again, so an exit state is widened once it grew more than `max_unwindings`
//! times.

use crate::analysis::domain::{AbstractDomain, AbstractState, Action};
use crate::analysis::multi_state::MultiState;
use crate::analysis::options::FixpointOptions;
use crate::analysis::storage::StorageId;
use crate::analysis::worklist::ItemId;
use crate::Error;
use rustc_hash::FxHashMap;

/// The join of every state an activation left its scope with through
/// `action`.
#[derive(Clone, Debug)]
pub struct ScopeExit<A, S> {
    action: A,
    state: MultiState<S>,
    // The item which first reached the exit.
    predecessor: Option<ItemId>,
    growths: usize,
}

impl<A, S> ScopeExit<A, S> {
    pub fn action(&self) -> &A {
        &self.action
    }

    pub fn state(&self) -> &MultiState<S> {
        &self.state
    }

    pub fn predecessor(&self) -> Option<ItemId> {
        self.predecessor
    }
}

/// How recording an exit changed it.
#[derive(Clone, Debug)]
pub struct ExitUpdate<A, S> {
    exit: ScopeExit<A, S>,
    calls: Vec<ItemId>,
    first: bool,
    widened: bool,
}

impl<A, S> ExitUpdate<A, S> {
    pub fn exit(&self) -> &ScopeExit<A, S> {
        &self.exit
    }

    /// The calls subscribed to the activation.
    pub fn calls(&self) -> &[ItemId] {
        &self.calls
    }

    /// Returns true if the activation was not left through this action
    /// before.
    pub fn is_first(&self) -> bool {
        self.first
    }

    pub fn is_widened(&self) -> bool {
        self.widened
    }
}

#[derive(Clone, Debug)]
struct Activation<A, S> {
    exits: Vec<ScopeExit<A, S>>,
    calls: Vec<ItemId>,
}

impl<A, S> Default for Activation<A, S> {
    fn default() -> Self {
        Activation {
            exits: Vec::new(),
            calls: Vec::new(),
        }
    }
}

/// Exits and subscribed calls, per storage layer of an activation.
#[derive(Clone, Debug)]
pub struct ScopeExits<A, S> {
    activations: FxHashMap<StorageId, Activation<A, S>>,
}

impl<A: Action, S: AbstractState> ScopeExits<A, S> {
    pub fn new() -> ScopeExits<A, S> {
        ScopeExits {
            activations: FxHashMap::default(),
        }
    }

    /// Subscribe `call` to the activation at `layer`. Returns the exits
    /// recorded so far, which `call` has yet to return with.
    pub fn subscribe(&mut self, layer: StorageId, call: ItemId) -> Vec<ScopeExit<A, S>> {
        let activation = self.activations.entry(layer).or_default();
        activation.calls.push(call);
        activation.exits.clone()
    }

    /// Record that the activation at `layer` left its scope through `action`
    /// with `state`.
    ///
    /// Returns `None` if the recorded exit already covers `state`.
    pub fn record<D>(
        &mut self,
        layer: StorageId,
        action: &A,
        state: &MultiState<S>,
        predecessor: Option<ItemId>,
        domain: &D,
        options: &FixpointOptions,
    ) -> Result<Option<ExitUpdate<A, S>>, Error>
    where
        D: AbstractDomain<A, S> + ?Sized,
    {
        let activation = self.activations.entry(layer).or_default();
        let position = activation
            .exits
            .iter()
            .position(|exit| exit.action == *action);

        let (index, first, widened) = match position {
            None => {
                activation.exits.push(ScopeExit {
                    action: action.clone(),
                    state: state.clone(),
                    predecessor,
                    growths: 0,
                });
                (activation.exits.len() - 1, true, false)
            }
            Some(index) => {
                let exit = &mut activation.exits[index];
                if state.is_subset_of(&exit.state) {
                    return Ok(None);
                }
                exit.growths += 1;
                let merged = exit.state.merge(state, options.max_parallel_states());
                let widened = exit.growths > options.max_unwindings();
                exit.state = if widened {
                    exit.state.widen::<A, D>(domain, &merged)?
                } else {
                    merged
                };
                (index, false, widened)
            }
        };

        Ok(Some(ExitUpdate {
            exit: activation.exits[index].clone(),
            calls: activation.calls.clone(),
            first,
            widened,
        }))
    }
}

impl<A: Action, S: AbstractState> Default for ScopeExits<A, S> {
    fn default() -> Self {
        ScopeExits::new()
    }
}
