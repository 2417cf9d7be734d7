//! Layered storage of abstract states.
//!
//! `StateStorage` is an arena of `StorageLayer`s. The root layer holds the
//! states of the outermost scope, and every entered scope gets a child layer
//! of its own. Inserting a state into a layer joins it with the state already
//! stored for the same location.

use crate::analysis::domain::{AbstractState, Action, Location};
use crate::analysis::multi_state::MultiState;
use crate::Error;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The index of a `StorageLayer` inside its `StateStorage`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct StorageId(pub(crate) usize);

impl StorageId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "storage#{}", self.0)
    }
}

/// The states of one scope.
#[derive(Clone, Debug)]
pub struct StorageLayer<L, A, S> {
    id: StorageId,
    parent: Option<StorageId>,
    children: Vec<StorageId>,
    states: FxHashMap<L, MultiState<S>>,
    // Entry states of calls out of this layer that were found to be
    // fixpoints by scope widening.
    scope_fixpoints: FxHashMap<A, MultiState<S>>,
}

impl<L: Location, A: Action, S: AbstractState> StorageLayer<L, A, S> {
    fn new(id: StorageId, parent: Option<StorageId>) -> StorageLayer<L, A, S> {
        StorageLayer {
            id,
            parent,
            children: Vec::new(),
            states: FxHashMap::default(),
            scope_fixpoints: FxHashMap::default(),
        }
    }

    pub fn id(&self) -> StorageId {
        self.id
    }

    /// The layer of the calling scope. `None` for the root layer.
    pub fn parent(&self) -> Option<StorageId> {
        self.parent
    }

    pub fn children(&self) -> &[StorageId] {
        &self.children
    }

    pub fn abstract_state(&self, location: &L) -> Option<&MultiState<S>> {
        self.states.get(location)
    }

    /// Every location with a stored state, and its state.
    pub fn states(&self) -> impl Iterator<Item = (&L, &MultiState<S>)> {
        self.states.iter()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Every storage layer of one fixpoint computation.
#[derive(Clone, Debug)]
pub struct StateStorage<L, A, S> {
    layers: Vec<StorageLayer<L, A, S>>,
    max_parallel_states: usize,
}

impl<L: Location, A: Action, S: AbstractState> StateStorage<L, A, S> {
    /// Create a storage with an empty root layer. States stored in any layer
    /// keep at most `max_parallel_states` disjuncts.
    pub fn new(max_parallel_states: usize) -> StateStorage<L, A, S> {
        StateStorage {
            layers: vec![StorageLayer::new(StorageId(0), None)],
            max_parallel_states,
        }
    }

    pub fn root(&self) -> StorageId {
        StorageId(0)
    }

    pub fn layer(&self, id: StorageId) -> Result<&StorageLayer<L, A, S>, Error> {
        self.layers
            .get(id.0)
            .ok_or(Error::StorageNotFound(id.0))
    }

    fn layer_mut(&mut self, id: StorageId) -> Result<&mut StorageLayer<L, A, S>, Error> {
        self.layers
            .get_mut(id.0)
            .ok_or(Error::StorageNotFound(id.0))
    }

    pub fn layers(&self) -> &[StorageLayer<L, A, S>] {
        &self.layers
    }

    /// The number of layers, including the root layer.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Create a child layer of `parent`.
    pub fn create_storage(&mut self, parent: StorageId) -> Result<StorageId, Error> {
        let id = StorageId(self.layers.len());
        self.layer_mut(parent)?.children.push(id);
        self.layers.push(StorageLayer::new(id, Some(parent)));
        Ok(id)
    }

    /// The state stored for `location` in `layer`, if any.
    pub fn abstract_state(
        &self,
        layer: StorageId,
        location: &L,
    ) -> Result<Option<&MultiState<S>>, Error> {
        Ok(self.layer(layer)?.abstract_state(location))
    }

    /// Join `candidate` into the state stored for `location` in `layer`, and
    /// return the stored state.
    pub fn add_abstract_state(
        &mut self,
        layer: StorageId,
        location: L,
        candidate: &MultiState<S>,
    ) -> Result<&MultiState<S>, Error> {
        let max_parallel_states = self.max_parallel_states;
        let states = &mut self.layer_mut(layer)?.states;
        let stored = match states.remove(&location) {
            Some(previous) => previous.merge(candidate, max_parallel_states),
            None => MultiState::bottom().merge(candidate, max_parallel_states),
        };
        let stored: &MultiState<S> = states.entry(location).or_insert(stored);
        Ok(stored)
    }

    /// Record that entering the scope of `action` from `layer` with `state`
    /// reached a fixpoint.
    pub fn scope_fixpoint_reached(
        &mut self,
        layer: StorageId,
        action: A,
        state: &MultiState<S>,
    ) -> Result<(), Error> {
        let max_parallel_states = self.max_parallel_states;
        let fixpoints = &mut self.layer_mut(layer)?.scope_fixpoints;
        let snapshot = match fixpoints.remove(&action) {
            Some(previous) => previous.merge(state, max_parallel_states),
            None => state.clone(),
        };
        fixpoints.insert(action, snapshot);
        Ok(())
    }

    /// Returns true if entering the scope of `action` from `layer` with
    /// `state` is covered by a scope fixpoint.
    pub fn is_scope_fixpoint(
        &self,
        layer: StorageId,
        action: &A,
        state: &MultiState<S>,
    ) -> Result<bool, Error> {
        Ok(self
            .layer(layer)?
            .scope_fixpoints
            .get(action)
            .map(|snapshot| state.is_subset_of(snapshot))
            .unwrap_or(false))
    }
}
