//! Pending transitions and the worklist that schedules them.
//!
//! A `WorklistItem` is an action waiting to be interpreted, together with the
//! context it is interpreted in: the state before the action, the stack of
//! entered scopes and the loops entered on the way. Items are never shared.
//! A successor copies the context of its predecessor, so bookkeeping done on
//! one item is invisible to its siblings.
//!
//! Items live in a `WorklistItems` arena and refer to their predecessor by
//! `ItemId`, which is how counterexamples are traced back to a start location.
//! The arena counts the references to every item. An item is freed once it
//! is neither queued, nor the predecessor of a live item, nor held otherwise,
//! so only the chains leading to pending work are kept.

use crate::analysis::domain::{AbstractState, Action, Location};
use crate::analysis::multi_state::MultiState;
use crate::analysis::options::WorklistOrder;
use crate::analysis::storage::StorageId;
use crate::analysis::summary::SummaryRef;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// The index of a `WorklistItem` inside its `WorklistItems`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct ItemId(pub(crate) usize);

impl ItemId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

#[derive(Clone, Debug)]
struct Scope<A, S> {
    action: A,
    storage: StorageId,
    hierarchical_pre_state: MultiState<S>,
    // The state the scope was entered with, widened against on recursion.
    entry_state: MultiState<S>,
    // Loops active when the scope was entered.
    loop_depth: usize,
}

#[derive(Clone, Debug)]
struct ActiveLoop<L, S> {
    head: L,
    counter: usize,
    snapshot: MultiState<S>,
}

/// An action waiting to be interpreted, and its context.
#[derive(Clone, Debug)]
pub struct WorklistItem<L, A, S> {
    action: A,
    pre_state: MultiState<S>,
    predecessor: Option<ItemId>,
    global_storage: StorageId,
    scopes: Vec<Scope<A, S>>,
    loops: Vec<ActiveLoop<L, S>>,
    summary: Option<SummaryRef<A>>,
    returned: bool,
}

impl<L: Location, A: Action, S: AbstractState> WorklistItem<L, A, S> {
    /// An item for `action` at a start location, outside of any scope.
    pub fn initial(
        action: A,
        pre_state: MultiState<S>,
        global_storage: StorageId,
    ) -> WorklistItem<L, A, S> {
        WorklistItem {
            action,
            pre_state,
            predecessor: None,
            global_storage,
            scopes: Vec::new(),
            loops: Vec::new(),
            summary: None,
            returned: false,
        }
    }

    /// An item for `action`, continuing from `predecessor` with `pre_state`.
    pub fn successor(
        pre_state: MultiState<S>,
        action: A,
        predecessor_id: ItemId,
        predecessor: &WorklistItem<L, A, S>,
    ) -> WorklistItem<L, A, S> {
        WorklistItem {
            action,
            pre_state,
            predecessor: Some(predecessor_id),
            global_storage: predecessor.global_storage,
            scopes: predecessor.scopes.clone(),
            loops: predecessor.loops.clone(),
            summary: None,
            returned: false,
        }
    }

    /// An item for `exit_action`, leaving a scope with `exit_state` and
    /// returning to the context of `call`.
    ///
    /// `call` entered a scope that was already covered by the activation at
    /// `storage`, and was not interpreted. The exits of that activation are
    /// handed to `call` through such items.
    pub fn returned(
        exit_state: MultiState<S>,
        exit_action: A,
        predecessor_id: Option<ItemId>,
        call: &WorklistItem<L, A, S>,
        storage: StorageId,
    ) -> WorklistItem<L, A, S> {
        let mut item = WorklistItem {
            action: exit_action,
            pre_state: exit_state,
            predecessor: predecessor_id,
            global_storage: call.global_storage,
            scopes: call.scopes.clone(),
            loops: call.loops.clone(),
            summary: None,
            returned: true,
        };
        item.add_scope(
            call.action.clone(),
            storage,
            call.pre_state.clone(),
            call.pre_state.clone(),
        );
        item
    }

    pub fn action(&self) -> &A {
        &self.action
    }

    pub fn pre_state(&self) -> &MultiState<S> {
        &self.pre_state
    }

    pub fn predecessor(&self) -> Option<ItemId> {
        self.predecessor
    }

    /// The summary this item steps over a call with, if any.
    pub fn summary(&self) -> Option<&SummaryRef<A>> {
        self.summary.as_ref()
    }

    pub(crate) fn set_summary(&mut self, summary: Option<SummaryRef<A>>) {
        self.summary = summary;
    }

    /// Returns true if this item hands the exit of a covering activation to
    /// a call which was not interpreted.
    pub fn is_returned(&self) -> bool {
        self.returned
    }

    /// The action which entered the innermost scope.
    pub fn current_scope(&self) -> Option<&A> {
        self.scopes.last().map(|scope| &scope.action)
    }

    /// The storage layer of the innermost scope.
    pub fn current_storage(&self) -> StorageId {
        self.scopes
            .last()
            .map(|scope| scope.storage)
            .unwrap_or(self.global_storage)
    }

    /// The storage layer the innermost scope returns to.
    pub fn caller_storage(&self) -> StorageId {
        let len = self.scopes.len();
        if len < 2 {
            self.global_storage
        } else {
            self.scopes[len - 2].storage
        }
    }

    /// The state right before the innermost scope was entered.
    pub fn hierarchical_pre_state(&self) -> Option<&MultiState<S>> {
        self.scopes.last().map(|scope| &scope.hierarchical_pre_state)
    }

    pub fn add_scope(
        &mut self,
        action: A,
        storage: StorageId,
        hierarchical_pre_state: MultiState<S>,
        entry_state: MultiState<S>,
    ) {
        self.scopes.push(Scope {
            action,
            storage,
            hierarchical_pre_state,
            entry_state,
            loop_depth: self.loops.len(),
        });
    }

    /// Leave the innermost scope, and every loop entered inside it. Returns
    /// the action which entered the scope and the state before it.
    pub fn remove_current_scope(&mut self) -> Option<(A, MultiState<S>)> {
        let scope = self.scopes.pop()?;
        self.loops.truncate(scope.loop_depth);
        Some((scope.action, scope.hierarchical_pre_state))
    }

    /// How deep entering the scope of `action` would recurse.
    ///
    /// Counts the entered scopes plus the prospective one, but only those
    /// whose action is `action` or occurs more than once.
    pub fn scope_reentry_depth(&self, action: &A) -> usize {
        let mut occurrences: Vec<(&A, usize)> = Vec::new();
        for scope_action in self
            .scopes
            .iter()
            .map(|scope| &scope.action)
            .chain(std::iter::once(action))
        {
            match occurrences.iter_mut().find(|(a, _)| *a == scope_action) {
                Some((_, count)) => *count += 1,
                None => occurrences.push((scope_action, 1)),
            }
        }
        occurrences
            .into_iter()
            .filter(|(a, count)| *count > 1 || *a == action)
            .map(|(_, count)| count)
            .sum()
    }

    /// The storage layer and entry state of the innermost scope entered by
    /// `action`.
    pub fn latest_scope_entry(&self, action: &A) -> Option<(StorageId, &MultiState<S>)> {
        self.scopes
            .iter()
            .rev()
            .find(|scope| scope.action == *action)
            .map(|scope| (scope.storage, &scope.entry_state))
    }

    // Loops entered in the innermost scope.
    fn scope_loops(&self) -> &[ActiveLoop<L, S>] {
        let depth = self.scopes.last().map(|scope| scope.loop_depth).unwrap_or(0);
        &self.loops[depth..]
    }

    /// Enter the loop at `loop_head` with `snapshot` as the state at its
    /// head. Loops entered after `loop_head` are left. Returns the loop
    /// counter before it was incremented.
    pub fn enter_loop(&mut self, loop_head: L, snapshot: MultiState<S>) -> usize {
        let depth = self.scopes.last().map(|scope| scope.loop_depth).unwrap_or(0);
        let position = self.loops[depth..]
            .iter()
            .position(|l| l.head == loop_head)
            .map(|position| position + depth);
        match position {
            Some(position) => {
                self.loops.truncate(position + 1);
                let active = &mut self.loops[position];
                let counter = active.counter;
                active.counter += 1;
                active.snapshot = snapshot;
                counter
            }
            None => {
                self.loops.push(ActiveLoop {
                    head: loop_head,
                    counter: 1,
                    snapshot,
                });
                0
            }
        }
    }

    /// Leave the innermost loop of the innermost scope, forgetting its
    /// counter.
    pub fn leave_current_loop(&mut self) -> Option<L> {
        self.current_loop_head()?;
        self.loops.pop().map(|l| l.head)
    }

    /// The head of the innermost loop of the innermost scope.
    pub fn current_loop_head(&self) -> Option<&L> {
        self.scope_loops().last().map(|l| &l.head)
    }

    pub fn is_active_loop_head(&self, location: &L) -> bool {
        self.scope_loops().iter().any(|l| l.head == *location)
    }

    /// The counter and snapshot of the active loop at `location`.
    pub fn loop_pair(&self, location: &L) -> Option<(usize, &MultiState<S>)> {
        self.scope_loops()
            .iter()
            .rev()
            .find(|l| l.head == *location)
            .map(|l| (l.counter, &l.snapshot))
    }
}

#[derive(Clone, Debug)]
struct Slot<L, A, S> {
    item: WorklistItem<L, A, S>,
    references: usize,
}

/// The live items of one fixpoint computation.
///
/// Inserting an item takes a reference to its predecessor. Every other holder
/// of an `ItemId` takes one with `retain` and gives it back with `release`.
#[derive(Clone, Debug)]
pub struct WorklistItems<L, A, S> {
    slots: Vec<Option<Slot<L, A, S>>>,
    free: Vec<usize>,
    live: usize,
}

impl<L: Location, A: Action, S: AbstractState> WorklistItems<L, A, S> {
    pub fn new() -> WorklistItems<L, A, S> {
        WorklistItems {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Insert `item` without any reference to it.
    pub fn insert(&mut self, item: WorklistItem<L, A, S>) -> Result<ItemId, Error> {
        if let Some(predecessor) = item.predecessor() {
            self.retain(predecessor)?;
        }
        let slot = Slot {
            item,
            references: 0,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(slot);
                index
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        self.live += 1;
        Ok(ItemId(index))
    }

    pub fn retain(&mut self, id: ItemId) -> Result<(), Error> {
        self.slot_mut(id)?.references += 1;
        Ok(())
    }

    /// Drop a reference to `id`. Items left without references are freed,
    /// and release their predecessor in turn.
    pub fn release(&mut self, id: ItemId) -> Result<(), Error> {
        let mut next = Some(id);
        while let Some(id) = next {
            let slot = self.slot_mut(id)?;
            slot.references = slot.references.saturating_sub(1);
            if slot.references > 0 {
                break;
            }
            next = self.slots[id.0]
                .take()
                .and_then(|slot| slot.item.predecessor());
            self.free.push(id.0);
            self.live -= 1;
        }
        Ok(())
    }

    pub fn get(&self, id: ItemId) -> Result<&WorklistItem<L, A, S>, Error> {
        self.slots
            .get(id.0)
            .and_then(|slot| slot.as_ref())
            .map(|slot| &slot.item)
            .ok_or(Error::ItemNotFound(id.0))
    }

    pub fn get_mut(&mut self, id: ItemId) -> Result<&mut WorklistItem<L, A, S>, Error> {
        Ok(&mut self.slot_mut(id)?.item)
    }

    fn slot_mut(&mut self, id: ItemId) -> Result<&mut Slot<L, A, S>, Error> {
        self.slots
            .get_mut(id.0)
            .and_then(|slot| slot.as_mut())
            .ok_or(Error::ItemNotFound(id.0))
    }

    /// The number of live items.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

impl<L: Location, A: Action, S: AbstractState> Default for WorklistItems<L, A, S> {
    fn default() -> Self {
        WorklistItems::new()
    }
}

/// The queue of items waiting to be processed.
#[derive(Clone, Debug)]
pub struct Worklist {
    order: WorklistOrder,
    queue: VecDeque<ItemId>,
}

impl Worklist {
    pub fn new(order: WorklistOrder) -> Worklist {
        Worklist {
            order,
            queue: VecDeque::new(),
        }
    }

    pub fn push(&mut self, id: ItemId) {
        self.queue.push_back(id);
    }

    pub fn pop(&mut self) -> Option<ItemId> {
        match self.order {
            WorklistOrder::Fifo => self.queue.pop_front(),
            WorklistOrder::Lifo => self.queue.pop_back(),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
