//! The interprocedural fixpoint engine.
//!
//! `FixpointEngine::run` propagates abstract states along the actions of a
//! control-flow graph until no stored state changes anymore. Each pending
//! action is a `WorklistItem`. An item is interpreted with the abstract
//! domain, its post-state is merged into the storage layer of its scope, and
//! an item is created for every action following it.
//!
//! Termination is enforced by widening in two places:
//!
//! * at loop heads, once a loop was entered more than `max_unwindings` times
//!   on the current path, the post-state is widened with the state the loop
//!   was last entered with.
//! * on recursive calls, once the call would recurse deeper than
//!   `max_unwindings`, the entry state is widened with the entry state of
//!   the previous activation of the same call.
//!
//! If widening does not change the state widened against, the item is a
//! fixpoint and is dropped. A recursive call dropped that way is covered by
//! the activation it was widened against, and every state that activation
//! returns with is returned to the call as well.

use crate::analysis::domain::{
    AbstractDomain, AbstractState, Action, DebugHelper, Location, LoopDetector, TransitionProvider,
    VariableProvider,
};
use crate::analysis::exits::{ScopeExit, ScopeExits};
use crate::analysis::multi_state::MultiState;
use crate::analysis::options::FixpointOptions;
use crate::analysis::progress::{ProgressTimer, Unbounded};
use crate::analysis::result::{AnalysisResult, Counterexample, Statistics};
use crate::analysis::storage::{StateStorage, StorageId};
use crate::analysis::summary::SummaryMap;
use crate::analysis::worklist::{ItemId, Worklist, WorklistItem, WorklistItems};
use crate::Error;
use log::{debug, info, trace, warn};
use rustc_hash::FxHashSet;

/// Computes fixpoints over the graph of a `TransitionProvider`.
///
/// Build one with `FixpointEngineBuilder`.
pub struct FixpointEngine<'a, L, A, S> {
    transition_provider: Box<dyn TransitionProvider<L, A> + 'a>,
    domain: Box<dyn AbstractDomain<A, S> + 'a>,
    variable_provider: Box<dyn VariableProvider<A, S> + 'a>,
    loop_detector: Box<dyn LoopDetector<A> + 'a>,
    debug_helper: Option<Box<dyn DebugHelper<A, S> + 'a>>,
    timer: Box<dyn ProgressTimer + 'a>,
    options: FixpointOptions,
}

impl<'a, L: Location, A: Action, S: AbstractState> FixpointEngine<'a, L, A, S> {
    pub fn options(&self) -> &FixpointOptions {
        &self.options
    }

    /// Compute a fixpoint starting from every action leaving one of
    /// `start_locations`.
    ///
    /// Fails with `Error::Cancelled` if the progress timer stops the
    /// computation, in which case nothing computed so far is returned.
    pub fn run(&self, start_locations: &[L]) -> Result<AnalysisResult<L, A, S>, Error> {
        if start_locations.is_empty() {
            return Err(Error::NoStartLocations);
        }

        let mut run = FixpointRun::new(self);
        run.seed(start_locations)?;
        run.process_worklist()?;
        debug!("{} items still referenced", run.items.len());

        info!(
            "fixpoint computed: {}, {} storage layers, {} counterexamples",
            run.statistics,
            run.storage.len(),
            run.counterexamples.len()
        );

        Ok(AnalysisResult::new(
            run.storage,
            run.summaries,
            run.counterexamples,
            run.statistics,
        ))
    }
}

/// Create a `FixpointEngine` with the builder pattern.
///
/// The transition provider, domain, variable provider, loop detector and
/// options are required. The debug helper is optional, and the timer
/// defaults to `Unbounded`.
pub struct FixpointEngineBuilder<'a, L, A, S> {
    transition_provider: Option<Box<dyn TransitionProvider<L, A> + 'a>>,
    domain: Option<Box<dyn AbstractDomain<A, S> + 'a>>,
    variable_provider: Option<Box<dyn VariableProvider<A, S> + 'a>>,
    loop_detector: Option<Box<dyn LoopDetector<A> + 'a>>,
    debug_helper: Option<Box<dyn DebugHelper<A, S> + 'a>>,
    timer: Option<Box<dyn ProgressTimer + 'a>>,
    options: Option<FixpointOptions>,
}

impl<'a, L: Location, A: Action, S: AbstractState> FixpointEngineBuilder<'a, L, A, S> {
    pub fn new() -> FixpointEngineBuilder<'a, L, A, S> {
        FixpointEngineBuilder {
            transition_provider: None,
            domain: None,
            variable_provider: None,
            loop_detector: None,
            debug_helper: None,
            timer: None,
            options: None,
        }
    }

    pub fn transition_provider<T>(mut self, transition_provider: T) -> Self
    where
        T: TransitionProvider<L, A> + 'a,
    {
        self.transition_provider = Some(Box::new(transition_provider));
        self
    }

    pub fn domain<D>(mut self, domain: D) -> Self
    where
        D: AbstractDomain<A, S> + 'a,
    {
        self.domain = Some(Box::new(domain));
        self
    }

    pub fn variable_provider<V>(mut self, variable_provider: V) -> Self
    where
        V: VariableProvider<A, S> + 'a,
    {
        self.variable_provider = Some(Box::new(variable_provider));
        self
    }

    pub fn loop_detector<D>(mut self, loop_detector: D) -> Self
    where
        D: LoopDetector<A> + 'a,
    {
        self.loop_detector = Some(Box::new(loop_detector));
        self
    }

    pub fn debug_helper<H>(mut self, debug_helper: H) -> Self
    where
        H: DebugHelper<A, S> + 'a,
    {
        self.debug_helper = Some(Box::new(debug_helper));
        self
    }

    pub fn timer<P>(mut self, timer: P) -> Self
    where
        P: ProgressTimer + 'a,
    {
        self.timer = Some(Box::new(timer));
        self
    }

    pub fn options(mut self, options: FixpointOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn build(self) -> Result<FixpointEngine<'a, L, A, S>, Error> {
        Ok(FixpointEngine {
            transition_provider: self
                .transition_provider
                .ok_or_else(|| missing("transition provider"))?,
            domain: self.domain.ok_or_else(|| missing("abstract domain"))?,
            variable_provider: self
                .variable_provider
                .ok_or_else(|| missing("variable provider"))?,
            loop_detector: self.loop_detector.ok_or_else(|| missing("loop detector"))?,
            debug_helper: self.debug_helper,
            timer: self.timer.unwrap_or_else(|| Box::new(Unbounded)),
            options: self.options.ok_or_else(|| missing("options"))?,
        })
    }
}

impl<'a, L: Location, A: Action, S: AbstractState> Default for FixpointEngineBuilder<'a, L, A, S> {
    fn default() -> Self {
        FixpointEngineBuilder::new()
    }
}

fn missing(what: &str) -> Error {
    Error::Configuration(format!("no {} given", what))
}

// The mutable state of one call to `FixpointEngine::run`.
struct FixpointRun<'e, 'a, L, A, S> {
    engine: &'e FixpointEngine<'a, L, A, S>,
    items: WorklistItems<L, A, S>,
    worklist: Worklist,
    storage: StateStorage<L, A, S>,
    summaries: SummaryMap<A, S>,
    exits: ScopeExits<A, S>,
    reached_errors: FxHashSet<A>,
    counterexamples: Vec<Counterexample<L, A, S>>,
    statistics: Statistics,
}

impl<'e, 'a, L: Location, A: Action, S: AbstractState> FixpointRun<'e, 'a, L, A, S> {
    fn new(engine: &'e FixpointEngine<'a, L, A, S>) -> FixpointRun<'e, 'a, L, A, S> {
        FixpointRun {
            engine,
            items: WorklistItems::new(),
            worklist: Worklist::new(engine.options.worklist_order()),
            storage: StateStorage::new(engine.options.max_parallel_states()),
            summaries: SummaryMap::new(),
            exits: ScopeExits::new(),
            reached_errors: FxHashSet::default(),
            counterexamples: Vec::new(),
            statistics: Statistics::default(),
        }
    }

    fn seed(&mut self, start_locations: &[L]) -> Result<(), Error> {
        let engine = self.engine;
        let root = self.storage.root();
        for location in start_locations {
            for action in engine.transition_provider.successor_actions(location) {
                let state = engine
                    .variable_provider
                    .define_initial_variables(&action, engine.domain.fresh_state())?;
                let pre_state = MultiState::single(state);
                self.storage
                    .add_abstract_state(root, location.clone(), &pre_state)?;
                let id = self
                    .items
                    .insert(WorklistItem::initial(action, pre_state, root))?;
                trace!("seeding {:?} with {:?}", location, id);
                self.enqueue(id)?;
            }
        }
        Ok(())
    }

    fn process_worklist(&mut self) -> Result<(), Error> {
        while !self.worklist.is_empty() {
            if !self.engine.timer.continue_processing() {
                warn!(
                    "fixpoint computation cancelled after {} iterations",
                    self.statistics.iterations
                );
                return Err(Error::Cancelled(self.statistics.iterations));
            }
            let id = match self.worklist.pop() {
                Some(id) => id,
                None => break,
            };
            self.statistics.iterations += 1;
            self.process(id)?;
            self.items.release(id)?;
        }
        Ok(())
    }

    fn enqueue(&mut self, id: ItemId) -> Result<(), Error> {
        self.items.retain(id)?;
        self.worklist.push(id);
        Ok(())
    }

    fn process(&mut self, id: ItemId) -> Result<(), Error> {
        let engine = self.engine;
        let tp = &*engine.transition_provider;

        let (action, entering, leaving) = {
            let item = self.items.get(id)?;
            let action = item.action().clone();
            let entering = tp.is_entering_scope(&action);
            let leaving = tp.is_leaving_scope(&action, item.current_scope());
            (action, entering, leaving)
        };
        let source = tp.source(&action);
        let target = tp.target(&action);
        trace!("{:?}: {:?}", id, action);

        if leaving {
            self.record_exit(id, &action)?;
        }

        let post = self.post_state(id, &action, leaving)?;
        if post.is_bottom() {
            trace!("{:?} is infeasible", action);
            return Ok(());
        }
        if self.is_covered(id, &action, &target, entering, leaving, &post)? {
            trace!("{:?} is covered at {:?}", action, target);
            if entering {
                let activation = self
                    .items
                    .get(id)?
                    .latest_scope_entry(&action)
                    .map(|(layer, _)| layer);
                if let Some(layer) = activation {
                    self.subscribe(id, layer)?;
                }
            }
            return Ok(());
        }

        // Scope and loop bookkeeping, done once per item.
        let mut stale_uses = Vec::new();
        {
            let max_parallel_states = engine.options.max_parallel_states();
            let item = self.items.get_mut(id)?;
            if leaving {
                if let Some((call, hierarchical_pre_state)) = item.remove_current_scope() {
                    debug!("leaving scope of {:?}", call);
                    stale_uses = self.summaries.record(
                        &call,
                        &hierarchical_pre_state,
                        &post,
                        max_parallel_states,
                    );
                }
            }
            if engine.loop_detector.is_entering_loop(&action) {
                let snapshot = item.pre_state().clone();
                let counter = item.enter_loop(source.clone(), snapshot);
                trace!("entering loop at {:?} for the {}. time", source, counter + 1);
            } else if item.current_loop_head() == Some(&source) {
                item.leave_current_loop();
                trace!("leaving loop at {:?}", source);
            }
        }
        for stale in stale_uses {
            self.requeue_summary_use(stale)?;
        }

        if tp.is_error_location(&target) && self.reached_errors.insert(action.clone()) {
            debug!("{:?} reaches error location {:?}", action, target);
            let counterexample = Counterexample::build(&self.items, id, post.clone(), tp)?;
            self.counterexamples.push(counterexample);
        }

        let post = match self.widen(id, &action, &target, entering, post)? {
            Some(post) => post,
            None => return Ok(()),
        };

        if entering {
            let caller = self.items.get(id)?.current_storage();
            let storage = self.storage.create_storage(caller)?;
            let item = self.items.get_mut(id)?;
            let hierarchical_pre_state = item.pre_state().clone();
            item.add_scope(action.clone(), storage, hierarchical_pre_state, post.clone());
            self.statistics.scope_entries += 1;
            debug!("entering scope of {:?} in {}", action, storage);
        }

        let layer = self.items.get(id)?.current_storage();
        let previous = self.storage.abstract_state(layer, &target)?.cloned();
        let stored = self.storage.add_abstract_state(layer, target.clone(), &post)?;
        self.statistics.max_tracked_variables = self
            .statistics
            .max_tracked_variables
            .max(stored.tracked_variables());
        if let Some(previous) = previous {
            if stored.is_equal_to(&previous) {
                trace!("{:?} did not change {:?}", action, target);
                return Ok(());
            }
            self.statistics.merges += 1;
        }

        self.enqueue_successors(id, &action, post)
    }

    // Interpret the action of item `id`.
    fn post_state(&mut self, id: ItemId, action: &A, leaving: bool) -> Result<MultiState<S>, Error> {
        let engine = self.engine;
        let max_parallel_states = engine.options.max_parallel_states();
        if let Some(summary) = self.items.get(id)?.summary().cloned() {
            let post = self
                .summaries
                .post_state(&summary)
                .cloned()
                .ok_or_else(|| format!("no summary for {:?}", summary.call()))?;
            self.summaries.add_use(&summary, id);
            self.items.retain(id)?;
            self.statistics.summaries_applied += 1;
            return Ok(post);
        }

        let item = self.items.get(id)?;
        let pre = item.pre_state();
        let hierarchical = item.hierarchical_pre_state().and_then(|state| state.collapse());
        let with_fresh_variables = pre.try_map(max_parallel_states, |state| {
            engine
                .variable_provider
                .define_variables_after(action, state, hierarchical.as_ref().unwrap_or(state))
        })?;

        let post = match (leaving, item.hierarchical_pre_state()) {
            (true, Some(hierarchical_pre_state)) => {
                let post = with_fresh_variables.apply_post_hierarchical(
                    &*engine.domain,
                    hierarchical_pre_state,
                    action,
                    max_parallel_states,
                )?;
                if post.is_bottom()
                    && !with_fresh_variables.is_bottom()
                    && !hierarchical_pre_state.is_bottom()
                {
                    warn!(
                        "{:?} has a bottom post-state although its pre-states are not bottom",
                        action
                    );
                }
                post
            }
            _ => with_fresh_variables.apply_post(&*engine.domain, action, max_parallel_states)?,
        };

        if let Some(debug_helper) = engine.debug_helper.as_ref() {
            if !engine.transition_provider.is_summary_with_implementation(action) {
                debug_assert!(
                    debug_helper.is_post_sound(
                        pre.states(),
                        with_fresh_variables.states(),
                        post.states(),
                        action
                    ),
                    "unsound post-state for {:?}",
                    action
                );
            }
        }

        Ok(post)
    }

    // Returns true if `post` adds nothing to what is already known at
    // `target`.
    fn is_covered(
        &self,
        id: ItemId,
        action: &A,
        target: &L,
        entering: bool,
        leaving: bool,
        post: &MultiState<S>,
    ) -> Result<bool, Error> {
        let item = self.items.get(id)?;
        if entering {
            return self
                .storage
                .is_scope_fixpoint(item.current_storage(), action, post);
        }
        let layer = if leaving {
            item.caller_storage()
        } else {
            item.current_storage()
        };
        Ok(self
            .storage
            .abstract_state(layer, target)?
            .map(|stored| post.is_subset_of(stored))
            .unwrap_or(false))
    }

    // Widen `post` if the loop or recursion bound was exceeded. Returns
    // `None` if widening reached a fixpoint.
    fn widen(
        &mut self,
        id: ItemId,
        action: &A,
        target: &L,
        entering: bool,
        post: MultiState<S>,
    ) -> Result<Option<MultiState<S>>, Error> {
        let engine = self.engine;
        let max_unwindings = engine.options.max_unwindings();
        let item = self.items.get(id)?;

        if !entering {
            if let Some((counter, snapshot)) = item.loop_pair(target) {
                if counter > max_unwindings {
                    let widened = snapshot.widen(&*engine.domain, &post)?;
                    self.statistics.widenings += 1;
                    debug!("widening at loop head {:?}: {:?}", target, widened);
                    if widened.is_equal_to(snapshot) {
                        self.statistics.fixpoints += 1;
                        debug!("fixpoint at loop head {:?}", target);
                        return Ok(None);
                    }
                    return Ok(Some(widened));
                }
            }
            return Ok(Some(post));
        }

        if item.scope_reentry_depth(action) > max_unwindings {
            if let Some((activation, snapshot)) = item.latest_scope_entry(action) {
                let widened = snapshot.widen(&*engine.domain, &post)?;
                self.statistics.widenings += 1;
                debug!("widening entry of {:?}: {:?}", action, widened);
                if widened.is_equal_to(snapshot) {
                    self.statistics.fixpoints += 1;
                    debug!("scope fixpoint for {:?}", action);
                    let layer = item.current_storage();
                    let snapshot = snapshot.clone();
                    self.storage
                        .scope_fixpoint_reached(layer, action.clone(), &snapshot)?;
                    self.subscribe(id, activation)?;
                    return Ok(None);
                }
                return Ok(Some(widened));
            }
        }
        Ok(Some(post))
    }

    fn enqueue_successors(
        &mut self,
        id: ItemId,
        action: &A,
        post: MultiState<S>,
    ) -> Result<(), Error> {
        let engine = self.engine;
        let tp = &*engine.transition_provider;
        let item = self.items.get(id)?;

        let mut successors = Vec::new();
        for successor in tp.successors(action, item.current_scope()) {
            if tp.is_summary_with_implementation(&successor) {
                continue;
            }
            let mut successor_action = successor;
            let mut summary = None;
            if engine.options.use_summaries() && tp.is_entering_scope(&successor_action) {
                if let Some(found) = self.summaries.lookup(&successor_action, &post) {
                    if let Some(summary_action) = tp.summary_for_call(&successor_action) {
                        trace!("stepping over {:?} with a summary", successor_action);
                        successor_action = summary_action;
                        summary = Some(found);
                    }
                }
            }
            let mut successor_item =
                WorklistItem::successor(post.clone(), successor_action, id, item);
            successor_item.set_summary(summary);
            successors.push(successor_item);
        }

        for successor in successors {
            let successor_id = self.items.insert(successor)?;
            trace!("enqueueing {:?} after {:?}", successor_id, id);
            self.enqueue(successor_id)?;
        }
        Ok(())
    }

    // Remember the state the activation of item `id` leaves its scope with,
    // and return it to the calls covered by that activation.
    fn record_exit(&mut self, id: ItemId, action: &A) -> Result<(), Error> {
        let engine = self.engine;
        let item = self.items.get(id)?;
        if item.is_returned() || item.pre_state().is_bottom() {
            return Ok(());
        }
        let layer = item.current_storage();
        let update = self.exits.record(
            layer,
            action,
            item.pre_state(),
            item.predecessor(),
            &*engine.domain,
            &engine.options,
        )?;
        let update = match update {
            Some(update) => update,
            None => return Ok(()),
        };

        if update.is_first() {
            if let Some(predecessor) = update.exit().predecessor() {
                self.items.retain(predecessor)?;
            }
        }
        if update.is_widened() {
            self.statistics.widenings += 1;
            debug!("widening exit of {}: {:?}", layer, update.exit().state());
        }
        for call in update.calls() {
            self.return_to(*call, layer, update.exit())?;
        }
        Ok(())
    }

    // Item `call` is covered by the activation at `layer`.
    fn subscribe(&mut self, call: ItemId, layer: StorageId) -> Result<(), Error> {
        debug!("{:?} is covered by the activation in {}", call, layer);
        self.items.retain(call)?;
        for exit in self.exits.subscribe(layer, call) {
            self.return_to(call, layer, &exit)?;
        }
        Ok(())
    }

    fn return_to(
        &mut self,
        call: ItemId,
        layer: StorageId,
        exit: &ScopeExit<A, S>,
    ) -> Result<(), Error> {
        let returned = WorklistItem::returned(
            exit.state().clone(),
            exit.action().clone(),
            exit.predecessor(),
            self.items.get(call)?,
            layer,
        );
        let returned_id = self.items.insert(returned)?;
        trace!("returning {:?} to {:?} as {:?}", exit.action(), call, returned_id);
        self.enqueue(returned_id)
    }

    // Create a fresh copy of an item which stepped over a call with a summary
    // that has since grown.
    fn requeue_summary_use(&mut self, stale: ItemId) -> Result<(), Error> {
        let item = self.items.get(stale)?;
        let predecessor_id = match item.predecessor() {
            Some(predecessor_id) => predecessor_id,
            None => return Ok(()),
        };
        let predecessor = self.items.get(predecessor_id)?;
        let mut requeued = WorklistItem::successor(
            item.pre_state().clone(),
            item.action().clone(),
            predecessor_id,
            predecessor,
        );
        requeued.set_summary(item.summary().cloned());

        let requeued_id = self.items.insert(requeued)?;
        trace!("requeueing {:?} as {:?}", stale, requeued_id);
        self.enqueue(requeued_id)?;
        self.items.release(stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::domain::NoFreshVariables;
    use crate::analysis::test_lattice::{IntervalDomain, IntervalState, Statement, TestTransition};
    use crate::icfg::{Icfg, IcfgLoopDetector};

    fn linear_icfg() -> Icfg<Statement> {
        let mut icfg = Icfg::new();
        icfg.add_procedure("main").unwrap();
        icfg.internal_transition(0, 1, Statement::Assign("x", 1))
            .unwrap();
        icfg
    }

    #[test]
    fn missing_collaborators() {
        let icfg = linear_icfg();
        let options = FixpointOptions::new(1, 1).unwrap();

        let engine = FixpointEngineBuilder::<usize, TestTransition, IntervalState>::new()
            .transition_provider(&icfg)
            .domain(IntervalDomain)
            .variable_provider(NoFreshVariables)
            .options(options.clone())
            .build();
        assert!(matches!(engine, Err(Error::Configuration(_))));

        let engine = FixpointEngineBuilder::<usize, TestTransition, IntervalState>::new()
            .transition_provider(&icfg)
            .domain(IntervalDomain)
            .variable_provider(NoFreshVariables)
            .loop_detector(IcfgLoopDetector::new(&icfg).unwrap())
            .build();
        assert!(matches!(engine, Err(Error::Configuration(_))));

        let engine = FixpointEngineBuilder::<usize, TestTransition, IntervalState>::new()
            .transition_provider(&icfg)
            .domain(IntervalDomain)
            .variable_provider(NoFreshVariables)
            .loop_detector(IcfgLoopDetector::new(&icfg).unwrap())
            .options(options)
            .build();
        assert!(engine.is_ok());
    }

    #[test]
    fn no_start_locations() {
        let icfg = linear_icfg();
        let engine = FixpointEngineBuilder::<usize, TestTransition, IntervalState>::new()
            .transition_provider(&icfg)
            .domain(IntervalDomain)
            .variable_provider(NoFreshVariables)
            .loop_detector(IcfgLoopDetector::new(&icfg).unwrap())
            .options(FixpointOptions::new(1, 1).unwrap())
            .build()
            .unwrap();

        assert!(matches!(engine.run(&[]), Err(Error::NoStartLocations)));

        let result = engine.run(&[0]).unwrap();
        assert_eq!(result.statistics().iterations(), 1);
        assert!(result.root_state(&1).is_some());
    }

    #[test]
    fn processed_items_are_freed() {
        let mut icfg = Icfg::new();
        icfg.add_procedure("main").unwrap();
        let head = icfg.new_node("main").unwrap();
        icfg.internal_transition(0, head, Statement::Assign("x", 0))
            .unwrap();
        icfg.internal_transition(head, head, Statement::Add("x", 1))
            .unwrap();
        icfg.internal_transition(head, 1, Statement::Nop).unwrap();

        let engine = FixpointEngineBuilder::<usize, TestTransition, IntervalState>::new()
            .transition_provider(&icfg)
            .domain(IntervalDomain)
            .variable_provider(NoFreshVariables)
            .loop_detector(IcfgLoopDetector::new(&icfg).unwrap())
            .options(FixpointOptions::new(2, 1).unwrap())
            .build()
            .unwrap();

        let mut run = FixpointRun::new(&engine);
        run.seed(&[0]).unwrap();
        assert_eq!(run.items.len(), 1);
        run.process_worklist().unwrap();

        assert!(run.statistics.iterations > 3);
        assert!(run.items.is_empty());
        let root = run.storage.root();
        assert!(run.storage.abstract_state(root, &1).unwrap().is_some());
    }
}
