//! Abstractions/traits for the collaborators of the fixpoint engine.
//!
//! The engine never inspects locations, actions or abstract states. Everything
//! it needs to know about them is asked through the traits in this module:
//!
//! * `TransitionProvider` exposes the structure of the control-flow graph.
//! * `AbstractState` and `AbstractDomain` implement the abstract domain.
//! * `VariableProvider` materializes variables entering scope.
//! * `LoopDetector` classifies loop-entry actions.
//! * `DebugHelper` checks posts for soundness in debug builds.

use crate::Error;
use std::fmt::Debug;
use std::hash::Hash;

/// A location (program point) in the control-flow graph.
pub trait Location: Clone + Debug + Eq + Hash + Ord {}

impl<T> Location for T where T: Clone + Debug + Eq + Hash + Ord {}

/// An action (edge) in the control-flow graph.
pub trait Action: Clone + Debug + Eq + Hash + Ord {}

impl<T> Action for T where T: Clone + Debug + Eq + Hash + Ord {}

/// An abstract state
pub trait AbstractState: Clone + Debug {
    /// Returns true if this state represents no concrete state at all.
    fn is_bottom(&self) -> bool;

    /// Returns true if every concrete state represented by `self` is also
    /// represented by `other`.
    fn is_subset_of(&self, other: &Self) -> bool;

    /// Returns true if both states represent the same concrete states.
    fn is_equal_to(&self, other: &Self) -> bool {
        self.is_subset_of(other) && other.is_subset_of(self)
    }

    /// Join this abstract state with another
    fn join(&self, other: &Self) -> Self;

    /// The number of variables this state tracks. Only used for statistics.
    fn tracked_variables(&self) -> usize {
        0
    }
}

/// An abstract domain, which supplies the transformers over abstract states
/// of type `S` for actions of type `A`.
pub trait AbstractDomain<A, S: AbstractState> {
    /// Return a state with no variables defined, which is where every
    /// analysis starts from.
    fn fresh_state(&self) -> S;

    /// The abstract post operator. May return several disjuncts, or none if
    /// the action is infeasible from `state`.
    fn post(&self, state: &S, action: &A) -> Result<Vec<S>, Error>;

    /// The abstract post operator for actions which leave a scope.
    ///
    /// `hierarchical_pre_state` is the state that held right before the
    /// matching scope was entered.
    fn post_hierarchical(
        &self,
        state: &S,
        hierarchical_pre_state: &S,
        action: &A,
    ) -> Result<Vec<S>, Error>;

    /// The widening operator. The result must over-approximate both states,
    /// and repeated widening must stabilize.
    fn widen(&self, old: &S, new: &S) -> Result<S, Error>;
}

/// Materializes the variables which come into scope with an action.
pub trait VariableProvider<A, S> {
    /// Define the variables live before the very first action of an
    /// analysis.
    fn define_initial_variables(&self, action: &A, state: S) -> Result<S, Error>;

    /// Define the variables which are fresh after `action` was taken from
    /// `state`.
    fn define_variables_after(
        &self,
        action: &A,
        state: &S,
        hierarchical_pre_state: &S,
    ) -> Result<S, Error>;
}

/// A `VariableProvider` for domains which define variables on assignment.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFreshVariables;

impl<A, S: Clone> VariableProvider<A, S> for NoFreshVariables {
    fn define_initial_variables(&self, _: &A, state: S) -> Result<S, Error> {
        Ok(state)
    }

    fn define_variables_after(&self, _: &A, state: &S, _: &S) -> Result<S, Error> {
        Ok(state.clone())
    }
}

/// Exposes the structure of an (interprocedural) control-flow graph.
pub trait TransitionProvider<L, A> {
    /// All actions leaving `location`.
    fn successor_actions(&self, location: &L) -> Vec<A>;

    /// The location `action` starts from.
    fn source(&self, action: &A) -> L;

    /// The location `action` leads to.
    fn target(&self, action: &A) -> L;

    /// The actions which may follow `action`, given the action which entered
    /// the scope we are currently in.
    fn successors(&self, action: &A, current_scope: Option<&A>) -> Vec<A>;

    /// Returns true if `action` enters a new scope, e.g. a call.
    fn is_entering_scope(&self, action: &A) -> bool;

    /// Returns true if `action` leaves `current_scope`, e.g. the matching
    /// return of a call.
    fn is_leaving_scope(&self, action: &A, current_scope: Option<&A>) -> bool;

    /// Returns true if reaching `location` is an error.
    fn is_error_location(&self, location: &L) -> bool;

    /// Returns true if `action` summarizes a call whose body is analyzed
    /// through the call itself.
    fn is_summary_with_implementation(&self, action: &A) -> bool;

    /// The summary action belonging to the call `action`, if there is one.
    fn summary_for_call(&self, action: &A) -> Option<A>;
}

impl<'t, L, A, T> TransitionProvider<L, A> for &'t T
where
    T: TransitionProvider<L, A> + ?Sized,
{
    fn successor_actions(&self, location: &L) -> Vec<A> {
        (**self).successor_actions(location)
    }

    fn source(&self, action: &A) -> L {
        (**self).source(action)
    }

    fn target(&self, action: &A) -> L {
        (**self).target(action)
    }

    fn successors(&self, action: &A, current_scope: Option<&A>) -> Vec<A> {
        (**self).successors(action, current_scope)
    }

    fn is_entering_scope(&self, action: &A) -> bool {
        (**self).is_entering_scope(action)
    }

    fn is_leaving_scope(&self, action: &A, current_scope: Option<&A>) -> bool {
        (**self).is_leaving_scope(action, current_scope)
    }

    fn is_error_location(&self, location: &L) -> bool {
        (**self).is_error_location(location)
    }

    fn is_summary_with_implementation(&self, action: &A) -> bool {
        (**self).is_summary_with_implementation(action)
    }

    fn summary_for_call(&self, action: &A) -> Option<A> {
        (**self).summary_for_call(action)
    }
}

/// Classifies actions which enter a loop body from a loop head.
pub trait LoopDetector<A> {
    fn is_entering_loop(&self, action: &A) -> bool;
}

impl<'l, A, T> LoopDetector<A> for &'l T
where
    T: LoopDetector<A> + ?Sized,
{
    fn is_entering_loop(&self, action: &A) -> bool {
        (**self).is_entering_loop(action)
    }
}

/// Cross-checks the abstract post operator. Only consulted in debug builds.
pub trait DebugHelper<A, S> {
    fn is_post_sound(&self, pre: &[S], pre_with_fresh_variables: &[S], post: &[S], action: &A)
        -> bool;
}
