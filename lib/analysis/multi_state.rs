//! A bounded disjunction of abstract states.

use crate::analysis::domain::{AbstractDomain, AbstractState};
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A disjunction of at most `max_width` abstract states.
///
/// Bottom states are never stored, and a state subsumed by another disjunct is
/// dropped. When a disjunction grows beyond its width, its two most recent
/// disjuncts are joined until the width is respected again. The empty
/// disjunction is bottom.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MultiState<S> {
    states: Vec<S>,
}

impl<S: AbstractState> MultiState<S> {
    /// The empty disjunction, which is bottom.
    pub fn bottom() -> MultiState<S> {
        MultiState { states: Vec::new() }
    }

    /// A disjunction of a single state.
    pub fn single(state: S) -> MultiState<S> {
        let mut multi_state = MultiState::bottom();
        multi_state.add(state);
        multi_state
    }

    /// Create a disjunction of `states`, bounded by `max_width`.
    pub fn from_states<I>(states: I, max_width: usize) -> MultiState<S>
    where
        I: IntoIterator<Item = S>,
    {
        let mut multi_state = MultiState::bottom();
        for state in states {
            multi_state.add(state);
        }
        multi_state.reduce(max_width);
        multi_state
    }

    /// The disjuncts of this state.
    pub fn states(&self) -> &[S] {
        &self.states
    }

    /// The number of disjuncts.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_bottom(&self) -> bool {
        self.states.iter().all(|state| state.is_bottom())
    }

    /// Every disjunct of `self` is a subset of some disjunct of `other`.
    pub fn is_subset_of(&self, other: &MultiState<S>) -> bool {
        self.states
            .iter()
            .all(|state| other.states.iter().any(|o| state.is_subset_of(o)))
    }

    pub fn is_equal_to(&self, other: &MultiState<S>) -> bool {
        self.is_subset_of(other) && other.is_subset_of(self)
    }

    /// The largest number of variables tracked by any disjunct.
    pub fn tracked_variables(&self) -> usize {
        self.states
            .iter()
            .map(|state| state.tracked_variables())
            .max()
            .unwrap_or(0)
    }

    /// Join every disjunct into one state. `None` if this state is bottom.
    pub fn collapse(&self) -> Option<S> {
        let mut states = self.states.iter();
        let first = states.next()?.clone();
        Some(states.fold(first, |joined, state| joined.join(state)))
    }

    /// Join this state with another, respecting `max_width`.
    pub fn merge(&self, other: &MultiState<S>, max_width: usize) -> MultiState<S> {
        let mut merged = self.clone();
        for state in &other.states {
            merged.add(state.clone());
        }
        merged.reduce(max_width);
        merged
    }

    /// Apply `f` to every disjunct.
    pub fn try_map<F>(&self, max_width: usize, mut f: F) -> Result<MultiState<S>, Error>
    where
        F: FnMut(&S) -> Result<S, Error>,
    {
        let states = self
            .states
            .iter()
            .map(&mut f)
            .collect::<Result<Vec<S>, Error>>()?;
        Ok(MultiState::from_states(states, max_width))
    }

    /// Apply the post operator of `domain` to every disjunct.
    pub fn apply_post<A, D>(
        &self,
        domain: &D,
        action: &A,
        max_width: usize,
    ) -> Result<MultiState<S>, Error>
    where
        D: AbstractDomain<A, S> + ?Sized,
    {
        let mut posts = Vec::new();
        for state in &self.states {
            posts.append(&mut domain.post(state, action)?);
        }
        Ok(MultiState::from_states(posts, max_width))
    }

    /// Apply the hierarchical post operator of `domain` to every pair of a
    /// disjunct of `self` and a disjunct of `hierarchical_pre_state`.
    pub fn apply_post_hierarchical<A, D>(
        &self,
        domain: &D,
        hierarchical_pre_state: &MultiState<S>,
        action: &A,
        max_width: usize,
    ) -> Result<MultiState<S>, Error>
    where
        D: AbstractDomain<A, S> + ?Sized,
    {
        let mut posts = Vec::new();
        for state in &self.states {
            for hierarchical in &hierarchical_pre_state.states {
                posts.append(&mut domain.post_hierarchical(state, hierarchical, action)?);
            }
        }
        Ok(MultiState::from_states(posts, max_width))
    }

    /// Widen `self`, the older state, with `newer`.
    ///
    /// Disjunctions are collapsed first, so the result has a single disjunct
    /// unless one of the operands is bottom.
    pub fn widen<A, D>(&self, domain: &D, newer: &MultiState<S>) -> Result<MultiState<S>, Error>
    where
        D: AbstractDomain<A, S> + ?Sized,
    {
        match (self.collapse(), newer.collapse()) {
            (Some(old), Some(new)) => Ok(MultiState::single(domain.widen(&old, &new)?)),
            (Some(_), None) => Ok(self.clone()),
            (None, _) => Ok(newer.clone()),
        }
    }

    // Adds a disjunct unless it is bottom or already covered, and drops the
    // disjuncts it covers.
    fn add(&mut self, state: S) {
        if state.is_bottom() || self.states.iter().any(|s| state.is_subset_of(s)) {
            return;
        }
        self.states.retain(|s| !s.is_subset_of(&state));
        self.states.push(state);
    }

    fn reduce(&mut self, max_width: usize) {
        let max_width = max_width.max(1);
        while self.states.len() > max_width {
            let (last, second_last) = match (self.states.pop(), self.states.pop()) {
                (Some(last), Some(second_last)) => (last, second_last),
                (Some(last), None) => {
                    self.states.push(last);
                    return;
                }
                (None, _) => return,
            };
            self.add(second_last.join(&last));
        }
    }
}

impl<S: AbstractState> Default for MultiState<S> {
    fn default() -> Self {
        MultiState::bottom()
    }
}

impl<S: fmt::Display> fmt::Display for MultiState<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.states.is_empty() {
            return write!(f, "⊥");
        }
        let states = self
            .states
            .iter()
            .map(|state| state.to_string())
            .collect::<Vec<String>>();
        write!(f, "{}", states.join(" ∨ "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_lattice::{Interval, IntervalDomain, IntervalState, TestTransition};

    fn x(lo: i64, hi: i64) -> IntervalState {
        IntervalState::new().with("x", Interval::new(lo, hi))
    }

    #[test]
    fn bottom_disjuncts_are_dropped() {
        let state = MultiState::from_states(vec![IntervalState::bottom(), x(0, 0)], 4);
        assert_eq!(state.len(), 1);
        assert!(!state.is_bottom());
        assert!(MultiState::single(IntervalState::bottom()).is_bottom());
    }

    #[test]
    fn subsumed_disjuncts_are_dropped() {
        let state = MultiState::from_states(vec![x(1, 1), x(0, 5), x(2, 3)], 4);
        assert_eq!(state.states(), &[x(0, 5)]);
    }

    #[test]
    fn width_is_bounded() {
        let state = MultiState::from_states(vec![x(0, 0), x(10, 10), x(20, 20)], 2);
        assert_eq!(state.len(), 2);
        assert_eq!(state.states(), &[x(0, 0), x(10, 20)]);

        let state = MultiState::from_states(vec![x(0, 0), x(10, 10), x(20, 20)], 1);
        assert_eq!(state.states(), &[x(0, 20)]);
    }

    #[test]
    fn merge_covers_both_operands() {
        let a = MultiState::single(x(0, 1));
        let b = MultiState::single(x(5, 7));

        let merged = a.merge(&b, 1);
        assert!(a.is_subset_of(&merged));
        assert!(b.is_subset_of(&merged));

        let merged = a.merge(&b, 2);
        assert_eq!(merged.len(), 2);
        assert!(a.is_subset_of(&merged));
        assert!(b.is_subset_of(&merged));
    }

    #[test]
    fn widen_collapses() {
        let old = MultiState::from_states(vec![x(0, 0), x(2, 2)], 2);
        let new = MultiState::single(x(0, 3));

        let widened = old.widen::<TestTransition, _>(&IntervalDomain, &new).unwrap();
        assert_eq!(widened.states(), &[x(0, i64::MAX)]);

        let widened = old.widen::<TestTransition, _>(&IntervalDomain, &MultiState::bottom()).unwrap();
        assert!(widened.is_equal_to(&old));
    }
}
