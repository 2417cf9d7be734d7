//! This lattice is used for testing. It is only built when tests are run.
//!
//! An interval domain over named integer variables, with a handful of
//! statements to drive it. Every variable is global, so calls and returns
//! pass the state through unchanged.

use crate::analysis::domain::{AbstractDomain, AbstractState};
use crate::icfg::Transition;
use crate::Error;
use std::collections::BTreeMap;
use std::fmt;

pub type TestTransition = Transition<Statement>;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Interval {
    lo: i64,
    hi: i64,
}

impl Interval {
    /// `i64::MIN` and `i64::MAX` stand for the infinities.
    pub fn new(lo: i64, hi: i64) -> Interval {
        Interval { lo, hi }
    }

    pub fn constant(value: i64) -> Interval {
        Interval::new(value, value)
    }

    pub fn top() -> Interval {
        Interval::new(i64::MIN, i64::MAX)
    }

    pub fn lo(&self) -> i64 {
        self.lo
    }

    pub fn hi(&self) -> i64 {
        self.hi
    }

    pub fn is_empty(&self) -> bool {
        self.lo > self.hi
    }

    pub fn is_subset_of(&self, other: &Interval) -> bool {
        other.lo <= self.lo && self.hi <= other.hi
    }

    pub fn join(&self, other: &Interval) -> Interval {
        Interval::new(self.lo.min(other.lo), self.hi.max(other.hi))
    }

    pub fn meet(&self, other: &Interval) -> Interval {
        Interval::new(self.lo.max(other.lo), self.hi.min(other.hi))
    }

    pub fn widen(&self, new: &Interval) -> Interval {
        let lo = if new.lo < self.lo { i64::MIN } else { self.lo };
        let hi = if new.hi > self.hi { i64::MAX } else { self.hi };
        Interval::new(lo, hi)
    }

    pub fn add(&self, value: i64) -> Interval {
        let lo = if self.lo == i64::MIN {
            i64::MIN
        } else {
            self.lo.saturating_add(value)
        };
        let hi = if self.hi == i64::MAX {
            i64::MAX
        } else {
            self.hi.saturating_add(value)
        };
        Interval::new(lo, hi)
    }
}

/// Variables missing from `variables` are unconstrained.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IntervalState {
    bottom: bool,
    variables: BTreeMap<String, Interval>,
}

impl IntervalState {
    pub fn new() -> IntervalState {
        IntervalState::default()
    }

    pub fn bottom() -> IntervalState {
        IntervalState {
            bottom: true,
            variables: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: &str, interval: Interval) -> IntervalState {
        self.set_variable(name, interval);
        self
    }

    pub fn variable(&self, name: &str) -> Interval {
        self.variables
            .get(name)
            .cloned()
            .unwrap_or_else(Interval::top)
    }

    pub fn set_variable(&mut self, name: &str, interval: Interval) {
        if interval.is_empty() {
            self.bottom = true;
            self.variables.clear();
        } else if !self.bottom {
            self.variables.insert(name.to_string(), interval);
        }
    }

    fn apply(&self, statement: &Statement) -> Vec<IntervalState> {
        if self.bottom {
            return Vec::new();
        }
        let mut state = self.clone();
        match *statement {
            Statement::Nop => {}
            Statement::Assign(name, value) => state.set_variable(name, Interval::constant(value)),
            Statement::Add(name, value) => {
                let interval = state.variable(name).add(value);
                state.set_variable(name, interval)
            }
            Statement::AssumeLessThan(name, value) => {
                let bound = Interval::new(i64::MIN, value.saturating_sub(1));
                let interval = state.variable(name).meet(&bound);
                state.set_variable(name, interval)
            }
            Statement::AssumeAtLeast(name, value) => {
                let interval = state.variable(name).meet(&Interval::new(value, i64::MAX));
                state.set_variable(name, interval)
            }
            Statement::AssumeFalse => return Vec::new(),
            Statement::Havoc(name) => {
                state.variables.remove(name);
            }
        }
        if state.bottom {
            Vec::new()
        } else {
            vec![state]
        }
    }
}

impl AbstractState for IntervalState {
    fn is_bottom(&self) -> bool {
        self.bottom
    }

    fn is_subset_of(&self, other: &IntervalState) -> bool {
        if self.bottom {
            return true;
        }
        if other.bottom {
            return false;
        }
        other
            .variables
            .iter()
            .all(|(name, interval)| self.variable(name).is_subset_of(interval))
    }

    fn join(&self, other: &IntervalState) -> IntervalState {
        if self.bottom {
            return other.clone();
        }
        if other.bottom {
            return self.clone();
        }
        let variables = self
            .variables
            .iter()
            .filter_map(|(name, interval)| {
                other
                    .variables
                    .get(name)
                    .map(|o| (name.clone(), interval.join(o)))
            })
            .collect();
        IntervalState {
            bottom: false,
            variables,
        }
    }

    fn tracked_variables(&self) -> usize {
        self.variables.len()
    }
}

impl fmt::Display for IntervalState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.bottom {
            return write!(f, "⊥");
        }
        let variables = self
            .variables
            .iter()
            .map(|(name, interval)| format!("{}=[{}, {}]", name, interval.lo, interval.hi))
            .collect::<Vec<String>>();
        write!(f, "{{{}}}", variables.join(", "))
    }
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Statement {
    Nop,
    Assign(&'static str, i64),
    Add(&'static str, i64),
    AssumeLessThan(&'static str, i64),
    AssumeAtLeast(&'static str, i64),
    AssumeFalse,
    Havoc(&'static str),
}

pub struct IntervalDomain;

impl AbstractDomain<TestTransition, IntervalState> for IntervalDomain {
    fn fresh_state(&self) -> IntervalState {
        IntervalState::new()
    }

    fn post(
        &self,
        state: &IntervalState,
        action: &TestTransition,
    ) -> Result<Vec<IntervalState>, Error> {
        Ok(state.apply(action.statement()))
    }

    fn post_hierarchical(
        &self,
        state: &IntervalState,
        _: &IntervalState,
        action: &TestTransition,
    ) -> Result<Vec<IntervalState>, Error> {
        Ok(state.apply(action.statement()))
    }

    fn widen(&self, old: &IntervalState, new: &IntervalState) -> Result<IntervalState, Error> {
        if old.bottom {
            return Ok(new.clone());
        }
        if new.bottom {
            return Ok(old.clone());
        }
        let variables = old
            .variables
            .iter()
            .filter_map(|(name, interval)| {
                new.variables
                    .get(name)
                    .map(|n| (name.clone(), interval.widen(n)))
            })
            .collect();
        Ok(IntervalState {
            bottom: false,
            variables,
        })
    }
}

#[test]
fn interval_widening() {
    let old = Interval::new(0, 1);
    assert_eq!(old.widen(&Interval::new(1, 2)), Interval::new(0, i64::MAX));
    assert_eq!(old.widen(&Interval::new(-1, 1)), Interval::new(i64::MIN, 1));
    assert_eq!(old.widen(&Interval::new(0, 1)), old);
}

#[test]
fn interval_state_order() {
    let small = IntervalState::new().with("x", Interval::new(1, 2));
    let large = IntervalState::new().with("x", Interval::new(0, 5));

    assert!(small.is_subset_of(&large));
    assert!(!large.is_subset_of(&small));
    assert!(small.is_subset_of(&IntervalState::new()));
    assert!(IntervalState::bottom().is_subset_of(&small));
    assert_eq!(small.join(&large), large);
}
