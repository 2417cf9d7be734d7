use super::*;
use crate::analysis::{TransitionProvider, VariableProvider};
use crate::Error;

// main: 0 -x:=1-> 2, 3 -x:=2-> 2
fn two_starts() -> Icfg<Statement> {
    let mut icfg = Icfg::new();
    icfg.add_procedure("main").unwrap();
    let join = icfg.new_node("main").unwrap();
    let second_start = icfg.new_node("main").unwrap();
    icfg.internal_transition(0, join, Statement::Assign("x", 1))
        .unwrap();
    icfg.internal_transition(second_start, join, Statement::Assign("x", 2))
        .unwrap();
    icfg
}

#[test]
fn single_start_stores_the_post() {
    let icfg = two_starts();
    let result = engine(&icfg, options(1, 1).build().unwrap())
        .run(&[0])
        .unwrap();

    let stored = result.root_state(&2).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored.states()[0].variable("x"), Interval::constant(1));
    assert!(result.counterexamples().is_empty());
    assert_eq!(result.statistics().merges(), 0);
}

#[test]
fn second_start_is_joined() {
    let icfg = two_starts();
    let result = engine(&icfg, options(1, 1).build().unwrap())
        .run(&[0, 3])
        .unwrap();

    let stored = result.root_state(&2).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored.states()[0].variable("x"), Interval::new(1, 2));
    assert!(result.counterexamples().is_empty());
    assert_eq!(result.statistics().merges(), 1);
}

#[test]
fn second_start_is_kept_apart() {
    let icfg = two_starts();
    let result = engine(&icfg, options(1, 2).build().unwrap())
        .run(&[0, 3])
        .unwrap();

    let stored = result.root_state(&2).unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(variable(&result, 2, "x"), Interval::new(1, 2));
}

// main: 0 -x:=5-> 2, 3 -x:=5-> 2, 2 -x+=1-> 4
#[test]
fn covered_states_are_not_propagated() {
    let mut icfg = Icfg::new();
    icfg.add_procedure("main").unwrap();
    let join = icfg.new_node("main").unwrap();
    let second_start = icfg.new_node("main").unwrap();
    let after = icfg.new_node("main").unwrap();
    icfg.internal_transition(0, join, Statement::Assign("x", 5))
        .unwrap();
    icfg.internal_transition(second_start, join, Statement::Assign("x", 5))
        .unwrap();
    icfg.internal_transition(join, after, Statement::Add("x", 1))
        .unwrap();

    let result = engine(&icfg, options(1, 1).build().unwrap())
        .run(&[0, second_start])
        .unwrap();

    // The second arrival at the join adds nothing and stops there.
    assert_eq!(result.statistics().iterations(), 3);
    assert_eq!(result.statistics().merges(), 0);
    assert_eq!(variable(&result, after, "x"), Interval::constant(6));
}

#[test]
fn start_locations_are_required() {
    let icfg = two_starts();
    let engine = engine(&icfg, options(1, 1).build().unwrap());
    assert!(matches!(engine.run(&[]), Err(Error::NoStartLocations)));
}

#[test]
fn statistics_as_json() {
    let icfg = two_starts();
    let result = engine(&icfg, options(1, 1).build().unwrap())
        .run(&[0, 3])
        .unwrap();

    let json = result.statistics().to_json().unwrap();
    assert!(json.contains("\"iterations\":2"));
    assert!(json.contains("\"merges\":1"));
}

// Every analysis starts with `limit` set to 100.
struct Limit;

impl VariableProvider<TestTransition, IntervalState> for Limit {
    fn define_initial_variables(
        &self,
        _: &TestTransition,
        state: IntervalState,
    ) -> Result<IntervalState, Error> {
        Ok(state.with("limit", Interval::constant(100)))
    }

    fn define_variables_after(
        &self,
        _: &TestTransition,
        state: &IntervalState,
        _: &IntervalState,
    ) -> Result<IntervalState, Error> {
        Ok(state.clone())
    }
}

#[test]
fn initial_variables_are_defined() {
    let icfg = two_starts();
    let engine = FixpointEngineBuilder::<usize, TestTransition, IntervalState>::new()
        .transition_provider(&icfg)
        .domain(IntervalDomain)
        .variable_provider(Limit)
        .loop_detector(IcfgLoopDetector::new(&icfg).unwrap())
        .options(options(1, 1).build().unwrap())
        .build()
        .unwrap();
    let result = engine.run(&[0]).unwrap();

    assert_eq!(variable(&result, 0, "limit"), Interval::constant(100));
    assert_eq!(variable(&result, 2, "limit"), Interval::constant(100));
    assert_eq!(variable(&result, 2, "x"), Interval::constant(1));
}

#[test]
fn start_locations_without_actions() {
    let icfg = two_starts();
    assert!(icfg.successor_actions(&2).is_empty());

    let result = engine(&icfg, options(1, 1).build().unwrap())
        .run(&[2])
        .unwrap();
    assert_eq!(result.statistics().iterations(), 0);
    assert!(result.root_state(&2).is_none());
}
