use super::*;

// main: 0 -x:=0-> 4 -call f-> 5 -> 1
// f:    2 -x+=1-> 6, 6 -> 3, 6 -call f-> 7 -> 3
fn recursive_increment() -> Icfg<Statement> {
    let mut icfg = Icfg::new();
    icfg.add_procedure("main").unwrap();
    icfg.add_procedure("f").unwrap();

    let call_site = icfg.new_node("main").unwrap();
    let return_site = icfg.new_node("main").unwrap();
    let body = icfg.new_node("f").unwrap();
    let recursive_return_site = icfg.new_node("f").unwrap();

    icfg.internal_transition(0, call_site, Statement::Assign("x", 0))
        .unwrap();
    icfg.call(call_site, return_site, "f", Statement::Nop)
        .unwrap();
    icfg.internal_transition(return_site, 1, Statement::Nop)
        .unwrap();

    icfg.internal_transition(2, body, Statement::Add("x", 1))
        .unwrap();
    icfg.internal_transition(body, 3, Statement::Nop).unwrap();
    icfg.call(body, recursive_return_site, "f", Statement::Nop)
        .unwrap();
    icfg.internal_transition(recursive_return_site, 3, Statement::Nop)
        .unwrap();

    icfg
}

#[test]
fn recursion_is_widened() {
    let icfg = recursive_increment();
    let result = analyze(&icfg, options(1, 1).build().unwrap());

    let return_site = result.root_state(&5).unwrap().collapse().unwrap();
    assert_eq!(return_site.variable("x"), Interval::new(1, i64::MAX));

    assert!(result.statistics().widenings() >= 1);
    assert!(result.statistics().fixpoints() >= 1);
    assert!(result.statistics().scope_entries() >= 3);
    assert!(!result.has_reached_error());
}

#[test]
fn every_activation_has_a_storage_layer() {
    let icfg = recursive_increment();
    let result = analyze(&icfg, options(1, 1).build().unwrap());

    // The body of f is only ever reached inside a scope.
    assert!(result.root_state(&6).is_none());
    let layers = result.states_at(&6);
    assert!(layers.len() >= 2);
    assert!(layers
        .iter()
        .all(|(id, _)| result.storage().layer(*id).unwrap().parent().is_some()));

    let root = result.storage().root();
    assert_eq!(result.storage().layer(root).unwrap().children().len(), 1);
}

#[test]
fn calls_record_summaries() {
    let icfg = recursive_increment();
    let result = analyze(&icfg, options(1, 1).build().unwrap());

    let call = icfg.transition(4, 2).unwrap();
    let summaries = result.summaries().summaries(call);
    assert_eq!(summaries.len(), 1);

    let (pre, post) = summaries[0];
    assert_eq!(
        pre.collapse().unwrap().variable("x"),
        Interval::constant(0)
    );
    assert_eq!(
        post.collapse().unwrap().variable("x"),
        Interval::new(1, i64::MAX)
    );
}

// main: 0 -> 4 -call f-> 5, 5 -y>=5-> error, 5 -> 1
// f:    2 -y:=0-> 3, 2 -> 7 -call f-> 8 -y+=1-> 3
fn recursive_counter() -> (Icfg<Statement>, usize) {
    let mut icfg = Icfg::new();
    icfg.add_procedure("main").unwrap();
    icfg.add_procedure("f").unwrap();

    let call_site = icfg.new_node("main").unwrap();
    let return_site = icfg.new_node("main").unwrap();
    let error = icfg.new_error_node("main").unwrap();
    let recursive_call_site = icfg.new_node("f").unwrap();
    let recursive_return_site = icfg.new_node("f").unwrap();

    icfg.internal_transition(0, call_site, Statement::Nop).unwrap();
    icfg.call(call_site, return_site, "f", Statement::Nop)
        .unwrap();
    icfg.internal_transition(return_site, error, Statement::AssumeAtLeast("y", 5))
        .unwrap();
    icfg.internal_transition(return_site, 1, Statement::Nop)
        .unwrap();

    icfg.internal_transition(2, 3, Statement::Assign("y", 0))
        .unwrap();
    icfg.internal_transition(2, recursive_call_site, Statement::Nop)
        .unwrap();
    icfg.call(recursive_call_site, recursive_return_site, "f", Statement::Nop)
        .unwrap();
    icfg.internal_transition(recursive_return_site, 3, Statement::Add("y", 1))
        .unwrap();

    (icfg, error)
}

#[test]
fn covered_recursive_calls_still_return() {
    let (icfg, error) = recursive_counter();

    for max_unwindings in [1, 3] {
        let result = analyze(&icfg, options(max_unwindings, 1).build().unwrap());

        assert_eq!(variable(&result, 5, "y"), Interval::new(0, i64::MAX));
        assert!(result.statistics().fixpoints() >= 1);
        assert!(result.has_reached_error());
        assert_eq!(variable(&result, error, "y"), Interval::new(5, i64::MAX));
    }
}
