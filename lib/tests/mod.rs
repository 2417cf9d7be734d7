use crate::analysis::test_lattice::{Interval, IntervalDomain, IntervalState, Statement, TestTransition};
use crate::analysis::{
    AnalysisResult, FixpointEngine, FixpointEngineBuilder, FixpointOptions,
    FixpointOptionsBuilder, NoFreshVariables,
};
use crate::icfg::{Icfg, IcfgLoopDetector};

mod recursion;
mod scenario;

type TestResult = AnalysisResult<usize, TestTransition, IntervalState>;

fn options(max_unwindings: usize, max_parallel_states: usize) -> FixpointOptionsBuilder {
    FixpointOptionsBuilder::new()
        .max_unwindings(max_unwindings)
        .max_parallel_states(max_parallel_states)
}

fn engine(
    icfg: &Icfg<Statement>,
    options: FixpointOptions,
) -> FixpointEngine<'_, usize, TestTransition, IntervalState> {
    FixpointEngineBuilder::new()
        .transition_provider(icfg)
        .domain(IntervalDomain)
        .variable_provider(NoFreshVariables)
        .loop_detector(IcfgLoopDetector::new(icfg).unwrap())
        .options(options)
        .build()
        .unwrap()
}

// Analyze `icfg` from the entry of main.
fn analyze(icfg: &Icfg<Statement>, options: FixpointOptions) -> TestResult {
    let entry = icfg.procedure("main").unwrap().entry();
    engine(icfg, options).run(&[entry]).unwrap()
}

// The value of `name` at `location`, joined over every scope.
fn variable(result: &TestResult, location: usize, name: &str) -> Interval {
    result.joined_state_at(&location).unwrap().variable(name)
}
