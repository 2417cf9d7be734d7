//! Kestrel: Interprocedural Abstract Interpretation in Rust
//!
//! Kestrel computes, for every reachable location of a control-flow graph,
//! an abstract state over-approximating the concrete states at that
//! location, and reports abstract counterexamples for reachable error
//! locations.
//!
//! # Overview
//!
//! * `analysis` holds the `FixpointEngine` and the traits an abstract domain
//!   and a control-flow graph implement to be analyzed by it.
//! * `icfg` is a ready-made interprocedural control-flow graph implementing
//!   those traits.
//! * `graph` is the directed graph underneath, with dominator and natural
//!   loop computations.
//!
//! # Usage
//!
//! ```ignore
//! let loop_detector = IcfgLoopDetector::new(&icfg)?;
//! let engine = FixpointEngineBuilder::new()
//!     .transition_provider(&icfg)
//!     .domain(MyDomain)
//!     .variable_provider(NoFreshVariables)
//!     .loop_detector(loop_detector)
//!     .options(FixpointOptions::new(3, 2)?)
//!     .build()?;
//! let result = engine.run(&[icfg.procedure("main")?.entry()])?;
//! for counterexample in result.counterexamples() {
//!     println!("{}", counterexample);
//! }
//! ```

pub mod analysis;
pub mod graph;
pub mod icfg;

mod error;
#[cfg(test)]
mod tests;

pub use error::*;
