//! Interprocedural abstract interpretation.
//!
//! The `FixpointEngine` is generic over locations, actions and abstract
//! states, and learns everything about them through the traits in `domain`.
//! An `Icfg` from `crate::icfg` supplies the graph side of those traits.

mod domain;
mod exits;
pub mod fixed_point;
mod multi_state;
mod options;
pub mod progress;
mod result;
mod storage;
mod summary;
#[cfg(test)]
pub(crate) mod test_lattice;
mod worklist;

pub use self::domain::{
    AbstractDomain, AbstractState, Action, DebugHelper, Location, LoopDetector, NoFreshVariables,
    TransitionProvider, VariableProvider,
};
pub use self::fixed_point::{FixpointEngine, FixpointEngineBuilder};
pub use self::multi_state::MultiState;
pub use self::options::{FixpointOptions, FixpointOptionsBuilder, WorklistOrder};
pub use self::progress::{CancellationFlag, Deadline, ProgressTimer, Unbounded};
pub use self::result::{AnalysisResult, Counterexample, Statistics, TraceStep};
pub use self::storage::{StateStorage, StorageId, StorageLayer};
pub use self::summary::{SummaryMap, SummaryRef};
pub use self::worklist::{ItemId, Worklist, WorklistItem, WorklistItems};
