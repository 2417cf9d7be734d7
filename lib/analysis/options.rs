//! Options for the fixpoint engine.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::default;

/// The order pending transitions are taken from the worklist in.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum WorklistOrder {
    /// Breadth-first, oldest pending transition first.
    Fifo,
    /// Depth-first, newest pending transition first.
    Lifo,
}

impl default::Default for WorklistOrder {
    fn default() -> WorklistOrder {
        WorklistOrder::Fifo
    }
}

/// Options which change the behavior of the fixpoint engine.
///
/// `max_unwindings` bounds how often a loop is unwound, or a call re-entered
/// recursively, before widening kicks in. `max_parallel_states` bounds the
/// number of disjuncts kept per location. Both must be greater than zero.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FixpointOptions {
    max_unwindings: usize,
    max_parallel_states: usize,
    #[serde(default)]
    worklist_order: WorklistOrder,
    #[serde(default)]
    use_summaries: bool,
}

impl FixpointOptions {
    /// Create options with the given bounds, and defaults for everything
    /// else.
    pub fn new(max_unwindings: usize, max_parallel_states: usize) -> Result<FixpointOptions, Error> {
        FixpointOptionsBuilder::new()
            .max_unwindings(max_unwindings)
            .max_parallel_states(max_parallel_states)
            .build()
    }

    /// Parse options from a JSON document, e.g.
    /// `{"max_unwindings": 3, "max_parallel_states": 2}`.
    pub fn from_json(json: &str) -> Result<FixpointOptions, Error> {
        let options: FixpointOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn max_unwindings(&self) -> usize {
        self.max_unwindings
    }

    pub fn max_parallel_states(&self) -> usize {
        self.max_parallel_states
    }

    pub fn worklist_order(&self) -> WorklistOrder {
        self.worklist_order
    }

    /// Whether calls may be stepped over with a previously computed
    /// summary. Off by default.
    pub fn use_summaries(&self) -> bool {
        self.use_summaries
    }

    fn validate(&self) -> Result<(), Error> {
        if self.max_unwindings == 0 {
            return Err(Error::Configuration(
                "max_unwindings must be greater than zero".to_string(),
            ));
        }
        if self.max_parallel_states == 0 {
            return Err(Error::Configuration(
                "max_parallel_states must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Create your options with the builder pattern.
///
/// `max_unwindings` and `max_parallel_states` have no defaults and must be
/// set before calling `build`.
#[derive(Clone, Debug)]
pub struct FixpointOptionsBuilder {
    max_unwindings: Option<usize>,
    max_parallel_states: Option<usize>,
    worklist_order: WorklistOrder,
    use_summaries: bool,
}

impl FixpointOptionsBuilder {
    pub fn new() -> FixpointOptionsBuilder {
        FixpointOptionsBuilder {
            max_unwindings: None,
            max_parallel_states: None,
            worklist_order: WorklistOrder::default(),
            use_summaries: false,
        }
    }

    pub fn max_unwindings(mut self, max_unwindings: usize) -> FixpointOptionsBuilder {
        self.max_unwindings = Some(max_unwindings);
        self
    }

    pub fn max_parallel_states(mut self, max_parallel_states: usize) -> FixpointOptionsBuilder {
        self.max_parallel_states = Some(max_parallel_states);
        self
    }

    /// Set the worklist order. By default this is `WorklistOrder::Fifo`.
    pub fn worklist_order(mut self, worklist_order: WorklistOrder) -> FixpointOptionsBuilder {
        self.worklist_order = worklist_order;
        self
    }

    /// Enable summary substitution. By default this is false.
    pub fn use_summaries(mut self, use_summaries: bool) -> FixpointOptionsBuilder {
        self.use_summaries = use_summaries;
        self
    }

    pub fn build(self) -> Result<FixpointOptions, Error> {
        let options = FixpointOptions {
            max_unwindings: self
                .max_unwindings
                .ok_or_else(|| Error::Configuration("max_unwindings is not set".to_string()))?,
            max_parallel_states: self.max_parallel_states.ok_or_else(|| {
                Error::Configuration("max_parallel_states is not set".to_string())
            })?,
            worklist_order: self.worklist_order,
            use_summaries: self.use_summaries,
        };
        options.validate()?;
        Ok(options)
    }
}

impl default::Default for FixpointOptionsBuilder {
    fn default() -> FixpointOptionsBuilder {
        FixpointOptionsBuilder::new()
    }
}
