use crate::graph;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A program location in an `Icfg`.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Node {
    index: usize,
    procedure: String,
    error: bool,
    comment: Option<String>,
}

impl Node {
    pub(crate) fn new(index: usize, procedure: String) -> Node {
        Node {
            index,
            procedure,
            error: false,
            comment: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The name of the procedure this node belongs to.
    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    /// Returns true if reaching this node is an error.
    pub fn is_error(&self) -> bool {
        self.error
    }

    pub(crate) fn set_error(&mut self, error: bool) {
        self.error = error;
    }

    /// Set the comment for this `Node`.
    pub fn set_comment(&mut self, comment: Option<String>) {
        self.comment = comment;
    }

    /// Get the comment for this `Node`.
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }
}

impl graph::Vertex for Node {
    fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:0x{:X}", self.procedure, self.index)?;
        if self.error {
            write!(f, " (error)")?;
        }
        if let Some(ref comment) = self.comment {
            write!(f, " // {}", comment)?;
        }
        Ok(())
    }
}
