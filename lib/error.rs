//! The error type shared by every module in this crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Fixpoint computation cancelled after {0} iterations")]
    Cancelled(usize),
    #[error("No start locations given")]
    NoStartLocations,
    #[error("Abstract domain error: {0}")]
    Domain(String),
    #[error("Storage layer {0} does not exist")]
    StorageNotFound(usize),
    #[error("Worklist item {0} does not exist")]
    ItemNotFound(usize),
    #[error("Graph vertex {0} not found")]
    GraphVertexNotFound(usize),
    #[error("Graph edge ({0}, {1}) not found")]
    GraphEdgeNotFound(usize, usize),
    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Custom(String),
}

impl From<&str> for Error {
    fn from(s: &str) -> Error {
        Error::Custom(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Error {
        Error::Custom(s)
    }
}
