//! Error types for collection operations
//!
//! Host failures pass through untouched. The engine adds only the
//! failures it can detect itself.

use dom::DomError;
use thiserror::Error;

use crate::mutation::Location;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Dom(#[from] DomError),

    #[error("Cannot apply '{location}' to node {node}: it has no parent")]
    MissingParent { location: Location, node: String },

    #[error("Location '{0}' requires a payload")]
    MissingPayload(Location),

    #[error("Unknown location: {0}")]
    UnknownLocation(String),

    #[error("Invalid engine config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Script hook failed: {0}")]
    Script(String),

    #[error("Event handler failed: {0}")]
    Handler(String),
}
