//! Error types for DOM operations
//!
//! Simple, flat error hierarchy. No over-engineering.

use thiserror::Error;

use crate::types::NodeId;

pub type Result<T> = std::result::Result<T, DomError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Invalid node type: expected {expected}, got {actual}")]
    InvalidNodeType { expected: String, actual: String },

    #[error("Node {child} is not a child of node {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("Node {child} cannot be inserted under node {parent}")]
    HierarchyRequest { parent: NodeId, child: NodeId },

    #[error("Markup error: {0}")]
    Markup(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
}
