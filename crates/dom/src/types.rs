//! Core type definitions for the in-memory document
//!
//! Key design principles:
//! 1. Use u32 for indices (4 bytes vs 8 bytes pointer)
//! 2. Use SmallVec for small arrays (avoid heap allocation)
//! 3. Attributes keep source order, so serialized markup is stable

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Node identifier (index into arena)
/// u32 allows 4 billion nodes, enough for any document
pub type NodeId = u32;

/// Node kinds the arena stores; values are the DOM `nodeType` codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeType {
    Element = 1,
    Text = 3,
    Comment = 8,
    Document = 9,
}

impl NodeType {
    /// Name used in error messages
    pub fn name(self) -> &'static str {
        match self {
            NodeType::Element => "element",
            NodeType::Text => "text",
            NodeType::Comment => "comment",
            NodeType::Document => "document",
        }
    }
}

/// Single name/value attribute pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// The main DOM tree node structure
///
/// Design philosophy:
/// - Small fixed-size fields first (better packing)
/// - Use indices instead of pointers
/// - A node with no parent is detached; it still lives in the arena
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomNode {
    // IDs
    pub node_id: NodeId,
    pub node_type: NodeType,

    // Navigation indices
    pub parent_id: Option<NodeId>,
    pub children_ids: SmallVec<[NodeId; 4]>, // Most nodes have <4 children

    /// Position among siblings, refreshed by the whitespace sanitation pass
    pub sibling_index: Option<u32>,

    // Content
    pub node_name: String,
    pub node_value: String,
    pub attributes: SmallVec<[Attribute; 4]>,
}

impl DomNode {
    /// Create a new node with required fields
    pub fn new(node_id: NodeId, node_type: NodeType, node_name: String) -> Self {
        Self {
            node_id,
            node_type,
            parent_id: None,
            children_ids: SmallVec::new(),
            sibling_index: None,
            node_name,
            node_value: String::new(),
            attributes: SmallVec::new(),
        }
    }

    /// Get tag name for element nodes
    pub fn tag_name(&self) -> Option<&str> {
        if self.node_type == NodeType::Element {
            Some(&self.node_name)
        } else {
            None
        }
    }

    /// Check if node is an element
    pub fn is_element(&self) -> bool {
        self.node_type == NodeType::Element
    }

    /// Check if node is text
    pub fn is_text(&self) -> bool {
        self.node_type == NodeType::Text
    }

    /// Get attribute value
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }

    /// Set attribute value, keeping the original position on overwrite
    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self
            .attributes
            .iter_mut()
            .find(|a| a.name.eq_ignore_ascii_case(name))
        {
            Some(existing) => existing.value = value.to_string(),
            None => self.attributes.push(Attribute {
                name: name.to_ascii_lowercase(),
                value: value.to_string(),
            }),
        }
    }

    /// Remove attribute, returns whether it was present
    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|a| !a.name.eq_ignore_ascii_case(name));
        self.attributes.len() != before
    }

    /// Whitespace-separated tokens of the class attribute
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_ascii_whitespace()
    }
}

/// Elements that never have content or an end tag
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose content is raw text, not markup
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|t| t.eq_ignore_ascii_case(tag))
}

pub fn is_raw_text_element(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.iter().any(|t| t.eq_ignore_ascii_case(tag))
}
