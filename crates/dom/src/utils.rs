//! Utility functions for DOM processing

use crate::arena::DomArena;
use crate::error::Result;
use crate::types::{NodeId, NodeType};

/// Cap text length for log and debug output, on a char boundary
pub fn cap_text_length(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Get all text content from node and its children
pub fn get_text_content(arena: &DomArena, node_id: NodeId) -> Result<String> {
    let mut text = String::new();

    arena.traverse_df(node_id, |node| {
        if node.node_type == NodeType::Text {
            text.push_str(&node.node_value);
        }
        Ok(())
    })?;

    Ok(text)
}
