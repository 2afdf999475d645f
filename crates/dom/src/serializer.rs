//! DOM Serializer - Convert DOM subtrees back to markup
//!
//! This module handles:
//! - Compact markup for `inner_markup` / outer markup reads
//! - Escaping text and attribute values
//! - Void elements (no end tag) and raw-text elements (no escaping)
//! - An indented debug form for logs and test failure messages

use crate::arena::DomArena;
use crate::error::Result;
use crate::types::*;

/// Serializer configuration
#[derive(Debug, Clone)]
pub struct SerializerConfig {
    /// One node per line, indented by depth; whitespace-only text is dropped
    pub pretty: bool,
    /// Truncate text nodes in pretty output (0 = no limit)
    pub max_text_length: usize,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            pretty: false,
            max_text_length: 0,
        }
    }
}

/// DOM Tree Serializer
pub struct DomSerializer {
    config: SerializerConfig,
}

impl DomSerializer {
    pub fn new() -> Self {
        Self::with_config(SerializerConfig::default())
    }

    /// Indented debug form
    pub fn pretty() -> Self {
        Self::with_config(SerializerConfig {
            pretty: true,
            max_text_length: 80,
        })
    }

    pub fn with_config(config: SerializerConfig) -> Self {
        Self { config }
    }

    /// Serialize the whole document
    pub fn serialize(&self, arena: &DomArena) -> Result<String> {
        self.inner(arena, arena.root_id())
    }

    /// Serialize the children of `node_id`
    pub fn inner(&self, arena: &DomArena, node_id: NodeId) -> Result<String> {
        let mut output = String::new();
        let node = arena.get(node_id)?;
        let raw = is_raw_text_element(&node.node_name) && node.is_element();
        for &child_id in &node.children_ids {
            self.serialize_node(arena, child_id, 0, raw, &mut output)?;
        }
        Ok(output)
    }

    /// Serialize `node_id` itself, including its own tag
    pub fn outer(&self, arena: &DomArena, node_id: NodeId) -> Result<String> {
        let mut output = String::new();
        self.serialize_node(arena, node_id, 0, false, &mut output)?;
        Ok(output)
    }

    fn serialize_node(
        &self,
        arena: &DomArena,
        node_id: NodeId,
        depth: usize,
        raw_parent: bool,
        output: &mut String,
    ) -> Result<()> {
        let node = arena.get(node_id)?;
        let indent = if self.config.pretty {
            "  ".repeat(depth)
        } else {
            String::new()
        };

        match node.node_type {
            NodeType::Element => {
                // Format: <tag id="123" class="foo">
                output.push_str(&indent);
                output.push('<');
                output.push_str(&node.node_name);
                for attr in &node.attributes {
                    output.push(' ');
                    output.push_str(&attr.name);
                    output.push_str("=\"");
                    escape_into(&attr.value, true, output);
                    output.push('"');
                }
                output.push('>');

                if is_void_element(&node.node_name) {
                    if self.config.pretty {
                        output.push('\n');
                    }
                    return Ok(());
                }

                let raw = is_raw_text_element(&node.node_name);
                if self.config.pretty && !node.children_ids.is_empty() {
                    output.push('\n');
                    for &child_id in &node.children_ids {
                        self.serialize_node(arena, child_id, depth + 1, raw, output)?;
                    }
                    output.push_str(&indent);
                } else {
                    for &child_id in &node.children_ids {
                        self.serialize_node(arena, child_id, depth + 1, raw, output)?;
                    }
                }

                output.push_str("</");
                output.push_str(&node.node_name);
                output.push('>');
                if self.config.pretty {
                    output.push('\n');
                }
            }
            NodeType::Text => {
                if self.config.pretty {
                    let text = node.node_value.trim();
                    if !text.is_empty() {
                        output.push_str(&indent);
                        let text = if self.config.max_text_length > 0 {
                            crate::utils::cap_text_length(text, self.config.max_text_length)
                        } else {
                            text.to_string()
                        };
                        escape_into(&text, false, output);
                        output.push('\n');
                    }
                } else if raw_parent {
                    output.push_str(&node.node_value);
                } else {
                    escape_into(&node.node_value, false, output);
                }
            }
            NodeType::Comment => {
                output.push_str(&indent);
                output.push_str("<!--");
                output.push_str(&node.node_value);
                output.push_str("-->");
                if self.config.pretty {
                    output.push('\n');
                }
            }
            NodeType::Document => {
                for &child_id in &node.children_ids {
                    self.serialize_node(arena, child_id, depth, false, output)?;
                }
            }
        }

        Ok(())
    }
}

impl Default for DomSerializer {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_into(text: &str, attribute: bool, output: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' if attribute => output.push_str("&quot;"),
            '\u{a0}' => output.push_str("&nbsp;"),
            _ => output.push(ch),
        }
    }
}
