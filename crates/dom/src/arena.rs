//! Arena-based DOM tree storage
//!
//! "Bad programmers worry about the code. Good programmers worry about
//! data structures and their relationships."
//!
//! This arena eliminates:
//! - Rc/Arc overhead (16 bytes per pointer)
//! - Recursive function calls in traversal (stack overflow risk)
//! - Dangling node handles (nodes are never freed, only detached)
//!
//! ## Memory Layout
//!
//! ```text
//! Arena: Vec<DomNode>
//!        [Document][Node1][Node2]...
//!         ↑ 4-byte index, not 8-byte pointer
//! ```

use std::fmt;

use crate::error::{DomError, Result};
use crate::events::ListenerTable;
use crate::selector::{SelectorMatcher, SimpleMatcher};
use crate::types::{DomNode, NodeId, NodeType};

/// Arena allocator for DOM nodes
///
/// Design:
/// - Single Vec<DomNode> for sequential allocation
/// - Node 0 is always the document
/// - No Rc/Arc: use indices everywhere
pub struct DomArena {
    /// All nodes stored sequentially (cache-friendly)
    nodes: Vec<DomNode>,

    /// Root node ID (the document)
    root_id: NodeId,

    /// Native listener attachments
    pub(crate) listeners: ListenerTable,

    /// Selector matcher used by `query_selector_all`
    pub(crate) matcher: Box<dyn SelectorMatcher>,

    /// Whether events can be dispatched on the document node itself
    document_dispatch: bool,
}

impl DomArena {
    /// Create a new arena holding an empty document
    pub fn new() -> Self {
        Self::with_capacity(1024) // Pre-allocate for typical page
    }

    /// Create arena with specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let mut nodes = Vec::with_capacity(capacity.max(1));
        nodes.push(DomNode::new(0, NodeType::Document, "#document".to_string()));
        Self {
            nodes,
            root_id: 0,
            listeners: ListenerTable::new(),
            matcher: Box::new(SimpleMatcher),
            document_dispatch: true,
        }
    }

    /// Build a document from markup
    pub fn from_markup(markup: &str) -> Result<Self> {
        let mut arena = Self::new();
        let root = arena.root_id;
        crate::parser::parse_into(&mut arena, root, markup)?;
        Ok(arena)
    }

    fn push_node(&mut self, node_type: NodeType, name: String) -> NodeId {
        let node_id = self.nodes.len() as NodeId;
        self.nodes.push(DomNode::new(node_id, node_type, name));
        node_id
    }

    /// Create a detached element; tag names are stored lower-case
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeType::Element, tag.to_ascii_lowercase())
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        let id = self.push_node(NodeType::Text, "#text".to_string());
        self.nodes[id as usize].node_value = text.to_string();
        id
    }

    /// Create a detached comment node
    pub fn create_comment(&mut self, text: &str) -> NodeId {
        let id = self.push_node(NodeType::Comment, "#comment".to_string());
        self.nodes[id as usize].node_value = text.to_string();
        id
    }

    /// Get node by ID (immutable)
    pub fn get(&self, node_id: NodeId) -> Result<&DomNode> {
        self.nodes
            .get(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    /// Get node by ID (mutable)
    pub fn get_mut(&mut self, node_id: NodeId) -> Result<&mut DomNode> {
        self.nodes
            .get_mut(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    /// Get element by ID, failing for non-element nodes
    pub fn element_mut(&mut self, node_id: NodeId) -> Result<&mut DomNode> {
        let node = self.get_mut(node_id)?;
        if !node.is_element() {
            return Err(DomError::InvalidNodeType {
                expected: "element".to_string(),
                actual: node.node_type.name().to_string(),
            });
        }
        Ok(node)
    }

    /// Root node ID (the document)
    pub fn root_id(&self) -> NodeId {
        self.root_id
    }

    /// First element child of the document
    pub fn document_element(&self) -> Option<NodeId> {
        self.nodes[self.root_id as usize]
            .children_ids
            .iter()
            .copied()
            .find(|&id| self.nodes[id as usize].is_element())
    }

    /// Total number of nodes, detached ones included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if arena holds nothing but the document
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Child IDs of a node
    pub fn child_ids(&self, node_id: NodeId) -> Result<&[NodeId]> {
        Ok(&self.get(node_id)?.children_ids)
    }

    fn sibling(&self, node_id: NodeId, offset: isize) -> Option<NodeId> {
        let parent_id = self.nodes.get(node_id as usize)?.parent_id?;
        let siblings = &self.nodes[parent_id as usize].children_ids;
        let pos = siblings.iter().position(|&id| id == node_id)? as isize;
        let target = pos + offset;
        if target < 0 {
            return None;
        }
        siblings.get(target as usize).copied()
    }

    pub fn next_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        self.sibling(node_id, 1)
    }

    pub fn previous_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        self.sibling(node_id, -1)
    }

    /// Traverse tree depth-first (iterative, no recursion)
    ///
    /// This is the "good taste" version - no special cases for leaf nodes
    pub fn traverse_df<F>(&self, start_id: NodeId, mut visit: F) -> Result<()>
    where
        F: FnMut(&DomNode) -> Result<()>,
    {
        let mut stack = vec![start_id];

        while let Some(node_id) = stack.pop() {
            let node = self.get(node_id)?;
            visit(node)?;

            // Push children in reverse order (so they're visited left-to-right)
            for &child_id in node.children_ids.iter().rev() {
                stack.push(child_id);
            }
        }

        Ok(())
    }

    /// Find descendants of `context` matching predicate, in document order
    pub fn find<F>(&self, context: NodeId, predicate: F) -> Result<Vec<NodeId>>
    where
        F: Fn(&DomNode) -> bool,
    {
        let mut out = Vec::new();
        self.traverse_df(context, |node| {
            if node.node_id != context && predicate(node) {
                out.push(node.node_id);
            }
            Ok(())
        })?;
        Ok(out)
    }

    /// Find first descendant of `context` matching predicate
    pub fn find_one<F>(&self, context: NodeId, predicate: F) -> Result<Option<NodeId>>
    where
        F: Fn(&DomNode) -> bool,
    {
        let mut stack: Vec<NodeId> = self.get(context)?.children_ids.iter().rev().copied().collect();

        while let Some(node_id) = stack.pop() {
            let node = self.get(node_id)?;
            if predicate(node) {
                return Ok(Some(node_id));
            }
            stack.extend(node.children_ids.iter().rev().copied());
        }

        Ok(None)
    }

    /// Find all elements below `context` by tag name (`*` matches any)
    pub fn find_by_tag(&self, context: NodeId, tag: &str) -> Result<Vec<NodeId>> {
        let any = tag == "*";
        self.find(context, |node| {
            node.node_type == NodeType::Element && (any || node.node_name.eq_ignore_ascii_case(tag))
        })
    }

    /// Find element below `context` by ID attribute
    pub fn find_by_id(&self, context: NodeId, id: &str) -> Result<Option<NodeId>> {
        if id.is_empty() {
            return Ok(None);
        }
        self.find_one(context, |node| {
            node.node_type == NodeType::Element && node.attr("id") == Some(id)
        })
    }

    /// True when `ancestor` is `node` or one of its ancestors
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(id as usize).and_then(|n| n.parent_id);
        }
        false
    }

    /// Unlink a node from its parent, if any
    pub fn detach(&mut self, node_id: NodeId) -> Result<()> {
        let Some(parent_id) = self.get(node_id)?.parent_id else {
            return Ok(());
        };
        self.get_mut(parent_id)?
            .children_ids
            .retain(|id| *id != node_id);
        self.get_mut(node_id)?.parent_id = None;
        Ok(())
    }

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> Result<()> {
        // Only elements and the document hold children
        if !matches!(self.get(parent)?.node_type, NodeType::Element | NodeType::Document) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        let child_node = self.get(child)?;
        if child_node.node_type == NodeType::Document {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        Ok(())
    }

    /// Insert `child` under `parent` before `reference`, appending when `None`
    ///
    /// An attached `child` is moved, not copied.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<()> {
        self.check_insertable(parent, child)?;

        let mut reference = reference;
        if let Some(r) = reference {
            if self.get(r)?.parent_id != Some(parent) {
                return Err(DomError::NotAChild { parent, child: r });
            }
            if r == child {
                reference = self.next_sibling(child);
            }
        }

        self.detach(child)?;

        let siblings = &mut self.get_mut(parent)?.children_ids;
        let pos = reference
            .and_then(|r| siblings.iter().position(|id| *id == r))
            .unwrap_or(siblings.len());
        siblings.insert(pos, child);
        self.get_mut(child)?.parent_id = Some(parent);
        Ok(())
    }

    /// Append `child` as last child of `parent`
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.insert_before(parent, child, None)
    }

    /// Remove `child` from `parent`; the node stays in the arena, detached
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.get(child)?.parent_id != Some(parent) {
            return Err(DomError::NotAChild { parent, child });
        }
        self.detach(child)
    }

    /// Put `new_child` where `old_child` is; `old_child` ends up detached
    pub fn replace_child(&mut self, parent: NodeId, new_child: NodeId, old_child: NodeId) -> Result<()> {
        if self.get(old_child)?.parent_id != Some(parent) {
            return Err(DomError::NotAChild {
                parent,
                child: old_child,
            });
        }
        if new_child == old_child {
            return Ok(());
        }
        self.insert_before(parent, new_child, Some(old_child))?;
        self.detach(old_child)
    }

    /// Detach every child of `node`
    pub fn clear_children(&mut self, node_id: NodeId) -> Result<()> {
        let children = std::mem::take(&mut self.get_mut(node_id)?.children_ids);
        for child in children {
            self.get_mut(child)?.parent_id = None;
        }
        Ok(())
    }

    /// Replace the selector matcher (e.g. with a full CSS engine)
    pub fn set_matcher(&mut self, matcher: Box<dyn SelectorMatcher>) {
        self.matcher = matcher;
    }

    /// Whether the document node itself can receive dispatched events
    pub fn set_document_dispatch(&mut self, enabled: bool) {
        self.document_dispatch = enabled;
    }

    pub fn document_dispatch(&self) -> bool {
        self.document_dispatch
    }
}

impl Default for DomArena {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DomArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomArena")
            .field("nodes", &self.nodes.len())
            .field("root_id", &self.root_id)
            .field("listeners", &self.listeners)
            .field("document_dispatch", &self.document_dispatch)
            .finish_non_exhaustive()
    }
}
