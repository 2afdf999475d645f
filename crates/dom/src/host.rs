//! Node capability interface
//!
//! Everything a collection engine needs from a document tree, as one trait.
//! Node handles are small `Copy` values; handle equality is node identity.
//! `DomArena` is the in-memory implementation.

use std::fmt::Debug;
use std::hash::Hash;

use crate::arena::DomArena;
use crate::error::Result;
use crate::events::ListenerId;
use crate::serializer::DomSerializer;
use crate::types::{NodeId, NodeType};

pub trait Host {
    type Node: Copy + Eq + Hash + Debug + 'static;

    // Navigation

    /// The whole-document root
    fn document(&self) -> Self::Node;
    fn node_type(&self, node: Self::Node) -> Result<NodeType>;
    /// Lower-case tag name, `None` for non-elements
    fn tag_name(&self, node: Self::Node) -> Result<Option<String>>;
    /// Character data of text nodes, `None` for anything else
    fn text(&self, node: Self::Node) -> Result<Option<String>>;
    fn parent(&self, node: Self::Node) -> Result<Option<Self::Node>>;
    fn children(&self, node: Self::Node) -> Result<Vec<Self::Node>>;
    fn next_sibling(&self, node: Self::Node) -> Result<Option<Self::Node>>;
    fn previous_sibling(&self, node: Self::Node) -> Result<Option<Self::Node>>;

    /// Concatenated text of all descendant text nodes
    fn text_content(&self, node: Self::Node) -> Result<String> {
        let mut out = String::new();
        if let Some(text) = self.text(node)? {
            out.push_str(&text);
        }
        for child in self.children(node)? {
            out.push_str(&self.text_content(child)?);
        }
        Ok(out)
    }

    // Construction

    fn create_element(&mut self, tag: &str) -> Result<Self::Node>;
    fn create_text(&mut self, data: &str) -> Result<Self::Node>;

    // Structure

    /// Insert before `reference`, or append when `None`; attached nodes move
    fn insert_before(
        &mut self,
        parent: Self::Node,
        child: Self::Node,
        reference: Option<Self::Node>,
    ) -> Result<()>;
    fn remove_child(&mut self, parent: Self::Node, child: Self::Node) -> Result<()>;
    fn replace_child(
        &mut self,
        parent: Self::Node,
        new_child: Self::Node,
        old_child: Self::Node,
    ) -> Result<()>;

    // Attributes

    fn get_attribute(&self, node: Self::Node, name: &str) -> Result<Option<String>>;
    fn set_attribute(&mut self, node: Self::Node, name: &str, value: &str) -> Result<()>;
    fn remove_attribute(&mut self, node: Self::Node, name: &str) -> Result<()>;

    // Lookup, scoped to the descendants of `context`, in document order

    fn get_element_by_id(&self, context: Self::Node, id: &str) -> Result<Option<Self::Node>>;
    /// `tag == "*"` matches every element
    fn get_elements_by_tag_name(&self, context: Self::Node, tag: &str) -> Result<Vec<Self::Node>>;
    fn query_selector_all(&self, context: Self::Node, pattern: &str) -> Result<Vec<Self::Node>>;

    // Markup

    /// Replace the children of `node` with the parsed fragment
    fn set_inner_markup(&mut self, node: Self::Node, markup: &str) -> Result<()>;
    fn inner_markup(&self, node: Self::Node) -> Result<String>;

    /// Record a node's position among its siblings
    fn set_sibling_index(&mut self, node: Self::Node, index: u32) -> Result<()>;

    // Native dispatch mechanism

    fn add_listener(&mut self, node: Self::Node, kind: &str, listener: ListenerId) -> Result<()>;
    /// Returns whether the listener was attached
    fn remove_listener(&mut self, node: Self::Node, kind: &str, listener: ListenerId) -> Result<bool>;
    /// Snapshot of attached listeners, in attachment order
    fn listeners(&self, node: Self::Node, kind: &str) -> Result<Vec<ListenerId>>;
    /// Node that receives events aimed at `node` when `node` cannot dispatch
    fn dispatch_surrogate(&self, node: Self::Node) -> Option<Self::Node>;
}

impl Host for DomArena {
    type Node = NodeId;

    fn document(&self) -> NodeId {
        self.root_id()
    }

    fn node_type(&self, node: NodeId) -> Result<NodeType> {
        Ok(self.get(node)?.node_type)
    }

    fn tag_name(&self, node: NodeId) -> Result<Option<String>> {
        Ok(self.get(node)?.tag_name().map(str::to_string))
    }

    fn text(&self, node: NodeId) -> Result<Option<String>> {
        let node = self.get(node)?;
        Ok(node.is_text().then(|| node.node_value.clone()))
    }

    fn parent(&self, node: NodeId) -> Result<Option<NodeId>> {
        Ok(self.get(node)?.parent_id)
    }

    fn children(&self, node: NodeId) -> Result<Vec<NodeId>> {
        Ok(self.child_ids(node)?.to_vec())
    }

    fn next_sibling(&self, node: NodeId) -> Result<Option<NodeId>> {
        self.get(node)?;
        Ok(DomArena::next_sibling(self, node))
    }

    fn previous_sibling(&self, node: NodeId) -> Result<Option<NodeId>> {
        self.get(node)?;
        Ok(DomArena::previous_sibling(self, node))
    }

    fn text_content(&self, node: NodeId) -> Result<String> {
        crate::utils::get_text_content(self, node)
    }

    fn create_element(&mut self, tag: &str) -> Result<NodeId> {
        Ok(DomArena::create_element(self, tag))
    }

    fn create_text(&mut self, data: &str) -> Result<NodeId> {
        Ok(DomArena::create_text(self, data))
    }

    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> Result<()> {
        DomArena::insert_before(self, parent, child, reference)
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        DomArena::remove_child(self, parent, child)
    }

    fn replace_child(&mut self, parent: NodeId, new_child: NodeId, old_child: NodeId) -> Result<()> {
        DomArena::replace_child(self, parent, new_child, old_child)
    }

    fn get_attribute(&self, node: NodeId, name: &str) -> Result<Option<String>> {
        Ok(self.get(node)?.attr(name).map(str::to_string))
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<()> {
        self.element_mut(node)?.set_attr(name, value);
        Ok(())
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<()> {
        self.element_mut(node)?.remove_attr(name);
        Ok(())
    }

    fn get_element_by_id(&self, context: NodeId, id: &str) -> Result<Option<NodeId>> {
        self.find_by_id(context, id)
    }

    fn get_elements_by_tag_name(&self, context: NodeId, tag: &str) -> Result<Vec<NodeId>> {
        self.find_by_tag(context, tag)
    }

    fn query_selector_all(&self, context: NodeId, pattern: &str) -> Result<Vec<NodeId>> {
        self.get(context)?;
        self.matcher.query_all(self, context, pattern)
    }

    fn set_inner_markup(&mut self, node: NodeId, markup: &str) -> Result<()> {
        self.clear_children(node)?;
        crate::parser::parse_into(self, node, markup)?;
        Ok(())
    }

    fn inner_markup(&self, node: NodeId) -> Result<String> {
        DomSerializer::new().inner(self, node)
    }

    fn set_sibling_index(&mut self, node: NodeId, index: u32) -> Result<()> {
        self.get_mut(node)?.sibling_index = Some(index);
        Ok(())
    }

    fn add_listener(&mut self, node: NodeId, kind: &str, listener: ListenerId) -> Result<()> {
        self.get(node)?;
        self.listeners.add(node, kind, listener);
        Ok(())
    }

    fn remove_listener(&mut self, node: NodeId, kind: &str, listener: ListenerId) -> Result<bool> {
        self.get(node)?;
        Ok(self.listeners.remove(node, kind, listener))
    }

    fn listeners(&self, node: NodeId, kind: &str) -> Result<Vec<ListenerId>> {
        self.get(node)?;
        Ok(self.listeners.get(node, kind))
    }

    fn dispatch_surrogate(&self, node: NodeId) -> Option<NodeId> {
        if node == self.root_id() && !self.document_dispatch() {
            self.document_element()
        } else {
            None
        }
    }
}
