//! Selector Resolver
//!
//! Turns a query into raw nodes, then into a collection. String patterns
//! take one of three paths:
//!
//! 1. `#id` or a bare tag name: direct host lookup
//! 2. anything containing a tag opener: parsed as a detached fragment
//! 3. everything else: the host's selector matcher
//!
//! Lookups are scoped to the context node's descendants.

use std::sync::LazyLock;

use dom::Host;
use regex::Regex;

use crate::collection::Collection;
use crate::engine::Engine;
use crate::error::Result;

static SIMPLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#?([A-Za-z0-9_-]+)$").expect("valid regex"));
static TAG_OPENER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([A-Za-z0-9_:]+)").expect("valid regex"));

/// Anything a collection can be resolved from
#[derive(Debug, Clone)]
pub enum Query<N> {
    Empty,
    Pattern(String),
    Node(N),
    Nodes(Vec<N>),
    Collection(Collection<N>),
}

impl<N> From<&str> for Query<N> {
    fn from(pattern: &str) -> Self {
        Query::Pattern(pattern.to_string())
    }
}

impl<N> From<String> for Query<N> {
    fn from(pattern: String) -> Self {
        Query::Pattern(pattern)
    }
}

impl<N> From<Vec<N>> for Query<N> {
    fn from(nodes: Vec<N>) -> Self {
        Query::Nodes(nodes)
    }
}

impl<N: Clone> From<&Collection<N>> for Query<N> {
    fn from(collection: &Collection<N>) -> Self {
        Query::Collection(collection.clone())
    }
}

impl<N> From<Collection<N>> for Query<N> {
    fn from(collection: Collection<N>) -> Self {
        Query::Collection(collection)
    }
}

impl<N> Query<N> {
    fn is_empty(&self) -> bool {
        match self {
            Query::Empty => true,
            Query::Pattern(p) => p.is_empty(),
            _ => false,
        }
    }
}

impl<H: Host> Engine<H> {
    /// Resolve against the whole document
    pub fn select(&mut self, query: impl Into<Query<H::Node>>) -> Result<Collection<H::Node>> {
        let document = self.host.document();
        self.select_in(query, document)
    }

    /// Resolve against the descendants of `context`
    pub fn select_in(
        &mut self,
        query: impl Into<Query<H::Node>>,
        context: H::Node,
    ) -> Result<Collection<H::Node>> {
        let raw = self.resolve(&query.into(), context)?;
        Ok(Collection::from_nodes(raw))
    }

    /// Resolve within each member and merge the results
    ///
    /// An empty query gives back `collection` itself; an empty collection
    /// resolves against the document.
    pub fn find(
        &mut self,
        collection: &Collection<H::Node>,
        query: impl Into<Query<H::Node>>,
    ) -> Result<Collection<H::Node>> {
        let query = query.into();
        if query.is_empty() {
            return Ok(collection.clone());
        }
        if collection.is_empty() {
            let document = self.host.document();
            let raw = self.resolve(&query, document)?;
            return Ok(Collection::from_nodes(raw).derived_from(collection));
        }

        let mut raw = Vec::new();
        for member in collection.iter() {
            raw.extend(self.resolve(&query, member)?);
        }
        Ok(Collection::from_nodes(raw).derived_from(collection))
    }

    /// Members that also appear in what `query` resolves to
    pub fn has(
        &mut self,
        collection: &Collection<H::Node>,
        query: impl Into<Query<H::Node>>,
    ) -> Result<Collection<H::Node>> {
        let keep = self.select(query)?;
        collection.filter(|_, node| Ok(keep.contains(node)))
    }

    /// Members absent from what `query` resolves to
    pub fn excludes(
        &mut self,
        collection: &Collection<H::Node>,
        query: impl Into<Query<H::Node>>,
    ) -> Result<Collection<H::Node>> {
        let omit = self.select(query)?;
        collection.filter(|_, node| Ok(!omit.contains(node)))
    }

    /// Raw resolution, before deduplication
    pub fn resolve(&mut self, query: &Query<H::Node>, context: H::Node) -> Result<Vec<H::Node>> {
        let pattern = match query {
            Query::Empty => return Ok(Vec::new()),
            Query::Node(node) => return Ok(vec![*node]),
            Query::Nodes(nodes) => return Ok(nodes.clone()),
            Query::Collection(collection) => return Ok(collection.to_vec()),
            Query::Pattern(pattern) => pattern.as_str(),
        };
        if pattern.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(caps) = SIMPLE_PATTERN.captures(pattern) {
            let name = &caps[1];
            if pattern.starts_with('#') {
                tracing::trace!("[Resolver] id lookup '{}'", name);
                return Ok(self.host.get_element_by_id(context, name)?.into_iter().collect());
            }
            tracing::trace!("[Resolver] tag lookup '{}'", name);
            return Ok(self.host.get_elements_by_tag_name(context, name)?);
        }

        if TAG_OPENER.is_match(pattern) {
            tracing::trace!("[Resolver] fragment from markup ({} bytes)", pattern.len());
            return self.fragment(pattern);
        }

        tracing::trace!("[Resolver] matcher query '{}'", pattern);
        Ok(self.host.query_selector_all(context, pattern)?)
    }

    /// Parse `markup` in a scratch container and hand back its detached children
    fn fragment(&mut self, markup: &str) -> Result<Vec<H::Node>> {
        let container = self.host.create_element("i")?;
        self.host.set_inner_markup(container, markup)?;
        let children = self.host.children(container)?;
        for &child in &children {
            self.host.remove_child(container, child)?;
        }
        Ok(children)
    }
}
