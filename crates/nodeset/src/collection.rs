//! Collection Store
//!
//! An ordered, identity-unique set of node handles. Collections are values:
//! every operation returns a new one, and a derived collection keeps a link
//! to the one it came from so chains can step back with `end()`.
//!
//! Design:
//! - Order is resolution order, not document order
//! - Small inline buffer, collections are tens of nodes
//! - Equality compares members only, never the back-link

use std::hash::Hash;
use std::ops::ControlFlow;
use std::rc::Rc;

use ahash::AHashSet;
use smallvec::SmallVec;

/// Below this many items a linear scan beats hashing
const LINEAR_DEDUP_LIMIT: usize = 32;

/// Drop repeated items, keeping the first occurrence of each identity
pub fn dedup_by<T, K, F>(items: impl IntoIterator<Item = T>, mut identity: F) -> Vec<T>
where
    K: Eq + Hash,
    F: FnMut(&T) -> K,
{
    let items = items.into_iter();
    let mut out: Vec<T> = Vec::with_capacity(items.size_hint().0);
    let mut seen_linear: Vec<K> = Vec::new();
    let mut seen_hashed: Option<AHashSet<K>> = None;

    for item in items {
        let key = identity(&item);
        let fresh = match seen_hashed.as_mut() {
            Some(seen) => seen.insert(key),
            None if seen_linear.contains(&key) => false,
            None => {
                seen_linear.push(key);
                if seen_linear.len() > LINEAR_DEDUP_LIMIT {
                    seen_hashed = Some(seen_linear.drain(..).collect());
                }
                true
            }
        };
        if fresh {
            out.push(item);
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct Collection<N> {
    nodes: SmallVec<[N; 8]>,
    previous: Option<Rc<Collection<N>>>,
}

impl<N: Copy + Eq + Hash> Collection<N> {
    pub fn new() -> Self {
        Self {
            nodes: SmallVec::new(),
            previous: None,
        }
    }

    /// Build from a raw sequence, removing repeated handles
    pub fn from_nodes(nodes: impl IntoIterator<Item = N>) -> Self {
        Self {
            nodes: dedup_by(nodes, |n| *n).into_iter().collect(),
            previous: None,
        }
    }

    /// Same members, with `previous` as the back-link
    pub fn derived_from(mut self, previous: &Collection<N>) -> Self {
        self.previous = Some(Rc::new(previous.clone()));
        self
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<N> {
        self.nodes.get(index).copied()
    }

    pub fn first(&self) -> Option<N> {
        self.get(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = N> + '_ {
        self.nodes.iter().copied()
    }

    pub fn as_slice(&self) -> &[N] {
        &self.nodes
    }

    pub fn to_vec(&self) -> Vec<N> {
        self.nodes.to_vec()
    }

    pub fn contains(&self, node: N) -> bool {
        self.nodes.contains(&node)
    }

    /// Members of both, `self` first, still identity-unique
    pub fn union(&self, other: &Collection<N>) -> Self {
        Self::from_nodes(self.iter().chain(other.iter())).derived_from(self)
    }

    /// Keep members for which `predicate(index, node)` holds
    ///
    /// The predicate runs once per member, in order. The first error aborts
    /// the filter and is returned as is.
    pub fn filter<F, E>(&self, mut predicate: F) -> Result<Self, E>
    where
        F: FnMut(usize, N) -> Result<bool, E>,
    {
        let mut kept = SmallVec::new();
        for (index, node) in self.iter().enumerate() {
            if predicate(index, node)? {
                kept.push(node);
            }
        }
        Ok(Self {
            nodes: kept,
            previous: None,
        }
        .derived_from(self))
    }

    /// Visit members left to right; `ControlFlow::Break` skips the rest
    pub fn each<F>(&self, mut visit: F) -> &Self
    where
        F: FnMut(usize, N) -> ControlFlow<()>,
    {
        for (index, node) in self.iter().enumerate() {
            if visit(index, node).is_break() {
                break;
            }
        }
        self
    }

    /// The collection this one was derived from
    pub fn previous(&self) -> Option<&Collection<N>> {
        self.previous.as_deref()
    }

    /// Step back one link in the chain; empty when there is none
    pub fn end(&self) -> Self {
        self.previous().cloned().unwrap_or_default()
    }
}

impl<N: Copy + Eq + Hash> Default for Collection<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: PartialEq> PartialEq for Collection<N> {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl<N: Eq> Eq for Collection<N> {}

impl<N: Copy + Eq + Hash> FromIterator<N> for Collection<N> {
    fn from_iter<I: IntoIterator<Item = N>>(iter: I) -> Self {
        Self::from_nodes(iter)
    }
}

impl<'a, N> IntoIterator for &'a Collection<N> {
    type Item = &'a N;
    type IntoIter = std::slice::Iter<'a, N>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
