//! Event Registry bookkeeping
//!
//! Nodes get an identity tag the first time they take part in a
//! registration. Responders live under (tag, event kind); a branch is the
//! per-tag map of kinds, and it is dropped as soon as its last kind empties.
//!
//! Tags sit in a side table keyed by node handle, so hosts never need a
//! place to stamp them; a node's tag goes with its branch. Guids come from
//! one process-wide counter because callbacks can be shared between
//! engines. Neither is ever recycled.

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use dom::ListenerId;
use smallvec::SmallVec;

/// Per-node identity tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityTag(pub u64);

/// Logical callback identity, shared by every registration of one callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Guid(pub u64);

static NEXT_GUID: AtomicU64 = AtomicU64::new(1);

impl Guid {
    /// Next guid, unique across every engine in the process
    pub fn mint() -> Self {
        Guid(NEXT_GUID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for IdentityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag#{}", self.0)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "guid#{}", self.0)
    }
}

/// One registration: the callback's guid plus the listener attached for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Responder {
    pub guid: Guid,
    pub listener: ListenerId,
}

/// Which responders `remove` takes out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    All,
    Guid(Guid),
}

type Branch = AHashMap<String, SmallVec<[Responder; 2]>>;

#[derive(Debug)]
pub struct Registry<N> {
    next_tag: u64,
    next_listener: u64,
    tags: AHashMap<N, IdentityTag>,
    owners: AHashMap<IdentityTag, N>,
    branches: AHashMap<IdentityTag, Branch>,
}

impl<N: Copy + Eq + Hash + fmt::Debug> Registry<N> {
    pub fn new() -> Self {
        Self {
            next_tag: 1,
            next_listener: 1,
            tags: AHashMap::new(),
            owners: AHashMap::new(),
            branches: AHashMap::new(),
        }
    }

    /// Tag for `node`, assigned on first use
    pub fn tag_of(&mut self, node: N) -> IdentityTag {
        if let Some(tag) = self.tags.get(&node) {
            return *tag;
        }
        let tag = IdentityTag(self.next_tag);
        self.next_tag += 1;
        self.tags.insert(node, tag);
        self.owners.insert(tag, node);
        tracing::trace!("[Registry] Assigned {} to node {:?}", tag, node);
        tag
    }

    /// Tag for `node` if it has one, without assigning
    pub fn existing_tag(&self, node: N) -> Option<IdentityTag> {
        self.tags.get(&node).copied()
    }

    pub fn mint_listener(&mut self) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        id
    }

    /// Responders for (node, kind), in registration order
    pub fn responders(&self, node: N, kind: &str) -> &[Responder] {
        self.existing_tag(node)
            .and_then(|tag| self.branches.get(&tag))
            .and_then(|branch| branch.get(kind))
            .map(|responders| responders.as_slice())
            .unwrap_or(&[])
    }

    /// Add a responder under (node, kind), tagging `node` if needed
    pub fn push(&mut self, node: N, kind: &str, responder: Responder) -> IdentityTag {
        let tag = self.tag_of(node);
        self.branches
            .entry(tag)
            .or_default()
            .entry(kind.to_string())
            .or_default()
            .push(responder);
        tag
    }

    /// Take responders out of (node, kind), pruning emptied entries
    ///
    /// Removed responders come back in registration order. A (node, kind)
    /// with nothing registered yields nothing. Dropping a node's last branch
    /// also drops its tag; a later registration gets a fresh one.
    pub fn remove(&mut self, node: N, kind: &str, which: Removal) -> Vec<Responder> {
        let Some(tag) = self.existing_tag(node) else {
            return Vec::new();
        };
        let Some(branch) = self.branches.get_mut(&tag) else {
            return Vec::new();
        };
        let Some(responders) = branch.get_mut(kind) else {
            return Vec::new();
        };

        let mut removed = Vec::new();
        responders.retain(|r| {
            let hit = match which {
                Removal::All => true,
                Removal::Guid(guid) => r.guid == guid,
            };
            if hit {
                removed.push(*r);
            }
            !hit
        });

        if responders.is_empty() {
            branch.remove(kind);
        }
        if branch.is_empty() {
            self.branches.remove(&tag);
            self.tags.remove(&node);
            self.owners.remove(&tag);
            tracing::debug!("[Registry] Dropped empty branch {}", tag);
        }
        removed
    }

    /// Whether `node` has any responders at all
    pub fn has_branch(&self, node: N) -> bool {
        self.existing_tag(node)
            .is_some_and(|tag| self.branches.contains_key(&tag))
    }

    /// Number of live branches
    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    /// Number of nodes currently holding a tag
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// Empty the registry, returning every (node, kind, responder)
    ///
    /// Counters keep running, so nodes tagged afterwards get fresh tags.
    pub fn drain(&mut self) -> Vec<(N, String, Responder)> {
        let mut out = Vec::new();
        let mut branches: Vec<_> = self.branches.drain().collect();
        branches.sort_by_key(|(tag, _)| *tag);

        for (tag, branch) in branches {
            let Some(&node) = self.owners.get(&tag) else {
                continue;
            };
            let mut kinds: Vec<_> = branch.into_iter().collect();
            kinds.sort_by(|a, b| a.0.cmp(&b.0));
            for (kind, responders) in kinds {
                out.extend(responders.into_iter().map(|r| (node, kind.clone(), r)));
            }
        }

        self.tags.clear();
        self.owners.clear();
        out
    }
}

impl<N: Copy + Eq + Hash + fmt::Debug> Default for Registry<N> {
    fn default() -> Self {
        Self::new()
    }
}
