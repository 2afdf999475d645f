//! Native event plumbing
//!
//! The host side of event dispatch: the event value handed to listeners and
//! the per-node listener table. Listeners are opaque `ListenerId` handles;
//! whoever attaches them owns the code they stand for.

use ahash::AHashMap;
use serde_json::Value;
use smallvec::SmallVec;

use crate::types::NodeId;

/// Opaque handle for a listener attached to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Which phase of dispatch is currently executing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    None,
    AtTarget,
    Bubbling,
}

/// A dispatched event
///
/// Dispatched events bubble and are cancelable, matching
/// `initEvent(kind, true, true)`.
#[derive(Debug, Clone)]
pub struct Event<N = NodeId> {
    /// Event kind name (e.g. `"click"`)
    pub kind: String,
    /// Caller-supplied payload, an empty object when none was given
    pub data: Value,
    pub target: Option<N>,
    pub current_target: Option<N>,
    pub phase: EventPhase,
    pub bubbles: bool,
    pub cancelable: bool,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl<N> Event<N> {
    pub fn new(kind: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            kind: kind.into(),
            data: data.unwrap_or_else(|| Value::Object(Default::default())),
            target: None,
            current_target: None,
            phase: EventPhase::None,
            bubbles: true,
            cancelable: true,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    /// Prevent default action
    pub fn prevent_default(&mut self) {
        if self.cancelable {
            self.default_prevented = true;
        }
    }

    /// Stop propagation once the current node's listeners have run
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

/// Listeners attached to nodes, keyed by node then by event kind
#[derive(Debug, Default, Clone)]
pub struct ListenerTable {
    map: AHashMap<NodeId, AHashMap<String, SmallVec<[ListenerId; 2]>>>,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: NodeId, kind: &str, listener: ListenerId) {
        self.map
            .entry(node)
            .or_default()
            .entry(kind.to_string())
            .or_default()
            .push(listener);
    }

    /// Remove one attachment of `listener`; empty entries are dropped
    pub fn remove(&mut self, node: NodeId, kind: &str, listener: ListenerId) -> bool {
        let Some(kinds) = self.map.get_mut(&node) else {
            return false;
        };
        let Some(listeners) = kinds.get_mut(kind) else {
            return false;
        };

        let Some(pos) = listeners.iter().position(|l| *l == listener) else {
            return false;
        };
        listeners.remove(pos);
        if listeners.is_empty() {
            kinds.remove(kind);
        }
        if kinds.is_empty() {
            self.map.remove(&node);
        }
        true
    }

    /// Snapshot of listeners for (node, kind) in attachment order
    pub fn get(&self, node: NodeId, kind: &str) -> Vec<ListenerId> {
        self.map
            .get(&node)
            .and_then(|kinds| kinds.get(kind))
            .map(|listeners| listeners.to_vec())
            .unwrap_or_default()
    }

    /// Number of nodes with at least one listener
    pub fn node_count(&self) -> usize {
        self.map.len()
    }
}
