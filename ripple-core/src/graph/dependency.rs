//! Dependency Graph Storage
//!
//! All nodes of a session live in one slab arena. Edges are kept twice, once
//! on each endpoint, so either side can erase them in O(1):
//!
//! - `source.outgoing[dependent] = context` (who read me, during which run)
//! - `dependent.incoming ∋ source` (what did I read)
//!
//! Edges are one-shot. They are removed the moment they fire, and every edge
//! touching a node is removed when that node is invalidated by any path.

use slab::Slab;
use tracing::trace;

use super::node::{ContextId, InvalidateCallback, Node, NodeId, NodeKind, NodeState, Payload};

/// Outcome of an invalidation walk.
#[derive(Default)]
pub(crate) struct Invalidation {
    /// Consumers that went from `Valid` to `Invalidated`.
    pub(crate) invalidated: Vec<NodeId>,

    /// Observers among them, with their priorities, to hand to the scheduler.
    pub(crate) observers: Vec<(NodeId, i32)>,

    /// Callbacks registered on the invalidated nodes. Must be run by the
    /// caller once the graph is no longer borrowed.
    pub(crate) callbacks: Vec<InvalidateCallback>,
}

/// The arena of nodes plus the edge index between them.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Slab<Node>,
    next_serial: u64,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, payload: Payload) -> NodeId {
        let serial = self.next_serial;
        self.next_serial += 1;
        let slot = self.nodes.insert(Node::new(serial, payload));
        NodeId::new(slot, serial)
    }

    /// Remove a node and every edge touching it.
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<Node> {
        self.get(id)?;
        self.erase_edges(id);
        Some(self.nodes.remove(id.slot()))
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.slot()).filter(|node| node.serial == id.serial())
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes
            .get_mut(id.slot())
            .filter(|node| node.serial == id.serial())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.get(id).map(Node::kind)
    }

    /// State of a consumer. `None` for values and unknown IDs.
    pub fn state(&self, id: NodeId) -> Option<NodeState> {
        self.get(id).and_then(Node::consumer_state)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Consumers currently depending on `id`.
    pub fn dependents(&self, id: NodeId) -> Vec<NodeId> {
        self.get(id)
            .map(|node| node.outgoing.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Sources `id` read during its current execution.
    pub fn dependencies(&self, id: NodeId) -> Vec<NodeId> {
        self.get(id)
            .map(|node| node.incoming.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Total number of edges. Every edge is counted once.
    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|(_, node)| node.outgoing.len()).sum()
    }

    /// Record that the execution `context` of `dependent` read `source`.
    ///
    /// Idempotent: reading the same source twice in one execution yields a
    /// single edge. Returns whether a new edge was created.
    pub(crate) fn add_edge(&mut self, source: NodeId, dependent: NodeId, context: ContextId) -> bool {
        if !self.contains(source) || !self.contains(dependent) {
            return false;
        }
        let created = match self.get_mut(source) {
            Some(node) => node.outgoing.insert(dependent, context) != Some(context),
            None => false,
        };
        if let Some(node) = self.get_mut(dependent) {
            node.incoming.insert(source);
        }
        if created {
            trace!(%source, %dependent, context = context.raw(), "edge recorded");
        }
        created
    }

    /// Remove every edge touching `id`, on both endpoints.
    ///
    /// Returns the dependents that were attached through `id`'s outgoing
    /// edges, so the caller can continue an invalidation walk through them.
    pub(crate) fn erase_edges(&mut self, id: NodeId) -> Vec<(NodeId, ContextId)> {
        let Some(node) = self.get_mut(id) else {
            return Vec::new();
        };
        let incoming = std::mem::take(&mut node.incoming);
        let outgoing = std::mem::take(&mut node.outgoing);

        for source in incoming {
            if let Some(source_node) = self.get_mut(source) {
                source_node.outgoing.swap_remove(&id);
            }
        }
        for dependent in outgoing.keys() {
            if let Some(dependent_node) = self.get_mut(*dependent) {
                dependent_node.incoming.swap_remove(&id);
            }
        }
        outgoing.into_iter().collect()
    }

    /// Fire the outgoing edges of `id`, removing them from both endpoints.
    fn fire_outgoing(&mut self, id: NodeId) -> Vec<(NodeId, ContextId)> {
        let Some(node) = self.get_mut(id) else {
            return Vec::new();
        };
        let outgoing = std::mem::take(&mut node.outgoing);
        for dependent in outgoing.keys() {
            if let Some(dependent_node) = self.get_mut(*dependent) {
                dependent_node.incoming.swap_remove(&id);
            }
        }
        outgoing.into_iter().collect()
    }

    /// Walk forward from `start`, invalidating everything reachable.
    ///
    /// For a value, the walk starts at its dependents. For a consumer, the
    /// consumer itself is invalidated first. A node that is already
    /// `Invalidated` stops the walk, so every node is visited at most once
    /// per change even in diamond-shaped graphs. A node that is `Running`
    /// loses its edges and is flagged so it does not end up `Valid`.
    pub(crate) fn invalidate(&mut self, start: NodeId) -> Invalidation {
        let mut outcome = Invalidation::default();

        let (kind, context) = match self.get(start) {
            Some(node) => (node.kind(), node.context),
            None => return outcome,
        };
        let mut frontier = match (kind, context) {
            (NodeKind::Value, _) => self.fire_outgoing(start),
            (_, Some(context)) => vec![(start, context)],
            // Never ran, or already invalidated.
            (_, None) => Vec::new(),
        };

        while let Some((id, context)) = frontier.pop() {
            let Some(node) = self.get_mut(id) else {
                continue;
            };
            if node.context != Some(context) {
                // Edge recorded by an execution that is no longer current.
                continue;
            }
            match node.state {
                NodeState::Invalidated => continue,
                NodeState::Valid => {
                    node.mark_invalidated();
                    outcome.invalidated.push(id);
                    if let Some(priority) = node.priority() {
                        outcome.observers.push((id, priority));
                    }
                }
                NodeState::Running => {
                    node.stale_run = true;
                }
            }
            outcome.callbacks.append(&mut node.on_invalidate);
            frontier.extend(self.erase_edges(id));
        }

        trace!(
            %start,
            invalidated = outcome.invalidated.len(),
            observers = outcome.observers.len(),
            "invalidation walk finished"
        );
        outcome
    }
}
