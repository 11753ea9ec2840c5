//! Graph Nodes
//!
//! This module defines the node records that live in the dependency graph
//! arena, together with the identifiers used to refer to them.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::error::Result;

/// Stable identifier for a node in the dependency graph.
///
/// `slot` indexes the arena; `serial` distinguishes successive occupants of
/// the same slot, so an ID held after its node was disposed never aliases a
/// newer node. Serials are a 64-bit counter that is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    slot: usize,
    serial: u64,
}

impl NodeId {
    pub(crate) fn new(slot: usize, serial: u64) -> Self {
        Self { slot, serial }
    }

    /// Index into the arena.
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}.{}", self.slot, self.serial)
    }
}

/// Identity of one execution of a consumer body.
///
/// A fresh ID is minted every time an expression or observer runs. Edges
/// remember the context that created them, so an edge can only fire against
/// the execution that recorded it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A mutable source. Roots of the graph; never run, never invalidated.
    Value,

    /// A lazy cached derivation. Both a source and a consumer.
    Expression,

    /// An eager side-effecting consumer. Leaves of the graph.
    Observer,
}

/// Lifecycle state of an expression or observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Up to date. Expressions hold a cached value in this state.
    Valid,

    /// Needs to run before its result can be trusted.
    Invalidated,

    /// The body is currently executing.
    Running,
}

/// Type-erased value stored in a value or expression node.
pub(crate) type AnyValue = Arc<dyn Any + Send + Sync>;

/// Type-erased expression body.
pub(crate) type ExpressionBody = Arc<dyn Fn() -> Result<AnyValue> + Send + Sync>;

/// Type-erased observer body.
pub(crate) type ObserverBody = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// One-shot callback run when a consumer is next invalidated.
pub(crate) type InvalidateCallback = Box<dyn FnOnce() + Send>;

/// Variant-specific part of a node.
pub(crate) enum Payload {
    Value {
        current: AnyValue,
    },
    Expression {
        body: ExpressionBody,
        cached: Option<AnyValue>,
    },
    Observer {
        body: ObserverBody,
        priority: i32,
        runs: u64,
    },
}

/// A node record in the arena.
pub(crate) struct Node {
    pub(crate) serial: u64,

    /// Meaningless for values; they stay `Valid` forever.
    pub(crate) state: NodeState,

    /// Set when an invalidation reaches this node while it is running.
    pub(crate) stale_run: bool,

    /// The execution whose reads this node's incoming edges belong to.
    pub(crate) context: Option<ContextId>,

    /// Sources this node read during its current execution.
    pub(crate) incoming: IndexSet<NodeId>,

    /// Consumers that read this node, keyed by owner, tagged with the
    /// execution that performed the read.
    pub(crate) outgoing: IndexMap<NodeId, ContextId>,

    pub(crate) on_invalidate: Vec<InvalidateCallback>,

    pub(crate) payload: Payload,
}

impl Node {
    pub(crate) fn new(serial: u64, payload: Payload) -> Self {
        let state = match payload {
            Payload::Value { .. } => NodeState::Valid,
            // Consumers start out needing their first run.
            Payload::Expression { .. } | Payload::Observer { .. } => NodeState::Invalidated,
        };
        Self {
            serial,
            state,
            stale_run: false,
            context: None,
            incoming: IndexSet::new(),
            outgoing: IndexMap::new(),
            on_invalidate: Vec::new(),
            payload,
        }
    }

    pub(crate) fn kind(&self) -> NodeKind {
        match self.payload {
            Payload::Value { .. } => NodeKind::Value,
            Payload::Expression { .. } => NodeKind::Expression,
            Payload::Observer { .. } => NodeKind::Observer,
        }
    }

    /// State of a consumer, `None` for values.
    pub(crate) fn consumer_state(&self) -> Option<NodeState> {
        match self.kind() {
            NodeKind::Value => None,
            NodeKind::Expression | NodeKind::Observer => Some(self.state),
        }
    }

    pub(crate) fn priority(&self) -> Option<i32> {
        match self.payload {
            Payload::Observer { priority, .. } => Some(priority),
            _ => None,
        }
    }

    /// Mark the node stale and drop anything cached for the old execution.
    pub(crate) fn mark_invalidated(&mut self) {
        self.state = NodeState::Invalidated;
        self.stale_run = false;
        self.context = None;
        if let Payload::Expression { cached, .. } = &mut self.payload {
            *cached = None;
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("serial", &self.serial)
            .field("kind", &self.kind())
            .field("state", &self.consumer_state())
            .field("incoming", &self.incoming.len())
            .field("outgoing", &self.outgoing.len())
            .finish()
    }
}
