//! Execution Contexts
//!
//! An execution context is created for every run of an expression or
//! observer body. It is the rendezvous point between the running consumer
//! and the sources it reads: a read looks up the current context and records
//! an edge to its owner.
//!
//! # Implementation
//!
//! Each runtime owns one [`ContextStack`]. Running a body pushes a context;
//! the returned [`ContextToken`] restores the previous one. Nested reads
//! (an expression evaluated while another body is running) simply push
//! further frames. There is no thread-local or global state, so independent
//! runtimes never observe each other's contexts.

use smallvec::SmallVec;
use tracing::warn;

use crate::graph::{ContextId, NodeId};

/// One execution of a consumer body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    id: ContextId,

    /// `None` for isolated contexts, whose reads record no edges.
    owner: Option<NodeId>,

    /// Distinct sources read so far, in first-read order.
    recorded: SmallVec<[NodeId; 8]>,
}

impl ExecutionContext {
    pub(crate) fn new(id: ContextId, owner: Option<NodeId>) -> Self {
        Self {
            id,
            owner,
            recorded: SmallVec::new(),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    /// The consumer this context runs, if it tracks dependencies.
    pub fn owner(&self) -> Option<NodeId> {
        self.owner
    }

    pub fn is_isolated(&self) -> bool {
        self.owner.is_none()
    }

    /// Sources recorded by this execution.
    pub fn recorded_sources(&self) -> &[NodeId] {
        &self.recorded
    }

    /// Record a read. Returns false if the source was already recorded.
    pub(crate) fn record(&mut self, source: NodeId) -> bool {
        if self.recorded.contains(&source) {
            return false;
        }
        self.recorded.push(source);
        true
    }
}

/// Proof of a push, needed to pop.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a pushed context must be popped with its token"]
pub struct ContextToken {
    depth: usize,
    context: ContextId,
}

/// The stack of contexts active in one runtime.
#[derive(Debug, Default)]
pub struct ContextStack {
    frames: Vec<ExecutionContext>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `context` as current.
    pub fn push(&mut self, context: ExecutionContext) -> ContextToken {
        let token = ContextToken {
            depth: self.frames.len(),
            context: context.id,
        };
        self.frames.push(context);
        token
    }

    /// Restore whatever was current before the push that produced `token`.
    ///
    /// Frames above the token are discarded too, so a stack left unbalanced
    /// by an unwinding body is repaired by the outer pop. A token whose frame
    /// is no longer at its depth pops nothing.
    pub fn pop(&mut self, token: ContextToken) -> Option<ExecutionContext> {
        let found = self.frames.get(token.depth).map(ExecutionContext::id);
        if found != Some(token.context) {
            warn!(
                depth = token.depth,
                expected = token.context.raw(),
                found = found.map(|id| id.raw()),
                "context token does not match the stack, nothing popped"
            );
            return None;
        }
        self.frames.drain(token.depth..).next()
    }

    pub fn current(&self) -> Option<&ExecutionContext> {
        self.frames.last()
    }

    pub(crate) fn current_mut(&mut self) -> Option<&mut ExecutionContext> {
        self.frames.last_mut()
    }

    /// The innermost frame that belongs to a consumer.
    pub fn nearest_owner(&self) -> Option<NodeId> {
        self.frames.iter().rev().find_map(|ctx| ctx.owner)
    }

    /// Owners of all frames, innermost first.
    pub fn owners(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.frames.iter().rev().filter_map(|ctx| ctx.owner)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
