//! Error types for the reactive engine.

use thiserror::Error;

use crate::graph::NodeId;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;

/// Everything that can go wrong while reading, writing or running nodes.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A source was read while no consumer was executing.
    #[error("{source_node} was read outside of any consumer execution")]
    AccessViolation {
        /// The value or expression that was read.
        source_node: NodeId,
    },

    /// An operation that needs a running consumer was called without one.
    #[error("`{operation}` requires a running consumer")]
    NoActiveConsumer {
        /// Name of the rejected operation.
        operation: &'static str,
    },

    /// The body of an expression or observer failed.
    #[error("consumer {node} failed")]
    ConsumerExecution {
        /// The node whose body failed.
        node: NodeId,
        /// What the body returned.
        #[source]
        source: Box<ReactiveError>,
    },

    /// Error raised by application code inside a body.
    #[error("{0}")]
    Failed(String),

    /// An expression was read while it was still computing.
    #[error("cyclic read of {0} while it is running")]
    CycleDetected(NodeId),

    /// Nesting depth or flush iteration limit exceeded.
    #[error("unbounded recursion: limit of {limit} exceeded")]
    UnboundedRecursion {
        /// The configured limit that was hit.
        limit: usize,
    },

    /// `request_flush` was called from inside a running flush.
    #[error("flush requested while a flush is already running")]
    ReentrantFlush,

    /// The session hit unbounded recursion earlier and can no longer flush.
    #[error("session is poisoned by an earlier unbounded recursion")]
    SessionPoisoned,

    /// The runtime owning a handle has been dropped.
    #[error("the owning runtime has been dropped")]
    SessionClosed,

    /// The node behind a handle has been disposed.
    #[error("{0} does not exist")]
    UnknownNode(NodeId),

    /// The stored value does not have the handle's type.
    #[error("{0} does not hold a value of the requested type")]
    TypeMismatch(NodeId),

    /// An emitted output could not be converted to JSON.
    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ReactiveError {
    /// Convenience constructor for errors raised by body code.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Follow `ConsumerExecution` wrappers down to the originating error.
    pub fn root_cause(&self) -> &ReactiveError {
        let mut current = self;
        while let ReactiveError::ConsumerExecution { source, .. } = current {
            current = source.as_ref();
        }
        current
    }

    /// True for errors after which the session must not be flushed again.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.root_cause(),
            ReactiveError::UnboundedRecursion { .. } | ReactiveError::SessionPoisoned
        )
    }
}
