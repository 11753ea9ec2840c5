//! Dependency Graph
//!
//! This module implements the directed graph between reactive sources and
//! the consumers that read them, plus the queue of observers waiting to run.
//!
//! # Overview
//!
//! - Nodes are values, expressions and observers, stored in one arena and
//!   addressed by [`NodeId`].
//! - An edge `source -> dependent` exists while the dependent's current
//!   execution has read the source. Edges are created by reads and destroyed
//!   by invalidation; nothing else touches them.
//!
//! # Design Decisions
//!
//! 1. The graph is centralized rather than stored as per-node callback lists,
//!    so erasing an edge never leaves a dangling subscription behind.
//!
//! 2. Both directions are indexed (`incoming` and `outgoing`), making edge
//!    removal O(1) from either endpoint.
//!
//! 3. Cycles are not detected here. The runtime rejects a read of an
//!    expression that is already running and bounds nesting depth.

mod dependency;
mod node;
mod scheduler;

pub use dependency::DependencyGraph;
pub use node::{ContextId, NodeId, NodeKind, NodeState};
pub use scheduler::{FlushBatch, FlushScheduler, ObserverFailure};

pub(crate) use node::{AnyValue, ExpressionBody, InvalidateCallback, ObserverBody, Payload};
