//! Reactive Primitives
//!
//! This module implements the session object and the three node kinds that
//! live in it: values, expressions and observers.
//!
//! # Concepts
//!
//! ## Values
//!
//! A Value is a container for mutable state. Reading it inside a consumer
//! records a dependency; writing it invalidates everything that depends on
//! it.
//!
//! ## Expressions
//!
//! An Expression is a derived value that caches its result. It recomputes
//! only when read after one of its dependencies changed.
//!
//! ## Observers
//!
//! An Observer is a side-effecting computation. When invalidated it is
//! queued, and the next flush runs it. Observers publish results to the host
//! through [`Runtime::emit`].
//!
//! # Implementation Notes
//!
//! Dependencies are discovered at run time: every body runs under an
//! execution context, and every read consults the current context to record
//! an edge. Nothing inspects body code.

mod context;
mod expression;
mod observer;
mod runtime;
mod value;

pub use context::{ContextStack, ContextToken, ExecutionContext};
pub use expression::Expression;
pub use observer::Observer;
pub use runtime::{Runtime, WeakRuntime};
pub use value::Value;

pub use crate::graph::{ContextId, FlushBatch, NodeId, NodeKind, NodeState, ObserverFailure};
