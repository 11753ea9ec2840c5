//! Expression Implementation
//!
//! An Expression is a cached derived value. It is a consumer of the sources
//! its body reads and a source for whoever reads it.
//!
//! # How Expressions Work
//!
//! 1. A new expression is `Invalidated` and its body has not run.
//!
//! 2. Reading it while `Invalidated` runs the body under a fresh context,
//!    caches the result and leaves it `Valid`.
//!
//! 3. Reading it while `Valid` returns the cache without running anything.
//!
//! 4. When one of its sources changes, it becomes `Invalidated` again and
//!    drops the cache. Nothing runs until the next read.
//!
//! # Bodies
//!
//! The body must not have externally visible side effects. This is not
//! enforced: a body that writes values or emits outputs makes the results
//! of a flush depend on read order.

use std::fmt;
use std::sync::Weak;

use super::runtime::{downcast, HandleRef, Inner};
use crate::error::{ReactiveError, Result};
use crate::graph::{NodeId, NodeState};

/// Handle to a lazy, cached derivation.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let x = rt.create_value(5);
/// let double = {
///     let x = x.clone();
///     rt.create_expression(move || Ok(x.get()? * 2))
/// };
///
/// assert_eq!(rt.isolate(|| double.get()).unwrap(), 10);
/// ```
pub struct Expression<T> {
    handle: HandleRef<T>,
}

impl<T> Expression<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn from_parts(id: NodeId, runtime: Weak<Inner>) -> Self {
        Self {
            handle: HandleRef::new(id, runtime),
        }
    }

    pub fn id(&self) -> NodeId {
        self.handle.id
    }

    /// Read the value, recomputing first if it is stale.
    ///
    /// Records a dependency of the running consumer on this expression.
    pub fn get(&self) -> Result<T> {
        let id = self.handle.id;
        let value = self.handle.inner()?.read_expression(id)?;
        downcast(id, value)
    }

    /// The cached value, if valid. Never runs the body and records nothing.
    pub fn cached(&self) -> Result<Option<T>> {
        let id = self.handle.id;
        self.handle
            .inner()?
            .cached(id)?
            .map(|value| downcast(id, value))
            .transpose()
    }

    pub fn state(&self) -> Result<NodeState> {
        let id = self.handle.id;
        self.handle
            .inner()?
            .state(id)
            .ok_or(ReactiveError::UnknownNode(id))
    }

    /// Drop the cache and invalidate everything downstream.
    pub fn invalidate(&self) -> Result<()> {
        self.handle.inner()?.invalidate(self.handle.id)
    }
}

impl<T> Clone for Expression<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
        }
    }
}

impl<T> fmt::Debug for Expression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("id", &self.handle.id)
            .finish()
    }
}
