//! Value Implementation
//!
//! A Value is the mutable source at the root of the graph. It holds the
//! current state and never runs anything itself.
//!
//! # How Values Work
//!
//! 1. Reading a value inside a consumer records an edge from the value to
//!    that consumer. Reading outside any consumer is an access violation.
//!
//! 2. Writing a value invalidates every consumer reachable from it and
//!    deletes the edges it walked. Observers among them are queued for the
//!    next flush.
//!
//! 3. Writes never run bodies. Expressions recompute when next read,
//!    observers when the host flushes.

use std::fmt;
use std::sync::{Arc, Weak};

use super::runtime::{downcast, HandleRef, Inner};
use crate::error::Result;
use crate::graph::{AnyValue, NodeId};

/// Handle to a mutable reactive source.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.create_value(0);
///
/// count.set(5).unwrap();
/// assert_eq!(rt.isolate(|| count.get()).unwrap(), 5);
/// ```
pub struct Value<T> {
    handle: HandleRef<T>,
}

impl<T> Value<T>
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

    /// Read the current value and record a dependency of the running
    /// consumer on it.
    pub fn get(&self) -> Result<T> {
        let id = self.handle.id;
        let value = self.handle.inner()?.read_value(id)?;
        downcast(id, value)
    }

    /// Replace the value and invalidate everything that depends on it.
    pub fn set(&self, value: T) -> Result<()> {
        self.handle
            .inner()?
            .write_value(self.handle.id, Arc::new(value) as AnyValue)
    }

    /// Write `f(current)`. Reading the current value here records nothing.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&T) -> T,
    {
        let inner = self.handle.inner()?;
        let current: T = downcast(self.handle.id, inner.peek_value(self.handle.id)?)?;
        inner.write_value(self.handle.id, Arc::new(f(&current)) as AnyValue)
    }

    /// Write only if `value` differs from the current one. Returns whether a
    /// write (and therefore an invalidation) happened.
    pub fn set_if_changed(&self, value: T) -> Result<bool>
    where
        T: PartialEq,
    {
        let inner = self.handle.inner()?;
        let current: T = downcast(self.handle.id, inner.peek_value(self.handle.id)?)?;
        if current == value {
            return Ok(false);
        }
        inner.write_value(self.handle.id, Arc::new(value) as AnyValue)?;
        Ok(true)
    }
}

impl<T> Clone for Value<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
        }
    }
}

impl<T> fmt::Debug for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value").field("id", &self.handle.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::reactive::{NodeState, Runtime};
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn value_get_and_set() {
        let rt = Runtime::new();
        let value = rt.create_value(0);
        assert_eq!(rt.isolate(|| value.get()).unwrap(), 0);

        value.set(42).unwrap();
        assert_eq!(rt.isolate(|| value.get()).unwrap(), 42);
    }

    #[test]
    fn value_update() {
        let rt = Runtime::new();
        let value = rt.create_value(10);
        value.update(|v| v + 5).unwrap();
        assert_eq!(rt.isolate(|| value.get()).unwrap(), 15);
    }

    #[test]
    fn value_clone_shares_state() {
        let rt = Runtime::new();
        let value1 = rt.create_value(String::from("a"));
        let value2 = value1.clone();

        value1.set("b".into()).unwrap();
        assert_eq!(value1.id(), value2.id());
        assert_eq!(rt.isolate(|| value2.get()).unwrap(), "b");
    }

    #[test]
    fn set_if_changed_skips_equal_writes() {
        let rt = Runtime::new();
        let value = rt.create_value(1);
        let runs = Arc::new(AtomicI32::new(0));
        let obs = {
            let value = value.clone();
            let runs = runs.clone();
            rt.create_observer(0, move || {
                value.get()?;
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        };
        rt.request_flush().unwrap();

        assert!(!value.set_if_changed(1).unwrap());
        assert_eq!(rt.state(obs.id()), Some(NodeState::Valid));

        assert!(value.set_if_changed(2).unwrap());
        assert_eq!(rt.state(obs.id()), Some(NodeState::Invalidated));

        rt.request_flush().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn update_does_not_record_dependency() {
        let rt = Runtime::new();
        let value = rt.create_value(1);
        {
            let value = value.clone();
            rt.create_observer(0, move || value.update(|v| v + 1));
        }

        rt.request_flush().unwrap();

        assert!(rt.dependents(value.id()).is_empty());
        assert_eq!(rt.isolate(|| value.get()).unwrap(), 2);
    }
}
