//! Observer Implementation
//!
//! An Observer is a side-effecting consumer that reruns whenever something
//! it read changes.
//!
//! # How Observers Work
//!
//! 1. When created, the observer is `Invalidated` and queued. It first runs
//!    on the next flush, which establishes its dependencies.
//!
//! 2. When any dependency changes, it is invalidated, loses all of its
//!    edges and is queued again.
//!
//! 3. Each run records dependencies afresh, so conditional reads are
//!    tracked exactly.
//!
//! # Differences from Expression
//!
//! - Expressions return a value; observers do not.
//! - Expressions are lazy (run on read); observers are eager (run on flush).
//! - Nothing can depend on an observer; it has no outgoing edges.

use std::fmt;
use std::sync::Weak;

use super::runtime::{HandleRef, Inner};
use crate::error::{ReactiveError, Result};
use crate::graph::{NodeId, NodeState};

/// Handle to an eager side-effecting consumer.
///
/// There is no operation to run an observer directly; only a flush does.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let name = rt.create_value(String::from("world"));
///
/// let weak = rt.downgrade();
/// let greeter = {
///     let name = name.clone();
///     rt.create_observer(0, move || weak.emit("greeting", format!("hello {}", name.get()?)))
/// };
///
/// let batch = rt.request_flush().unwrap();
/// assert_eq!(batch.outputs["greeting"], "hello world");
/// assert_eq!(greeter.run_count().unwrap(), 1);
/// ```
#[derive(Clone)]
pub struct Observer {
    handle: HandleRef<()>,
}

impl Observer {
    pub(crate) fn from_parts(id: NodeId, runtime: Weak<Inner>) -> Self {
        Self {
            handle: HandleRef::new(id, runtime),
        }
    }

    pub fn id(&self) -> NodeId {
        self.handle.id
    }

    pub fn state(&self) -> Result<NodeState> {
        let id = self.handle.id;
        self.handle
            .inner()?
            .state(id)
            .ok_or(ReactiveError::UnknownNode(id))
    }

    pub fn priority(&self) -> Result<i32> {
        let (priority, _) = self.handle.inner()?.observer_stats(self.handle.id)?;
        Ok(priority)
    }

    /// Number of times the body has completed successfully.
    pub fn run_count(&self) -> Result<u64> {
        let (_, runs) = self.handle.inner()?.observer_stats(self.handle.id)?;
        Ok(runs)
    }

    /// Force a rerun on the next flush.
    pub fn invalidate(&self) -> Result<()> {
        self.handle.inner()?.invalidate(self.handle.id)
    }

    /// Remove the observer and its edges. It will not run again.
    pub fn dispose(&self) -> Result<()> {
        self.handle.inner()?.dispose(self.handle.id)
    }

    pub fn is_disposed(&self) -> bool {
        match self.handle.inner() {
            Ok(inner) => inner.state(self.handle.id).is_none(),
            Err(_) => true,
        }
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("id", &self.handle.id)
            .finish()
    }
}
