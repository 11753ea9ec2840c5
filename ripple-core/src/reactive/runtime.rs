//! Reactive Runtime
//!
//! The runtime is the session object that connects values, expressions and
//! observers. It owns the dependency graph, the context stack and the flush
//! scheduler, and it is the only place where bodies are executed.
//!
//! # How It Works
//!
//! 1. Reading a value or expression looks up the current execution context
//!    and records an edge `source -> owner`. Reading with no context is an
//!    access violation.
//!
//! 2. Writing a value walks the graph forward from it, invalidating every
//!    consumer reachable through edges and deleting those edges. Invalidated
//!    observers are queued.
//!
//! 3. Expressions are lazy: they recompute only when read while invalidated.
//!
//! 4. `request_flush` runs queued observers, highest priority first, until
//!    none are left, then hands everything they emitted to the host as one
//!    batch.
//!
//! # Locking
//!
//! All session state sits behind one mutex. It is never held while a body
//! or an invalidation callback runs, so bodies may freely read, write and
//! emit.
//!
//! Everything that touches the context stack (flushes, reads, `isolate`,
//! `emit`, `on_invalidate`) also holds a reentrant execution lock for its
//! whole duration. Another thread using the same runtime therefore waits
//! for a running flush instead of interleaving frames with it. A body must
//! not block on another thread that uses its own runtime. Writes only take
//! the state mutex. Separate runtimes share nothing and run in parallel.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, ReentrantMutex};
use serde::Serialize;
use tracing::{debug, debug_span, error, trace, warn};

use super::context::{ContextStack, ContextToken, ExecutionContext};
use super::{Expression, Observer, Value};
use crate::config::RuntimeConfig;
use crate::error::{ReactiveError, Result};
use crate::graph::{
    AnyValue, ContextId, DependencyGraph, ExpressionBody, FlushBatch, FlushScheduler,
    InvalidateCallback, NodeId, NodeKind, NodeState, ObserverBody, ObserverFailure, Payload,
};

/// Mutable state of one session.
#[derive(Debug, Default)]
struct Session {
    graph: DependencyGraph,
    stack: ContextStack,
    scheduler: FlushScheduler,
    outputs: IndexMap<String, serde_json::Value>,
    next_context: u64,
}

impl Session {
    fn next_context_id(&mut self) -> ContextId {
        self.next_context += 1;
        ContextId::new(self.next_context)
    }

    /// Record a read of `source` by whatever is currently executing.
    fn record_read(&mut self, source: NodeId) -> Result<()> {
        let context = self
            .stack
            .current_mut()
            .ok_or(ReactiveError::AccessViolation { source_node: source })?;
        if let Some(owner) = context.owner() {
            context.record(source);
            self.graph.add_edge(source, owner, context.id());
        }
        Ok(())
    }

    /// Mark `id` running under a fresh context and push that context.
    fn begin_run(&mut self, id: NodeId, max_depth: usize) -> Result<ContextToken> {
        if self.stack.depth() >= max_depth {
            return Err(ReactiveError::UnboundedRecursion { limit: max_depth });
        }
        let context = self.next_context_id();
        let node = self.graph.get_mut(id).ok_or(ReactiveError::UnknownNode(id))?;
        node.state = NodeState::Running;
        node.stale_run = false;
        node.context = Some(context);
        Ok(self.stack.push(ExecutionContext::new(context, Some(id))))
    }

    /// Leave `id` invalidated with no edges, returning callbacks to run.
    fn discard_run(&mut self, id: NodeId) -> Vec<InvalidateCallback> {
        let callbacks = match self.graph.get_mut(id) {
            Some(node) => {
                node.mark_invalidated();
                std::mem::take(&mut node.on_invalidate)
            }
            None => Vec::new(),
        };
        self.graph.erase_edges(id);
        callbacks
    }

    fn enqueue_all(&mut self, observers: &[(NodeId, i32)]) {
        for &(id, priority) in observers {
            self.scheduler.enqueue(id, priority);
        }
    }

    /// Pop queued candidates until one is an invalidated observer.
    fn next_runnable(&mut self) -> Option<NodeId> {
        while let Some(id) = self.scheduler.pop() {
            let runnable = self.graph.get(id).is_some_and(|node| {
                node.kind() == NodeKind::Observer && node.state == NodeState::Invalidated
            });
            if runnable {
                return Some(id);
            }
        }
        None
    }
}

fn run_callbacks(callbacks: Vec<InvalidateCallback>) {
    for callback in callbacks {
        callback();
    }
}

/// Pops a pushed context on every exit path.
///
/// The normal path calls [`release`](Self::release) while already holding
/// the session lock. If the body unwinds instead, `Drop` pops the context,
/// leaves the owner invalidated, and defers an observer to the next cycle.
struct ExecutionGuard<'a> {
    inner: &'a Inner,
    owner: Option<NodeId>,
    token: Option<ContextToken>,
}

impl<'a> ExecutionGuard<'a> {
    fn new(inner: &'a Inner, owner: Option<NodeId>, token: ContextToken) -> Self {
        Self {
            inner,
            owner,
            token: Some(token),
        }
    }

    fn release(mut self, session: &mut Session) {
        if let Some(token) = self.token.take() {
            session.stack.pop(token);
        }
    }
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        let mut session = self.inner.session.lock();
        session.stack.pop(token);
        if let Some(owner) = self.owner {
            let priority = session.graph.get(owner).and_then(|node| node.priority());
            // Callbacks are dropped unrun; we are unwinding.
            session.discard_run(owner);
            if let Some(priority) = priority {
                session.scheduler.defer(owner, priority);
            }
        }
    }
}

/// Ends a flush however it ends. A flush that unwinds drops whatever its
/// observers emitted so far, so none of it reaches a later batch.
struct FlushGuard<'a>(&'a Inner);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.session.lock().outputs.clear();
        }
        self.0.flushing.store(false, Ordering::Release);
    }
}

/// Shared core of a runtime. Handles keep a weak reference to it.
#[derive(Debug)]
pub(crate) struct Inner {
    config: RuntimeConfig,
    session: Mutex<Session>,
    /// Held by whichever thread is pushing or reading contexts.
    execution: ReentrantMutex<()>,
    flushing: AtomicBool,
    poisoned: AtomicBool,
}

impl Inner {
    pub(crate) fn read_value(&self, id: NodeId) -> Result<AnyValue> {
        let _exec = self.execution.lock();
        let mut session = self.session.lock();
        let current = match session.graph.get(id).map(|node| &node.payload) {
            Some(Payload::Value { current }) => Arc::clone(current),
            Some(_) => return Err(ReactiveError::TypeMismatch(id)),
            None => return Err(ReactiveError::UnknownNode(id)),
        };
        session.record_read(id)?;
        Ok(current)
    }

    /// Current value without any context or edge. Used by write helpers.
    pub(crate) fn peek_value(&self, id: NodeId) -> Result<AnyValue> {
        let session = self.session.lock();
        match session.graph.get(id).map(|node| &node.payload) {
            Some(Payload::Value { current }) => Ok(Arc::clone(current)),
            Some(_) => Err(ReactiveError::TypeMismatch(id)),
            None => Err(ReactiveError::UnknownNode(id)),
        }
    }

    pub(crate) fn write_value(&self, id: NodeId, value: AnyValue) -> Result<()> {
        let outcome = {
            let mut session = self.session.lock();
            match session.graph.get_mut(id).map(|node| &mut node.payload) {
                Some(Payload::Value { current }) => *current = value,
                Some(_) => return Err(ReactiveError::TypeMismatch(id)),
                None => return Err(ReactiveError::UnknownNode(id)),
            }
            let outcome = session.graph.invalidate(id);
            session.enqueue_all(&outcome.observers);
            outcome
        };
        trace!(
            node = %id,
            invalidated = outcome.invalidated.len(),
            "value written"
        );
        run_callbacks(outcome.callbacks);
        Ok(())
    }

    pub(crate) fn read_expression(&self, id: NodeId) -> Result<AnyValue> {
        let _exec = self.execution.lock();
        let (body, guard) = {
            let mut session = self.session.lock();
            if session.stack.is_empty() {
                return Err(ReactiveError::AccessViolation { source_node: id });
            }
            let node = session.graph.get(id).ok_or(ReactiveError::UnknownNode(id))?;
            let (body, cached) = match &node.payload {
                Payload::Expression { body, cached } => (body, cached),
                _ => return Err(ReactiveError::TypeMismatch(id)),
            };
            match (node.state, cached) {
                (NodeState::Running, _) => return Err(ReactiveError::CycleDetected(id)),
                (NodeState::Valid, Some(cached)) => {
                    let cached = Arc::clone(cached);
                    session.record_read(id)?;
                    return Ok(cached);
                }
                _ => {}
            }
            let body: ExpressionBody = Arc::clone(body);
            session.record_read(id)?;
            let token = session.begin_run(id, self.config.max_depth)?;
            (body, ExecutionGuard::new(self, Some(id), token))
        };

        trace!(node = %id, "recomputing expression");
        let result = body();

        let (result, callbacks) = {
            let mut session = self.session.lock();
            guard.release(&mut session);
            match result {
                Ok(value) => {
                    let stale = session.graph.get(id).is_some_and(|node| node.stale_run);
                    if stale {
                        // Inputs changed mid-run: hand the value to this
                        // reader but do not cache it.
                        (Ok(value), session.discard_run(id))
                    } else {
                        if let Some(node) = session.graph.get_mut(id) {
                            node.state = NodeState::Valid;
                            if let Payload::Expression { cached, .. } = &mut node.payload {
                                *cached = Some(Arc::clone(&value));
                            }
                        }
                        (Ok(value), Vec::new())
                    }
                }
                Err(source) => {
                    let callbacks = session.discard_run(id);
                    let error = ReactiveError::ConsumerExecution {
                        node: id,
                        source: Box::new(source),
                    };
                    (Err(error), callbacks)
                }
            }
        };
        run_callbacks(callbacks);
        result
    }

    pub(crate) fn cached(&self, id: NodeId) -> Result<Option<AnyValue>> {
        let session = self.session.lock();
        match session.graph.get(id).map(|node| &node.payload) {
            Some(Payload::Expression { cached, .. }) => Ok(cached.clone()),
            Some(_) => Err(ReactiveError::TypeMismatch(id)),
            None => Err(ReactiveError::UnknownNode(id)),
        }
    }

    /// Run one observer. The caller has checked it is invalidated.
    fn run_observer(&self, id: NodeId) -> Result<()> {
        let (body, guard) = {
            let mut session = self.session.lock();
            let body: ObserverBody = match session.graph.get(id).map(|node| &node.payload) {
                Some(Payload::Observer { body, .. }) => Arc::clone(body),
                Some(_) => return Err(ReactiveError::TypeMismatch(id)),
                None => return Err(ReactiveError::UnknownNode(id)),
            };
            let token = match session.begin_run(id, self.config.max_depth) {
                Ok(token) => token,
                Err(error) => {
                    // Already popped from the queue; keep it for next cycle.
                    let priority = session.graph.get(id).and_then(|node| node.priority());
                    session.scheduler.defer(id, priority.unwrap_or_default());
                    return Err(error);
                }
            };
            (body, ExecutionGuard::new(self, Some(id), token))
        };

        let result = body();

        let (result, callbacks) = {
            let mut session = self.session.lock();
            let session = &mut *session;
            guard.release(session);
            let Some(node) = session.graph.get_mut(id) else {
                // Disposed by its own body.
                return result;
            };
            let priority = node.priority().unwrap_or_default();
            match result {
                Ok(()) => {
                    if let Payload::Observer { runs, .. } = &mut node.payload {
                        *runs += 1;
                    }
                    if node.stale_run {
                        let callbacks = session.discard_run(id);
                        session.scheduler.enqueue(id, priority);
                        (Ok(()), callbacks)
                    } else {
                        node.state = NodeState::Valid;
                        (Ok(()), Vec::new())
                    }
                }
                Err(source) => {
                    let callbacks = session.discard_run(id);
                    session.scheduler.defer(id, priority);
                    let error = ReactiveError::ConsumerExecution {
                        node: id,
                        source: Box::new(source),
                    };
                    (Err(error), callbacks)
                }
            }
        };
        run_callbacks(callbacks);
        result
    }

    pub(crate) fn invalidate(&self, id: NodeId) -> Result<()> {
        let outcome = {
            let mut session = self.session.lock();
            match session.graph.kind(id) {
                Some(NodeKind::Expression | NodeKind::Observer) => {}
                Some(NodeKind::Value) => return Err(ReactiveError::TypeMismatch(id)),
                None => return Err(ReactiveError::UnknownNode(id)),
            }
            let outcome = session.graph.invalidate(id);
            session.enqueue_all(&outcome.observers);
            outcome
        };
        trace!(node = %id, invalidated = outcome.invalidated.len(), "explicit invalidation");
        run_callbacks(outcome.callbacks);
        Ok(())
    }

    pub(crate) fn dispose(&self, id: NodeId) -> Result<()> {
        let removed = self.session.lock().graph.remove(id);
        match removed {
            Some(_) => {
                debug!(node = %id, "node disposed");
                Ok(())
            }
            None => Err(ReactiveError::UnknownNode(id)),
        }
    }

    fn emit(&self, name: String, value: serde_json::Value) -> Result<()> {
        let _exec = self.execution.lock();
        let mut session = self.session.lock();
        let session = &mut *session;
        let has_observer = session
            .stack
            .owners()
            .any(|owner| session.graph.kind(owner) == Some(NodeKind::Observer));
        if !has_observer {
            return Err(ReactiveError::NoActiveConsumer { operation: "emit" });
        }
        session.outputs.insert(name, value);
        Ok(())
    }

    fn on_invalidate(&self, callback: InvalidateCallback) -> Result<()> {
        let _exec = self.execution.lock();
        let mut session = self.session.lock();
        let owner = session
            .stack
            .nearest_owner()
            .ok_or(ReactiveError::NoActiveConsumer { operation: "on_invalidate" })?;
        let node = session
            .graph
            .get_mut(owner)
            .ok_or(ReactiveError::UnknownNode(owner))?;
        node.on_invalidate.push(callback);
        Ok(())
    }

    fn isolate<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> Result<R>,
    {
        let _exec = self.execution.lock();
        let guard = {
            let mut session = self.session.lock();
            let limit = self.config.max_depth;
            if session.stack.depth() >= limit {
                return Err(ReactiveError::UnboundedRecursion { limit });
            }
            let context = session.next_context_id();
            let token = session.stack.push(ExecutionContext::new(context, None));
            ExecutionGuard::new(self, None, token)
        };
        let result = f();
        guard.release(&mut self.session.lock());
        result
    }

    pub(crate) fn state(&self, id: NodeId) -> Option<NodeState> {
        self.session.lock().graph.state(id)
    }

    pub(crate) fn observer_stats(&self, id: NodeId) -> Result<(i32, u64)> {
        let session = self.session.lock();
        match session.graph.get(id).map(|node| &node.payload) {
            Some(Payload::Observer { priority, runs, .. }) => Ok((*priority, *runs)),
            Some(_) => Err(ReactiveError::TypeMismatch(id)),
            None => Err(ReactiveError::UnknownNode(id)),
        }
    }
}

/// A reactive session.
///
/// Cloning a runtime is cheap and yields another handle to the same session.
/// Value, expression and observer handles only hold a weak reference, so
/// capturing them in bodies does not keep the session alive.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.create_value(1);
///
/// let doubled = {
///     let count = count.clone();
///     rt.create_expression(move || Ok(count.get()? * 2))
/// };
///
/// let weak = rt.downgrade();
/// rt.create_observer(0, move || weak.emit("doubled", doubled.get()?));
///
/// let batch = rt.request_flush().unwrap();
/// assert_eq!(batch.outputs["doubled"], 2);
///
/// count.set(5).unwrap();
/// let batch = rt.request_flush().unwrap();
/// assert_eq!(batch.outputs["doubled"], 10);
/// ```
#[derive(Debug, Clone)]
pub struct Runtime {
    inner: Arc<Inner>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                session: Mutex::new(Session::default()),
                execution: ReentrantMutex::new(()),
                flushing: AtomicBool::new(false),
                poisoned: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    fn weak(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    /// Create a mutable source holding `initial`.
    pub fn create_value<T>(&self, initial: T) -> Value<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let id = self
            .inner
            .session
            .lock()
            .graph
            .insert(Payload::Value { current: Arc::new(initial) });
        trace!(node = %id, "value created");
        Value::from_parts(id, self.weak())
    }

    /// Create a lazy, cached derivation. `body` does not run until the
    /// expression is first read.
    pub fn create_expression<T, F>(&self, body: F) -> Expression<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        let body: ExpressionBody = Arc::new(move || body().map(|value| Arc::new(value) as AnyValue));
        let id = self
            .inner
            .session
            .lock()
            .graph
            .insert(Payload::Expression { body, cached: None });
        trace!(node = %id, "expression created");
        Expression::from_parts(id, self.weak())
    }

    /// Create an observer. It starts invalidated and runs on the next flush.
    pub fn create_observer<F>(&self, priority: i32, body: F) -> Observer
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        let body: ObserverBody = Arc::new(body);
        let id = {
            let mut session = self.inner.session.lock();
            let id = session.graph.insert(Payload::Observer {
                body,
                priority,
                runs: 0,
            });
            session.scheduler.enqueue(id, priority);
            id
        };
        debug!(node = %id, priority, "observer created");
        Observer::from_parts(id, self.weak())
    }

    /// Run invalidated observers until none remain, then release everything
    /// they emitted as a single batch.
    ///
    /// Observer failures are collected in the batch and do not stop the
    /// cycle. Exceeding `max_flush_iterations` poisons the session: pending
    /// outputs are discarded and every later flush fails. A flush requested
    /// from another thread waits for the running one to finish.
    pub fn request_flush(&self) -> Result<FlushBatch> {
        let _exec = self.inner.execution.lock();
        if self.inner.poisoned.load(Ordering::Acquire) {
            return Err(ReactiveError::SessionPoisoned);
        }
        if self.inner.flushing.swap(true, Ordering::AcqRel) {
            return Err(ReactiveError::ReentrantFlush);
        }
        let _guard = FlushGuard(&self.inner);

        let cycle = self.inner.session.lock().scheduler.begin_cycle();
        let span = debug_span!("flush", cycle);
        let _enter = span.enter();

        let limit = self.inner.config.max_flush_iterations;
        let mut observers_run = 0;
        let mut failures = Vec::new();

        loop {
            let next = self.inner.session.lock().next_runnable();
            let Some(id) = next else {
                break;
            };
            if observers_run >= limit {
                let mut session = self.inner.session.lock();
                session.scheduler.clear();
                session.outputs.clear();
                self.inner.poisoned.store(true, Ordering::Release);
                error!(limit, "flush did not reach rest, session poisoned");
                return Err(ReactiveError::UnboundedRecursion { limit });
            }
            observers_run += 1;
            if let Err(error) = self.inner.run_observer(id) {
                warn!(observer = %id, %error, "observer failed, retrying next cycle");
                failures.push(ObserverFailure { observer: id, error });
            }
        }

        let outputs = std::mem::take(&mut self.inner.session.lock().outputs);
        debug!(
            observers_run,
            outputs = outputs.len(),
            failures = failures.len(),
            "flush at rest"
        );
        Ok(FlushBatch {
            cycle,
            outputs,
            failures,
            observers_run,
        })
    }

    /// Queue an output for the current cycle's batch.
    ///
    /// Only valid while an observer is executing. Emitting the same name
    /// twice in one cycle keeps the latest value.
    pub fn emit<V: Serialize>(&self, name: impl Into<String>, value: V) -> Result<()> {
        self.inner.emit(name.into(), serde_json::to_value(value)?)
    }

    /// Run `callback` the next time the currently executing consumer is
    /// invalidated (or its current run is discarded).
    pub fn on_invalidate<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.on_invalidate(Box::new(callback))
    }

    /// Run `f` in a context that allows reads but records no dependencies.
    pub fn isolate<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> Result<R>,
    {
        self.inner.isolate(f)
    }

    /// A handle that does not keep the session alive. Capture this, not a
    /// `Runtime`, in bodies that need to emit.
    pub fn downgrade(&self) -> WeakRuntime {
        WeakRuntime { inner: self.weak() }
    }

    /// The innermost active context, if any body is executing.
    pub fn current_context(&self) -> Option<ExecutionContext> {
        let _exec = self.inner.execution.lock();
        self.inner.session.lock().stack.current().cloned()
    }

    /// State of an expression or observer. `None` for values and unknown IDs.
    pub fn state(&self, id: NodeId) -> Option<NodeState> {
        self.inner.state(id)
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.inner.session.lock().graph.kind(id)
    }

    /// Consumers whose current execution read `id`.
    pub fn dependents(&self, id: NodeId) -> Vec<NodeId> {
        self.inner.session.lock().graph.dependents(id)
    }

    /// Sources read by the current execution of `id`.
    pub fn dependencies(&self, id: NodeId) -> Vec<NodeId> {
        self.inner.session.lock().graph.dependencies(id)
    }

    pub fn node_count(&self) -> usize {
        self.inner.session.lock().graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.session.lock().graph.edge_count()
    }

    /// Queued observer candidates, including ones deferred after failure.
    pub fn pending_observers(&self) -> usize {
        let session = self.inner.session.lock();
        session.scheduler.pending() + session.scheduler.deferred()
    }

    /// Number of flush cycles started so far.
    pub fn cycle(&self) -> u64 {
        self.inner.session.lock().scheduler.cycle()
    }

    pub fn is_flushing(&self) -> bool {
        self.inner.flushing.load(Ordering::Acquire)
    }

    pub fn is_poisoned(&self) -> bool {
        self.inner.poisoned.load(Ordering::Acquire)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-owning handle to a [`Runtime`].
///
/// Every operation fails with [`ReactiveError::SessionClosed`] once the
/// runtime has been dropped.
#[derive(Debug, Clone)]
pub struct WeakRuntime {
    inner: Weak<Inner>,
}

impl WeakRuntime {
    fn inner(&self) -> Result<Arc<Inner>> {
        self.inner.upgrade().ok_or(ReactiveError::SessionClosed)
    }

    pub fn upgrade(&self) -> Option<Runtime> {
        self.inner.upgrade().map(|inner| Runtime { inner })
    }

    pub fn emit<V: Serialize>(&self, name: impl Into<String>, value: V) -> Result<()> {
        self.inner()?.emit(name.into(), serde_json::to_value(value)?)
    }

    pub fn on_invalidate<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner()?.on_invalidate(Box::new(callback))
    }

    pub fn isolate<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> Result<R>,
    {
        self.inner()?.isolate(f)
    }
}

/// Shared plumbing for the typed handles.
#[derive(Debug)]
pub(crate) struct HandleRef<T> {
    pub(crate) id: NodeId,
    runtime: Weak<Inner>,
    _ty: PhantomData<fn() -> T>,
}

impl<T> HandleRef<T> {
    pub(crate) fn new(id: NodeId, runtime: Weak<Inner>) -> Self {
        Self {
            id,
            runtime,
            _ty: PhantomData,
        }
    }

    pub(crate) fn inner(&self) -> Result<Arc<Inner>> {
        self.runtime.upgrade().ok_or(ReactiveError::SessionClosed)
    }
}

impl<T> Clone for HandleRef<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            runtime: Weak::clone(&self.runtime),
            _ty: PhantomData,
        }
    }
}

pub(crate) fn downcast<T: Clone + 'static>(id: NodeId, value: AnyValue) -> Result<T> {
    value
        .downcast_ref::<T>()
        .cloned()
        .ok_or(ReactiveError::TypeMismatch(id))
}
