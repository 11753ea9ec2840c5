//! Flush Scheduler
//!
//! The scheduler holds the observers waiting to run and decides which one
//! goes next. The loop that actually runs them lives in the runtime, because
//! running a body needs the context stack and must not hold the graph.
//!
//! # Ordering
//!
//! Higher priority runs first. Among equal priorities the order is
//! unspecified: callers must treat observers of one priority as an unordered
//! set.
//!
//! # Failures
//!
//! An observer whose body fails is deferred rather than re-queued. Deferred
//! observers become eligible again when the next cycle begins, which keeps a
//! deterministic failure from spinning inside a single flush.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use indexmap::IndexMap;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use super::node::NodeId;
use crate::error::ReactiveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pending {
    priority: i32,
    seq: u64,
    node: NodeId,
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of invalidated observers.
#[derive(Debug, Default)]
pub struct FlushScheduler {
    queue: BinaryHeap<Pending>,
    deferred: Vec<(NodeId, i32)>,
    seq: u64,
    cycle: u64,
}

impl FlushScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an observer for execution in the current or next cycle.
    pub fn enqueue(&mut self, node: NodeId, priority: i32) {
        self.seq += 1;
        self.queue.push(Pending {
            priority,
            seq: self.seq,
            node,
        });
    }

    /// Take the highest-priority candidate.
    ///
    /// Entries are not deduplicated here; the runtime skips candidates that
    /// are no longer invalidated observers.
    pub fn pop(&mut self) -> Option<NodeId> {
        self.queue.pop().map(|pending| pending.node)
    }

    /// Hold back a failed observer until the next cycle.
    pub fn defer(&mut self, node: NodeId, priority: i32) {
        self.deferred.push((node, priority));
    }

    /// Start a new cycle: deferred observers become eligible again.
    pub fn begin_cycle(&mut self) -> u64 {
        self.cycle += 1;
        for (node, priority) in std::mem::take(&mut self.deferred) {
            self.enqueue(node, priority);
        }
        self.cycle
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Number of queued candidates, including ones that may be skipped.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn deferred(&self) -> usize {
        self.deferred.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop everything. Used when the session is poisoned.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.deferred.clear();
    }
}

/// An observer that failed during a flush cycle.
#[derive(Debug)]
pub struct ObserverFailure {
    pub observer: NodeId,
    pub error: ReactiveError,
}

impl Serialize for ObserverFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ObserverFailure", 2)?;
        state.serialize_field("observer", &self.observer.to_string())?;
        state.serialize_field("error", &self.error.root_cause().to_string())?;
        state.end()
    }
}

/// Everything one flush cycle released to the host, delivered at once.
#[derive(Debug, Default, Serialize)]
pub struct FlushBatch {
    /// Sequence number of the cycle that produced this batch.
    pub cycle: u64,

    /// Outputs emitted by observers, in first-emission order. A later
    /// emission under the same name replaces the earlier value.
    pub outputs: IndexMap<String, serde_json::Value>,

    /// Observers whose bodies failed during the cycle.
    pub failures: Vec<ObserverFailure>,

    /// How many observer executions the cycle performed.
    pub observers_run: usize,
}

impl FlushBatch {
    /// True if the cycle produced nothing for the host.
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty() && self.failures.is_empty()
    }

    pub fn output(&self, name: &str) -> Option<&serde_json::Value> {
        self.outputs.get(name)
    }
}
