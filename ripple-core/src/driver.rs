//! Flush Driver
//!
//! The engine never decides when to flush; the host does. This module is a
//! small host-side helper that owns a [`Runtime`] inside a tokio task and
//! flushes it whenever asked, delivering each batch over a channel.
//!
//! Requests that arrive while a flush is running are coalesced into one
//! follow-up flush. Flushes run on the blocking pool because observer bodies
//! are ordinary synchronous code.
//!
//! The driver stops when it is shut down, when the batch receiver is gone,
//! or when the session is poisoned.

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, warn};

use crate::graph::FlushBatch;
use crate::reactive::Runtime;

/// Handle to a running flush task.
#[derive(Debug)]
pub struct FlushDriver {
    trigger: mpsc::UnboundedSender<()>,
    batches: mpsc::UnboundedReceiver<FlushBatch>,
    task: JoinHandle<()>,
}

impl FlushDriver {
    /// Spawn the flush task on the current tokio runtime.
    pub fn spawn(runtime: Runtime) -> Self {
        let (trigger, trigger_rx) = mpsc::unbounded_channel();
        let (batch_tx, batches) = mpsc::unbounded_channel();
        let task = tokio::spawn(flush_loop(runtime, trigger_rx, batch_tx));
        Self {
            trigger,
            batches,
            task,
        }
    }

    /// Ask for a flush. Returns false if the driver has stopped.
    pub fn request(&self) -> bool {
        self.trigger.send(()).is_ok()
    }

    /// Wait for the next delivered batch. `None` once the driver stopped.
    pub async fn next_batch(&mut self) -> Option<FlushBatch> {
        self.batches.recv().await
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop accepting requests and wait for the task to end.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        let Self { trigger, task, .. } = self;
        drop(trigger);
        task.await
    }
}

async fn flush_loop(
    runtime: Runtime,
    mut requests: mpsc::UnboundedReceiver<()>,
    batches: mpsc::UnboundedSender<FlushBatch>,
) {
    while requests.recv().await.is_some() {
        let mut coalesced = 0;
        while requests.try_recv().is_ok() {
            coalesced += 1;
        }

        let rt = runtime.clone();
        match tokio::task::spawn_blocking(move || rt.request_flush()).await {
            Ok(Ok(batch)) => {
                debug!(cycle = batch.cycle, coalesced, "delivering batch");
                if batches.send(batch).is_err() {
                    break;
                }
            }
            Ok(Err(err)) if err.is_fatal() => {
                error!(%err, "stopping flush driver");
                break;
            }
            Ok(Err(err)) => warn!(%err, "flush rejected"),
            Err(join) => warn!(%join, "flush panicked"),
        }
    }
    // Refuse new requests before the batch channel closes.
    drop(requests);
    debug!("flush driver stopped");
}
