//! Bounded task queue shared by the worker pool
//!
//! This module handles:
//! - A bounded channel of capacity N consumed by N workers
//! - Non-blocking submission with a spawned fallback when the channel is full
//! - Counting outstanding (queued + running) tasks
//! - Closing the channel once the count reaches zero, which stops the workers

use crate::crawler::task::ResourceTask;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

/// Work queue with completion tracking
///
/// Every submitted task must eventually be matched by exactly one
/// [`task_done`](TaskQueue::task_done) call, whether it was processed,
/// skipped or discarded.
pub struct TaskQueue {
    sender: Mutex<Option<mpsc::Sender<ResourceTask>>>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<ResourceTask>>,
    pending: AtomicUsize,
    cancel: CancellationToken,
}

impl TaskQueue {
    /// Creates a queue holding at most `capacity` buffered tasks
    pub fn new(capacity: usize, cancel: CancellationToken) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Arc::new(Self {
            sender: Mutex::new(Some(tx)),
            receiver: tokio::sync::Mutex::new(rx),
            pending: AtomicUsize::new(0),
            cancel,
        })
    }

    /// Enqueues a task without ever blocking the caller
    ///
    /// If the channel is full, a helper task waits for room or for
    /// cancellation, whichever comes first.
    pub fn submit(self: &Arc<Self>, task: ResourceTask) {
        self.pending.fetch_add(1, Ordering::SeqCst);

        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let Some(sender) = sender else {
            tracing::debug!("Queue already closed, dropping {}", task.url());
            self.task_done();
            return;
        };

        match sender.try_send(task) {
            Ok(()) => {}
            Err(TrySendError::Full(task)) => {
                let queue = Arc::clone(self);
                tokio::spawn(async move {
                    tokio::select! {
                        result = sender.send(task) => {
                            if result.is_err() {
                                queue.task_done();
                            }
                        }
                        _ = queue.cancel.cancelled() => queue.task_done(),
                    }
                });
            }
            Err(TrySendError::Closed(task)) => {
                tracing::debug!("Queue closed, dropping {}", task.url());
                self.task_done();
            }
        }
    }

    /// Waits for the next task; `None` once the queue is closed and drained
    pub async fn next(&self) -> Option<ResourceTask> {
        let mut receiver = self.receiver.lock().await;
        receiver.recv().await
    }

    /// Marks one task as finished, closing the queue when none remain
    pub fn task_done(&self) {
        let previous = self.pending.fetch_sub(1, Ordering::SeqCst);
        if previous == 1 {
            tracing::debug!("All tasks finished, closing queue");
            self.close();
        }
    }

    /// Closes the queue; workers exit once it is drained
    pub fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }

    /// Number of queued plus running tasks
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
