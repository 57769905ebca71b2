//! Fixed-size pool of workers sharing one task queue and one admission gate.
//!
//! Each worker loops: take the next [`CallTask`] from the queue, wait for a
//! permit from the [`AdmissionGate`], run the task, repeat. Enqueueing never
//! waits; only the *start* of an execution is throttled.
use std::fmt::Debug;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use log::{debug, error, trace, warn};
use tokio::sync::{Mutex as AsyncMutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{AdmissionGate, BuildError, Execute};

type Reply<X> = Result<<X as Execute>::Response, <X as Execute>::Error>;
type Queue<X> = Arc<AsyncMutex<mpsc::UnboundedReceiver<CallTask<X>>>>;

/// One unit of submitted work: a request plus the cell its result is
/// written to.
///
/// Exactly one component owns a task at any time: the submitter, then the
/// queue, then the worker executing it.
pub struct CallTask<X: Execute> {
    request: X::Request,
    reply: oneshot::Sender<Reply<X>>,
}

impl<X: Execute> CallTask<X> {
    /// Create a task for `request` together with the receiving end of its
    /// result cell.
    ///
    /// The receiver resolves once the task has run, or fails if the task is
    /// dropped without running.
    #[must_use]
    pub fn new(request: X::Request) -> (Self, oneshot::Receiver<Reply<X>>) {
        let (reply, result) = oneshot::channel();
        (Self { request, reply }, result)
    }

    async fn run(self, executor: &X) {
        let result = executor.execute(self.request).await;
        if self.reply.send(result).is_err() {
            trace!("Submitter went away before the result was delivered");
        }
    }
}

impl<X: Execute> Debug for CallTask<X> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallTask").finish_non_exhaustive()
    }
}

/// A fixed number of long-lived workers pulling from one FIFO queue.
///
/// The number of workers is the only concurrency bound: at most that many
/// tasks are executing at any instant. The pool is never resized.
pub struct WorkerPool<X: Execute> {
    /// `None` once the pool stopped accepting tasks
    queue: Mutex<Option<mpsc::UnboundedSender<CallTask<X>>>>,
    workers: AsyncMutex<Vec<JoinHandle<()>>>,
    count: NonZeroUsize,
}

impl<X: Execute> WorkerPool<X> {
    /// Spawn `count` workers on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::NoWorkers`] if `count` is zero.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn new(
        count: usize,
        gate: Arc<AdmissionGate>,
        executor: Arc<X>,
    ) -> Result<Self, BuildError> {
        let count = NonZeroUsize::new(count).ok_or(BuildError::NoWorkers)?;
        Ok(Self::with_workers(count, gate, executor))
    }

    /// Spawn `count` workers on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    #[must_use]
    pub fn with_workers(count: NonZeroUsize, gate: Arc<AdmissionGate>, executor: Arc<X>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue: Queue<X> = Arc::new(AsyncMutex::new(rx));

        let workers = (0..count.get())
            .map(|id| {
                tokio::spawn(work(
                    id,
                    Arc::clone(&queue),
                    Arc::clone(&gate),
                    Arc::clone(&executor),
                ))
            })
            .collect();
        debug!("Started worker pool with {count} worker(s)");

        WorkerPool {
            queue: Mutex::new(Some(tx)),
            workers: AsyncMutex::new(workers),
            count,
        }
    }

    /// Number of workers in the pool
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.count.get()
    }

    /// Enqueue a task. Never waits.
    ///
    /// # Errors
    ///
    /// Hands the task back if the pool no longer accepts tasks.
    pub fn submit(&self, task: CallTask<X>) -> Result<(), CallTask<X>> {
        let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        match queue.as_ref() {
            Some(tx) => tx.send(task).map_err(|rejected| rejected.0),
            None => Err(task),
        }
    }

    /// Returns `true` once [`WorkerPool::stop_wait`] has been called
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Stop accepting tasks and wait until every queued or running task has
    /// finished and all workers have exited. Nothing is aborted.
    ///
    /// Calling this again after the pool has stopped returns immediately.
    pub async fn stop_wait(&self) {
        let sender = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        // Workers exit once the last sender is gone and the queue is drained
        drop(sender);

        let workers = std::mem::take(&mut *self.workers.lock().await);
        if workers.is_empty() {
            return;
        }
        debug!("Waiting for {} worker(s) to drain the queue", workers.len());
        for worker in workers {
            if let Err(e) = worker.await {
                error!("Worker terminated abnormally: {e}");
            }
        }
        debug!("Worker pool stopped");
    }
}

impl<X: Execute> Debug for WorkerPool<X> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.count)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

async fn work<X: Execute>(id: usize, queue: Queue<X>, gate: Arc<AdmissionGate>, executor: Arc<X>) {
    trace!("Worker {id} started");
    loop {
        // The lock is held only while waiting for the next task
        let next = queue.lock().await.recv().await;
        let Some(task) = next else {
            break;
        };

        if gate.acquire().await.is_err() {
            warn!("Worker {id} dropped a task: admission gate closed");
            break;
        }

        trace!("Worker {id} starting task");
        if AssertUnwindSafe(task.run(&executor)).catch_unwind().await.is_err() {
            error!("Worker {id}: task panicked, its result is lost");
        }
    }
    trace!("Worker {id} exited");
}
