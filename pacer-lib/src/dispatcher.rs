//! The public submit/collect surface.
//!
//! This module defines two structs, [`Dispatcher`] and [`DispatcherBuilder`].
//! `Dispatcher` accepts single requests ([`Dispatcher::call`]) and batches
//! ([`Dispatcher::call_batch`]) and owns the worker pool, the admission gate
//! and the lifecycle. `DispatcherBuilder` configures worker count and
//! interval.
#![allow(clippy::module_name_repetitions)]
use std::fmt::Debug;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{debug, info};
use tokio::sync::oneshot;
use typed_builder::TypedBuilder;

use crate::lifecycle::Lifecycle;
use crate::pool::{CallTask, WorkerPool};
use crate::{AdmissionGate, BuildError, ErrorKind, Execute, Outcome, State};

/// Default number of workers, 1.
pub const DEFAULT_WORKERS: usize = 1;

/// Builder for [`Dispatcher`].
///
/// ```
/// use std::time::Duration;
/// use pacer_lib::DispatcherBuilder;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), pacer_lib::BuildError> {
/// let dispatcher = DispatcherBuilder::builder()
///     .workers(4)
///     .interval(Duration::from_millis(50))
///     .build()
///     .dispatcher(reqwest::Client::new())?;
/// assert_eq!(dispatcher.workers(), 4);
/// # Ok(())
/// # }
/// ```
#[derive(TypedBuilder, Debug, Clone, Copy, PartialEq, Eq)]
#[builder(builder_method(doc = "
Create a builder for building `DispatcherBuilder`.

On the builder call, call methods with same name as its fields to set their values.

Finally, call `.build()` to create the instance of `DispatcherBuilder`.
"))]
pub struct DispatcherBuilder {
    /// Number of workers, i.e. the maximum number of calls executing at the
    /// same time. Must be at least one.
    #[builder(default = DEFAULT_WORKERS)]
    workers: usize,

    /// Minimum time between the starts of two calls, across all workers.
    ///
    /// `None` or a zero duration disables throttling.
    #[builder(default, setter(into))]
    interval: Option<Duration>,
}

impl Default for DispatcherBuilder {
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DispatcherBuilder {
    /// Instantiates a [`Dispatcher`] executing calls through `executor`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::NoWorkers`] if the worker count is zero.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn dispatcher<X: Execute>(self, executor: X) -> Result<Dispatcher<X>, BuildError> {
        let workers = NonZeroUsize::new(self.workers).ok_or(BuildError::NoWorkers)?;
        Ok(Dispatcher::with_config(workers, self.interval, executor))
    }
}

/// Bounded-concurrency, rate-limited dispatcher for calls through an
/// [`Execute`] capability.
///
/// - At most `workers` calls run at the same time.
/// - Two call starts are at least `interval` apart, pool-wide.
/// - After [`Dispatcher::shutdown`] has begun, every submission fails with
///   [`ErrorKind::Rejected`].
///
/// See [`DispatcherBuilder`] for configuration.
pub struct Dispatcher<X: Execute> {
    pool: WorkerPool<X>,
    gate: Arc<AdmissionGate>,
    lifecycle: Lifecycle,
}

impl<X: Execute> Dispatcher<X> {
    /// Create a dispatcher with one worker and no throttling.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    #[must_use]
    pub fn new(executor: X) -> Self {
        Self::with_config(NonZeroUsize::MIN, None, executor)
    }

    fn with_config(workers: NonZeroUsize, interval: Option<Duration>, executor: X) -> Self {
        let gate = Arc::new(AdmissionGate::new(interval));
        let pool = WorkerPool::with_workers(workers, Arc::clone(&gate), Arc::new(executor));
        Dispatcher {
            pool,
            gate,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Send a single request and wait for its result.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::Rejected`] if shutdown has begun; nothing is executed
    /// - [`ErrorKind::Execution`] with the capability's own error
    /// - [`ErrorKind::Cancelled`] if the task was dropped before running
    pub async fn call(&self, request: X::Request) -> Outcome<X::Response, X::Error> {
        let Some(_admission) = self.lifecycle.admit().await else {
            debug!("Rejected request, dispatcher is {}", self.state());
            return Err(ErrorKind::Rejected);
        };

        let (task, result) = CallTask::new(request);
        self.pool.submit(task).map_err(|_| ErrorKind::Rejected)?;
        settle(result.await)
    }

    /// Send many requests and wait until all of them have finished.
    ///
    /// The returned vector holds one [`Outcome`] per request, in input order,
    /// regardless of the order in which the calls completed. A failing call
    /// only affects its own slot.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Rejected`] if shutdown has begun; no request of
    /// the batch is executed in that case.
    pub async fn call_batch<I>(
        &self,
        requests: I,
    ) -> Result<Vec<Outcome<X::Response, X::Error>>, ErrorKind<X::Error>>
    where
        I: IntoIterator<Item = X::Request>,
    {
        let Some(_admission) = self.lifecycle.admit().await else {
            debug!("Rejected batch, dispatcher is {}", self.state());
            return Err(ErrorKind::Rejected);
        };

        let mut slots = Vec::new();
        for request in requests {
            let (task, slot) = CallTask::new(request);
            self.pool.submit(task).map_err(|_| ErrorKind::Rejected)?;
            slots.push(slot);
        }
        debug!("Submitted batch of {} request(s)", slots.len());

        Ok(join_all(slots).await.into_iter().map(settle).collect())
    }

    /// Stop accepting requests, wait for all admitted work to finish, then
    /// release the workers and the admission gate.
    ///
    /// Running calls are never aborted. Calling this again waits for the
    /// first shutdown to complete and then returns without effect.
    pub async fn shutdown(&self) {
        info!("Shutting down dispatcher");
        let closed = self
            .lifecycle
            .shut_down(async {
                self.pool.stop_wait().await;
                self.gate.close();
            })
            .await;

        if closed {
            info!("Dispatcher closed");
        } else {
            debug!("Dispatcher was already closed");
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> State {
        self.lifecycle.state()
    }

    /// Number of workers, i.e. the concurrency ceiling
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.pool.workers()
    }

    /// Minimum time between two call starts, `None` if unthrottled
    #[must_use]
    pub fn interval(&self) -> Option<Duration> {
        self.gate.interval()
    }
}

impl<X: Execute> Debug for Dispatcher<X> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("workers", &self.workers())
            .field("interval", &self.interval())
            .field("state", &self.state())
            .finish()
    }
}

fn settle<T, E>(
    result: Result<Result<T, E>, oneshot::error::RecvError>,
) -> Outcome<T, E> {
    match result {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(e)) => Err(ErrorKind::Execution(e)),
        Err(_) => Err(ErrorKind::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_utils::{Job, JobFailed, MockExecutor, assert_took};

    const SLACK: Duration = Duration::from_millis(60);

    fn dispatcher(
        workers: usize,
        interval: Option<Duration>,
    ) -> (Arc<Dispatcher<Arc<MockExecutor>>>, Arc<MockExecutor>) {
        let executor = Arc::new(MockExecutor::default());
        let dispatcher = DispatcherBuilder::builder()
            .workers(workers)
            .interval(interval)
            .build()
            .dispatcher(Arc::clone(&executor))
            .unwrap();
        (Arc::new(dispatcher), executor)
    }

    /// Run `count` concurrent `call`s of `took` each and return the elapsed time
    async fn concurrent_calls(
        dispatcher: &Arc<Dispatcher<Arc<MockExecutor>>>,
        count: usize,
        took: Duration,
    ) -> Duration {
        let start = Instant::now();
        let calls: Vec<_> = (0..count)
            .map(|id| {
                let dispatcher = Arc::clone(dispatcher);
                tokio::spawn(async move { dispatcher.call(Job::ok(id, took)).await })
            })
            .collect();
        for (id, call) in calls.into_iter().enumerate() {
            assert_eq!(call.await.unwrap().unwrap(), id);
        }
        start.elapsed()
    }

    #[test]
    fn test_builder_defaults() {
        let builder = DispatcherBuilder::default();
        assert_eq!(builder, DispatcherBuilder::builder().workers(1).build());
    }

    #[tokio::test]
    async fn test_zero_workers_is_a_build_error() {
        let result = DispatcherBuilder::builder()
            .workers(0)
            .build()
            .dispatcher(MockExecutor::default());
        assert_eq!(result.err(), Some(BuildError::NoWorkers));
    }

    #[tokio::test]
    async fn test_configuration_is_reported() {
        let (dispatcher, _) = dispatcher(3, Some(Duration::from_millis(50)));
        assert_eq!(dispatcher.workers(), 3);
        assert_eq!(dispatcher.interval(), Some(Duration::from_millis(50)));
        assert_eq!(dispatcher.state(), State::Accepting);

        let plain = Dispatcher::new(MockExecutor::default());
        assert_eq!(plain.workers(), 1);
        assert_eq!(plain.interval(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_call_one_worker() {
        let (dispatcher, _) = dispatcher(1, None);
        let start = Instant::now();
        let response = dispatcher.call(Job::ok(0, Duration::from_millis(100))).await;
        dispatcher.shutdown().await;

        assert_eq!(response.unwrap(), 0);
        assert_took(start.elapsed(), Duration::from_millis(100), SLACK);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_three_calls_one_worker_run_sequentially() {
        let (dispatcher, _) = dispatcher(1, None);
        let took = concurrent_calls(&dispatcher, 3, Duration::from_millis(100)).await;
        assert_took(took, Duration::from_millis(300), SLACK);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_three_calls_three_workers_run_in_parallel() {
        let (dispatcher, executor) = dispatcher(3, None);
        let took = concurrent_calls(&dispatcher, 3, Duration::from_millis(100)).await;
        assert_took(took, Duration::from_millis(100), SLACK);
        assert_eq!(executor.peak(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_three_calls_three_workers_paced() {
        // Starts at 0, 50 and 100ms, each running 100ms
        let (dispatcher, _) = dispatcher(3, Some(Duration::from_millis(50)));
        let took = concurrent_calls(&dispatcher, 3, Duration::from_millis(100)).await;
        assert_took(took, Duration::from_millis(200), SLACK);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_batch_timing() {
        let (dispatcher, _) = dispatcher(3, None);
        let start = Instant::now();
        let jobs = (0..3).map(|id| Job::ok(id, Duration::from_millis(100)));
        let slots = dispatcher.call_batch(jobs).await.unwrap();
        assert_took(start.elapsed(), Duration::from_millis(100), SLACK);
        assert_eq!(slots.len(), 3);

        let (dispatcher, _) = self::dispatcher(1, None);
        let start = Instant::now();
        let jobs = (0..3).map(|id| Job::ok(id, Duration::from_millis(100)));
        dispatcher.call_batch(jobs).await.unwrap();
        assert_took(start.elapsed(), Duration::from_millis(300), SLACK);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_batch_preserves_input_order() {
        let (dispatcher, _) = dispatcher(4, None);
        // Later jobs finish first
        let jobs = [120, 80, 40, 0]
            .into_iter()
            .enumerate()
            .map(|(id, ms)| Job::ok(id, Duration::from_millis(ms)));

        let slots = dispatcher.call_batch(jobs).await.unwrap();
        let ids: Vec<_> = slots.into_iter().map(Result::unwrap).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_batch_failures_stay_in_their_slot() {
        let (dispatcher, _) = dispatcher(2, None);
        let jobs = vec![
            Job::ok(0, Duration::from_millis(10)),
            Job::failing(1, Duration::from_millis(5)),
            Job::ok(2, Duration::ZERO),
        ];

        let mut slots = dispatcher.call_batch(jobs).await.unwrap().into_iter();
        assert_eq!(slots.next().unwrap().unwrap(), 0);
        assert_eq!(
            slots.next().unwrap().unwrap_err().into_execution_error(),
            Some(JobFailed(1))
        );
        assert_eq!(slots.next().unwrap().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let (dispatcher, executor) = dispatcher(2, None);
        let slots = dispatcher.call_batch(Vec::new()).await.unwrap();
        assert!(slots.is_empty());
        assert_eq!(executor.calls(), 0);
    }

    #[tokio::test]
    async fn test_execution_error_passed_through() {
        let (dispatcher, _) = dispatcher(1, None);
        let err = dispatcher
            .call(Job::failing(9, Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, ErrorKind::Execution(JobFailed(9))));

        // The failure does not affect the next call
        assert_eq!(dispatcher.call(Job::ok(10, Duration::ZERO)).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_repeated_requests_are_independent() {
        let (dispatcher, executor) = dispatcher(2, None);
        let job = Job::ok(5, Duration::from_millis(10));

        let (first, second) = tokio::join!(dispatcher.call(job), dispatcher.call(job));
        assert_eq!(first.unwrap(), 5);
        assert_eq!(second.unwrap(), 5);
        assert_eq!(executor.calls(), 2);
        assert_eq!(dispatcher.state(), State::Accepting);
    }

    #[tokio::test]
    async fn test_submissions_rejected_after_shutdown() {
        let (dispatcher, executor) = dispatcher(3, Some(Duration::from_millis(50)));
        let jobs = (0..3).map(|id| Job::ok(id, Duration::from_millis(10)));
        dispatcher.call_batch(jobs).await.unwrap();
        dispatcher.shutdown().await;
        assert_eq!(dispatcher.state(), State::Closed);

        let start = Instant::now();
        let single = dispatcher.call(Job::ok(3, Duration::ZERO)).await;
        let batch = dispatcher
            .call_batch([Job::ok(4, Duration::ZERO), Job::ok(5, Duration::ZERO)])
            .await;

        assert!(start.elapsed() < Duration::from_millis(10));
        assert!(single.unwrap_err().is_rejected());
        assert!(batch.unwrap_err().is_rejected());
        assert_eq!(executor.calls(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shutdown_waits_for_in_flight_call() {
        let (dispatcher, _) = dispatcher(1, None);
        let start = Instant::now();

        let in_flight = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            async move {
                let result = dispatcher.call(Job::ok(0, Duration::from_millis(100))).await;
                (result, start.elapsed())
            }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        dispatcher.shutdown().await;
        let shutdown_took = start.elapsed();

        let (result, call_took) = in_flight.await.unwrap();
        assert_eq!(result.unwrap(), 0);
        assert!(shutdown_took >= call_took, "{shutdown_took:?} < {call_took:?}");
        assert_took(shutdown_took, Duration::from_millis(100), SLACK);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shutdown_before_last_request() {
        // Two paced calls are in flight: they start at 0 and 50ms and take
        // 100ms each, so shutdown returns after about 150ms. A call made
        // after shutdown fails.
        let (dispatcher, executor) = dispatcher(3, Some(Duration::from_millis(50)));
        let start = Instant::now();

        let calls: Vec<_> = (0..2)
            .map(|id| {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    dispatcher.call(Job::ok(id, Duration::from_millis(100))).await
                })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(10)).await;
        dispatcher.shutdown().await;
        let late = dispatcher.call(Job::ok(2, Duration::ZERO)).await;

        assert_took(start.elapsed(), Duration::from_millis(150), SLACK);
        assert!(late.unwrap_err().is_rejected());
        for call in calls {
            call.await.unwrap().unwrap();
        }
        assert_eq!(executor.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_state_is_draining_during_shutdown() {
        let (dispatcher, _) = dispatcher(1, None);

        let in_flight = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            async move { dispatcher.call(Job::ok(0, Duration::from_millis(100))).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let shutdown = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            async move { dispatcher.shutdown().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(dispatcher.state(), State::Draining);
        assert!(
            dispatcher
                .call(Job::ok(1, Duration::ZERO))
                .await
                .unwrap_err()
                .is_rejected()
        );

        shutdown.await.unwrap();
        assert_eq!(in_flight.await.unwrap().unwrap(), 0);
        assert_eq!(dispatcher.state(), State::Closed);
    }

    #[tokio::test]
    async fn test_shutdown_twice() {
        let (dispatcher, _) = dispatcher(2, None);
        dispatcher.shutdown().await;
        dispatcher.shutdown().await;
        assert_eq!(dispatcher.state(), State::Closed);
    }

    #[tokio::test]
    async fn test_shutdown_closes_gate() {
        let (dispatcher, _) = dispatcher(1, Some(Duration::from_millis(10)));
        dispatcher.shutdown().await;
        assert!(dispatcher.gate.is_closed());
        assert!(dispatcher.pool.is_stopped());
    }

    #[tokio::test]
    async fn test_panicking_call_is_cancelled() {
        let (dispatcher, _) = dispatcher(1, None);
        let err = dispatcher.call(Job::panicking(0)).await.unwrap_err();
        assert!(matches!(err, ErrorKind::Cancelled));
        assert_eq!(dispatcher.call(Job::ok(1, Duration::ZERO)).await.unwrap(), 1);
    }
}
