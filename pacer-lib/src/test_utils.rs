use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

use crate::Execute;

/// A request for the [`MockExecutor`]: sleep for `took`, then succeed with
/// `id`, fail with [`JobFailed`] or panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Job {
    pub(crate) id: usize,
    pub(crate) took: Duration,
    outcome: JobOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    Ok,
    Fail,
    Panic,
}

impl Job {
    pub(crate) const fn ok(id: usize, took: Duration) -> Self {
        Self {
            id,
            took,
            outcome: JobOutcome::Ok,
        }
    }

    pub(crate) const fn failing(id: usize, took: Duration) -> Self {
        Self {
            id,
            took,
            outcome: JobOutcome::Fail,
        }
    }

    pub(crate) const fn panicking(id: usize) -> Self {
        Self {
            id,
            took: Duration::ZERO,
            outcome: JobOutcome::Panic,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Job {0} failed")]
pub(crate) struct JobFailed(pub(crate) usize);

/// Capability double which records how it was called
#[derive(Debug, Default)]
pub(crate) struct MockExecutor {
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    starts: Mutex<Vec<Instant>>,
}

impl MockExecutor {
    /// Number of times the capability was invoked
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at the same time
    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Start times of every call, in start order
    pub(crate) fn starts(&self) -> Vec<Instant> {
        let mut starts = self.starts.lock().unwrap().clone();
        starts.sort();
        starts
    }
}

#[async_trait]
impl Execute for MockExecutor {
    type Request = Job;
    type Response = usize;
    type Error = JobFailed;

    async fn execute(&self, job: Job) -> Result<usize, JobFailed> {
        self.starts.lock().unwrap().push(Instant::now());
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);

        tokio::time::sleep(job.took).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        match job.outcome {
            JobOutcome::Ok => Ok(job.id),
            JobOutcome::Fail => Err(JobFailed(job.id)),
            JobOutcome::Panic => panic!("job {} panicked", job.id),
        }
    }
}

/// Assert that `took` lies within `[expected - 5ms, expected + slack)`.
///
/// Timers never fire early, but the clock used for pacing and
/// [`Instant`] may disagree by a millisecond or two.
pub(crate) fn assert_took(took: Duration, expected: Duration, slack: Duration) {
    let lower = expected.saturating_sub(Duration::from_millis(5));
    assert!(
        took >= lower && took < expected + slack,
        "took {took:?}, expected about {expected:?}"
    );
}
