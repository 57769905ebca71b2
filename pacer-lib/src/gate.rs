//! Pool-wide admission control.
//!
//! The [`AdmissionGate`] decides *when* a worker may start executing a task.
//! It issues one permit per configured interval no matter how many workers
//! are waiting. Adding workers raises how much can run at once, never how
//! fast new executions start.
use std::num::NonZeroU32;
use std::time::Duration;

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use log::{debug, trace};
use thiserror::Error;
use tokio::sync::{Semaphore, watch};

/// Returned by [`AdmissionGate::acquire`] once the gate has been closed
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Admission gate was closed while waiting for a permit")]
pub struct GateClosed;

/// A single-permit token source refilled once per interval.
///
/// - Without an interval (or with a zero interval) the gate is open:
///   [`AdmissionGate::acquire`] returns immediately, always.
/// - With an interval `d`, the first permit is issued immediately and each
///   following permit at least `d` after the previous one.
///   Concurrent waiters are served one at a time, in the order they arrived.
#[derive(Debug)]
pub struct AdmissionGate {
    /// Token bucket with a burst of one, `None` if unthrottled
    limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,

    interval: Option<Duration>,

    /// Fair single permit; only its holder may wait on the limiter
    turn: Semaphore,

    closed: watch::Sender<bool>,
}

impl AdmissionGate {
    /// Create a gate issuing at most one permit per `interval`
    #[must_use]
    pub fn new(interval: Option<Duration>) -> Self {
        let interval = interval.filter(|interval| !interval.is_zero());
        let limiter = interval
            .and_then(Quota::with_period)
            .map(|quota| RateLimiter::direct(quota.allow_burst(NonZeroU32::MIN)));
        let (closed, _) = watch::channel(false);

        AdmissionGate {
            limiter,
            interval,
            turn: Semaphore::new(1),
            closed,
        }
    }

    /// Create a gate which never throttles
    #[must_use]
    pub fn unthrottled() -> Self {
        Self::new(None)
    }

    /// Minimum time between two permits, `None` if unthrottled
    #[must_use]
    pub const fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Wait until the caller may start one execution.
    ///
    /// # Errors
    ///
    /// Returns [`GateClosed`] if the gate is throttled and gets closed before
    /// a permit could be issued. An unthrottled gate never fails.
    pub async fn acquire(&self) -> Result<(), GateClosed> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };

        let mut closed = self.closed.subscribe();
        let _turn = self.turn.acquire().await.map_err(|_| GateClosed)?;

        tokio::select! {
            biased;
            () = wait_closed(&mut closed) => Err(GateClosed),
            () = limiter.until_ready() => {
                trace!("Admission gate issued a permit");
                Ok(())
            }
        }
    }

    /// Close the gate, waking every waiter with [`GateClosed`].
    /// Closing an already closed gate has no effect.
    pub fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }
        self.turn.close();
        debug!("Admission gate closed");
    }

    /// Returns `true` once [`AdmissionGate::close`] has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::unthrottled()
    }
}

async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    loop {
        let is_closed = *closed.borrow_and_update();
        if is_closed || closed.changed().await.is_err() {
            return;
        }
    }
}
