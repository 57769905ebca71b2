//! Accepting → Draining → Closed state machine.
//!
//! Submissions hold a shared guard for as long as they decide whether to
//! enqueue *and* wait for their results. Shutdown needs the exclusive guard,
//! so it can only flip the state once every admitted submission has finished.
//! Shutdown raises a flag before it queues for the exclusive guard; any
//! submission not yet admitted is refused as soon as it sees the flag.
use std::future::Future;

use tokio::sync::{RwLock, RwLockReadGuard, watch};

use crate::State;

/// Proof that a submission was admitted; shutdown cannot complete while any
/// of these are alive.
pub(crate) type Admission<'a> = RwLockReadGuard<'a, State>;

#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: RwLock<State>,
    /// Set as soon as shutdown is requested, so new submissions are refused
    /// without queueing behind the pending shutdown
    shutdown_requested: watch::Sender<bool>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: RwLock::new(State::Accepting),
            shutdown_requested: watch::Sender::new(false),
        }
    }

    /// Admit a submission, or `None` if the dispatcher left `Accepting`.
    ///
    /// A submission waiting for the shared guard gives up as soon as
    /// shutdown is requested instead of waiting out the drain.
    pub(crate) async fn admit(&self) -> Option<Admission<'_>> {
        let mut requested = self.shutdown_requested.subscribe();
        if *requested.borrow_and_update() {
            return None;
        }

        tokio::select! {
            biased;
            _ = requested.wait_for(|requested| *requested) => None,
            state = self.state.read() => state.is_accepting().then_some(state),
        }
    }

    pub(crate) fn state(&self) -> State {
        if !*self.shutdown_requested.borrow() {
            return State::Accepting;
        }
        match self.state.try_read() {
            Ok(state) if *state == State::Closed => State::Closed,
            _ => State::Draining,
        }
    }

    /// Run the shutdown protocol, with `drain` releasing all resources.
    ///
    /// Returns `false` if the lifecycle was already closed, in which case
    /// `drain` is not polled.
    pub(crate) async fn shut_down<F>(&self, drain: F) -> bool
    where
        F: Future<Output = ()>,
    {
        self.shutdown_requested.send_replace(true);

        let mut state = self.state.write().await;
        if *state == State::Closed {
            return false;
        }
        *state = State::Draining;
        drain.await;
        *state = State::Closed;
        true
    }
}
