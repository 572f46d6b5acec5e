//! Pool lifecycle state machine.
//!
//! ```text
//! Initializing -> Stopped -> Starting -> Running -> Stopping -> Stopped
//!                                           \
//!                                            -> Error (evaluation aborted)
//! ```
//!
//! The state sits behind a mutex paired with a condvar so `stop()` can wait
//! for the worker with a bound.

use crate::error::LifecycleError;
use serde::{Deserialize, Serialize};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolState {
    Initializing,
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

#[derive(Debug)]
pub struct Lifecycle {
    state: Mutex<PoolState>,
    changed: Condvar,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PoolState::Initializing),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn state(&self) -> PoolState {
        *self.lock()
    }

    /// Unconditionally moves to `next`.
    pub fn set(&self, next: PoolState) {
        let mut state = self.lock();
        Self::enter(&mut state, next);
        self.changed.notify_all();
    }

    /// Moves `from -> to`, failing if the current state is not `from`.
    pub fn transition(
        &self,
        operation: &'static str,
        from: PoolState,
        to: PoolState,
    ) -> Result<(), LifecycleError> {
        let mut state = self.lock();
        if *state != from {
            return Err(LifecycleError::InvalidTransition {
                operation,
                state: *state,
            });
        }
        Self::enter(&mut state, to);
        self.changed.notify_all();
        Ok(())
    }

    /// Runs `Stopping -> Stopped` from the worker side. A run that ended on its
    /// own passes through `Stopping` first. Any other state is left alone, so a
    /// pool already forced to `Stopped` or restarted is not disturbed.
    pub fn settle_stopped(&self) {
        let mut state = self.lock();
        if *state == PoolState::Running {
            Self::enter(&mut state, PoolState::Stopping);
        }
        if *state == PoolState::Stopping {
            Self::enter(&mut state, PoolState::Stopped);
        }
        self.changed.notify_all();
    }

    /// Blocks while `condition` holds for the current state, up to `timeout`.
    /// Returns false if the wait timed out.
    pub fn wait_while<F>(&self, timeout: Duration, mut condition: F) -> bool
    where
        F: FnMut(PoolState) -> bool,
    {
        let state = self.lock();
        let (_state, result) = self
            .changed
            .wait_timeout_while(state, timeout, |s| condition(*s))
            .unwrap_or_else(PoisonError::into_inner);
        !result.timed_out()
    }

    /// Blocks while the state is `Stopping`, up to `timeout`.
    pub fn wait_stopped(&self, timeout: Duration) -> bool {
        self.wait_while(timeout, |s| s == PoolState::Stopping)
    }

    fn enter(state: &mut PoolState, next: PoolState) {
        if *state != next {
            tracing::debug!(from = ?*state, to = ?next, "Pool state change");
            *state = next;
        }
    }
}
