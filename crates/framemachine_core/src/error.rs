//! Error types for framemachine_core.
//!
//! Construction failures are fatal to the call that raised them; lifecycle
//! failures are recoverable by inspecting the pool state and retrying.

use crate::lifecycle::PoolState;
use framemachine_data::FrameLengthError;
use std::time::Duration;
use thiserror::Error;

/// Raised while building a machine or a pool. No partial object is produced.
#[derive(Error, Debug)]
pub enum ConstructionError {
    /// A required pool component was never supplied.
    #[error("Missing pool component: {0}")]
    MissingComponent(&'static str),

    /// A code frame of the wrong length.
    #[error("Invalid code frame: {0}")]
    FrameLength(#[from] FrameLengthError),

    /// Configuration rejected by validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The evaluation thread pool could not be created.
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

/// Raised by lifecycle operations called from the wrong state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Cannot {operation} while {state:?}")]
    InvalidTransition {
        operation: &'static str,
        state: PoolState,
    },

    /// A worker from an earlier run has not exited yet.
    #[error("Previous worker is still running")]
    WorkerBusy,

    #[error("Pool has been shut down")]
    Disposed,
}

/// Main error type for pool operations.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The worker did not exit in time; the pool was forced to `Stopped`.
    #[error("Worker did not stop within {timeout:?}")]
    StopTimeout { timeout: Duration },

    /// The worker thread could not be spawned.
    #[error("Failed to spawn worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Result type alias for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;

impl ConstructionError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl PoolError {
    /// True for errors raised because the pool was in the wrong state.
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Lifecycle(_))
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
