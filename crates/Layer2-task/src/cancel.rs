//! Cooperative cancellation
//!
//! The controller owns exactly one [`CancellationHandle`] at a time and
//! replaces it before each run. Work functions only ever see the handle's
//! `CancellationToken`, so a stale token cannot reach a later run.

use std::sync::atomic::{AtomicBool, Ordering};
use taskwrap_foundation::{Error, Result};
use thiserror::Error as ThisError;
use tokio_util::sync::CancellationToken;

/// Signal a work function raises to unwind after cancellation
#[derive(ThisError, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[error("operation was cancelled")]
pub struct OperationCancelled;

/// `Err(OperationCancelled)` once the token has been cancelled
pub fn check_cancelled(token: &CancellationToken) -> std::result::Result<(), OperationCancelled> {
    if token.is_cancelled() {
        Err(OperationCancelled)
    } else {
        Ok(())
    }
}

/// Whether `err` is (or wraps) the cancellation signal
pub fn is_cancellation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause.is::<OperationCancelled>() || matches!(cause.downcast_ref::<Error>(), Some(Error::Cancelled))
    })
}

/// Per-run, revocable cancellation source
#[derive(Debug)]
pub struct CancellationHandle {
    token: CancellationToken,
    disposed: AtomicBool,
    generation: u64,
}

impl CancellationHandle {
    pub fn new(generation: u64) -> Self {
        Self {
            token: CancellationToken::new(),
            disposed: AtomicBool::new(false),
            generation,
        }
    }

    /// Observation side handed to the work function
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Signal cancellation; fails once the handle has been disposed
    pub fn cancel(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::Disposed);
        }
        self.token.cancel();
        Ok(())
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Release the handle; later `cancel` calls fail. Idempotent.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}
