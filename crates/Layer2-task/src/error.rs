//! Run failures
//!
//! `TaskError` is what a `Faulted` transition carries. The cancellation
//! signal is not a failure and never becomes a `TaskError`.

use std::any::Any;
use thiserror::Error;

/// Why a run ended in `Faulted`
#[derive(Error, Debug)]
pub enum TaskError {
    /// Work function returned `Err`
    #[error("{0}")]
    Work(anyhow::Error),

    /// Work function returned a non-empty failure description
    #[error("{0}")]
    Reported(String),

    /// Before-hook returned `Err`
    #[error("{0}")]
    Hook(anyhow::Error),

    /// Work function or before-hook panicked
    #[error("{0}")]
    Panicked(String),

    #[error("work function is not set")]
    MissingWork,
}

impl TaskError {
    /// Single-line message
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Verbose rendering including the cause chain (and a backtrace when
    /// `RUST_BACKTRACE` enabled capture)
    pub fn detail(&self) -> String {
        match self {
            TaskError::Work(e) | TaskError::Hook(e) => format!("{:?}", e),
            other => format!("{:?}", other),
        }
    }

    pub fn is_hook_failure(&self) -> bool {
        matches!(self, TaskError::Hook(_))
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with non-string payload".to_string()
        };
        TaskError::Panicked(message)
    }
}
