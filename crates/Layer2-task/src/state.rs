//! Execution state machine

use crate::error::TaskError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use uuid::Uuid;

/// Identifier of one pass through the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Execution states of a controller
///
/// Ordered by lifecycle position:
/// `Idle < Starting < Running < Cancelling < Completed < Faulted < Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExecutionState {
    /// Not running; initial state
    #[default]
    Idle,

    /// `start` accepted, before-hook pending
    Starting,

    /// Work function invoked
    Running,

    /// Cancellation signalled, waiting for the work to unwind
    Cancelling,

    /// Work returned without failure
    Completed,

    /// Work or before-hook failed
    Faulted,

    /// Work unwound through the cancellation signal
    Cancelled,
}

impl ExecutionState {
    /// Position in the run lifecycle
    pub fn lifecycle_position(&self) -> u8 {
        match self {
            ExecutionState::Idle => 0,
            ExecutionState::Starting => 1,
            ExecutionState::Running => 2,
            ExecutionState::Cancelling => 3,
            ExecutionState::Completed => 4,
            ExecutionState::Faulted => 5,
            ExecutionState::Cancelled => 6,
        }
    }

    /// A new run must be rejected from these states
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            ExecutionState::Starting | ExecutionState::Running | ExecutionState::Cancelling
        )
    }

    /// A new run may begin from these states
    pub fn is_restartable(&self) -> bool {
        !self.is_busy()
    }

    /// Outcome of a finished run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Completed | ExecutionState::Faulted | ExecutionState::Cancelled
        )
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ExecutionState::Idle => "Idle",
            ExecutionState::Starting => "Starting",
            ExecutionState::Running => "Running",
            ExecutionState::Cancelling => "Cancelling",
            ExecutionState::Completed => "Completed",
            ExecutionState::Faulted => "Faulted",
            ExecutionState::Cancelled => "Cancelled",
        }
    }

    /// Symbol for terminal output
    pub fn symbol(&self) -> &'static str {
        match self {
            ExecutionState::Idle => "◯",
            ExecutionState::Starting => "◎",
            ExecutionState::Running => "⟳",
            ExecutionState::Cancelling => "⊖",
            ExecutionState::Completed => "✓",
            ExecutionState::Faulted => "✗",
            ExecutionState::Cancelled => "⊘",
        }
    }
}

impl PartialOrd for ExecutionState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExecutionState {
    fn cmp(&self, other: &Self) -> Ordering {
        self.lifecycle_position().cmp(&other.lifecycle_position())
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// One observed state change
#[derive(Debug, Clone)]
pub struct StateTransition {
    /// Run that caused the change
    pub run_id: Option<RunId>,

    pub previous: ExecutionState,

    pub next: ExecutionState,

    /// Failure behind a `Faulted` transition
    pub error: Option<Arc<TaskError>>,

    pub message: Option<String>,
}

impl StateTransition {
    pub fn new(previous: ExecutionState, next: ExecutionState) -> Self {
        Self {
            run_id: None,
            previous,
            next,
            error: None,
            message: None,
        }
    }

    pub fn with_run(mut self, run_id: Option<RunId>) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn with_error(mut self, error: Option<Arc<TaskError>>) -> Self {
        self.error = error;
        self
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }
}

impl std::fmt::Display for StateTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.previous, self.next)?;
        if let Some(error) = &self.error {
            write!(f, " ({})", error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ExecutionState; 7] = [
        ExecutionState::Idle,
        ExecutionState::Starting,
        ExecutionState::Running,
        ExecutionState::Cancelling,
        ExecutionState::Completed,
        ExecutionState::Faulted,
        ExecutionState::Cancelled,
    ];

    #[test]
    fn test_busy_and_restartable_partition() {
        for state in ALL {
            assert_ne!(state.is_busy(), state.is_restartable(), "{}", state);
        }
        let busy: Vec<_> = ALL.iter().filter(|s| s.is_busy()).collect();
        assert_eq!(
            busy,
            vec![
                &ExecutionState::Starting,
                &ExecutionState::Running,
                &ExecutionState::Cancelling
            ]
        );
        assert!(ExecutionState::Idle.is_restartable());
        assert!(!ExecutionState::Idle.is_terminal());
    }

    #[test]
    fn test_lifecycle_order() {
        let mut shuffled = vec![
            ExecutionState::Cancelled,
            ExecutionState::Running,
            ExecutionState::Idle,
            ExecutionState::Faulted,
            ExecutionState::Starting,
            ExecutionState::Completed,
            ExecutionState::Cancelling,
        ];
        shuffled.sort();
        assert_eq!(shuffled, ALL.to_vec());
    }

    #[test]
    fn test_transition_display() {
        let transition = StateTransition::new(ExecutionState::Running, ExecutionState::Faulted)
            .with_error(Some(Arc::new(TaskError::Reported("disk full".to_string()))));
        assert_eq!(transition.to_string(), "Running -> Faulted (disk full)");
        assert!(transition.message.is_none());
    }
}
