//! Demo work functions

use clap::ValueEnum;
use std::time::Duration;
use taskwrap_task::{
    check_cancelled, CancellationToken, OperationCancelled, ProgressReporter, ProgressSink,
    Severity, TaskExecutionController,
};
use tracing::{debug, info};

/// Which demo task to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Count 0..=100 in steps of 10, warning above 70
    Counting,
    /// Reach 50%, warn, then fail with "invalid operation"
    Failing,
    /// Count like `counting` but ignore cancellation
    Stubborn,
}

impl Scenario {
    /// Install this scenario's work and hooks on `controller`
    pub fn install(self, controller: &TaskExecutionController, step: Duration) {
        match self {
            Scenario::Counting => {
                controller.set_work(move |token, progress| counting(token, progress, step))
            }
            Scenario::Failing => {
                controller.set_work(move |token, progress| failing(token, progress, step))
            }
            Scenario::Stubborn => {
                controller.set_work(move |token, progress| stubborn(token, progress, step))
            }
        }

        controller.set_before(move || {
            info!(scenario = ?self, "Preparing run");
            Ok(())
        });
        controller.set_after(move || debug!(scenario = ?self, "Run finished"));
    }
}

/// Sleep for `step` unless cancellation arrives first
async fn pause(token: &CancellationToken, step: Duration) -> Result<(), OperationCancelled> {
    tokio::select! {
        _ = token.cancelled() => Err(OperationCancelled),
        _ = tokio::time::sleep(step) => Ok(()),
    }
}

fn step_level(value: i32) -> Severity {
    if value > 70 {
        Severity::Warning
    } else {
        Severity::Information
    }
}

async fn counting(
    token: CancellationToken,
    progress: ProgressReporter,
    step: Duration,
) -> anyhow::Result<Option<String>> {
    for value in (0..=100).step_by(10) {
        check_cancelled(&token)?;
        progress.progress(&format!("Step {}/10", value / 10), Some(value), step_level(value));
        progress.content(&format!("Processed {}%", value), Severity::Detail);
        pause(&token, step).await?;
    }

    progress.progress("All steps done", Some(100), Severity::Success);
    Ok(None)
}

async fn failing(
    token: CancellationToken,
    progress: ProgressReporter,
    step: Duration,
) -> anyhow::Result<Option<String>> {
    for value in (0..=50).step_by(10) {
        check_cancelled(&token)?;
        progress.progress(&format!("Step {}/10", value / 10), Some(value), Severity::Information);
        pause(&token, step).await?;
    }

    progress.content("about to fail", Severity::Warning);
    pause(&token, step).await?;
    Err(anyhow::anyhow!("invalid operation"))
}

async fn stubborn(
    token: CancellationToken,
    progress: ProgressReporter,
    step: Duration,
) -> anyhow::Result<Option<String>> {
    let mut warned = false;
    for value in (0..=100).step_by(10) {
        if token.is_cancelled() && !warned {
            progress.content("Cancellation requested; finishing anyway", Severity::Warning);
            warned = true;
        }
        progress.progress(&format!("Step {}/10", value / 10), Some(value), step_level(value));
        tokio::time::sleep(step).await;
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use taskwrap_task::ExecutionState;

    fn controller_for(scenario: Scenario) -> TaskExecutionController {
        let controller = TaskExecutionController::new().unwrap();
        scenario.install(&controller, Duration::from_millis(1));
        controller
    }

    #[tokio::test]
    async fn test_counting_completes() {
        let controller = controller_for(Scenario::Counting);
        let state = controller.start(true).unwrap().wait().await.unwrap();
        assert_eq!(state, ExecutionState::Completed);
    }

    #[tokio::test]
    async fn test_failing_faults() {
        let controller = controller_for(Scenario::Failing);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        controller.subscribe_transitions_fn("errors", move |t| {
            if let Some(error) = &t.error {
                sink.lock().push(error.message());
            }
        });

        let state = controller.start(true).unwrap().wait().await.unwrap();
        assert_eq!(state, ExecutionState::Faulted);
        assert_eq!(*errors.lock(), vec!["invalid operation".to_string()]);
    }

    #[tokio::test]
    async fn test_counting_cancels_promptly() {
        let controller = TaskExecutionController::new().unwrap();
        Scenario::Counting.install(&controller, Duration::from_secs(60));

        let handle = controller.start(false).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        controller.request_cancel();
        assert_eq!(handle.wait().await.unwrap(), ExecutionState::Cancelled);
    }

    #[tokio::test]
    async fn test_stubborn_still_ends_cancelled() {
        let controller = TaskExecutionController::new().unwrap();
        Scenario::Stubborn.install(&controller, Duration::from_millis(5));

        let handle = controller.start(false).unwrap();
        tokio::time::sleep(Duration::from_millis(3)).await;
        controller.request_cancel();
        assert_eq!(handle.wait().await.unwrap(), ExecutionState::Cancelled);
    }
}
