//! Convenience wrappers around [`TaskExecutionController::start`]
//!
//! Install a work function that brackets a plain action with
//! "Processing..." / "Successfully completed." progress, turns failures into
//! a failure description and lets the cancellation signal through.

use crate::cancel::is_cancellation;
use crate::channel::{ProgressReporter, ProgressSink};
use crate::controller::{RunHandle, TaskExecutionController};
use crate::progress::{ProgressBounds, Severity};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn processing(name: &str, progress: &ProgressReporter, bounds: ProgressBounds) {
    progress.progress(
        &format!("{}: Processing...", name),
        Some(bounds.minimum()),
        Severity::Information,
    );
}

fn finish(
    name: &str,
    result: anyhow::Result<()>,
    token: &CancellationToken,
    progress: &ProgressReporter,
    bounds: ProgressBounds,
) -> anyhow::Result<Option<String>> {
    match result {
        Ok(()) => {
            if !token.is_cancelled() {
                progress.progress(
                    &format!("{}: Successfully completed.", name),
                    Some(bounds.maximum()),
                    Severity::Success,
                );
            }
            Ok(None)
        }
        Err(e) if is_cancellation(&e) => Err(e),
        Err(e) => Ok(Some(format!("{} failed: {}", name, e))),
    }
}

/// Run a blocking `action` on the blocking pool as the controller's work
/// and start it with lifecycle messages on.
///
/// `action` receives the run's progress sink and should poll the token
/// (see [`crate::check_cancelled`]), returning the cancellation error to
/// stop early.
pub fn execute_action<F>(
    controller: &TaskExecutionController,
    name: impl Into<String>,
    action: F,
) -> Option<RunHandle>
where
    F: Fn(CancellationToken, ProgressReporter) -> anyhow::Result<()> + Send + Sync + 'static,
{
    let name: Arc<str> = Arc::from(name.into());
    let action = Arc::new(action);
    let bounds = controller.bounds();

    controller.set_work(move |token, progress| {
        let name = Arc::clone(&name);
        let action = Arc::clone(&action);
        async move {
            processing(&name, &progress, bounds);

            let blocking_token = token.clone();
            let blocking_progress = progress.clone();
            let joined =
                tokio::task::spawn_blocking(move || action(blocking_token, blocking_progress))
                    .await;
            let result = match joined {
                Ok(result) => result,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => Err(anyhow::Error::new(e)),
            };

            finish(&name, result, &token, &progress, bounds)
        }
    });

    controller.start(true)
}

/// Async counterpart of [`execute_action`]
pub fn execute_async<F, Fut>(
    controller: &TaskExecutionController,
    name: impl Into<String>,
    action: F,
) -> Option<RunHandle>
where
    F: Fn(CancellationToken, ProgressReporter) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let name: Arc<str> = Arc::from(name.into());
    let action = Arc::new(action);
    let bounds = controller.bounds();

    controller.set_work(move |token, progress| {
        let name = Arc::clone(&name);
        let action = Arc::clone(&action);
        async move {
            processing(&name, &progress, bounds);
            let result = action(token.clone(), progress.clone()).await;
            finish(&name, result, &token, &progress, bounds)
        }
    });

    controller.start(true)
}
