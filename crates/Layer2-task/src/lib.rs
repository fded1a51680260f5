//! # taskwrap-task
//!
//! Runs one long-running, cancellable unit of work at a time and exposes an
//! observable lifecycle around it.
//!
//! ## Features
//!
//! - Lifecycle state machine with ordered, de-duplicated transition events
//! - Multicast progress channel with synchronous, in-order delivery
//! - Cooperative cancellation through `tokio_util` cancellation tokens
//! - Before/after hooks and optional lifecycle banners
//! - Headless report view for front ends
//!
//! ```no_run
//! use taskwrap_task::{ProgressSink, Severity, TaskExecutionController, check_cancelled};
//!
//! # async fn demo() -> taskwrap_foundation::Result<()> {
//! let controller = TaskExecutionController::builder()
//!     .work(|token, progress| async move {
//!         for step in (0..=100).step_by(10) {
//!             check_cancelled(&token)?;
//!             progress.progress(&format!("Step {}", step), Some(step), Severity::StatusUpdate);
//!         }
//!         Ok(None)
//!     })
//!     .build()?;
//!
//! controller.subscribe_progress_fn("printer", |record| println!("{:?}", record));
//! if let Some(run) = controller.start(true) {
//!     run.wait().await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod channel;
pub mod controller;
pub mod error;
pub mod helpers;
pub mod lifecycle;
pub mod progress;
pub mod state;
pub mod view;

// Controller
pub use controller::{
    AfterHook, BeforeHook, ControllerBuilder, RunHandle, TaskExecutionController, WorkFn,
    WorkFuture,
};
pub use state::{ExecutionState, RunId, StateTransition};
pub use error::TaskError;

// Progress
pub use channel::{ProgressChannel, ProgressReporter, ProgressSink};
pub use progress::{clamp_progress, ProgressBounds, ProgressRecord, Severity, LIFECYCLE_TAG};

// Cancellation
pub use cancel::{check_cancelled, is_cancellation, CancellationHandle, OperationCancelled};
pub use tokio_util::sync::CancellationToken;

// Helpers and view
pub use helpers::{execute_action, execute_async};
pub use view::{ReportView, Tone, ViewState};
