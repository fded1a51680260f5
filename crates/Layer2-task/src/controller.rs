//! Task execution controller
//!
//! Runs one caller-supplied work function at a time through the lifecycle
//!
//! ```text
//! Idle/terminal ─start─▶ Starting ─before-hook─▶ Running ─▶ Completed
//!                           │                       │    ├─▶ Faulted
//!                           └──request_cancel──▶ Cancelling ─▶ Cancelled
//! ```
//!
//! and publishes every state change and progress record to observers.
//! Exactly one terminal transition is emitted per run and the after-hook
//! always runs once that transition is out.
//!
//! Locking: `state` guards only the state cell and is never held while
//! publishing or while running hooks or work. `transition_gate` is a
//! reentrant lock held around "mutate, then publish" so transitions reach
//! observers in the order they happened, even when an observer calls back
//! into the controller.

use crate::cancel::{is_cancellation, CancellationHandle};
use crate::channel::{ProgressChannel, ProgressReporter, ProgressSink};
use crate::error::TaskError;
use crate::lifecycle;
use crate::progress::{ProgressBounds, ProgressRecord};
use crate::state::{ExecutionState, RunId, StateTransition};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::collections::VecDeque;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use taskwrap_foundation::event::{EventBus, EventListener, ListenerId};
use taskwrap_foundation::{Error, Result, WrapperConfig};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Boxed future returned by a work function
///
/// `Ok(None)` or an empty/blank string means success; a non-empty string is
/// a failure description. `Err` is a failure unless it is the cancellation
/// signal observed after cancellation was requested.
pub type WorkFuture = BoxFuture<'static, anyhow::Result<Option<String>>>;

/// Work function: `(cancellation token, progress sink) -> result`
pub type WorkFn = Arc<dyn Fn(CancellationToken, ProgressReporter) -> WorkFuture + Send + Sync>;

/// Runs before the work function; `Err` faults the run
pub type BeforeHook = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Runs at the end of every run, after the terminal transition
pub type AfterHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Default)]
struct Hooks {
    work: Option<WorkFn>,
    before: Option<BeforeHook>,
    after: Option<AfterHook>,
}

fn box_work<F, Fut>(work: F) -> WorkFn
where
    F: Fn(CancellationToken, ProgressReporter) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Option<String>>> + Send + 'static,
{
    Arc::new(move |token, progress| work(token, progress).boxed())
}

fn same_error(a: Option<&Arc<TaskError>>, b: Option<&Arc<TaskError>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

struct StateCell {
    current: ExecutionState,
    run_id: Option<RunId>,
    last_fault: Option<Arc<TaskError>>,
}

/// How a run ended; mapped exhaustively onto a terminal state
enum RunOutcome {
    Completed,
    Cancelled,
    Faulted(Arc<TaskError>),
}

impl RunOutcome {
    fn state(&self) -> ExecutionState {
        match self {
            RunOutcome::Completed => ExecutionState::Completed,
            RunOutcome::Cancelled => ExecutionState::Cancelled,
            RunOutcome::Faulted(_) => ExecutionState::Faulted,
        }
    }
}

// ============================================================================
// RunHandle
// ============================================================================

/// Handle to a started run; dropping it does not affect the run
#[derive(Debug)]
pub struct RunHandle {
    run_id: RunId,
    join: JoinHandle<ExecutionState>,
}

impl RunHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Wait for the run's terminal state (after-hook included)
    pub async fn wait(self) -> Result<ExecutionState> {
        let run_id = self.run_id;
        self.join
            .await
            .map_err(|e| Error::Internal(format!("run {} did not finish: {}", run_id, e)))
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`TaskExecutionController`]
pub struct ControllerBuilder {
    config: WrapperConfig,
    hooks: Hooks,
    runtime: Option<Handle>,
}

impl ControllerBuilder {
    fn new() -> Self {
        Self {
            config: WrapperConfig::default(),
            hooks: Hooks::default(),
            runtime: None,
        }
    }

    pub fn config(mut self, config: WrapperConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bounds(mut self, minimum: i32, maximum: i32) -> Self {
        self.config = self.config.bounds(minimum, maximum);
        self
    }

    pub fn show_error_detail(mut self, show: bool) -> Self {
        self.config = self.config.show_error_detail(show);
        self
    }

    pub fn history_size(mut self, size: usize) -> Self {
        self.config = self.config.history_size(size);
        self
    }

    pub fn work<F, Fut>(mut self, work: F) -> Self
    where
        F: Fn(CancellationToken, ProgressReporter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<String>>> + Send + 'static,
    {
        self.hooks.work = Some(box_work(work));
        self
    }

    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hooks.before = Some(Arc::new(hook));
        self
    }

    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.after = Some(Arc::new(hook));
        self
    }

    /// Runtime runs are spawned on; defaults to the current one
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> Result<TaskExecutionController> {
        let bounds = ProgressBounds::from_config(&self.config)?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current()
                .map_err(|e| Error::Config(format!("no tokio runtime available: {}", e)))?,
        };

        let inner = ControllerInner {
            state: Mutex::new(StateCell {
                current: ExecutionState::Idle,
                run_id: None,
                last_fault: None,
            }),
            transition_gate: ReentrantMutex::new(()),
            pending: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
            transitions: EventBus::new(),
            progress: Arc::new(ProgressChannel::with_history(self.config.history_size)),
            cancellation: Mutex::new(Some(Arc::new(CancellationHandle::new(0)))),
            generation: AtomicU64::new(0),
            hooks: RwLock::new(self.hooks),
            bounds,
            show_error_detail: AtomicBool::new(self.config.show_error_detail),
            disposed: AtomicBool::new(false),
            runtime,
        };

        debug!(
            minimum = bounds.minimum(),
            maximum = bounds.maximum(),
            "Task controller created"
        );

        Ok(TaskExecutionController {
            inner: Arc::new(inner),
        })
    }
}

// ============================================================================
// Controller
// ============================================================================

struct ControllerInner {
    state: Mutex<StateCell>,
    transition_gate: ReentrantMutex<()>,
    pending: Mutex<VecDeque<StateTransition>>,
    draining: AtomicBool,
    transitions: EventBus<StateTransition>,
    progress: Arc<ProgressChannel>,

    /// Current run's handle; `None` once disposed
    cancellation: Mutex<Option<Arc<CancellationHandle>>>,
    generation: AtomicU64,

    hooks: RwLock<Hooks>,
    bounds: ProgressBounds,
    show_error_detail: AtomicBool,
    disposed: AtomicBool,
    runtime: Handle,
}

impl ControllerInner {
    fn current_state(&self) -> ExecutionState {
        self.state.lock().current
    }

    /// Deliver `transition`; caller holds `transition_gate`.
    ///
    /// Transitions caused by an observer are queued and delivered by the
    /// outermost call once the current one has reached every observer.
    fn publish(&self, transition: StateTransition) {
        self.pending.lock().push_back(transition);
        if self.draining.swap(true, Ordering::SeqCst) {
            return;
        }

        loop {
            let next = self.pending.lock().pop_front();
            let Some(transition) = next else {
                break;
            };
            debug!(
                run_id = ?transition.run_id.map(|id| id.to_string()),
                from = %transition.previous,
                to = %transition.next,
                "State transition"
            );
            self.transitions.publish(transition);
        }
        self.draining.store(false, Ordering::SeqCst);
    }

    /// Unconditional move; returns whether a transition was emitted
    fn set_state(
        &self,
        next: ExecutionState,
        error: Option<Arc<TaskError>>,
        message: Option<String>,
    ) -> bool {
        self.transition_where(|_| true, next, error, message).is_ok()
    }

    /// Move to `next` when `allowed(current)` holds and something changes.
    /// Re-entering `Faulted` with a different error counts as a change.
    fn transition_where(
        &self,
        allowed: impl Fn(ExecutionState) -> bool,
        next: ExecutionState,
        error: Option<Arc<TaskError>>,
        message: Option<String>,
    ) -> std::result::Result<(), ExecutionState> {
        let _gate = self.transition_gate.lock();

        let (previous, run_id) = {
            let mut cell = self.state.lock();
            if !allowed(cell.current) {
                return Err(cell.current);
            }
            let refault = next == ExecutionState::Faulted
                && !same_error(cell.last_fault.as_ref(), error.as_ref());
            if cell.current == next && !refault {
                return Err(cell.current);
            }

            let previous = cell.current;
            cell.current = next;
            cell.last_fault = if next == ExecutionState::Faulted {
                error.clone()
            } else {
                None
            };
            (previous, cell.run_id)
        };

        self.publish(
            StateTransition::new(previous, next)
                .with_run(run_id)
                .with_error(error)
                .with_message(message),
        );
        Ok(())
    }

    /// Busy check, handle swap and `-> Starting` as one step
    fn begin_run(&self, run_id: RunId) -> std::result::Result<CancellationToken, ExecutionState> {
        let _gate = self.transition_gate.lock();

        let (previous, token) = {
            let mut cell = self.state.lock();
            if cell.current.is_busy() {
                return Err(cell.current);
            }
            let token = self.renew_cancellation();
            let previous = cell.current;
            cell.current = ExecutionState::Starting;
            cell.run_id = Some(run_id);
            cell.last_fault = None;
            (previous, token)
        };

        self.publish(
            StateTransition::new(previous, ExecutionState::Starting).with_run(Some(run_id)),
        );
        Ok(token)
    }

    /// Dispose the previous handle and install a fresh one
    fn renew_cancellation(&self) -> CancellationToken {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let fresh = Arc::new(CancellationHandle::new(generation));
        let token = fresh.token();

        if let Some(previous) = self.cancellation.lock().replace(fresh) {
            debug!(generation = previous.generation(), "Disposing previous cancellation handle");
            previous.dispose();
        }
        token
    }

    fn classify_failure(
        err: anyhow::Error,
        token: &CancellationToken,
        wrap: fn(anyhow::Error) -> TaskError,
    ) -> RunOutcome {
        if is_cancellation(&err) && token.is_cancelled() {
            RunOutcome::Cancelled
        } else {
            RunOutcome::Faulted(Arc::new(wrap(err)))
        }
    }

    /// Before-hook, cancellation check, work invocation and classification
    async fn drive(
        &self,
        hooks: &Hooks,
        token: &CancellationToken,
        reporter: &ProgressReporter,
    ) -> RunOutcome {
        if let Some(before) = &hooks.before {
            match catch_unwind(AssertUnwindSafe(|| before())) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Self::classify_failure(e, token, TaskError::Hook),
                Err(payload) => {
                    return RunOutcome::Faulted(Arc::new(TaskError::from_panic(payload)))
                }
            }
        }

        if token.is_cancelled() {
            return RunOutcome::Cancelled;
        }

        let Some(work) = &hooks.work else {
            return RunOutcome::Faulted(Arc::new(TaskError::MissingWork));
        };

        if let Err(state) =
            self.transition_where(|s| s == ExecutionState::Starting, ExecutionState::Running, None, None)
        {
            debug!(state = %state, "Cancellation requested before the work was invoked");
            return RunOutcome::Cancelled;
        }

        let invoked = catch_unwind(AssertUnwindSafe(|| work(token.clone(), reporter.clone())));
        let result = match invoked {
            Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
            Err(payload) => Err(payload),
        };

        match result {
            Err(payload) => RunOutcome::Faulted(Arc::new(TaskError::from_panic(payload))),
            Ok(Err(e)) => Self::classify_failure(e, token, TaskError::Work),
            Ok(Ok(_)) if token.is_cancelled() => RunOutcome::Cancelled,
            Ok(Ok(Some(message))) if !message.trim().is_empty() => {
                RunOutcome::Faulted(Arc::new(TaskError::Reported(message)))
            }
            Ok(Ok(_)) => RunOutcome::Completed,
        }
    }

    async fn run(
        self: Arc<Self>,
        run_id: RunId,
        token: CancellationToken,
        started_at: Instant,
        emit_lifecycle_messages: bool,
    ) -> ExecutionState {
        let hooks = self.hooks.read().clone();
        let reporter = ProgressReporter::new(Arc::clone(&self.progress), Some(run_id));

        let outcome = self.drive(&hooks, &token, &reporter).await;

        // Nothing from this run's sink may follow the terminal transition
        reporter.seal();

        let elapsed = started_at.elapsed();
        let terminal = outcome.state();

        match outcome {
            RunOutcome::Completed => {
                self.set_state(ExecutionState::Completed, None, None);
                info!(
                    run_id = %run_id,
                    elapsed = %lifecycle::format_elapsed(elapsed),
                    "Task completed"
                );
                if emit_lifecycle_messages {
                    self.progress
                        .report(lifecycle::completed(&self.bounds, elapsed));
                }
            }
            RunOutcome::Cancelled => {
                self.set_state(ExecutionState::Cancelled, None, None);
                info!(
                    run_id = %run_id,
                    elapsed = %lifecycle::format_elapsed(elapsed),
                    "Task cancelled"
                );
                if emit_lifecycle_messages {
                    self.progress.report(lifecycle::cancelled(elapsed));
                }
            }
            RunOutcome::Faulted(error) => {
                warn!(run_id = %run_id, error = %error, "Task faulted");
                self.set_state(
                    ExecutionState::Faulted,
                    Some(Arc::clone(&error)),
                    Some(error.message()),
                );
                if emit_lifecycle_messages {
                    let show_detail = self.show_error_detail.load(Ordering::SeqCst);
                    self.progress
                        .report(lifecycle::faulted(&error, elapsed, show_detail));
                }
            }
        }

        if let Some(after) = &hooks.after {
            if catch_unwind(AssertUnwindSafe(|| after())).is_err() {
                error!(run_id = %run_id, "After-completion hook panicked");
            }
        }

        terminal
    }
}

/// Runs a single long-running work function with an observable lifecycle,
/// progress multicasting and cooperative cancellation.
///
/// Constructed once and reused across runs. Dropping it disposes it.
pub struct TaskExecutionController {
    inner: Arc<ControllerInner>,
}

impl TaskExecutionController {
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::new()
    }

    /// Default settings on the current tokio runtime
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    // ========================================================================
    // Run control
    // ========================================================================

    /// Start a run without waiting for it.
    ///
    /// Rejected (Warning record, no transition, `None`) while a run is busy.
    pub fn start(&self, emit_lifecycle_messages: bool) -> Option<RunHandle> {
        let inner = &self.inner;

        if inner.disposed.load(Ordering::SeqCst) {
            warn!("Start rejected: controller disposed");
            inner.progress.report(lifecycle::disposed());
            return None;
        }

        let run_id = RunId::new();
        let token = {
            // Held so no transition can precede the start banner
            let _gate = inner.transition_gate.lock();
            let token = match inner.begin_run(run_id) {
                Ok(token) => token,
                Err(state) => {
                    warn!(state = %state, "Start rejected: a run is already in progress");
                    inner.progress.report(lifecycle::busy());
                    return None;
                }
            };
            if emit_lifecycle_messages {
                inner.progress.report(lifecycle::started(&inner.bounds));
            }
            token
        };

        let started_at = Instant::now();
        info!(run_id = %run_id, "Task run started");

        let join = inner.runtime.spawn(Arc::clone(inner).run(
            run_id,
            token,
            started_at,
            emit_lifecycle_messages,
        ));
        Some(RunHandle { run_id, join })
    }

    /// Ask the current run to stop.
    ///
    /// Only acts from `Starting`/`Running`; a second request while
    /// `Cancelling` is a no-op. Signal failures become an Error record.
    pub fn request_cancel(&self) {
        let inner = &self.inner;

        let handle = {
            let _gate = inner.transition_gate.lock();
            let moved = inner.transition_where(
                |s| matches!(s, ExecutionState::Starting | ExecutionState::Running),
                ExecutionState::Cancelling,
                None,
                Some("Cancellation requested".to_string()),
            );
            if let Err(state) = moved {
                debug!(state = %state, "Cancel request ignored");
                return;
            }
            // Captured under the gate so a later run's handle is never hit
            inner.cancellation.lock().clone()
        };

        let signalled = match handle {
            Some(handle) => handle.cancel(),
            None => Err(Error::Disposed),
        };

        if let Err(e) = signalled {
            error!(error = %e, "Cancellation request failed");
            inner.progress.report(lifecycle::cancel_failed(&e));
        }
    }

    /// Cancel any in-flight run and release the cancellation handle.
    /// Safe to call repeatedly.
    pub fn dispose(&self) {
        let inner = &self.inner;
        if inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(handle) = inner.cancellation.lock().take() {
            // Handles in the slot are never disposed
            let _ = handle.cancel();
            handle.dispose();
        }
        info!(state = %inner.current_state(), "Task controller disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Snapshot of the current state
    pub fn current_state(&self) -> ExecutionState {
        self.inner.current_state()
    }

    /// Whether the current run's handle has been signalled
    pub fn is_cancellation_requested(&self) -> bool {
        self.inner
            .cancellation
            .lock()
            .as_ref()
            .map(|handle| handle.is_cancelled())
            .unwrap_or(false)
    }

    pub fn bounds(&self) -> ProgressBounds {
        self.inner.bounds
    }

    pub fn show_error_detail(&self) -> bool {
        self.inner.show_error_detail.load(Ordering::SeqCst)
    }

    pub fn set_show_error_detail(&self, show: bool) {
        self.inner.show_error_detail.store(show, Ordering::SeqCst);
    }

    // ========================================================================
    // Work and hooks (take effect from the next start)
    // ========================================================================

    pub fn set_work<F, Fut>(&self, work: F)
    where
        F: Fn(CancellationToken, ProgressReporter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<String>>> + Send + 'static,
    {
        self.inner.hooks.write().work = Some(box_work(work));
    }

    pub fn clear_work(&self) {
        self.inner.hooks.write().work = None;
    }

    pub fn set_before<F>(&self, hook: F)
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.hooks.write().before = Some(Arc::new(hook));
    }

    pub fn set_after<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.hooks.write().after = Some(Arc::new(hook));
    }

    // ========================================================================
    // Observation
    // ========================================================================

    /// Progress channel shared by runs and direct reporting
    pub fn progress(&self) -> &Arc<ProgressChannel> {
        &self.inner.progress
    }

    /// Report a record directly, outside of any run
    pub fn report(&self, record: ProgressRecord) {
        self.inner.progress.report(record);
    }

    pub fn subscribe_progress(
        &self,
        listener: Arc<dyn EventListener<ProgressRecord>>,
    ) -> ListenerId {
        self.inner.progress.subscribe(listener)
    }

    pub fn subscribe_progress_fn(
        &self,
        name: impl Into<String>,
        handler: impl Fn(&ProgressRecord) + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner.progress.subscribe_fn(name, handler)
    }

    pub fn unsubscribe_progress(&self, id: ListenerId) -> bool {
        self.inner.progress.unsubscribe(id)
    }

    pub fn subscribe_transitions(
        &self,
        listener: Arc<dyn EventListener<StateTransition>>,
    ) -> ListenerId {
        self.inner.transitions.subscribe(listener)
    }

    pub fn subscribe_transitions_fn(
        &self,
        name: impl Into<String>,
        handler: impl Fn(&StateTransition) + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner.transitions.subscribe_fn(name, handler)
    }

    pub fn unsubscribe_transitions(&self, id: ListenerId) -> bool {
        self.inner.transitions.unsubscribe(id)
    }

    /// Async stream of transitions
    pub fn transition_receiver(&self) -> broadcast::Receiver<StateTransition> {
        self.inner.transitions.receiver()
    }
}

impl Drop for TaskExecutionController {
    fn drop(&mut self) {
        self.dispose();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::Severity;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn record_transitions(controller: &TaskExecutionController) -> Arc<Mutex<Vec<StateTransition>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        controller.subscribe_transitions_fn("test", move |t: &StateTransition| {
            sink.lock().push(t.clone());
        });
        seen
    }

    fn record_progress(controller: &TaskExecutionController) -> Arc<Mutex<Vec<ProgressRecord>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        controller.subscribe_progress_fn("test", move |r: &ProgressRecord| {
            sink.lock().push(r.clone());
        });
        seen
    }

    fn pairs(transitions: &[StateTransition]) -> Vec<(ExecutionState, ExecutionState)> {
        transitions.iter().map(|t| (t.previous, t.next)).collect()
    }

    #[tokio::test]
    async fn test_faulted_reentry_with_new_error_emits() {
        let controller = TaskExecutionController::new().unwrap();
        let transitions = record_transitions(&controller);
        let inner = &controller.inner;

        let first = Arc::new(TaskError::Reported("first".to_string()));
        let second = Arc::new(TaskError::Reported("second".to_string()));

        assert!(inner.set_state(ExecutionState::Faulted, Some(Arc::clone(&first)), None));
        // Same error object: no change
        assert!(!inner.set_state(ExecutionState::Faulted, Some(Arc::clone(&first)), None));
        // Different error object: emitted again
        assert!(inner.set_state(ExecutionState::Faulted, Some(Arc::clone(&second)), None));
        // Non-faulted states never re-emit
        assert!(inner.set_state(ExecutionState::Idle, None, None));
        assert!(!inner.set_state(ExecutionState::Idle, None, None));

        let seen = transitions.lock();
        assert_eq!(
            pairs(&seen),
            vec![
                (ExecutionState::Idle, ExecutionState::Faulted),
                (ExecutionState::Faulted, ExecutionState::Faulted),
                (ExecutionState::Faulted, ExecutionState::Idle),
            ]
        );
        assert!(Arc::ptr_eq(seen[1].error.as_ref().unwrap(), &second));
    }

    #[tokio::test]
    async fn test_request_cancel_while_idle_is_noop() {
        let controller = TaskExecutionController::new().unwrap();
        let transitions = record_transitions(&controller);
        let progress = record_progress(&controller);

        controller.request_cancel();

        assert_eq!(controller.current_state(), ExecutionState::Idle);
        assert!(!controller.is_cancellation_requested());
        assert!(transitions.lock().is_empty());
        assert!(progress.lock().is_empty());
    }

    #[tokio::test]
    async fn test_busy_start_rejected_with_warning() {
        let release = Arc::new(Notify::new());
        let gate = Arc::clone(&release);
        let controller = TaskExecutionController::builder()
            .work(move |_token, _progress| {
                let gate = Arc::clone(&gate);
                async move {
                    gate.notified().await;
                    Ok(None)
                }
            })
            .build()
            .unwrap();

        let handle = controller.start(false).expect("first start accepted");
        let transitions = record_transitions(&controller);
        let progress = record_progress(&controller);

        for _ in 0..3 {
            assert!(controller.start(false).is_none());
        }

        assert!(transitions.lock().is_empty());
        let warnings: Vec<_> = progress
            .lock()
            .iter()
            .filter(|r| r.level() == Severity::Warning)
            .cloned()
            .collect();
        assert_eq!(warnings.len(), 3);
        assert_eq!(warnings[0].content_text(), Some(lifecycle::BUSY_WARNING));

        release.notify_one();
        assert_eq!(handle.wait().await.unwrap(), ExecutionState::Completed);
    }

    #[tokio::test]
    async fn test_missing_work_faults() {
        let controller = TaskExecutionController::new().unwrap();
        let transitions = record_transitions(&controller);

        let state = controller.start(false).unwrap().wait().await.unwrap();
        assert_eq!(state, ExecutionState::Faulted);

        let seen = transitions.lock();
        let last = seen.last().unwrap();
        assert!(matches!(
            last.error.as_deref(),
            Some(TaskError::MissingWork)
        ));
        assert_eq!(
            pairs(&seen),
            vec![
                (ExecutionState::Idle, ExecutionState::Starting),
                (ExecutionState::Starting, ExecutionState::Faulted),
            ]
        );
    }

    #[tokio::test]
    async fn test_before_hook_failure_faults_and_after_runs() {
        let after_calls = Arc::new(AtomicUsize::new(0));
        let after_counter = Arc::clone(&after_calls);
        let work_calls = Arc::new(AtomicUsize::new(0));
        let work_counter = Arc::clone(&work_calls);

        let controller = TaskExecutionController::builder()
            .before(|| Err(anyhow::anyhow!("database unavailable")))
            .after(move || {
                after_counter.fetch_add(1, Ordering::SeqCst);
            })
            .work(move |_token, _progress| {
                work_counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(None) }
            })
            .build()
            .unwrap();
        let transitions = record_transitions(&controller);

        let state = controller.start(true).unwrap().wait().await.unwrap();

        assert_eq!(state, ExecutionState::Faulted);
        assert_eq!(work_calls.load(Ordering::SeqCst), 0);
        assert_eq!(after_calls.load(Ordering::SeqCst), 1);

        let seen = transitions.lock();
        let error = seen.last().unwrap().error.clone().unwrap();
        assert!(error.is_hook_failure());
        assert_eq!(error.to_string(), "database unavailable");
    }

    #[tokio::test]
    async fn test_panicking_work_faults() {
        let controller = TaskExecutionController::builder()
            .work(|_token, _progress| async move {
                if true {
                    panic!("index out of range");
                }
                Ok(None)
            })
            .build()
            .unwrap();
        let transitions = record_transitions(&controller);

        let state = controller.start(false).unwrap().wait().await.unwrap();
        assert_eq!(state, ExecutionState::Faulted);

        let seen = transitions.lock();
        let error = seen.last().unwrap().error.clone().unwrap();
        assert!(matches!(*error, TaskError::Panicked(_)));
        assert_eq!(error.to_string(), "index out of range");
    }

    #[tokio::test]
    async fn test_cancel_failure_after_dispose_reports_error() {
        let release = Arc::new(Notify::new());
        let gate = Arc::clone(&release);
        let controller = TaskExecutionController::builder()
            .work(move |_token, _progress| {
                let gate = Arc::clone(&gate);
                // Ignores the token on purpose
                async move {
                    gate.notified().await;
                    Ok(None)
                }
            })
            .build()
            .unwrap();
        let progress = record_progress(&controller);

        let handle = controller.start(false).unwrap();
        controller.dispose();
        controller.dispose();
        controller.request_cancel();

        assert_eq!(controller.current_state(), ExecutionState::Cancelling);
        let errors: Vec<_> = progress
            .lock()
            .iter()
            .filter(|r| r.level() == Severity::Error)
            .filter_map(|r| r.content_text().map(str::to_string))
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Error during cancellation request:"));

        release.notify_one();
        // Dispose already signalled the run's token
        assert_eq!(handle.wait().await.unwrap(), ExecutionState::Cancelled);
    }

    #[tokio::test]
    async fn test_start_after_dispose_rejected() {
        let controller = TaskExecutionController::builder()
            .work(|_token, _progress| async { Ok(None) })
            .build()
            .unwrap();
        let transitions = record_transitions(&controller);
        let progress = record_progress(&controller);

        controller.dispose();
        assert!(controller.is_disposed());
        assert!(controller.start(true).is_none());

        assert!(transitions.lock().is_empty());
        let progress = progress.lock();
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].content_text(), Some(lifecycle::DISPOSED_ERROR));
    }

    #[test]
    fn test_build_without_runtime_fails() {
        let result = TaskExecutionController::builder().build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_build_rejects_inverted_bounds() {
        let result = TaskExecutionController::builder().bounds(10, 0).build();
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
