//! Headless report view
//!
//! Folds the progress and transition streams into presentation state
//! (what a progress bar, status label and log pane would show) without
//! rendering anything. Front ends read a [`ViewState`] snapshot and draw it.

use crate::controller::TaskExecutionController;
use crate::progress::{ProgressBounds, ProgressRecord, Severity};
use crate::state::{ExecutionState, StateTransition};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use taskwrap_foundation::event::{EventListener, ListenerId};

/// Semantic colour of the progress display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Tone {
    #[default]
    Default,
    Starting,
    Warning,
    Error,
    Success,
    Cancelling,
    Cancelled,
}

impl Tone {
    pub fn for_severity(level: Severity) -> Self {
        match level {
            Severity::Warning | Severity::ProcessCancelled => Tone::Warning,
            Severity::Error => Tone::Error,
            Severity::Success | Severity::ProcessEnd => Tone::Success,
            _ => Tone::Default,
        }
    }
}

/// Snapshot of what the view shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub state: ExecutionState,
    pub status: String,
    pub progress_value: i32,
    pub progress_text: String,
    pub tone: Tone,
    pub can_start: bool,
    pub can_cancel: bool,
    pub log: Vec<String>,
    pub last_error: Option<String>,
}

impl ViewState {
    fn ready(bounds: ProgressBounds) -> Self {
        Self {
            state: ExecutionState::Idle,
            status: "Ready".to_string(),
            progress_value: bounds.minimum(),
            progress_text: "Ready".to_string(),
            tone: Tone::Default,
            can_start: true,
            can_cancel: false,
            log: Vec::new(),
            last_error: None,
        }
    }
}

/// Observer of both controller streams
pub struct ReportView {
    bounds: ProgressBounds,
    inner: Mutex<ViewState>,
}

impl ReportView {
    pub fn new(bounds: ProgressBounds) -> Self {
        Self {
            bounds,
            inner: Mutex::new(ViewState::ready(bounds)),
        }
    }

    /// Create a view sized to `controller` and subscribe it to both streams
    pub fn attach(controller: &TaskExecutionController) -> (Arc<Self>, ListenerId, ListenerId) {
        let view = Arc::new(Self::new(controller.bounds()));
        let progress = controller.subscribe_progress(view.clone());
        let transitions = controller.subscribe_transitions(view.clone());
        (view, progress, transitions)
    }

    pub fn snapshot(&self) -> ViewState {
        self.inner.lock().clone()
    }

    /// Back to "Ready" at the minimum; a busy controller is asked to cancel
    pub fn reset(&self, controller: &TaskExecutionController) {
        if controller.current_state().is_busy() {
            controller.request_cancel();
        }

        let mut view = self.inner.lock();
        view.progress_value = self.bounds.minimum();
        view.progress_text = "Ready".to_string();
        view.status = "Ready".to_string();
        view.tone = Tone::Default;
        view.last_error = None;
    }

    fn apply_record(&self, record: &ProgressRecord) {
        let mut view = self.inner.lock();
        if let Some(content) = record.content_text() {
            view.log.push(content.to_string());
        }
        if let Some(text) = record.progress_text() {
            view.progress_text = text.to_string();
        }
        if let Some(value) = record.progress_value() {
            view.progress_value = self.bounds.clamp(value);
        }
        view.tone = Tone::for_severity(record.level());
    }

    fn apply_transition(&self, transition: &StateTransition) {
        let mut view = self.inner.lock();
        let next = transition.next;

        view.state = next;
        view.can_start = !next.is_busy();
        view.can_cancel = matches!(next, ExecutionState::Starting | ExecutionState::Running);

        match next {
            ExecutionState::Idle => {
                view.status = "Ready".to_string();
                view.progress_value = self.bounds.minimum();
                view.tone = Tone::Default;
            }
            ExecutionState::Starting => {
                view.status = "Starting...".to_string();
                view.tone = Tone::Starting;
                view.last_error = None;
            }
            ExecutionState::Running => {
                view.status = "Running".to_string();
            }
            ExecutionState::Cancelling => {
                view.status = "Cancelling...".to_string();
                view.tone = Tone::Cancelling;
            }
            ExecutionState::Completed => {
                view.status = "Completed!".to_string();
                view.progress_value = self.bounds.maximum();
                view.tone = Tone::Success;
            }
            ExecutionState::Faulted => {
                let message = transition
                    .error
                    .as_ref()
                    .map(|e| e.message())
                    .or_else(|| transition.message.clone())
                    .unwrap_or_default();
                let first_line = message.lines().next().unwrap_or_default().to_string();
                view.status = format!("Failed: {}", first_line);
                view.tone = Tone::Error;
                view.last_error = Some(message);
            }
            ExecutionState::Cancelled => {
                view.status = "Cancelled".to_string();
                view.tone = Tone::Cancelled;
            }
        }
    }
}

impl EventListener<ProgressRecord> for ReportView {
    fn name(&self) -> &str {
        "report-view"
    }

    fn on_event(&self, event: &ProgressRecord) {
        self.apply_record(event);
    }
}

impl EventListener<StateTransition> for ReportView {
    fn name(&self) -> &str {
        "report-view"
    }

    fn on_event(&self, event: &StateTransition) {
        self.apply_transition(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;

    fn view() -> ReportView {
        ReportView::new(ProgressBounds::new(0, 100).unwrap())
    }

    #[test]
    fn test_tone_mapping() {
        assert_eq!(Tone::for_severity(Severity::Warning), Tone::Warning);
        assert_eq!(Tone::for_severity(Severity::ProcessCancelled), Tone::Warning);
        assert_eq!(Tone::for_severity(Severity::Error), Tone::Error);
        assert_eq!(Tone::for_severity(Severity::ProcessEnd), Tone::Success);
        assert_eq!(Tone::for_severity(Severity::Detail), Tone::Default);
    }

    #[test]
    fn test_record_values_are_clamped() {
        let view = view();
        view.apply_record(&ProgressRecord::progress("overshoot", Some(250)));
        assert_eq!(view.snapshot().progress_value, 100);

        view.apply_record(&ProgressRecord::progress("undershoot", Some(-3)));
        let snapshot = view.snapshot();
        assert_eq!(snapshot.progress_value, 0);
        assert_eq!(snapshot.progress_text, "undershoot");
        assert!(snapshot.log.is_empty());
    }

    #[test]
    fn test_content_is_appended_to_log() {
        let view = view();
        view.apply_record(&ProgressRecord::content("line 1", Severity::Information));
        view.apply_record(&ProgressRecord::content("line 2", Severity::Warning));

        let snapshot = view.snapshot();
        assert_eq!(snapshot.log, vec!["line 1", "line 2"]);
        assert_eq!(snapshot.tone, Tone::Warning);
    }

    #[test]
    fn test_faulted_status_uses_first_line() {
        let view = view();
        let error = Arc::new(TaskError::Reported("bad input\nat row 7".to_string()));
        view.apply_transition(
            &StateTransition::new(ExecutionState::Running, ExecutionState::Faulted)
                .with_error(Some(error)),
        );

        let snapshot = view.snapshot();
        assert_eq!(snapshot.status, "Failed: bad input");
        assert_eq!(snapshot.last_error.as_deref(), Some("bad input\nat row 7"));
        assert!(snapshot.can_start);
        assert!(!snapshot.can_cancel);
    }

    #[test]
    fn test_busy_states_toggle_buttons() {
        let view = view();
        view.apply_transition(&StateTransition::new(
            ExecutionState::Idle,
            ExecutionState::Starting,
        ));
        let starting = view.snapshot();
        assert!(!starting.can_start);
        assert!(starting.can_cancel);

        view.apply_transition(&StateTransition::new(
            ExecutionState::Starting,
            ExecutionState::Cancelling,
        ));
        let cancelling = view.snapshot();
        assert!(!cancelling.can_start);
        assert!(!cancelling.can_cancel);
        assert_eq!(cancelling.tone, Tone::Cancelling);
    }

    #[tokio::test]
    async fn test_attach_and_complete() {
        let controller = TaskExecutionController::builder()
            .work(|_token, _progress| async { Ok(None) })
            .build()
            .unwrap();
        let (view, _, _) = ReportView::attach(&controller);

        let state = controller.start(true).unwrap().wait().await.unwrap();
        assert_eq!(state, ExecutionState::Completed);

        let snapshot = view.snapshot();
        assert_eq!(snapshot.status, "Completed!");
        assert_eq!(snapshot.progress_value, 100);
        assert_eq!(snapshot.state, ExecutionState::Completed);
        // Start banner and completion banner
        assert_eq!(snapshot.log.len(), 2);

        view.reset(&controller);
        let reset = view.snapshot();
        assert_eq!(reset.progress_value, 0);
        assert_eq!(reset.status, "Ready");
    }
}
