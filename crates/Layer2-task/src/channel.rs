//! Progress channel
//!
//! Multicasts [`ProgressRecord`]s to any number of observers. Records come
//! from the running work function (through a run-scoped
//! [`ProgressReporter`]), from the controller's lifecycle messages, and from
//! the application reporting directly outside of any run.
//!
//! Delivery is synchronous, in subscription order, against a snapshot of the
//! subscribers taken at report time. There is no replay: a subscriber sees
//! only records reported after it subscribed.

use crate::progress::{ProgressRecord, Severity};
use crate::state::RunId;
use parking_lot::RwLock;
use std::sync::Arc;
use taskwrap_foundation::event::{EventBus, EventBusConfig, EventListener, ListenerId};
use tokio::sync::broadcast;
use tracing::warn;

/// Write side of a progress stream
pub trait ProgressSink: Send + Sync {
    fn report(&self, record: ProgressRecord);

    /// Report a log line
    fn content(&self, content: &str, level: Severity) {
        self.report(ProgressRecord::content(content, level));
    }

    /// Report a caption and value
    fn progress(&self, progress_text: &str, progress_value: Option<i32>, level: Severity) {
        self.report(ProgressRecord::progress_at(progress_text, progress_value, level));
    }
}

/// Multicast channel of progress records
pub struct ProgressChannel {
    bus: EventBus<ProgressRecord>,
}

impl ProgressChannel {
    pub fn new() -> Self {
        Self::with_history(0)
    }

    /// Keep the latest `history_size` records for [`ProgressChannel::history`]
    pub fn with_history(history_size: usize) -> Self {
        Self {
            bus: EventBus::with_config(EventBusConfig {
                history_size,
                ..Default::default()
            }),
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn EventListener<ProgressRecord>>) -> ListenerId {
        self.bus.subscribe(listener)
    }

    pub fn subscribe_fn(
        &self,
        name: impl Into<String>,
        handler: impl Fn(&ProgressRecord) + Send + Sync + 'static,
    ) -> ListenerId {
        self.bus.subscribe_fn(name, handler)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Async stream of records; lagging receivers lose the oldest entries
    pub fn receiver(&self) -> broadcast::Receiver<ProgressRecord> {
        self.bus.receiver()
    }

    /// Recent records, newest first (empty unless history is enabled)
    pub fn history(&self, limit: Option<usize>) -> Vec<ProgressRecord> {
        self.bus.history(limit)
    }

    pub fn subscriber_count(&self) -> usize {
        self.bus.listener_count()
    }

    pub fn reported_count(&self) -> u64 {
        self.bus.event_count()
    }
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ProgressChannel {
    fn report(&self, record: ProgressRecord) {
        self.bus.publish(record);
    }
}

/// Progress sink handed to one run's work function
///
/// Sealed by the controller before the run's terminal transition; records
/// reported afterwards (e.g. from a detached task that kept a clone) are
/// dropped.
#[derive(Clone)]
pub struct ProgressReporter {
    channel: Arc<ProgressChannel>,
    open: Arc<RwLock<bool>>,
    run_id: Option<RunId>,
}

impl ProgressReporter {
    pub fn new(channel: Arc<ProgressChannel>, run_id: Option<RunId>) -> Self {
        Self {
            channel,
            open: Arc::new(RwLock::new(true)),
            run_id,
        }
    }

    pub fn run_id(&self) -> Option<RunId> {
        self.run_id
    }

    pub fn is_open(&self) -> bool {
        *self.open.read_recursive()
    }

    /// Stop forwarding; waits for deliveries already in flight
    pub(crate) fn seal(&self) {
        *self.open.write() = false;
    }
}

impl ProgressSink for ProgressReporter {
    fn report(&self, record: ProgressRecord) {
        // Held across delivery so `seal` cannot overtake it
        let open = self.open.read_recursive();
        if *open {
            self.channel.report(record);
        } else {
            warn!(
                run_id = ?self.run_id.map(|id| id.to_string()),
                level = %record.level(),
                "Dropping progress record reported after the run ended"
            );
        }
    }
}
