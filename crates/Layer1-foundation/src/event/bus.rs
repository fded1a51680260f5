//! Event Bus - synchronous broadcast
//!
//! Delivery runs on the publisher's thread against a snapshot of the
//! listener list taken when `publish` is called.

use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, trace};

// ============================================================================
// EventListener Trait
// ============================================================================

/// Listener ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Event listener
///
/// Called synchronously; implementations must not block for long.
pub trait EventListener<E>: Send + Sync {
    /// Listener name (for logs)
    fn name(&self) -> &str;

    fn on_event(&self, event: &E);
}

/// Closure adapter for [`EventListener`]
pub struct FnListener<E> {
    name: String,
    handler: Box<dyn Fn(&E) + Send + Sync>,
}

impl<E> FnListener<E> {
    pub fn new(name: impl Into<String>, handler: impl Fn(&E) + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            handler: Box::new(handler),
        }
    }
}

impl<E> EventListener<E> for FnListener<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&self, event: &E) {
        (self.handler)(event)
    }
}

// ============================================================================
// EventBus
// ============================================================================

/// Event bus config
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Broadcast channel capacity
    pub channel_capacity: usize,

    /// Events kept in history (0 disables it)
    pub history_size: usize,

    /// Trace every published event
    pub debug_mode: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            history_size: 0,
            debug_mode: false,
        }
    }
}

struct RegisteredListener<E> {
    id: ListenerId,
    listener: Arc<dyn EventListener<E>>,
}

impl<E> Clone for RegisteredListener<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            listener: Arc::clone(&self.listener),
        }
    }
}

/// Typed event bus
///
/// ## Usage
///
/// ```ignore
/// let bus = EventBus::new();
/// let id = bus.subscribe(my_listener);
/// bus.publish(event);
/// bus.unsubscribe(id);
/// ```
pub struct EventBus<E> {
    config: EventBusConfig,

    /// Broadcast sender for async consumers
    sender: broadcast::Sender<E>,

    /// Registered listeners, in subscription order
    listeners: RwLock<Vec<RegisteredListener<E>>>,

    listener_counter: AtomicU64,

    history: Mutex<VecDeque<E>>,

    /// Published event count
    event_count: AtomicU64,
}

impl<E> EventBus<E>
where
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    pub fn with_config(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));

        Self {
            config,
            sender,
            listeners: RwLock::new(Vec::new()),
            listener_counter: AtomicU64::new(0),
            history: Mutex::new(VecDeque::new()),
            event_count: AtomicU64::new(0),
        }
    }

    /// Register a listener
    pub fn subscribe(&self, listener: Arc<dyn EventListener<E>>) -> ListenerId {
        let id = ListenerId::new(self.listener_counter.fetch_add(1, Ordering::SeqCst));

        debug!(
            listener_name = listener.name(),
            listener_id = %id,
            "Registering event listener"
        );

        self.listeners.write().push(RegisteredListener { id, listener });
        id
    }

    /// Register a closure
    pub fn subscribe_fn(
        &self,
        name: impl Into<String>,
        handler: impl Fn(&E) + Send + Sync + 'static,
    ) -> ListenerId {
        self.subscribe(Arc::new(FnListener::new(name, handler)))
    }

    /// Remove a listener
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|registered| registered.id != id);
        let removed = listeners.len() != before;

        if removed {
            debug!(listener_id = %id, "Unregistered event listener");
        }

        removed
    }

    /// Publish to every listener registered at call time
    pub fn publish(&self, event: E) {
        let event_count = self.event_count.fetch_add(1, Ordering::SeqCst);

        if self.config.debug_mode {
            trace!("Publishing event #{}", event_count + 1);
        }

        if self.config.history_size > 0 {
            let mut history = self.history.lock();
            history.push_back(event.clone());
            while history.len() > self.config.history_size {
                history.pop_front();
            }
        }

        // Snapshot so listeners may (un)subscribe during delivery
        let snapshot: Vec<RegisteredListener<E>> = self.listeners.read().clone();

        for registered in &snapshot {
            let delivered = catch_unwind(AssertUnwindSafe(|| {
                registered.listener.on_event(&event);
            }));

            if delivered.is_err() {
                error!(
                    listener_id = %registered.id,
                    listener_name = registered.listener.name(),
                    "Event listener panicked"
                );
            }
        }

        // No receivers is fine
        let _ = self.sender.send(event);
    }

    /// Broadcast receiver (stream style)
    pub fn receiver(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    /// Recent events, newest first
    pub fn history(&self, limit: Option<usize>) -> Vec<E> {
        let history = self.history.lock();
        let limit = limit.unwrap_or(history.len());
        history.iter().rev().take(limit).cloned().collect()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::SeqCst)
    }
}

impl<E> Default for EventBus<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
