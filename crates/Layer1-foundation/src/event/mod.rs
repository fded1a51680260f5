//! Event System - synchronous multicast
//!
//! A typed publish/subscribe bus. The task layer builds its progress channel
//! and its state-transition stream on top of it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      EventBus<E>                             │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │  publish(event) ── snapshot of listeners ─────────┐ │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! │         │ (subscription order, caller's thread)             │
//! │         ▼                                                   │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
//! │  │  Listener 1  │  │  Listener 2  │  │  broadcast   │      │
//! │  │  (view)      │  │  (logger)    │  │  receivers   │      │
//! │  └──────────────┘  └──────────────┘  └──────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use taskwrap_foundation::event::EventBus;
//!
//! let bus: EventBus<String> = EventBus::new();
//! let id = bus.subscribe_fn("printer", |line: &String| println!("{}", line));
//! bus.publish("hello".to_string());
//! bus.unsubscribe(id);
//! ```

pub mod bus;

pub use bus::{EventBus, EventBusConfig, EventListener, FnListener, ListenerId};
