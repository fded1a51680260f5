//! # taskwrap-foundation
//!
//! Foundation layer for TaskWrap:
//! - Error: shared error type and `Result` alias
//! - Config: `WrapperConfig` (progress bounds, lifecycle/report switches)
//! - Storage: `JsonStore` for global and project config files
//! - Event: synchronous multicast `EventBus<E>` used by the task layer
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  taskwrap-cli (Layer4)                                  │
//! │                     │                                   │
//! │                     ▼                                   │
//! │  taskwrap-task (Layer2)                                 │
//! │   TaskExecutionController ── ProgressChannel            │
//! │                     │                                   │
//! │                     ▼                                   │
//! │  taskwrap-foundation (Layer1)                           │
//! │   EventBus<E> · WrapperConfig · JsonStore · Error       │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config
// ============================================================================
pub use config::{WrapperConfig, WrapperConfigFile, WRAPPER_CONFIG_FILE};

// ============================================================================
// Event
// ============================================================================
pub use event::{EventBus, EventBusConfig, EventListener, FnListener, ListenerId};

// ============================================================================
// Storage
// ============================================================================
pub use storage::JsonStore;
