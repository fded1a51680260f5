//! Progress records
//!
//! A [`ProgressRecord`] is one immutable update: a log line, a short
//! caption, a progress value, or any combination. Observers treat every
//! field as independently optional.

use serde::{Deserialize, Serialize};
use taskwrap_foundation::{Error, Result, WrapperConfig};

/// Tag carried by records the controller emits about its own lifecycle
pub const LIFECYCLE_TAG: &str = "lifecycle";

/// Severity / kind of a progress record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Severity {
    /// Standard informational message
    #[default]
    Information,
    /// Something worth noticing that does not stop the run
    Warning,
    /// A failure
    Error,
    /// Successful completion of a run or a step
    Success,
    /// Verbose output
    Detail,
    /// Caption/value update, usually without content
    StatusUpdate,
    /// A process or phase started
    ProcessStart,
    /// A process or phase ended
    ProcessEnd,
    /// A process was cancelled
    ProcessCancelled,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Information => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Success => "success",
            Severity::Detail => "detail",
            Severity::StatusUpdate => "status",
            Severity::ProcessStart => "start",
            Severity::ProcessEnd => "end",
            Severity::ProcessCancelled => "cancelled",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Error)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One progress update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    content: Option<String>,
    progress_text: Option<String>,
    progress_value: Option<i32>,
    level: Severity,
    tag: Option<String>,
}

impl ProgressRecord {
    pub fn new(
        content: Option<String>,
        progress_text: Option<String>,
        progress_value: Option<i32>,
        level: Severity,
    ) -> Self {
        Self {
            content,
            progress_text,
            progress_value,
            level,
            tag: None,
        }
    }

    /// Log-line record
    pub fn content(content: impl Into<String>, level: Severity) -> Self {
        Self::new(Some(content.into()), None, None, level)
    }

    /// Caption/value record at `StatusUpdate`
    pub fn progress(progress_text: impl Into<String>, progress_value: Option<i32>) -> Self {
        Self::progress_at(progress_text, progress_value, Severity::StatusUpdate)
    }

    /// Caption/value record at an explicit severity
    pub fn progress_at(
        progress_text: impl Into<String>,
        progress_value: Option<i32>,
        level: Severity,
    ) -> Self {
        Self::new(None, Some(progress_text.into()), progress_value, level)
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn content_text(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn progress_text(&self) -> Option<&str> {
        self.progress_text.as_deref()
    }

    pub fn progress_value(&self) -> Option<i32> {
        self.progress_value
    }

    pub fn level(&self) -> Severity {
        self.level
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Emitted by the controller rather than the work function
    pub fn is_lifecycle(&self) -> bool {
        self.tag() == Some(LIFECYCLE_TAG)
    }
}

/// Clamp `value` into `[minimum, maximum]`
///
/// Computed as `max(minimum, min(value, maximum))`, so an inverted range
/// yields `minimum` instead of panicking.
pub fn clamp_progress(value: i32, minimum: i32, maximum: i32) -> i32 {
    minimum.max(value.min(maximum))
}

/// Validated progress range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressBounds {
    minimum: i32,
    maximum: i32,
}

impl ProgressBounds {
    pub fn new(minimum: i32, maximum: i32) -> Result<Self> {
        if minimum > maximum {
            return Err(Error::invalid_bounds(minimum, maximum));
        }
        Ok(Self { minimum, maximum })
    }

    pub fn from_config(config: &WrapperConfig) -> Result<Self> {
        Self::new(config.progress_minimum, config.progress_maximum)
    }

    pub fn minimum(&self) -> i32 {
        self.minimum
    }

    pub fn maximum(&self) -> i32 {
        self.maximum
    }

    pub fn clamp(&self, value: i32) -> i32 {
        clamp_progress(value, self.minimum, self.maximum)
    }
}

impl Default for ProgressBounds {
    fn default() -> Self {
        Self {
            minimum: 0,
            maximum: 100,
        }
    }
}
