//! Lifecycle messages emitted by the controller itself

use crate::error::TaskError;
use crate::progress::{ProgressBounds, ProgressRecord, Severity, LIFECYCLE_TAG};
use std::time::Duration;

pub const BUSY_WARNING: &str = "A task is already in progress or attempting to cancel.";
pub const DISPOSED_ERROR: &str = "The task controller has been disposed.";

/// Local wall-clock time as `yyyy-MM-dd HH:mm:ss`
pub fn timestamp_now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Elapsed seconds with two decimals, e.g. `1.23s`
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}

fn banner(title: &str, elapsed: Duration) -> String {
    format!(
        "----------Task {}----------\n{} Total time: {}\n",
        title,
        timestamp_now(),
        format_elapsed(elapsed)
    )
}

fn lifecycle(
    content: String,
    progress_text: &str,
    progress_value: Option<i32>,
    level: Severity,
) -> ProgressRecord {
    ProgressRecord::new(
        Some(content),
        Some(progress_text.to_string()),
        progress_value,
        level,
    )
    .with_tag(LIFECYCLE_TAG)
}

pub(crate) fn started(bounds: &ProgressBounds) -> ProgressRecord {
    lifecycle(
        format!("{} Task Starting...", timestamp_now()),
        "Starting...",
        Some(bounds.minimum()),
        Severity::ProcessStart,
    )
}

pub(crate) fn completed(bounds: &ProgressBounds, elapsed: Duration) -> ProgressRecord {
    lifecycle(
        banner("Completed", elapsed),
        "Completed",
        Some(bounds.maximum()),
        Severity::Success,
    )
}

pub(crate) fn cancelled(elapsed: Duration) -> ProgressRecord {
    lifecycle(
        banner("Cancelled", elapsed),
        "Cancelled by user",
        None,
        Severity::ProcessCancelled,
    )
}

pub(crate) fn faulted(error: &TaskError, elapsed: Duration, show_detail: bool) -> ProgressRecord {
    let mut content = format!("{}Error: {}", banner("Error", elapsed), error);
    if show_detail {
        content.push_str("\nDetail: ");
        content.push_str(&error.detail());
    }
    content.push('\n');
    lifecycle(content, "Error occurred", None, Severity::Error)
}

pub(crate) fn busy() -> ProgressRecord {
    ProgressRecord::content(BUSY_WARNING, Severity::Warning).with_tag(LIFECYCLE_TAG)
}

pub(crate) fn disposed() -> ProgressRecord {
    ProgressRecord::content(DISPOSED_ERROR, Severity::Error).with_tag(LIFECYCLE_TAG)
}

pub(crate) fn cancel_failed(error: &taskwrap_foundation::Error) -> ProgressRecord {
    ProgressRecord::content(
        format!("Error during cancellation request: {}", error),
        Severity::Error,
    )
    .with_tag(LIFECYCLE_TAG)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(1234)), "1.23s");
        assert_eq!(format_elapsed(Duration::ZERO), "0.00s");
    }

    #[test]
    fn test_timestamp_shape() {
        let ts = timestamp_now();
        assert_eq!(ts.len(), 19);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], " ");
    }

    #[test]
    fn test_completed_banner_uses_maximum() {
        let bounds = ProgressBounds::new(0, 250).unwrap();
        let record = completed(&bounds, Duration::from_secs(2));

        assert_eq!(record.progress_value(), Some(250));
        assert_eq!(record.level(), Severity::Success);
        assert!(record.is_lifecycle());
        let content = record.content_text().unwrap();
        assert!(content.contains("----------Task Completed----------"));
        assert!(content.contains("Total time: 2.00s"));
    }

    #[test]
    fn test_faulted_banner_detail_switch() {
        let error = TaskError::Work(anyhow::anyhow!("invalid operation"));

        let terse = faulted(&error, Duration::ZERO, false);
        let content = terse.content_text().unwrap();
        assert!(content.contains("Error: invalid operation"));
        assert!(!content.contains("Detail:"));
        assert_eq!(terse.progress_value(), None);

        let verbose = faulted(&error, Duration::ZERO, true);
        assert!(verbose.content_text().unwrap().contains("Detail: invalid operation"));
    }
}
