//! Terminal rendering of the progress and transition streams

use taskwrap_task::{
    ExecutionState, ProgressBounds, ProgressRecord, StateTransition, TaskExecutionController,
    ViewState,
};

const BAR_WIDTH: usize = 30;

/// Print every record and transition as it arrives
pub fn attach(controller: &TaskExecutionController) {
    let bounds = controller.bounds();
    controller.subscribe_transitions_fn("terminal", |t: &StateTransition| {
        println!("{} {}", t.next.symbol(), t);
    });
    controller.subscribe_progress_fn("terminal", move |r: &ProgressRecord| {
        print_record(r, bounds);
    });
}

fn print_record(record: &ProgressRecord, bounds: ProgressBounds) {
    if let Some(content) = record.content_text() {
        let level = record.level();
        for line in content.lines().filter(|l| !l.is_empty()) {
            if level.is_error() {
                eprintln!("{:>9} | {}", level.as_str(), line);
            } else {
                println!("{:>9} | {}", level.as_str(), line);
            }
        }
    }
    if record.progress_text().is_some() || record.progress_value().is_some() {
        let value = record.progress_value().map(|v| bounds.clamp(v));
        println!(
            "{:>9} | {} {}",
            "",
            bar(value, bounds, BAR_WIDTH),
            record.progress_text().unwrap_or_default()
        );
    }
}

/// `[#####.....]  50%`; an absent value renders an empty bar
pub fn bar(value: Option<i32>, bounds: ProgressBounds, width: usize) -> String {
    let Some(value) = value else {
        return format!("[{}]  ---", " ".repeat(width));
    };

    let span = (i64::from(bounds.maximum()) - i64::from(bounds.minimum())).max(1);
    let offset = i64::from(bounds.clamp(value)) - i64::from(bounds.minimum());
    let ratio = offset as f64 / span as f64;
    let filled = ((ratio * width as f64).round() as usize).min(width);

    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        ".".repeat(width - filled),
        (ratio * 100.0).round() as i64
    )
}

/// One-line outcome for the end of a run
pub fn summary(state: ExecutionState, view: &ViewState, bounds: ProgressBounds) -> String {
    format!(
        "{} {} {}",
        state.symbol(),
        bar(Some(view.progress_value), bounds, 10),
        view.status
    )
}
