//! TaskWrap CLI - Main entry point

mod render;
mod scenarios;

use clap::{Parser, Subcommand};
use scenarios::Scenario;
use std::process::ExitCode;
use std::time::Duration;
use taskwrap_foundation::WrapperConfig;
use taskwrap_task::{ExecutionState, ReportView, TaskExecutionController};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// TaskWrap - run a cancellable task and watch its progress
#[derive(Parser, Debug)]
#[command(name = "taskwrap")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a demo task
    Run {
        /// Demo task to run
        #[arg(short, long, value_enum, default_value_t = Scenario::Counting)]
        scenario: Scenario,

        /// Delay between progress steps in milliseconds
        #[arg(long, default_value = "200")]
        step_ms: u64,

        /// Request cancellation after this many milliseconds
        #[arg(long)]
        cancel_after_ms: Option<u64>,

        /// Do not emit start/end lifecycle records
        #[arg(long)]
        no_lifecycle: bool,

        /// Only print the outcome
        #[arg(short, long)]
        quiet: bool,

        /// Print the final view state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config,
}

struct RunOptions {
    scenario: Scenario,
    step: Duration,
    cancel_after: Option<Duration>,
    emit_lifecycle_messages: bool,
    quiet: bool,
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays the task's output
    let log_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = match WrapperConfig::load() {
        Ok(config) => config,
        Err(e) if e.is_user_facing() => {
            eprintln!("taskwrap: {}", e);
            return Ok(ExitCode::from(2));
        }
        Err(e) => return Err(e.into()),
    };

    match args.command {
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Run {
            scenario,
            step_ms,
            cancel_after_ms,
            no_lifecycle,
            quiet,
            json,
        } => {
            let options = RunOptions {
                scenario,
                step: Duration::from_millis(step_ms),
                cancel_after: cancel_after_ms.map(Duration::from_millis),
                emit_lifecycle_messages: config.emit_lifecycle_messages && !no_lifecycle,
                quiet,
                json,
            };
            run(config, options).await
        }
    }
}

/// Resolves after `delay`, or never
async fn cancel_timer(delay: Option<Duration>) {
    match delay {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending().await,
    }
}

async fn run(config: WrapperConfig, options: RunOptions) -> anyhow::Result<ExitCode> {
    let controller = TaskExecutionController::builder().config(config).build()?;
    options.scenario.install(&controller, options.step);

    let (view, _, _) = ReportView::attach(&controller);
    if !options.quiet {
        render::attach(&controller);
    }

    let Some(handle) = controller.start(options.emit_lifecycle_messages) else {
        anyhow::bail!("the controller rejected the run");
    };
    info!(run_id = %handle.run_id(), scenario = ?options.scenario, "Run started");

    let wait = handle.wait();
    tokio::pin!(wait);

    let state = tokio::select! {
        state = &mut wait => state?,
        _ = cancel_timer(options.cancel_after) => {
            info!("Cancel timer elapsed");
            controller.request_cancel();
            wait.await?
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; cancelling");
            controller.request_cancel();
            wait.await?
        }
    };

    let snapshot = view.snapshot();
    if options.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!("{}", render::summary(state, &snapshot, controller.bounds()));
    }

    Ok(match state {
        ExecutionState::Completed => ExitCode::SUCCESS,
        ExecutionState::Cancelled => ExitCode::from(130),
        _ => ExitCode::FAILURE,
    })
}
