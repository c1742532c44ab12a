// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod process;
pub mod session;

use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::{SessionConfig, StepAction};
use crate::session::{Session, SessionReport};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - session file loading
/// - the blocking session run (on Tokio's blocking pool)
/// - optional `--echo` of every output line
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let mut session = Session::new(cfg)?;

    let echo_task = if args.echo {
        let mut lines = session.subscribe();
        Some(tokio::spawn(async move {
            while let Some(line) = lines.recv().await {
                println!("{line}");
            }
        }))
    } else {
        None
    };

    // Ctrl-C → kill the child and stop; the child itself ignores SIGINT.
    {
        let canceller = session.canceller();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            warn!("Ctrl-C received, stopping the session");
            canceller.cancel();
        });
    }

    let outcome = tokio::task::spawn_blocking(move || session.run()).await?;

    // The mirror is closed once the child is killed, so this finishes.
    if let Some(task) = echo_task {
        let _ = task.await;
    }

    let report = outcome?;
    log_report(&report);
    Ok(())
}

fn log_report(report: &SessionReport) {
    for step in &report.steps {
        debug!(step = step.step, lines = step.lines.len(), end = ?step.end, "step report");
    }
    match report.exit_status {
        Some(exit) => info!(steps = report.steps.len(), cancelled = report.cancelled, %exit, "done"),
        None => info!(steps = report.steps.len(), cancelled = report.cancelled, "done"),
    }
}

/// Simple dry-run output: print the process and its steps.
fn print_dry_run(cfg: &SessionConfig) {
    println!("procline dry-run");
    println!("  command = {}", cfg.command.display());
    if !cfg.args.is_empty() {
        println!("  args = {:?}", cfg.args);
    }
    println!("  reader.buffer_size = {}", cfg.reader.buffer_size());
    println!("  reader.timeout = {}", cfg.default_timeout);
    println!();

    println!("steps ({}):", cfg.steps.len());
    for (idx, step) in cfg.steps.iter().enumerate() {
        let n = idx + 1;
        match &step.action {
            StepAction::Send(line) => println!("  {n}. send {line:?}"),
            StepAction::Read => println!("  {n}. read ({})", step.timeout),
            StepAction::Expect(matcher) => println!("  {n}. expect {matcher} ({})", step.timeout),
        }
    }

    debug!("dry-run complete (no process started)");
}
